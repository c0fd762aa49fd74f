use crate::config::Config;
use crate::error::{GenerateError, ReliabilityError};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
};
use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// A single text-generation capability
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generate one response for `prompt` with the given model and temperature
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
    ) -> Result<String, GenerateError>;
}

/// API credential read once at startup
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Read the API key from `var`, failing if it is unset or blank
    pub fn from_env(var: &str) -> Result<Self, ReliabilityError> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(ReliabilityError::MissingCredential {
                var: var.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Gateway backed by an OpenAI-compatible chat completion endpoint
pub struct OpenAiGateway {
    client: Client<OpenAIConfig>,
    system_prompt: String,
    max_tokens: u16,
    rate_limit_rps: f64,
    /// Time of the last request, used for pacing
    last_request: Mutex<Option<Instant>>,
}

impl OpenAiGateway {
    pub fn new(config: &Config, credentials: Credentials) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(credentials.api_key)
            .with_api_base(&config.api_endpoint);

        // A failed call is reported as-is; the client must not retry 429s on its own
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retry),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            rate_limit_rps: config.rate_limit_rps,
            last_request: Mutex::new(None),
        }
    }

    /// Keep at least `1 / rate_limit_rps` seconds between requests
    async fn enforce_rate_limit(last_request: &mut Option<Instant>, rate_limit_rps: f64) {
        if rate_limit_rps.is_nan() || rate_limit_rps <= 0.0 {
            return;
        }

        let Ok(min_interval) = Duration::try_from_secs_f64(1.0 / rate_limit_rps) else {
            return;
        };

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    fn build_request(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let system_message: ChatCompletionRequestMessage =
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()?
                .into();

        let user_message: ChatCompletionRequestMessage =
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()?
                .into();

        CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages([system_message, user_message])
            .temperature(temperature as f32)
            .max_tokens(self.max_tokens)
            .build()
    }

    fn extract_content(response: CreateChatCompletionResponse) -> String {
        match response.choices.into_iter().next() {
            Some(choice) => choice.message.content.unwrap_or_default().trim().to_string(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
    ) -> Result<String, GenerateError> {
        {
            let mut last_request = self.last_request.lock().await;
            Self::enforce_rate_limit(&mut last_request, self.rate_limit_rps).await;
        }

        let request = self
            .build_request(prompt, model, temperature)
            .map_err(classify_openai_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_openai_error)?;

        Ok(Self::extract_content(response))
    }
}

/// Map a provider error onto the gateway's failure kinds
fn classify_openai_error(err: OpenAIError) -> GenerateError {
    match &err {
        OpenAIError::ApiError(api_error) => {
            let message = api_error.message.to_lowercase();
            let error_type = api_error.r#type.as_deref().unwrap_or_default();

            if message.contains("api key")
                || message.contains("authentication")
                || message.contains("unauthorized")
            {
                GenerateError::Auth(api_error.message.clone())
            } else if matches!(error_type, "requests" | "tokens" | "rate_limit_error")
                || message.contains("rate limit")
            {
                GenerateError::RateLimit(api_error.message.clone())
            } else {
                GenerateError::Request(api_error.message.clone())
            }
        }
        _ => GenerateError::Request(err.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// One recorded `generate` call
    #[derive(Debug, Clone, PartialEq)]
    pub struct Call {
        pub prompt: String,
        pub model: String,
        pub temperature: f64,
        /// 1-based count of calls so far with this prompt and model
        pub attempt: usize,
    }

    type Script = Box<dyn Fn(&Call) -> Result<String, GenerateError> + Send + Sync>;

    /// Gateway double answering from a closure and recording every call
    pub struct ScriptedGateway {
        script: Script,
        calls: StdMutex<Vec<Call>>,
    }

    impl ScriptedGateway {
        pub fn new(
            script: impl Fn(&Call) -> Result<String, GenerateError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                script: Box::new(script),
                calls: StdMutex::new(Vec::new()),
            }
        }

        /// Always answers with the same text
        pub fn fixed(text: &str) -> Self {
            let text = text.to_string();
            Self::new(move |_| Ok(text.clone()))
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn generate(
            &self,
            prompt: &str,
            model: &str,
            temperature: f64,
        ) -> Result<String, GenerateError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let attempt = calls
                    .iter()
                    .filter(|c| c.prompt == prompt && c.model == model)
                    .count()
                    + 1;
                let call = Call {
                    prompt: prompt.to_string(),
                    model: model.to_string(),
                    temperature,
                    attempt,
                };
                calls.push(call.clone());
                call
            };

            (self.script)(&call)
        }
    }
}
