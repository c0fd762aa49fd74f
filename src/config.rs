use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// What to do when a repetition of a test case fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole suite run
    #[default]
    Abort,
    /// Drop the failed test case and keep going
    Skip,
}

/// Settings for the gateway and report output
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// OpenAI-compatible API endpoint
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default = "default_env_var_api_key")]
    pub env_var_api_key: String,
    /// System message sent with every prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Maximum tokens for response generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u16,
    /// Requests per second; 0 disables pacing
    #[serde(default)]
    pub rate_limit_rps: f64,
    /// Directory that receives report files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_api_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_env_var_api_key() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_system_prompt() -> String {
    "Answer clearly and concisely.".to_string()
}

fn default_max_tokens() -> u16 {
    1000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            env_var_api_key: default_env_var_api_key(),
            system_prompt: default_system_prompt(),
            max_tokens: default_max_tokens(),
            rate_limit_rps: 0.0,
            output_dir: default_output_dir(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check values that deserialize fine but cannot be used
    fn validate(&self) -> Result<()> {
        let rps = self.rate_limit_rps;
        if !rps.is_finite() || rps < 0.0 {
            bail!("rate_limit_rps must be a finite number >= 0, got {rps}");
        }
        if rps > 0.0 && Duration::try_from_secs_f64(1.0 / rps).is_err() {
            bail!("rate_limit_rps {rps} is too small to pace requests");
        }

        Ok(())
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Load variables from a `.env` file into the process environment.
///
/// Variables already set are kept. With no `path`, `.env` is searched for from the
/// current directory upwards and a missing file is not an error.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match loaded {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded environment file");
            Ok(Some(path))
        }
        Err(err) if path.is_none() && err.not_found() => Ok(None),
        Err(err) => Err(err).context("Failed to load .env file"),
    }
}
