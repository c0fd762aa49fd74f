use crate::catalog::{Suite, TestCase};
use crate::config::FailurePolicy;
use crate::error::{GenerateError, ReliabilityError, Result};
use crate::evaluation::{evaluate, summarize};
use crate::gateway::ModelGateway;
use crate::models::{SuiteRunSummary, TestFailure, TestResult};
use tracing::{debug, info, warn};

/// Emitted after every successful gateway call
#[derive(Debug, Clone, Copy)]
pub struct ResponseEvent<'a> {
    pub test_id: &'a str,
    /// 1-based repetition index
    pub attempt: usize,
    pub run_count: usize,
    pub response: &'a str,
}

/// Progress callback invoked with each response
pub type OnResponse<'cb> = &'cb mut dyn FnMut(&ResponseEvent<'_>);

/// Runs every test case of a suite repeatedly against one model
pub struct SuiteRunner<'g, G: ModelGateway + ?Sized> {
    gateway: &'g G,
    policy: FailurePolicy,
}

impl<'g, G: ModelGateway + ?Sized> SuiteRunner<'g, G> {
    /// Create a runner that aborts on the first failed repetition
    pub fn new(gateway: &'g G) -> Self {
        Self {
            gateway,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run `suite_name` against `model`, calling the gateway `run_count` times per test case
    pub async fn run(
        &self,
        suite_name: &str,
        model: &str,
        run_count: usize,
        temperature: f64,
        mut on_each_response: Option<OnResponse<'_>>,
    ) -> Result<SuiteRunSummary> {
        let suite: Suite = suite_name.parse()?;
        validate_run_parameters(run_count, temperature)?;

        info!(%suite, model, run_count, temperature, "Running suite");

        let mut results = Vec::new();
        let mut failures = Vec::new();
        let mut first_error = None;

        for case in suite.test_cases() {
            let outcome = self
                .collect_responses(case, model, run_count, temperature, &mut on_each_response)
                .await;

            match outcome {
                Ok(responses) => results.push(build_test_result(case, responses)?),
                Err((attempt, cause)) => {
                    let failure = TestFailure {
                        test_id: case.id.to_string(),
                        attempt,
                        kind: cause.kind(),
                        message: cause.to_string(),
                    };
                    let err = ReliabilityError::Gateway {
                        model: model.to_string(),
                        test_id: case.id.to_string(),
                        attempt,
                        cause,
                    };

                    match self.policy {
                        FailurePolicy::Abort => return Err(err),
                        FailurePolicy::Skip => {
                            warn!(test_id = case.id, error = %err, "Skipping failed test case");
                            failures.push(failure);
                            first_error.get_or_insert(err);
                        }
                    }
                }
            }
        }

        if results.is_empty() {
            if let Some(err) = first_error {
                return Err(err);
            }
        }

        let overall = summarize(results.iter().map(|r| &r.metrics));
        debug!(%suite, model, ?overall, "Suite finished");

        Ok(SuiteRunSummary {
            suite,
            model: model.to_string(),
            run_count,
            temperature,
            results,
            failures,
            overall,
        })
    }

    /// Call the gateway `run_count` times for one test case.
    ///
    /// Stops at the first failed call and returns its 1-based attempt index.
    async fn collect_responses(
        &self,
        case: &TestCase,
        model: &str,
        run_count: usize,
        temperature: f64,
        on_each_response: &mut Option<OnResponse<'_>>,
    ) -> Result<Vec<String>, (usize, GenerateError)> {
        let mut responses = Vec::with_capacity(run_count);

        for attempt in 1..=run_count {
            debug!(test_id = case.id, attempt, run_count, "Generating response");

            let response = self
                .gateway
                .generate(case.prompt, model, temperature)
                .await
                .map_err(|cause| (attempt, cause))?;

            if let Some(callback) = on_each_response.as_deref_mut() {
                callback(&ResponseEvent {
                    test_id: case.id,
                    attempt,
                    run_count,
                    response: &response,
                });
            }

            responses.push(response);
        }

        Ok(responses)
    }
}

/// Reject run counts and temperatures no benchmark can use
pub fn validate_run_parameters(run_count: usize, temperature: f64) -> Result<()> {
    if run_count == 0 {
        return Err(ReliabilityError::InvalidInput(
            "run count must be at least 1".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&temperature) {
        return Err(ReliabilityError::InvalidInput(format!(
            "temperature must be between 0.0 and 2.0, got {temperature}"
        )));
    }

    Ok(())
}

fn build_test_result(case: &TestCase, responses: Vec<String>) -> Result<TestResult> {
    let metrics = evaluate(&responses)?;

    Ok(TestResult {
        test_id: case.id.to_string(),
        prompt: case.prompt.to_string(),
        expected_behavior: case.expected_behavior.map(str::to_string),
        responses,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerateErrorKind;
    use crate::gateway::fake::ScriptedGateway;

    fn math_answers() -> ScriptedGateway {
        ScriptedGateway::new(|call| {
            if call.prompt.contains("17 * 24") {
                Ok("408".to_string())
            } else if call.attempt % 2 == 0 {
                Ok("8.05 km".to_string())
            } else {
                Ok("8.05".to_string())
            }
        })
    }

    #[tokio::test]
    async fn test_run_collects_run_count_responses_per_test() {
        let gateway = math_answers();
        let runner = SuiteRunner::new(&gateway);

        let summary = runner.run("math", "gpt-4o-mini", 5, 0.7, None).await.unwrap();

        assert_eq!(summary.suite, Suite::Math);
        assert_eq!(summary.model, "gpt-4o-mini");
        assert_eq!(summary.run_count, 5);
        assert_eq!(summary.results.len(), 2);
        assert!(summary.failures.is_empty());

        let ids: Vec<_> = summary.results.iter().map(|r| r.test_id.as_str()).collect();
        assert_eq!(ids, vec!["simple_math", "unit_conversion"]);
        for result in &summary.results {
            assert_eq!(result.responses.len(), 5);
        }

        assert_eq!(gateway.calls().len(), 10);
    }

    #[tokio::test]
    async fn test_run_computes_metrics_and_overall() {
        let gateway = math_answers();
        let runner = SuiteRunner::new(&gateway);

        let summary = runner.run("math", "gpt-4o-mini", 4, 0.7, None).await.unwrap();

        let simple = &summary.results[0];
        assert_eq!(simple.metrics.most_common_response, "408");
        assert_eq!(simple.metrics.consistency_pct, 100.0);
        assert_eq!(simple.expected_behavior.as_deref(), Some("Should answer 408."));

        // "8.05", "8.05 km", "8.05", "8.05 km"
        let conversion = &summary.results[1];
        assert_eq!(conversion.responses, vec!["8.05", "8.05 km", "8.05", "8.05 km"]);
        assert_eq!(conversion.metrics.most_common_response, "8.05");
        assert_eq!(conversion.metrics.consistency_pct, 50.0);
        assert_eq!(conversion.metrics.unique_responses, 2);
        // lengths 4, 7, 4, 7
        assert_eq!(conversion.metrics.length_variance, 2.25);

        assert_eq!(summary.overall.avg_consistency_pct, 75.0);
        assert_eq!(summary.overall.avg_unique_responses, 1.5);
        assert_eq!(summary.overall.avg_length_variance, 1.13);
    }

    #[tokio::test]
    async fn test_run_calls_gateway_in_catalog_and_repetition_order() {
        let gateway = ScriptedGateway::fixed("ok");
        let runner = SuiteRunner::new(&gateway);

        runner.run("confidence", "model-a", 2, 0.2, None).await.unwrap();

        let calls = gateway.calls();
        let cases = Suite::Confidence.test_cases();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].prompt, cases[0].prompt);
        assert_eq!(calls[1].prompt, cases[0].prompt);
        assert_eq!(calls[2].prompt, cases[1].prompt);
        assert_eq!(calls[3].prompt, cases[1].prompt);
        assert!(calls.iter().all(|c| c.model == "model-a" && c.temperature == 0.2));
    }

    #[tokio::test]
    async fn test_run_invokes_callback_after_each_response() {
        let gateway = math_answers();
        let runner = SuiteRunner::new(&gateway);
        let mut seen = Vec::new();

        runner
            .run(
                "math",
                "gpt-4o-mini",
                2,
                0.7,
                Some(&mut |event| {
                    seen.push((
                        event.test_id.to_string(),
                        event.attempt,
                        event.response.to_string(),
                    ));
                }),
            )
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![
                ("simple_math".to_string(), 1, "408".to_string()),
                ("simple_math".to_string(), 2, "408".to_string()),
                ("unit_conversion".to_string(), 1, "8.05".to_string()),
                ("unit_conversion".to_string(), 2, "8.05 km".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_unknown_suite_makes_no_calls() {
        let gateway = ScriptedGateway::fixed("ok");
        let runner = SuiteRunner::new(&gateway);

        let err = runner.run("poetry", "gpt-4o-mini", 3, 0.7, None).await.unwrap_err();

        assert!(matches!(err, ReliabilityError::UnknownSuite { .. }));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_zero_run_count_is_invalid() {
        let gateway = ScriptedGateway::fixed("ok");
        let runner = SuiteRunner::new(&gateway);

        let err = runner.run("math", "gpt-4o-mini", 0, 0.7, None).await.unwrap_err();

        assert!(matches!(err, ReliabilityError::InvalidInput(_)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_out_of_range_temperature_is_invalid() {
        let gateway = ScriptedGateway::fixed("ok");
        let runner = SuiteRunner::new(&gateway);

        for temperature in [-0.1, 2.5, f64::NAN] {
            let err = runner
                .run("math", "gpt-4o-mini", 1, temperature, None)
                .await
                .unwrap_err();
            assert!(matches!(err, ReliabilityError::InvalidInput(_)));
        }
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_aborts_on_failed_repetition() {
        let gateway = ScriptedGateway::new(|call| {
            if call.prompt.contains("17 * 24") && call.attempt == 3 {
                Err(GenerateError::Request("connection reset".to_string()))
            } else {
                Ok("408".to_string())
            }
        });
        let runner = SuiteRunner::new(&gateway);

        let err = runner.run("math", "gpt-4o-mini", 5, 0.7, None).await.unwrap_err();

        match err {
            ReliabilityError::Gateway {
                model,
                test_id,
                attempt,
                cause,
            } => {
                assert_eq!(model, "gpt-4o-mini");
                assert_eq!(test_id, "simple_math");
                assert_eq!(attempt, 3);
                assert_eq!(cause.kind(), GenerateErrorKind::Request);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Repetitions 4 and 5 and the next test case never ran
        assert_eq!(gateway.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_run_skip_policy_drops_failed_test_case() {
        let gateway = ScriptedGateway::new(|call| {
            if call.prompt.contains("17 * 24") && call.attempt == 3 {
                Err(GenerateError::RateLimit("too many requests".to_string()))
            } else {
                Ok("8.05".to_string())
            }
        });
        let runner = SuiteRunner::new(&gateway).with_policy(FailurePolicy::Skip);

        let summary = runner.run("math", "gpt-4o-mini", 5, 0.7, None).await.unwrap();

        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.results[0].test_id, "unit_conversion");
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].test_id, "simple_math");
        assert_eq!(summary.failures[0].attempt, 3);
        assert_eq!(summary.failures[0].kind, GenerateErrorKind::RateLimit);
        assert_eq!(summary.overall.avg_consistency_pct, 100.0);
    }

    #[tokio::test]
    async fn test_run_skip_policy_fails_when_every_test_fails() {
        let gateway =
            ScriptedGateway::new(|_| Err(GenerateError::Auth("invalid key".to_string())));
        let runner = SuiteRunner::new(&gateway).with_policy(FailurePolicy::Skip);

        let err = runner.run("math", "gpt-4o-mini", 2, 0.7, None).await.unwrap_err();

        match err {
            ReliabilityError::Gateway { test_id, attempt, .. } => {
                assert_eq!(test_id, "simple_math");
                assert_eq!(attempt, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_run_parameters_accepts_bounds() {
        assert!(validate_run_parameters(1, 0.0).is_ok());
        assert!(validate_run_parameters(10, 2.0).is_ok());
    }
}
