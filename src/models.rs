use crate::catalog::Suite;
use crate::error::GenerateErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stability metrics computed over the repeated responses to one prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// First-seen response among those with the highest frequency
    pub most_common_response: String,
    /// Share of responses equal to the most common one (0 to 100)
    pub consistency_pct: f64,
    /// Number of distinct responses
    pub unique_responses: usize,
    /// Population variance of response lengths in characters
    pub length_variance: f64,
}

/// Outcome of running one test case `run_count` times
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub prompt: String,
    pub expected_behavior: Option<String>,
    /// Raw responses in call order
    pub responses: Vec<String>,
    pub metrics: EvaluationMetrics,
}

/// A test case dropped from a run under the skip policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFailure {
    pub test_id: String,
    pub attempt: usize,
    pub kind: GenerateErrorKind,
    pub message: String,
}

/// Averages across every test result of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub avg_consistency_pct: f64,
    pub avg_unique_responses: f64,
    pub avg_length_variance: f64,
}

/// Complete result of one suite against one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteRunSummary {
    pub suite: Suite,
    pub model: String,
    pub run_count: usize,
    pub temperature: f64,
    pub results: Vec<TestResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TestFailure>,
    pub overall: OverallMetrics,
}

/// One entry of a comparison ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedModel {
    pub model: String,
    pub avg_consistency_pct: f64,
    pub avg_unique_responses: f64,
}

/// Result of running one suite against several models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub suite: Suite,
    pub run_count: usize,
    pub temperature: f64,
    /// Models in the order they were given
    pub models: Vec<String>,
    pub results_by_model: BTreeMap<String, SuiteRunSummary>,
    /// Models ordered from most to least reliable
    pub ranking: Vec<RankedModel>,
    pub winner: String,
}
