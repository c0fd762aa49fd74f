use crate::error::{ReliabilityError, Result};
use crate::models::{EvaluationMetrics, OverallMetrics};
use std::collections::HashMap;

/// Compute stability metrics over the responses to a single prompt.
///
/// Responses are compared after trimming, case-sensitively. Ties for the most
/// common response go to the one seen first.
pub fn evaluate<S: AsRef<str>>(responses: &[S]) -> Result<EvaluationMetrics> {
    if responses.is_empty() {
        return Err(ReliabilityError::InvalidInput(
            "cannot evaluate an empty response set".to_string(),
        ));
    }

    let trimmed: Vec<&str> = responses.iter().map(|r| r.as_ref().trim()).collect();
    let classes = frequency_classes(&trimmed);

    // Strict comparison keeps the earliest class on ties
    let mut most_common = classes[0];
    for &class in &classes[1..] {
        if class.1 > most_common.1 {
            most_common = class;
        }
    }

    let lengths: Vec<f64> = trimmed.iter().map(|r| r.chars().count() as f64).collect();

    Ok(EvaluationMetrics {
        most_common_response: most_common.0.to_string(),
        consistency_pct: round2(100.0 * most_common.1 as f64 / trimmed.len() as f64),
        unique_responses: classes.len(),
        length_variance: round2(population_variance(&lengths)),
    })
}

/// Average the metrics of a run's test results
pub fn summarize<'a>(metrics: impl IntoIterator<Item = &'a EvaluationMetrics>) -> OverallMetrics {
    let metrics: Vec<&EvaluationMetrics> = metrics.into_iter().collect();
    if metrics.is_empty() {
        return OverallMetrics::default();
    }

    let consistency: Vec<f64> = metrics.iter().map(|m| m.consistency_pct).collect();
    let unique: Vec<f64> = metrics.iter().map(|m| m.unique_responses as f64).collect();
    let variance: Vec<f64> = metrics.iter().map(|m| m.length_variance).collect();

    OverallMetrics {
        avg_consistency_pct: round2(mean(&consistency)),
        avg_unique_responses: round2(mean(&unique)),
        avg_length_variance: round2(mean(&variance)),
    }
}

/// Distinct responses with their counts, in order of first occurrence
fn frequency_classes<'a>(responses: &[&'a str]) -> Vec<(&'a str, usize)> {
    let mut classes: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for &response in responses {
        match index.get(response) {
            Some(&i) => classes[i].1 += 1,
            None => {
                index.insert(response, classes.len());
                classes.push((response, 1));
            }
        }
    }

    classes
}

fn mean(values: &[f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    sum / values.len() as f64
}

/// Variance dividing by N; a single value has zero variance
fn population_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let mean = mean(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
