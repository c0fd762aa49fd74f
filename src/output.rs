use crate::catalog;
use crate::models::{ComparisonReport, OverallMetrics, SuiteRunSummary};
use crate::runner::ResponseEvent;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Longest response preview shown while a suite runs
const PREVIEW_CHARS: usize = 120;

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print a single run summary in the specified format
pub fn print_run_summary(summary: &SuiteRunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_run_plain(summary),
        OutputFormat::Json => print_json(summary),
    }
}

/// Print a comparison report in the specified format
pub fn print_comparison(report: &ComparisonReport, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_comparison_plain(report),
        OutputFormat::Json => print_json(report),
    }
}

/// Print one response as it arrives
pub fn print_progress(event: &ResponseEvent<'_>) {
    print!("{}", render_progress(event));
}

/// Print every catalog suite with its test cases
pub fn print_catalog() {
    print!("{}", render_catalog());
}

/// Print any report as pretty JSON
fn print_json<T: Serialize>(payload: &T) {
    match serde_json::to_string_pretty(payload) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}

fn print_run_plain(summary: &SuiteRunSummary) {
    print!("{}", render_run_plain(summary));
}

fn print_comparison_plain(report: &ComparisonReport) {
    print!("{}", render_comparison_plain(report));
}

/// Truncate long responses to a single preview line
fn preview(response: &str) -> String {
    if response.chars().count() > PREVIEW_CHARS {
        let head: String = response.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        response.to_string()
    }
}

// Writing into a String cannot fail, so the fmt::Results below are ignored.

fn render_progress(event: &ResponseEvent<'_>) -> String {
    let mut out = String::new();
    if event.attempt == 1 {
        let _ = writeln!(out, "--- Test: {} ---", event.test_id);
    }
    let _ = writeln!(
        out,
        "Run {}/{}: {}",
        event.attempt,
        event.run_count,
        preview(event.response)
    );
    out
}

fn render_catalog() -> String {
    let mut out = String::new();
    for name in catalog::list_suite_names() {
        let _ = writeln!(out, "{}", name);
        if let Ok(cases) = catalog::get_suite(name) {
            for case in cases {
                let _ = writeln!(out, "  • {}: {}", case.id, case.prompt);
                if let Some(expected) = case.expected_behavior {
                    let _ = writeln!(out, "      expected: {}", expected);
                }
            }
        }
    }
    out
}

fn render_run_plain(summary: &SuiteRunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Suite: {} ===", summary.suite);
    let _ = writeln!(
        out,
        "Model: {} | Runs: {} | Temp: {}",
        summary.model, summary.run_count, summary.temperature
    );
    out.push('\n');

    for result in &summary.results {
        let _ = writeln!(out, "Test: {}", result.test_id);
        let _ = writeln!(out, "Prompt: {}", result.prompt);
        if let Some(expected) = &result.expected_behavior {
            let _ = writeln!(out, "Expected: {}", expected);
        }
        let _ = writeln!(out, "Consistency: {}%", result.metrics.consistency_pct);
        let _ = writeln!(out, "Unique responses: {}", result.metrics.unique_responses);
        let _ = writeln!(out, "Length variance: {}", result.metrics.length_variance);
        let _ = writeln!(
            out,
            "Most common response: {}",
            preview(&result.metrics.most_common_response)
        );
        out.push('\n');
    }

    for failure in &summary.failures {
        let _ = writeln!(
            out,
            "Skipped: {} (attempt {}, {}): {}",
            failure.test_id, failure.attempt, failure.kind, failure.message
        );
    }
    if !summary.failures.is_empty() {
        out.push('\n');
    }

    out.push_str("📊 OVERALL\n");
    out.push_str("----------\n");
    render_overall_plain(&mut out, &summary.overall);
    out
}

fn render_overall_plain(out: &mut String, overall: &OverallMetrics) {
    let _ = writeln!(out, "- avg_consistency_pct: {}%", overall.avg_consistency_pct);
    let _ = writeln!(out, "- avg_unique_responses: {}", overall.avg_unique_responses);
    let _ = writeln!(out, "- avg_length_variance: {}", overall.avg_length_variance);
}

fn render_comparison_plain(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Model comparison: suite={} ===", report.suite);
    let _ = writeln!(out, "Runs: {} | Temp: {}", report.run_count, report.temperature);
    out.push('\n');

    for model in &report.models {
        if let Some(summary) = report.results_by_model.get(model) {
            let _ = writeln!(out, "### {}", model);
            render_overall_plain(&mut out, &summary.overall);
            if !summary.failures.is_empty() {
                let _ = writeln!(out, "- skipped tests: {}", summary.failures.len());
            }
            out.push('\n');
        }
    }

    let _ = writeln!(out, "{:<4} {:<30} {:<12} {:<8}", "Rank", "Model", "Consistency", "Unique");
    let _ = writeln!(out, "{}", "-".repeat(56));
    for (rank, entry) in report.ranking.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<4} {:<30} {:<12.2} {:<8.2}",
            rank + 1,
            entry.model,
            entry.avg_consistency_pct,
            entry.avg_unique_responses
        );
    }
    out.push('\n');
    let _ = writeln!(out, "Winner: {}", report.winner);
    out
}
