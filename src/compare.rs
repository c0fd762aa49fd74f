use crate::catalog::Suite;
use crate::error::{ReliabilityError, Result};
use crate::gateway::ModelGateway;
use crate::models::{ComparisonReport, RankedModel, SuiteRunSummary};
use crate::runner::{SuiteRunner, validate_run_parameters};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Runs one suite against several models and ranks them
pub struct ModelComparator<'g, G: ModelGateway + ?Sized> {
    runner: SuiteRunner<'g, G>,
}

impl<'g, G: ModelGateway + ?Sized> ModelComparator<'g, G> {
    pub fn new(runner: SuiteRunner<'g, G>) -> Self {
        Self { runner }
    }

    /// Run `suite_name` once per model, in order, and pick the most reliable model.
    ///
    /// Any failed suite run aborts the whole comparison.
    pub async fn compare(
        &self,
        suite_name: &str,
        models: &[String],
        run_count: usize,
        temperature: f64,
    ) -> Result<ComparisonReport> {
        let suite: Suite = suite_name.parse()?;
        validate_models(models)?;
        validate_run_parameters(run_count, temperature)?;

        let mut summaries: Vec<SuiteRunSummary> = Vec::with_capacity(models.len());
        for (index, model) in models.iter().enumerate() {
            info!(model = model.as_str(), "Running model {}/{}", index + 1, models.len());
            let summary = self
                .runner
                .run(suite_name, model, run_count, temperature, None)
                .await?;
            summaries.push(summary);
        }

        let ranking = rank_models(&summaries);
        let winner = ranking
            .first()
            .map(|entry| entry.model.clone())
            .ok_or_else(|| ReliabilityError::InvalidInput("no models to rank".to_string()))?;
        info!(%winner, "Comparison finished");

        let results_by_model: BTreeMap<String, SuiteRunSummary> = summaries
            .into_iter()
            .map(|summary| (summary.model.clone(), summary))
            .collect();

        Ok(ComparisonReport {
            suite,
            run_count,
            temperature,
            models: models.to_vec(),
            results_by_model,
            ranking,
            winner,
        })
    }
}

/// Order models by consistency (highest first), then by distinct responses (fewest first).
///
/// The sort is stable, so fully tied models keep their input order.
pub fn rank_models(summaries: &[SuiteRunSummary]) -> Vec<RankedModel> {
    let mut ranking: Vec<RankedModel> = summaries
        .iter()
        .map(|summary| RankedModel {
            model: summary.model.clone(),
            avg_consistency_pct: summary.overall.avg_consistency_pct,
            avg_unique_responses: summary.overall.avg_unique_responses,
        })
        .collect();

    ranking.sort_by(|a, b| {
        b.avg_consistency_pct
            .total_cmp(&a.avg_consistency_pct)
            .then(a.avg_unique_responses.total_cmp(&b.avg_unique_responses))
    });

    ranking
}

/// Split a comma-separated model list, dropping blank entries
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_models(models: &[String]) -> Result<()> {
    if models.is_empty() {
        return Err(ReliabilityError::InvalidInput(
            "at least one model is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for model in models {
        if !seen.insert(model.as_str()) {
            return Err(ReliabilityError::InvalidInput(format!(
                "model '{model}' is listed more than once"
            )));
        }
    }

    Ok(())
}
