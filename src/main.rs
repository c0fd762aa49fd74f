use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod catalog;
mod compare;
mod config;
mod error;
mod evaluation;
mod gateway;
mod models;
mod output;
mod report;
mod runner;

use crate::catalog::Suite;
use crate::compare::{ModelComparator, parse_model_list};
use crate::config::{Config, FailurePolicy};
use crate::gateway::{Credentials, OpenAiGateway};
use crate::output::OutputFormat;
use crate::report::ReportWriter;
use crate::runner::{OnResponse, SuiteRunner};

/// LLM Reliability Lab - Repeat prompts against models and measure how stable the answers are
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format: plain or json
    #[arg(short, long, global = true, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - log every gateway request
    #[arg(short, long, global = true)]
    verbose: bool,

    /// What to do when a repetition fails (overrides the config file)
    #[arg(long, global = true)]
    on_failure: Option<FailurePolicy>,

    /// Do not write a report file
    #[arg(long, global = true)]
    no_save: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single suite against one model
    Run(RunArgs),

    /// Compare a suite across multiple models
    Compare(CompareArgs),

    /// List the built-in suites and their test cases
    Suites,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, default_value = "confidence")]
    suite: Suite,

    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Repetitions per test case
    #[arg(long, default_value_t = 5)]
    runs: usize,

    #[arg(long, default_value_t = 0.7)]
    temperature: f64,
}

#[derive(Args, Debug)]
struct CompareArgs {
    #[arg(long, default_value = "math")]
    suite: Suite,

    /// Comma-separated model ids (e.g. gpt-4o-mini,gpt-4.1-mini)
    #[arg(long)]
    models: String,

    /// Repetitions per test case
    #[arg(long, default_value_t = 5)]
    runs: usize,

    #[arg(long, default_value_t = 0.7)]
    temperature: f64,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::Suites = cli.command {
        output::print_catalog();
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let policy = cli.on_failure.unwrap_or(config.failure_policy);

    crate::config::load_env_file(None)?;
    let credentials = Credentials::from_env(&config.env_var_api_key)?;
    let gateway = OpenAiGateway::new(&config, credentials);
    let runner = SuiteRunner::new(&gateway).with_policy(policy);
    let writer = ReportWriter::new(&config.output_dir);

    let saved = match cli.command {
        Command::Run(args) => {
            let mut progress = output::print_progress;
            let on_response: Option<OnResponse<'_>> = match cli.output {
                OutputFormat::Plain => Some(&mut progress),
                OutputFormat::Json => None,
            };

            let summary = runner
                .run(args.suite.as_str(), &args.model, args.runs, args.temperature, on_response)
                .await?;
            output::print_run_summary(&summary, cli.output);

            let name_hint = format!("{}_{}", summary.suite, summary.model);
            save_report(&writer, &summary, &name_hint, cli.no_save)?
        }
        Command::Compare(args) => {
            let models = parse_model_list(&args.models);
            let comparator = ModelComparator::new(runner);

            let report = comparator
                .compare(args.suite.as_str(), &models, args.runs, args.temperature)
                .await?;
            output::print_comparison(&report, cli.output);

            let name_hint = format!("compare_{}", report.suite);
            save_report(&writer, &report, &name_hint, cli.no_save)?
        }
        Command::Suites => None,
    };

    if let Some(path) = saved {
        info!(path = %path.display(), "Saved report");
    }

    Ok(())
}

fn save_report<T: serde::Serialize>(
    writer: &ReportWriter,
    payload: &T,
    name_hint: &str,
    no_save: bool,
) -> anyhow::Result<Option<PathBuf>> {
    if no_save {
        return Ok(None);
    }

    writer
        .write(payload, name_hint)
        .map(Some)
        .context("Failed to save report")
}
