use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use vigia::{
    annotate::RunAnalyzer,
    cli::{Cli, Command, DigestFormat, ReportFormat},
    config::Config,
    digest::{self, DigestPeriod},
    history::HistoryStore,
    ingest,
    model::format_timestamp,
};

/// Initialize tracing subscriber for diagnostic output on stderr
fn init_tracing(debug: bool, verbose: u8) {
    let level = if debug {
        Some(tracing::Level::TRACE)
    } else {
        match verbose {
            0 => None,
            1 => Some(tracing::Level::INFO),
            _ => Some(tracing::Level::DEBUG),
        }
    };

    match level {
        Some(level) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
            .with_writer(std::io::stderr)
            .init(),
        None if std::env::var_os("RUST_LOG").is_some() => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init(),
        None => {}
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_toml(path),
        None => Ok(Config::default()),
    }
}

/// Print to stdout, or write to `output` when given
fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("Failed to write output to {}", path.display())),
        None => {
            println!("{}", content.trim_end());
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_analyze(
    results: &Path,
    history: &Path,
    config: Option<&Path>,
    run_id: Option<String>,
    format: ReportFormat,
    output: Option<&Path>,
    no_save: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let results = ingest::load_results(results)
        .with_context(|| format!("Failed to load test results from {}", results.display()))?;

    let now = Utc::now();
    let timestamp = format_timestamp(now);
    let run_id = run_id.unwrap_or_else(|| format!("run-{}", now.timestamp_millis()));

    let mut store = HistoryStore::open(history, config.history.max_runs);
    let report = RunAnalyzer::new(&config).analyze_run(&results, &mut store, &run_id, &timestamp);

    if no_save {
        tracing::info!("--no-save given, history left untouched");
    } else if let Err(err) = store.save() {
        // Report output does not depend on the write
        tracing::warn!(error = %err, "failed to save history");
        eprintln!("warning: {err}");
    }

    let rendered = match format {
        ReportFormat::Text => report.to_text(),
        ReportFormat::Json => {
            serde_json::to_string_pretty(&report).context("Failed to serialize run report")?
        }
    };
    emit(&rendered, output)
}

fn run_digest(
    history: &Path,
    period: Option<DigestPeriod>,
    format: DigestFormat,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let period = period.unwrap_or(config.digest.period);
    let store = HistoryStore::open(history, config.history.max_runs);

    let digest = digest::generate(store.history(), period, Utc::now());
    let rendered = match format {
        DigestFormat::Markdown => digest.to_markdown(),
        DigestFormat::Text => digest.to_text(),
        DigestFormat::Json => {
            serde_json::to_string_pretty(&digest).context("Failed to serialize digest")?
        }
    };
    emit(&rendered, None)
}

fn run_convert(input: &Path, output: Option<&Path>) -> Result<()> {
    let converted = ingest::load_pytest_report(input)
        .with_context(|| format!("Failed to convert pytest report {}", input.display()))?;
    let json =
        serde_json::to_string_pretty(&converted).context("Failed to serialize converted results")?;
    emit(&json, output)
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug, args.verbose);

    match args.command {
        Command::Analyze {
            results,
            history,
            config,
            run_id,
            format,
            output,
            no_save,
        } => run_analyze(
            &results,
            &history,
            config.as_deref(),
            run_id,
            format,
            output.as_deref(),
            no_save,
        ),
        Command::Digest {
            history,
            period,
            format,
            config,
        } => run_digest(&history, period, format, config.as_deref()),
        Command::ConvertPytest { input, output } => run_convert(&input, output.as_deref()),
    }
}
