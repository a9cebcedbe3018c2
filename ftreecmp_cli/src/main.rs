mod render;

use anyhow::Context;
use clap::Parser;
use ftreecmp_common::{load_config, AppConfig, IgnoreRule};
use ftreecmp_core::{ChangeLog, CompareOptions, CompareOutcome, TreeComparator};
use render::{build_json_report, TextReporter};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ftreecmp")]
#[command(author = "ftreecmp Contributors")]
#[command(version)]
#[command(about = "Report file-level changes between two directory trees", long_about = None)]
struct Cli {
    /// Old tree
    old: PathBuf,

    /// New tree
    new: PathBuf,

    /// Label printed in the report header
    #[arg(short = 'N', long = "name")]
    name: Option<String>,

    /// Content ignore rule (can be specified multiple times)
    #[arg(short, long, value_name = "RULE")]
    ignore: Vec<IgnoreRule>,

    /// Trace the comparison on stderr
    #[arg(short, long)]
    debug: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Configuration file to use instead of the per-user one
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn log_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("warn,ftreecmp_core=debug,ftreecmp=debug")
        } else {
            EnvFilter::new("warn")
        }
    })
}

fn main() {
    let cli = Cli::parse();

    // Log to stderr so the report on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(cli.debug))
        .init();

    match run(cli) {
        Ok(outcome) if outcome.is_success() => {}
        Ok(outcome) => {
            error!("{} error(s) while comparing trees", outcome.errors.len());
            std::process::exit(1);
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Merge command-line settings over the configuration file
fn effective_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let loaded = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    match (&loaded.path, loaded.exists) {
        (Some(path), true) => debug!("Using configuration {}", path.display()),
        _ => debug!("No configuration file, using defaults"),
    }

    let mut config = loaded.config;
    for rule in &cli.ignore {
        if !config.ignores(*rule) {
            config.ignore.push(*rule);
        }
    }
    if let Some(name) = &cli.name {
        config.package_name = Some(name.clone());
    }
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<CompareOutcome> {
    let config = effective_config(&cli)?;
    let options = CompareOptions::from_config(&config);

    info!("Comparing {} with {}", cli.old.display(), cli.new.display());

    if cli.json {
        return run_json(&cli.old, &cli.new, options, config.package_name.as_deref());
    }

    let out = BufWriter::new(io::stdout());
    let mut comparator = TreeComparator::new(options, TextReporter::new(out, config.package_name));
    let outcome = comparator.compare_trees(&cli.old, &cli.new);
    comparator
        .into_reporter()
        .finish()
        .context("failed to write report")?;
    Ok(outcome)
}

fn run_json(
    old: &Path,
    new: &Path,
    options: CompareOptions,
    label: Option<&str>,
) -> anyhow::Result<CompareOutcome> {
    let mut comparator = TreeComparator::new(options, ChangeLog::new());
    let outcome = comparator.compare_trees(old, new);
    let log = comparator.into_reporter();

    let report = build_json_report(label, old, new, log.changes(), &outcome.errors);
    let output = serde_json::to_string_pretty(&report)?;
    println!("{output}");
    Ok(outcome)
}
