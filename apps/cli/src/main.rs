//! Command-line front end: list candidate endpoints or run a ranking pass.
//!
//!   egress-cli list --country germany
//!   egress-cli run --concurrency 20 --limit 10 --format csv --output results.csv

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use egress::export::{to_csv, to_json};
use egress::ranker::sorted_by_rank;
use egress::{Config, EgressContext, Endpoint, RunRequest, RunSnapshot, RunSummary};
use tracing::info;

mod table;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Rank proxy egress points by latency
#[derive(Parser)]
#[command(name = "egress-cli", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/egress-rank/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate endpoints
    List {
        /// Only endpoints in this country (case-insensitive)
        #[arg(long)]
        country: Option<String>,
    },

    /// Probe endpoints and print them ranked by total time
    Run {
        /// Probes in flight at once (default from config)
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,

        /// Only endpoints in this country (case-insensitive)
        #[arg(long)]
        country: Option<String>,

        /// Probe at most this many endpoints
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Write output to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref()).context("loading configuration")?;
    let context = EgressContext::from_config(&config).context("building probe stack")?;

    match cli.command {
        Commands::List { country } => {
            let endpoints = select(context.directory.endpoints().await, country.as_deref(), None);
            print!("{}", table::endpoints(&endpoints));
        }
        Commands::Run { concurrency, country, limit, format, output } => {
            let endpoints = select(context.directory.endpoints().await, country.as_deref(), limit);
            if endpoints.is_empty() {
                bail!("no endpoints match the given filters");
            }

            let mut request = RunRequest::new(endpoints);
            request.concurrency_limit = concurrency;
            let snapshot = run(&context, request).await?;

            let rendered = render(&snapshot, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!("Results written to {}", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}

/// Submit the run and report progress until it completes
async fn run(context: &EgressContext, request: RunRequest) -> Result<RunSnapshot> {
    let run_id = context.runs.submit(request).await?;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut last_completed = None;

    loop {
        ticker.tick().await;
        let snapshot = context.runs.poll(run_id).await.context("run disappeared")?;
        let progress = snapshot.progress;

        if last_completed != Some(progress.completed) {
            info!(
                completed = progress.completed,
                total = progress.total,
                running = progress.running,
                failed = progress.failed,
                "Probing"
            );
            last_completed = Some(progress.completed);
        }

        if progress.is_complete() {
            return Ok(snapshot);
        }
    }
}

/// Country filter, then the first `limit` endpoints
fn select(endpoints: Vec<Endpoint>, country: Option<&str>, limit: Option<usize>) -> Vec<Endpoint> {
    let filtered = endpoints
        .into_iter()
        .filter(|e| country.is_none_or(|c| e.country.eq_ignore_ascii_case(c.trim())));

    match limit {
        Some(limit) => filtered.take(limit).collect(),
        None => filtered.collect(),
    }
}

fn render(snapshot: &RunSnapshot, format: OutputFormat) -> Result<String> {
    let ranked = sorted_by_rank(&snapshot.results);
    Ok(match format {
        OutputFormat::Table => {
            let summary = RunSummary::from_results(&snapshot.results);
            format!("{}{}", table::results(&ranked), table::summary(&summary))
        }
        OutputFormat::Csv => to_csv(&ranked),
        OutputFormat::Json => format!("{}\n", to_json(&ranked)?),
    })
}
