mod config;
mod domain;
mod extract;
mod github;
mod report;
mod stats;
mod storage;

use std::{io, path::PathBuf};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use config::Settings;
use domain::PullRequest;
use github::{Collection, DateRange, FetchError, GitHubSearch};
use report::ReportError;
use stats::PullRequestStat;
use storage::DumpError;

#[derive(Parser)]
#[command(
    name = "merge-metrics",
    version,
    about = "Lead time and review latency of merged GitHub pull requests"
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every merged pull request, or every review, matching a query
    Log(LogArgs),
    /// Print summary statistics for a query or a saved JSON log
    Stat(StatArgs),
}

#[derive(Args)]
struct RangeArgs {
    /// Earliest merge date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = github::parse_date_bound)]
    start: Option<DateTime<Utc>>,

    /// Latest merge date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = github::parse_date_bound)]
    end: Option<DateTime<Utc>>,
}

impl From<&RangeArgs> for DateRange {
    fn from(args: &RangeArgs) -> Self {
        DateRange {
            start: args.start,
            end: args.end,
        }
    }
}

#[derive(Args)]
struct LogArgs {
    /// GitHub search qualifiers, e.g. `repo:owner/name`
    #[arg(long, short)]
    query: String,

    #[command(flatten)]
    range: RangeArgs,

    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    format: LogFormat,
}

#[derive(Args)]
struct StatArgs {
    /// GitHub search qualifiers; takes precedence over --input
    #[arg(long, short)]
    query: Option<String>,

    /// JSON file written by `log --format json`
    #[arg(long, short)]
    input: Option<PathBuf>,

    #[command(flatten)]
    range: RangeArgs,

    #[arg(long, value_enum, default_value_t = StatFormat::Tsv)]
    format: StatFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Pull requests as a JSON array
    Json,
    /// Reviews as a tab separated table
    Tsv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StatFormat {
    Tsv,
    Json,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Dump(#[from] DumpError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("Invalid task prefix: {0}")]
    InvalidTaskPrefix(#[from] regex::Error),
    #[error("You must specify either --query or --input")]
    MissingSource,
}

fn init_logger() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .init();
}

fn main() {
    init_logger();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CommandError> {
    match cli.command {
        Commands::Log(args) => log_command(&cli.settings, &args),
        Commands::Stat(args) => stat_command(&cli.settings, &args),
    }
}

fn log_command(settings: &Settings, args: &LogArgs) -> Result<(), CommandError> {
    let collection = collect(settings, &args.query, &DateRange::from(&args.range))?;

    let stdout = io::stdout().lock();
    match args.format {
        LogFormat::Json => report::write_pull_requests(stdout, &collection.pull_requests)?,
        LogFormat::Tsv => report::write_reviews(stdout, &collection.reviews)?,
    }
    Ok(())
}

fn stat_command(settings: &Settings, args: &StatArgs) -> Result<(), CommandError> {
    let prs = stat_source(settings, args)?;
    let stat = PullRequestStat::from_pull_requests(&prs);

    let stdout = io::stdout().lock();
    match args.format {
        StatFormat::Tsv => report::write_stat_table(stdout, &stat)?,
        StatFormat::Json => report::write_stat_json(stdout, &stat)?,
    }
    Ok(())
}

fn stat_source(settings: &Settings, args: &StatArgs) -> Result<Vec<PullRequest>, CommandError> {
    if let Some(query) = &args.query {
        let range = DateRange::from(&args.range);
        return Ok(collect(settings, query, &range)?.pull_requests);
    }
    if let Some(input) = &args.input {
        return Ok(storage::load_pull_requests(input)?);
    }
    Err(CommandError::MissingSource)
}

fn collect(settings: &Settings, query: &str, range: &DateRange) -> Result<Collection, CommandError> {
    let matcher = settings.task_matcher()?;
    let service = GitHubSearch::new(github::build_client()?, settings);
    Ok(github::collect_merged_pull_requests(
        &service, &matcher, query, range,
    )?)
}
