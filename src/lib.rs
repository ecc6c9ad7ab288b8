pub mod config;
pub mod corpus;
pub mod error;
pub mod indexer;
pub mod model;
pub mod search;
pub mod storage;

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::indexer::{IndexBuilder, IngestOptions, IngestionReport, StopReason};
use crate::search::related::RelatedStrategy;
use crate::search::{SearchOptions, SearchOutcome, SearchPipeline};
use crate::storage::sqlite::SqliteStorage;

/// Widths of the rules printed after each result and each related entry.
const RESULT_RULE_WIDTH: usize = 50;
const RELATED_RULE_WIDTH: usize = 30;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mailsearch",
    version,
    about = "Keyword search over an email corpus",
    long_about = "Build an inverted index over an email corpus once, then run boolean \
                  keyword searches against it with misspelling tolerance and related-message \
                  suggestions."
)]
pub struct Cli {
    /// SQLite index file (overrides `db_path` from the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Index a CSV export (`file,message` columns) or a directory of raw messages
    Index {
        /// CSV file or directory to ingest
        source: PathBuf,

        /// Stop cleanly after this many minutes
        #[arg(long, value_name = "MINUTES", value_parser = parse_minutes)]
        time: Option<f64>,

        /// Stop after processing this many records (0 = unlimited)
        #[arg(long, value_name = "N")]
        max_records: Option<u64>,

        /// Records committed per transaction
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        batch_size: Option<u64>,

        /// Delete the existing index before ingesting
        #[arg(long)]
        fresh: bool,
    },
    /// Run a boolean keyword search (`a and b`, `a or b`, or plain words)
    Search {
        /// Query words, joined with single spaces
        #[arg(required = true, num_args = 1.., value_name = "QUERY")]
        query: Vec<String>,

        /// Ranked results to show
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        limit: Option<u64>,

        /// Related-message strategy
        #[arg(long, value_enum)]
        related: Option<RelatedStrategy>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_minutes(raw: &str) -> std::result::Result<f64, String> {
    let minutes: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of minutes"))?;
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(format!("`{raw}` must be a positive number of minutes"));
    }
    Ok(minutes)
}

/// Structured failure handed back to `main`, which owns the exit code.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    pub code: i32,
    pub kind: &'static str,
    pub message: String,
    pub hint: Option<String>,
    pub retryable: bool,
}

impl CliError {
    fn usage(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            code: 1,
            kind: "usage",
            message: message.into(),
            hint,
            retryable: false,
        }
    }

    /// `--help` / `--version` output; `main` prints it to stdout and exits 0.
    fn info(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            kind: "info",
            message: message.into(),
            hint: None,
            retryable: false,
        }
    }

    fn from_anyhow(err: &anyhow::Error) -> Self {
        let (kind, hint) = if let Some(inner) = err.downcast_ref::<error::Error>() {
            let hint = matches!(inner, error::Error::MissingIndex(_))
                .then(|| "run `mailsearch index <SOURCE>` to build the index".to_string());
            (inner.kind(), hint)
        } else if err.downcast_ref::<config::ConfigError>().is_some() {
            ("config", None)
        } else {
            ("internal", None)
        };
        Self {
            code: 1,
            kind,
            message: format!("{err:#}"),
            hint,
            retryable: false,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\nhint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CliError {}

#[derive(Debug, Clone)]
pub struct ParsedCli {
    pub cli: Cli,
}

/// Parse raw argv (program name first) into a [`ParsedCli`].
///
/// clap's own usage exit code is remapped to 1.
pub fn parse_cli(raw_args: Vec<String>) -> std::result::Result<ParsedCli, CliError> {
    match Cli::try_parse_from(raw_args) {
        Ok(cli) => Ok(ParsedCli { cli }),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                Err(CliError::info(err.render().to_string()))
            }
            _ => Err(CliError::usage(
                err.render().to_string(),
                Some("run `mailsearch --help` for usage".to_string()),
            )),
        },
    }
}

/// Run a parsed invocation.
pub fn run_with_parsed(parsed: ParsedCli) -> std::result::Result<(), CliError> {
    let cli = parsed.cli;
    init_tracing(cli.verbose);

    let result = load_config(&cli).and_then(|config| match &cli.command {
        Commands::Index {
            source,
            time,
            max_records,
            batch_size,
            fresh,
        } => run_index(&config, source, *time, *max_records, *batch_size, *fresh),
        Commands::Search {
            query,
            limit,
            related,
            json,
        } => run_search(&config, &query.join(" "), *limit, *related, *json),
    });
    result.map_err(|err| CliError::from_anyhow(&err))
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).with_context(|| {
        format!(
            "loading config {}",
            cli.config
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    Ok(config)
}

fn run_index(
    config: &Config,
    source: &Path,
    time: Option<f64>,
    max_records: Option<u64>,
    batch_size: Option<u64>,
    fresh: bool,
) -> Result<()> {
    let db_path = &config.db_path;
    if fresh
        && SqliteStorage::remove_database(db_path)
            .with_context(|| format!("removing {}", db_path.display()))?
    {
        println!("Deleted existing database");
    }

    let mut options = IngestOptions::from_config(&config.index);
    if let Some(max) = max_records {
        options.max_records = (max > 0).then_some(max);
    }
    if let Some(size) = batch_size {
        options.batch_size = usize::try_from(size).unwrap_or(usize::MAX);
    }
    options.time_budget = time.and_then(|minutes| Duration::try_from_secs_f64(minutes * 60.0).ok());

    let store = SqliteStorage::open(db_path)
        .with_context(|| format!("opening index {}", db_path.display()))?;
    let records = corpus::open_source(source)
        .with_context(|| format!("opening corpus {}", source.display()))?;

    println!("Indexing from: {}", source.display());
    info!(
        source = %source.display(),
        db = %db_path.display(),
        batch_size = options.batch_size,
        max_records = ?options.max_records,
        time_budget = ?options.time_budget,
        "Starting ingestion"
    );

    let spinner = ProgressBar::new_spinner();
    if std::io::stderr().is_terminal() {
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message("Indexing...");
        spinner.enable_steady_tick(Duration::from_millis(120));
    } else {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
    }

    let report = IndexBuilder::new(&store, options).ingest(records, |progress| {
        spinner.suspend(|| {
            println!(
                "Processed {} records, skipped {}",
                progress.processed, progress.skipped
            );
        });
        spinner.set_message(format!("{} records indexed", progress.processed));
    });
    spinner.finish_and_clear();
    let report = report.with_context(|| format!("indexing into {}", db_path.display()))?;

    print!("{}", render_index_summary(&report));
    Ok(())
}

fn render_index_summary(report: &IngestionReport) -> String {
    let mut out = String::new();
    match report.stopped {
        StopReason::Exhausted => {}
        StopReason::TimeBudget => {
            let _ = writeln!(out, "Time budget reached; the index holds a partial corpus.");
        }
        StopReason::RecordLimit => {
            let _ = writeln!(out, "Record limit reached; the index holds a partial corpus.");
        }
    }
    let _ = writeln!(
        out,
        "Indexing complete. Processed {} records, skipped {}.",
        report.processed, report.skipped
    );
    if report.duplicates > 0 || report.malformed > 0 {
        let _ = writeln!(
            out,
            "New documents: {}, duplicates: {}, malformed records: {}",
            report.inserted, report.duplicates, report.malformed
        );
    }
    let _ = writeln!(
        out,
        "Time elapsed: {:.1} minutes ({:.0} records/sec)",
        report.elapsed.as_secs_f64() / 60.0,
        report.records_per_sec()
    );
    out
}

fn run_search(
    config: &Config,
    raw_query: &str,
    limit: Option<u64>,
    related: Option<RelatedStrategy>,
    json: bool,
) -> Result<()> {
    let mut options = SearchOptions::from_config(&config.search, &config.fuzzy);
    if let Some(limit) = limit {
        options.limit = usize::try_from(limit).unwrap_or(usize::MAX);
    }
    if let Some(strategy) = related {
        options.related = strategy;
    }

    let store = SqliteStorage::open_read_only(&config.db_path)?;
    let outcome = SearchPipeline::new(&store, &options).run(raw_query)?;

    if json {
        let payload =
            serde_json::to_string_pretty(&outcome).context("serializing search outcome")?;
        println!("{payload}");
    } else {
        if outcome.query.is_empty() {
            warn!(raw_query, "Query has no terms longer than two characters");
        }
        print!("{}", render_outcome(&outcome, config.search.related_limit));
    }
    Ok(())
}

/// Human-readable rendering of a search outcome.
pub fn render_outcome(outcome: &SearchOutcome, related_limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Searching for: {}", outcome.query.describe());

    if let Some(expanded) = &outcome.expanded_terms {
        let _ = writeln!(out, "No exact matches found. Trying misspelling tolerance...");
        if !expanded.is_empty() {
            let _ = writeln!(out, "Expanded to: {}", expanded.join(", "));
        }
    }

    if outcome.is_empty() {
        let _ = writeln!(out, "No results found.");
        return out;
    }

    let _ = writeln!(out, "Found {} results:\n", outcome.total_matches);
    for hit in &outcome.hits {
        let _ = writeln!(out, "Score: {:.2}", hit.score as f64);
        let _ = writeln!(out, "From: {}", hit.document.sender);
        let _ = writeln!(out, "Subject: {}", hit.document.subject);
        let _ = writeln!(out, "File: {}", hit.document.file_name());
        let _ = writeln!(out, "Snippet: {}", hit.snippet);
        let _ = writeln!(out, "{}", "-".repeat(RESULT_RULE_WIDTH));
    }

    if outcome.total_matches >= search::related::MIN_RESULTS_FOR_RELATED {
        let _ = writeln!(
            out,
            "\n=== RELATED EMAILS ({}) ===",
            outcome.related_strategy.label()
        );
        let _ = writeln!(out, "Found {} related emails", outcome.related.len());
        for hit in outcome.related.iter().take(related_limit) {
            let _ = writeln!(out, "From: {}", hit.document.sender);
            let _ = writeln!(out, "Subject: {}", hit.document.subject);
            let _ = writeln!(out, "File: {}", hit.document.file_name());
            let _ = writeln!(out, "{}", "-".repeat(RELATED_RULE_WIDTH));
        }
    }
    out
}
