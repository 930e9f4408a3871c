//! Command line surface for the incident triage poller
//!
//! Subcommands:
//! - `run`: poll the sheet until Ctrl-C or a fatal error
//! - `once`: run a single cycle and print what it did
//! - `board`: print the per-department board of the current sheet
//! - `check`: validate config and secrets, then read the sheet once
//!
//! `main.rs` only parses arguments, sets up logging and the runtime, and
//! hands over to [`execute`].

#![warn(unreachable_pub)]

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use triage_core::observability::LogFormat;
use triage_core::{
    Board, ClassifierAdapter, ConfigError, CycleReport, LanguageModel, PollLoop, SheetStore,
    SheetSummary, TriageConfig, UpdateEngine,
};
use triage_openai::ChatCompletionsModel;
use triage_sheets::open_store;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "triage.toml";

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Poll until shutdown
    Run,
    /// One cycle
    Once,
    /// Print the board
    Board {
        /// Emit JSON instead of text
        json: bool,
    },
    /// Pre-flight check
    Check,
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Config file path
    pub config: PathBuf,
    /// Whether `--config` was given explicitly
    pub config_explicit: bool,
    /// Log output format
    pub log_format: LogFormat,
    /// Subcommand
    pub invocation: Invocation,
}

/// Build the clap command tree
#[must_use]
pub fn build_command() -> Command {
    Command::new("triage")
        .version(triage_core::VERSION)
        .about("Classify incident reports in a shared sheet and route them to departments")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .default_value(DEFAULT_CONFIG_PATH)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the TOML config file"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("pretty")
                .value_parser(|s: &str| s.parse::<LogFormat>())
                .help("Log output format: pretty or json"),
        )
        .subcommand(Command::new("run").about("Poll the sheet until interrupted"))
        .subcommand(Command::new("once").about("Run a single load, classify, merge cycle"))
        .subcommand(
            Command::new("board")
                .about("Print incidents grouped by department")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("check").about("Validate configuration and read the sheet once"))
}

impl CliArgs {
    /// Extract arguments from clap matches
    ///
    /// # Errors
    /// Returns an error if no known subcommand was given
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let config = matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let config_explicit = matches.value_source("config")
            == Some(clap::parser::ValueSource::CommandLine);
        let log_format = matches
            .get_one::<LogFormat>("log-format")
            .copied()
            .unwrap_or_default();

        let invocation = match matches.subcommand() {
            Some(("run", _)) => Invocation::Run,
            Some(("once", _)) => Invocation::Once,
            Some(("board", args)) => Invocation::Board {
                json: args.get_flag("json"),
            },
            Some(("check", _)) => Invocation::Check,
            Some((other, _)) => anyhow::bail!("unknown subcommand '{other}'"),
            None => anyhow::bail!("no subcommand given"),
        };

        Ok(Self {
            config,
            config_explicit,
            log_format,
            invocation,
        })
    }
}

/// Load and validate the config file
///
/// A missing file at the default path falls back to built-in defaults; a
/// missing file that was asked for explicitly is an error.
///
/// # Errors
/// Any `ConfigError` from reading, parsing or validation
pub fn load_config(path: &Path, explicit: bool) -> Result<TriageConfig, ConfigError> {
    if !explicit && !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        let config = TriageConfig::default();
        config.validate()?;
        return Ok(config);
    }
    TriageConfig::load(path)
}

/// Assemble a poll loop from already-built collaborators
#[must_use]
pub fn assemble(
    store: Arc<dyn SheetStore>,
    model: Arc<dyn LanguageModel>,
    config: &TriageConfig,
) -> PollLoop {
    let engine = UpdateEngine::new(ClassifierAdapter::new(model));
    PollLoop::from_config(store, engine, config)
}

/// Build the store and model named by the config and wire them into a loop
///
/// # Errors
/// Returns `ConfigError` if a secret is missing or a backend cannot be built
pub fn build_poll_loop(config: &TriageConfig) -> Result<PollLoop, ConfigError> {
    let store = open_store(&config.store)?;
    let model = ChatCompletionsModel::from_config(&config.model)?;
    tracing::info!(
        store = %store.describe(),
        model = %model.model(),
        endpoint = %model.endpoint(),
        "backends ready"
    );
    Ok(assemble(store, Arc::new(model), config))
}

/// One-line summary of a finished cycle
#[must_use]
pub fn format_cycle(report: &CycleReport) -> String {
    format!(
        "cycle {}: {} rows, {} classified, {} failed, {} malformed, {} written back in {}ms",
        report.cycle,
        report.rows,
        report.update.classified,
        report.update.failed,
        report.update.malformed,
        report.merge.rows_written,
        report.elapsed.as_millis()
    )
}

/// One-line summary of a pre-flight check
#[must_use]
pub fn format_summary(summary: &SheetSummary) -> String {
    let pending = summary.rows.saturating_sub(summary.processed);
    format!(
        "sheet ok: {} rows, {} processed, {} pending ({} without identity), {} output columns to create",
        summary.rows, summary.processed, pending, summary.missing_identity, summary.columns_to_create
    )
}

/// Render the board for the current contents of a store
///
/// # Errors
/// Store failures, or JSON encoding failure
pub async fn render_board(
    store: &dyn SheetStore,
    config: &TriageConfig,
    json: bool,
) -> anyhow::Result<String> {
    let table = store
        .load()
        .await
        .with_context(|| format!("loading {}", store.describe()))?;
    let board = Board::from_table(&table, &config.schema);
    if json {
        Ok(serde_json::to_string_pretty(&board)?)
    } else {
        Ok(board.render_text())
    }
}

/// Resolves when Ctrl-C is received
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C; stop the process to exit");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Carry out a parsed command line
///
/// # Errors
/// Config errors, fatal loop errors, and store failures in one-shot commands
pub async fn execute(cli: CliArgs) -> anyhow::Result<()> {
    let config = load_config(&cli.config, cli.config_explicit)
        .with_context(|| format!("config {}", cli.config.display()))?;

    match cli.invocation {
        Invocation::Run => {
            let mut poll = build_poll_loop(&config)?;
            let summary = poll.preflight().await.context("pre-flight check")?;
            tracing::info!(
                rows = summary.rows,
                processed = summary.processed,
                interval_secs = config.schedule.poll_interval_secs,
                "starting poll loop"
            );
            poll.run(shutdown_signal()).await?;
            tracing::info!(cycles = poll.cycles(), "poll loop stopped");
        }
        Invocation::Once => {
            let mut poll = build_poll_loop(&config)?;
            let report = poll.run_cycle().await?;
            println!("{}", format_cycle(&report));
        }
        Invocation::Board { json } => {
            let store = open_store(&config.store)?;
            println!("{}", render_board(store.as_ref(), &config, json).await?);
        }
        Invocation::Check => {
            let poll = build_poll_loop(&config)?;
            let summary = poll.preflight().await?;
            println!("{}", format_summary(&summary));
        }
    }
    Ok(())
}
