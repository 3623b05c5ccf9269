//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sheetsync_core::{AssetFailure, ProgressReporter, SyncReport};
use sheetsync_shared::{
    AppConfig, CONFIG_FILE_NAME, MissingStorePolicy, RecordKey, SyncConfig, init_config_at,
    load_config,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SheetSync — append new spreadsheet rows to a JSON record store.
#[derive(Parser)]
#[command(
    name = "sheetsync",
    version,
    about = "Sync new rows of a published spreadsheet into a local JSON store, with their audio and image assets.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./sheetsync.toml, then ~/.sheetsync/sheetsync.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Defaults to `sync`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch the spreadsheet and append rows not yet in the store.
    Sync(SyncArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for a single sync run.
#[derive(Args, Default)]
pub(crate) struct SyncArgs {
    /// CSV export URL (overrides `[source] url`).
    #[arg(long)]
    pub source_url: Option<String>,

    /// Project root holding the store and asset directories (defaults to cwd).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Fail instead of starting empty when the store file is missing.
    #[arg(long)]
    pub strict_store: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init {
        /// Where to write it (defaults to ./sheetsync.toml).
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sheetsync=info",
        1 => "sheetsync=debug",
        _ => "sheetsync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        None => cmd_sync(config_path, SyncArgs::default()).await,
        Some(Command::Sync(args)) => cmd_sync(config_path, args).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Init { path } => cmd_config_init(path.as_deref()),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Merge the config file with command-line overrides.
fn resolve_sync_config(app: &AppConfig, args: &SyncArgs) -> Result<SyncConfig> {
    let mut config = SyncConfig::from(app);

    config.root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}"))?,
    };
    if let Some(url) = &args.source_url {
        config.source_url = url.clone();
    }
    if args.strict_store {
        config.missing_store = MissingStorePolicy::Fail;
    }

    Ok(config)
}

async fn cmd_sync(config_path: Option<&Path>, args: SyncArgs) -> Result<()> {
    let app = load_config(config_path)?;
    let config = resolve_sync_config(&app, &args)?;

    info!(
        source = %config.source_url,
        root = %config.root.display(),
        "starting sync"
    );

    let reporter = CliProgress::new();
    let report = sheetsync_core::sync(&config, &reporter).await;
    reporter.spinner.finish_and_clear();
    let report = report?;

    println!();
    if report.added == 0 {
        println!("  No new entries to add.");
    } else {
        println!(
            "  Added {} new entries to {}.",
            report.added,
            config.store_file().display()
        );
    }
    println!("  Rows:     {}", report.rows_seen);
    println!("  Existing: {}", report.skipped_existing);
    if report.skipped_duplicate > 0 {
        println!("  Repeated: {}", report.skipped_duplicate);
    }
    println!("  Assets:   {} downloaded", report.assets_fetched);
    if !report.asset_failures.is_empty() {
        println!("  Failed:   {}", report.asset_failures.len());
        for failure in &report.asset_failures {
            println!(
                "    - {} [{}] {}: {}",
                failure.key, failure.kind, failure.url, failure.error
            );
        }
    }
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(Path::new(CONFIG_FILE_NAME));
    init_config_at(path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn row_added(&self, key: &RecordKey, added_so_far: usize) {
        self.spinner
            .set_message(format!("Added [{added_so_far}] {key}"));
    }

    fn asset_failed(&self, failure: &AssetFailure) {
        self.spinner.println(format!(
            "  ✗ {} {}: {}",
            failure.key, failure.kind, failure.error
        ));
    }

    fn done(&self, _report: &SyncReport) {
        self.spinner.finish_and_clear();
    }
}
