//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use signalwatch_core::manual::ManualSettings;
use signalwatch_core::news::NewsSettings;
use signalwatch_core::progress::ProgressReporter;
use signalwatch_feeds::{FetchTimeouts, HttpFetcher};
use signalwatch_shared::{
    AppConfig, ScanMode, ScanSettings, init_config, load_config, load_config_from,
};
use signalwatch_storage::DataStore;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SignalWatch: drug and device news signals for a tracked watchlist.
#[derive(Parser)]
#[command(
    name = "signalwatch",
    version,
    about = "Scan news feeds and watchlist pages for drug and device signals.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.signalwatch/signalwatch.toml).
    #[arg(long, global = true, env = "SIGNALWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
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
    /// Scan sources for new items and write the change report.
    Scan(ScanArgs),

    /// Collect feed items into the updates dataset.
    News {
        /// Lookback window in days.
        #[arg(long)]
        days: Option<u32>,

        /// Log failing sources at warn level.
        #[arg(long)]
        verbose_errors: bool,
    },

    /// Deduplicate the dataset into the weekly digest.
    Weekly,

    /// Refresh tracked-item cards from the dataset.
    Cards,

    /// Filter a hand-collected list of URLs.
    Manual(ManualArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ScanArgs {
    /// Lookback window in days.
    #[arg(long)]
    pub days: Option<u32>,

    /// Visit watchlist pages directly instead of search queries.
    #[arg(long)]
    pub direct_fetch: bool,

    /// Accept keyword matches without a tracked term.
    #[arg(long)]
    pub allow_keyword_only: bool,

    /// Do not relax matching during conference windows.
    #[arg(long)]
    pub no_conference_mode: bool,

    /// Log failing sources at warn level.
    #[arg(long)]
    pub verbose_errors: bool,

    /// Reject undated items.
    #[arg(long)]
    pub strict_date: bool,

    /// Maximum search queries per run.
    #[arg(long)]
    pub max_queries: Option<usize>,

    /// Media domains queried per run.
    #[arg(long)]
    pub media_per_run: Option<usize>,

    /// Tracked terms per search query.
    #[arg(long)]
    pub term_chunk: Option<usize>,

    /// Skip the site search when a direct fetch finds nothing.
    #[arg(long)]
    pub no_fallback: bool,
}

impl ScanArgs {
    /// Patch config-derived settings with command-line overrides.
    pub fn apply(&self, settings: &mut ScanSettings) {
        if let Some(days) = self.days {
            settings.days = days;
        }
        if self.direct_fetch {
            settings.mode = ScanMode::Direct;
        }
        settings.allow_keyword_only |= self.allow_keyword_only;
        settings.conference_mode &= !self.no_conference_mode;
        settings.verbose_errors |= self.verbose_errors;
        settings.strict_date |= self.strict_date;
        settings.fallback_search &= !self.no_fallback;
        if let Some(n) = self.max_queries {
            settings.max_queries = n;
        }
        if let Some(n) = self.media_per_run {
            settings.media_per_run = n;
        }
        if let Some(n) = self.term_chunk {
            settings.term_chunk = n;
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct ManualArgs {
    /// Input file with `title<TAB>url` or bare URL lines.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Report output path.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Fetch pages to read titles for bare URLs.
    #[arg(long)]
    pub fetch_missing_titles: bool,

    /// Lookback window in days.
    #[arg(long)]
    pub days: Option<u32>,

    /// Accept keyword matches without a tracked term.
    #[arg(long)]
    pub allow_keyword_only: bool,

    /// Do not relax matching during conference windows.
    #[arg(long)]
    pub no_conference_mode: bool,
}

impl ManualArgs {
    pub fn apply(&self, settings: &mut ManualSettings) {
        if let Some(days) = self.days {
            settings.days = days;
        }
        settings.allow_keyword_only |= self.allow_keyword_only;
        settings.conference_mode &= !self.no_conference_mode;
        settings.fetch_missing_titles |= self.fetch_missing_titles;
        settings.input_path = self.input.clone();
        settings.output_path = self.output.clone();
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
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
        0 => "signalwatch=info",
        1 => "signalwatch=debug",
        _ => "signalwatch=trace",
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
        Command::Scan(args) => cmd_scan(config_path, &args).await,
        Command::News {
            days,
            verbose_errors,
        } => cmd_news(config_path, days, verbose_errors).await,
        Command::Weekly => cmd_weekly(config_path),
        Command::Cards => cmd_cards(config_path),
        Command::Manual(args) => cmd_manual(config_path, &args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn http_fetcher(config: &AppConfig) -> Result<HttpFetcher> {
    Ok(HttpFetcher::new(FetchTimeouts::from(config))?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_scan(config_path: Option<&Path>, args: &ScanArgs) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut settings = ScanSettings::from(&config);
    args.apply(&mut settings);

    info!(mode = ?settings.mode, days = settings.days, "scanning sources");

    let store = DataStore::new(config.paths.clone());
    let fetcher = http_fetcher(&config)?;
    let reporter = CliProgress::new();
    let result =
        signalwatch_core::scan::scan(&store, &config, &settings, &fetcher, &reporter, Utc::now())
            .await?;

    println!();
    println!("  Scan complete!");
    println!("  Run:       {}", result.run_id);
    println!("  Sources:   {}", result.sources_scanned);
    println!("  Updated:   {}", result.sources_updated);
    println!("  Failed:    {}", result.sources_failed);
    println!("  New items: {}", result.new_items);
    println!("  Report:    {}", result.report_path.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_news(config_path: Option<&Path>, days: Option<u32>, verbose_errors: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut settings = NewsSettings::from(&config);
    if let Some(days) = days {
        settings.days = days;
    }
    settings.verbose_errors = verbose_errors;

    info!(days = settings.days, "collecting news");

    let store = DataStore::new(config.paths.clone());
    let fetcher = http_fetcher(&config)?;
    let reporter = CliProgress::new();
    let result = signalwatch_core::news::collect_news(
        &store,
        &config,
        &settings,
        &fetcher,
        &reporter,
        Utc::now(),
    )
    .await?;

    println!();
    println!("  News collected!");
    println!("  Sources: {}", result.sources_scanned);
    println!("  Failed:  {}", result.sources_failed);
    println!("  Added:   {}", result.rows_added);
    println!("  Total:   {}", result.rows_total);
    println!("  Time:    {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_weekly(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let store = DataStore::new(config.paths);
    let digest = signalwatch_core::dedup::update_weekly(&store)?;

    println!();
    println!("  Weekly digest updated!");
    for (category, rows) in &digest.categories {
        println!("  {:<22} {}", format!("{category}:"), rows.len());
    }
    println!("  {:<22} {}", "total:", digest.total());
    println!();

    Ok(())
}

fn cmd_cards(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let store = DataStore::new(config.paths);
    let updates = signalwatch_core::cards::update_cards(&store, Utc::now())?;

    println!();
    println!("  Cards updated: {}", updates.len());
    for update in &updates {
        println!("  {}: {}", update.item_id, update.latest_update);
    }
    println!();

    Ok(())
}

async fn cmd_manual(config_path: Option<&Path>, args: &ManualArgs) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut settings = ManualSettings::from(&config);
    args.apply(&mut settings);

    let store = DataStore::new(config.paths.clone());
    let fetcher = http_fetcher(&config)?;
    let reporter = CliProgress::new();
    let result = signalwatch_core::manual::manual_scan(
        &store,
        &config,
        &settings,
        &fetcher,
        &reporter,
        Utc::now(),
    )
    .await?;

    println!();
    println!("  Manual scan complete!");
    println!("  Links:   {}", result.lines);
    println!("  Matched: {}", result.accepted);
    println!("  Report:  {}", result.report_path.display());
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_started(&self, label: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {label}"));
    }

    fn done(&self, message: &str) {
        self.spinner.finish_with_message(message.to_string());
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
