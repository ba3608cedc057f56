use anyhow::{Context, Result};
use clap::Parser;
use songs_scraper::catalog_store::{SqliteCatalogStore, DEFAULT_BUSY_TIMEOUT};
use songs_scraper::config::{AppConfig, CliConfig, FileConfig};
use songs_scraper::genius::{GeniusApi, GeniusClient, GENIUS_API_BASE};
use songs_scraper::ingest::Pipeline;
use songs_scraper::{metrics, CatalogStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Read connections kept open for the seeder and the song-discovery lookups.
const READ_POOL_SIZE: usize = 2;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite songs database file. Created when missing.
    #[clap(value_parser = parse_path, default_value = "songs.db")]
    pub db_path: PathBuf,

    /// Path to a TOML config file. Its values override the CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Genius API client access token.
    #[clap(long, env = "GENIUS_TOKEN", hide_env_values = true)]
    pub genius_token: Option<String>,

    /// Base URL of the Genius API.
    #[clap(long, default_value = GENIUS_API_BASE)]
    pub api_base_url: String,

    /// Timeout in seconds for each Genius request.
    #[clap(long, default_value_t = 10)]
    pub api_timeout_sec: u64,

    /// Minimum spacing in milliseconds between two Genius requests.
    #[clap(long, default_value_t = 0)]
    pub api_min_interval_ms: u64,

    /// Number of parallel lyrics workers.
    #[clap(long)]
    pub lyrics_workers: Option<usize>,

    /// Store the error text of failed lyrics fetches in the lyrics column.
    #[clap(long)]
    pub store_lyrics_errors: bool,
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config = CliConfig {
        db_path: cli_args.db_path,
        genius_token: cli_args.genius_token,
        api_base_url: cli_args.api_base_url,
        api_timeout_secs: cli_args.api_timeout_sec,
        api_min_interval_ms: cli_args.api_min_interval_ms,
        lyrics_workers: cli_args.lyrics_workers,
        store_lyrics_errors: cli_args.store_lyrics_errors,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Opening SQLite songs database at {:?}...", config.db_path);
    let store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogStore::new(
        &config.db_path,
        READ_POOL_SIZE,
        DEFAULT_BUSY_TIMEOUT,
    )?);

    let api: Arc<dyn GeniusApi> = Arc::new(GeniusClient::new(
        &config.api_base_url,
        &config.genius_token,
        config.api_timeout,
        config.api_min_interval,
    )?);

    let token = CancellationToken::new();
    let signal_token = token.clone();
    ctrlc::set_handler(move || {
        info!("Stop signal received, shutting down...");
        signal_token.cancel();
    })
    .context("Failed to install signal handler")?;

    let pipeline = Pipeline::new(store, api, config.pipeline);
    let report = pipeline.run(token)?;

    if !report.abandoned_threads.is_empty() {
        info!(
            "Threads still running at exit: {}",
            report.abandoned_threads.join(", ")
        );
    }
    if report.pending_records > 0 {
        anyhow::bail!(
            "{} records could not be written before exit",
            report.pending_records
        );
    }

    Ok(())
}
