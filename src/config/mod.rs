mod file_config;

pub use file_config::{FileConfig, PipelineConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Widest artist ID range a single run will scan. The seeder keeps one flag
/// per ID in memory.
pub const MAX_ARTIST_ID_SPAN: i64 = 10_000_000;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: PathBuf,
    pub genius_token: Option<String>,
    pub api_base_url: String,
    pub api_timeout_secs: u64,
    pub api_min_interval_ms: u64,
    pub lyrics_workers: Option<usize>,
    pub store_lyrics_errors: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("songs.db"),
            genius_token: None,
            api_base_url: crate::genius::GENIUS_API_BASE.to_string(),
            api_timeout_secs: 10,
            api_min_interval_ms: 0,
            lyrics_workers: None,
            store_lyrics_errors: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub genius_token: String,
    pub api_base_url: String,
    pub api_timeout: Duration,
    pub api_min_interval: Duration,

    pub pipeline: PipelineSettings,
}

/// Tunables of the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub artist_queue_capacity: usize,
    pub song_queue_capacity: usize,
    pub lyrics_queue_capacity: usize,
    pub lyrics_workers: usize,
    /// Longest a worker blocks on an empty queue before rechecking for shutdown.
    pub queue_poll: Duration,
    pub flush_interval: Duration,
    pub status_interval: Duration,
    pub seeder_join_timeout: Duration,
    pub worker_join_timeout: Duration,
    pub artist_pace: Duration,
    pub song_pace: Duration,
    pub lyrics_pace: Duration,
    /// Inclusive range of artist IDs the seeder walks.
    pub artist_id_min: i64,
    pub artist_id_max: i64,
    pub min_followers: i64,
    pub song_page_max_attempts: u32,
    pub song_page_retry_step: Duration,
    /// Persist the error text of a failed lyrics fetch in place of lyrics.
    pub store_lyrics_errors: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            artist_queue_capacity: 5,
            song_queue_capacity: 10,
            lyrics_queue_capacity: 100,
            lyrics_workers: 3,
            queue_poll: Duration::from_millis(500),
            flush_interval: Duration::from_secs(10),
            status_interval: Duration::from_secs(30),
            seeder_join_timeout: Duration::from_secs(60),
            worker_join_timeout: Duration::from_secs(30),
            artist_pace: Duration::from_millis(250),
            song_pace: Duration::from_millis(250),
            lyrics_pace: Duration::from_millis(100),
            artist_id_min: 1,
            artist_id_max: 79_999,
            min_followers: 50,
            song_page_max_attempts: 5,
            song_page_retry_step: Duration::from_secs(1),
            store_lyrics_errors: false,
        }
    }
}

impl PipelineSettings {
    fn merge(file: PipelineConfig, defaults: PipelineSettings) -> Self {
        let ms = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_millis).unwrap_or(default)
        };
        let secs = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_secs).unwrap_or(default)
        };

        Self {
            artist_queue_capacity: file
                .artist_queue_capacity
                .unwrap_or(defaults.artist_queue_capacity),
            song_queue_capacity: file
                .song_queue_capacity
                .unwrap_or(defaults.song_queue_capacity),
            lyrics_queue_capacity: file
                .lyrics_queue_capacity
                .unwrap_or(defaults.lyrics_queue_capacity),
            lyrics_workers: file.lyrics_workers.unwrap_or(defaults.lyrics_workers),
            queue_poll: ms(file.queue_poll_ms, defaults.queue_poll),
            flush_interval: secs(file.flush_interval_secs, defaults.flush_interval),
            status_interval: secs(file.status_interval_secs, defaults.status_interval),
            seeder_join_timeout: secs(file.seeder_join_timeout_secs, defaults.seeder_join_timeout),
            worker_join_timeout: secs(file.worker_join_timeout_secs, defaults.worker_join_timeout),
            artist_pace: ms(file.artist_pace_ms, defaults.artist_pace),
            song_pace: ms(file.song_pace_ms, defaults.song_pace),
            lyrics_pace: ms(file.lyrics_pace_ms, defaults.lyrics_pace),
            artist_id_min: file.artist_id_min.unwrap_or(defaults.artist_id_min),
            artist_id_max: file.artist_id_max.unwrap_or(defaults.artist_id_max),
            min_followers: file.min_followers.unwrap_or(defaults.min_followers),
            song_page_max_attempts: file
                .song_page_max_attempts
                .unwrap_or(defaults.song_page_max_attempts),
            song_page_retry_step: ms(file.song_page_retry_step_ms, defaults.song_page_retry_step),
            store_lyrics_errors: file
                .store_lyrics_errors
                .unwrap_or(defaults.store_lyrics_errors),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.artist_id_min < 1 || self.artist_id_min > self.artist_id_max {
            bail!(
                "Invalid artist ID range [{}, {}]",
                self.artist_id_min,
                self.artist_id_max
            );
        }
        if self.artist_id_max - self.artist_id_min >= MAX_ARTIST_ID_SPAN {
            bail!(
                "Artist ID range [{}, {}] is wider than {} IDs",
                self.artist_id_min,
                self.artist_id_max,
                MAX_ARTIST_ID_SPAN
            );
        }
        if self.lyrics_workers == 0 {
            bail!("lyrics_workers must be at least 1");
        }
        if self.artist_queue_capacity == 0
            || self.song_queue_capacity == 0
            || self.lyrics_queue_capacity == 0
        {
            bail!("Queue capacities must be greater than zero");
        }
        if self.song_page_max_attempts == 0 {
            bail!("song_page_max_attempts must be at least 1");
        }
        Ok(())
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.db_path.clone());

        // The database file may not exist yet, its directory must
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let genius_token = file
            .genius_token
            .or_else(|| cli.genius_token.clone())
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "genius_token must be specified via --genius-token, GENIUS_TOKEN or in config file"
                )
            })?;

        let api_base_url = file
            .api_base_url
            .unwrap_or_else(|| cli.api_base_url.clone());
        let api_timeout = Duration::from_secs(file.api_timeout_secs.unwrap_or(cli.api_timeout_secs));
        let api_min_interval =
            Duration::from_millis(file.api_min_interval_ms.unwrap_or(cli.api_min_interval_ms));

        // CLI flags act as defaults for the [pipeline] section
        let mut defaults = PipelineSettings::default();
        if let Some(workers) = cli.lyrics_workers {
            defaults.lyrics_workers = workers;
        }
        defaults.store_lyrics_errors = cli.store_lyrics_errors;

        let pipeline = PipelineSettings::merge(file.pipeline.unwrap_or_default(), defaults);
        pipeline.validate()?;

        Ok(AppConfig {
            db_path,
            genius_token,
            api_base_url,
            api_timeout,
            api_min_interval,
            pipeline,
        })
    }
}
