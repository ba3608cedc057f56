use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub genius_token: Option<String>,
    pub api_base_url: Option<String>,
    pub api_timeout_secs: Option<u64>,
    pub api_min_interval_ms: Option<u64>,

    // Feature configs
    pub pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    // Queues and workers
    pub artist_queue_capacity: Option<usize>,
    pub song_queue_capacity: Option<usize>,
    pub lyrics_queue_capacity: Option<usize>,
    pub lyrics_workers: Option<usize>,
    pub queue_poll_ms: Option<u64>,
    // Buffer and lifecycle
    pub flush_interval_secs: Option<u64>,
    pub status_interval_secs: Option<u64>,
    pub seeder_join_timeout_secs: Option<u64>,
    pub worker_join_timeout_secs: Option<u64>,
    // Seeder
    pub artist_pace_ms: Option<u64>,
    pub song_pace_ms: Option<u64>,
    pub lyrics_pace_ms: Option<u64>,
    pub artist_id_min: Option<i64>,
    pub artist_id_max: Option<i64>,
    pub min_followers: Option<i64>,
    // Workers
    pub song_page_max_attempts: Option<u32>,
    pub song_page_retry_step_ms: Option<u64>,
    pub store_lyrics_errors: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
