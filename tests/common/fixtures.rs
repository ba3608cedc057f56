use super::constants::*;
use songs_scraper::catalog_store::{
    Artist, Authorship, CatalogStore, PendingBatch, Song, SqliteCatalogStore, DEFAULT_BUSY_TIMEOUT,
};
use songs_scraper::config::PipelineSettings;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Open a catalog at `db_path` holding one under-scraped artist and one
/// scraped artist whose song still lacks lyrics.
pub fn create_seeded_catalog(db_path: &Path) -> Arc<SqliteCatalogStore> {
    let store = SqliteCatalogStore::new(db_path, 2, DEFAULT_BUSY_TIMEOUT).unwrap();
    store
        .apply_batch(&PendingBatch {
            artists: vec![
                Artist {
                    id: UNDER_SCRAPED_ARTIST_ID,
                    name: "Under Scraped".to_string(),
                    followers_count: 500,
                },
                Artist {
                    id: SCRAPED_ARTIST_ID,
                    name: "Scraped".to_string(),
                    followers_count: 60,
                },
            ],
            songs: vec![Song {
                id: SONG_WITHOUT_LYRICS_ID,
                title: "Old Song".to_string(),
                release_date: Some("1999".to_string()),
            }],
            authorships: vec![Authorship {
                song_id: SONG_WITHOUT_LYRICS_ID,
                artist_id: SCRAPED_ARTIST_ID,
            }],
            lyrics: vec![],
        })
        .unwrap();
    Arc::new(store)
}

pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        lyrics_workers: 2,
        queue_poll: Duration::from_millis(20),
        flush_interval: Duration::from_millis(50),
        status_interval: Duration::from_millis(100),
        seeder_join_timeout: Duration::from_secs(5),
        worker_join_timeout: Duration::from_secs(5),
        artist_pace: Duration::from_millis(1),
        song_pace: Duration::from_millis(1),
        lyrics_pace: Duration::from_millis(1),
        artist_id_min: ARTIST_ID_MIN,
        artist_id_max: ARTIST_ID_MAX,
        song_page_retry_step: Duration::from_millis(5),
        ..Default::default()
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}
