//! Startup scan of the catalog for work that is still missing.
//!
//! Every query selects only what is absent, so running the seeder again
//! after a partial run (or after failures recorded as placeholders were
//! cleaned up) picks up exactly the remaining work. This is how failed work
//! gets retried across runs.

use super::queue::WorkQueue;
use super::sleep_unless_cancelled;
use crate::catalog_store::CatalogStore;
use crate::config::PipelineSettings;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SeedError {
    /// The catalog holds an artist the ID scan cannot account for.
    #[error("Artist ID {id} is outside the scanned range [{min}, {max}]")]
    ArtistIdOutOfRange { id: i64, min: i64, max: i64 },

    #[error("Failed to read catalog: {0}")]
    Store(#[from] anyhow::Error),
}

/// How many IDs each scan enqueued.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub artists: usize,
    pub lyrics: usize,
    pub song_discovery: usize,
    /// Stopped early by cancellation or a closed queue.
    pub aborted: bool,
}

enum Feed {
    Completed(usize),
    Aborted(usize),
}

pub struct Seeder {
    store: Arc<dyn CatalogStore>,
    artist_queue: Arc<WorkQueue<i64>>,
    song_queue: Arc<WorkQueue<i64>>,
    lyrics_queue: Arc<WorkQueue<i64>>,
    settings: PipelineSettings,
}

impl Seeder {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        artist_queue: Arc<WorkQueue<i64>>,
        song_queue: Arc<WorkQueue<i64>>,
        lyrics_queue: Arc<WorkQueue<i64>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            artist_queue,
            song_queue,
            lyrics_queue,
            settings,
        }
    }

    /// Run the three scans in order: unseen artists, songs without lyrics,
    /// then artists whose songs were never discovered.
    pub fn run(&self, token: &CancellationToken) -> Result<SeedReport, SeedError> {
        let mut report = SeedReport::default();

        let unseen = self.unseen_artist_ids()?;
        info!("Seeding {} unseen artist IDs", unseen.len());
        match self.feed(&self.artist_queue, unseen, self.settings.artist_pace, token) {
            Feed::Completed(n) => report.artists = n,
            Feed::Aborted(n) => {
                report.artists = n;
                report.aborted = true;
                return Ok(report);
            }
        }

        let missing_lyrics = self.store.songs_missing_lyrics()?;
        info!("Seeding {} songs without lyrics", missing_lyrics.len());
        match self.feed(&self.lyrics_queue, missing_lyrics, self.settings.lyrics_pace, token) {
            Feed::Completed(n) => report.lyrics = n,
            Feed::Aborted(n) => {
                report.lyrics = n;
                report.aborted = true;
                return Ok(report);
            }
        }

        let mut under_scraped = self
            .store
            .under_scraped_artists(self.settings.min_followers)?;
        under_scraped.shuffle(&mut rand::rng());
        info!(
            "Seeding {} artists with at least {} followers and no songs",
            under_scraped.len(),
            self.settings.min_followers
        );
        match self.feed(&self.song_queue, under_scraped, self.settings.song_pace, token) {
            Feed::Completed(n) => report.song_discovery = n,
            Feed::Aborted(n) => {
                report.song_discovery = n;
                report.aborted = true;
            }
        }

        Ok(report)
    }

    /// IDs in the configured range with no artist row, in random order.
    pub fn unseen_artist_ids(&self) -> Result<Vec<i64>, SeedError> {
        let (min, max) = (self.settings.artist_id_min, self.settings.artist_id_max);
        let mut seen = vec![false; (max - min + 1) as usize];

        for id in self.store.existing_artist_ids()? {
            if id < min || id > max {
                return Err(SeedError::ArtistIdOutOfRange { id, min, max });
            }
            seen[(id - min) as usize] = true;
        }

        let mut unseen: Vec<i64> = seen
            .iter()
            .enumerate()
            .filter_map(|(offset, &was_seen)| (!was_seen).then_some(min + offset as i64))
            .collect();
        unseen.shuffle(&mut rand::rng());
        Ok(unseen)
    }

    fn feed(
        &self,
        queue: &WorkQueue<i64>,
        ids: Vec<i64>,
        pace: Duration,
        token: &CancellationToken,
    ) -> Feed {
        let mut fed = 0;
        for id in ids {
            if token.is_cancelled() {
                return Feed::Aborted(fed);
            }
            if let Err(e) = queue.put(id) {
                debug!("Seeding stopped: {}", e);
                return Feed::Aborted(fed);
            }
            fed += 1;
            if !sleep_unless_cancelled(token, pace) {
                return Feed::Aborted(fed);
            }
        }
        Feed::Completed(fed)
    }
}
