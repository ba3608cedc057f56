//! Write-behind buffer between the workers and the catalog store.
//!
//! Workers hand records over through [`RecordSink`] and move on. The buffer
//! keeps them in memory and commits them in one transaction per flush. A
//! failed flush puts the batch back in front of whatever arrived meanwhile,
//! so nothing kept is ever dropped.

use super::sleep_unless_cancelled;
use crate::catalog_store::{Artist, Authorship, CatalogStore, LyricsUpdate, PendingBatch, Song};
use crate::metrics;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where workers deposit the records they produce.
pub trait RecordSink: Send + Sync {
    fn keep_artist(&self, artist: Artist);
    fn keep_song(&self, song: Song);
    fn keep_authorship(&self, authorship: Authorship);
    fn keep_lyrics(&self, song_id: i64, lyrics: String);
}

#[derive(Debug, Error)]
pub enum FlushError {
    /// The batch was rolled back and requeued; a later flush retries it.
    #[error("Flush of {records} records failed and was requeued: {source}")]
    Storage {
        records: usize,
        #[source]
        source: anyhow::Error,
    },
}

pub struct WriteBehindBuffer {
    pending: Mutex<PendingBatch>,
    flush_lock: Mutex<()>,
    store: Arc<dyn CatalogStore>,
}

impl WriteBehindBuffer {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            pending: Mutex::new(PendingBatch::default()),
            flush_lock: Mutex::new(()),
            store,
        }
    }

    /// Commit everything kept so far. Returns the number of records written,
    /// zero when there was nothing to write.
    pub fn flush(&self) -> Result<usize, FlushError> {
        let _flight = self.flush_lock.lock().unwrap();

        let snapshot = std::mem::take(&mut *self.pending.lock().unwrap());
        if snapshot.is_empty() {
            return Ok(0);
        }
        let records = snapshot.len();

        match self.store.apply_batch(&snapshot) {
            Ok(()) => {
                metrics::record_flush(
                    snapshot.artists.len(),
                    snapshot.songs.len(),
                    snapshot.authorships.len(),
                    snapshot.lyrics.len(),
                );
                info!(
                    "Flushed {} records: {} artists, {} songs, {} authorships, {} lyrics",
                    records,
                    snapshot.artists.len(),
                    snapshot.songs.len(),
                    snapshot.authorships.len(),
                    snapshot.lyrics.len()
                );
                Ok(records)
            }
            Err(source) => {
                self.pending.lock().unwrap().prepend(snapshot);
                metrics::record_flush_failure();
                Err(FlushError::Storage { records, source })
            }
        }
    }

    /// Flush every `interval` until `token` is cancelled. Failures are
    /// logged and retried on the next tick.
    pub fn run_periodic_flush(&self, interval: Duration, token: &CancellationToken) {
        debug!("Periodic flush every {:?}", interval);
        while sleep_unless_cancelled(token, interval) {
            if let Err(e) = self.flush() {
                warn!("{}", e);
            }
        }
        debug!("Periodic flush loop stopped");
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    #[cfg(test)]
    pub fn pending_snapshot(&self) -> PendingBatch {
        self.pending.lock().unwrap().clone()
    }
}

impl RecordSink for WriteBehindBuffer {
    fn keep_artist(&self, artist: Artist) {
        self.pending.lock().unwrap().artists.push(artist);
    }

    fn keep_song(&self, song: Song) {
        self.pending.lock().unwrap().songs.push(song);
    }

    fn keep_authorship(&self, authorship: Authorship) {
        self.pending.lock().unwrap().authorships.push(authorship);
    }

    fn keep_lyrics(&self, song_id: i64, lyrics: String) {
        self.pending
            .lock()
            .unwrap()
            .lyrics
            .push(LyricsUpdate { song_id, lyrics });
    }
}
