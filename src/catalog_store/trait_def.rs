//! Storage gateway abstraction.

use super::models::{CatalogCounts, PendingBatch};
use anyhow::Result;

/// Read and write access to the songs catalog.
///
/// Reads may be issued from any thread. Writes only happen through
/// [`CatalogStore::apply_batch`], which runs as a single transaction.
pub trait CatalogStore: Send + Sync {
    /// Write a batch atomically: artists, then songs, then lyrics updates,
    /// then authorships. Inserts ignore rows whose key already exists.
    ///
    /// On failure nothing from the batch is persisted and the error is
    /// returned as is. No retry happens here.
    fn apply_batch(&self, batch: &PendingBatch) -> Result<()>;

    /// IDs of every stored artist.
    fn existing_artist_ids(&self) -> Result<Vec<i64>>;

    /// Whether a song row exists for `song_id`.
    fn song_exists(&self, song_id: i64) -> Result<bool>;

    /// IDs of songs whose lyrics were never stored.
    fn songs_missing_lyrics(&self) -> Result<Vec<i64>>;

    /// Artists with at least `min_followers` followers and no authorship rows.
    fn under_scraped_artists(&self, min_followers: i64) -> Result<Vec<i64>>;

    fn counts(&self) -> Result<CatalogCounts>;
}
