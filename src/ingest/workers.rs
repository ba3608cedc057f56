//! Stage workers. Each one drains a single queue until cancellation or the
//! queue is closed, calls the Genius API and hands the results to the
//! write-behind buffer.

use super::queue::{Dequeued, QueueClosed, WorkQueue};
use super::sleep_unless_cancelled;
use super::write_buffer::RecordSink;
use crate::catalog_store::{Artist, Authorship, CatalogStore};
use crate::genius::{GeniusApi, GeniusSong, SongsPage};
use crate::metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pull items from `queue` and hand each to `handle`, acknowledging it
/// afterwards. Stops on cancellation, on a closed queue, or when `handle`
/// reports that a downstream queue was closed. An item that arrives after
/// cancellation is acknowledged without being handled.
fn drain_queue<F>(queue: &WorkQueue<i64>, poll: Duration, token: &CancellationToken, mut handle: F)
where
    F: FnMut(i64) -> Result<(), QueueClosed>,
{
    while !token.is_cancelled() {
        match queue.get(poll) {
            Dequeued::Item(id) => {
                if token.is_cancelled() {
                    queue.task_done();
                    break;
                }
                let outcome = handle(id);
                queue.task_done();
                if let Err(e) = outcome {
                    debug!("Stopping {} worker: {}", queue.name(), e);
                    break;
                }
            }
            Dequeued::Empty => continue,
            Dequeued::Closed => break,
        }
    }
}

pub struct ArtistWorker {
    api: Arc<dyn GeniusApi>,
    queue: Arc<WorkQueue<i64>>,
    sink: Arc<dyn RecordSink>,
    poll: Duration,
}

impl ArtistWorker {
    pub fn new(
        api: Arc<dyn GeniusApi>,
        queue: Arc<WorkQueue<i64>>,
        sink: Arc<dyn RecordSink>,
        poll: Duration,
    ) -> Self {
        Self {
            api,
            queue,
            sink,
            poll,
        }
    }

    pub fn run(&self, token: &CancellationToken) {
        info!("Artist worker started");
        drain_queue(&self.queue, self.poll, token, |artist_id| {
            self.process(artist_id);
            Ok(())
        });
        info!("Artist worker stopped");
    }

    /// Fetch one artist. A failed fetch is kept as a placeholder so the ID is
    /// not scanned again.
    pub fn process(&self, artist_id: i64) {
        let artist = match self.api.fetch_artist(artist_id) {
            Ok(artist) => {
                debug!("Fetched artist {} ({})", artist.id, artist.name);
                artist
            }
            Err(e) => {
                metrics::record_api_failure(e.endpoint());
                warn!("Failed to fetch artist {}: {}", artist_id, e);
                Artist::fetch_failed(artist_id, e.label())
            }
        };
        self.sink.keep_artist(artist);
    }
}

pub struct SongDiscoveryWorker {
    api: Arc<dyn GeniusApi>,
    store: Arc<dyn CatalogStore>,
    queue: Arc<WorkQueue<i64>>,
    lyrics_queue: Arc<WorkQueue<i64>>,
    sink: Arc<dyn RecordSink>,
    poll: Duration,
    max_attempts: u32,
    retry_step: Duration,
}

impl SongDiscoveryWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn GeniusApi>,
        store: Arc<dyn CatalogStore>,
        queue: Arc<WorkQueue<i64>>,
        lyrics_queue: Arc<WorkQueue<i64>>,
        sink: Arc<dyn RecordSink>,
        poll: Duration,
        max_attempts: u32,
        retry_step: Duration,
    ) -> Self {
        Self {
            api,
            store,
            queue,
            lyrics_queue,
            sink,
            poll,
            max_attempts,
            retry_step,
        }
    }

    pub fn run(&self, token: &CancellationToken) {
        info!("Song discovery worker started");
        drain_queue(&self.queue, self.poll, token, |artist_id| {
            self.process(artist_id, token)
        });
        info!("Song discovery worker stopped");
    }

    /// Walk every page of an artist's songs, then keep new songs and every
    /// authorship and queue each song for lyrics. Nothing is kept unless the
    /// last page was reached, so an artist left half-discovered is still
    /// picked up by a later seeding pass.
    pub fn process(&self, artist_id: i64, token: &CancellationToken) -> Result<(), QueueClosed> {
        let Some(songs) = self.fetch_all_pages(artist_id, token) else {
            return Ok(());
        };

        for genius_song in &songs {
            let exists = self.store.song_exists(genius_song.id).unwrap_or_else(|e| {
                warn!("Failed to look up song {}: {:#}", genius_song.id, e);
                false
            });
            if !exists {
                self.sink.keep_song(genius_song.to_catalog_song());
            }
            self.sink.keep_authorship(Authorship {
                song_id: genius_song.id,
                artist_id,
            });
        }
        for genius_song in &songs {
            self.lyrics_queue.put(genius_song.id)?;
        }

        debug!("Discovered {} songs for artist {}", songs.len(), artist_id);
        Ok(())
    }

    /// Every song of an artist across all pages, or `None` when a page could
    /// not be fetched or the walk was cancelled before the last page.
    fn fetch_all_pages(&self, artist_id: i64, token: &CancellationToken) -> Option<Vec<GeniusSong>> {
        let mut songs = Vec::new();
        let mut page = 1;

        loop {
            let songs_page = self.fetch_page(artist_id, page, token)?;
            songs.extend(songs_page.songs);

            match songs_page.next_page {
                None => return Some(songs),
                Some(_) if token.is_cancelled() => {
                    debug!(
                        "Cancelled while walking songs of artist {} at page {}",
                        artist_id, page
                    );
                    return None;
                }
                Some(next) => page = next,
            }
        }
    }

    /// Fetch one page, retrying with a linearly growing pause. `None` when
    /// every attempt failed or the wait was cancelled.
    fn fetch_page(&self, artist_id: i64, page: u32, token: &CancellationToken) -> Option<SongsPage> {
        for attempt in 1..=self.max_attempts {
            match self.api.fetch_artist_songs(artist_id, page) {
                Ok(songs_page) => return Some(songs_page),
                Err(e) => {
                    metrics::record_api_failure(e.endpoint());
                    warn!(
                        "Failed to fetch page {} of artist {} songs (attempt {}/{}): {}",
                        page, artist_id, attempt, self.max_attempts, e
                    );
                }
            }
            if attempt < self.max_attempts && !sleep_unless_cancelled(token, self.retry_step * attempt) {
                return None;
            }
        }
        warn!("Giving up on songs of artist {} at page {}", artist_id, page);
        None
    }
}

pub struct LyricsWorker {
    api: Arc<dyn GeniusApi>,
    queue: Arc<WorkQueue<i64>>,
    sink: Arc<dyn RecordSink>,
    poll: Duration,
    store_errors: bool,
}

impl LyricsWorker {
    pub fn new(
        api: Arc<dyn GeniusApi>,
        queue: Arc<WorkQueue<i64>>,
        sink: Arc<dyn RecordSink>,
        poll: Duration,
        store_errors: bool,
    ) -> Self {
        Self {
            api,
            queue,
            sink,
            poll,
            store_errors,
        }
    }

    pub fn run(&self, token: &CancellationToken) {
        debug!("Lyrics worker started");
        drain_queue(&self.queue, self.poll, token, |song_id| {
            self.process(song_id);
            Ok(())
        });
        debug!("Lyrics worker stopped");
    }

    /// Fetch lyrics for one song. Songs without lyrics stay null so a later
    /// seeding pass can try again.
    pub fn process(&self, song_id: i64) {
        match self.api.fetch_lyrics(song_id) {
            Ok(Some(lyrics)) => self.sink.keep_lyrics(song_id, lyrics),
            Ok(None) => debug!("No lyrics for song {}", song_id),
            Err(e) => {
                metrics::record_api_failure(e.endpoint());
                warn!("Failed to fetch lyrics of song {}: {}", song_id, e);
                if self.store_errors {
                    self.sink.keep_lyrics(song_id, e.to_string());
                }
            }
        }
    }
}
