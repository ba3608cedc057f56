use super::constants::*;
use songs_scraper::catalog_store::Artist;
use songs_scraper::genius::{ApiError, GeniusApi, GeniusSong, ReleaseDateComponents, SongsPage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Genius stand-in serving a fixed catalog.
pub struct FakeGenius {
    pages: HashMap<(i64, u32), SongsPage>,
    lyrics: HashMap<i64, Option<String>>,
    calls: AtomicUsize,
    latency: Duration,
}

fn song(id: i64, year: i32, month: Option<u32>) -> GeniusSong {
    GeniusSong {
        id,
        title: Some(format!("Song {id}")),
        release_date_components: Some(ReleaseDateComponents {
            year: Some(year),
            month,
            day: None,
        }),
    }
}

impl FakeGenius {
    pub fn new() -> Self {
        let mut pages = HashMap::new();
        pages.insert(
            (UNDER_SCRAPED_ARTIST_ID, 1),
            SongsPage {
                songs: vec![song(NEW_SONG_IDS[0], 2004, Some(5)), song(NEW_SONG_IDS[1], 2005, None)],
                next_page: Some(2),
            },
        );
        pages.insert(
            (UNDER_SCRAPED_ARTIST_ID, 2),
            SongsPage {
                songs: vec![
                    song(NEW_SONG_IDS[2], 2010, Some(1)),
                    song(SONG_WITHOUT_LYRICS_ID, 1999, None),
                ],
                next_page: None,
            },
        );

        let mut lyrics = HashMap::new();
        for id in NEW_SONG_IDS.iter().chain([SONG_WITHOUT_LYRICS_ID].iter()) {
            lyrics.insert(*id, Some(format!("Lyrics of song {id}")));
        }
        lyrics.insert(INSTRUMENTAL_SONG_ID, None);

        Self {
            pages,
            lyrics,
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Same catalog, but every call takes `latency` to answer.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self) {
        self.answer();
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
    }
}

impl GeniusApi for FakeGenius {
    fn fetch_artist(&self, artist_id: i64) -> Result<Artist, ApiError> {
        self.answer();
        if artist_id == BROKEN_ARTIST_ID {
            return Err(ApiError::Status {
                endpoint: "artist",
                status: 500,
            });
        }
        Ok(Artist {
            id: artist_id,
            name: format!("Artist {artist_id}"),
            followers_count: 1000,
        })
    }

    fn fetch_artist_songs(&self, artist_id: i64, page: u32) -> Result<SongsPage, ApiError> {
        self.answer();
        Ok(self
            .pages
            .get(&(artist_id, page))
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_lyrics(&self, song_id: i64) -> Result<Option<String>, ApiError> {
        self.answer();
        self.lyrics
            .get(&song_id)
            .cloned()
            .ok_or(ApiError::Status {
                endpoint: "song",
                status: 404,
            })
    }
}
