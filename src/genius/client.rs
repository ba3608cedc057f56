//! Blocking HTTP client for the Genius API.
//!
//! Requests are spaced by a minimum interval shared by every thread using the
//! client, so concurrent workers cannot exceed the configured rate.

use super::lyrics::extract_lyrics;
use super::models::{ArtistResponse, Envelope, SongResponse, SongsPage};
use crate::catalog_store::Artist;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

pub const GENIUS_API_BASE: &str = "https://api.genius.com";
const SONGS_PER_PAGE: u32 = 50;
const USER_AGENT: &str = concat!("songs-scraper/", env!("CARGO_PKG_VERSION"));

/// Errors returned by a Genius API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {source}")]
    Network {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("Failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Short label stored in place of data that could not be fetched.
    pub fn label(&self) -> String {
        match self {
            ApiError::Network { source, .. } if source.is_timeout() => "timeout".to_string(),
            ApiError::Network { .. } => "network error".to_string(),
            ApiError::Status { status, .. } => format!("HTTP {}", status),
            ApiError::Decode { .. } => "invalid response".to_string(),
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            ApiError::Network { endpoint, .. }
            | ApiError::Status { endpoint, .. }
            | ApiError::Decode { endpoint, .. } => endpoint,
        }
    }
}

/// The three remote calls the ingestion pipeline depends on.
pub trait GeniusApi: Send + Sync {
    fn fetch_artist(&self, artist_id: i64) -> Result<Artist, ApiError>;

    /// One page (1-based) of the songs credited to an artist.
    fn fetch_artist_songs(&self, artist_id: i64, page: u32) -> Result<SongsPage, ApiError>;

    /// Lyrics of a song, `None` when the song has none (e.g. instrumentals).
    fn fetch_lyrics(&self, song_id: i64) -> Result<Option<String>, ApiError>;
}

pub struct GeniusClient {
    client: Client,
    base_url: String,
    token: String,
    min_interval: Duration,
    last_request: Mutex<Instant>,
}

impl GeniusClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root, normally [`GENIUS_API_BASE`]
    /// * `token` - Client access token sent as a bearer token
    /// * `timeout` - Per-request timeout
    /// * `min_interval` - Minimum spacing between two requests
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        min_interval: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            min_interval,
            last_request: Mutex::new(
                Instant::now()
                    .checked_sub(min_interval)
                    .unwrap_or_else(Instant::now),
            ),
        })
    }

    fn rate_limit(&self) {
        let mut last = self.last_request.lock().unwrap();
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            std::thread::sleep(self.min_interval - elapsed);
        }
        *last = Instant::now();
    }

    fn get_text(&self, endpoint: &'static str, url: &str, authorized: bool) -> Result<String, ApiError> {
        self.rate_limit();
        debug!("GET {}", url);

        let mut request = self.client.get(url);
        if authorized {
            request = request.bearer_auth(&self.token);
        }
        let response = request
            .send()
            .map_err(|source| ApiError::Network { endpoint, source })?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        response
            .text()
            .map_err(|source| ApiError::Network { endpoint, source })
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let body = self.get_text(endpoint, &url, true)?;
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode { endpoint, source })?;
        Ok(envelope.response)
    }
}

impl GeniusApi for GeniusClient {
    fn fetch_artist(&self, artist_id: i64) -> Result<Artist, ApiError> {
        let body: ArtistResponse = self.get_json("artist", &format!("/artists/{}", artist_id))?;
        Ok(body.artist.to_catalog_artist())
    }

    fn fetch_artist_songs(&self, artist_id: i64, page: u32) -> Result<SongsPage, ApiError> {
        self.get_json(
            "artist_songs",
            &format!(
                "/artists/{}/songs?page={}&per_page={}",
                artist_id, page, SONGS_PER_PAGE
            ),
        )
    }

    fn fetch_lyrics(&self, song_id: i64) -> Result<Option<String>, ApiError> {
        let body: SongResponse = self.get_json("song", &format!("/songs/{}", song_id))?;
        let song = body.song;
        if !song.has_lyrics() {
            return Ok(None);
        }
        let Some(page_url) = song.url else {
            return Ok(None);
        };

        let html = self.get_text("lyrics_page", &page_url, false)?;
        Ok(extract_lyrics(&html))
    }
}
