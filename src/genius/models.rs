//! Genius API response types.
//!
//! These mirror the JSON returned by `api.genius.com` and include conversion
//! methods to catalog models.

use crate::catalog_store::{Artist, Song};
use serde::Deserialize;

/// Title/name used when the API omits one.
pub const UNKNOWN_NAME: &str = "UNKNOWN";

/// Every Genius response wraps its payload in `{"meta": ..., "response": ...}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

#[derive(Debug, Deserialize)]
pub struct ArtistResponse {
    pub artist: GeniusArtist,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeniusArtist {
    pub id: i64,
    pub name: Option<String>,
    pub followers_count: Option<i64>,
}

impl GeniusArtist {
    pub fn to_catalog_artist(&self) -> Artist {
        Artist {
            id: self.id,
            name: self
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            followers_count: self.followers_count.unwrap_or(0),
        }
    }
}

/// One page of an artist's songs.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SongsPage {
    #[serde(default)]
    pub songs: Vec<GeniusSong>,
    /// Page number to request next, `None` once the last page was returned.
    pub next_page: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GeniusSong {
    pub id: i64,
    pub title: Option<String>,
    pub release_date_components: Option<ReleaseDateComponents>,
}

impl GeniusSong {
    pub fn to_catalog_song(&self) -> Song {
        Song {
            id: self.id,
            title: self
                .title
                .clone()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            release_date: format_release_date(self.release_date_components.as_ref()),
        }
    }
}

/// Partial release date as Genius reports it: any component may be null.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ReleaseDateComponents {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

/// Format a partial release date with the precision that is available:
/// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`. A missing block or a missing year
/// yields `None`. A day without a month is dropped.
pub fn format_release_date(components: Option<&ReleaseDateComponents>) -> Option<String> {
    let components = components?;
    let year = components.year?;
    match (components.month, components.day) {
        (None, _) => Some(format!("{:04}", year)),
        (Some(month), None) => Some(format!("{:04}-{:02}", year, month)),
        (Some(month), Some(day)) => Some(format!("{:04}-{:02}-{:02}", year, month, day)),
    }
}

#[derive(Debug, Deserialize)]
pub struct SongResponse {
    pub song: SongDetails,
}

/// The few fields of `/songs/{id}` needed to locate lyrics.
#[derive(Clone, Debug, Deserialize)]
pub struct SongDetails {
    pub url: Option<String>,
    #[serde(default)]
    pub instrumental: bool,
    pub lyrics_state: Option<String>,
}

impl SongDetails {
    /// Whether the song page can be expected to carry lyrics at all.
    pub fn has_lyrics(&self) -> bool {
        !self.instrumental && self.lyrics_state.as_deref() != Some("unreleased")
    }
}
