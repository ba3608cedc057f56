//! Genius API access.
//!
//! - `client`: the [`GeniusApi`] trait used by the pipeline and its blocking
//!   HTTP implementation
//! - `models`: response types and conversion to catalog records
//! - `lyrics`: lyrics extraction from song pages

mod client;
mod lyrics;
mod models;

pub use client::{ApiError, GeniusApi, GeniusClient, GENIUS_API_BASE};
pub use lyrics::extract_lyrics;
pub use models::{format_release_date, GeniusSong, ReleaseDateComponents, SongsPage, UNKNOWN_NAME};
