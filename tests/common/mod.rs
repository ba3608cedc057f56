//! Common test infrastructure
//!
//! A scripted in-process Genius API, a catalog fixture and pipeline settings
//! tuned for fast end-to-end runs. Tests should only import from this module.

mod constants;
mod fake_genius;
mod fixtures;

pub use constants::*;
pub use fake_genius::FakeGenius;
pub use fixtures::{create_seeded_catalog, fast_settings, wait_until};
