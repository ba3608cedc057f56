//! Songs Scraper Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog_store;
pub mod config;
pub mod genius;
pub mod ingest;
pub mod metrics;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use catalog_store::{CatalogStore, SqliteCatalogStore};
pub use genius::{GeniusApi, GeniusClient};
pub use ingest::{Pipeline, PipelineState, ShutdownReport};
