mod models;
mod schema;
mod store;
mod trait_def;

pub use models::*;
pub use schema::CATALOG_SCHEMA;
pub use store::{SqliteCatalogStore, DEFAULT_BUSY_TIMEOUT};
pub use trait_def::CatalogStore;
