//! # Restock Store
//! SQLite-backed inventory store.

pub mod sqlite;

pub use sqlite::SqliteStore;

use restock_core::config::StoreConfig;
use restock_core::error::Result;

/// Open the store described by configuration.
pub fn open_store(config: &StoreConfig) -> Result<SqliteStore> {
    let path = config.resolved_path();
    if config.path == ":memory:" {
        return SqliteStore::open_in_memory();
    }
    SqliteStore::open(&path)
}
