//! # Restock Core
//!
//! Shared error taxonomy, configuration, data model and the two seams the
//! engine consumes: [`InventoryStore`] and [`Notifier`].

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::RestockConfig;
pub use error::{RestockError, Result};
pub use traits::{InventoryStore, Notifier};
