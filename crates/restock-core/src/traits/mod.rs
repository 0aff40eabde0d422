//! Seams between the engine and its collaborators.

pub mod notifier;
pub mod store;

pub use notifier::Notifier;
pub use store::InventoryStore;
