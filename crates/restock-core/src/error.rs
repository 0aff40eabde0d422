//! Unified error types for Restock.

use thiserror::Error;

/// Result type alias using RestockError.
pub type Result<T> = std::result::Result<T, RestockError>;

#[derive(Error, Debug)]
pub enum RestockError {
    // Store errors
    #[error("Inventory store unavailable: {0}")]
    StoreUnavailable(String),

    // Delivery errors
    #[error("Delivery failed on channel {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    // Policy errors
    #[error("Invalid policy input for {item}: {reason}")]
    PolicyInputInvalid { item: String, reason: String },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Engine errors
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Engine is not running")]
    NotRunning,

    #[error("Timeout: {0}")]
    Timeout(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl RestockError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn delivery(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_input(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PolicyInputInvalid {
            item: item.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Transient failures leave the job eligible to retry on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::DeliveryFailed { .. } | Self::Timeout(_)
        )
    }
}
