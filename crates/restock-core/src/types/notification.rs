//! Notification kinds, destinations and delivery outcomes.

use serde::{Deserialize, Serialize};

/// Logical kind of an outbound message; the router maps it to a channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OnHand,
    AutoRequest,
    Received,
    Reassurance,
    MissingCounts,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        NotificationKind::OnHand,
        NotificationKind::AutoRequest,
        NotificationKind::Received,
        NotificationKind::Reassurance,
        NotificationKind::MissingCounts,
    ];
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::OnHand => write!(f, "on_hand"),
            NotificationKind::AutoRequest => write!(f, "auto_request"),
            NotificationKind::Received => write!(f, "received"),
            NotificationKind::Reassurance => write!(f, "reassurance"),
            NotificationKind::MissingCounts => write!(f, "missing_counts"),
        }
    }
}

/// Opaque destination identifier (a Telegram chat id, a webhook thread, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of handing one message to a transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Delivered => None,
            DeliveryOutcome::Failed(reason) => Some(reason),
        }
    }
}
