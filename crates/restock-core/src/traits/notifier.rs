//! Notifier trait: delivers a text message to a channel.

use async_trait::async_trait;

use crate::types::{ChannelId, DeliveryOutcome};

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Transport failures are reported as `DeliveryOutcome::Failed`, never panics.
    async fn send(&self, channel: &ChannelId, text: &str) -> DeliveryOutcome;
}
