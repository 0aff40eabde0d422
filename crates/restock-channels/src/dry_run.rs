//! Dry-run notifier: logs instead of sending. Used when no transport is configured.

use async_trait::async_trait;
use restock_core::traits::Notifier;
use restock_core::types::{ChannelId, DeliveryOutcome};

pub struct DryRunNotifier;

#[async_trait]
impl Notifier for DryRunNotifier {
    fn name(&self) -> &str { "dry-run" }

    async fn send(&self, channel: &ChannelId, text: &str) -> DeliveryOutcome {
        let preview: String = text.chars().take(100).collect();
        tracing::info!("Transport disabled - would send to {channel}: {preview}");
        DeliveryOutcome::Delivered
    }
}
