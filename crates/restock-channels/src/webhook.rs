//! Webhook notifier: POST each message as JSON to an outbound URL.
//!
//! Useful for bridging into systems without a Telegram bot (Slack relays, n8n, custom APIs).

use async_trait::async_trait;
use restock_core::config::WebhookConfig;
use restock_core::traits::Notifier;
use restock_core::types::{ChannelId, DeliveryOutcome};
use sha2::{Digest, Sha256};

/// Header carrying the hex SHA-256 of `secret + body`.
pub const SIGNATURE_HEADER: &str = "X-Restock-Signature";

pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn payload(channel: &ChannelId, text: &str) -> String {
        serde_json::json!({
            "channel": channel.as_str(),
            "content": text,
            "format": "html",
        })
        .to_string()
    }

    fn signature(&self, body: &str) -> Option<String> {
        self.config.secret.as_ref().map(|secret| {
            let mut hasher = Sha256::new();
            hasher.update(format!("{secret}{body}"));
            format!("{:x}", hasher.finalize())
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str { "webhook" }

    async fn send(&self, channel: &ChannelId, text: &str) -> DeliveryOutcome {
        if !self.config.enabled {
            return DeliveryOutcome::failed("Webhook transport disabled");
        }

        let body = Self::payload(channel, text);
        let mut request = self
            .client
            .post(&self.config.outbound_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(sig) = self.signature(&body) {
            request = request.header(SIGNATURE_HEADER, sig);
        }

        match request.body(body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Webhook delivered to {channel}");
                DeliveryOutcome::Delivered
            }
            Ok(response) => DeliveryOutcome::Failed(format!("Webhook {}", response.status())),
            Err(e) => DeliveryOutcome::Failed(format!("Webhook send failed: {}", e.without_url())),
        }
    }
}
