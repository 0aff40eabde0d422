//! Telegram Bot API notifier: `sendMessage` with HTML parse mode.

use async_trait::async_trait;
use restock_core::config::TelegramConfig;
use restock_core::traits::Notifier;
use restock_core::types::{ChannelId, DeliveryOutcome};
use std::time::Duration;

pub struct TelegramNotifier {
    api_base: String,
    bot_token: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, bot_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Restock/0.3")
            .build()
            .unwrap_or_default();

        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            max_retries: config.max_retries.max(1),
            client,
        }
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn send_once(&self, channel: &ChannelId, text: &str) -> Result<(), String> {
        let body = serde_json::json!({
            "chat_id": channel.as_str(),
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.send_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Telegram send failed: {}", e.without_url()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(format!("Telegram {status}: {snippet}"));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str { "telegram" }

    async fn send(&self, channel: &ChannelId, text: &str) -> DeliveryOutcome {
        let mut last_error = String::new();
        for attempt in 0..self.max_retries {
            match self.send_once(channel, text).await {
                Ok(()) => {
                    tracing::info!("Telegram sent to {channel} ({} chars)", text.len());
                    return DeliveryOutcome::Delivered;
                }
                Err(e) => {
                    tracing::warn!("Telegram attempt {} to {channel} failed: {e}", attempt + 1);
                    last_error = e;
                }
            }
            if attempt + 1 < self.max_retries {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
        }
        tracing::error!("Failed to send Telegram after {} attempts", self.max_retries);
        DeliveryOutcome::Failed(last_error)
    }
}
