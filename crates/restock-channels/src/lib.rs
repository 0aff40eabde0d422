//! # Restock Channels
//! Notifier implementations the engine delivers through.

pub mod dry_run;
pub mod telegram;
pub mod webhook;

use restock_core::RestockConfig;
use restock_core::traits::Notifier;
use std::sync::Arc;

/// Pick the transport from configuration: webhook, then Telegram, then dry-run.
pub fn create_notifier(config: &RestockConfig) -> Arc<dyn Notifier> {
    if let Some(webhook) = config.webhook.as_ref().filter(|w| w.enabled) {
        return Arc::new(webhook::WebhookNotifier::new(webhook.clone()));
    }
    match config.telegram.bot_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => {
            Arc::new(telegram::TelegramNotifier::new(&config.telegram, token))
        }
        _ => {
            tracing::warn!("No transport credentials configured, messages will only be logged");
            Arc::new(dry_run::DryRunNotifier)
        }
    }
}
