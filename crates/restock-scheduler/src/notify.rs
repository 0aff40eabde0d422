//! Dispatch: route, deliver with a timeout, and log every attempt.

use chrono::NaiveDate;
use restock_core::error::{RestockError, Result};
use restock_core::traits::{InventoryStore, Notifier};
use restock_core::types::{DeliveryOutcome, NotificationKind, NotificationLogEntry};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::router::ChannelRouter;

/// A message ready to go out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub kind: NotificationKind,
    /// Stable within one job run; the dedupe key.
    pub key: String,
    pub text: String,
}

impl Outbound {
    pub fn new(kind: NotificationKind, key: impl Into<String>, text: impl Into<String>) -> Self {
        Self { kind, key: key.into(), text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    /// A delivered log entry already exists for this key.
    AlreadySent,
}

pub struct Dispatcher {
    router: ChannelRouter,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        router: ChannelRouter,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn InventoryStore>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self { router, notifier, store, clock, timeout }
    }

    pub fn router(&self) -> &ChannelRouter {
        &self.router
    }

    pub fn notifier_name(&self) -> &str {
        self.notifier.name()
    }

    /// Deliver once per (job, trigger date, key).
    ///
    /// `resend` skips the delivered-log check. A failed delivery is logged and
    /// returned as `DeliveryFailed`.
    pub async fn deliver(
        &self,
        job: &str,
        trigger_date: NaiveDate,
        message: &Outbound,
        resend: bool,
    ) -> Result<Dispatch> {
        if !resend && self.store.notification_delivered(job, trigger_date, &message.key)? {
            tracing::debug!("↩️ {job}/{} already delivered for {trigger_date}", message.key);
            return Ok(Dispatch::AlreadySent);
        }

        let channel = self.router.resolve(message.kind);
        let outcome = match tokio::time::timeout(self.timeout, self.notifier.send(&channel, &message.text)).await {
            Ok(outcome) => outcome,
            Err(_) => DeliveryOutcome::failed(format!("timed out after {}ms", self.timeout.as_millis())),
        };

        self.store.append_notification_log(&NotificationLogEntry {
            job: job.to_string(),
            trigger_date,
            channel: channel.clone(),
            message_key: message.key.clone(),
            digest: digest(&message.text),
            summary: summarize(&message.text),
            created_at: self.clock.now(),
            outcome: outcome.clone(),
        })?;

        match outcome {
            DeliveryOutcome::Delivered => {
                tracing::info!("📨 {job}/{} → {channel}", message.key);
                Ok(Dispatch::Sent)
            }
            DeliveryOutcome::Failed(reason) => {
                tracing::warn!("❌ {job}/{} → {channel} failed: {reason}", message.key);
                Err(RestockError::delivery(channel.as_str(), reason))
            }
        }
    }
}

/// SHA-256 of the text, lowercase hex.
pub fn digest(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// First non-empty line with markup removed, at most 80 chars.
pub fn summarize(text: &str) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let mut plain = String::with_capacity(line.len());
    let mut in_tag = false;
    for ch in line.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(ch),
            _ => {}
        }
    }
    let plain = plain
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    if plain.chars().count() > 80 {
        let cut: String = plain.chars().take(77).collect();
        format!("{cut}...")
    } else {
        plain
    }
}
