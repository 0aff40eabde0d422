//! Channel router: notification kind to destination.
//!
//! Test mode is fixed when the router is built. Switching it means building a
//! new engine, never mutating routes under a running job.

use restock_core::config::{ChannelsConfig, EngineConfig};
use restock_core::error::{RestockError, Result};
use restock_core::types::{ChannelId, NotificationKind};

#[derive(Debug, Clone)]
struct RouteTable {
    on_hand: ChannelId,
    auto_request: ChannelId,
    received: ChannelId,
    reassurance: ChannelId,
    missing_counts: ChannelId,
}

#[derive(Debug, Clone)]
enum Routes {
    Production(RouteTable),
    Test(ChannelId),
}

#[derive(Debug, Clone)]
pub struct ChannelRouter {
    routes: Routes,
}

fn required(name: &str, value: &Option<String>) -> Result<ChannelId> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(ChannelId::new(v)),
        _ => Err(RestockError::config(format!("channels.{name} is not configured"))),
    }
}

impl ChannelRouter {
    pub fn from_config(engine: &EngineConfig, channels: &ChannelsConfig) -> Result<Self> {
        if engine.test_mode {
            let test = required("test", &channels.test)?;
            tracing::info!("🧪 Test mode active - all messages go to {test}");
            return Ok(Self { routes: Routes::Test(test) });
        }

        let reassurance = required("reassurance", &channels.reassurance)?;
        let missing_counts = match channels.missing_counts.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => ChannelId::new(v),
            _ => reassurance.clone(),
        };
        Ok(Self {
            routes: Routes::Production(RouteTable {
                on_hand: required("on_hand", &channels.on_hand)?,
                auto_request: required("auto_request", &channels.auto_request)?,
                received: required("received", &channels.received)?,
                reassurance,
                missing_counts,
            }),
        })
    }

    pub fn is_test_mode(&self) -> bool {
        matches!(self.routes, Routes::Test(_))
    }

    pub fn resolve(&self, kind: NotificationKind) -> ChannelId {
        match &self.routes {
            Routes::Test(channel) => channel.clone(),
            Routes::Production(table) => match kind {
                NotificationKind::OnHand => table.on_hand.clone(),
                NotificationKind::AutoRequest => table.auto_request.clone(),
                NotificationKind::Received => table.received.clone(),
                NotificationKind::Reassurance => table.reassurance.clone(),
                NotificationKind::MissingCounts => table.missing_counts.clone(),
            },
        }
    }
}
