//! Test doubles and fixtures shared by the scheduler tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use restock_core::config::{ChannelsConfig, EngineConfig, RestockConfig};
use restock_core::error::{RestockError, Result};
use restock_core::traits::{InventoryStore, Notifier};
use restock_core::types::{
    ChannelId, DeliveryOutcome, Item, JobKind, JobRunRecord, NotificationLogEntry, OnHandReading,
    RecordType, RequestRecord, RequestStatus,
};
use restock_store::SqliteStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::clock::ManualClock;
use crate::router::ChannelRouter;

/// Notifier that records every message, with failure and hang injection.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(ChannelId, String)>>,
    failing: AtomicBool,
    hanging: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    pub fn set_hanging(&self, on: bool) {
        self.hanging.store(on, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, channel: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(ch, _)| ch.as_str() == channel)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str { "recording" }

    async fn send(&self, channel: &ChannelId, text: &str) -> DeliveryOutcome {
        if self.hanging.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return DeliveryOutcome::failed("injected failure");
        }
        self.sent.lock().unwrap().push((channel.clone(), text.to_string()));
        DeliveryOutcome::Delivered
    }
}

/// SQLite store that can be made to fail on demand.
pub struct FlakyStore {
    inner: SqliteStore,
    unavailable: AtomicBool,
    fail_job_run_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            unavailable: AtomicBool::new(false),
            fail_job_run_writes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    pub fn set_unavailable(&self, on: bool) {
        self.unavailable.store(on, Ordering::SeqCst);
    }

    /// Simulates a crash between a handler's side effects and its commit.
    pub fn set_fail_job_run_writes(&self, on: bool) {
        self.fail_job_run_writes.store(on, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RestockError::store("injected outage"))
        } else {
            Ok(())
        }
    }
}

impl InventoryStore for FlakyStore {
    fn name(&self) -> &str { "flaky" }

    fn get_item(&self, id: &str) -> Result<Option<Item>> {
        self.check()?;
        self.inner.get_item(id)
    }

    fn list_active_items(&self) -> Result<Vec<Item>> {
        self.check()?;
        self.inner.list_active_items()
    }

    fn get_on_hand(&self, item_id: &str, location: &str) -> Result<Option<OnHandReading>> {
        self.check()?;
        self.inner.get_on_hand(item_id, location)
    }

    fn save_request_record(&self, record: &RequestRecord) -> Result<bool> {
        self.check()?;
        self.inner.save_request_record(record)
    }

    fn get_request_record(&self, item_id: &str, trigger_date: NaiveDate) -> Result<Option<RequestRecord>> {
        self.check()?;
        self.inner.get_request_record(item_id, trigger_date)
    }

    fn set_request_status(&self, item_id: &str, trigger_date: NaiveDate, status: RequestStatus) -> Result<()> {
        self.check()?;
        self.inner.set_request_status(item_id, trigger_date, status)
    }

    fn append_notification_log(&self, entry: &NotificationLogEntry) -> Result<()> {
        self.check()?;
        self.inner.append_notification_log(entry)
    }

    fn notification_delivered(&self, job: &str, trigger_date: NaiveDate, message_key: &str) -> Result<bool> {
        self.check()?;
        self.inner.notification_delivered(job, trigger_date, message_key)
    }

    fn get_job_run_record(&self, job: JobKind, trigger_date: NaiveDate) -> Result<Option<JobRunRecord>> {
        self.check()?;
        self.inner.get_job_run_record(job, trigger_date)
    }

    fn save_job_run_record(&self, job: JobKind, trigger_date: NaiveDate, completed_at: DateTime<Utc>) -> Result<bool> {
        self.check()?;
        if self.fail_job_run_writes.load(Ordering::SeqCst) {
            return Err(RestockError::store("process stopped before commit"));
        }
        self.inner.save_job_run_record(job, trigger_date, completed_at)
    }

    fn latest_job_runs(&self) -> Result<Vec<JobRunRecord>> {
        self.check()?;
        self.inner.latest_job_runs()
    }

    fn latest_failures(&self) -> Result<Vec<NotificationLogEntry>> {
        self.check()?;
        self.inner.latest_failures()
    }

    fn delete_older_than(&self, record_type: RecordType, cutoff: DateTime<Utc>, limit: usize) -> Result<usize> {
        self.check()?;
        self.inner.delete_older_than(record_type, cutoff, limit)
    }
}

/// Chicago wall-clock time as a UTC instant.
pub fn chicago(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    chrono_tz::America::Chicago
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn fixed_clock(now: DateTime<Utc>) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(now))
}

pub fn channels() -> ChannelsConfig {
    ChannelsConfig {
        on_hand: Some("-100".into()),
        auto_request: Some("-200".into()),
        received: Some("-300".into()),
        reassurance: Some("400".into()),
        missing_counts: None,
        test: Some("999".into()),
    }
}

pub fn config(test_mode: bool) -> RestockConfig {
    RestockConfig {
        engine: EngineConfig { test_mode, tick_interval_secs: 1, handler_timeout_secs: 1, ..EngineConfig::default() },
        channels: channels(),
        ..RestockConfig::default()
    }
}

pub fn production_router() -> ChannelRouter {
    ChannelRouter::from_config(&EngineConfig::default(), &channels()).unwrap()
}

/// Two locations: Avondale needs Steak and Buns, Midtown is at par.
pub fn seed_items(store: &SqliteStore, counted_at: DateTime<Utc>) {
    let items = [
        (Item::new("Steak", "Avondale", 1.8, 6.0, 1), 2.0),
        (Item::new("Buns", "Avondale", 0.5, 10.0, 4).with_unit_type("tray"), 3.0),
        (Item::new("Fries", "Midtown", 2.0, 4.0, 2), 5.0),
    ];
    for (item, quantity) in items {
        store.upsert_item(&item).unwrap();
        store
            .record_on_hand(&OnHandReading {
                item_id: item.id.clone(),
                location: item.location.clone(),
                counted_at,
                quantity,
            })
            .unwrap();
    }
}
