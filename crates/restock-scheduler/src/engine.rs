//! Engine facade: owns the job table, the tick loop and per-job health.
//!
//! One [`Engine`] per process. The host creates it, calls [`Engine::start`],
//! and later [`Engine::stop`]. Only the tick loop and [`Engine::run_now`]
//! invoke handlers, and both take the same run lock, so no two handlers ever
//! run at once.

use chrono::{DateTime, NaiveDate, Utc};
use restock_core::config::RestockConfig;
use restock_core::error::{RestockError, Result};
use restock_core::traits::{InventoryStore, Notifier};
use restock_core::types::{ChannelId, DeliveryOutcome, JobKind, NotificationKind, NotificationLogEntry};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, SystemClock, TimePolicy};
use crate::jobs::{self, JobContext, JobReport};
use crate::notify::{self, Dispatch, Dispatcher, Outbound};
use crate::router::ChannelRouter;
use crate::trigger::{job_table, ScheduledJob};

#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
struct JobHealth {
    last_run: Option<DateTime<Utc>>,
    last_trigger_date: Option<NaiveDate>,
    last_error: Option<JobFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub job: JobKind,
    pub trigger: String,
    pub last_run: Option<DateTime<Utc>>,
    pub last_trigger_date: Option<NaiveDate>,
    /// Cleared by the next successful run.
    pub last_error: Option<JobFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub test_mode: bool,
    pub timezone: String,
    pub notifier: String,
    pub jobs: Vec<JobStatusView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// A run record already exists for today.
    AlreadyRan,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub job: JobKind,
    pub trigger_date: NaiveDate,
    pub status: RunStatus,
    pub report: Option<JobReport>,
}

struct EngineInner {
    config: RestockConfig,
    time: TimePolicy,
    clock: Arc<dyn Clock>,
    store: Arc<dyn InventoryStore>,
    dispatcher: Dispatcher,
    table: Vec<ScheduledJob>,
    run_lock: tokio::sync::Mutex<()>,
    health: Mutex<HashMap<JobKind, JobHealth>>,
}

#[derive(Default)]
struct Lifecycle {
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

pub struct Engine {
    inner: Arc<EngineInner>,
    lifecycle: Mutex<Lifecycle>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Rebuild per-job health from the run records and the notification log.
///
/// A logged failure counts only if it is newer than the job's last run.
fn load_health(store: &dyn InventoryStore) -> HashMap<JobKind, JobHealth> {
    let mut health: HashMap<JobKind, JobHealth> = HashMap::new();
    match store.latest_job_runs() {
        Ok(runs) => {
            for run in runs {
                let entry = health.entry(run.job).or_default();
                entry.last_run = Some(run.completed_at);
                entry.last_trigger_date = Some(run.trigger_date);
            }
        }
        Err(e) => tracing::warn!("Could not load job history: {e}"),
    }

    match store.latest_failures() {
        Ok(failures) => {
            for failure in failures {
                // publish:* entries belong to no job
                let Ok(job) = failure.job.parse::<JobKind>() else {
                    continue;
                };
                let reason = failure.outcome.reason().unwrap_or_default();
                let message = if failure.channel.as_str() == FAILURE_CHANNEL {
                    reason.to_string()
                } else {
                    RestockError::delivery(failure.channel.as_str(), reason).to_string()
                };
                let entry = health.entry(job).or_default();
                if entry.last_run.is_none_or(|run| failure.created_at > run) {
                    entry.last_error = Some(JobFailure { at: failure.created_at, message });
                }
            }
        }
        Err(e) => tracing::warn!("Could not load job failures: {e}"),
    }
    health
}

/// Channel recorded for failures that happened before any delivery.
const FAILURE_CHANNEL: &str = "-";

impl Engine {
    pub fn new(config: RestockConfig, store: Arc<dyn InventoryStore>, notifier: Arc<dyn Notifier>) -> Result<Self> {
        Self::with_clock(config, store, notifier, Arc::new(SystemClock))
    }

    /// Build with an injected clock. Configuration errors are fatal here.
    pub fn with_clock(
        config: RestockConfig,
        store: Arc<dyn InventoryStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let time = TimePolicy::new(config.engine.tz()?);
        let router = ChannelRouter::from_config(&config.engine, &config.channels)?;
        let dispatcher = Dispatcher::new(
            router,
            notifier,
            store.clone(),
            clock.clone(),
            config.engine.handler_timeout(),
        );

        let health = load_health(store.as_ref());

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                time,
                clock,
                store,
                dispatcher,
                table: job_table(),
                run_lock: tokio::sync::Mutex::new(()),
                health: Mutex::new(health),
            }),
            lifecycle: Mutex::new(Lifecycle::default()),
        })
    }

    /// Spawn the tick loop. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = locked(&self.lifecycle);
        if lifecycle.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(RestockError::AlreadyStarted);
        }

        let (tx, rx) = watch::channel(false);
        let inner = self.inner.clone();
        lifecycle.handle = Some(tokio::spawn(async move { inner.run_loop(rx).await }));
        lifecycle.shutdown = Some(tx);
        Ok(())
    }

    /// Signal the loop and wait up to the shutdown timeout.
    ///
    /// A tick in progress is never aborted; if it outlives the timeout it
    /// finishes in the background and the loop exits after it.
    pub async fn stop(&self) -> Result<()> {
        let (shutdown, handle) = {
            let mut lifecycle = locked(&self.lifecycle);
            (lifecycle.shutdown.take(), lifecycle.handle.take())
        };
        let (Some(shutdown), Some(handle)) = (shutdown, handle) else {
            return Err(RestockError::NotRunning);
        };

        let _ = shutdown.send(true);
        let limit = self.inner.config.engine.shutdown_timeout();
        match tokio::time::timeout(limit, handle).await {
            Ok(Ok(())) => tracing::info!("⏹️ Engine stopped"),
            Ok(Err(e)) => tracing::error!("Engine loop ended abnormally: {e}"),
            Err(_) => tracing::warn!(
                "Engine still finishing a tick after {}s; it will exit when done",
                limit.as_secs()
            ),
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        locked(&self.lifecycle)
            .handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn status(&self) -> EngineStatus {
        let health = locked(&self.inner.health);
        let jobs = self
            .inner
            .table
            .iter()
            .map(|scheduled| {
                let h = health.get(&scheduled.job).cloned().unwrap_or_default();
                JobStatusView {
                    job: scheduled.job,
                    trigger: scheduled.trigger.to_string(),
                    last_run: h.last_run,
                    last_trigger_date: h.last_trigger_date,
                    last_error: h.last_error,
                }
            })
            .collect();

        EngineStatus {
            running: self.is_running(),
            test_mode: self.inner.dispatcher.router().is_test_mode(),
            timezone: self.inner.config.engine.timezone.clone(),
            notifier: self.inner.dispatcher.notifier_name().to_string(),
            jobs,
        }
    }

    /// Run one job immediately, skipping the due-time check.
    ///
    /// Without `force` the per-day guard still applies. With `force` the job
    /// runs again and re-sends messages already delivered today.
    pub async fn run_now(&self, job: &str, force: bool) -> Result<RunOutcome> {
        let job: JobKind = job.parse()?;
        let inner = &self.inner;
        let _guard = inner.run_lock.lock().await;

        let trigger_date = inner.time.today(inner.clock.now());
        if !force && inner.store.get_job_run_record(job, trigger_date)?.is_some() {
            tracing::info!("{job} already ran for {trigger_date}; use force to run again");
            return Ok(RunOutcome { job, trigger_date, status: RunStatus::AlreadyRan, report: None });
        }

        let report = inner.execute(job, trigger_date, force).await?;
        Ok(RunOutcome { job, trigger_date, status: RunStatus::Completed, report: Some(report) })
    }

    /// Evaluate every job once against the current clock.
    pub async fn tick(&self) -> Vec<RunOutcome> {
        self.inner.tick().await
    }

    /// Deliver a host-originated message (count reminder, received
    /// confirmation) through the same routing, timeout and log.
    pub async fn publish(&self, kind: NotificationKind, key: &str, text: &str) -> Result<Dispatch> {
        let inner = &self.inner;
        let trigger_date = inner.time.today(inner.clock.now());
        let message = Outbound::new(kind, key, text);
        inner
            .dispatcher
            .deliver(&format!("publish:{kind}"), trigger_date, &message, false)
            .await
    }
}

impl EngineInner {
    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.engine.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            "⏰ Engine started: tick every {}s in {}{}",
            self.config.engine.tick_interval_secs,
            self.config.engine.timezone,
            if self.config.engine.test_mode { " (test mode)" } else { "" }
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }
        tracing::debug!("Tick loop exited");
    }

    async fn tick(&self) -> Vec<RunOutcome> {
        let _guard = self.run_lock.lock().await;
        let now = self.clock.now();
        let today = self.time.today(now);

        let mut outcomes = Vec::new();
        for scheduled in &self.table {
            let job = scheduled.job;
            if !scheduled.trigger.is_due(&self.time, now) {
                continue;
            }
            match self.store.get_job_run_record(job, today) {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Cannot check {job} for {today}: {e}");
                    self.record_failure(job, &e);
                    outcomes.push(RunOutcome {
                        job,
                        trigger_date: today,
                        status: RunStatus::Failed { error: e.to_string() },
                        report: None,
                    });
                    continue;
                }
            }

            let (status, report) = match self.execute(job, today, false).await {
                Ok(report) => (RunStatus::Completed, Some(report)),
                Err(e) => (RunStatus::Failed { error: e.to_string() }, None),
            };
            outcomes.push(RunOutcome { job, trigger_date: today, status, report });
        }
        outcomes
    }

    /// Run the handler, then write the run record as the commit point.
    async fn execute(&self, job: JobKind, trigger_date: NaiveDate, resend: bool) -> Result<JobReport> {
        tracing::info!("▶️ Running {job} for {trigger_date}");
        let ctx = JobContext {
            trigger_date,
            now: self.clock.now(),
            time: self.time,
            store: self.store.as_ref(),
            dispatcher: &self.dispatcher,
            policy: &self.config.policy,
            retention: &self.config.retention,
            resend,
        };

        let limit = self.config.engine.job_timeout();
        let outcome = match tokio::time::timeout(limit, jobs::run_job(job, &ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RestockError::Timeout(format!("{job} did not finish within {}s", limit.as_secs()))),
        };

        let result = match outcome {
            Ok(report) => {
                let completed_at = self.clock.now();
                self.store
                    .save_job_run_record(job, trigger_date, completed_at)
                    .map(|_| (report, completed_at))
            }
            Err(e) => {
                // Delivery failures are already in the log.
                if !matches!(e, RestockError::DeliveryFailed { .. }) {
                    self.log_failure(job, trigger_date, &e);
                }
                Err(e)
            }
        };

        match result {
            Ok((report, completed_at)) => {
                tracing::info!("✅ {job} done for {trigger_date}: {report}");
                let mut health = locked(&self.health);
                let entry = health.entry(job).or_default();
                entry.last_run = Some(completed_at);
                entry.last_trigger_date = Some(trigger_date);
                entry.last_error = None;
                Ok(report)
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!("⚠️ {job} failed for {trigger_date}, retrying next tick: {e}");
                } else {
                    tracing::error!("❌ {job} failed for {trigger_date}: {e}");
                }
                self.record_failure(job, &e);
                Err(e)
            }
        }
    }

    fn record_failure(&self, job: JobKind, error: &RestockError) {
        let mut health = locked(&self.health);
        health.entry(job).or_default().last_error = Some(JobFailure {
            at: self.clock.now(),
            message: error.to_string(),
        });
    }

    /// Best effort: the store may be the thing that failed.
    fn log_failure(&self, job: JobKind, trigger_date: NaiveDate, error: &RestockError) {
        let reason = error.to_string();
        let entry = NotificationLogEntry {
            job: job.as_str().to_string(),
            trigger_date,
            channel: ChannelId::new(FAILURE_CHANNEL),
            message_key: "job-failure".into(),
            digest: notify::digest(&reason),
            summary: notify::summarize(&reason),
            created_at: self.clock.now(),
            outcome: DeliveryOutcome::Failed(reason),
        };
        if let Err(e) = self.store.append_notification_log(&entry) {
            tracing::debug!("Failure for {job} not logged: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chicago, config, fixed_clock, seed_items, FlakyStore, RecordingNotifier};
    use chrono::Duration;
    use restock_core::types::RecordType;
    use restock_store::SqliteStore;

    struct Fixture {
        engine: Engine,
        clock: Arc<crate::clock::ManualClock>,
        store: Arc<FlakyStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture(now: DateTime<Utc>, test_mode: bool) -> Fixture {
        let clock = fixed_clock(now);
        let store = Arc::new(FlakyStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Engine::with_clock(config(test_mode), store.clone(), notifier.clone(), clock.clone()).unwrap();
        Fixture { engine, clock, store, notifier }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ran(outcomes: &[RunOutcome], job: JobKind) -> bool {
        outcomes.iter().any(|o| o.job == job && o.status == RunStatus::Completed)
    }

    #[tokio::test]
    async fn test_auto_request_fires_once_after_eight_on_tuesday() {
        let f = fixture(chicago(2026, 10, 20, 7, 59), false);
        seed_items(f.store.inner(), chicago(2026, 10, 20, 6, 0));

        let early = f.engine.tick().await;
        assert!(!ran(&early, JobKind::AutoRequest));
        assert!(ran(&early, JobKind::DataCleanup));
        assert!(f.notifier.sent_to("-200").is_empty());

        f.clock.set(chicago(2026, 10, 20, 8, 1));
        let due = f.engine.tick().await;
        assert!(ran(&due, JobKind::AutoRequest));
        assert_eq!(f.notifier.sent_to("-200").len(), 2);

        for _ in 0..10 {
            f.clock.advance(Duration::minutes(1));
            let later = f.engine.tick().await;
            assert!(later.is_empty());
        }
        assert_eq!(f.notifier.sent_to("-200").len(), 2);
        assert!(f.store.get_job_run_record(JobKind::AutoRequest, day(2026, 10, 20)).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_auto_request_not_due_on_monday() {
        let f = fixture(chicago(2026, 10, 19, 9, 0), false);
        seed_items(f.store.inner(), chicago(2026, 10, 19, 6, 0));
        let outcomes = f.engine.tick().await;
        assert!(!ran(&outcomes, JobKind::AutoRequest));
    }

    #[tokio::test]
    async fn test_run_now_honors_day_guard_unless_forced() {
        let f = fixture(chicago(2026, 10, 20, 8, 1), false);
        seed_items(f.store.inner(), chicago(2026, 10, 20, 6, 0));

        let first = f.engine.run_now("auto_request", false).await.unwrap();
        assert_eq!(first.status, RunStatus::Completed);
        let second = f.engine.run_now("auto_request", false).await.unwrap();
        assert_eq!(second.status, RunStatus::AlreadyRan);
        assert_eq!(f.notifier.sent_to("-200").len(), 2);

        let forced = f.engine.run_now("auto-request", true).await.unwrap();
        assert_eq!(forced.status, RunStatus::Completed);
        assert_eq!(f.notifier.sent_to("-200").len(), 4);
        // records from the first run stand
        assert_eq!(forced.report.unwrap().requests_created, 0);
    }

    #[tokio::test]
    async fn test_run_now_unknown_job() {
        let f = fixture(chicago(2026, 10, 20, 8, 1), false);
        let err = f.engine.run_now("inventory_party", false).await.unwrap_err();
        assert!(matches!(err, RestockError::UnknownJob(_)));
    }

    #[tokio::test]
    async fn test_crash_before_commit_does_not_double_send() {
        let f = fixture(chicago(2026, 10, 20, 8, 1), false);
        seed_items(f.store.inner(), chicago(2026, 10, 20, 6, 0));
        f.store.set_fail_job_run_writes(true);

        let crashed = f.engine.tick().await;
        assert!(!ran(&crashed, JobKind::AutoRequest));
        assert_eq!(f.notifier.sent_to("-200").len(), 2);
        assert!(f.store.get_job_run_record(JobKind::AutoRequest, day(2026, 10, 20)).unwrap().is_none());

        f.store.set_fail_job_run_writes(false);
        f.clock.advance(Duration::minutes(1));
        let recovered = f.engine.tick().await;
        assert!(ran(&recovered, JobKind::AutoRequest));
        let report = recovered
            .iter()
            .find(|o| o.job == JobKind::AutoRequest)
            .and_then(|o| o.report.clone())
            .unwrap();
        assert_eq!(report.messages_sent, 0);
        assert_eq!(report.messages_deduped, 2);
        assert_eq!(f.notifier.sent_to("-200").len(), 2);
        assert!(f.store.get_job_run_record(JobKind::AutoRequest, day(2026, 10, 20)).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delivery_failure_surfaces_and_retries_next_tick() {
        let f = fixture(chicago(2026, 10, 20, 17, 0), false);
        seed_items(f.store.inner(), chicago(2026, 10, 20, 12, 0));
        f.notifier.set_failing(true);

        let failed = f.engine.tick().await;
        assert!(!ran(&failed, JobKind::Reassurance));
        let status = f.engine.status();
        let view = status.jobs.iter().find(|j| j.job == JobKind::Reassurance).unwrap();
        assert!(view.last_error.as_ref().unwrap().message.contains("injected failure"));
        assert!(view.last_run.is_none());

        let log = f.store.inner().recent_notifications(10).unwrap();
        assert!(log.iter().any(|e| e.job == "reassurance" && !e.outcome.is_delivered()));

        f.notifier.set_failing(false);
        f.clock.advance(Duration::minutes(1));
        let retried = f.engine.tick().await;
        assert!(ran(&retried, JobKind::Reassurance));
        let status = f.engine.status();
        let view = status.jobs.iter().find(|j| j.job == JobKind::Reassurance).unwrap();
        assert!(view.last_error.is_none());
        assert_eq!(view.last_trigger_date, Some(day(2026, 10, 20)));
    }

    #[tokio::test]
    async fn test_store_outage_fails_jobs_without_panicking() {
        let f = fixture(chicago(2026, 10, 20, 17, 0), false);
        f.store.set_unavailable(true);
        let outcomes = f.engine.tick().await;
        assert!(!outcomes.is_empty());
        assert!(outcomes.iter().all(|o| matches!(o.status, RunStatus::Failed { .. })));

        f.store.set_unavailable(false);
        let outcomes = f.engine.tick().await;
        assert!(ran(&outcomes, JobKind::DataCleanup));
    }

    #[tokio::test]
    async fn test_hung_notifier_times_out() {
        let f = fixture(chicago(2026, 10, 20, 23, 59), false);
        f.store.inner().upsert_item(&restock_core::types::Item::new("Salt", "Avondale", 0.5, 2.0, 1)).unwrap();
        f.notifier.set_hanging(true);

        let started = std::time::Instant::now();
        let err = f.engine.run_now("missing_counts", false).await.unwrap_err();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert!(matches!(err, RestockError::DeliveryFailed { ref reason, .. } if reason.contains("timed out")));
        assert!(f.store.get_job_run_record(JobKind::MissingCounts, day(2026, 10, 20)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_job_as_a_whole_is_bounded() {
        let mut cfg = config(false);
        cfg.engine.handler_timeout_secs = 30;
        cfg.engine.job_timeout_secs = 1;
        let clock = fixed_clock(chicago(2026, 10, 20, 17, 0));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Engine::with_clock(cfg, store.clone(), notifier.clone(), clock).unwrap();
        seed_items(&store, chicago(2026, 10, 20, 12, 0));
        notifier.set_hanging(true);

        let started = std::time::Instant::now();
        let err = engine.run_now("reassurance", false).await.unwrap_err();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert!(matches!(err, RestockError::Timeout(_)));
        assert!(err.is_transient());
        assert!(store.get_job_run_record(JobKind::Reassurance, day(2026, 10, 20)).unwrap().is_none());

        let status = engine.status();
        let view = status.jobs.iter().find(|j| j.job == JobKind::Reassurance).unwrap();
        assert!(view.last_error.as_ref().unwrap().message.contains("did not finish within 1s"));
    }

    #[tokio::test]
    async fn test_test_mode_sends_everything_to_test_channel() {
        let f = fixture(chicago(2026, 10, 20, 23, 59), true);
        seed_items(f.store.inner(), chicago(2026, 10, 20, 6, 0));
        f.store.inner().upsert_item(&restock_core::types::Item::new("Salt", "Avondale", 0.5, 2.0, 1)).unwrap();

        for job in ["auto_request", "reassurance", "missing_counts"] {
            f.engine.run_now(job, false).await.unwrap();
        }
        f.engine.publish(NotificationKind::Received, "Avondale/received", "Truck in").await.unwrap();

        let sent = f.notifier.sent();
        assert!(sent.len() >= 4);
        assert!(sent.iter().all(|(ch, _)| ch.as_str() == "999"));
        assert!(f.engine.status().test_mode);
    }

    #[tokio::test]
    async fn test_publish_is_deduplicated_per_day() {
        let f = fixture(chicago(2026, 10, 20, 21, 0), false);
        let text = "✅ Avondale counts saved";
        let first = f.engine.publish(NotificationKind::OnHand, "Avondale/counts", text).await.unwrap();
        let again = f.engine.publish(NotificationKind::OnHand, "Avondale/counts", text).await.unwrap();
        assert_eq!(first, Dispatch::Sent);
        assert_eq!(again, Dispatch::AlreadySent);
        assert_eq!(f.notifier.sent_to("-100"), vec![text.to_string()]);
    }

    #[tokio::test]
    async fn test_retention_removes_rows_past_ninety_days() {
        let mut cfg = config(false);
        cfg.retention.horizon_days = Some(90);
        let now = chicago(2026, 10, 20, 2, 0);
        let clock = fixed_clock(now);
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Engine::with_clock(cfg, store.clone(), notifier, clock).unwrap();

        seed_items(&store, now - Duration::days(91));
        seed_items(&store, now - Duration::days(89));
        store.save_job_run_record(JobKind::Reassurance, day(2026, 6, 1), now - Duration::days(140)).unwrap();

        engine.run_now("data_cleanup", false).await.unwrap();
        assert_eq!(store.count(RecordType::OnHandReadings).unwrap(), 3);
        let surviving = store.get_on_hand("Steak", "Avondale").unwrap().unwrap();
        assert!(surviving.counted_at >= now - Duration::days(90));
        // newest run per job is kept
        assert!(store.get_job_run_record(JobKind::Reassurance, day(2026, 6, 1)).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_start_twice_and_stop() {
        let f = fixture(chicago(2026, 10, 19, 10, 0), false);
        assert!(!f.engine.is_running());
        assert!(matches!(f.engine.stop().await, Err(RestockError::NotRunning)));

        f.engine.start().unwrap();
        assert!(f.engine.is_running());
        assert!(matches!(f.engine.start(), Err(RestockError::AlreadyStarted)));

        f.engine.stop().await.unwrap();
        assert!(!f.engine.is_running());
        assert!(matches!(f.engine.stop().await, Err(RestockError::NotRunning)));
    }

    #[tokio::test]
    async fn test_status_seeded_from_store() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let completed = chicago(2026, 10, 17, 8, 0);
        store.save_job_run_record(JobKind::AutoRequest, day(2026, 10, 17), completed).unwrap();

        let engine = Engine::with_clock(
            config(false),
            store,
            Arc::new(RecordingNotifier::default()),
            fixed_clock(chicago(2026, 10, 19, 10, 0)),
        )
        .unwrap();
        let status = engine.status();
        assert_eq!(status.jobs.len(), 4);
        let auto = status.jobs.iter().find(|j| j.job == JobKind::AutoRequest).unwrap();
        assert_eq!(auto.last_run, Some(completed));
        assert_eq!(auto.trigger, "Tue 08:00, Sat 08:00");
    }

    #[tokio::test]
    async fn test_status_restores_last_error_from_store() {
        let now = chicago(2026, 10, 20, 17, 0);
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        seed_items(&store, chicago(2026, 10, 20, 12, 0));
        store.save_job_run_record(JobKind::Reassurance, day(2026, 10, 19), now - Duration::days(1)).unwrap();
        store.save_job_run_record(JobKind::DataCleanup, day(2026, 10, 20), now).unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        notifier.set_failing(true);
        let first = Engine::with_clock(config(false), store.clone(), notifier, fixed_clock(now)).unwrap();
        first.run_now("reassurance", false).await.unwrap_err();

        // a failure logged before the cleanup run no longer counts
        let mut stale = store.recent_notifications(1).unwrap().remove(0);
        stale.job = "data_cleanup".into();
        stale.created_at = now - Duration::hours(1);
        store.append_notification_log(&stale).unwrap();

        let fresh = Engine::with_clock(
            config(false),
            store.clone(),
            Arc::new(RecordingNotifier::default()),
            fixed_clock(now + Duration::minutes(5)),
        )
        .unwrap();
        let status = fresh.status();
        let reassurance = status.jobs.iter().find(|j| j.job == JobKind::Reassurance).unwrap();
        let failure = reassurance.last_error.as_ref().unwrap();
        assert_eq!(failure.message, "Delivery failed on channel 400: injected failure");
        assert_eq!(reassurance.last_trigger_date, Some(day(2026, 10, 19)));

        let cleanup = status.jobs.iter().find(|j| j.job == JobKind::DataCleanup).unwrap();
        assert!(cleanup.last_error.is_none());

        // the next successful run clears it
        fresh.run_now("reassurance", false).await.unwrap();
        let status = fresh.status();
        let reassurance = status.jobs.iter().find(|j| j.job == JobKind::Reassurance).unwrap();
        assert!(reassurance.last_error.is_none());
    }

    #[test]
    fn test_missing_channel_is_fatal() {
        let mut cfg = config(false);
        cfg.channels.received = None;
        let result = Engine::new(
            cfg,
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            Arc::new(RecordingNotifier::default()),
        );
        assert!(matches!(result, Err(RestockError::Config(_))));
    }
}
