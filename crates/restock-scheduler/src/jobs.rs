//! Job handlers.
//!
//! Every handler is safe to run again for the same trigger date: request
//! records are created once per (item, day) and each message goes out once per
//! (job, day, key), so a run interrupted before its commit marker can simply
//! be repeated.

use chrono::{DateTime, NaiveDate, Utc};
use restock_core::config::{PolicyConfig, RetentionConfig};
use restock_core::error::{RestockError, Result};
use restock_core::traits::InventoryStore;
use restock_core::types::{
    Item, JobKind, NotificationKind, OnHandReading, RequestRecord, RequestStatus,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::clock::TimePolicy;
use crate::messages::{self, Flag, OrderLine, Standing};
use crate::notify::{Dispatch, Dispatcher, Outbound};
use crate::policy;
use crate::retention;

/// Everything a handler may touch for one run.
pub struct JobContext<'a> {
    pub trigger_date: NaiveDate,
    pub now: DateTime<Utc>,
    pub time: TimePolicy,
    pub store: &'a dyn InventoryStore,
    pub dispatcher: &'a Dispatcher,
    pub policy: &'a PolicyConfig,
    pub retention: &'a RetentionConfig,
    /// Ignore the delivered log (forced manual runs).
    pub resend: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub messages_sent: usize,
    /// Messages already delivered by an earlier attempt today.
    pub messages_deduped: usize,
    pub requests_created: usize,
    pub items_skipped: usize,
    pub locations_skipped: usize,
    pub records_deleted: usize,
}

impl std::fmt::Display for JobReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sent={} deduped={} requests={} skipped_items={} skipped_locations={} deleted={}",
            self.messages_sent,
            self.messages_deduped,
            self.requests_created,
            self.items_skipped,
            self.locations_skipped,
            self.records_deleted
        )
    }
}

impl JobContext<'_> {
    async fn deliver(&self, job: JobKind, message: Outbound, report: &mut JobReport) -> Result<()> {
        match self
            .dispatcher
            .deliver(job.as_str(), self.trigger_date, &message, self.resend)
            .await?
        {
            Dispatch::Sent => report.messages_sent += 1,
            Dispatch::AlreadySent => report.messages_deduped += 1,
        }
        Ok(())
    }

    /// Latest reading for the item, kept only if counted on the trigger date.
    fn todays_reading(&self, item: &Item) -> Result<Option<OnHandReading>> {
        Ok(self
            .store
            .get_on_hand(&item.id, &item.location)?
            .filter(|r| self.time.today(r.counted_at) == self.trigger_date))
    }
}

fn by_location(items: Vec<Item>) -> BTreeMap<String, Vec<Item>> {
    let mut grouped: BTreeMap<String, Vec<Item>> = BTreeMap::new();
    for item in items {
        grouped.entry(item.location.clone()).or_default().push(item);
    }
    grouped
}

pub async fn run_job(job: JobKind, ctx: &JobContext<'_>) -> Result<JobReport> {
    match job {
        JobKind::AutoRequest => auto_request(ctx).await,
        JobKind::Reassurance => reassurance(ctx).await,
        JobKind::MissingCounts => missing_counts(ctx).await,
        JobKind::DataCleanup => data_cleanup(ctx).await,
    }
}

async fn auto_request(ctx: &JobContext<'_>) -> Result<JobReport> {
    let mut report = JobReport::default();
    let grouped = by_location(ctx.store.list_active_items()?);
    if grouped.is_empty() {
        tracing::info!("No active items, nothing to request");
        return Ok(report);
    }

    let mut skipped = Vec::new();
    let mut delivery_error: Option<RestockError> = None;

    for (location, items) in &grouped {
        let mut counted = Vec::with_capacity(items.len());
        for item in items {
            if let Some(reading) = ctx.store.get_on_hand(&item.id, location)? {
                counted.push((item, reading.quantity));
            }
        }
        let missing = items.len() - counted.len();
        if missing as f64 > ctx.policy.max_missing_ratio * items.len() as f64 {
            tracing::warn!("⚠️ Skipping {location}: {missing} of {} on-hand counts missing", items.len());
            report.locations_skipped += 1;
            skipped.push((location.clone(), missing, items.len()));
            continue;
        }

        let mut lines = Vec::new();
        let mut pending = Vec::new();
        for (item, on_hand) in counted {
            let assessment = match policy::assess(item, on_hand) {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping item: {e}");
                    report.items_skipped += 1;
                    continue;
                }
            };
            if assessment.cases == 0 {
                continue;
            }

            let record = RequestRecord {
                id: uuid::Uuid::new_v4().to_string(),
                item_id: item.id.clone(),
                location: location.clone(),
                cases: assessment.cases,
                on_hand,
                trigger_date: ctx.trigger_date,
                generated_at: ctx.now,
                status: RequestStatus::Pending,
            };
            let record = if ctx.store.save_request_record(&record)? {
                report.requests_created += 1;
                record
            } else {
                // Created by an earlier attempt today; its numbers stand.
                ctx.store
                    .get_request_record(&item.id, ctx.trigger_date)?
                    .unwrap_or(record)
            };

            if record.status == RequestStatus::Pending {
                pending.push(item.id.clone());
            }
            lines.push(OrderLine {
                item: item.id.clone(),
                unit_type: item.unit_type.clone(),
                on_hand: record.on_hand,
                par_level: item.par_level,
                cases: record.cases,
            });
        }

        let message = Outbound::new(
            NotificationKind::AutoRequest,
            format!("{location}/order"),
            messages::auto_request(location, ctx.trigger_date, &lines),
        );
        match ctx.deliver(JobKind::AutoRequest, message, &mut report).await {
            Ok(()) => {
                for item_id in &pending {
                    ctx.store.set_request_status(item_id, ctx.trigger_date, RequestStatus::Sent)?;
                }
            }
            Err(e @ RestockError::DeliveryFailed { .. }) => {
                delivery_error.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }

    if skipped.len() == grouped.len() {
        let alert = Outbound::new(
            NotificationKind::AutoRequest,
            "skipped",
            messages::auto_request_skipped(ctx.trigger_date, &skipped),
        );
        ctx.deliver(JobKind::AutoRequest, alert, &mut report).await?;
    }

    match delivery_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

async fn reassurance(ctx: &JobContext<'_>) -> Result<JobReport> {
    let mut report = JobReport::default();
    let grouped = by_location(ctx.store.list_active_items()?);
    let critical_days = ctx.policy.critical_supply_days;

    let mut summaries = Vec::with_capacity(grouped.len());
    for (location, items) in &grouped {
        let mut flagged = Vec::new();
        let mut ok = 0;
        let mut has_data = false;
        for item in items {
            let Some(reading) = ctx.todays_reading(item)? else {
                flagged.push((item.id.clone(), Standing::Missing));
                continue;
            };
            has_data = true;
            let assessment = match policy::assess(item, reading.quantity) {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping item: {e}");
                    report.items_skipped += 1;
                    continue;
                }
            };
            match assessment.days_of_supply {
                Some(days) if days < critical_days => {
                    flagged.push((item.id.clone(), Standing::Critical { on_hand: reading.quantity, days }));
                }
                _ if assessment.below_par() => {
                    flagged.push((
                        item.id.clone(),
                        Standing::Watch { on_hand: reading.quantity, par_level: item.par_level },
                    ));
                }
                _ => ok += 1,
            }
        }
        if has_data {
            summaries.push((location, flagged, ok));
        } else {
            tracing::info!("No counts today for {location}, no evening check");
        }
    }

    if summaries.is_empty() {
        let alert = Outbound::new(
            NotificationKind::Reassurance,
            "no-data",
            messages::reassurance_no_data(ctx.trigger_date),
        );
        ctx.deliver(JobKind::Reassurance, alert, &mut report).await?;
        return Ok(report);
    }

    let mut delivery_error: Option<RestockError> = None;
    for (location, flagged, ok) in summaries {
        let message = Outbound::new(
            NotificationKind::Reassurance,
            format!("{location}/status"),
            messages::reassurance(location, ctx.trigger_date, &flagged, ok),
        );
        match ctx.deliver(JobKind::Reassurance, message, &mut report).await {
            Ok(()) => {}
            Err(e @ RestockError::DeliveryFailed { .. }) => {
                delivery_error.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    match delivery_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

async fn missing_counts(ctx: &JobContext<'_>) -> Result<JobReport> {
    let mut report = JobReport::default();
    let mut flagged = Vec::new();

    for item in ctx.store.list_active_items()? {
        let Some(reading) = ctx.todays_reading(&item)? else {
            flagged.push((item.location.clone(), item.id.clone(), Flag::NoCount));
            continue;
        };
        if let Err(e) = policy::assess(&item, reading.quantity) {
            tracing::warn!("⚠️ Skipping item: {e}");
            report.items_skipped += 1;
            continue;
        }
        match policy::days_of_supply(reading.quantity, item.adu) {
            None => flagged.push((item.location.clone(), item.id.clone(), Flag::NoUsage)),
            Some(days) if days < ctx.policy.low_supply_days => {
                flagged.push((item.location.clone(), item.id.clone(), Flag::LowSupply { days }));
            }
            Some(_) => {}
        }
    }

    if flagged.is_empty() {
        tracing::info!("All counts in for {}", ctx.trigger_date);
        return Ok(report);
    }
    let alert = Outbound::new(
        NotificationKind::MissingCounts,
        "alert",
        messages::missing_counts(ctx.trigger_date, &flagged),
    );
    ctx.deliver(JobKind::MissingCounts, alert, &mut report).await?;
    Ok(report)
}

async fn data_cleanup(ctx: &JobContext<'_>) -> Result<JobReport> {
    let cutoff = retention::cutoff(ctx.now, ctx.time.tz(), ctx.retention)?;
    let swept = retention::sweep(ctx.store, cutoff, ctx.retention.batch_size).await?;
    Ok(JobReport { records_deleted: swept.total(), ..Default::default() })
}
