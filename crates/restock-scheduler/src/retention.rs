//! Retention sweep: bounded batched deletes over every timestamped record.

use chrono::{DateTime, Duration, Months, Utc};
use chrono_tz::Tz;
use restock_core::config::RetentionConfig;
use restock_core::error::{RestockError, Result};
use restock_core::traits::InventoryStore;
use restock_core::types::RecordType;
use serde::Serialize;
use std::collections::BTreeMap;

/// Oldest instant that survives a sweep run at `now`.
///
/// Calendar months are subtracted in local time; a day that does not exist in
/// the target month clamps to the month's last day.
pub fn cutoff(now: DateTime<Utc>, tz: Tz, config: &RetentionConfig) -> Result<DateTime<Utc>> {
    let out_of_range = || RestockError::config("retention horizon reaches before the earliest representable date");
    if let Some(days) = config.horizon_days {
        return Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(out_of_range);
    }
    match now.with_timezone(&tz).checked_sub_months(Months::new(config.horizon_months)) {
        Some(local) => Ok(local.with_timezone(&Utc)),
        None => Duration::try_days(30 * i64::from(config.horizon_months))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(out_of_range),
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub cutoff: Option<DateTime<Utc>>,
    pub deleted: BTreeMap<String, usize>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.deleted.values().sum()
    }
}

/// Delete everything older than `cutoff`, `batch` rows per store call.
///
/// Yields between batches so a large backlog never holds the store for long.
/// Safe to interrupt and run again.
pub async fn sweep(store: &dyn InventoryStore, cutoff: DateTime<Utc>, batch: usize) -> Result<SweepReport> {
    let batch = batch.max(1);
    let mut report = SweepReport { cutoff: Some(cutoff), ..Default::default() };

    for record_type in RecordType::ALL {
        let mut total = 0;
        loop {
            let deleted = store.delete_older_than(record_type, cutoff, batch)?;
            total += deleted;
            if deleted < batch {
                break;
            }
            tokio::task::yield_now().await;
        }
        if total > 0 {
            tracing::info!("🧹 Retention: {total} {record_type} older than {cutoff}");
        }
        report.deleted.insert(record_type.to_string(), total);
    }
    Ok(report)
}
