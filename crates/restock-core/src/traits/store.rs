//! Inventory store trait: the engine's only view of persisted state.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::types::{
    Item, JobKind, JobRunRecord, NotificationLogEntry, OnHandReading, RecordType, RequestRecord,
    RequestStatus,
};

/// Narrow, synchronous store interface.
///
/// Every call may fail with `RestockError::StoreUnavailable`. Implementations
/// own their concurrency control; the engine takes no locks of its own.
pub trait InventoryStore: Send + Sync {
    fn name(&self) -> &str;

    fn get_item(&self, id: &str) -> Result<Option<Item>>;

    fn list_active_items(&self) -> Result<Vec<Item>>;

    /// Latest on-hand reading for the item at the location, if any.
    fn get_on_hand(&self, item_id: &str, location: &str) -> Result<Option<OnHandReading>>;

    /// Insert a request record. Returns `false` when one already exists for
    /// the same (item, trigger date); the existing row is left untouched.
    fn save_request_record(&self, record: &RequestRecord) -> Result<bool>;

    fn get_request_record(&self, item_id: &str, trigger_date: NaiveDate) -> Result<Option<RequestRecord>>;

    fn set_request_status(&self, item_id: &str, trigger_date: NaiveDate, status: RequestStatus) -> Result<()>;

    fn append_notification_log(&self, entry: &NotificationLogEntry) -> Result<()>;

    /// Whether a delivered log entry exists for (job, trigger date, message key).
    fn notification_delivered(&self, job: &str, trigger_date: NaiveDate, message_key: &str) -> Result<bool>;

    fn get_job_run_record(&self, job: JobKind, trigger_date: NaiveDate) -> Result<Option<JobRunRecord>>;

    /// Write the commit marker. Returns `false` if it was already present.
    fn save_job_run_record(&self, job: JobKind, trigger_date: NaiveDate, completed_at: DateTime<Utc>) -> Result<bool>;

    /// Most recent run record per job.
    fn latest_job_runs(&self) -> Result<Vec<JobRunRecord>>;

    /// Most recent failed log entry per job name.
    fn latest_failures(&self) -> Result<Vec<NotificationLogEntry>>;

    /// Delete up to `limit` rows of `record_type` older than `cutoff`.
    /// The newest job run per job is never deleted.
    fn delete_older_than(&self, record_type: RecordType, cutoff: DateTime<Utc>, limit: usize) -> Result<usize>;
}
