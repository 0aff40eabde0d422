//! SQLite inventory store.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use restock_core::error::{RestockError, Result};
use restock_core::traits::InventoryStore;
use restock_core::types::{
    ChannelId, DeliveryOutcome, Item, JobKind, JobRunRecord, NotificationLogEntry, OnHandReading,
    ReceivedReading, RecordType, RequestRecord, RequestStatus,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id TEXT PRIMARY KEY,
        location TEXT NOT NULL,
        unit_type TEXT NOT NULL DEFAULT 'case',
        adu REAL NOT NULL,
        par_level REAL NOT NULL,
        case_size INTEGER NOT NULL DEFAULT 1,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS on_hand_readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id TEXT NOT NULL,
        location TEXT NOT NULL,
        counted_at TEXT NOT NULL,
        quantity REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_on_hand_item ON on_hand_readings(item_id, location, counted_at);
    CREATE INDEX IF NOT EXISTS idx_on_hand_ts ON on_hand_readings(counted_at);

    CREATE TABLE IF NOT EXISTS received_readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id TEXT NOT NULL,
        location TEXT NOT NULL,
        received_at TEXT NOT NULL,
        quantity REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_received_ts ON received_readings(received_at);

    CREATE TABLE IF NOT EXISTS request_records (
        id TEXT PRIMARY KEY,
        item_id TEXT NOT NULL,
        location TEXT NOT NULL,
        cases INTEGER NOT NULL,
        on_hand REAL NOT NULL,
        trigger_date TEXT NOT NULL,
        generated_at TEXT NOT NULL,
        status TEXT NOT NULL,
        UNIQUE (item_id, trigger_date)
    );
    CREATE INDEX IF NOT EXISTS idx_requests_ts ON request_records(generated_at);

    CREATE TABLE IF NOT EXISTS notification_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job TEXT NOT NULL,
        trigger_date TEXT NOT NULL,
        channel TEXT NOT NULL,
        message_key TEXT NOT NULL,
        digest TEXT NOT NULL,
        summary TEXT NOT NULL,
        created_at TEXT NOT NULL,
        outcome TEXT NOT NULL,
        reason TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_log_lookup ON notification_log(job, trigger_date, message_key);
    CREATE INDEX IF NOT EXISTS idx_log_ts ON notification_log(created_at);

    CREATE TABLE IF NOT EXISTS job_runs (
        job TEXT NOT NULL,
        trigger_date TEXT NOT NULL,
        completed_at TEXT NOT NULL,
        PRIMARY KEY (job, trigger_date)
    );
";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fixed-width UTC timestamps so text comparison matches time order.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_err(idx, e))
}

fn get_job(row: &Row<'_>, idx: usize) -> rusqlite::Result<JobKind> {
    let raw: String = row.get(idx)?;
    raw.parse::<JobKind>().map_err(|e| conversion_err(idx, e))
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        location: row.get(1)?,
        unit_type: row.get(2)?,
        adu: row.get(3)?,
        par_level: row.get(4)?,
        case_size: row.get(5)?,
        active: row.get(6)?,
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<RequestRecord> {
    let status: String = row.get(7)?;
    Ok(RequestRecord {
        id: row.get(0)?,
        item_id: row.get(1)?,
        location: row.get(2)?,
        cases: row.get(3)?,
        on_hand: row.get(4)?,
        trigger_date: get_date(row, 5)?,
        generated_at: get_ts(row, 6)?,
        status: status.parse().map_err(|e| conversion_err(7, e))?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationLogEntry> {
    let outcome: String = row.get(7)?;
    let reason: Option<String> = row.get(8)?;
    Ok(NotificationLogEntry {
        job: row.get(0)?,
        trigger_date: get_date(row, 1)?,
        channel: ChannelId(row.get(2)?),
        message_key: row.get(3)?,
        digest: row.get(4)?,
        summary: row.get(5)?,
        created_at: get_ts(row, 6)?,
        outcome: if outcome == "delivered" {
            DeliveryOutcome::Delivered
        } else {
            DeliveryOutcome::Failed(reason.unwrap_or_default())
        },
    })
}

fn job_run_from_row(row: &Row<'_>) -> rusqlite::Result<JobRunRecord> {
    Ok(JobRunRecord {
        job: get_job(row, 0)?,
        trigger_date: get_date(row, 1)?,
        completed_at: get_ts(row, 2)?,
    })
}

fn store_err(e: rusqlite::Error) -> RestockError {
    RestockError::store(e.to_string())
}

/// (table, timestamp column, extra predicate) for each retained record family.
fn retention_target(record_type: RecordType) -> (&'static str, &'static str, &'static str) {
    match record_type {
        RecordType::OnHandReadings => ("on_hand_readings", "counted_at", ""),
        RecordType::ReceivedReadings => ("received_readings", "received_at", ""),
        RecordType::RequestRecords => ("request_records", "generated_at", ""),
        RecordType::NotificationLog => ("notification_log", "created_at", ""),
        RecordType::JobRuns => (
            "job_runs",
            "completed_at",
            "AND (job, completed_at) NOT IN (SELECT job, MAX(completed_at) FROM job_runs GROUP BY job)",
        ),
    }
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(store_err)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
            .map_err(store_err)?;
        let store = Self::with_connection(conn)?;
        tracing::debug!("📦 Inventory store opened: {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(store_err)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| RestockError::store(format!("Schema error: {e}")))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| RestockError::store(e.to_string()))
    }

    // ── Host-side writes (admin and entry collaborators) ──

    pub fn upsert_item(&self, item: &Item) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO items (id, location, unit_type, adu, par_level, case_size, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                location = excluded.location, unit_type = excluded.unit_type, adu = excluded.adu,
                par_level = excluded.par_level, case_size = excluded.case_size, active = excluded.active",
            params![item.id, item.location, item.unit_type, item.adu, item.par_level, item.case_size, item.active],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn record_on_hand(&self, reading: &OnHandReading) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO on_hand_readings (item_id, location, counted_at, quantity) VALUES (?1, ?2, ?3, ?4)",
            params![reading.item_id, reading.location, ts(&reading.counted_at), reading.quantity],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn record_received(&self, reading: &ReceivedReading) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO received_readings (item_id, location, received_at, quantity) VALUES (?1, ?2, ?3, ?4)",
            params![reading.item_id, reading.location, ts(&reading.received_at), reading.quantity],
        )
        .map_err(store_err)?;
        Ok(())
    }

    // ── Operator queries ──

    pub fn list_request_records(&self, trigger_date: NaiveDate) -> Result<Vec<RequestRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, item_id, location, cases, on_hand, trigger_date, generated_at, status
                 FROM request_records WHERE trigger_date = ?1 ORDER BY location, item_id",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![date(&trigger_date)], request_from_row)
            .map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    pub fn recent_notifications(&self, limit: usize) -> Result<Vec<NotificationLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT job, trigger_date, channel, message_key, digest, summary, created_at, outcome, reason
                 FROM notification_log ORDER BY id DESC LIMIT ?1",
            )
            .map_err(store_err)?;
        let rows = stmt.query_map(params![limit as i64], log_from_row).map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    pub fn count(&self, record_type: RecordType) -> Result<usize> {
        let (table, _, _) = retention_target(record_type);
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(store_err)?;
        Ok(n as usize)
    }
}

impl InventoryStore for SqliteStore {
    fn name(&self) -> &str { "sqlite" }

    fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, location, unit_type, adu, par_level, case_size, active FROM items WHERE id = ?1",
            params![id],
            item_from_row,
        )
        .optional()
        .map_err(store_err)
    }

    fn list_active_items(&self) -> Result<Vec<Item>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, location, unit_type, adu, par_level, case_size, active
                 FROM items WHERE active = 1 ORDER BY location, id",
            )
            .map_err(store_err)?;
        let rows = stmt.query_map([], item_from_row).map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    fn get_on_hand(&self, item_id: &str, location: &str) -> Result<Option<OnHandReading>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT item_id, location, counted_at, quantity FROM on_hand_readings
             WHERE item_id = ?1 AND location = ?2
             ORDER BY counted_at DESC, id DESC LIMIT 1",
            params![item_id, location],
            |row| {
                Ok(OnHandReading {
                    item_id: row.get(0)?,
                    location: row.get(1)?,
                    counted_at: get_ts(row, 2)?,
                    quantity: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(store_err)
    }

    fn save_request_record(&self, record: &RequestRecord) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO request_records
                 (id, item_id, location, cases, on_hand, trigger_date, generated_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.item_id,
                    record.location,
                    record.cases,
                    record.on_hand,
                    date(&record.trigger_date),
                    ts(&record.generated_at),
                    record.status.as_str(),
                ],
            )
            .map_err(store_err)?;
        Ok(inserted > 0)
    }

    fn get_request_record(&self, item_id: &str, trigger_date: NaiveDate) -> Result<Option<RequestRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, item_id, location, cases, on_hand, trigger_date, generated_at, status
             FROM request_records WHERE item_id = ?1 AND trigger_date = ?2",
            params![item_id, date(&trigger_date)],
            request_from_row,
        )
        .optional()
        .map_err(store_err)
    }

    fn set_request_status(&self, item_id: &str, trigger_date: NaiveDate, status: RequestStatus) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE request_records SET status = ?3 WHERE item_id = ?1 AND trigger_date = ?2",
            params![item_id, date(&trigger_date), status.as_str()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn append_notification_log(&self, entry: &NotificationLogEntry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notification_log
             (job, trigger_date, channel, message_key, digest, summary, created_at, outcome, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.job,
                date(&entry.trigger_date),
                entry.channel.as_str(),
                entry.message_key,
                entry.digest,
                entry.summary,
                ts(&entry.created_at),
                entry.outcome.as_str(),
                entry.outcome.reason(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn notification_delivered(&self, job: &str, trigger_date: NaiveDate, message_key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM notification_log
                 WHERE job = ?1 AND trigger_date = ?2 AND message_key = ?3 AND outcome = 'delivered'
                 LIMIT 1",
                params![job, date(&trigger_date), message_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        Ok(found.is_some())
    }

    fn get_job_run_record(&self, job: JobKind, trigger_date: NaiveDate) -> Result<Option<JobRunRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT job, trigger_date, completed_at FROM job_runs WHERE job = ?1 AND trigger_date = ?2",
            params![job.as_str(), date(&trigger_date)],
            job_run_from_row,
        )
        .optional()
        .map_err(store_err)
    }

    fn save_job_run_record(&self, job: JobKind, trigger_date: NaiveDate, completed_at: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO job_runs (job, trigger_date, completed_at) VALUES (?1, ?2, ?3)",
                params![job.as_str(), date(&trigger_date), ts(&completed_at)],
            )
            .map_err(store_err)?;
        Ok(inserted > 0)
    }

    fn latest_job_runs(&self) -> Result<Vec<JobRunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT job, trigger_date, MAX(completed_at) FROM job_runs GROUP BY job ORDER BY job",
            )
            .map_err(store_err)?;
        let rows = stmt.query_map([], job_run_from_row).map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    fn latest_failures(&self) -> Result<Vec<NotificationLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT job, trigger_date, channel, message_key, digest, summary, created_at, outcome, reason
                 FROM notification_log
                 WHERE id IN (
                    SELECT MAX(id) FROM notification_log WHERE outcome <> 'delivered' GROUP BY job
                 )
                 ORDER BY job",
            )
            .map_err(store_err)?;
        let rows = stmt.query_map([], log_from_row).map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    fn delete_older_than(&self, record_type: RecordType, cutoff: DateTime<Utc>, limit: usize) -> Result<usize> {
        let (table, column, extra) = retention_target(record_type);
        let sql = format!(
            "DELETE FROM {table} WHERE rowid IN (
                SELECT rowid FROM {table} WHERE {column} < ?1 {extra} LIMIT ?2
            )"
        );
        let conn = self.lock()?;
        let deleted = conn
            .execute(&sql, params![ts(&cutoff), limit as i64])
            .map_err(store_err)?;
        Ok(deleted)
    }
}
