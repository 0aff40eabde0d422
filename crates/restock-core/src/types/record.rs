//! Records the engine writes: requests, the notification log and job runs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{ChannelId, DeliveryOutcome, JobKind};
use crate::error::RestockError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Sent,
    Acknowledged,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Sent => "sent",
            RequestStatus::Acknowledged => "acknowledged",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = RestockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "sent" => Ok(RequestStatus::Sent),
            "acknowledged" => Ok(RequestStatus::Acknowledged),
            other => Err(RestockError::Other(format!("Unknown request status: {other}"))),
        }
    }
}

/// A replenishment request. At most one per (item, trigger date).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestRecord {
    pub id: String,
    pub item_id: String,
    pub location: String,
    pub cases: u32,
    pub on_hand: f64,
    pub trigger_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub status: RequestStatus,
}

/// Append-only audit row for every delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationLogEntry {
    /// Job name, or `publish:<kind>` for host-initiated messages.
    pub job: String,
    pub trigger_date: NaiveDate,
    pub channel: ChannelId,
    /// Deterministic key of the message within the job run ("Avondale/order").
    pub message_key: String,
    /// SHA-256 of the message text.
    pub digest: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub outcome: DeliveryOutcome,
}

/// Commit marker of a completed job run. At most one per (job, trigger date).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRunRecord {
    pub job: JobKind,
    pub trigger_date: NaiveDate,
    pub completed_at: DateTime<Utc>,
}

/// Timestamped record families covered by the retention sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    OnHandReadings,
    ReceivedReadings,
    RequestRecords,
    NotificationLog,
    JobRuns,
}

impl RecordType {
    pub const ALL: [RecordType; 5] = [
        RecordType::OnHandReadings,
        RecordType::ReceivedReadings,
        RecordType::RequestRecords,
        RecordType::NotificationLog,
        RecordType::JobRuns,
    ];
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::OnHandReadings => write!(f, "on_hand_readings"),
            RecordType::ReceivedReadings => write!(f, "received_readings"),
            RecordType::RequestRecords => write!(f, "request_records"),
            RecordType::NotificationLog => write!(f, "notification_log"),
            RecordType::JobRuns => write!(f, "job_runs"),
        }
    }
}
