//! # Restock Scheduler
//!
//! Scheduled replenishment and notification engine.
//!
//! ## Architecture
//! ```text
//! Engine (tokio interval, one tick at a time)
//!   ├── DataCleanup    daily 02:00      → retention sweep
//!   ├── AutoRequest    Tue, Sat 08:00   → request records + order per location
//!   ├── Reassurance    daily 17:00      → evening status per location
//!   ├── MissingCounts  daily 23:59      → missing / low-supply alert
//!   └── on output → ChannelRouter → Notifier (timeout) → notification log
//! ```
//!
//! A job counts as done for a day only once its run record is written. Until
//! then it is retried on every tick, and the notification log keeps retries
//! from sending the same message twice.

pub mod clock;
pub mod engine;
pub mod jobs;
pub mod messages;
pub mod notify;
pub mod policy;
pub mod retention;
pub mod router;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SystemClock, TimePolicy};
pub use engine::{Engine, EngineStatus, JobFailure, JobStatusView, RunOutcome, RunStatus};
pub use jobs::JobReport;
pub use notify::{Dispatch, Outbound};
pub use retention::SweepReport;
pub use router::ChannelRouter;
pub use trigger::{ScheduledJob, Trigger};
