//! Data model shared by the store, the notifiers and the engine.

pub mod inventory;
pub mod job;
pub mod notification;
pub mod record;

pub use inventory::{Item, OnHandReading, ReceivedReading};
pub use job::JobKind;
pub use notification::{ChannelId, DeliveryOutcome, NotificationKind};
pub use record::{JobRunRecord, NotificationLogEntry, RecordType, RequestRecord, RequestStatus};
