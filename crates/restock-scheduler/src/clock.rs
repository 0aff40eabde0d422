//! Clock and time policy.
//!
//! Every job decision is made against an injected [`Clock`] and evaluated in
//! one configured timezone, so tests can simulate any instant.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Answers "what day is it" and "has T passed today" in the business timezone.
#[derive(Debug, Clone, Copy)]
pub struct TimePolicy {
    tz: Tz,
}

impl TimePolicy {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.tz)
    }

    /// Calendar day of `instant` in the configured timezone.
    pub fn today(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// Whether the local wall-clock time of `instant` is at or past `at`.
    ///
    /// Compares wall-clock readings, so a time skipped by a DST jump still
    /// counts as passed once the clock reads later than it.
    pub fn has_passed(&self, instant: DateTime<Utc>, at: NaiveTime) -> bool {
        self.local(instant).time() >= at
    }
}
