//! Triggers: recurrence rules as data, evaluated by a pure "is due" check.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use restock_core::types::JobKind;
use serde::Serialize;

use crate::clock::TimePolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Trigger {
    /// Every day at the given local time.
    Daily(NaiveTime),
    /// On each listed weekday at the paired local time.
    Weekly(Vec<(Weekday, NaiveTime)>),
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Trigger {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Trigger::Daily(hm(hour, minute))
    }

    pub fn weekly(days: &[Weekday], hour: u32, minute: u32) -> Self {
        Trigger::Weekly(days.iter().map(|d| (*d, hm(hour, minute))).collect())
    }

    /// Earliest trigger time on the given weekday, if the job fires that day.
    pub fn slot_on(&self, weekday: Weekday) -> Option<NaiveTime> {
        match self {
            Trigger::Daily(at) => Some(*at),
            Trigger::Weekly(slots) => slots
                .iter()
                .filter(|(day, _)| *day == weekday)
                .map(|(_, at)| *at)
                .min(),
        }
    }

    /// Due when today has a slot and local wall-clock time has reached it.
    pub fn is_due(&self, time: &TimePolicy, now: DateTime<Utc>) -> bool {
        self.slot_on(time.local(now).weekday())
            .is_some_and(|at| time.has_passed(now, at))
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Daily(at) => write!(f, "daily {}", at.format("%H:%M")),
            Trigger::Weekly(slots) => {
                let parts: Vec<String> = slots
                    .iter()
                    .map(|(day, at)| format!("{day} {}", at.format("%H:%M")))
                    .collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

/// One row of the fixed job table.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    pub job: JobKind,
    pub trigger: Trigger,
}

/// The statically known job table.
pub fn job_table() -> Vec<ScheduledJob> {
    JobKind::ALL
        .iter()
        .map(|job| ScheduledJob { job: *job, trigger: trigger_for(*job) })
        .collect()
}

pub fn trigger_for(job: JobKind) -> Trigger {
    match job {
        JobKind::AutoRequest => Trigger::weekly(&[Weekday::Tue, Weekday::Sat], 8, 0),
        JobKind::Reassurance => Trigger::daily(17, 0),
        JobKind::MissingCounts => Trigger::daily(23, 59),
        JobKind::DataCleanup => Trigger::daily(2, 0),
    }
}
