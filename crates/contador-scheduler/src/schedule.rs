//! Schedule definitions
//!
//! A schedule pairs a cron expression with the name of the task it
//! triggers. The runner turns each firing into a [`ScheduleEvent`].

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Sunday 10:00 local time (sec min hour day-of-month month day-of-week)
pub const DEFAULT_DIGEST_CRON: &str = "0 0 10 * * Sun";

/// Task name used for the weekly digest
pub const WEEKLY_DIGEST_TASK: &str = "weekly_digest";

/// A recurring task fired on a cron schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// Unique identifier for this schedule
    pub id: String,

    /// Cron expression with a leading seconds field
    pub cron_expr: String,

    /// Name of the task to run when the schedule fires
    pub task: String,
}

impl Schedule {
    /// Create a new schedule with a generated UUID
    pub fn new(cron_expr: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            cron_expr: cron_expr.into(),
            task: task.into(),
        }
    }

    /// The weekly digest schedule
    pub fn weekly_digest(cron_expr: impl Into<String>) -> Self {
        Self::new(cron_expr, WEEKLY_DIGEST_TASK)
    }

    /// Parse the cron expression
    pub fn parse(&self) -> Result<cron::Schedule> {
        cron::Schedule::from_str(&self.cron_expr)
            .with_context(|| format!("Invalid cron expression: {}", self.cron_expr))
    }

    /// Validate the cron expression and bind it to this schedule
    pub fn timetable(self) -> Result<Timetable> {
        let cron = self.parse()?;
        Ok(Timetable {
            schedule: self,
            cron,
        })
    }

    pub fn description(&self) -> String {
        format!("Scheduled task '{}' (cron: {})", self.task, self.cron_expr)
    }
}

/// Next firing strictly after `after`, in the same timezone
pub fn next_fire<Z: TimeZone>(schedule: &cron::Schedule, after: &DateTime<Z>) -> Option<DateTime<Z>> {
    schedule.after(after).next()
}

/// A schedule whose cron expression is known to be valid
#[derive(Debug, Clone)]
pub struct Timetable {
    schedule: Schedule,
    cron: cron::Schedule,
}

/// The next firing of a timetable and how far away it is
#[derive(Debug, Clone, PartialEq)]
pub struct Upcoming<Z: TimeZone> {
    pub at: DateTime<Z>,
    pub wait: Duration,
}

impl Timetable {
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Firing after `now`, or `None` once the expression has no more
    pub fn upcoming<Z: TimeZone>(&self, now: &DateTime<Z>) -> Option<Upcoming<Z>> {
        let at = next_fire(&self.cron, now)?;
        let wait = (at.clone() - now.clone()).to_std().unwrap_or(Duration::ZERO);
        Some(Upcoming { at, wait })
    }

    /// Event for a firing that was due at `at`
    pub fn event_at(&self, at: DateTime<Local>) -> ScheduleEvent {
        ScheduleEvent {
            schedule_id: self.schedule.id.clone(),
            task: self.schedule.task.clone(),
            fired_at: at,
        }
    }
}

/// Emitted every time a schedule fires
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEvent {
    /// ID of the schedule that fired
    pub schedule_id: String,

    /// Task name carried by the schedule
    pub task: String,

    /// Local time the firing was due
    pub fired_at: DateTime<Local>,
}

impl ScheduleEvent {
    /// Event for a firing happening right now
    pub fn fired(schedule_id: String, task: String) -> Self {
        Self {
            schedule_id,
            task,
            fired_at: Local::now(),
        }
    }
}
