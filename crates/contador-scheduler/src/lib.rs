//! Cron scheduling for contador
//!
//! Schedules fire [`ScheduleEvent`]s over an unbounded channel; the
//! receiver decides what each task name means.

pub mod runner;
pub mod schedule;

pub use runner::ScheduleRunner;
pub use schedule::{
    DEFAULT_DIGEST_CRON, Schedule, ScheduleEvent, Timetable, Upcoming, WEEKLY_DIGEST_TASK,
};
