//! Tokio task runner for schedules
//!
//! Each schedule runs in its own task that sleeps until the next local
//! occurrence and then emits a [`ScheduleEvent`].

use crate::schedule::{Schedule, ScheduleEvent, Timetable};
use anyhow::Result;
use chrono::Local;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type ActiveTasks = Arc<RwLock<HashMap<String, CancellationToken>>>;

/// Manages the lifecycle of schedule tasks
pub struct ScheduleRunner {
    /// Channel for emitting schedule events
    event_tx: mpsc::UnboundedSender<ScheduleEvent>,

    /// Active schedule tasks (schedule_id -> CancellationToken)
    active_tasks: ActiveTasks,

    /// Parent of every task token; cancelling it stops them all
    shutdown_token: CancellationToken,
}

impl ScheduleRunner {
    pub fn new(event_tx: mpsc::UnboundedSender<ScheduleEvent>) -> Self {
        Self {
            event_tx,
            active_tasks: Arc::new(RwLock::new(HashMap::new())),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Start a schedule. Starting an already running schedule is a no-op.
    pub async fn start(&self, schedule: Schedule) -> Result<()> {
        if self.active_tasks.read().await.contains_key(&schedule.id) {
            warn!("Schedule {} is already running", schedule.id);
            return Ok(());
        }

        let timetable = schedule.timetable()?;
        let id = timetable.schedule().id.clone();
        info!("Starting schedule: {} ({})", id, timetable.schedule().description());

        let cancel = self.shutdown_token.child_token();
        self.active_tasks.write().await.insert(id.clone(), cancel.clone());

        let event_tx = self.event_tx.clone();
        let active_tasks = self.active_tasks.clone();
        tokio::spawn(async move {
            drive(&timetable, &event_tx, &cancel).await;
            // Entry may already be gone if stop() ran first
            if active_tasks.write().await.remove(&id).is_some() {
                debug!("Schedule {} cleaned up from active tasks", id);
            }
        });

        Ok(())
    }

    /// Stop a specific schedule
    pub async fn stop(&self, id: &str) -> bool {
        if let Some(token) = self.active_tasks.write().await.remove(id) {
            info!("Stopping schedule: {}", id);
            token.cancel();
            true
        } else {
            warn!("Attempted to stop non-running schedule: {}", id);
            false
        }
    }

    /// Stop all schedules
    pub async fn stop_all(&self) {
        info!("Stopping all schedules");
        self.shutdown_token.cancel();
        self.active_tasks.write().await.clear();
    }

    pub async fn active_count(&self) -> usize {
        self.active_tasks.read().await.len()
    }
}

/// Sleep to each upcoming firing and emit its event until cancelled, the
/// receiver goes away, or the expression runs out of occurrences
async fn drive(
    timetable: &Timetable,
    events: &mpsc::UnboundedSender<ScheduleEvent>,
    cancel: &CancellationToken,
) {
    let id = &timetable.schedule().id;
    let mut after = Local::now();
    while let Some(upcoming) = timetable.upcoming(&after) {
        debug!("Schedule {} next run at {} (in {:?})", id, upcoming.at, upcoming.wait);

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Schedule {} cancelled", id);
                return;
            }
            _ = tokio::time::sleep(upcoming.wait) => {}
        }

        // Never look up the firing that just happened again
        after = Local::now().max(upcoming.at);
        let event = timetable.event_at(upcoming.at);
        info!("Scheduled task '{}' triggered", event.task);
        if events.send(event).is_err() {
            warn!("Schedule {} has no event receiver, stopping", id);
            return;
        }
    }
    error!(
        "No next occurrence for cron expression {}",
        timetable.schedule().cron_expr
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{DEFAULT_DIGEST_CRON, WEEKLY_DIGEST_TASK};
    use std::time::Duration;

    #[tokio::test]
    async fn test_runner_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let runner = ScheduleRunner::new(tx);
        assert_eq!(runner.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_stop_schedule() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let runner = ScheduleRunner::new(tx);

        let schedule = Schedule::weekly_digest(DEFAULT_DIGEST_CRON);
        let id = schedule.id.clone();

        runner.start(schedule).await.unwrap();
        assert_eq!(runner.active_count().await, 1);

        assert!(runner.stop(&id).await);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runner.active_count().await, 0);
        assert!(!runner.stop(&id).await);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let runner = ScheduleRunner::new(tx);
        let schedule = Schedule::weekly_digest(DEFAULT_DIGEST_CRON);

        runner.start(schedule.clone()).await.unwrap();
        runner.start(schedule).await.unwrap();
        assert_eq!(runner.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_cron_not_started() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let runner = ScheduleRunner::new(tx);
        let result = runner.start(Schedule::weekly_digest("not a cron")).await;
        assert!(result.is_err());
        assert_eq!(runner.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_every_second_schedule_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = ScheduleRunner::new(tx);
        let schedule = Schedule::new("* * * * * *", WEEKLY_DIGEST_TASK);
        let id = schedule.id.clone();

        runner.start(schedule).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        assert_eq!(event.schedule_id, id);
        assert_eq!(event.task, WEEKLY_DIGEST_TASK);

        runner.stop_all().await;
        assert_eq!(runner.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_stop_all_cancels_running_tasks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = ScheduleRunner::new(tx);
        runner.start(Schedule::weekly_digest(DEFAULT_DIGEST_CRON)).await.unwrap();
        runner.start(Schedule::new("0 0 0 1 1 *", "yearly")).await.unwrap();
        assert_eq!(runner.active_count().await, 2);

        runner.stop_all().await;
        assert_eq!(runner.active_count().await, 0);
        drop(runner);

        // Every task has exited once its sender clone is dropped
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }

    #[tokio::test]
    async fn test_fired_event_carries_due_time() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = ScheduleRunner::new(tx);
        runner.start(Schedule::new("* * * * * *", WEEKLY_DIGEST_TASK)).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        assert_eq!(event.fired_at.timestamp_subsec_nanos(), 0);

        runner.stop_all().await;
    }
}
