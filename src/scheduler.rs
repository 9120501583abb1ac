use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::TaskId;

/// Seconds between scheduling a deletion and the task being removed.
pub const DELETION_DELAY_SECS: u32 = 5;

const TICK: Duration = Duration::from_secs(1);

pub type ExpireCallback = Arc<dyn Fn(TaskId) + Send + Sync>;

#[derive(Debug)]
pub enum SchedulerError {
    NoRuntime(tokio::runtime::TryCurrentError),
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::NoRuntime(err) => write!(f, "no async runtime: {err}"),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<tokio::runtime::TryCurrentError> for SchedulerError {
    fn from(value: tokio::runtime::TryCurrentError) -> Self {
        SchedulerError::NoRuntime(value)
    }
}

#[derive(Debug)]
struct DeletionTimer {
    handle: JoinHandle<()>,
    time_left: u32,
    generation: u64,
}

#[derive(Debug, Default)]
struct Timers {
    entries: HashMap<TaskId, DeletionTimer>,
    next_generation: u64,
}

/// Per-task countdowns for the undo window before a hard delete.
///
/// Each pending task owns one tokio task ticking once per second. The map entry is the
/// source of truth: a tick whose entry is gone (cancelled) or belongs to a newer
/// generation (restarted) does nothing.
#[derive(Debug, Default)]
pub struct DeletionScheduler {
    inner: Arc<Mutex<Timers>>,
}

impl DeletionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the countdown for `task_id`. Restarting a pending task resets it to the full delay.
    pub fn start(&self, task_id: TaskId, on_expire: ExpireCallback) -> Result<(), SchedulerError> {
        let runtime = Handle::try_current()?;
        let mut guard = self.inner.lock().expect("scheduler poisoned");
        guard.next_generation += 1;
        let generation = guard.next_generation;
        let handle = runtime.spawn(run_countdown(
            Arc::clone(&self.inner),
            task_id,
            generation,
            on_expire,
        ));
        let previous = guard.entries.insert(
            task_id,
            DeletionTimer {
                handle,
                time_left: DELETION_DELAY_SECS,
                generation,
            },
        );
        if let Some(previous) = previous {
            previous.handle.abort();
            log::debug!("deletion countdown restarted task_id={task_id}");
        } else {
            log::debug!("deletion countdown started task_id={task_id}");
        }
        Ok(())
    }

    /// Stops the countdown; returns whether one was running.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        let removed = self
            .inner
            .lock()
            .expect("scheduler poisoned")
            .entries
            .remove(&task_id);
        match removed {
            Some(timer) => {
                timer.handle.abort();
                log::debug!("deletion countdown cancelled task_id={task_id}");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, task_id: TaskId) -> bool {
        let guard = self.inner.lock().expect("scheduler poisoned");
        guard.entries.contains_key(&task_id)
    }

    /// Seconds left for `task_id`, or the full delay when nothing is scheduled.
    pub fn time_left(&self, task_id: TaskId) -> u32 {
        let guard = self.inner.lock().expect("scheduler poisoned");
        guard
            .entries
            .get(&task_id)
            .map(|timer| timer.time_left)
            .unwrap_or(DELETION_DELAY_SECS)
    }

    pub fn pending_ids(&self) -> Vec<TaskId> {
        let guard = self.inner.lock().expect("scheduler poisoned");
        let mut ids: Vec<TaskId> = guard.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn dispose(&self) {
        let drained: Vec<DeletionTimer> = {
            let mut guard = self.inner.lock().expect("scheduler poisoned");
            guard.entries.drain().map(|(_, timer)| timer).collect()
        };
        if !drained.is_empty() {
            log::debug!("deletion scheduler disposed pending={}", drained.len());
        }
        for timer in drained {
            timer.handle.abort();
        }
    }
}

impl Drop for DeletionScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn run_countdown(
    timers: Arc<Mutex<Timers>>,
    task_id: TaskId,
    generation: u64,
    on_expire: ExpireCallback,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let expired = {
            let mut guard = timers.lock().expect("scheduler poisoned");
            let remaining = match guard.entries.get_mut(&task_id) {
                Some(timer) if timer.generation == generation => {
                    timer.time_left = timer.time_left.saturating_sub(1);
                    timer.time_left
                }
                _ => return,
            };
            if remaining == 0 {
                guard.entries.remove(&task_id);
            }
            remaining == 0
        };
        if expired {
            log::info!("deletion countdown expired task_id={task_id}");
            on_expire(task_id);
            return;
        }
    }
}
