//! Deferred and periodic jobs: the render timer and the auto-removal delay.
//!
//! [`TokioScheduler`] runs jobs on a tokio runtime. [`ManualScheduler`] runs
//! them on a virtual timeline that only moves through [`ManualScheduler::advance`].

use crate::core::clock::{self, Clock, ManualClock};
use chrono::{DateTime, Utc};
use std::io;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::time::{Instant, MissedTickBehavior};

pub type Job = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingJob = Arc<dyn Fn() + Send + Sync + 'static>;

pub trait Scheduler: Send + Sync {
    fn schedule_once(&self, delay: Duration, job: Job) -> ScheduledTask;
    fn schedule_repeating(&self, period: Duration, job: RepeatingJob) -> ScheduledTask;
}

/// Handle to a scheduled job. Dropping it leaves the job scheduled.
pub struct ScheduledTask {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ScheduledTask {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

pub struct TokioScheduler {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl TokioScheduler {
    /// Uses the ambient runtime if there is one, otherwise starts a private
    /// single-worker runtime.
    pub fn new() -> io::Result<Self> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self::with_handle(handle));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("progress-logger-timer")
            .enable_time()
            .build()?;
        log::debug!("Started private timer runtime");
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, job: Job) -> ScheduledTask {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            job();
        });
        ScheduledTask::new(move || task.abort())
    }

    fn schedule_repeating(&self, period: Duration, job: RepeatingJob) -> ScheduledTask {
        let task = self.handle.spawn(async move {
            // First tick one period from now, not immediately
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                job();
            }
        });
        ScheduledTask::new(move || task.abort())
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

enum ManualJob {
    Once(Job),
    Repeating(RepeatingJob, Duration),
}

struct ManualEntry {
    id: u64,
    due: DateTime<Utc>,
    job: ManualJob,
}

#[derive(Default)]
struct ManualQueue {
    next_id: u64,
    entries: Vec<ManualEntry>,
}

/// Virtual-time scheduler paired with a [`ManualClock`].
#[derive(Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    queue: Arc<Mutex<ManualQueue>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            queue: Arc::new(Mutex::new(ManualQueue::default())),
        }
    }

    /// Number of jobs still scheduled
    pub fn pending(&self) -> usize {
        self.lock_queue().entries.len()
    }

    /// Moves the clock forward by `by`, running every job that falls due on
    /// the way in due-time order. Jobs may schedule or cancel other jobs.
    pub fn advance(&self, by: Duration) {
        let target = clock::add_saturating(self.clock.now(), by);

        while let Some((due, job)) = self.next_due(target) {
            self.clock.set(due);
            match job {
                ManualJob::Once(job) => job(),
                ManualJob::Repeating(job, _) => job(),
            }
        }

        self.clock.set(target);
    }

    fn next_due(&self, target: DateTime<Utc>) -> Option<(DateTime<Utc>, ManualJob)> {
        let mut queue = self.lock_queue();
        let index = queue
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due <= target)
            .min_by_key(|(_, entry)| (entry.due, entry.id))
            .map(|(index, _)| index)?;

        if matches!(queue.entries[index].job, ManualJob::Once(_)) {
            let entry = queue.entries.remove(index);
            return Some((entry.due, entry.job));
        }

        // Repeating jobs stay queued so they can cancel themselves while running
        let entry = &mut queue.entries[index];
        let due = entry.due;
        let ManualJob::Repeating(job, period) = &entry.job else {
            return None;
        };
        let (job, period) = (Arc::clone(job), *period);
        let next = clock::add_saturating(due, period);
        if next > due {
            entry.due = next;
        } else {
            // Pinned at the end of time, this is the last run
            queue.entries.remove(index);
        }
        Some((due, ManualJob::Repeating(job, period)))
    }

    fn push(&self, delay: Duration, job: ManualJob) -> ScheduledTask {
        let due = clock::add_saturating(self.clock.now(), delay);
        let id = {
            let mut queue = self.lock_queue();
            let id = queue.next_id;
            queue.next_id += 1;
            queue.entries.push(ManualEntry { id, due, job });
            id
        };

        let queue: Weak<Mutex<ManualQueue>> = Arc::downgrade(&self.queue);
        ScheduledTask::new(move || {
            if let Some(queue) = queue.upgrade() {
                let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
                queue.entries.retain(|entry| entry.id != id);
            }
        })
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, ManualQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, job: Job) -> ScheduledTask {
        self.push(delay, ManualJob::Once(job))
    }

    fn schedule_repeating(&self, period: Duration, job: RepeatingJob) -> ScheduledTask {
        // A zero period would never let the clock move past the first tick
        let period = period.max(Duration::from_millis(1));
        self.push(period, ManualJob::Repeating(job, period))
    }
}
