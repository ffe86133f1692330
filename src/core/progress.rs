//! A single named tracker and its lifecycle.
//!
//! ```text
//! initial ──set_total──▶ running ──pause──▶ paused
//!                           ▲  │ ◀──resume──┘
//!                           │  └──current >= total──▶ finished
//! ```
//!
//! A tracker never talks to the registry or the renderer directly. State
//! changes are reported to the [`ProgressListener`]s of its [`ProgressContext`],
//! always after the internal lock has been released so listeners may read
//! the tracker back.

use crate::core::calculator;
use crate::core::clock::{Clock, SystemClock};
use crate::core::error::{ProgressError, Result};
use crate::core::models::{ProgressMetrics, ProgressState, ProgressStatus};
use crate::core::scheduler::{ScheduledTask, Scheduler};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// How long a finished tracker stays visible before it asks to be removed
pub const AUTO_REMOVE_DELAY: Duration = Duration::from_millis(3000);

/// Observer of tracker lifecycle events
#[allow(unused_variables)]
pub trait ProgressListener: Send + Sync {
    /// The tracker entered `running`, either for the first time or on resume
    fn on_started(&self, progress: &Progress) {}

    /// The tracker reached its total
    fn on_finished(&self, progress: &Progress) {}

    /// The tracker asked to be removed, manually or after finishing
    fn on_done(&self, progress: &Progress) {}
}

/// Collaborators handed to every tracker a registry creates
#[derive(Clone)]
pub struct ProgressContext {
    clock: Arc<dyn Clock>,
    scheduler: Option<Arc<dyn Scheduler>>,
    listeners: Vec<Arc<dyn ProgressListener>>,
    removal_delay: Duration,
}

impl ProgressContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            scheduler: None,
            listeners: Vec::new(),
            removal_delay: AUTO_REMOVE_DELAY,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_removal_delay(mut self, delay: Duration) -> Self {
        self.removal_delay = delay;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

struct ProgressInner {
    name: String,
    state: Mutex<ProgressState>,
    pending_removal: Mutex<Option<ScheduledTask>>,
    context: ProgressContext,
}

/// Handle to a tracker. Clones refer to the same tracker.
#[derive(Clone)]
pub struct Progress {
    inner: Arc<ProgressInner>,
}

impl Progress {
    /// A standalone tracker with the system clock and no listeners
    pub fn new(name: &str) -> Self {
        Self::with_context(name, ProgressContext::default())
    }

    pub fn with_context(name: &str, context: ProgressContext) -> Self {
        let state = ProgressState::new(name, context.now());
        Self {
            inner: Arc::new(ProgressInner {
                name: name.to_string(),
                state: Mutex::new(state),
                pending_removal: Mutex::new(None),
                context,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Sets the target value. The first call starts tracking.
    pub fn set_total(&self, total: i64) -> Result<&Self> {
        if total < 0 {
            return Err(ProgressError::NegativeTotal(total));
        }

        let now = self.inner.context.now();
        let (started, finished) = {
            let mut state = self.lock_state();
            state.total = Some(total);
            state.last_updated_at = now;

            // Repeated calls must not move the rate baseline
            let started = state.status == ProgressStatus::Initial;
            if started {
                state.status = ProgressStatus::Running;
                state.started_at = Some(now);
                state.start_current = state.current;
            }
            (started, Self::finish_if_complete(&mut state))
        };

        if started {
            debug!("Tracker '{}' started with total {total}", self.name());
            self.emit(|listener, progress| listener.on_started(progress));
        }
        if finished {
            self.handle_finished();
        }
        Ok(self)
    }

    /// Negative values are clamped to 0 with a warning.
    pub fn set_current(&self, value: i64) -> &Self {
        let value = if value < 0 {
            warn!(
                "Tracker '{}': clamping negative current value {value} to 0",
                self.name()
            );
            0
        } else {
            value
        };

        self.mutate_current(|_| value)
    }

    /// Negative steps are allowed for corrections; `current` never drops below 0.
    pub fn increment(&self, by: i64) -> &Self {
        self.mutate_current(|current| current.saturating_add(by).max(0))
    }

    pub fn pause(&self) -> &Self {
        let now = self.inner.context.now();
        let paused = {
            let mut state = self.lock_state();
            match (state.status, state.started_at) {
                (ProgressStatus::Running, Some(started_at)) => {
                    state.pause_buffer += (now - started_at).num_milliseconds().max(0);
                    state.status = ProgressStatus::Paused;
                    state.last_updated_at = now;
                    true
                }
                _ => false,
            }
        };

        if paused {
            debug!("Tracker '{}' paused", self.name());
        }
        self
    }

    pub fn resume(&self) -> &Self {
        let now = self.inner.context.now();
        let resumed = {
            let mut state = self.lock_state();
            if state.status == ProgressStatus::Paused {
                state.status = ProgressStatus::Running;
                state.started_at = Some(now);
                state.last_updated_at = now;
                true
            } else {
                false
            }
        };

        if resumed {
            debug!("Tracker '{}' resumed", self.name());
            self.emit(|listener, progress| listener.on_started(progress));
        }
        self
    }

    /// Asks listeners to remove this tracker. Cancels a pending auto-removal.
    pub fn done(&self) -> &Self {
        if let Some(task) = self.lock_pending_removal().take() {
            task.cancel();
        }
        self.lock_state().last_updated_at = self.inner.context.now();
        self.emit(|listener, progress| listener.on_done(progress));
        self
    }

    pub fn count(&self, counter: &str, by: i64) -> &Self {
        let now = self.inner.context.now();
        let mut state = self.lock_state();
        state.counters.add(counter, by);
        state.last_updated_at = now;
        drop(state);
        self
    }

    pub fn reset_counter(&self, counter: &str) -> &Self {
        let now = self.inner.context.now();
        let mut state = self.lock_state();
        state.counters.reset(counter);
        state.last_updated_at = now;
        drop(state);
        self
    }

    pub fn state(&self) -> ProgressState {
        self.lock_state().clone()
    }

    pub fn status(&self) -> ProgressStatus {
        self.lock_state().status
    }

    pub fn metrics(&self) -> ProgressMetrics {
        calculator::metrics(&self.state(), self.inner.context.now())
    }

    pub fn is_active(&self) -> bool {
        self.status() == ProgressStatus::Running
    }

    /// Whether both handles refer to the same tracker
    pub fn ptr_eq(&self, other: &Progress) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn mutate_current(&self, update: impl FnOnce(i64) -> i64) -> &Self {
        let now = self.inner.context.now();
        let finished = {
            let mut state = self.lock_state();
            state.current = update(state.current);
            state.last_updated_at = now;
            Self::finish_if_complete(&mut state)
        };

        if finished {
            self.handle_finished();
        }
        self
    }

    fn finish_if_complete(state: &mut ProgressState) -> bool {
        let complete = matches!(state.total, Some(total) if state.current >= total);
        if state.status == ProgressStatus::Running && complete {
            state.status = ProgressStatus::Finished;
            true
        } else {
            false
        }
    }

    fn handle_finished(&self) {
        debug!("Tracker '{}' finished", self.name());
        self.emit(|listener, progress| listener.on_finished(progress));

        let Some(scheduler) = &self.inner.context.scheduler else {
            debug!(
                "No scheduler configured, tracker '{}' will not be removed automatically",
                self.name()
            );
            return;
        };

        let weak: Weak<ProgressInner> = Arc::downgrade(&self.inner);
        let task = scheduler.schedule_once(
            self.inner.context.removal_delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let progress = Progress { inner };
                    progress.lock_pending_removal().take();
                    debug!("Auto-removing finished tracker '{}'", progress.name());
                    progress.emit(|listener, progress| listener.on_done(progress));
                }
            }),
        );
        *self.lock_pending_removal() = Some(task);
    }

    fn emit(&self, event: impl Fn(&dyn ProgressListener, &Progress)) {
        for listener in &self.inner.context.listeners {
            event(listener.as_ref(), self);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ProgressState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending_removal(&self) -> MutexGuard<'_, Option<ScheduledTask>> {
        self.inner
            .pending_removal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("state", &*self.lock_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::scheduler::ManualScheduler;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, kind: &str, progress: &Progress) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{kind}:{}", progress.name()));
        }
    }

    impl ProgressListener for RecordingListener {
        fn on_started(&self, progress: &Progress) {
            self.record("started", progress);
        }

        fn on_finished(&self, progress: &Progress) {
            // Listeners run without the state lock held
            assert_eq!(progress.status(), ProgressStatus::Finished);
            self.record("finished", progress);
        }

        fn on_done(&self, progress: &Progress) {
            self.record("done", progress);
        }
    }

    struct Fixture {
        clock: ManualClock,
        scheduler: ManualScheduler,
        listener: Arc<RecordingListener>,
        context: ProgressContext,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::default();
        let scheduler = ManualScheduler::new(clock.clone());
        let listener = Arc::new(RecordingListener::default());
        let context = ProgressContext::new(Arc::new(clock.clone()))
            .with_scheduler(Arc::new(scheduler.clone()))
            .with_listener(listener.clone());
        Fixture {
            clock,
            scheduler,
            listener,
            context,
        }
    }

    #[test]
    fn test_new_tracker_is_initial() {
        let progress = Progress::new("test");
        let state = progress.state();

        assert_eq!(progress.name(), "test");
        assert_eq!(state.status, ProgressStatus::Initial);
        assert_eq!(state.current, 0);
        assert_eq!(state.total, None);
        assert!(!progress.is_active());
    }

    #[test]
    fn test_set_total_starts_tracking() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_current(5);
        progress.set_total(100).unwrap();

        let state = progress.state();
        assert_eq!(state.status, ProgressStatus::Running);
        assert_eq!(state.total, Some(100));
        assert_eq!(state.started_at, Some(fx.clock.now()));
        assert_eq!(state.start_current, 5);
        assert!(progress.is_active());
        assert_eq!(fx.listener.events(), vec!["started:test"]);
    }

    #[test]
    fn test_set_total_rejects_negative() {
        let progress = Progress::new("test");
        let err = progress.set_total(-1).unwrap_err();

        assert!(matches!(err, ProgressError::NegativeTotal(-1)));
        assert_eq!(progress.state().status, ProgressStatus::Initial);
        assert_eq!(progress.state().total, None);
    }

    #[test]
    fn test_repeated_set_total_keeps_baseline() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(100).unwrap();
        let started_at = progress.state().started_at;

        fx.clock.advance(Duration::from_secs(5));
        progress.set_current(20).set_total(200).unwrap();

        let state = progress.state();
        assert_eq!(state.started_at, started_at);
        assert_eq!(state.start_current, 0);
        assert_eq!(state.total, Some(200));
        assert_eq!(fx.listener.events(), vec!["started:test"]);
    }

    #[test]
    fn test_set_current_clamps_negative() {
        let progress = Progress::new("test");
        progress.set_current(-10);
        assert_eq!(progress.state().current, 0);
    }

    #[test]
    fn test_increment_clamps_at_zero() {
        let progress = Progress::new("test");
        progress.set_current(10).increment(-20);

        let state = progress.state();
        assert_eq!(state.current, 0);
        assert_eq!(state.status, ProgressStatus::Initial);
    }

    #[test]
    fn test_increment_by_default_step() {
        let progress = Progress::new("test");
        progress.increment(1).increment(1).increment(5);
        assert_eq!(progress.state().current, 7);
    }

    #[test]
    fn test_reaching_total_finishes() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(10).unwrap().set_current(10);

        assert_eq!(progress.status(), ProgressStatus::Finished);
        assert_eq!(progress.metrics().percentage, 100);
        assert!(!progress.is_active());
        assert_eq!(fx.listener.events(), vec!["started:test", "finished:test"]);
    }

    #[test]
    fn test_set_total_already_reached_finishes() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_current(50);
        progress.set_total(50).unwrap();

        assert_eq!(progress.status(), ProgressStatus::Finished);
    }

    #[test]
    fn test_finished_is_terminal() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(10).unwrap().set_current(10);

        progress.increment(-5).set_current(3).resume();
        progress.set_current(20);

        assert_eq!(progress.status(), ProgressStatus::Finished);
        assert_eq!(
            fx.listener
                .events()
                .iter()
                .filter(|e| e.starts_with("finished"))
                .count(),
            1
        );
    }

    #[test]
    fn test_finished_tracker_requests_removal_after_delay() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(1).unwrap().increment(1);

        fx.scheduler.advance(Duration::from_millis(2999));
        assert!(!fx.listener.events().contains(&"done:test".to_string()));

        fx.scheduler.advance(Duration::from_millis(1));
        assert_eq!(
            fx.listener.events(),
            vec!["started:test", "finished:test", "done:test"]
        );
    }

    #[test]
    fn test_manual_done_cancels_auto_removal() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(1).unwrap().increment(1);
        assert_eq!(fx.scheduler.pending(), 1);

        progress.done();
        assert_eq!(fx.scheduler.pending(), 0);

        fx.scheduler.advance(Duration::from_secs(10));
        let done_events = fx
            .listener
            .events()
            .iter()
            .filter(|e| e.starts_with("done"))
            .count();
        assert_eq!(done_events, 1);
    }

    #[test]
    fn test_done_does_not_change_status() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(10).unwrap().done();

        assert_eq!(progress.status(), ProgressStatus::Running);
        assert_eq!(fx.listener.events(), vec!["started:test", "done:test"]);
    }

    #[test]
    fn test_pause_accumulates_buffer() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(100).unwrap();

        fx.clock.advance(Duration::from_millis(1500));
        progress.pause();

        let state = progress.state();
        assert_eq!(state.status, ProgressStatus::Paused);
        assert_eq!(state.pause_buffer, 1500);
    }

    #[test]
    fn test_pause_twice_is_idempotent() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(100).unwrap();

        fx.clock.advance(Duration::from_millis(1000));
        progress.pause();
        fx.clock.advance(Duration::from_millis(5000));
        progress.pause();

        assert_eq!(progress.state().pause_buffer, 1000);
    }

    #[test]
    fn test_pause_resume_pause_round_trip() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(100).unwrap();

        fx.clock.advance(Duration::from_millis(2000));
        progress.pause();
        let initial_buffer = progress.state().pause_buffer;

        fx.clock.advance(Duration::from_millis(10_000));
        progress.resume();
        fx.clock.advance(Duration::from_millis(700));
        progress.pause();

        assert_eq!(progress.state().pause_buffer, initial_buffer + 700);
    }

    #[test]
    fn test_pause_and_resume_are_noops_in_wrong_state() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());

        progress.pause().resume();
        assert_eq!(progress.status(), ProgressStatus::Initial);

        progress.set_total(10).unwrap().resume();
        assert_eq!(progress.status(), ProgressStatus::Running);
        assert_eq!(fx.listener.events(), vec!["started:test"]);
    }

    #[test]
    fn test_resume_keeps_rate_baseline() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_current(3).set_total(100).unwrap();
        progress.increment(10).pause();

        fx.clock.advance(Duration::from_secs(1));
        progress.resume();

        let state = progress.state();
        assert_eq!(state.start_current, 3);
        assert_eq!(state.started_at, Some(fx.clock.now()));
        assert_eq!(
            fx.listener.events(),
            vec!["started:test", "started:test"]
        );
    }

    #[test]
    fn test_paused_elapsed_is_frozen() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(100).unwrap();

        fx.clock.advance(Duration::from_millis(4000));
        progress.pause();
        fx.clock.advance(Duration::from_millis(60_000));

        assert_eq!(progress.metrics().elapsed, 4000);
    }

    #[test]
    fn test_counters() {
        let progress = Progress::new("test");
        progress
            .count("errors", 1)
            .count("errors", 2)
            .count("warnings", 5)
            .count("skipped", 0)
            .count("delta", 5)
            .count("delta", -3);

        let state = progress.state();
        assert_eq!(state.counters.get("errors"), Some(3));
        assert_eq!(state.counters.get("warnings"), Some(5));
        assert_eq!(state.counters.get("skipped"), Some(0));
        assert_eq!(state.counters.get("delta"), Some(2));
    }

    #[test]
    fn test_counters_work_while_paused() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());
        progress.set_total(10).unwrap().count("errors", 2).pause();
        progress.count("errors", 3).resume();

        assert_eq!(progress.state().counters.get("errors"), Some(5));
    }

    #[test]
    fn test_reset_counter() {
        let progress = Progress::new("test");
        progress.count("errors", 5).reset_counter("errors");
        progress.reset_counter("retries").count("errors", 1);

        let state = progress.state();
        assert_eq!(state.counters.get("errors"), Some(1));
        assert_eq!(state.counters.get("retries"), Some(0));
    }

    #[test]
    fn test_state_is_a_copy() {
        let progress = Progress::new("test");
        progress.count("errors", 5);

        let mut first = progress.state();
        let second = progress.state();
        first.counters.add("errors", 100);
        first.current = 999;

        assert_eq!(second.counters.get("errors"), Some(5));
        assert_eq!(progress.state().counters.get("errors"), Some(5));
        assert_eq!(progress.state().current, 0);
    }

    #[test]
    fn test_mutations_update_last_updated_at() {
        let fx = fixture();
        let progress = Progress::with_context("test", fx.context.clone());

        fx.clock.advance(Duration::from_secs(1));
        progress.increment(1);
        assert_eq!(progress.state().last_updated_at, fx.clock.now());

        fx.clock.advance(Duration::from_secs(1));
        progress.count("errors", 1);
        assert_eq!(progress.state().last_updated_at, fx.clock.now());
    }

    #[test]
    fn test_clones_share_state() {
        let progress = Progress::new("test");
        let other = progress.clone();
        other.increment(3);

        assert_eq!(progress.state().current, 3);
        assert!(progress.ptr_eq(&other));
        assert!(!progress.ptr_eq(&Progress::new("test")));
    }
}
