//! Process-level glue: one registry, one renderer and the render timer.
//!
//! The timer starts the first time a tracker becomes active, renders on every
//! tick and stops itself once no tracker is active any more. Finishing a
//! tracker renders immediately; removal requests drop it from the registry.

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::{ConfigService, LoggerConfig};
use crate::core::error::Result;
use crate::core::progress::{AUTO_REMOVE_DELAY, Progress, ProgressContext, ProgressListener};
use crate::core::registry::ProgressRegistry;
use crate::core::renderer::Renderer;
use crate::core::scheduler::{ScheduledTask, Scheduler, TokioScheduler};
use crate::terminal::{StdTerminal, Terminal};
use log::debug;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

static GLOBAL: OnceLock<ProgressLogger> = OnceLock::new();

pub struct ProgressLoggerBuilder {
    config: LoggerConfig,
    terminal: Option<Box<dyn Terminal + Send>>,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    removal_delay: Duration,
}

impl ProgressLoggerBuilder {
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            terminal: None,
            clock: None,
            scheduler: None,
            removal_delay: AUTO_REMOVE_DELAY,
        }
    }

    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to stdout
    pub fn terminal(mut self, terminal: impl Terminal + Send + 'static) -> Self {
        self.terminal = Some(Box::new(terminal));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Without a scheduler there is no render timer and no auto-removal;
    /// `render()` must then be called by the owner.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn removal_delay(mut self, delay: Duration) -> Self {
        self.removal_delay = delay;
        self
    }

    pub fn build(self) -> Result<ProgressLogger> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let terminal = self.terminal.unwrap_or_else(|| Box::new(StdTerminal));
        let scheduler = self.scheduler;
        let config = self.config;
        let removal_delay = self.removal_delay;

        let inner = Arc::new_cyclic(|this: &Weak<LoggerInner>| {
            let hooks = Arc::new(LoggerHooks {
                logger: this.clone(),
            });
            let mut context = ProgressContext::new(clock)
                .with_listener(hooks)
                .with_removal_delay(removal_delay);
            if let Some(scheduler) = &scheduler {
                context = context.with_scheduler(Arc::clone(scheduler));
            }

            LoggerInner {
                this: this.clone(),
                registry: ProgressRegistry::with_context(context),
                renderer: Renderer::new(terminal),
                config: Mutex::new(config),
                scheduler,
                timer: Mutex::new(TimerSlot::default()),
            }
        });

        Ok(ProgressLogger { inner })
    }
}

impl Default for ProgressLoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a logger. Clones share the same registry and timer; the timer
/// stops when the last handle is dropped.
#[derive(Clone)]
pub struct ProgressLogger {
    inner: Arc<LoggerInner>,
}

impl ProgressLogger {
    pub fn builder() -> ProgressLoggerBuilder {
        ProgressLoggerBuilder::new()
    }

    /// The process-wide logger: stdout, system clock, tokio timer and the
    /// configuration from the default config file and environment.
    pub fn global() -> io::Result<&'static ProgressLogger> {
        if let Some(logger) = GLOBAL.get() {
            return Ok(logger);
        }

        let logger = Self::builder()
            .config(ConfigService::load_default())
            .scheduler(Arc::new(TokioScheduler::new()?))
            .build()?;
        Ok(GLOBAL.get_or_init(|| logger))
    }

    /// Returns the tracker for `name`, creating it on first use
    pub fn get(&self, name: &str) -> Progress {
        self.inner.registry.get(name)
    }

    pub fn registry(&self) -> &ProgressRegistry {
        &self.inner.registry
    }

    /// Draws one frame now
    pub fn render(&self) {
        self.inner.render();
    }

    pub fn set_quiet(&self, quiet: bool) {
        self.inner.lock_config().quiet = quiet;
    }

    /// Changes the timer period; a running timer is restarted with it
    pub fn set_refresh_interval(&self, interval: Duration) -> Result<()> {
        self.inner.lock_config().set_refresh_interval(interval)?;
        self.inner.restart_timer(interval);
        Ok(())
    }

    pub fn config(&self) -> LoggerConfig {
        self.inner.lock_config().clone()
    }

    /// Whether the render timer is running
    pub fn is_rendering(&self) -> bool {
        self.inner.lock_timer().running.is_some()
    }

    /// Drops every tracker and stops the timer
    pub fn stop_all(&self) {
        self.inner.registry.clear();
        self.inner.stop_timer();
    }
}

struct Timer {
    generation: u64,
    task: ScheduledTask,
}

#[derive(Default)]
struct TimerSlot {
    next_generation: u64,
    running: Option<Timer>,
}

struct LoggerInner {
    this: Weak<LoggerInner>,
    registry: ProgressRegistry,
    renderer: Renderer,
    config: Mutex<LoggerConfig>,
    scheduler: Option<Arc<dyn Scheduler>>,
    timer: Mutex<TimerSlot>,
}

impl LoggerInner {
    fn render(&self) {
        let config = self.lock_config().clone();
        self.renderer.render(&self.registry, &config);
    }

    fn start_timer(&self) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };

        let mut slot = self.lock_timer();
        if slot.running.is_some() {
            return;
        }
        let period = self.lock_config().refresh_interval();
        self.schedule_ticks(&mut slot, scheduler.as_ref(), period);
    }

    fn restart_timer(&self, period: Duration) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };

        let mut slot = self.lock_timer();
        let Some(timer) = slot.running.take() else {
            return;
        };
        timer.task.cancel();
        self.schedule_ticks(&mut slot, scheduler.as_ref(), period);
    }

    fn stop_timer(&self) {
        let running = self.lock_timer().running.take();
        if let Some(timer) = running {
            timer.task.cancel();
            debug!("Render timer stopped");
        }
    }

    fn schedule_ticks(&self, slot: &mut TimerSlot, scheduler: &dyn Scheduler, period: Duration) {
        let generation = slot.next_generation;
        slot.next_generation += 1;

        let logger = self.this.clone();
        let task = scheduler.schedule_repeating(
            period,
            Arc::new(move || {
                if let Some(inner) = logger.upgrade() {
                    inner.tick(generation);
                }
            }),
        );
        slot.running = Some(Timer { generation, task });
        debug!("Render timer started, every {}ms", period.as_millis());
    }

    fn tick(&self, generation: u64) {
        self.render();

        // Checked under the timer lock so a tracker starting concurrently
        // either keeps this timer alive or starts a new one
        let mut slot = self.lock_timer();
        let current = slot
            .running
            .as_ref()
            .is_some_and(|timer| timer.generation == generation);
        if !current || self.registry.has_active() {
            return;
        }
        if let Some(timer) = slot.running.take() {
            timer.task.cancel();
            debug!("No active trackers, render timer stopped");
        }
    }

    fn lock_config(&self) -> MutexGuard<'_, LoggerConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> MutexGuard<'_, TimerSlot> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LoggerInner {
    fn drop(&mut self) {
        let slot = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = slot.running.take() {
            timer.task.cancel();
        }
    }
}

struct LoggerHooks {
    logger: Weak<LoggerInner>,
}

impl ProgressListener for LoggerHooks {
    fn on_started(&self, _progress: &Progress) {
        if let Some(logger) = self.logger.upgrade() {
            logger.start_timer();
        }
    }

    fn on_finished(&self, _progress: &Progress) {
        if let Some(logger) = self.logger.upgrade() {
            logger.render();
        }
    }

    fn on_done(&self, progress: &Progress) {
        let Some(logger) = self.logger.upgrade() else {
            return;
        };
        if logger.registry.remove_tracker(progress) {
            debug!("Removed tracker '{}'", progress.name());
        }
    }
}
