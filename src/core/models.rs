use chrono::{DateTime, Utc};
use std::fmt;

/// Lifecycle of a single tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProgressStatus {
    #[default]
    Initial,
    Running,
    Paused,
    Finished,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Initial => "initial",
            ProgressStatus::Running => "running",
            ProgressStatus::Paused => "paused",
            ProgressStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named counters attached to a tracker, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    entries: Vec<(String, i64)>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    /// Adds `by` to the counter, creating it at 0 first. Returns the new value.
    pub fn add(&mut self, name: &str, by: i64) -> i64 {
        let slot = self.slot(name);
        *slot = slot.saturating_add(by);
        *slot
    }

    pub fn reset(&mut self, name: &str) {
        *self.slot(name) = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&mut self, name: &str) -> &mut i64 {
        let index = match self.entries.iter().position(|(key, _)| key == name) {
            Some(index) => index,
            None => {
                self.entries.push((name.to_string(), 0));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }
}

/// Snapshot of a tracker's state. Owned values only, so a snapshot can
/// never reach back into the tracker it was taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub name: String,
    pub current: i64,
    /// `None` means indeterminate (spinner mode)
    pub total: Option<i64>,
    pub status: ProgressStatus,
    /// Start of the current running session
    pub started_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
    /// Value of `current` when tracking started; baseline for the rate
    pub start_current: i64,
    /// Milliseconds spent running, accumulated across pause/resume cycles
    pub pause_buffer: i64,
    pub counters: Counters,
}

impl ProgressState {
    pub fn new(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            current: 0,
            total: None,
            status: ProgressStatus::Initial,
            started_at: None,
            last_updated_at: now,
            start_current: 0,
            pause_buffer: 0,
            counters: Counters::new(),
        }
    }
}

/// Values derived from a [`ProgressState`] at render time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressMetrics {
    /// 0..=100
    pub percentage: u8,
    /// Items per minute
    pub rate: Option<f64>,
    /// Milliseconds until `total` is reached
    pub eta: Option<f64>,
    /// Milliseconds spent running
    pub elapsed: i64,
}
