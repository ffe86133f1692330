use crate::core::progress::{Progress, ProgressContext};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Entry {
    // Registration order, used for stable enumeration
    seq: u64,
    progress: Progress,
}

#[derive(Default)]
struct Trackers {
    next_seq: u64,
    entries: HashMap<String, Entry>,
}

/// Name → tracker mapping. Trackers created here share the registry's context.
pub struct ProgressRegistry {
    trackers: Mutex<Trackers>,
    context: ProgressContext,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::with_context(ProgressContext::default())
    }

    pub fn with_context(context: ProgressContext) -> Self {
        Self {
            trackers: Mutex::new(Trackers::default()),
            context,
        }
    }

    pub fn context(&self) -> &ProgressContext {
        &self.context
    }

    /// Returns the tracker for `name`, creating it on first use
    pub fn get(&self, name: &str) -> Progress {
        let mut trackers = self.lock();
        if let Some(entry) = trackers.entries.get(name) {
            return entry.progress.clone();
        }

        let progress = Progress::with_context(name, self.context.clone());
        let seq = trackers.next_seq;
        trackers.next_seq += 1;
        trackers.entries.insert(
            name.to_string(),
            Entry {
                seq,
                progress: progress.clone(),
            },
        );
        progress
    }

    /// Inserts `progress` under its own name, replacing any tracker already there.
    /// A replacement keeps the position of the tracker it replaces.
    pub fn register(&self, progress: Progress) {
        let mut trackers = self.lock();
        let name = progress.name().to_string();
        match trackers.entries.get_mut(&name) {
            Some(entry) => entry.progress = progress,
            None => {
                let seq = trackers.next_seq;
                trackers.next_seq += 1;
                trackers.entries.insert(name, Entry { seq, progress });
            }
        }
    }

    pub fn remove(&self, name: &str) -> bool {
        self.lock().entries.remove(name).is_some()
    }

    /// Removes the entry for `progress`'s name only if it still holds that very
    /// tracker, so a late request from a replaced tracker cannot evict its successor.
    pub fn remove_tracker(&self, progress: &Progress) -> bool {
        let mut trackers = self.lock();
        let same = trackers
            .entries
            .get(progress.name())
            .is_some_and(|entry| entry.progress.ptr_eq(progress));
        if same {
            trackers.entries.remove(progress.name());
        }
        same
    }

    /// All trackers in registration order. The list is a fresh copy.
    pub fn get_all(&self) -> Vec<Progress> {
        let trackers = self.lock();
        let mut entries: Vec<&Entry> = trackers.entries.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.progress.clone()).collect()
    }

    pub fn has_active(&self) -> bool {
        self.get_all().iter().any(Progress::is_active)
    }

    pub fn active_count(&self) -> usize {
        self.get_all().iter().filter(|p| p.is_active()).count()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Trackers> {
        self.trackers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new()
    }
}
