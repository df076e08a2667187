//! In-flight command bookkeeping behind `getrpcinfo`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;

use crate::clock::MonotonicClock;

/// One command currently executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveCommand {
    /// Method name as requested.
    pub method: String,
    /// Time spent so far, in microseconds.
    #[serde(rename = "duration")]
    pub duration_micros: u64,
}

#[derive(Debug)]
struct TrackedEntry {
    method: String,
    started: Instant,
}

#[derive(Debug, Default)]
struct TrackerState {
    next_id: u64,
    entries: BTreeMap<u64, TrackedEntry>,
}

/// Records which commands are executing and since when.
pub struct ExecutionTracker {
    clock: Arc<dyn MonotonicClock>,
    state: Mutex<TrackerState>,
}

impl ExecutionTracker {
    /// Creates an empty tracker reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            clock,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Registers `method` as running until the returned guard is dropped.
    #[must_use = "the entry is removed as soon as the guard is dropped"]
    pub fn begin(&self, method: &str) -> ExecutionGuard<'_> {
        let started = self.clock.now();
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.entries.insert(
            id,
            TrackedEntry {
                method: method.to_owned(),
                started,
            },
        );
        ExecutionGuard { tracker: self, id }
    }

    /// Lists running commands in start order with their elapsed time.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ActiveCommand> {
        let now = self.clock.now();
        self.lock()
            .entries
            .values()
            .map(|entry| ActiveCommand {
                method: entry.method.clone(),
                duration_micros: u64::try_from(
                    now.saturating_duration_since(entry.started).as_micros(),
                )
                .unwrap_or(u64::MAX),
            })
            .collect()
    }

    /// Number of running commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` when nothing is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn end(&self, id: u64) {
        self.lock().entries.remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ExecutionTracker {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ExecutionTracker")
            .field("active", &self.len())
            .finish_non_exhaustive()
    }
}

/// Scope guard that removes its tracker entry on drop.
#[derive(Debug)]
pub struct ExecutionGuard<'a> {
    tracker: &'a ExecutionTracker,
    id: u64,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.tracker.end(self.id);
    }
}
