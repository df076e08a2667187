//! Named one-shot timers used by commands that act after replying.
//!
//! A [`TimerBackend`] creates the actual timers; [`DeadlineTimers`] owns the
//! pending timers by name and the currently installed backend. Scheduling a
//! timer under a name that is already pending cancels the earlier one.

mod thread;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::dispatch::RpcError;

pub use self::thread::ThreadTimerBackend;

pub(crate) const TIMERS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::timers");

/// Work run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Pending timer; dropping it cancels the callback if it has not fired.
pub trait DeadlineTimer: Send {}

/// Factory for timers.
pub trait TimerBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Arms a timer that runs `callback` once after `delay`.
    fn new_timer(&self, callback: TimerCallback, delay: Duration) -> Box<dyn DeadlineTimer>;
}

/// Backend slot plus pending timers keyed by name.
#[derive(Default)]
pub struct DeadlineTimers {
    backend: Mutex<Option<Arc<dyn TimerBackend>>>,
    timers: Mutex<HashMap<String, Box<dyn DeadlineTimer>>>,
}

impl DeadlineTimers {
    /// Creates a service with no backend installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `backend` unless one is already present.
    ///
    /// Returns `true` when `backend` was installed.
    pub fn set_backend_if_unset(&self, backend: Arc<dyn TimerBackend>) -> bool {
        let mut slot = lock(&self.backend);
        if slot.is_some() {
            return false;
        }
        debug!(
            target: TIMERS_TARGET,
            backend = backend.name(),
            "installing timer backend"
        );
        *slot = Some(backend);
        true
    }

    /// Installs `backend`, replacing any existing one.
    pub fn set_backend(&self, backend: Arc<dyn TimerBackend>) {
        debug!(
            target: TIMERS_TARGET,
            backend = backend.name(),
            "replacing timer backend"
        );
        *lock(&self.backend) = Some(backend);
    }

    /// Removes `backend` if it is the one installed.
    ///
    /// Returns `true` when the slot was cleared.
    pub fn unset_backend(&self, backend: &Arc<dyn TimerBackend>) -> bool {
        let mut slot = lock(&self.backend);
        if slot
            .as_ref()
            .is_some_and(|installed| Arc::ptr_eq(installed, backend))
        {
            *slot = None;
            return true;
        }
        false
    }

    /// Schedules `callback` to run after `delay_seconds`, replacing any
    /// pending timer called `name`.
    ///
    /// # Errors
    ///
    /// Returns an internal error when no backend is installed.
    pub fn run_later(
        &self,
        name: &str,
        callback: TimerCallback,
        delay_seconds: u64,
    ) -> Result<(), RpcError> {
        let backend = lock(&self.backend)
            .clone()
            .ok_or_else(|| RpcError::internal("No timer handler registered for RPC"))?;
        let delay = Duration::from_secs(delay_seconds);
        let mut timers = lock(&self.timers);
        let replaced = timers.remove(name).is_some();
        timers.insert(name.to_owned(), backend.new_timer(callback, delay));
        drop(timers);
        debug!(
            target: TIMERS_TARGET,
            timer = name,
            backend = backend.name(),
            delay_ms = delay.as_millis(),
            replaced,
            "scheduled timer"
        );
        Ok(())
    }

    /// Cancels every pending timer.
    pub fn clear_all(&self) {
        let drained: Vec<_> = lock(&self.timers).drain().collect();
        if !drained.is_empty() {
            debug!(
                target: TIMERS_TARGET,
                cancelled = drained.len(),
                "cleared pending timers"
            );
        }
    }

    /// Number of timers held, fired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.timers).len()
    }

    /// Returns `true` when no timers are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DeadlineTimers {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = lock(&self.backend).as_ref().map(|backend| backend.name());
        formatter
            .debug_struct("DeadlineTimers")
            .field("backend", &backend)
            .field("timers", &self.len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
