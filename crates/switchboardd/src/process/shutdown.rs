//! Shutdown triggers: the in-process latch and OS termination signals.

use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{info, warn};

use super::PROCESS_TARGET;

/// Latch that any thread can trip to request shutdown.
///
/// Clones share the latch. Once requested it stays requested.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownHandle {
    /// Creates an untripped latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown and wakes every waiter.
    pub fn request(&self) {
        let (requested, signal) = &*self.inner;
        *requested.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
    }

    /// Returns `true` once shutdown was requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until shutdown is requested.
    pub fn wait(&self) {
        let (requested, signal) = &*self.inner;
        let guard = requested.lock().unwrap_or_else(PoisonError::into_inner);
        drop(
            signal
                .wait_while(guard, |requested| !*requested)
                .unwrap_or_else(PoisonError::into_inner),
        );
    }
}

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed: either an external trigger fired
    /// or `handle` was requested from inside the server.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the trigger cannot be installed.
    fn wait(&self, handle: &ShutdownHandle) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Clone)]
pub struct SystemShutdownSignal {
    timeout: Duration,
}

impl SystemShutdownSignal {
    /// Builds a signal listener with the configured timeout budget.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self, handle: &ShutdownHandle) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let signals_handle = signals.handle();
        let trigger = handle.clone();
        let timeout = self.timeout;
        let watcher = thread::spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(
                    target: PROCESS_TARGET,
                    signal,
                    timeout_ms = timeout.as_millis(),
                    "shutdown signal received"
                );
                trigger.request();
            }
        });

        handle.wait();
        signals_handle.close();
        if watcher.join().is_err() {
            warn!(target: PROCESS_TARGET, "signal watcher panicked");
        }
        Ok(())
    }
}
