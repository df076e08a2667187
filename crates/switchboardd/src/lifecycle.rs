//! Server start/stop sequencing and observer notification.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{info, warn};

use crate::auth::AuthArtifact;
use crate::timers::DeadlineTimers;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Shared "server is running" flag.
///
/// The command table reads it to refuse late registrations.
#[derive(Debug, Clone, Default)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    /// Updates the flag.
    pub fn set(&self, running: bool) {
        self.0.store(running, Ordering::SeqCst);
    }

    /// Current value.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Failure reported by a lifecycle observer.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ObserverError {
    message: String,
}

impl ObserverError {
    /// Creates an observer failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while signalling lifecycle events.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// An observer rejected the event; later observers were not called.
    #[error("{event} observer failed: {source}")]
    Observer {
        /// Event being signalled.
        event: &'static str,
        /// Observer failure.
        #[source]
        source: ObserverError,
    },
}

/// Callback run on a lifecycle event.
pub type LifecycleObserver = Arc<dyn Fn() -> Result<(), ObserverError> + Send + Sync>;

/// Start and stop signalling for one server.
pub struct ServerLifecycle {
    running: RunningFlag,
    timers: Arc<DeadlineTimers>,
    auth: Option<Arc<dyn AuthArtifact>>,
    started: Mutex<Vec<LifecycleObserver>>,
    stopped: Mutex<Vec<LifecycleObserver>>,
}

impl ServerLifecycle {
    /// Creates a lifecycle driving `running` and clearing `timers` on stop.
    #[must_use]
    pub fn new(running: RunningFlag, timers: Arc<DeadlineTimers>) -> Self {
        Self {
            running,
            timers,
            auth: None,
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
        }
    }

    /// Removes `auth` when the server stops.
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthArtifact>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Adds an observer for the started event.
    pub fn on_started(&self, observer: LifecycleObserver) {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Adds an observer for the stopped event.
    pub fn on_stopped(&self, observer: LifecycleObserver) {
        self.stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Marks the server running, then notifies started observers.
    ///
    /// # Errors
    ///
    /// Returns the first observer failure.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.running.set(true);
        info!(target: LIFECYCLE_TARGET, "server started");
        notify(&self.started, "started")
    }

    /// Clears the running flag. In-flight requests are unaffected.
    pub fn interrupt(&self) {
        self.running.set(false);
        info!(target: LIFECYCLE_TARGET, "server interrupted");
    }

    /// Cancels pending timers, removes the auth artefact, then notifies
    /// stopped observers.
    ///
    /// # Errors
    ///
    /// Returns the first observer failure.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        self.timers.clear_all();
        if let Some(auth) = &self.auth
            && let Err(error) = auth.remove()
        {
            warn!(
                target: LIFECYCLE_TARGET,
                %error,
                "failed to remove authentication artefact"
            );
        }
        info!(target: LIFECYCLE_TARGET, "server stopped");
        notify(&self.stopped, "stopped")
    }

    /// Returns `true` between `start` and `interrupt`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }
}

impl fmt::Debug for ServerLifecycle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServerLifecycle")
            .field("running", &self.running)
            .field("timers", &self.timers)
            .field("auth", &self.auth.is_some())
            .finish_non_exhaustive()
    }
}

fn notify(
    observers: &Mutex<Vec<LifecycleObserver>>,
    event: &'static str,
) -> Result<(), LifecycleError> {
    let observers = observers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    for observer in observers {
        observer().map_err(|source| LifecycleError::Observer { event, source })?;
    }
    Ok(())
}
