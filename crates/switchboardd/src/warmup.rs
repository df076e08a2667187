//! Startup gate that holds off dispatch until the server is ready.

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Status reported while the server is still starting.
pub const INITIAL_WARMUP_STATUS: &str = "RPC server started";

/// Errors raised by warmup transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WarmupError {
    /// `finish` was called after warmup had already ended.
    #[error("warmup already finished")]
    AlreadyFinished,
}

#[derive(Debug)]
struct WarmupState {
    in_warmup: bool,
    status: String,
}

/// Lock-guarded warmup flag and status text.
///
/// The flag only ever moves from "warming up" to "ready".
#[derive(Debug)]
pub struct WarmupGate {
    state: Mutex<WarmupState>,
}

impl Default for WarmupGate {
    fn default() -> Self {
        Self::new()
    }
}

impl WarmupGate {
    /// Creates a gate in the warming-up state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WarmupState {
                in_warmup: true,
                status: INITIAL_WARMUP_STATUS.to_owned(),
            }),
        }
    }

    /// Returns the status text while warming up, `None` once ready.
    #[must_use]
    pub fn status(&self) -> Option<String> {
        let state = self.lock();
        state.in_warmup.then(|| state.status.clone())
    }

    /// Returns `true` while the server is still starting.
    #[must_use]
    pub fn is_in_warmup(&self) -> bool {
        self.lock().in_warmup
    }

    /// Replaces the status text reported to callers.
    pub fn set_status(&self, status: impl Into<String>) {
        self.lock().status = status.into();
    }

    /// Ends warmup.
    ///
    /// # Errors
    ///
    /// Returns [`WarmupError::AlreadyFinished`] when warmup has already ended.
    pub fn finish(&self) -> Result<(), WarmupError> {
        let mut state = self.lock();
        if !state.in_warmup {
            return Err(WarmupError::AlreadyFinished);
        }
        state.in_warmup = false;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, WarmupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
