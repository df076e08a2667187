//! Defines the unified error surface for server launch and supervision.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::lifecycle::LifecycleError;
use crate::transport::ListenerError;
use crate::warmup::WarmupError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the server.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the server failed.
    #[error("server bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// Socket listener startup failed.
    #[error("server socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// A lifecycle observer rejected an event.
    #[error("lifecycle notification failed: {source}")]
    Lifecycle {
        /// Underlying lifecycle error.
        #[source]
        source: LifecycleError,
    },
    /// Warmup was ended twice.
    #[error("failed to finish warmup: {source}")]
    Warmup {
        /// Underlying warmup error.
        #[source]
        source: WarmupError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<LifecycleError> for LaunchError {
    fn from(source: LifecycleError) -> Self {
        Self::Lifecycle { source }
    }
}

impl From<WarmupError> for LaunchError {
    fn from(source: WarmupError) -> Self {
        Self::Warmup { source }
    }
}
