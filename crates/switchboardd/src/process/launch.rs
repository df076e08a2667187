//! Supervises server launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::RpcConnectionHandler;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::shutdown::{ShutdownHandle, ShutdownSignal, SystemShutdownSignal};
use super::{PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Collaborators required to launch the server runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
}

/// Runs the server using the production collaborators until a termination
/// signal or a `stop` request arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, binding or shutdown fails.
pub fn run_server() -> Result<(), LaunchError> {
    run_server_with(LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal::new(SHUTDOWN_TIMEOUT),
    })
}

/// Runs the server with injected collaborators.
pub(crate) fn run_server_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
    } = plan;

    info!(target: PROCESS_TARGET, "starting server runtime");
    let trigger = ShutdownHandle::new();
    let server = bootstrap_with(&loader, reporter, trigger.clone())?;
    let listener = SocketListener::bind(server.config().daemon_socket())?;
    let endpoint = listener.endpoint().clone();

    let reporter = server.reporter();
    let lifecycle = server.lifecycle();
    let on_started = Arc::clone(&reporter);
    lifecycle.on_started(Arc::new(move || {
        on_started.server_started(&endpoint);
        Ok(())
    }));
    let on_stopped = Arc::clone(&reporter);
    lifecycle.on_stopped(Arc::new(move || {
        on_stopped.server_stopped();
        Ok(())
    }));

    lifecycle.start()?;
    let handler = Arc::new(RpcConnectionHandler::new(Arc::clone(server.dispatcher())));
    let accepted = Arc::clone(&handler);
    let listener_handle = listener.start(accepted)?;
    server.dispatcher().warmup().finish()?;
    reporter.warmup_finished();

    let waited = shutdown.wait(&trigger);
    reporter.server_stopping();
    lifecycle.interrupt();
    let joined = listener_handle.stop();
    if !handler.drain(SHUTDOWN_TIMEOUT) {
        warn!(
            target: PROCESS_TARGET,
            timeout_ms = u64::try_from(SHUTDOWN_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            "abandoning unanswered requests"
        );
    }
    lifecycle.stop()?;
    waited?;
    joined?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
