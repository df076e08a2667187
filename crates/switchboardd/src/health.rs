//! Structured health reporting for server lifecycle events.

use std::sync::Arc;

use switchboard_config::{Config, SocketEndpoint};

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the listener accepts connections.
    fn server_started(&self, endpoint: &SocketEndpoint);

    /// Invoked when requests stop being rejected with the warmup error.
    fn warmup_finished(&self);

    /// Invoked when shutdown begins.
    fn server_stopping(&self);

    /// Invoked after the stop sequence completes.
    fn server_stopped(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn server_started(&self, endpoint: &SocketEndpoint) {
        (**self).server_started(endpoint);
    }

    fn warmup_finished(&self) {
        (**self).warmup_finished();
    }

    fn server_stopping(&self) {
        (**self).server_stopping();
    }

    fn server_stopped(&self) {
        (**self).server_stopped();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting server bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            deprecated_rpc = ?config.deprecated_rpc(),
            "server bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "server bootstrap failed"
        );
    }

    fn server_started(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_started",
            socket = %endpoint,
            "accepting JSON-RPC connections"
        );
    }

    fn warmup_finished(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "warmup_finished",
            "warmup finished, dispatching requests"
        );
    }

    fn server_stopping(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_stopping",
            "server shutting down"
        );
    }

    fn server_stopped(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_stopped",
            "server stopped"
        );
    }
}
