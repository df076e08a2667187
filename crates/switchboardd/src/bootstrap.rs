//! Server bootstrap: configuration, telemetry, runtime paths and the wired
//! dispatcher.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use switchboard_config::{Config, RuntimePaths, RuntimePathsError, SocketPreparationError};

use crate::auth::CookieFile;
use crate::commands::register_control_commands;
use crate::dispatch::{CommandTable, Dispatcher};
use crate::health::HealthReporter;
use crate::lifecycle::{RunningFlag, ServerLifecycle};
use crate::process::ShutdownHandle;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::timers::{DeadlineTimers, ThreadTimerBackend};

/// Source of the server configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader error when any configuration layer is invalid.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Reads every configuration layer: defaults, file, environment and CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Hands out a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Bootstrap failures, in the order the steps run.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A configuration layer was invalid.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The log filter was rejected or logging was already claimed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The socket directory could not be created.
    #[error("failed to prepare server socket: {source}")]
    Socket {
        /// Directory error.
        #[source]
        source: SocketPreparationError,
    },
    /// Runtime paths could not be derived.
    #[error("failed to prepare runtime paths: {source}")]
    RuntimePaths {
        /// Underlying path error.
        #[source]
        source: RuntimePathsError,
    },
}

/// Result of a successful bootstrap: the configured, still warming up,
/// dispatcher plus the lifecycle that drives it.
pub struct Server {
    config: Config,
    paths: RuntimePaths,
    dispatcher: Arc<Dispatcher>,
    lifecycle: ServerLifecycle,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Server {
    /// Configuration the server was built from.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Runtime artefact locations.
    #[must_use]
    pub const fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    /// Shared dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Start/stop sequencing.
    #[must_use]
    pub const fn lifecycle(&self) -> &ServerLifecycle {
        &self.lifecycle
    }

    /// Installed logging configuration.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Reporter receiving lifecycle events.
    #[must_use]
    pub fn reporter(&self) -> Arc<dyn HealthReporter> {
        Arc::clone(&self.reporter)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Server")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

/// Bootstraps the server using the supplied collaborators.
///
/// `shutdown` is the handle the `stop` command triggers.
///
/// # Errors
///
/// Returns [`BootstrapError`] after reporting it through `reporter`.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: ShutdownHandle,
) -> Result<Server, BootstrapError> {
    reporter.bootstrap_starting();
    match prepare(loader) {
        Ok((config, paths, telemetry)) => {
            let (dispatcher, lifecycle) = assemble(&config, &paths, shutdown);
            reporter.bootstrap_succeeded(&config);
            Ok(Server {
                config,
                paths,
                dispatcher,
                lifecycle,
                telemetry,
                reporter,
            })
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn prepare(
    loader: &dyn ConfigLoader,
) -> Result<(Config, RuntimePaths, TelemetryHandle), BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .daemon_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;
    let paths =
        RuntimePaths::from_config(&config).map_err(|source| BootstrapError::RuntimePaths { source })?;
    Ok((config, paths, telemetry))
}

fn assemble(
    config: &Config,
    paths: &RuntimePaths,
    shutdown: ShutdownHandle,
) -> (Arc<Dispatcher>, ServerLifecycle) {
    let running = RunningFlag::default();
    let mut table = CommandTable::new(running.clone());
    register_control_commands(&mut table);

    let timers = Arc::new(DeadlineTimers::new());
    timers.set_backend_if_unset(Arc::new(ThreadTimerBackend::new()));

    let dispatcher = Dispatcher::new(table)
        .with_timers(Arc::clone(&timers))
        .with_shutdown(shutdown)
        .with_deprecated_rpc(config.deprecated_rpc().to_vec());
    let lifecycle = ServerLifecycle::new(running, timers)
        .with_auth(Arc::new(CookieFile::new(paths.cookie_path())));
    (Arc::new(dispatcher), lifecycle)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_config::{COOKIE_FILE_NAME, SocketEndpoint};

    use super::*;
    use crate::health::StructuredHealthReporter;

    fn static_loader(dir: &tempfile::TempDir) -> StaticConfigLoader {
        let socket = dir.path().join("run").join("switchboardd.sock");
        StaticConfigLoader::new(Config {
            daemon_socket: SocketEndpoint::unix(socket.to_string_lossy().into_owned()),
            deprecated_rpc: vec![String::from("getinfo")],
            ..Config::default()
        })
    }

    #[test]
    fn bootstrap_prepares_runtime_directory_and_warming_dispatcher() {
        let dir = tempfile::tempdir().expect("temp dir");
        let server = bootstrap_with(
            &static_loader(&dir),
            Arc::new(StructuredHealthReporter::new()),
            ShutdownHandle::new(),
        )
        .expect("bootstrap");

        assert!(dir.path().join("run").is_dir());
        assert_eq!(
            server.paths().cookie_path(),
            dir.path().join("run").join(COOKIE_FILE_NAME)
        );
        assert!(server.dispatcher().is_deprecated_rpc_enabled("getinfo"));
        assert!(server.dispatcher().warmup().status().is_some());
        assert!(!server.lifecycle().is_running());
        assert_eq!(server.config().deprecated_rpc(), ["getinfo"]);
        assert_eq!(server.telemetry().format(), switchboard_config::LogFormat::Json);

        let reply = server
            .dispatcher()
            .handle_payload(br#"{"id":1,"method":"uptime"}"#);
        let reply: serde_json::Value = serde_json::from_str(&reply).expect("json reply");
        assert_eq!(reply["error"]["code"], json!(-28));
    }

    #[test]
    fn bare_socket_name_fails_at_socket_preparation() {
        let loader = StaticConfigLoader::new(Config {
            daemon_socket: SocketEndpoint::unix("switchboardd.sock"),
            ..Config::default()
        });
        let error = bootstrap_with(
            &loader,
            Arc::new(StructuredHealthReporter::new()),
            ShutdownHandle::new(),
        )
        .expect_err("bootstrap should fail");
        assert!(matches!(error, BootstrapError::Socket { .. }));
    }
}
