//! Doubles shared by the behavioural suites.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use switchboard_config::{COOKIE_FILE_NAME, Config, SocketEndpoint};

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::health::HealthReporter;

const SOCKET_NAME: &str = "switchboardd.sock";

/// Points the server at a socket inside a scratch directory that lives as
/// long as any clone of the loader.
#[derive(Clone)]
pub struct TestConfigLoader {
    scratch: Arc<TempDir>,
}

impl TestConfigLoader {
    pub fn new() -> Self {
        let scratch = TempDir::new().expect("scratch directory");
        Self {
            scratch: Arc::new(scratch),
        }
    }

    pub fn runtime_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir().join(SOCKET_NAME)
    }

    pub fn cookie_path(&self) -> PathBuf {
        self.runtime_dir().join(COOKIE_FILE_NAME)
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let socket = self.socket_path().to_string_lossy().into_owned();
        Ok(Config {
            daemon_socket: SocketEndpoint::unix(socket),
            ..Config::default()
        })
    }
}

/// Loads real configuration from a command line naming an unsupported
/// socket scheme.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(
            ["switchboardd", "--daemon-socket", "invalid://socket"].map(OsString::from),
        )
    }
}

/// Lifecycle notifications in the order they arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ServerStarted,
    WarmupFinished,
    ServerStopping,
    ServerStopped,
}

#[derive(Default)]
pub struct RecordingHealthReporter {
    log: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub fn events(&self) -> Vec<HealthEvent> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, event: HealthEvent) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.push(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.push(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.push(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn server_started(&self, _endpoint: &SocketEndpoint) {
        self.push(HealthEvent::ServerStarted);
    }

    fn warmup_finished(&self) {
        self.push(HealthEvent::WarmupFinished);
    }

    fn server_stopping(&self) {
        self.push(HealthEvent::ServerStopping);
    }

    fn server_stopped(&self) {
        self.push(HealthEvent::ServerStopped);
    }
}
