//! Shared configuration for the switchboard JSON-RPC daemon.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then a
//! `switchboard.toml` file (located via `--config-path` or
//! `SWITCHBOARD_CONFIG_PATH`), then `SWITCHBOARD_*` environment variables, and
//! finally command-line flags. The resulting [`Config`] is immutable once
//! loaded and is handed to the daemon bootstrap by value.

mod defaults;
mod logging;
mod runtime;
mod socket;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TCP_PORT, default_log_filter, default_log_filter_string,
    default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{COOKIE_FILE_NAME, RuntimePaths, RuntimePathsError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SWITCHBOARD")]
pub struct Config {
    /// Endpoint the JSON-RPC listener binds.
    #[ortho_config(default = default_socket_endpoint())]
    #[serde(default = "default_socket_endpoint")]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter expression, e.g. `info,switchboardd::dispatch=debug`.
    #[ortho_config(default = default_log_filter_string())]
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log lines.
    #[ortho_config(default = default_log_format())]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Methods whose deprecated behaviour is explicitly re-enabled.
    #[ortho_config(merge_strategy = "append")]
    #[serde(default)]
    pub deprecated_rpc: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            deprecated_rpc: Vec::new(),
        }
    }
}

impl Config {
    /// Endpoint the daemon listens on.
    #[must_use]
    pub const fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Methods configured with `--deprecated-rpc`.
    #[must_use]
    pub fn deprecated_rpc(&self) -> &[String] {
        &self.deprecated_rpc
    }

    /// Returns `true` when deprecated behaviour was re-enabled for `method`.
    #[must_use]
    pub fn is_deprecated_rpc_enabled(&self, method: &str) -> bool {
        self.deprecated_rpc.iter().any(|enabled| enabled == method)
    }
}
