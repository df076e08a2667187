//! Built-in values used when no configuration layer overrides them.

use std::env;
use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Port the daemon listens on when a TCP endpoint omits one, and on
/// platforms without Unix domain sockets.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Log filter applied when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Directory grouping the daemon's runtime artefacts.
pub(crate) const RUNTIME_NAMESPACE: &str = "switchboard";

const SOCKET_FILE_NAME: &str = "switchboardd.sock";

/// Borrowed form of [`DEFAULT_LOG_FILTER`].
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned form of [`DEFAULT_LOG_FILTER`] for serde and `ortho_config`
/// defaults.
#[must_use]
pub fn default_log_filter_string() -> String {
    String::from(DEFAULT_LOG_FILTER)
}

/// Logs are emitted as JSON unless configured otherwise.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Endpoint used when `daemon_socket` is not configured.
///
/// On Unix this is `switchboardd.sock` inside [`runtime_root`]; elsewhere it
/// is loopback TCP on [`DEFAULT_TCP_PORT`].
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    if cfg!(unix) {
        let socket = runtime_root().join(SOCKET_FILE_NAME);
        SocketEndpoint::unix(socket.to_string_lossy().into_owned())
    } else {
        SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
    }
}

/// Per-user directory for runtime artefacts.
///
/// Prefers the platform runtime directory (`$XDG_RUNTIME_DIR` on Linux),
/// which is already private to the user. The shared temporary directory is
/// the fallback, so there the path gains a `uid-<euid>` component.
pub(crate) fn runtime_root() -> PathBuf {
    match dirs::runtime_dir() {
        Some(base) => base.join(RUNTIME_NAMESPACE),
        None => env::temp_dir()
            .join(RUNTIME_NAMESPACE)
            .join(user_component()),
    }
}

#[cfg(unix)]
fn user_component() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { libc::geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn user_component() -> String {
    env::var("USERNAME").unwrap_or_else(|_| String::from("default"))
}
