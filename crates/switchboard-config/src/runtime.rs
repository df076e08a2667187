//! Runtime artefact locations.
//!
//! Artefacts live beside a Unix socket, or under the per-user runtime root
//! when the daemon listens on TCP.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::defaults::runtime_root;
use crate::{Config, SocketEndpoint};

/// Authentication cookie file name inside the runtime directory.
pub const COOKIE_FILE_NAME: &str = ".cookie";

/// Runtime directory and the artefacts the daemon writes into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
}

impl RuntimePaths {
    /// Resolves the runtime directory for `config` and creates it.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimePathsError`] for a Unix socket given as a bare file
    /// name, or when the directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let runtime_dir = match config.daemon_socket() {
            SocketEndpoint::Tcp { .. } => runtime_root(),
            SocketEndpoint::Unix { path } => path
                .parent()
                .filter(|parent| !parent.as_str().is_empty())
                .map(|parent| parent.as_std_path().to_owned())
                .ok_or_else(|| RuntimePathsError::NoSocketDirectory {
                    socket: path.to_string(),
                })?,
        };
        fs::create_dir_all(&runtime_dir).map_err(|source| {
            RuntimePathsError::CreateDirectory {
                directory: runtime_dir.clone(),
                source,
            }
        })?;
        Ok(Self { runtime_dir })
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    /// Location of the authentication cookie.
    #[must_use]
    pub fn cookie_path(&self) -> PathBuf {
        self.runtime_dir.join(COOKIE_FILE_NAME)
    }
}

/// Errors raised while resolving runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// Unix socket given without a directory component.
    #[error("socket path '{socket}' has no parent directory")]
    NoSocketDirectory {
        /// Configured socket path.
        socket: String,
    },
    /// Runtime directory could not be created.
    #[error("failed to prepare runtime directory '{}': {source}", directory.display())]
    CreateDirectory {
        /// Directory that could not be created.
        directory: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(endpoint: SocketEndpoint) -> Config {
        Config {
            daemon_socket: endpoint,
            ..Config::default()
        }
    }

    #[test]
    fn unix_socket_directory_holds_the_cookie() {
        let dir = tempfile::tempdir().expect("temp dir");
        let socket = dir.path().join("run").join("switchboardd.sock");
        let config = config_for(SocketEndpoint::unix(socket.to_str().expect("utf8 path")));

        let paths = RuntimePaths::from_config(&config).expect("resolve");

        assert_eq!(paths.runtime_dir(), dir.path().join("run"));
        assert!(paths.runtime_dir().is_dir());
        assert_eq!(paths.cookie_path(), dir.path().join("run").join(COOKIE_FILE_NAME));
    }

    #[test]
    fn tcp_endpoints_use_the_runtime_root() {
        let paths = RuntimePaths::from_config(&config_for(SocketEndpoint::tcp("127.0.0.1", 9000)))
            .expect("resolve");
        assert_eq!(paths.runtime_dir(), runtime_root());
        assert_eq!(paths.cookie_path(), runtime_root().join(COOKIE_FILE_NAME));
    }

    #[test]
    fn bare_socket_name_is_rejected() {
        let error = RuntimePaths::from_config(&config_for(SocketEndpoint::unix("switchboardd.sock")))
            .expect_err("no parent");
        assert!(matches!(error, RuntimePathsError::NoSocketDirectory { .. }));
    }
}
