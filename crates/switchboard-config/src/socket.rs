//! Listener endpoint addressing.
//!
//! Endpoints are written as `unix:///path/to.sock` or `tcp://host[:port]`.
//! Configuration files may also use a table with a `transport` key.

use std::fmt;
use std::fs::DirBuilder;
use std::io;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

use crate::defaults::DEFAULT_TCP_PORT;

/// Where the daemon accepts JSON-RPC connections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "EndpointInput", into = "String")]
pub enum SocketEndpoint {
    /// Unix domain socket at `path`.
    Unix {
        /// Filesystem path of the socket.
        path: Utf8PathBuf,
    },
    /// TCP listener on `host:port`.
    Tcp {
        /// Host name or address, IPv6 literals without brackets.
        host: String,
        /// Port; `0` asks the OS for an ephemeral port.
        port: u16,
    },
}

impl SocketEndpoint {
    /// Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Socket path for Unix endpoints.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        if let Self::Unix { path } = self {
            Some(path)
        } else {
            None
        }
    }

    /// Creates the directory that will hold a Unix socket, readable by the
    /// owner only. Does nothing for TCP endpoints.
    ///
    /// # Errors
    ///
    /// Fails when the socket path is a bare file name or the directory
    /// cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let directory = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .ok_or_else(|| SocketPreparationError::NoParent {
                socket: path.to_owned(),
            })?;
        create_private_dir(directory).map_err(|source| SocketPreparationError::Directory {
            directory: directory.to_owned(),
            source,
        })
    }
}

fn create_private_dir(directory: &Utf8Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    std::os::unix::fs::DirBuilderExt::mode(&mut builder, 0o700);
    match builder.create(directory) {
        Err(error) if error.kind() != io::ErrorKind::AlreadyExists => Err(error),
        _ => Ok(()),
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } if path.is_absolute() => write!(formatter, "unix://{path}"),
            Self::Unix { path } => write!(formatter, "unix:{path}"),
            Self::Tcp { host, port } if host.contains(':') => {
                write!(formatter, "tcp://[{host}]:{port}")
            }
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl From<SocketEndpoint> for String {
    fn from(endpoint: SocketEndpoint) -> Self {
        endpoint.to_string()
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let uri = Url::parse(input)?;
        match uri.scheme() {
            "unix" => {
                if uri.host_str().is_some_and(|host| !host.is_empty()) {
                    return Err(SocketParseError::UnixHost(input.to_owned()));
                }
                match uri.path() {
                    "" | "/" => Err(SocketParseError::UnixPath(input.to_owned())),
                    path => Ok(Self::unix(path)),
                }
            }
            "tcp" => {
                let host = match uri.host() {
                    Some(Host::Domain(name)) if !name.is_empty() => name.to_owned(),
                    Some(Host::Ipv4(address)) => address.to_string(),
                    Some(Host::Ipv6(address)) => address.to_string(),
                    _ => return Err(SocketParseError::TcpHost(input.to_owned())),
                };
                Ok(Self::tcp(host, uri.port().unwrap_or(DEFAULT_TCP_PORT)))
            }
            other => Err(SocketParseError::Scheme(other.to_owned())),
        }
    }
}

/// Accepted serialised shapes: a URI string or a `transport` table.
#[derive(Deserialize)]
#[serde(untagged)]
enum EndpointInput {
    Uri(String),
    Table(EndpointTable),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum Transport {
    Unix,
    Tcp,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EndpointTable {
    transport: Transport,
    path: Option<Utf8PathBuf>,
    host: Option<String>,
    port: Option<u16>,
}

impl TryFrom<EndpointInput> for SocketEndpoint {
    type Error = SocketParseError;

    fn try_from(input: EndpointInput) -> Result<Self, Self::Error> {
        let table = match input {
            EndpointInput::Uri(uri) => return uri.parse(),
            EndpointInput::Table(table) => table,
        };
        match table.transport {
            Transport::Unix => table
                .path
                .map(Self::unix)
                .ok_or_else(|| SocketParseError::UnixPath(String::from("transport table"))),
            Transport::Tcp => {
                let host = table
                    .host
                    .filter(|host| !host.is_empty())
                    .ok_or_else(|| SocketParseError::TcpHost(String::from("transport table")))?;
                Ok(Self::tcp(host, table.port.unwrap_or(DEFAULT_TCP_PORT)))
            }
        }
    }
}

/// Errors encountered while parsing a [`SocketEndpoint`].
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme other than `unix` or `tcp`.
    #[error("unsupported socket scheme '{0}'")]
    Scheme(String),
    /// TCP endpoint without a host.
    #[error("missing TCP host in '{0}'")]
    TcpHost(String),
    /// Unix endpoint without a socket path.
    #[error("missing Unix socket path in '{0}'")]
    UnixPath(String),
    /// Unix endpoint naming a host, as in `unix://host/path`.
    #[error("unix socket '{0}' must not name a host; use unix:///path")]
    UnixHost(String),
    /// Not a URI at all.
    #[error("invalid socket URI: {0}")]
    Uri(#[from] url::ParseError),
}

/// Errors raised while creating a Unix socket's directory.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// Socket path is a bare file name.
    #[error("socket path '{socket}' has no parent directory")]
    NoParent {
        /// Configured socket path.
        socket: Utf8PathBuf,
    },
    /// Directory creation failed.
    #[error("failed to create socket directory '{directory}': {source}")]
    Directory {
        /// Directory that could not be created.
        directory: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
