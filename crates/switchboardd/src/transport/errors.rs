//! Listener failures, each naming the endpoint involved.

use std::io;

use thiserror::Error;

use switchboard_config::SocketEndpoint;

/// Reasons the JSON-RPC socket could not be served.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Host lookup failed or yielded no address.
    #[error("cannot resolve {endpoint}: {reason}")]
    Unresolved {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
        /// Resolver message.
        reason: String,
    },
    /// Binding or configuring the socket failed.
    #[error("cannot listen on {endpoint}: {source}")]
    Listen {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
        /// Operating system error.
        #[source]
        source: io::Error,
    },
    /// Another process answers on the Unix socket.
    #[error("{endpoint} is already served by another process")]
    InUse {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
    },
    /// The socket path is occupied by something other than a socket.
    #[error("{endpoint} is occupied by a file that is not a socket")]
    NotASocket {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
    },
    /// Probing or removing a leftover socket file failed.
    #[error("cannot reclaim leftover socket {endpoint}: {source}")]
    Reclaim {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
        /// Operating system error.
        #[source]
        source: io::Error,
    },
    /// Unix endpoints need a Unix host.
    #[cfg(not(unix))]
    #[error("{endpoint} requires Unix domain socket support")]
    Unsupported {
        /// Endpoint being bound.
        endpoint: SocketEndpoint,
    },
    /// The accept thread could not be started.
    #[error("cannot start accept thread: {source}")]
    Spawn {
        /// Operating system error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("accept thread panicked")]
    AcceptPanicked,
}
