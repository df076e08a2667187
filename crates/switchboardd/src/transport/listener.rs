//! Accept loop serving the JSON-RPC socket.
//!
//! The listener polls a non-blocking socket so the loop can observe its stop
//! flag, and hands every accepted stream to a worker thread. A Unix socket file
//! is removed when the listener is dropped.

use std::io;
use std::net::{TcpListener, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use switchboard_config::SocketEndpoint;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::os::unix::net::UnixListener;

/// Sleep between polls while no client is waiting.
const IDLE_POLL: Duration = Duration::from_millis(25);
/// First delay after an accept error; doubled per consecutive error.
const ERROR_BACKOFF_START: Duration = Duration::from_millis(50);
const ERROR_BACKOFF_MAX: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Acceptor {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Acceptor {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Returns `Ok(None)` when no client is waiting.
    fn poll(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                ConnectionStream::tcp(stream)
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                ConnectionStream::unix(stream)
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Bound socket that is not yet accepting.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    acceptor: Acceptor,
}

impl SocketListener {
    /// Binds `endpoint` in non-blocking mode.
    ///
    /// TCP port `0` is replaced by the port the kernel picked. A leftover Unix
    /// socket file is reclaimed when nothing answers on it.
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let acceptor = match endpoint {
            SocketEndpoint::Tcp { host, port } => Acceptor::Tcp(bind_tcp(endpoint, host, *port)?),
            SocketEndpoint::Unix { path } => bind_unix(endpoint, path.as_std_path())?,
        };
        let bound = match &acceptor {
            Acceptor::Tcp(listener) => listener
                .local_addr()
                .map_or_else(|_| endpoint.clone(), |addr| {
                    SocketEndpoint::tcp(addr.ip().to_string(), addr.port())
                }),
            #[cfg(unix)]
            Acceptor::Unix(_) => endpoint.clone(),
        };
        let listener = Self {
            endpoint: bound,
            acceptor,
        };
        listener
            .acceptor
            .set_nonblocking()
            .map_err(|source| ListenerError::Listen {
                endpoint: listener.endpoint.clone(),
                source,
            })?;
        Ok(listener)
    }

    /// Endpoint actually bound.
    pub(crate) const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    #[cfg(test)]
    pub(crate) fn local_addr(&self) -> Option<std::net::SocketAddr> {
        match &self.acceptor {
            Acceptor::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Acceptor::Unix(_) => None,
        }
    }

    /// Moves the listener onto its accept thread.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        let stop = Arc::new(AtomicBool::new(false));
        let accept_loop = AcceptLoop {
            listener: self,
            stop: Arc::clone(&stop),
            handler,
        };
        let thread = thread::Builder::new()
            .name("switchboard-accept".to_owned())
            .spawn(move || accept_loop.run())
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            stop,
            thread: Some(thread),
        })
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        remove_socket_file(&self.endpoint);
    }
}

/// Owner of the running accept thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stops accepting and waits for the accept thread to exit.
    ///
    /// Connections already handed to workers are left to finish.
    pub(crate) fn stop(mut self) -> Result<(), ListenerError> {
        self.stop.store(true, Ordering::SeqCst);
        self.thread
            .take()
            .map_or(Ok(()), |thread| {
                thread.join().map_err(|_| ListenerError::AcceptPanicked)
            })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

struct AcceptLoop {
    listener: SocketListener,
    stop: Arc<AtomicBool>,
    handler: Arc<dyn ConnectionHandler>,
}

impl AcceptLoop {
    fn run(self) {
        let endpoint = &self.listener.endpoint;
        info!(target: LISTENER_TARGET, %endpoint, "accepting connections");
        let mut backoff: Option<Duration> = None;
        while !self.stop.load(Ordering::SeqCst) {
            match self.listener.acceptor.poll() {
                Ok(Some(stream)) => {
                    backoff = None;
                    self.serve(stream);
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    let delay = backoff.map_or(ERROR_BACKOFF_START, |previous| {
                        previous.saturating_mul(2).min(ERROR_BACKOFF_MAX)
                    });
                    if backoff.is_none() {
                        warn!(target: LISTENER_TARGET, %endpoint, %error, "accept failed");
                    } else {
                        debug!(
                            target: LISTENER_TARGET,
                            %error,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "accept still failing"
                        );
                    }
                    backoff = Some(delay);
                    thread::sleep(delay);
                }
            }
        }
        info!(target: LISTENER_TARGET, %endpoint, "stopped accepting connections");
    }

    fn serve(&self, stream: ConnectionStream) {
        let peer = stream.peer().to_owned();
        let handler = Arc::clone(&self.handler);
        let worker = thread::Builder::new()
            .name("switchboard-conn".to_owned())
            .spawn(move || handler.handle(stream));
        match worker {
            Ok(_) => debug!(target: LISTENER_TARGET, %peer, "connection accepted"),
            Err(error) => warn!(
                target: LISTENER_TARGET,
                %peer,
                %error,
                "dropping connection without a worker"
            ),
        }
    }
}

fn bind_tcp(endpoint: &SocketEndpoint, host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let unresolved = |reason: String| ListenerError::Unresolved {
        endpoint: endpoint.clone(),
        reason,
    };
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|error| unresolved(error.to_string()))?
        .next()
        .ok_or_else(|| unresolved("no addresses found".to_owned()))?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Listen {
        endpoint: endpoint.clone(),
        source,
    })
}

#[cfg(unix)]
fn bind_unix(endpoint: &SocketEndpoint, path: &Path) -> Result<Acceptor, ListenerError> {
    reclaim_stale_socket(endpoint, path)?;
    UnixListener::bind(path)
        .map(Acceptor::Unix)
        .map_err(|source| ListenerError::Listen {
            endpoint: endpoint.clone(),
            source,
        })
}

#[cfg(not(unix))]
fn bind_unix(endpoint: &SocketEndpoint, _path: &Path) -> Result<Acceptor, ListenerError> {
    Err(ListenerError::Unsupported {
        endpoint: endpoint.clone(),
    })
}

/// Removes a socket file left by a dead server. Live sockets and
/// non-socket files are refused.
#[cfg(unix)]
fn reclaim_stale_socket(endpoint: &SocketEndpoint, path: &Path) -> Result<(), ListenerError> {
    use std::fs;
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::UnixStream;

    let reclaim = |source: io::Error| ListenerError::Reclaim {
        endpoint: endpoint.clone(),
        source,
    };
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(reclaim(error)),
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::NotASocket {
            endpoint: endpoint.clone(),
        });
    }
    match UnixStream::connect(path) {
        Ok(_) => Err(ListenerError::InUse {
            endpoint: endpoint.clone(),
        }),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            debug!(target: LISTENER_TARGET, %endpoint, "removing stale socket file");
            match fs::remove_file(path) {
                Err(error) if error.kind() != io::ErrorKind::NotFound => Err(reclaim(error)),
                _ => Ok(()),
            }
        }
        Err(error) => Err(reclaim(error)),
    }
}

#[cfg(unix)]
fn remove_socket_file(endpoint: &SocketEndpoint) {
    let SocketEndpoint::Unix { path } = endpoint else {
        return;
    };
    match std::fs::remove_file(path.as_std_path()) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => warn!(
            target: LISTENER_TARGET,
            %endpoint,
            %error,
            "failed to remove socket file"
        ),
        _ => {}
    }
}

#[cfg(not(unix))]
const fn remove_socket_file(_endpoint: &SocketEndpoint) {}
