//! Accepted connections, split into independent read and write halves.

use std::io::{self, Read, Write};
use std::net::TcpStream;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

type ReadHalf = Box<dyn Read + Send>;
type WriteHalf = Box<dyn Write + Send>;

/// Connection accepted by the listener.
///
/// Both halves refer to the same socket, so a reader can stay buffered while
/// replies are written.
pub(crate) struct ConnectionStream {
    peer: String,
    reader: ReadHalf,
    writer: WriteHalf,
}

impl ConnectionStream {
    /// Wraps a TCP stream.
    pub(crate) fn tcp(stream: TcpStream) -> io::Result<Self> {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "tcp:unknown".to_owned(), |addr| addr.to_string());
        let writer = stream.try_clone()?;
        Ok(Self {
            peer,
            reader: Box::new(stream),
            writer: Box::new(writer),
        })
    }

    /// Wraps a Unix stream. Unix peers are anonymous.
    #[cfg(unix)]
    pub(crate) fn unix(stream: UnixStream) -> io::Result<Self> {
        let writer = stream.try_clone()?;
        Ok(Self {
            peer: "unix".to_owned(),
            reader: Box::new(stream),
            writer: Box::new(writer),
        })
    }

    /// Peer description for logs.
    pub(crate) fn peer(&self) -> &str {
        &self.peer
    }

    pub(crate) fn into_parts(self) -> (String, ReadHalf, WriteHalf) {
        (self.peer, self.reader, self.writer)
    }
}

/// Serves one accepted connection until the peer goes away.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Takes ownership of `stream`; failures are logged, not returned.
    fn handle(&self, stream: ConnectionStream);
}
