//! Socket transport for the JSON-RPC server.
//!
//! [`SocketListener`] binds a TCP or Unix endpoint and polls it on an accept
//! thread; each accepted [`ConnectionStream`] is served by a
//! [`ConnectionHandler`] on a worker thread of its own.

mod errors;
mod listener;
mod stream;
#[cfg(test)]
mod test_utils;

pub(crate) use self::errors::ListenerError;
pub(crate) use self::listener::SocketListener;
pub(crate) use self::stream::{ConnectionHandler, ConnectionStream};
#[cfg(test)]
pub(crate) use self::test_utils::PeerLog;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
