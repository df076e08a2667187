//! Connection handler double for listener tests.

use std::sync::{Arc, Mutex, PoisonError};

use super::{ConnectionHandler, ConnectionStream};

/// Records the peer of every connection it is handed.
#[derive(Default)]
pub(crate) struct PeerLog {
    peers: Mutex<Vec<String>>,
}

impl PeerLog {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn peers(&self) -> Vec<String> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConnectionHandler for PeerLog {
    fn handle(&self, stream: ConnectionStream) {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stream.peer().to_owned());
    }
}
