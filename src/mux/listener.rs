//! Synthetic per-protocol listener
//!
//! A listener-shaped object backed by the dispatcher's handoff queue rather
//! than an operating-system accept call. Protocol servers drive it exactly
//! like a [`tokio::net::TcpListener`]: call [`accept`](ProtocolListener::accept)
//! in a loop and serve each delivered connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

use super::stream::PeekStream;
use crate::common::{MuxError, Result};

/// Connection (or terminal error) delivered to a synthetic listener.
pub(crate) type AcceptItem = Result<(PeekStream<TcpStream>, SocketAddr)>;

/// Synthetic listener for one activated protocol
///
/// Produced by [`Dispatcher::listener`](crate::Dispatcher::listener). Each
/// instance receives exactly the connections whose leading bytes matched its
/// protocol's detector, in the order the dispatcher routed them.
pub struct ProtocolListener {
    proto: String,
    local_addr: SocketAddr,
    rx: mpsc::Receiver<AcceptItem>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ProtocolListener {
    pub(crate) fn new(
        proto: String,
        local_addr: SocketAddr,
        rx: mpsc::Receiver<AcceptItem>,
        shutdown: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            proto,
            local_addr,
            rx,
            shutdown,
        }
    }

    /// Accept the next connection routed to this protocol
    ///
    /// Blocks until the dispatcher delivers a connection, in FIFO delivery
    /// order. When the dispatch loop ends, every pending and future call
    /// returns the terminal error ([`MuxError::Terminated`] for an
    /// unrecoverable accept error, [`MuxError::Closed`] after a
    /// [`close`](Self::close)).
    pub async fn accept(&mut self) -> Result<(PeekStream<TcpStream>, SocketAddr)> {
        match self.rx.recv().await {
            Some(item) => item,
            // Dispatcher gone; the terminal error was already drained or the
            // dispatch loop was dropped outright.
            None => Err(MuxError::Closed),
        }
    }

    /// The local address of the real, shared listening endpoint
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The protocol name this listener was bound to
    pub fn proto(&self) -> &str {
        &self.proto
    }

    /// Close the shared listening endpoint
    ///
    /// The real listener is shared by every synthetic listener produced by
    /// the same dispatcher: closing any one of them stops the dispatch loop
    /// and unblocks all pending [`accept`](Self::accept) calls across all
    /// protocols with [`MuxError::Closed`].
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }
}

impl std::fmt::Debug for ProtocolListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolListener")
            .field("proto", &self.proto)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
