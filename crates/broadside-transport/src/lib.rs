//! Client-side transport layer for Broadside.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how the client reaches the game server, plus the [`TransportEvent`]
//! lifecycle the session driver reacts to. The transport never looks inside
//! a frame; decoding is the protocol layer's job.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket client via `tokio-tungstenite`
//!
//! The in-process [`MemoryConnector`] is always available. It backs the
//! deterministic tests and the offline demo.

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryConnector, MemoryListener, MemoryPeer};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs across all connectors.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide connection id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle events observed on a connection.
///
/// `Opened` is produced by whoever calls [`Connector::connect`]; the rest
/// come out of [`Connection::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is established and ready to carry frames.
    Opened(ConnectionId),
    /// A raw inbound frame, not yet decoded.
    Message(Vec<u8>),
    /// The socket is gone. `was_clean` is true when the peer sent a close
    /// frame rather than dropping the stream.
    Closed {
        /// Whether the close handshake completed.
        was_clean: bool,
    },
    /// The socket failed. Always terminal for that socket.
    Error(String),
}

/// Opens connections to a server.
///
/// The session driver owns exactly one connector and asks it for a fresh
/// [`Connection`] on every (re)connect attempt.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;
    /// The error type for connect attempts.
    type Error: std::error::Error + Send + Sync;

    /// Establishes a new connection to `url`.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the server. UTF-8 payloads travel as text frames.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the server.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Waits for the next lifecycle event on this connection.
    ///
    /// Errors are folded into [`TransportEvent::Error`] so they never cross
    /// the component boundary as a failure of the caller.
    fn next_event(&self) -> impl Future<Output = TransportEvent> + Send {
        async move {
            match self.recv().await {
                Ok(Some(data)) => TransportEvent::Message(data),
                Ok(None) => TransportEvent::Closed { was_clean: true },
                Err(e) => TransportEvent::Error(e.to_string()),
            }
        }
    }
}
