//! In-process transport built on Tokio channels.
//!
//! A [`MemoryConnector`] hands each accepted connection to its paired
//! [`MemoryListener`], which plays the server role. Tests script the server
//! side through [`MemoryPeer`] without touching the network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Connector, TransportError};

/// One frame travelling through a memory link.
#[derive(Debug)]
enum Frame {
    Data(Vec<u8>),
    Close,
}

/// Client side of an in-process link.
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refusing: Arc<AtomicBool>,
}

/// Server side of an in-process link: yields one [`MemoryPeer`] per
/// successful [`MemoryConnector::connect`].
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
    refusing: Arc<AtomicBool>,
}

impl MemoryConnector {
    /// Creates a connected connector/listener pair.
    pub fn pair() -> (Self, MemoryListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let refusing = Arc::new(AtomicBool::new(false));
        (
            Self {
                accept_tx,
                refusing: Arc::clone(&refusing),
            },
            MemoryListener {
                accept_rx,
                refusing,
            },
        )
    }
}

impl MemoryListener {
    /// Waits for the next client connection. `None` once every connector
    /// is gone.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// While set, connect attempts fail as if the server were down.
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;
    type Error = TransportError;

    async fn connect(&self, url: &str) -> Result<Self::Connection, Self::Error> {
        let refused = || TransportError::ConnectFailed {
            url: url.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory listener refused the connection",
            ),
        };

        if self.refusing.load(Ordering::SeqCst) {
            return Err(refused());
        }

        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        let id = ConnectionId::next();

        let peer = MemoryPeer {
            id,
            tx: to_client,
            rx: Mutex::new(from_client),
        };
        self.accept_tx.send(peer).map_err(|_| refused())?;

        tracing::debug!(%id, url, "memory connection established");
        Ok(MemoryConnection {
            id,
            tx: to_server,
            rx: Mutex::new(from_server),
        })
    }
}

/// Client end of an in-process link.
pub struct MemoryConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Frame>,
    rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.tx.send(Frame::Data(data.to_vec())).map_err(|_| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "memory peer dropped",
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        read_frame(&self.rx).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        // The peer may already be gone; closing twice is not an error.
        let _ = self.tx.send(Frame::Close);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Server end of an in-process link.
pub struct MemoryPeer {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Frame>,
    rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl MemoryPeer {
    /// The id shared with the client end.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Pushes a text frame to the client.
    pub fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.tx
            .send(Frame::Data(text.as_bytes().to_vec()))
            .map_err(|_| TransportError::ConnectionClosed("client dropped".into()))
    }

    /// Receives the next frame from the client as UTF-8 text.
    ///
    /// `Ok(None)` after the client closed the link.
    pub async fn recv_text(&self) -> Result<Option<String>, TransportError> {
        let Some(bytes) = read_frame(&self.rx).await? else {
            return Ok(None);
        };
        String::from_utf8(bytes).map(Some).map_err(|e| {
            TransportError::ReceiveFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            ))
        })
    }

    /// Closes the link cleanly, as a server sending a close frame would.
    pub fn close(&self) {
        let _ = self.tx.send(Frame::Close);
    }
}

async fn read_frame(
    rx: &Mutex<mpsc::UnboundedReceiver<Frame>>,
) -> Result<Option<Vec<u8>>, TransportError> {
    match rx.lock().await.recv().await {
        Some(Frame::Data(data)) => Ok(Some(data)),
        Some(Frame::Close) => Ok(None),
        None => Err(TransportError::ConnectionClosed(
            "peer dropped without closing".into(),
        )),
    }
}
