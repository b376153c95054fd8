/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Establishing the connection failed (DNS, TCP, or upgrade handshake).
    #[error("connect to {url} failed: {source}")]
    ConnectFailed {
        /// The target that could not be reached.
        url: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The connector was shut down and will not produce more connections.
    #[error("transport shut down")]
    Shutdown,
}
