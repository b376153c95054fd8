//! Unified error type for the Broadside client.

use broadside_protocol::ProtocolError;
use broadside_session::SessionError;
use broadside_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `broadside` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]` attribute
/// on each variant generates the `From` impls, so `?` converts sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BroadsideError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error: a local action the current state doesn't
    /// allow, or identity persistence.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// There is no open connection to send the command on.
    #[error("not connected to the server")]
    NotConnected,

    /// The reconnection policy gave up; a restart is required.
    #[error("connection lost after {retries} reconnect attempts")]
    ConnectionLost {
        /// Attempts made before giving up.
        retries: u32,
    },

    /// The client task has stopped.
    #[error("client is shut down")]
    ClientClosed,
}
