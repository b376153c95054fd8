//! # Broadside
//!
//! Session-synchronizing client for the Broadside battleship server.
//!
//! The server is authoritative. This crate keeps one WebSocket open to it,
//! sends a handshake on every (re)connect, routes each inbound frame to
//! exactly one [`SessionStore`] mutation, and derives a timed
//! [`PresentationState`] (whose turn it is, which board to show, what
//! modal is up) from that store.
//!
//! ```text
//!  server ⇄ Connection ⇄ GameClient ──→ Router ──→ SessionStore ──→ TurnPresenter
//!                            ↑                                         │
//!                      ClientHandle ──→ CommandEncoder          ClientSnapshot
//! ```
//!
//! The pieces:
//!
//! - [`broadside_transport`]: the socket ([`Connector`], [`Connection`]).
//! - [`broadside_protocol`]: envelopes, payloads, the JSON [`Codec`].
//! - [`broadside_session`]: the canonical [`SessionStore`] and identity
//!   persistence.
//! - [`broadside_presenter`]: the [`TurnPresenter`] state machine.
//! - this crate: reconnection, routing, encoding, and the [`GameClient`]
//!   task that ties them together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use broadside::prelude::*;
//!
//! # async fn run() -> Result<(), BroadsideError> {
//! let url = resolve_server_url(None, std::env::var("BROADSIDE_URL").ok().as_deref());
//! let config = ClientConfig::default().with_server_url(url);
//! let parts = GameClient::start(
//!     config,
//!     WebSocketConnector::new(),
//!     FileIdentityStore::new("broadside-identity.json"),
//! );
//!
//! parts.handle.attack(Coord(3, 4)).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod encoder;
mod error;
mod reconnect;
mod router;
mod session;

pub use client::{ClientEvent, ClientHandle, ClientParts, ClientSnapshot, GameClient};
pub use config::{ClientConfig, DEFAULT_SERVER_URL, GAME_PATH, resolve_server_url};
pub use encoder::{CommandEncoder, Intent};
pub use error::BroadsideError;
pub use reconnect::{CloseDecision, ConnectionState, ReconnectPolicy};
pub use router::{Handler, Router};
pub use session::{FrameOutcome, Session};

pub use broadside_presenter::{PresentationState, TurnPresenter};
pub use broadside_protocol::Codec;
pub use broadside_session::SessionStore;
pub use broadside_transport::{Connection, Connector};

/// Everything a typical client needs.
pub mod prelude {
    pub use crate::{
        BroadsideError, ClientConfig, ClientEvent, ClientHandle, ClientParts, ClientSnapshot,
        ConnectionState, GameClient, Intent, resolve_server_url,
    };

    pub use broadside_presenter::{
        ActiveBoard, Notice, Outcome, PresentationState, PresenterConfig, StatusBanner,
    };
    pub use broadside_protocol::{
        Coord, GameState, GridSize, Identity, Orientation, Positions, ShipKind, ShipPlacement,
    };
    pub use broadside_session::{
        FileIdentityStore, IdentityStore, MemoryIdentityStore, SessionStore, Side,
    };
    pub use broadside_transport::{Connection, Connector, MemoryConnector, WebSocketConnector};
}
