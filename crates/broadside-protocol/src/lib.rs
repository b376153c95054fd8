//! Wire protocol for Broadside.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Envelope** ([`Envelope`]) — the `{type, data}` unit every frame uses.
//! - **Payloads** ([`ConfigurationData`], [`AttackResultData`], ...) — what
//!   the server puts in `data` for each [`InboundKind`].
//! - **Commands** ([`Command`]) — what the client sends.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames become bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Router → Session store
//! ```
//!
//! The protocol layer knows nothing about connections or game state.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    AttackResult, AttackResultData, AttackResultFrame, Board, Command, ConfigurationData,
    Coord, Envelope, GameId, GameInfo, GameState, GameStateData, GridSize, Handshake, Identity,
    InboundKind, MatchInfo, NewMatch, OpponentInfo, Orientation, PlayerId, PlayerInfo,
    Positions, RejectionData, ScoreUpdateData, ShipKind, ShipPlacement,
};
