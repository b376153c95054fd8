//! Core protocol types for Broadside's wire format.
//!
//! Every frame on the wire is a JSON [`Envelope`]: `{"type": ..., "data": ...}`.
//! This module defines the envelope itself, the payloads the server sends
//! (decoded per `type` by the client's router), and the [`Command`]s the
//! client sends.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's identifier, as assigned by the server.
///
/// A "newtype wrapper" around the server's opaque string, so a `PlayerId`
/// can never be passed where a [`GameId`] is expected.
///
/// `#[serde(transparent)]` serializes this as the bare string: `"p1"`, not
/// `{"0": "p1"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Wraps a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A match (game instance) identifier, as assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    /// Wraps a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who this client is, as far as the server knows.
///
/// Persisted locally so that a new socket (after a dropped connection or a
/// restart) can ask the server to re-associate it with the match in
/// progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// The match this player belongs to.
    pub game_id: GameId,
    /// The player's id within that match.
    pub player_id: PlayerId,
    /// Display name.
    pub username: String,
}

// ---------------------------------------------------------------------------
// Board geometry
// ---------------------------------------------------------------------------

/// A grid cell, serialized as `[x, y]`.
///
/// A tuple struct with two fields serializes as a two-element JSON array,
/// which is exactly the shape the server uses for `origin` and attack
/// targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord(pub u32, pub u32);

impl Coord {
    /// Column index.
    pub fn x(self) -> u32 {
        self.0
    }

    /// Row index.
    pub fn y(self) -> u32 {
        self.1
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0, self.1)
    }
}

/// Grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    /// Number of rows.
    pub rows: u32,
    /// Number of columns.
    pub columns: u32,
}

impl Default for GridSize {
    fn default() -> Self {
        Self {
            rows: 10,
            columns: 10,
        }
    }
}

/// The kinds of ship in a fleet.
///
/// Serialized with the variant name as-is (`"Destroyer"`), which is also
/// how the server keys the positions map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShipKind {
    /// Smallest ship.
    Submarine,
    /// Two-cell ship.
    Destroyer,
    /// Four-cell ship.
    Battleship,
    /// Largest ship.
    Carrier,
    /// A ship name this client doesn't know. The server owns the fleet, so
    /// results naming one are still recorded; the name itself is lost.
    #[serde(other)]
    Unknown,
}

impl ShipKind {
    /// Every ship in a standard fleet, in display order.
    pub const ALL: [ShipKind; 4] = [
        ShipKind::Submarine,
        ShipKind::Destroyer,
        ShipKind::Battleship,
        ShipKind::Carrier,
    ];

    /// The wire name of this ship.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submarine => "Submarine",
            Self::Destroyer => "Destroyer",
            Self::Battleship => "Battleship",
            Self::Carrier => "Carrier",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether this is one of the standard fleet's ships.
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

impl fmt::Display for ShipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way a ship extends from its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Extends along x.
    Horizontal,
    /// Extends along y.
    Vertical,
}

/// Where one ship sits on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipPlacement {
    /// Server-side ship index.
    pub id: u32,
    /// The ship's first cell.
    pub origin: Coord,
    /// Omitted for single-cell ships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
}

/// A fleet layout, keyed by ship kind.
///
/// `BTreeMap` keeps the keys sorted so the serialized JSON is stable.
pub type Positions = BTreeMap<ShipKind, ShipPlacement>;

/// A player's board as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// For the local player: the locked fleet. For the opponent: only the
    /// ships already sunk, revealed.
    #[serde(default)]
    pub positions: Option<Positions>,
    /// Whether the server accepted this layout.
    #[serde(default)]
    pub valid: bool,
}

// ---------------------------------------------------------------------------
// Attack results
// ---------------------------------------------------------------------------

/// The outcome of one shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResult {
    /// The targeted cell.
    pub origin: Coord,
    /// The ship that was hit. `None` (or `null`) for a miss.
    #[serde(rename = "type", default)]
    pub ship: Option<ShipKind>,
    /// Whether this shot sank `ship`.
    #[serde(default)]
    pub destroyed: bool,
}

impl AttackResult {
    /// Whether the shot hit anything.
    pub fn is_hit(&self) -> bool {
        self.ship.is_some()
    }
}

// ---------------------------------------------------------------------------
// Match and game state
// ---------------------------------------------------------------------------

/// Match metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    /// Both boards are locked and valid.
    #[serde(default)]
    pub ready: bool,
    /// Whose turn it is.
    #[serde(default)]
    pub active_player: Option<PlayerId>,
    /// Set once somebody won.
    #[serde(default)]
    pub winner: Option<PlayerId>,
}

/// Process-wide lifecycle of the game event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    /// Matches can be played.
    #[default]
    Running,
    /// The event is over; no further turns.
    Stopped,
}

/// Game lifecycle plus the local player's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    /// Running or stopped.
    #[serde(default)]
    pub state: GameState,
    /// Accumulated score.
    #[serde(default)]
    pub score: u64,
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// The local player as described by a `configuration` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// The player's id.
    pub uuid: PlayerId,
    /// Display name.
    #[serde(default)]
    pub username: String,
    /// The locked board, once there is one.
    #[serde(default)]
    pub board: Option<Board>,
    /// Shots this player fired, oldest first.
    #[serde(default)]
    pub attacks: Vec<AttackResult>,
}

/// The opponent as described by a `configuration` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentInfo {
    /// Absent until somebody has been matched against us.
    #[serde(default)]
    pub uuid: Option<PlayerId>,
    /// Display name.
    #[serde(default)]
    pub username: String,
    /// Revealed (sunk) ships only.
    #[serde(default)]
    pub board: Option<Board>,
    /// Shots the opponent fired at us, oldest first.
    #[serde(default)]
    pub attacks: Vec<AttackResult>,
}

/// `configuration`: the full state of the session, sent after the
/// handshake and whenever the server wants the client to resynchronize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationData {
    /// The match the server placed us in.
    pub game_id: GameId,
    /// Us.
    pub player: PlayerInfo,
    /// Them.
    #[serde(default)]
    pub opponent: OpponentInfo,
    /// Match metadata.
    #[serde(default, rename = "match")]
    pub match_info: MatchInfo,
    /// Game lifecycle, if the server includes it.
    #[serde(default)]
    pub game: Option<GameInfo>,
    /// Grid dimensions.
    #[serde(default)]
    pub board: GridSize,
}

/// `game-state`: a partial update of the game lifecycle and/or match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateData {
    /// New lifecycle state.
    #[serde(default)]
    pub state: Option<GameState>,
    /// New score.
    #[serde(default)]
    pub score: Option<u64>,
    /// New match metadata.
    #[serde(default, rename = "match")]
    pub match_info: Option<MatchInfo>,
}

/// `attack-result` and `bonus-result`: one resolved shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResultData {
    /// Who fired.
    pub attacker: PlayerId,
    /// What happened.
    pub result: AttackResult,
    /// Match metadata after the shot, when the server includes it.
    #[serde(default, rename = "match")]
    pub match_info: Option<MatchInfo>,
}

/// An `attack-result` or `bonus-result` payload in either shape the
/// server sends.
///
/// Attributed frames are tried first. A bare result carries no attacker;
/// whoever held the turn when it arrived fired it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttackResultFrame {
    /// `{attacker, result, match?}`.
    Attributed(AttackResultData),
    /// `{origin, type, destroyed}`.
    Bare(AttackResult),
}

/// `score-update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdateData {
    /// The new score.
    pub score: u64,
}

/// `bad-attack` and `invalid-payload`: a rejection with optional detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionData {
    /// Human-readable reason from the server.
    #[serde(default)]
    pub info: Option<String>,
}

/// Every inbound envelope `type` the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    /// Full session state.
    Configuration,
    /// Game lifecycle / match update.
    GameState,
    /// A resolved normal shot.
    AttackResult,
    /// A resolved bonus shot.
    BonusResult,
    /// Score changed.
    ScoreUpdate,
    /// The server rejected our last attack.
    BadAttack,
    /// The server could not parse something we sent.
    InvalidPayload,
    /// The server failed internally.
    ServerError,
}

impl InboundKind {
    /// Every known inbound kind.
    pub const ALL: [InboundKind; 8] = [
        InboundKind::Configuration,
        InboundKind::GameState,
        InboundKind::AttackResult,
        InboundKind::BonusResult,
        InboundKind::ScoreUpdate,
        InboundKind::BadAttack,
        InboundKind::InvalidPayload,
        InboundKind::ServerError,
    ];

    /// The envelope `type` string for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::GameState => "game-state",
            Self::AttackResult => "attack-result",
            Self::BonusResult => "bonus-result",
            Self::ScoreUpdate => "score-update",
            Self::BadAttack => "bad-attack",
            Self::InvalidPayload => "invalid-payload",
            Self::ServerError => "server-error",
        }
    }

    /// Looks up a kind by envelope `type`. `None` for types this client
    /// doesn't know, which callers must ignore rather than reject.
    pub fn from_type(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl fmt::Display for InboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outbound commands
// ---------------------------------------------------------------------------

/// The `connection` handshake payload.
///
/// Every field is optional: a brand-new client sends `{}`, a returning one
/// sends its persisted [`Identity`] so the server can resume the match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Match to rejoin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
    /// Player to resume as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Ask to be matched against the server's AI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_ai_opponent: Option<bool>,
}

impl Handshake {
    /// Builds a handshake, resuming `identity` when there is one.
    pub fn new(identity: Option<&Identity>, use_ai_opponent: bool) -> Self {
        Self {
            game_id: identity.map(|i| i.game_id.clone()),
            player_id: identity.map(|i| i.player_id.clone()),
            username: identity.map(|i| i.username.clone()),
            use_ai_opponent: use_ai_opponent.then_some(true),
        }
    }
}

/// The (empty) payload of `new-match`, serialized as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatch {}

/// A message from the client to the server.
///
/// `#[serde(tag = "type", content = "data")]` produces "adjacently tagged"
/// JSON, which is exactly the envelope shape:
///   `{ "type": "attack", "data": [2, 3] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Command {
    /// Identity handshake, sent on every (re)connect.
    Connection(Handshake),
    /// Lock the local fleet layout.
    ShipPositions(Positions),
    /// Fire at a cell.
    Attack(Coord),
    /// Use a bonus. The payload shape is owned by the server.
    Bonus(Value),
    /// Ask for another match.
    NewMatch(NewMatch),
}

impl Command {
    /// The envelope `type` this command is sent as.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::ShipPositions(_) => "ship-positions",
            Self::Attack(_) => "attack",
            Self::Bonus(_) => "bonus",
            Self::NewMatch(_) => "new-match",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The wire unit: `{"type": string, "data": any}`.
///
/// Inbound frames are first decoded into an `Envelope` with an untyped
/// `data`, so a frame of an unknown `type` still decodes and can be
/// dropped by the router instead of failing the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The message type.
    #[serde(rename = "type")]
    pub kind: String,
    /// The payload, interpreted according to `kind`. Missing → `null`.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Builds an envelope from any serializable payload.
    pub fn new(kind: impl Into<String>, data: impl Serialize) -> Result<Self, ProtocolError> {
        Ok(Self {
            kind: kind.into(),
            data: serde_json::to_value(data).map_err(ProtocolError::Encode)?,
        })
    }

    /// Decodes `data` into the payload type registered for this envelope.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidData`] when the payload has the
    /// wrong shape.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.data).map_err(|source| ProtocolError::InvalidData {
            kind: self.kind.clone(),
            source,
        })
    }

    /// Like [`decode_data`](Self::decode_data), but a missing (`null`)
    /// payload yields `T::default()`.
    pub fn decode_data_or_default<T: DeserializeOwned + Default>(
        &self,
    ) -> Result<T, ProtocolError> {
        if self.data.is_null() {
            Ok(T::default())
        } else {
            self.decode_data()
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
