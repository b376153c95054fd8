//! Session state types: the canonical, client-side mirror of the match.
//!
//! Everything here is owned by [`SessionStore`](crate::SessionStore) and
//! only changes through its named mutations. Consumers read clones.

use broadside_protocol::{AttackResult, Board, MatchInfo, PlayerId, Positions, ShipKind};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Which participant something belongs to, from this client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The player using this client.
    Local,
    /// The other player.
    Opponent,
}

impl Side {
    /// The other side.
    pub fn other(self) -> Self {
        match self {
            Self::Local => Self::Opponent,
            Self::Opponent => Self::Local,
        }
    }
}

/// How a shot was fired. Both kinds resolve through the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackKind {
    /// A regular turn attack.
    Attack,
    /// A bonus attack.
    Bonus,
}

// ---------------------------------------------------------------------------
// BoardState
// ---------------------------------------------------------------------------

/// One participant's board plus the shots that participant fired.
///
/// `positions` is set once per match (when the server accepts the lock)
/// and `attacks` only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    /// The fleet. For the opponent this only holds revealed (sunk) ships.
    pub positions: Option<Positions>,
    /// Whether the server accepted the layout.
    pub valid: bool,
    /// Shots fired by this participant, oldest first.
    pub attacks: Vec<AttackResult>,
}

impl BoardState {
    pub(crate) fn from_wire(board: Option<Board>, attacks: Vec<AttackResult>) -> Self {
        let board = board.unwrap_or_default();
        Self {
            positions: board.positions,
            valid: board.valid,
            attacks,
        }
    }

    /// Whether the fleet is locked and accepted.
    pub fn is_locked(&self) -> bool {
        self.valid && self.positions.is_some()
    }

    /// Ships listed in `positions`. For the opponent these are the sunk ones.
    pub fn ships(&self) -> impl Iterator<Item = ShipKind> + '_ {
        self.positions.iter().flat_map(|p| p.keys().copied())
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// A player in the current match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participant {
    /// `None` until the server tells us (the opponent may not exist yet).
    pub id: Option<PlayerId>,
    /// Display name.
    pub username: String,
    /// Board and fired shots.
    pub board: BoardState,
}

impl Participant {
    pub(crate) fn is(&self, player: &PlayerId) -> bool {
        self.id.as_ref() == Some(player)
    }
}

// ---------------------------------------------------------------------------
// MatchState
// ---------------------------------------------------------------------------

/// Readiness, turn, and outcome of the current match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchState {
    /// Both boards are locked and valid.
    pub ready: bool,
    /// Whose turn it is. Only attack/bonus results move this once set.
    pub active_player: Option<PlayerId>,
    /// Set when the match is decided.
    pub winner: Option<PlayerId>,
}

impl From<MatchInfo> for MatchState {
    fn from(info: MatchInfo) -> Self {
        Self {
            ready: info.ready,
            active_player: info.active_player,
            winner: info.winner,
        }
    }
}

// ---------------------------------------------------------------------------
// StoreChange
// ---------------------------------------------------------------------------

/// The notification every [`SessionStore`](crate::SessionStore) mutation
/// returns. The presenter consumes these, in order, to decide what to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// A `configuration` frame replaced the session state.
    Configured {
        /// The frame belongs to a different match than before.
        new_match: bool,
        /// The identity differs from what we had (persist it).
        identity_changed: bool,
    },
    /// A `game-state` frame updated the lifecycle and/or match.
    GameStateUpdated {
        /// `Match.ready` changed.
        ready_changed: bool,
        /// `Match.activePlayer` changed.
        turn_changed: bool,
    },
    /// An attack or bonus result was appended to a history.
    AttackResolved {
        /// Who fired.
        attacker: Side,
        /// The appended result.
        result: AttackResult,
        /// Attack or bonus.
        kind: AttackKind,
        /// `Match.activePlayer` changed.
        turn_changed: bool,
    },
    /// The score changed.
    ScoreUpdated(u64),
    /// The server rejected our last attack; input is enabled again.
    AttackRejected {
        /// The server's reason, if any.
        info: Option<String>,
    },
    /// The server reported an error that needs no state change.
    ServerError(String),
    /// We asked the server to lock our board. Nothing is valid yet.
    BoardLockRequested,
    /// We fired at a cell and are waiting for its result.
    AttackRequested(broadside_protocol::Coord),
}
