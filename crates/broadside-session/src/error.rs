//! Error types for the session layer.

use std::path::PathBuf;

use broadside_protocol::Coord;

/// Errors raised by [`SessionStore`](crate::SessionStore) local actions and
/// by [`IdentityStore`](crate::IdentityStore) implementations.
///
/// Local-action errors are precondition violations: the caller asked for
/// something the current state doesn't allow, and nothing was changed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No `configuration` frame has arrived yet, so we don't know who we are.
    #[error("session is not configured yet")]
    NotConfigured,

    /// Both boards must be locked before anyone can attack.
    #[error("match is not ready")]
    MatchNotReady,

    /// It is the opponent's turn.
    #[error("not your turn")]
    NotYourTurn,

    /// The previous attack has not been resolved by the server yet.
    #[error("an attack is already awaiting its result")]
    AttackPending,

    /// The game event has stopped; no further turns.
    #[error("game is stopped")]
    GameStopped,

    /// Somebody already won this match.
    #[error("match is already decided")]
    MatchFinished,

    /// Positions are set once per match.
    #[error("board is already locked for this match")]
    BoardAlreadyLocked,

    /// A board lock must place at least one ship.
    #[error("cannot lock an empty fleet")]
    EmptyFleet,

    /// The target lies outside the grid.
    #[error("target {0} is outside the grid")]
    OutOfBounds(Coord),

    /// We already fired at this cell.
    #[error("target {0} was already attacked")]
    AlreadyAttacked(Coord),

    /// Reading or writing the persisted identity failed.
    #[error("identity store at {path}: {source}")]
    Persist {
        /// The backing file.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The persisted identity could not be parsed.
    #[error("persisted identity is corrupt: {0}")]
    CorruptIdentity(#[source] serde_json::Error),
}
