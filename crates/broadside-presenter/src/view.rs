//! The derived presentation state handed to renderers.

use std::collections::BTreeMap;

use broadside_protocol::ShipKind;

/// Which board is in front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveBoard {
    /// The opponent's grid, where we fire.
    Attack,
    /// Our own fleet.
    #[default]
    Ship,
}

/// The "Your turn" / "Enemy's turn" modal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnModal {
    /// Shown until the display interval runs out.
    pub visible: bool,
    /// [`YOUR_TURN`] or [`ENEMY_TURN`]. Kept after hiding so a fading
    /// modal doesn't flip its text.
    pub text: String,
}

/// The "position your ships" prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionModal {
    /// Shown once per match until the board is locked or the display
    /// interval runs out.
    pub visible: bool,
}

/// One-line status for the footer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusBanner {
    /// Place and lock the fleet.
    #[default]
    PositionShips,
    /// Our board is locked; the opponent isn't ready.
    WaitingForEnemy,
    /// Fire at will.
    YourTurn,
    /// The opponent is firing.
    EnemyAttack,
    /// The match (or the whole event) is over.
    GameOver,
}

impl StatusBanner {
    /// Display text.
    pub fn text(self) -> &'static str {
        match self {
            Self::PositionShips => "Position your ships",
            Self::WaitingForEnemy => "Waiting for the enemy",
            Self::YourTurn => "Your turn: attack!",
            Self::EnemyAttack => "Enemy is attacking",
            Self::GameOver => "Game over",
        }
    }
}

/// How the match ended for us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// We are the winner.
    Won,
    /// The opponent is the winner.
    Lost,
    /// The event stopped before the match was decided.
    EventClosed,
}

/// One-shot notifications emitted alongside state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// We sank an enemy ship.
    ShipDestroyed {
        /// The sunk enemy ship.
        ship: ShipKind,
    },
    /// The enemy sank one of ours.
    ShipLost {
        /// Our sunk ship.
        ship: ShipKind,
    },
    /// The turn modal was just shown.
    TurnAnnounced {
        /// Whether the new turn is ours.
        yours: bool,
    },
    /// The match became terminal.
    GameOver(Outcome),
}

/// Turn modal text when it's our turn.
pub const YOUR_TURN: &str = "Your turn";
/// Turn modal text when it's the opponent's turn.
pub const ENEMY_TURN: &str = "Enemy's turn";

/// Everything a renderer needs, recomputed by the presenter.
///
/// Read-only for consumers: they get clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationState {
    /// The board in front. Switches only when a turn is announced.
    pub active_board: ActiveBoard,
    /// Turn announcement.
    pub turn_modal: TurnModal,
    /// Prompt to place the fleet.
    pub position_modal: PositionModal,
    /// `true` once the ship is known to be sunk. Only the standard fleet
    /// is tracked.
    pub enemy_ship_status: BTreeMap<ShipKind, bool>,
    /// Footer status.
    pub banner: StatusBanner,
    /// Whether the attack grid should accept clicks.
    pub attacks_enabled: bool,
    /// Set once the match is terminal.
    pub outcome: Option<Outcome>,
    /// Last score the server reported.
    pub score: u64,
}

impl Default for PresentationState {
    fn default() -> Self {
        Self {
            active_board: ActiveBoard::Ship,
            turn_modal: TurnModal::default(),
            position_modal: PositionModal::default(),
            enemy_ship_status: ShipKind::ALL.iter().map(|&kind| (kind, false)).collect(),
            banner: StatusBanner::PositionShips,
            attacks_enabled: false,
            outcome: None,
            score: 0,
        }
    }
}

impl PresentationState {
    /// Whether `ship` is known to be destroyed.
    pub fn is_destroyed(&self, ship: ShipKind) -> bool {
        self.enemy_ship_status.get(&ship).copied().unwrap_or(false)
    }

    /// Enemy ships still afloat.
    pub fn ships_remaining(&self) -> usize {
        self.enemy_ship_status.values().filter(|sunk| !**sunk).count()
    }
}
