//! The turn presentation state machine.

use broadside_protocol::GameState;
use broadside_session::{SessionStore, Side, StoreChange};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::timers::{TimerKind, Timers};
use crate::view::{
    ActiveBoard, ENEMY_TURN, Notice, Outcome, PresentationState, StatusBanner, YOUR_TURN,
};
use crate::PresenterConfig;

/// Where the presenter is in the match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Our board is not locked yet.
    #[default]
    Initial,
    /// Board locked, opponent not ready.
    Waiting,
    /// Match ready, turns are being announced.
    Playing,
    /// Winner set or game stopped. Only a new match leaves this phase.
    Over,
}

/// Turns [`StoreChange`]s into a timed sequence of [`PresentationState`]s.
///
/// The presenter is the single writer of the derived state and only reads
/// the [`SessionStore`]. It never sleeps: timed transitions are stored as
/// deadlines and applied when the driver calls [`advance`](Self::advance).
///
/// # Sequencing
///
/// ```text
/// attack-result ──→ board/ship status updated now
///                   └─ settle interval ──→ turn modal + active board
///                                          └─ display interval ──→ modal hidden
/// ```
///
/// Each new attack result restarts the settle interval, so a burst of
/// results produces one announcement after the last one.
#[derive(Debug, Clone)]
pub struct TurnPresenter {
    config: PresenterConfig,
    view: PresentationState,
    timers: Timers,
    phase: Phase,
    /// The position prompt was shown for this match.
    position_prompted: bool,
}

impl TurnPresenter {
    /// A presenter in the [`Phase::Initial`] state.
    pub fn new(config: PresenterConfig) -> Self {
        Self {
            config: config.validated(),
            view: PresentationState::default(),
            timers: Timers::new(),
            phase: Phase::Initial,
            position_prompted: false,
        }
    }

    /// The current derived state.
    pub fn view(&self) -> &PresentationState {
        &self.view
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Pending timed transitions.
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// When [`advance`](Self::advance) next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// The configuration in use.
    pub fn config(&self) -> &PresenterConfig {
        &self.config
    }

    /// Reacts to one store mutation. Call once per change, in order.
    pub fn on_change(
        &mut self,
        store: &SessionStore,
        change: &StoreChange,
        now: Instant,
    ) -> Vec<Notice> {
        let mut notices = Vec::new();
        match change {
            StoreChange::Configured { new_match, .. } => {
                if *new_match {
                    self.reset();
                }
                self.sync_enemy_ships(store);
                self.recompute(store, now, true, &mut notices);
            }
            StoreChange::GameStateUpdated {
                ready_changed,
                turn_changed,
            } => {
                self.recompute(store, now, *ready_changed || *turn_changed, &mut notices);
            }
            StoreChange::AttackResolved {
                attacker, result, ..
            } => {
                if let (Some(ship), true) = (result.ship, result.destroyed) {
                    match attacker {
                        Side::Local => {
                            if ship.is_known() {
                                self.view.enemy_ship_status.insert(ship, true);
                            }
                            notices.push(Notice::ShipDestroyed { ship });
                        }
                        Side::Opponent => notices.push(Notice::ShipLost { ship }),
                    }
                }
                if self.phase != Phase::Over {
                    if store.is_over() {
                        self.enter_over(store, &mut notices);
                    } else {
                        self.timers
                            .schedule(TimerKind::Settle, now + self.config.settle_interval);
                        trace!(?attacker, "settle interval started");
                    }
                }
            }
            StoreChange::ScoreUpdated(_)
            | StoreChange::AttackRejected { .. }
            | StoreChange::ServerError(_)
            | StoreChange::BoardLockRequested
            | StoreChange::AttackRequested(_) => {}
        }
        self.refresh(store);
        notices
    }

    /// Applies every timed transition due at `now`.
    pub fn advance(&mut self, store: &SessionStore, now: Instant) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Some(kind) = self.timers.pop_due(now) {
            trace!(?kind, "timer fired");
            match kind {
                TimerKind::PositionModalHide => self.view.position_modal.visible = false,
                TimerKind::TurnModalHide => self.view.turn_modal.visible = false,
                TimerKind::Settle => {
                    if self.phase == Phase::Playing {
                        self.announce(store, now, &mut notices);
                    }
                }
            }
        }
        self.refresh(store);
        notices
    }

    fn reset(&mut self) {
        debug!("presenter reset for a new match");
        self.view = PresentationState::default();
        self.timers.clear();
        self.phase = Phase::Initial;
        self.position_prompted = false;
    }

    /// Marks revealed or previously sunk enemy ships, e.g. after resuming.
    fn sync_enemy_ships(&mut self, store: &SessionStore) {
        let revealed = store.opponent().board.ships();
        let sunk = store
            .player()
            .board
            .attacks
            .iter()
            .filter(|a| a.destroyed)
            .filter_map(|a| a.ship);
        for ship in revealed.chain(sunk).filter(|ship| ship.is_known()) {
            self.view.enemy_ship_status.insert(ship, true);
        }
    }

    fn recompute(
        &mut self,
        store: &SessionStore,
        now: Instant,
        announce: bool,
        notices: &mut Vec<Notice>,
    ) {
        if self.phase == Phase::Over {
            return;
        }
        if store.is_over() {
            self.enter_over(store, notices);
            return;
        }

        if !store.player().board.is_locked() {
            if !self.position_prompted {
                self.position_prompted = true;
                self.view.position_modal.visible = true;
                self.timers.schedule(
                    TimerKind::PositionModalHide,
                    now + self.config.display_interval,
                );
            }
            self.phase = Phase::Initial;
            self.view.active_board = ActiveBoard::Ship;
            return;
        }

        if self.view.position_modal.visible {
            self.view.position_modal.visible = false;
            self.timers.cancel(TimerKind::PositionModalHide);
        }

        if !store.match_state().ready {
            self.phase = Phase::Waiting;
            self.view.active_board = ActiveBoard::Ship;
            return;
        }

        let entering = self.phase != Phase::Playing;
        self.phase = Phase::Playing;
        // A pending settle interval will announce on its own.
        if (announce || entering) && !self.timers.is_scheduled(TimerKind::Settle) {
            self.announce(store, now, notices);
        }
    }

    fn announce(&mut self, store: &SessionStore, now: Instant, notices: &mut Vec<Notice>) {
        let Some(side) = store.active_side() else {
            self.view.active_board = ActiveBoard::Ship;
            return;
        };
        let yours = side == Side::Local;
        self.view.active_board = if yours {
            ActiveBoard::Attack
        } else {
            ActiveBoard::Ship
        };
        self.view.turn_modal.visible = true;
        self.view.turn_modal.text = if yours { YOUR_TURN } else { ENEMY_TURN }.to_owned();
        self.timers
            .schedule(TimerKind::TurnModalHide, now + self.config.display_interval);
        debug!(yours, "turn announced");
        notices.push(Notice::TurnAnnounced { yours });
    }

    fn enter_over(&mut self, store: &SessionStore, notices: &mut Vec<Notice>) {
        self.phase = Phase::Over;
        self.timers.cancel(TimerKind::Settle);
        let outcome = outcome_of(store);
        self.view.outcome = outcome;
        if let Some(outcome) = outcome {
            debug!(?outcome, "match over");
            notices.push(Notice::GameOver(outcome));
        }
    }

    /// Re-derives the fields that follow the store directly.
    fn refresh(&mut self, store: &SessionStore) {
        self.view.score = store.game().score;
        self.view.attacks_enabled = self.phase == Phase::Playing
            && self.view.active_board == ActiveBoard::Attack
            && store.check_can_attack().is_ok();
        self.view.banner = match self.phase {
            Phase::Initial => StatusBanner::PositionShips,
            Phase::Waiting => StatusBanner::WaitingForEnemy,
            Phase::Over => StatusBanner::GameOver,
            Phase::Playing => match self.view.active_board {
                ActiveBoard::Attack => StatusBanner::YourTurn,
                ActiveBoard::Ship => StatusBanner::EnemyAttack,
            },
        };
    }
}

fn outcome_of(store: &SessionStore) -> Option<Outcome> {
    match (&store.match_state().winner, store.game().state) {
        (Some(winner), _) if store.player().id.as_ref() == Some(winner) => Some(Outcome::Won),
        (Some(_), _) => Some(Outcome::Lost),
        (None, GameState::Stopped) => Some(Outcome::EventClosed),
        (None, GameState::Running) => None,
    }
}
