//! The session store: the single writer of canonical session state.
//!
//! Every change goes through one of the named mutations below. Each one
//! runs to completion on `&mut self` and returns a [`StoreChange`] that
//! describes what happened, so observers never see a half-applied update.
//!
//! # Invariants
//!
//! - Attack histories are append-only within a match.
//! - `Match.activePlayer` moves only on attack/bonus results (plus the
//!   initial assignment when the match becomes ready). Local actions never
//!   touch it.
//! - Local actions (`lock_board`, `record_local_attack`) only record what
//!   is in flight. Canonical board and history changes wait for the server.

use broadside_protocol::{
    AttackResult, AttackResultData, ConfigurationData, Coord, GameInfo, GameState, GameStateData, GridSize,
    Identity, PlayerId, Positions,
};

use crate::{
    AttackKind, BoardState, MatchState, Participant, SessionError, Side, StoreChange,
};

/// Canonical client-side session state.
///
/// ## Lifecycle
///
/// ```text
/// new() ──→ apply_configuration() ──→ lock_board() ──→ (configuration: board valid)
///                                                        │
///             ┌──────────────────────────────────────────┘
///             ▼
///   record_local_attack() ──→ apply_attack_result() ──→ ... ──→ winner / stopped
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStore {
    identity: Option<Identity>,
    grid: GridSize,
    player: Participant,
    opponent: Participant,
    match_state: MatchState,
    game: GameInfo,
    /// Layout sent with `ship-positions`, not yet acknowledged.
    pending_positions: Option<Positions>,
    /// Target sent with `attack`, not yet resolved.
    pending_attack: Option<Coord>,
    /// Bumped on every mutation.
    revision: u64,
}

impl SessionStore {
    /// Creates an empty, unconfigured store.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------
    // Inbound mutations (one per router entry)
    // -----------------------------------------------------------------

    /// `configuration`: replaces identity, boards, match, and game state.
    ///
    /// Applying the same frame twice leaves the store exactly as applying
    /// it once (apart from the revision counter).
    pub fn apply_configuration(&mut self, data: ConfigurationData) -> StoreChange {
        let identity = Identity {
            game_id: data.game_id,
            player_id: data.player.uuid.clone(),
            username: data.player.username.clone(),
        };
        let new_match = self
            .identity
            .as_ref()
            .is_none_or(|current| current.game_id != identity.game_id);
        let identity_changed = self.identity.as_ref() != Some(&identity);

        let mut player_board = BoardState::from_wire(data.player.board, data.player.attacks);
        let mut opponent_board =
            BoardState::from_wire(data.opponent.board, data.opponent.attacks);

        if !new_match {
            keep_longer_history(&mut player_board, &self.player.board, Side::Local);
            keep_longer_history(&mut opponent_board, &self.opponent.board, Side::Opponent);
        }

        if new_match || player_board.valid {
            self.pending_positions = None;
        }
        self.pending_attack = None;

        self.player = Participant {
            id: Some(data.player.uuid),
            username: data.player.username,
            board: player_board,
        };
        self.opponent = Participant {
            id: data.opponent.uuid,
            username: data.opponent.username,
            board: opponent_board,
        };
        self.match_state = data.match_info.into();
        if let Some(game) = data.game {
            self.game = game;
        }
        self.grid = data.board;
        self.identity = Some(identity);
        self.bump();

        tracing::debug!(
            game_id = ?self.identity.as_ref().map(|i| i.game_id.as_str()),
            new_match,
            ready = self.match_state.ready,
            "configuration applied"
        );
        StoreChange::Configured {
            new_match,
            identity_changed,
        }
    }

    /// `game-state`: updates the game lifecycle and/or match fields.
    ///
    /// `activePlayer` is only taken from this frame for the initial turn
    /// assignment (no active player yet, or the match just became ready).
    pub fn apply_game_state(&mut self, data: GameStateData) -> StoreChange {
        if let Some(state) = data.state {
            self.game.state = state;
        }
        if let Some(score) = data.score {
            self.game.score = score;
        }

        let mut ready_changed = false;
        let mut turn_changed = false;
        if let Some(info) = data.match_info {
            ready_changed = info.ready != self.match_state.ready;
            let initial_assignment =
                self.match_state.active_player.is_none() || (ready_changed && info.ready);
            if initial_assignment {
                turn_changed = info.active_player != self.match_state.active_player;
                self.match_state.active_player = info.active_player;
            } else if info.active_player.is_some()
                && info.active_player != self.match_state.active_player
            {
                tracing::debug!(
                    "ignoring activePlayer from game-state; turns move on attack results"
                );
            }
            self.match_state.ready = info.ready;
            if info.winner.is_some() {
                self.match_state.winner = info.winner;
            }
        }
        self.bump();

        StoreChange::GameStateUpdated {
            ready_changed,
            turn_changed,
        }
    }

    /// `attack-result` / `bonus-result`: appends the result to the
    /// attacker's history and advances the turn.
    pub fn apply_attack_result(&mut self, data: AttackResultData, kind: AttackKind) -> StoreChange {
        let attacker = if self.player.is(&data.attacker) {
            Side::Local
        } else {
            Side::Opponent
        };

        self.participant_mut(attacker)
            .board
            .attacks
            .push(data.result.clone());
        if attacker == Side::Local {
            self.pending_attack = None;
        }

        let previous = self.match_state.active_player.clone();
        if self.game.state == GameState::Stopped {
            tracing::debug!("game stopped; turn left unchanged");
        } else {
            match data.match_info {
                Some(info) => {
                    if info.active_player.is_some() {
                        self.match_state.active_player = info.active_player;
                    }
                    if info.winner.is_some() {
                        self.match_state.winner = info.winner;
                    }
                }
                None => {
                    // No match metadata: the turn passes to the other side.
                    let next = self.participant(attacker.other()).id.clone();
                    if next.is_some() {
                        self.match_state.active_player = next;
                    }
                }
            }
        }
        let turn_changed = previous != self.match_state.active_player;
        self.bump();

        tracing::debug!(
            ?attacker,
            ?kind,
            origin = %data.result.origin,
            destroyed = data.result.destroyed,
            turn_changed,
            "attack result recorded"
        );
        StoreChange::AttackResolved {
            attacker,
            result: data.result,
            kind,
            turn_changed,
        }
    }

    /// `score-update`.
    pub fn apply_score_update(&mut self, score: u64) -> StoreChange {
        self.game.score = score;
        self.bump();
        StoreChange::ScoreUpdated(score)
    }

    /// `bad-attack`: the server refused our last shot. Input is enabled
    /// again; history and turn are untouched because nothing was applied
    /// when the attack was sent.
    pub fn apply_bad_attack(&mut self, info: Option<String>) -> StoreChange {
        if let Some(target) = self.pending_attack.take() {
            tracing::debug!(%target, "pending attack rejected");
        }
        self.bump();
        StoreChange::AttackRejected { info }
    }

    /// `invalid-payload` / `server-error`: nothing canonical changes.
    pub fn report_server_error(&mut self, message: String) -> StoreChange {
        self.bump();
        StoreChange::ServerError(message)
    }

    // -----------------------------------------------------------------
    // Local mutations
    // -----------------------------------------------------------------

    /// Records a layout we are about to send with `ship-positions`.
    ///
    /// The board stays invalid until the server acknowledges it.
    ///
    /// # Errors
    /// - [`SessionError::BoardAlreadyLocked`] once positions are accepted
    /// - [`SessionError::EmptyFleet`] for an empty layout
    /// - [`SessionError::GameStopped`] after the event ended
    pub fn lock_board(&mut self, positions: &Positions) -> Result<StoreChange, SessionError> {
        self.check_lock_board(positions)?;
        self.pending_positions = Some(positions.clone());
        self.bump();
        Ok(StoreChange::BoardLockRequested)
    }

    /// Records a target we are about to send with `attack` or `bonus`.
    ///
    /// Nothing is appended to the history here; that only happens when
    /// the result frame arrives.
    ///
    /// # Errors
    /// Any of the precondition errors in [`check_can_attack`](Self::check_can_attack),
    /// plus [`SessionError::OutOfBounds`] and [`SessionError::AlreadyAttacked`].
    pub fn record_local_attack(&mut self, target: Coord) -> Result<StoreChange, SessionError> {
        self.check_local_attack(target)?;
        self.pending_attack = Some(target);
        self.bump();
        Ok(StoreChange::AttackRequested(target))
    }

    /// What [`lock_board`](Self::lock_board) checks, without recording
    /// anything.
    pub fn check_lock_board(&self, positions: &Positions) -> Result<(), SessionError> {
        if self.player.board.is_locked() {
            return Err(SessionError::BoardAlreadyLocked);
        }
        if positions.is_empty() {
            return Err(SessionError::EmptyFleet);
        }
        if self.game.state == GameState::Stopped {
            return Err(SessionError::GameStopped);
        }
        Ok(())
    }

    /// What [`record_local_attack`](Self::record_local_attack) checks,
    /// without recording anything.
    pub fn check_local_attack(&self, target: Coord) -> Result<(), SessionError> {
        self.check_can_attack()?;
        if target.x() >= self.grid.columns || target.y() >= self.grid.rows {
            return Err(SessionError::OutOfBounds(target));
        }
        if self.player.board.attacks.iter().any(|a| a.origin == target) {
            return Err(SessionError::AlreadyAttacked(target));
        }
        Ok(())
    }

    /// Checks everything except the target itself.
    pub fn check_can_attack(&self) -> Result<(), SessionError> {
        let Some(local) = self.player.id.as_ref() else {
            return Err(SessionError::NotConfigured);
        };
        if self.game.state == GameState::Stopped {
            return Err(SessionError::GameStopped);
        }
        if self.match_state.winner.is_some() {
            return Err(SessionError::MatchFinished);
        }
        if !self.match_state.ready {
            return Err(SessionError::MatchNotReady);
        }
        if self.match_state.active_player.as_ref() != Some(local) {
            return Err(SessionError::NotYourTurn);
        }
        if self.pending_attack.is_some() {
            return Err(SessionError::AttackPending);
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------

    /// Who we are, once configured.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Grid dimensions.
    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// The local player.
    pub fn player(&self) -> &Participant {
        &self.player
    }

    /// The opponent.
    pub fn opponent(&self) -> &Participant {
        &self.opponent
    }

    /// A participant by side.
    pub fn participant(&self, side: Side) -> &Participant {
        match side {
            Side::Local => &self.player,
            Side::Opponent => &self.opponent,
        }
    }

    /// Readiness, turn, and winner.
    pub fn match_state(&self) -> &MatchState {
        &self.match_state
    }

    /// Game lifecycle and score.
    pub fn game(&self) -> GameInfo {
        self.game
    }

    /// Layout awaiting acknowledgment.
    pub fn pending_positions(&self) -> Option<&Positions> {
        self.pending_positions.as_ref()
    }

    /// Target awaiting its result.
    pub fn pending_attack(&self) -> Option<Coord> {
        self.pending_attack
    }

    /// Mutation counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whose turn it is, as a side. `None` before the first assignment.
    pub fn active_side(&self) -> Option<Side> {
        let active = self.match_state.active_player.as_ref()?;
        Some(self.side_of(active))
    }

    /// Who fired a result that arrived without an attacker.
    ///
    /// The player holding the turn fired it. Before any turn is assigned,
    /// a result landing on our own pending target is ours.
    pub fn presumed_attacker(&self, result: &AttackResult) -> Option<PlayerId> {
        if let Some(active) = &self.match_state.active_player {
            return Some(active.clone());
        }
        if self.pending_attack == Some(result.origin) {
            return self.player.id.clone();
        }
        None
    }

    /// Whether the match or the whole event is over.
    pub fn is_over(&self) -> bool {
        self.game.state == GameState::Stopped || self.match_state.winner.is_some()
    }

    fn side_of(&self, player: &PlayerId) -> Side {
        if self.player.is(player) {
            Side::Local
        } else {
            Side::Opponent
        }
    }

    fn participant_mut(&mut self, side: Side) -> &mut Participant {
        match side {
            Side::Local => &mut self.player,
            Side::Opponent => &mut self.opponent,
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

/// Keeps `current`'s history when the incoming snapshot would shrink it.
fn keep_longer_history(incoming: &mut BoardState, current: &BoardState, side: Side) {
    if incoming.attacks.len() < current.attacks.len() {
        tracing::warn!(
            ?side,
            incoming = incoming.attacks.len(),
            current = current.attacks.len(),
            "configuration would shrink attack history; keeping local history"
        );
        incoming.attacks = current.attacks.clone();
    }
}
