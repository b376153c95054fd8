//! The synchronous session core.
//!
//! [`Session`] bundles everything that reacts to a frame, a timer, or an
//! intent: router, store, presenter, and encoder. It does no I/O and never
//! sleeps, so the driver in [`client`](crate::client) stays a thin
//! `select!` loop and tests can exercise whole sequences without a runtime.

use broadside_presenter::{Notice, PresentationState, PresenterConfig, TurnPresenter};
use broadside_protocol::{Codec, Envelope, Identity, JsonCodec, ProtocolError};
use broadside_session::{SessionError, SessionStore, StoreChange};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::encoder::{CommandEncoder, Intent};
use crate::router::Router;
use crate::BroadsideError;

/// What one inbound frame did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    /// The store mutation the frame caused.
    pub change: StoreChange,
    /// One-shot notices the presenter emitted for it.
    pub notices: Vec<Notice>,
}

/// Router, store, presenter, and encoder for one client.
#[derive(Debug)]
pub struct Session<C: Codec = JsonCodec> {
    store: SessionStore,
    presenter: TurnPresenter,
    router: Router,
    encoder: CommandEncoder<C>,
    /// Persisted identity, used for the handshake until the server
    /// configures us.
    resume: Option<Identity>,
    use_ai_opponent: bool,
}

impl Session<JsonCodec> {
    /// A JSON session. `resume` is the identity loaded from persistence.
    pub fn new(presenter: PresenterConfig, resume: Option<Identity>, use_ai_opponent: bool) -> Self {
        Self::with_codec(JsonCodec, presenter, resume, use_ai_opponent)
    }
}

impl<C: Codec> Session<C> {
    /// A session with a custom codec.
    pub fn with_codec(
        codec: C,
        presenter: PresenterConfig,
        resume: Option<Identity>,
        use_ai_opponent: bool,
    ) -> Self {
        Self {
            store: SessionStore::new(),
            presenter: TurnPresenter::new(presenter),
            router: Router::standard(),
            encoder: CommandEncoder::new(codec),
            resume,
            use_ai_opponent,
        }
    }

    /// Replaces the router, e.g. to add handlers for extra message types.
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// The `connection` frame to send right after every (re)connect.
    pub fn handshake(&self) -> Result<Vec<u8>, ProtocolError> {
        let identity = self.store.identity().or(self.resume.as_ref());
        debug!(resuming = identity.is_some(), "building handshake");
        self.encoder.handshake(identity, self.use_ai_opponent)
    }

    /// Decodes and applies one inbound frame.
    ///
    /// Returns `None` when the frame was dropped (undecodable, unknown
    /// type, or malformed payload); nothing changed in that case.
    pub fn handle_frame(&mut self, frame: &[u8], now: Instant) -> Option<FrameOutcome> {
        let envelope: Envelope = match self.encoder.codec().decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, len = frame.len(), "failed to decode frame");
                return None;
            }
        };
        let change = self.router.dispatch(&mut self.store, &envelope)?;
        let notices = self.presenter.on_change(&self.store, &change, now);
        Some(FrameOutcome { change, notices })
    }

    /// Checks `intent` against the current state and encodes it.
    ///
    /// Nothing is recorded yet. Once the returned frame is on the wire,
    /// call [`commit`](Self::commit) with the same intent. On error
    /// nothing should be sent.
    pub fn prepare(&self, intent: &Intent) -> Result<Vec<u8>, BroadsideError> {
        match intent {
            Intent::LockBoard(positions) => self.store.check_lock_board(positions)?,
            Intent::Attack(target) => self.store.check_local_attack(*target)?,
            Intent::UseBonus(_) => self.store.check_can_attack()?,
            Intent::RequestNewMatch => {
                if self.store.identity().is_none() {
                    return Err(SessionError::NotConfigured.into());
                }
            }
        }
        Ok(self.encoder.encode(&intent.clone().into_command())?)
    }

    /// Records what a sent intent put in flight: the pending layout or
    /// the pending attack.
    pub fn commit(&mut self, intent: Intent, now: Instant) -> Result<(), BroadsideError> {
        let change = match intent {
            Intent::LockBoard(positions) => self.store.lock_board(&positions)?,
            Intent::Attack(target) => self.store.record_local_attack(target)?,
            Intent::UseBonus(_) | Intent::RequestNewMatch => return Ok(()),
        };
        self.presenter.on_change(&self.store, &change, now);
        Ok(())
    }

    /// Applies timed presenter transitions due at `now`.
    pub fn advance(&mut self, now: Instant) -> Vec<Notice> {
        self.presenter.advance(&self.store, now)
    }

    /// When [`advance`](Self::advance) next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.presenter.next_deadline()
    }

    /// Canonical state.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Derived presentation state.
    pub fn view(&self) -> &PresentationState {
        self.presenter.view()
    }

    /// The presenter.
    pub fn presenter(&self) -> &TurnPresenter {
        &self.presenter
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use broadside_presenter::{ActiveBoard, ENEMY_TURN};
    use broadside_protocol::{Coord, GameId, PlayerId, ShipKind};
    use serde_json::{Value, json};

    use super::*;

    fn frame(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    fn configuration(ready: bool) -> Vec<u8> {
        frame(json!({
            "type": "configuration",
            "data": {
                "gameId": "g1",
                "player": {
                    "uuid": "p1",
                    "username": "alice",
                    "board": {"positions": {"Destroyer": {"id": 1, "origin": [0, 0]}}, "valid": true},
                    "attacks": []
                },
                "opponent": {"uuid": "p2", "username": "bob", "board": {"positions": null, "valid": true}, "attacks": []},
                "match": {"ready": ready, "activePlayer": "p1", "winner": null},
                "board": {"rows": 10, "columns": 10}
            }
        }))
    }

    fn session() -> Session {
        Session::new(PresenterConfig::default(), None, false)
    }

    #[test]
    fn test_handshake_prefers_configured_identity() {
        let resume = Identity {
            game_id: GameId::new("old"),
            player_id: PlayerId::new("p1"),
            username: "alice".into(),
        };
        let mut session = Session::new(PresenterConfig::default(), Some(resume), false);
        let before: Value = serde_json::from_slice(&session.handshake().unwrap()).unwrap();
        assert_eq!(before["data"]["gameId"], "old");

        session.handle_frame(&configuration(false), Instant::now());
        let after: Value = serde_json::from_slice(&session.handshake().unwrap()).unwrap();
        assert_eq!(after["data"]["gameId"], "g1");
    }

    #[test]
    fn test_configuration_then_ship_board() {
        let mut session = session();
        let outcome = session.handle_frame(&configuration(false), Instant::now()).unwrap();
        assert!(matches!(outcome.change, StoreChange::Configured { .. }));
        assert_eq!(session.store().identity().unwrap().username, "alice");
        assert!(session.store().opponent().board.valid);
        assert_eq!(session.view().active_board, ActiveBoard::Ship);
    }

    #[test]
    fn test_garbage_frame_is_dropped() {
        let mut session = session();
        assert_eq!(session.handle_frame(b"not json", Instant::now()), None);
        assert_eq!(session.store().revision(), 0);
    }

    #[test]
    fn test_unknown_type_changes_nothing() {
        let mut session = session();
        session.handle_frame(&configuration(true), Instant::now());
        let before = session.store().clone();

        let outcome = session.handle_frame(
            &frame(json!({"type": "unknown-future-type", "data": {}})),
            Instant::now(),
        );
        assert_eq!(outcome, None);
        assert_eq!(session.store(), &before);
    }

    #[test]
    fn test_echoed_attack_is_not_applied_twice() {
        let now = Instant::now();
        let mut session = session();
        session.handle_frame(&configuration(true), now);

        let intent = Intent::Attack(Coord(2, 2));
        let sent = session.prepare(&intent).unwrap();
        session.commit(intent, now).unwrap();
        assert!(session.store().player().board.attacks.is_empty());

        // Our own frame echoed back is not something the router applies.
        assert_eq!(session.handle_frame(&sent, now), None);
        assert!(session.store().player().board.attacks.is_empty());

        let result = frame(json!({
            "type": "attack-result",
            "data": {"attacker": "p1", "result": {"origin": [2, 2], "type": "Destroyer", "destroyed": true}}
        }));
        session.handle_frame(&result, now);
        assert_eq!(session.store().player().board.attacks.len(), 1);
        assert_eq!(session.store().pending_attack(), None);
    }

    #[test]
    fn test_rejected_intent_sends_nothing() {
        let now = Instant::now();
        let mut session = session();
        session.handle_frame(&configuration(false), now);

        let err = session.prepare(&Intent::Attack(Coord(0, 0))).unwrap_err();
        assert!(matches!(err, BroadsideError::Session(SessionError::MatchNotReady)));
        assert_eq!(session.store().pending_attack(), None);

        let err = session.prepare(&Intent::UseBonus(json!({}))).unwrap_err();
        assert!(matches!(err, BroadsideError::Session(SessionError::MatchNotReady)));
    }

    #[test]
    fn test_prepare_records_nothing_until_commit() {
        let now = Instant::now();
        let mut session = session();
        session.handle_frame(&configuration(true), now);
        let before = session.store().clone();

        let intent = Intent::Attack(Coord(4, 4));
        let frame = session.prepare(&intent).unwrap();
        let sent: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(sent, json!({"type": "attack", "data": [4, 4]}));
        assert_eq!(session.store(), &before);
        assert!(session.view().attacks_enabled);

        session.commit(intent, now).unwrap();
        assert_eq!(session.store().pending_attack(), Some(Coord(4, 4)));
        assert!(!session.view().attacks_enabled);
    }

    #[test]
    fn test_bare_destroying_result_then_enemy_turn() {
        let now = Instant::now();
        let mut session = session();
        session.handle_frame(&configuration(true), now);

        let outcome = session
            .handle_frame(
                &frame(json!({
                    "type": "attack-result",
                    "data": {"origin": [2, 2], "type": "Destroyer", "destroyed": true}
                })),
                now,
            )
            .unwrap();
        assert!(outcome
            .notices
            .contains(&Notice::ShipDestroyed { ship: ShipKind::Destroyer }));
        assert_eq!(session.store().player().board.attacks.len(), 1);
        assert!(session.view().is_destroyed(ShipKind::Destroyer));

        let notices = session.advance(now + Duration::from_millis(1000));
        assert_eq!(notices, vec![Notice::TurnAnnounced { yours: false }]);
        assert_eq!(session.view().turn_modal.text, ENEMY_TURN);
        assert!(session.view().turn_modal.visible);
    }

    #[test]
    fn test_new_match_needs_configuration() {
        let mut session = session();
        let err = session.prepare(&Intent::RequestNewMatch).unwrap_err();
        assert!(matches!(err, BroadsideError::Session(SessionError::NotConfigured)));
    }

    #[test]
    fn test_advance_runs_presenter_timers() {
        let now = Instant::now();
        let mut session = session();
        session.handle_frame(&configuration(true), now);
        assert!(session.view().turn_modal.visible);

        let deadline = session.next_deadline().unwrap();
        assert_eq!(deadline, now + Duration::from_millis(1500));
        session.advance(deadline);
        assert!(!session.view().turn_modal.visible);
    }
}
