//! Message router: one handler per inbound envelope type.
//!
//! The router is the only place inbound frames touch the
//! [`SessionStore`]. Each handler decodes its payload and performs exactly
//! one named store mutation. Unknown types and malformed payloads are
//! logged and dropped so a newer server can never break an older client.

use std::collections::HashMap;

use broadside_protocol::{
    AttackResultData, AttackResultFrame, ConfigurationData, Envelope, GameStateData, InboundKind,
    ProtocolError, RejectionData, ScoreUpdateData,
};
use broadside_session::{AttackKind, SessionStore, StoreChange};
use tracing::{debug, warn};

/// A handler turns one envelope into one store mutation.
pub type Handler = fn(&mut SessionStore, &Envelope) -> Result<StoreChange, ProtocolError>;

/// Dispatch table keyed by envelope `type`.
#[derive(Clone)]
pub struct Router {
    handlers: HashMap<&'static str, Handler>,
}

impl Router {
    /// An empty router that drops everything.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A router with a handler for every [`InboundKind`].
    pub fn standard() -> Self {
        let mut router = Self::new();
        for kind in InboundKind::ALL {
            router.register(kind.as_str(), handler_for(kind));
        }
        router
    }

    /// Registers `handler` for `kind`, returning the handler it replaced.
    pub fn register(&mut self, kind: &'static str, handler: Handler) -> Option<Handler> {
        self.handlers.insert(kind, handler)
    }

    /// Whether a handler exists for `kind`.
    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Applies `envelope` to `store`.
    ///
    /// Returns `None` when the envelope was dropped: no handler for its
    /// type, or a payload that doesn't decode. The store is untouched in
    /// both cases.
    pub fn dispatch(&self, store: &mut SessionStore, envelope: &Envelope) -> Option<StoreChange> {
        let Some(handler) = self.handlers.get(envelope.kind.as_str()) else {
            debug!(kind = %envelope.kind, "no handler for envelope type, ignoring");
            return None;
        };
        match handler(store, envelope) {
            Ok(change) => Some(change),
            Err(e) => {
                warn!(kind = %envelope.kind, error = %e, "dropping malformed frame");
                None
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("Router").field("kinds", &kinds).finish()
    }
}

fn handler_for(kind: InboundKind) -> Handler {
    match kind {
        InboundKind::Configuration => on_configuration,
        InboundKind::GameState => on_game_state,
        InboundKind::AttackResult => on_attack_result,
        InboundKind::BonusResult => on_bonus_result,
        InboundKind::ScoreUpdate => on_score_update,
        InboundKind::BadAttack => on_bad_attack,
        InboundKind::InvalidPayload => on_invalid_payload,
        InboundKind::ServerError => on_server_error,
    }
}

fn on_configuration(
    store: &mut SessionStore,
    env: &Envelope,
) -> Result<StoreChange, ProtocolError> {
    let data: ConfigurationData = env.decode_data()?;
    Ok(store.apply_configuration(data))
}

fn on_game_state(store: &mut SessionStore, env: &Envelope) -> Result<StoreChange, ProtocolError> {
    let data: GameStateData = env.decode_data_or_default()?;
    Ok(store.apply_game_state(data))
}

fn on_attack_result(
    store: &mut SessionStore,
    env: &Envelope,
) -> Result<StoreChange, ProtocolError> {
    let data = attack_result_data(store, env)?;
    Ok(store.apply_attack_result(data, AttackKind::Attack))
}

fn on_bonus_result(
    store: &mut SessionStore,
    env: &Envelope,
) -> Result<StoreChange, ProtocolError> {
    let data = attack_result_data(store, env)?;
    Ok(store.apply_attack_result(data, AttackKind::Bonus))
}

/// Decodes either result shape. A bare result is credited to whoever
/// held the turn.
fn attack_result_data(
    store: &SessionStore,
    env: &Envelope,
) -> Result<AttackResultData, ProtocolError> {
    match env.decode_data()? {
        AttackResultFrame::Attributed(data) => Ok(data),
        AttackResultFrame::Bare(result) => {
            let attacker = store.presumed_attacker(&result).ok_or_else(|| {
                ProtocolError::InvalidMessage(format!(
                    "`{}` has no attacker and no turn is assigned",
                    env.kind
                ))
            })?;
            debug!(kind = %env.kind, %attacker, "crediting bare result to the turn holder");
            Ok(AttackResultData {
                attacker,
                result,
                match_info: None,
            })
        }
    }
}

fn on_score_update(
    store: &mut SessionStore,
    env: &Envelope,
) -> Result<StoreChange, ProtocolError> {
    let data: ScoreUpdateData = env.decode_data()?;
    Ok(store.apply_score_update(data.score))
}

fn on_bad_attack(store: &mut SessionStore, env: &Envelope) -> Result<StoreChange, ProtocolError> {
    let data: RejectionData = env.decode_data_or_default()?;
    Ok(store.apply_bad_attack(data.info))
}

fn on_invalid_payload(
    store: &mut SessionStore,
    env: &Envelope,
) -> Result<StoreChange, ProtocolError> {
    let data: RejectionData = env.decode_data_or_default()?;
    let message = data.info.unwrap_or_else(|| "Invalid payload".to_string());
    Ok(store.report_server_error(message))
}

fn on_server_error(
    store: &mut SessionStore,
    _env: &Envelope,
) -> Result<StoreChange, ProtocolError> {
    Ok(store.report_server_error("Server error".to_string()))
}

#[cfg(test)]
mod tests {
    use broadside_protocol::ShipKind;
    use broadside_session::Side;
    use serde_json::json;

    use super::*;

    fn envelope(kind: &str, data: serde_json::Value) -> Envelope {
        Envelope {
            kind: kind.to_string(),
            data,
        }
    }

    fn configuration() -> Envelope {
        envelope(
            "configuration",
            json!({
                "gameId": "g1",
                "player": {
                    "uuid": "p1",
                    "username": "alice",
                    "board": {"positions": {"Destroyer": {"id": 1, "origin": [0, 0], "orientation": "horizontal"}}, "valid": true},
                    "attacks": []
                },
                "opponent": {"uuid": "p2", "username": "bob", "attacks": []},
                "match": {"ready": true, "activePlayer": "p1", "winner": null},
                "board": {"rows": 10, "columns": 10}
            }),
        )
    }

    #[test]
    fn test_standard_router_handles_every_kind() {
        let router = Router::standard();
        for kind in InboundKind::ALL {
            assert!(router.handles(kind.as_str()), "missing {kind}");
        }
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let router = Router::standard();
        let mut store = SessionStore::new();
        let before = store.clone();

        let change = router.dispatch(&mut store, &envelope("unknown-future-type", json!({})));
        assert_eq!(change, None);
        assert_eq!(store, before);
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let router = Router::standard();
        let mut store = SessionStore::new();
        let before = store.clone();

        let change = router.dispatch(&mut store, &envelope("attack-result", json!({"nope": 1})));
        assert_eq!(change, None);
        assert_eq!(store, before);
    }

    #[test]
    fn test_configuration_is_routed() {
        let router = Router::standard();
        let mut store = SessionStore::new();
        let change = router.dispatch(&mut store, &configuration());
        assert!(matches!(change, Some(StoreChange::Configured { .. })));
        assert_eq!(store.player().username, "alice");
        assert!(store.player().board.is_locked());
    }

    #[test]
    fn test_attack_results_append_one_per_frame() {
        let router = Router::standard();
        let mut store = SessionStore::new();
        router.dispatch(&mut store, &configuration());

        let frames = [
            ("attack-result", "p1", [0, 0]),
            ("attack-result", "p2", [4, 4]),
            ("bonus-result", "p1", [1, 0]),
            ("attack-result", "p1", [2, 0]),
        ];
        for (i, (kind, attacker, origin)) in frames.iter().enumerate() {
            let env = envelope(
                kind,
                json!({"attacker": attacker, "result": {"origin": origin, "type": null, "destroyed": false}}),
            );
            router.dispatch(&mut store, &env);
            let total = store.player().board.attacks.len() + store.opponent().board.attacks.len();
            assert_eq!(total, i + 1);
        }
        let mine: Vec<_> = store.player().board.attacks.iter().map(|a| a.origin.x()).collect();
        assert_eq!(mine, vec![0, 1, 2]);
    }

    #[test]
    fn test_bare_result_is_credited_to_turn_holder() {
        let router = Router::standard();
        let mut store = SessionStore::new();
        router.dispatch(&mut store, &configuration());

        let change = router.dispatch(
            &mut store,
            &envelope(
                "attack-result",
                json!({"origin": [2, 2], "type": "Destroyer", "destroyed": true}),
            ),
        );
        assert!(matches!(
            change,
            Some(StoreChange::AttackResolved {
                attacker: Side::Local,
                turn_changed: true,
                ..
            })
        ));
        assert_eq!(store.player().board.attacks.len(), 1);
        assert_eq!(store.player().board.attacks[0].ship, Some(ShipKind::Destroyer));
        assert_eq!(store.active_side(), Some(Side::Opponent));

        // Now the opponent holds the turn, so the next bare result is theirs.
        router.dispatch(
            &mut store,
            &envelope("bonus-result", json!({"origin": [0, 0], "type": null, "destroyed": false})),
        );
        assert_eq!(store.opponent().board.attacks.len(), 1);
        assert_eq!(store.active_side(), Some(Side::Local));
    }

    #[test]
    fn test_bare_result_without_turn_is_dropped() {
        let router = Router::standard();
        let mut store = SessionStore::new();
        let change = router.dispatch(
            &mut store,
            &envelope("attack-result", json!({"origin": [1, 1], "type": null, "destroyed": false})),
        );
        assert_eq!(change, None);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_unrecognized_ship_is_still_recorded() {
        let router = Router::standard();
        let mut store = SessionStore::new();
        router.dispatch(&mut store, &configuration());

        let change = router.dispatch(
            &mut store,
            &envelope(
                "attack-result",
                json!({"attacker": "p1", "result": {"origin": [5, 5], "type": "Cruiser", "destroyed": true}}),
            ),
        );
        assert!(change.is_some());
        assert_eq!(store.player().board.attacks.len(), 1);
        assert_eq!(store.player().board.attacks[0].ship, Some(ShipKind::Unknown));
    }

    #[test]
    fn test_score_and_rejections() {
        let router = Router::standard();
        let mut store = SessionStore::new();

        let change = router.dispatch(&mut store, &envelope("score-update", json!({"score": 12})));
        assert_eq!(change, Some(StoreChange::ScoreUpdated(12)));

        let change = router.dispatch(&mut store, &envelope("bad-attack", serde_json::Value::Null));
        assert_eq!(change, Some(StoreChange::AttackRejected { info: None }));

        let change = router.dispatch(
            &mut store,
            &envelope("invalid-payload", json!({"info": "positions overlap"})),
        );
        assert_eq!(
            change,
            Some(StoreChange::ServerError("positions overlap".into()))
        );

        let change = router.dispatch(&mut store, &envelope("server-error", json!({})));
        assert_eq!(change, Some(StoreChange::ServerError("Server error".into())));
    }

    #[test]
    fn test_custom_handler_replaces_standard() {
        fn ignore(store: &mut SessionStore, _: &Envelope) -> Result<StoreChange, ProtocolError> {
            Ok(store.report_server_error("overridden".into()))
        }
        let mut router = Router::standard();
        assert!(router.register("server-error", ignore).is_some());

        let mut store = SessionStore::new();
        let change = router.dispatch(&mut store, &envelope("server-error", json!({})));
        assert_eq!(change, Some(StoreChange::ServerError("overridden".into())));
    }
}
