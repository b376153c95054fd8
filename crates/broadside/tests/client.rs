//! Integration tests for [`GameClient`] over the in-process transport.
//!
//! The server side is scripted through [`MemoryPeer`]. Every test runs on
//! a paused clock, so retry delays and modal timers elapse instantly and
//! deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use broadside::prelude::*;
use broadside_presenter::{ENEMY_TURN, YOUR_TURN};
use broadside_session::SessionError;
use broadside_transport::{
    ConnectionId, MemoryConnection, MemoryListener, MemoryPeer, TransportError,
};
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

const RETRY_DELAY: Duration = Duration::from_secs(1);

// =========================================================================
// Helpers
// =========================================================================

fn config(max_retries: u32) -> ClientConfig {
    ClientConfig::default()
        .with_server_url("mem://game")
        .with_retry_delay(RETRY_DELAY)
        .with_max_retries(max_retries)
}

fn start(max_retries: u32) -> (ClientParts, MemoryListener) {
    let (connector, listener) = MemoryConnector::pair();
    let parts = GameClient::start(config(max_retries), connector, MemoryIdentityStore::new());
    (parts, listener)
}

async fn accept(listener: &mut MemoryListener) -> MemoryPeer {
    tokio::time::timeout(Duration::from_secs(60), listener.accept())
        .await
        .expect("client should connect")
        .expect("connector should be alive")
}

async fn recv_json(peer: &MemoryPeer) -> Value {
    let text = peer
        .recv_text()
        .await
        .expect("link should be up")
        .expect("client should send a frame");
    serde_json::from_str(&text).expect("client frames are JSON")
}

fn send_json(peer: &MemoryPeer, value: Value) {
    peer.send_text(&value.to_string()).expect("client should be listening");
}

async fn expect_event(
    events: &mut mpsc::Receiver<ClientEvent>,
    mut matches: impl FnMut(&ClientEvent) -> bool,
) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let event = events.recv().await.expect("client task ended");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event should arrive")
}

async fn wait_snapshot(
    snapshots: &mut watch::Receiver<ClientSnapshot>,
    matches: impl FnMut(&ClientSnapshot) -> bool,
) -> ClientSnapshot {
    let snapshot = tokio::time::timeout(Duration::from_secs(120), snapshots.wait_for(matches))
        .await
        .expect("snapshot should arrive")
        .expect("client task ended");
    ClientSnapshot::clone(&snapshot)
}

fn configuration(ready: bool) -> Value {
    json!({
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
    })
}

/// Failure switches shared between a test and its [`ScriptedConnector`].
#[derive(Clone, Default)]
struct Switches {
    /// New connect attempts never complete.
    hang_connects: Arc<AtomicBool>,
    /// Every send fails as if the socket broke.
    fail_sends: Arc<AtomicBool>,
}

/// A memory connector whose connects and sends can be made to misbehave.
struct ScriptedConnector {
    inner: MemoryConnector,
    switches: Switches,
}

struct ScriptedConnection {
    inner: MemoryConnection,
    fail_sends: Arc<AtomicBool>,
}

impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;
    type Error = TransportError;

    async fn connect(&self, url: &str) -> Result<Self::Connection, Self::Error> {
        if self.switches.hang_connects.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let inner = self.inner.connect(url).await?;
        Ok(ScriptedConnection {
            inner,
            fail_sends: Arc::clone(&self.switches.fail_sends),
        })
    }
}

impl Connection for ScriptedConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "socket broke",
            )));
        }
        self.inner.send(data).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        self.inner.recv().await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.inner.close().await
    }

    fn id(&self) -> ConnectionId {
        self.inner.id()
    }
}

fn start_scripted(config: ClientConfig) -> (ClientParts, MemoryListener, Switches) {
    let (inner, listener) = MemoryConnector::pair();
    let switches = Switches::default();
    let connector = ScriptedConnector {
        inner,
        switches: switches.clone(),
    };
    let parts = GameClient::start(config, connector, MemoryIdentityStore::new());
    (parts, listener, switches)
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_handshake_is_sent_on_connect() {
    let (mut parts, mut listener) = start(5);
    let peer = accept(&mut listener).await;

    assert_eq!(
        recv_json(&peer).await,
        json!({"type": "connection", "data": {}})
    );
    let event = expect_event(&mut parts.events, |e| matches!(e, ClientEvent::Connected(_))).await;
    assert_eq!(event, ClientEvent::Connected(peer.id()));

    let snapshot = wait_snapshot(&mut parts.snapshots, |s| s.connection.is_open()).await;
    assert_eq!(snapshot.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_delay_resumes_identity() {
    let (mut parts, mut listener) = start(5);
    let peer = accept(&mut listener).await;
    recv_json(&peer).await;

    send_json(&peer, configuration(false));
    wait_snapshot(&mut parts.snapshots, |s| s.session.identity().is_some()).await;

    let closed_at = Instant::now();
    peer.close();

    expect_event(&mut parts.events, |e| {
        matches!(e, ClientEvent::Disconnected { was_clean: true })
    })
    .await;
    let ClientEvent::Reconnecting { attempt, at } = expect_event(&mut parts.events, |e| {
        matches!(e, ClientEvent::Reconnecting { .. })
    })
    .await
    else {
        unreachable!()
    };
    assert_eq!(attempt, 1);
    assert!(at >= closed_at + RETRY_DELAY);
    assert_eq!(parts.snapshots.borrow().retry_count, 1);

    // Nothing connects before the delay has elapsed.
    let second = accept(&mut listener).await;
    assert!(Instant::now() >= at);
    assert_eq!(
        recv_json(&second).await,
        json!({
            "type": "connection",
            "data": {"gameId": "g1", "playerId": "p1", "username": "alice"}
        })
    );

    let snapshot = wait_snapshot(&mut parts.snapshots, |s| s.connection.is_open()).await;
    assert_eq!(snapshot.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_retries() {
    let (mut parts, mut listener) = start(2);
    let peer = accept(&mut listener).await;
    recv_json(&peer).await;

    listener.set_refusing(true);
    peer.close();

    for expected in 1..=2 {
        let event = expect_event(&mut parts.events, |e| {
            matches!(e, ClientEvent::Reconnecting { .. } | ClientEvent::ConnectionLost)
        })
        .await;
        assert!(
            matches!(event, ClientEvent::Reconnecting { attempt, .. } if attempt == expected),
            "unexpected {event:?}"
        );
    }
    expect_event(&mut parts.events, |e| *e == ClientEvent::ConnectionLost).await;

    let snapshot = wait_snapshot(&mut parts.snapshots, |s| s.connection.is_terminal()).await;
    assert_eq!(snapshot.connection, ConnectionState::GaveUp);
    assert_eq!(snapshot.retry_count, 2);

    let err = parts.handle.attack(Coord(0, 0)).await.unwrap_err();
    assert!(matches!(err, BroadsideError::ConnectionLost { retries: 2 }));

    // Terminal: even a healthy server sees no further attempts.
    listener.set_refusing(false);
    let late = tokio::time::timeout(RETRY_DELAY * 30, listener.accept()).await;
    assert!(late.is_err(), "no connect after giving up");
}

#[tokio::test(start_paused = true)]
async fn test_intent_while_retry_pending_is_not_connected() {
    let (connector, listener) = MemoryConnector::pair();
    listener.set_refusing(true);
    let config = config(5).with_retry_delay(Duration::from_secs(60));
    let mut parts = GameClient::start(config, connector, MemoryIdentityStore::new());

    wait_snapshot(&mut parts.snapshots, |s| {
        matches!(s.connection, ConnectionState::RetryScheduled { .. })
    })
    .await;
    let err = parts.handle.request_new_match().await.unwrap_err();
    assert!(matches!(err, BroadsideError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_connection() {
    let (mut parts, mut listener) = start(5);
    let peer = accept(&mut listener).await;
    recv_json(&peer).await;

    parts.handle.shutdown().await.unwrap();
    assert_eq!(peer.recv_text().await.unwrap(), None);
    parts.task.await.unwrap();

    assert_eq!(parts.snapshots.borrow().connection, ConnectionState::Closed);
    assert!(matches!(
        parts.handle.attack(Coord(0, 0)).await,
        Err(BroadsideError::ClientClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_connect_keeps_driver_responsive() {
    let config = config(5)
        .with_retry_delay(Duration::from_millis(100))
        .with_connect_timeout(Duration::from_secs(3600));
    let (mut parts, mut listener, switches) = start_scripted(config);
    let peer = accept(&mut listener).await;
    recv_json(&peer).await;

    send_json(&peer, configuration(true));
    wait_snapshot(&mut parts.snapshots, |s| s.presentation.turn_modal.visible).await;

    switches.hang_connects.store(true, Ordering::SeqCst);
    let dropped_at = Instant::now();
    peer.close();

    // The modal still hides on schedule while the redial is stuck.
    wait_snapshot(&mut parts.snapshots, |s| {
        s.connection == ConnectionState::Connecting && !s.presentation.turn_modal.visible
    })
    .await;
    assert!(Instant::now() - dropped_at < Duration::from_secs(2));

    // Commands are answered instead of queueing behind the dial.
    let err = parts.handle.attack(Coord(0, 0)).await.unwrap_err();
    assert!(matches!(err, BroadsideError::NotConnected));

    parts.handle.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), parts.task)
        .await
        .expect("driver should stop mid-connect")
        .unwrap();
    assert_eq!(parts.snapshots.borrow().connection, ConnectionState::Closed);
}

// =========================================================================
// Game flow
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_attack_round_trip_and_turn_handover() {
    let (mut parts, mut listener) = start(5);
    let peer = accept(&mut listener).await;
    recv_json(&peer).await;

    send_json(&peer, configuration(true));
    let snapshot = wait_snapshot(&mut parts.snapshots, |s| s.presentation.attacks_enabled).await;
    assert_eq!(snapshot.presentation.active_board, ActiveBoard::Attack);
    assert_eq!(snapshot.presentation.turn_modal.text, YOUR_TURN);

    parts.handle.attack(Coord(2, 3)).await.unwrap();
    assert_eq!(recv_json(&peer).await, json!({"type": "attack", "data": [2, 3]}));

    // One shot in flight at a time, and nothing goes on the wire.
    let err = parts.handle.attack(Coord(5, 5)).await.unwrap_err();
    assert!(matches!(
        err,
        BroadsideError::Session(SessionError::AttackPending)
    ));

    // An unknown type in the middle of the stream changes nothing.
    send_json(&peer, json!({"type": "chat", "data": {"text": "hi"}}));
    send_json(
        &peer,
        json!({
            "type": "attack-result",
            "data": {
                "attacker": "p1",
                "result": {"origin": [2, 3], "type": null, "destroyed": false},
                "match": {"ready": true, "activePlayer": "p2", "winner": null}
            }
        }),
    );

    let snapshot = wait_snapshot(&mut parts.snapshots, |s| {
        !s.session.player().board.attacks.is_empty()
    })
    .await;
    assert_eq!(snapshot.session.player().board.attacks.len(), 1);
    assert_eq!(snapshot.session.pending_attack(), None);
    assert_eq!(snapshot.session.active_side(), Some(Side::Opponent));
    assert!(!snapshot.presentation.attacks_enabled);

    expect_event(&mut parts.events, |e| {
        *e == ClientEvent::Notice(Notice::TurnAnnounced { yours: false })
    })
    .await;
    let snapshot = wait_snapshot(&mut parts.snapshots, |s| {
        s.presentation.turn_modal.text == ENEMY_TURN
    })
    .await;
    assert_eq!(snapshot.presentation.active_board, ActiveBoard::Ship);
}

#[tokio::test(start_paused = true)]
async fn test_bad_attack_reenables_input() {
    let (mut parts, mut listener) = start(5);
    let peer = accept(&mut listener).await;
    recv_json(&peer).await;

    send_json(&peer, configuration(true));
    wait_snapshot(&mut parts.snapshots, |s| s.presentation.attacks_enabled).await;
    parts.handle.attack(Coord(1, 1)).await.unwrap();
    recv_json(&peer).await;

    send_json(&peer, json!({"type": "bad-attack", "data": {"info": "already attacked"}}));
    let event = expect_event(&mut parts.events, |e| {
        matches!(e, ClientEvent::AttackRejected { .. })
    })
    .await;
    assert_eq!(
        event,
        ClientEvent::AttackRejected {
            info: Some("already attacked".into())
        }
    );

    wait_snapshot(&mut parts.snapshots, |s| s.session.pending_attack().is_none()).await;
    parts.handle.attack(Coord(1, 2)).await.unwrap();
    assert_eq!(recv_json(&peer).await, json!({"type": "attack", "data": [1, 2]}));
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_surface_as_events() {
    let (mut parts, mut listener) = start(5);
    let peer = accept(&mut listener).await;
    recv_json(&peer).await;

    send_json(&peer, json!({"type": "invalid-payload", "data": {"info": "ships overlap"}}));
    send_json(&peer, json!({"type": "server-error", "data": {}}));

    let first = expect_event(&mut parts.events, |e| matches!(e, ClientEvent::ServerError(_))).await;
    assert_eq!(first, ClientEvent::ServerError("ships overlap".into()));
    let second = expect_event(&mut parts.events, |e| matches!(e, ClientEvent::ServerError(_))).await;
    assert_eq!(second, ClientEvent::ServerError("Server error".into()));
}

#[tokio::test(start_paused = true)]
async fn test_lock_board_sends_positions() {
    let (mut parts, mut listener) = start(5);
    let peer = accept(&mut listener).await;
    recv_json(&peer).await;

    let mut data = configuration(false);
    data["data"]["player"]["board"] = json!({"positions": null, "valid": false});
    send_json(&peer, data);
    let snapshot = wait_snapshot(&mut parts.snapshots, |s| s.session.identity().is_some()).await;
    assert!(snapshot.presentation.position_modal.visible);

    let mut positions = Positions::new();
    positions.insert(
        ShipKind::Carrier,
        ShipPlacement {
            id: 0,
            origin: Coord(1, 1),
            orientation: Some(Orientation::Vertical),
        },
    );
    parts.handle.lock_board(positions).await.unwrap();
    assert_eq!(
        recv_json(&peer).await,
        json!({
            "type": "ship-positions",
            "data": {"Carrier": {"id": 0, "origin": [1, 1], "orientation": "vertical"}}
        })
    );

    // The board is valid only once the server says so.
    let snapshot = parts.snapshots.borrow().clone();
    assert!(!snapshot.session.player().board.valid);
    assert!(snapshot.session.pending_positions().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_send_leaves_no_attack_pending() {
    let (mut parts, mut listener, switches) = start_scripted(config(5));
    let peer = accept(&mut listener).await;
    recv_json(&peer).await;

    send_json(&peer, configuration(true));
    wait_snapshot(&mut parts.snapshots, |s| s.presentation.attacks_enabled).await;

    switches.fail_sends.store(true, Ordering::SeqCst);
    let err = parts.handle.attack(Coord(2, 3)).await.unwrap_err();
    assert!(matches!(
        err,
        BroadsideError::Transport(TransportError::SendFailed(_))
    ));

    let snapshot = parts.snapshots.borrow().clone();
    assert_eq!(snapshot.session.pending_attack(), None);
    assert!(!snapshot.connection.is_open());
    expect_event(&mut parts.events, |e| {
        matches!(e, ClientEvent::Disconnected { was_clean: false })
    })
    .await;

    // Once back, the same shot is not refused as already in flight.
    switches.fail_sends.store(false, Ordering::SeqCst);
    let second = accept(&mut listener).await;
    recv_json(&second).await;
    wait_snapshot(&mut parts.snapshots, |s| {
        s.connection.is_open() && s.presentation.attacks_enabled
    })
    .await;

    parts.handle.attack(Coord(2, 3)).await.unwrap();
    assert_eq!(recv_json(&second).await, json!({"type": "attack", "data": [2, 3]}));
    assert_eq!(
        parts.snapshots.borrow().session.pending_attack(),
        Some(Coord(2, 3))
    );
}
