//! `GameClient` driver task and its handle.
//!
//! The driver is an actor: one Tokio task owns the session, the
//! reconnection policy and the single live connection. The outside world
//! talks to it through a [`ClientHandle`] (commands in) and two channels
//! (snapshots and events out). No state is shared.
//!
//! ```text
//!  ClientHandle ──cmd──→ ┌──────────── driver task ────────────┐
//!                        │ select! {                           │
//!   server ──frames────→ │   transport event  → router/store   │ ──watch──→ ClientSnapshot
//!                        │   presenter timer  → presenter      │ ──mpsc───→ ClientEvent
//!                        │   retry timer      → start connect  │
//!                        │   connect attempt  → handshake      │
//!                        │   command          → encoder/send   │
//!                        │ }                                   │
//!                        └─────────────────────────────────────┘
//! ```
//!
//! A connect attempt (dial, then handshake) is a branch of its own, so
//! timers and commands keep being served while it is in flight.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use broadside_presenter::{Notice, PresentationState, timers};
use broadside_protocol::{Coord, Positions};
use broadside_session::{IdentityStore, SessionStore, StoreChange};
use broadside_transport::{
    Connection, ConnectionId, Connector, TransportError, TransportEvent,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::encoder::Intent;
use crate::reconnect::{CloseDecision, ConnectionState, ReconnectPolicy};
use crate::session::Session;
use crate::{BroadsideError, ClientConfig};

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Read-only view of the client, published after every change.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Connection lifecycle.
    pub connection: ConnectionState,
    /// Consecutive failed reconnect attempts.
    pub retry_count: u32,
    /// Canonical session state.
    pub session: SessionStore,
    /// Derived presentation state.
    pub presentation: PresentationState,
}

/// Things that happened, delivered once each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A connection opened and the handshake was sent.
    Connected(ConnectionId),
    /// The connection went away.
    Disconnected {
        /// Whether the close handshake completed.
        was_clean: bool,
    },
    /// A reconnect attempt is scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// When the attempt starts.
        at: Instant,
    },
    /// Retries are exhausted. Restart required.
    ConnectionLost,
    /// The server refused our last attack; input is enabled again.
    AttackRejected {
        /// The server's reason, if any.
        info: Option<String>,
    },
    /// The server reported an error.
    ServerError(String),
    /// A presenter notice (ship sunk, turn announced, game over).
    Notice(Notice),
}

/// Returned by [`GameClient::start`].
#[derive(Debug)]
pub struct ClientParts {
    /// Sends intents to the driver.
    pub handle: ClientHandle,
    /// Latest snapshot; `changed().await` to follow along.
    pub snapshots: watch::Receiver<ClientSnapshot>,
    /// One-shot events.
    pub events: mpsc::Receiver<ClientEvent>,
    /// The driver task. Finishes after [`ClientHandle::shutdown`].
    pub task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Commands sent to the driver through its channel.
///
/// The `oneshot::Sender` is a reply channel: the caller sends a command
/// and waits for the driver's verdict on it.
enum ClientCommand {
    Intent {
        intent: Intent,
        reply: oneshot::Sender<Result<(), BroadsideError>>,
    },
    Shutdown,
}

/// Handle to a running [`GameClient`].
///
/// Cheap to clone; it's just an `mpsc::Sender` wrapper.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    sender: mpsc::Sender<ClientCommand>,
}

impl ClientHandle {
    /// Sends `ship-positions`. The board becomes valid only when the
    /// server acknowledges it.
    pub async fn lock_board(&self, positions: Positions) -> Result<(), BroadsideError> {
        self.request(Intent::LockBoard(positions)).await
    }

    /// Sends `attack`. The result arrives later as an `attack-result`.
    pub async fn attack(&self, target: Coord) -> Result<(), BroadsideError> {
        self.request(Intent::Attack(target)).await
    }

    /// Sends `bonus` with an opaque payload.
    pub async fn use_bonus(&self, payload: Value) -> Result<(), BroadsideError> {
        self.request(Intent::UseBonus(payload)).await
    }

    /// Sends `new-match`.
    pub async fn request_new_match(&self) -> Result<(), BroadsideError> {
        self.request(Intent::RequestNewMatch).await
    }

    /// Stops the driver and closes the connection.
    pub async fn shutdown(&self) -> Result<(), BroadsideError> {
        self.sender
            .send(ClientCommand::Shutdown)
            .await
            .map_err(|_| BroadsideError::ClientClosed)
    }

    async fn request(&self, intent: Intent) -> Result<(), BroadsideError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(ClientCommand::Intent {
                intent,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BroadsideError::ClientClosed)?;
        reply_rx.await.map_err(|_| BroadsideError::ClientClosed)?
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// The session-synchronizing client.
///
/// # Example
///
/// ```rust,no_run
/// use broadside::prelude::*;
///
/// # async fn run() -> Result<(), BroadsideError> {
/// let config = ClientConfig::default().with_server_url("ws://localhost:3000/game");
/// let mut parts = GameClient::start(config, WebSocketConnector::new(), MemoryIdentityStore::new());
///
/// while parts.snapshots.changed().await.is_ok() {
///     let snapshot = parts.snapshots.borrow().clone();
///     println!("{}", snapshot.presentation.banner.text());
/// }
/// # Ok(())
/// # }
/// ```
pub struct GameClient<K: Connector, S: IdentityStore> {
    config: ClientConfig,
    connector: Arc<K>,
    identity: S,
    session: Session,
    policy: ReconnectPolicy,
    conn: Option<K::Connection>,
    /// The in-flight connect attempt, if any.
    connecting: Option<ConnectAttempt<K::Connection>>,
    commands: mpsc::Receiver<ClientCommand>,
    snapshots: watch::Sender<ClientSnapshot>,
    events: mpsc::Sender<ClientEvent>,
}

impl<K, S> GameClient<K, S>
where
    K: Connector<Error = TransportError>,
    K::Connection: Connection<Error = TransportError>,
    S: IdentityStore,
{
    /// Spawns the driver task and connects.
    ///
    /// A persisted identity is loaded from `identity` first so the very
    /// first handshake can resume a match. Failing to load it is logged
    /// and treated as a fresh start.
    pub fn start(config: ClientConfig, connector: K, identity: S) -> ClientParts {
        let resume = match identity.load() {
            Ok(resume) => resume,
            Err(e) => {
                tracing::warn!(error = %e, "could not load identity, starting fresh");
                None
            }
        };

        let session = Session::new(config.presenter, resume, config.use_ai_opponent);
        let policy = ReconnectPolicy::new(config.retry_delay, config.max_retries);
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(ClientSnapshot {
            connection: policy.state(),
            retry_count: 0,
            session: session.store().clone(),
            presentation: session.view().clone(),
        });

        let client = Self {
            config,
            connector: Arc::new(connector),
            identity,
            session,
            policy,
            conn: None,
            connecting: None,
            commands: cmd_rx,
            snapshots: snapshot_tx,
            events: event_tx,
        };
        let task = tokio::spawn(client.run());

        ClientParts {
            handle: ClientHandle { sender: cmd_tx },
            snapshots: snapshot_rx,
            events: event_rx,
            task,
        }
    }

    /// Runs the select loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(url = %self.config.server_url, "game client started");
        self.begin_connect();

        loop {
            let presenter_deadline = self.session.next_deadline();
            let retry_deadline = self.policy.pending_deadline();

            tokio::select! {
                event = next_event(self.conn.as_ref()) => {
                    self.on_transport_event(event);
                }
                result = in_flight(self.connecting.as_mut()) => {
                    self.on_connect_result(result);
                }
                _ = timers::sleep_until(presenter_deadline) => {
                    let notices = self.session.advance(Instant::now());
                    self.emit_notices(notices);
                    self.publish();
                }
                _ = timers::sleep_until(retry_deadline) => {
                    if self.policy.poll_due(Instant::now()) {
                        self.begin_connect();
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(ClientCommand::Intent { intent, reply }) => {
                        let result = self.on_intent(intent).await;
                        let _ = reply.send(result);
                    }
                    Some(ClientCommand::Shutdown) | None => break,
                },
            }
        }

        self.policy.close();
        self.connecting = None;
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                tracing::debug!(error = %e, "close failed");
            }
        }
        self.publish();
        tracing::info!("game client stopped");
    }

    /// Starts a connect attempt: dial, then send the handshake.
    ///
    /// The attempt runs as its own `select!` branch and finishes in
    /// [`on_connect_result`](Self::on_connect_result).
    fn begin_connect(&mut self) {
        if !self.policy.begin_connect() {
            return;
        }
        let handshake = match self.session.handshake() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "could not encode handshake");
                self.on_closed();
                return;
            }
        };

        let connector = Arc::clone(&self.connector);
        let url = self.config.server_url.clone();
        let timeout = self.config.connect_timeout;
        // A new open supersedes whatever was there before.
        let previous = self.conn.take();
        tracing::debug!(%url, attempt = self.policy.retry_count(), "connecting");

        self.connecting = Some(Box::pin(async move {
            if let Some(previous) = previous {
                let _ = previous.close().await;
            }
            let dialed = tokio::time::timeout(timeout, connector.connect(&url)).await;
            let conn = match dialed {
                Ok(result) => result?,
                Err(_) => {
                    return Err(TransportError::ConnectFailed {
                        url,
                        source: std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "connect timed out",
                        ),
                    });
                }
            };
            if let Err(e) = conn.send(&handshake).await {
                let _ = conn.close().await;
                return Err(e);
            }
            Ok(conn)
        }));
        self.publish();
    }

    fn on_connect_result(&mut self, result: Result<K::Connection, TransportError>) {
        self.connecting = None;
        match result {
            Ok(conn) => {
                let conn_id = conn.id();
                tracing::info!(%conn_id, "connected");
                self.policy.on_opened();
                self.conn = Some(conn);
                self.emit(ClientEvent::Connected(conn_id));
                self.publish();
            }
            Err(e) => {
                tracing::warn!(url = %self.config.server_url, error = %e, "connect failed");
                self.on_closed();
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(frame) => self.on_frame(&frame),
            TransportEvent::Closed { was_clean } => {
                tracing::info!(was_clean, "connection closed");
                self.conn = None;
                self.emit(ClientEvent::Disconnected { was_clean });
                self.on_closed();
            }
            TransportEvent::Error(error) => {
                tracing::warn!(%error, "connection failed");
                self.conn = None;
                self.emit(ClientEvent::Disconnected { was_clean: false });
                self.on_closed();
            }
            TransportEvent::Opened(_) => {}
        }
    }

    fn on_frame(&mut self, frame: &[u8]) {
        let Some(outcome) = self.session.handle_frame(frame, Instant::now()) else {
            return;
        };
        match outcome.change {
            StoreChange::Configured {
                identity_changed: true,
                ..
            } => self.persist_identity(),
            StoreChange::AttackRejected { info } => {
                self.emit(ClientEvent::AttackRejected { info });
            }
            StoreChange::ServerError(message) => {
                self.emit(ClientEvent::ServerError(message));
            }
            _ => {}
        }
        self.emit_notices(outcome.notices);
        self.publish();
    }

    async fn on_intent(&mut self, intent: Intent) -> Result<(), BroadsideError> {
        let Some(conn) = self.conn.as_ref() else {
            if self.policy.state() == ConnectionState::GaveUp {
                return Err(BroadsideError::ConnectionLost {
                    retries: self.policy.retry_count(),
                });
            }
            return Err(BroadsideError::NotConnected);
        };
        let frame = match self.session.prepare(&intent) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "intent rejected locally");
                return Err(e);
            }
        };
        let sent = conn.send(&frame).await;
        if let Err(e) = sent {
            // Nothing was recorded, so there is nothing to roll back.
            tracing::warn!(error = %e, "send failed, dropping connection");
            self.conn = None;
            self.emit(ClientEvent::Disconnected { was_clean: false });
            self.on_closed();
            return Err(e.into());
        }
        // Only what actually went out is in flight.
        let committed = self.session.commit(intent, Instant::now());
        self.publish();
        committed
    }

    /// Lets the policy decide what a lost connection means.
    fn on_closed(&mut self) {
        match self.policy.on_closed(Instant::now()) {
            CloseDecision::Retry { attempt, at } => {
                self.emit(ClientEvent::Reconnecting { attempt, at });
            }
            CloseDecision::GiveUp => self.emit(ClientEvent::ConnectionLost),
            CloseDecision::Ignore => {}
        }
        self.publish();
    }

    fn persist_identity(&self) {
        let Some(identity) = self.session.store().identity() else {
            return;
        };
        if let Err(e) = self.identity.save(identity) {
            tracing::warn!(error = %e, "could not persist identity");
        }
    }

    fn emit_notices(&self, notices: Vec<Notice>) {
        for notice in notices {
            self.emit(ClientEvent::Notice(notice));
        }
    }

    /// Delivers an event without ever blocking the driver.
    fn emit(&self, event: ClientEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(?event, "event channel full, dropping event");
            }
            // Nobody is listening; that's fine.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn publish(&self) {
        let snapshot = ClientSnapshot {
            connection: self.policy.state(),
            retry_count: self.policy.retry_count(),
            session: self.session.store().clone(),
            presentation: self.session.view().clone(),
        };
        // `send_replace` keeps the value even when every receiver is gone.
        self.snapshots.send_replace(snapshot);
    }
}

/// A connect attempt that yields a connection with the handshake sent.
type ConnectAttempt<C> = Pin<Box<dyn Future<Output = Result<C, TransportError>> + Send>>;

/// Waits for the in-flight attempt, or never when there is none.
async fn in_flight<C>(attempt: Option<&mut ConnectAttempt<C>>) -> Result<C, TransportError> {
    match attempt {
        Some(attempt) => attempt.await,
        None => std::future::pending().await,
    }
}

/// The next event on `conn`, or never when there is no connection.
async fn next_event<C: Connection>(conn: Option<&C>) -> TransportEvent {
    match conn {
        Some(conn) => conn.next_event().await,
        None => std::future::pending().await,
    }
}
