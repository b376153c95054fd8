//! Client configuration and server URL resolution.

use std::time::Duration;

use broadside_presenter::PresenterConfig;

/// Where a development server listens when nothing else is known.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3000/game";

/// Path of the game endpoint on the server.
pub const GAME_PATH: &str = "/game";

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`GameClient`](crate::GameClient).
///
/// Start from `ClientConfig::default()` and override what you need with
/// the `with_*` builders.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the game endpoint.
    pub server_url: String,

    /// Fixed delay before each reconnect attempt. Default: 5 seconds.
    pub retry_delay: Duration,

    /// Reconnect attempts before giving up. Default: 50.
    pub max_retries: u32,

    /// How long one connect attempt may take. Default: 10 seconds.
    /// A timed-out attempt counts as a close.
    pub connect_timeout: Duration,

    /// Ask the server for an AI opponent in the handshake.
    pub use_ai_opponent: bool,

    /// Capacity of the [`ClientEvent`](crate::ClientEvent) channel. Events
    /// are dropped (with a warning) while it is full.
    pub event_capacity: usize,

    /// Capacity of the command channel behind
    /// [`ClientHandle`](crate::ClientHandle).
    pub command_capacity: usize,

    /// Turn presentation timing.
    pub presenter: PresenterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            retry_delay: Duration::from_secs(5),
            max_retries: 50,
            connect_timeout: Duration::from_secs(10),
            use_ai_opponent: false,
            event_capacity: 64,
            command_capacity: 32,
            presenter: PresenterConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Sets the server URL.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Sets the reconnect delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the reconnect ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the per-attempt connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Requests an AI opponent.
    pub fn with_ai_opponent(mut self, enabled: bool) -> Self {
        self.use_ai_opponent = enabled;
        self
    }

    /// Sets the presenter timing.
    pub fn with_presenter(mut self, presenter: PresenterConfig) -> Self {
        self.presenter = presenter;
        self
    }

    /// Sets the event channel capacity (minimum 1).
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

// ---------------------------------------------------------------------------
// URL resolution
// ---------------------------------------------------------------------------

/// Works out which WebSocket URL to connect to.
///
/// - A non-empty `override_url` always wins.
/// - An `http://` or `https://` origin maps to `ws://` or `wss://` on the
///   same host and port, at [`GAME_PATH`].
/// - Anything else falls back to [`DEFAULT_SERVER_URL`].
///
/// # Example
///
/// ```rust
/// use broadside::resolve_server_url;
///
/// assert_eq!(
///     resolve_server_url(Some("https://play.example.com/lobby"), None),
///     "wss://play.example.com/game"
/// );
/// assert_eq!(
///     resolve_server_url(None, Some("ws://10.0.0.2:9000/game")),
///     "ws://10.0.0.2:9000/game"
/// );
/// ```
pub fn resolve_server_url(origin: Option<&str>, override_url: Option<&str>) -> String {
    if let Some(url) = override_url.map(str::trim).filter(|u| !u.is_empty()) {
        return url.to_string();
    }

    let Some(origin) = origin.map(str::trim) else {
        return DEFAULT_SERVER_URL.to_string();
    };

    let (scheme, rest) = if let Some(rest) = origin.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = origin.strip_prefix("http://") {
        ("ws", rest)
    } else {
        tracing::warn!(origin, "unsupported origin, using the default server");
        return DEFAULT_SERVER_URL.to_string();
    };

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return DEFAULT_SERVER_URL.to_string();
    }
    format!("{scheme}://{host}{GAME_PATH}")
}
