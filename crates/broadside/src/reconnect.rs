//! Reconnection policy: fixed delay, bounded retries.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Lifecycle of the client's connection as the policy sees it.
///
/// ```text
///   Idle ──→ Connecting ──→ Open
///                ↑            │ (unexpected close)
///                │            ▼
///                └──── RetryScheduled ──(retries exhausted)──→ GaveUp
/// ```
///
/// - **GaveUp** is terminal: nothing reconnects until the process restarts.
/// - **Closed** means the client was shut down on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing attempted yet.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// The socket is up.
    Open,
    /// Waiting to try again.
    RetryScheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// When the attempt starts.
        at: Instant,
    },
    /// Retries exhausted.
    GaveUp,
    /// Shut down by the owner.
    Closed,
}

impl ConnectionState {
    /// Whether frames can be sent right now.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether no further automatic attempt will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GaveUp | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::RetryScheduled { attempt, .. } => write!(f, "RetryScheduled({attempt})"),
            Self::GaveUp => write!(f, "GaveUp"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// What the policy decided after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Try again at `at`.
    Retry {
        /// 1-based attempt number.
        attempt: u32,
        /// When to connect.
        at: Instant,
    },
    /// The ceiling was reached; stay down.
    GiveUp,
    /// The close doesn't matter (already terminal).
    Ignore,
}

/// Decides when to reconnect. Pure: the caller passes the time in and
/// owns the actual sleeping and connecting.
///
/// Invariant: at most one pending retry deadline exists, and only in
/// [`ConnectionState::RetryScheduled`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    retry_delay: Duration,
    max_retries: u32,
    retry_count: u32,
    state: ConnectionState,
}

impl ReconnectPolicy {
    /// A policy in the [`ConnectionState::Idle`] state.
    pub fn new(retry_delay: Duration, max_retries: u32) -> Self {
        Self {
            retry_delay,
            max_retries,
            retry_count: 0,
            state: ConnectionState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The configured ceiling.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// The pending retry deadline, if one is scheduled.
    pub fn pending_deadline(&self) -> Option<Instant> {
        match self.state {
            ConnectionState::RetryScheduled { at, .. } => Some(at),
            _ => None,
        }
    }

    /// Marks a connect attempt as started.
    ///
    /// Returns `false` (and changes nothing) when the policy is terminal.
    /// Starting an attempt early cancels a scheduled retry.
    pub fn begin_connect(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// The socket opened: reset the count and cancel any scheduled retry.
    pub fn on_opened(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.retry_count > 0 {
            tracing::info!(after = self.retry_count, "reconnected");
        }
        self.retry_count = 0;
        self.state = ConnectionState::Open;
    }

    /// The socket closed unexpectedly, or a connect attempt failed.
    pub fn on_closed(&mut self, now: Instant) -> CloseDecision {
        if self.state.is_terminal() {
            return CloseDecision::Ignore;
        }
        if self.retry_count >= self.max_retries {
            tracing::error!(retries = self.retry_count, "giving up on reconnecting");
            self.state = ConnectionState::GaveUp;
            return CloseDecision::GiveUp;
        }
        self.retry_count += 1;
        let at = now + self.retry_delay;
        self.state = ConnectionState::RetryScheduled {
            attempt: self.retry_count,
            at,
        };
        tracing::info!(
            attempt = self.retry_count,
            max = self.max_retries,
            delay_ms = self.retry_delay.as_millis() as u64,
            "reconnect scheduled"
        );
        CloseDecision::Retry {
            attempt: self.retry_count,
            at,
        }
    }

    /// If the scheduled retry is due at `now`, moves to `Connecting` and
    /// returns `true`.
    pub fn poll_due(&mut self, now: Instant) -> bool {
        match self.state {
            ConnectionState::RetryScheduled { at, .. } if at <= now => {
                self.state = ConnectionState::Connecting;
                true
            }
            _ => false,
        }
    }

    /// Shuts the policy down. Cancels any scheduled retry.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(5);

    fn open_policy(max: u32) -> ReconnectPolicy {
        let mut policy = ReconnectPolicy::new(DELAY, max);
        assert!(policy.begin_connect());
        policy.on_opened();
        policy
    }

    #[test]
    fn test_new_policy_is_idle() {
        let policy = ReconnectPolicy::new(DELAY, 50);
        assert_eq!(policy.state(), ConnectionState::Idle);
        assert_eq!(policy.retry_count(), 0);
        assert_eq!(policy.pending_deadline(), None);
    }

    #[test]
    fn test_unexpected_close_schedules_retry() {
        let now = Instant::now();
        let mut policy = open_policy(50);

        let decision = policy.on_closed(now);
        assert_eq!(
            decision,
            CloseDecision::Retry {
                attempt: 1,
                at: now + DELAY
            }
        );
        assert_eq!(policy.retry_count(), 1);
        assert_eq!(policy.pending_deadline(), Some(now + DELAY));
    }

    #[test]
    fn test_retry_fires_only_when_due() {
        let now = Instant::now();
        let mut policy = open_policy(50);
        policy.on_closed(now);

        assert!(!policy.poll_due(now + DELAY - Duration::from_millis(1)));
        assert!(policy.poll_due(now + DELAY));
        assert_eq!(policy.state(), ConnectionState::Connecting);
        assert_eq!(policy.pending_deadline(), None);
    }

    #[test]
    fn test_open_resets_count_and_cancels_retry() {
        let now = Instant::now();
        let mut policy = open_policy(50);
        policy.on_closed(now);
        policy.on_closed(now);
        assert_eq!(policy.retry_count(), 2);

        assert!(policy.begin_connect());
        policy.on_opened();
        assert_eq!(policy.retry_count(), 0);
        assert_eq!(policy.pending_deadline(), None);
        assert!(policy.state().is_open());
    }

    #[test]
    fn test_gives_up_at_max_without_timer() {
        let now = Instant::now();
        let mut policy = open_policy(2);

        assert!(matches!(policy.on_closed(now), CloseDecision::Retry { attempt: 1, .. }));
        assert!(policy.poll_due(now + DELAY));
        assert!(matches!(policy.on_closed(now), CloseDecision::Retry { attempt: 2, .. }));
        assert!(policy.poll_due(now + DELAY));

        assert_eq!(policy.on_closed(now), CloseDecision::GiveUp);
        assert_eq!(policy.state(), ConnectionState::GaveUp);
        assert_eq!(policy.pending_deadline(), None);

        // Terminal: nothing restarts it.
        assert_eq!(policy.on_closed(now), CloseDecision::Ignore);
        assert!(!policy.begin_connect());
        assert!(!policy.poll_due(now + DELAY * 10));
        assert_eq!(policy.pending_deadline(), None);
    }

    #[test]
    fn test_zero_max_gives_up_immediately() {
        let mut policy = open_policy(0);
        assert_eq!(policy.on_closed(Instant::now()), CloseDecision::GiveUp);
    }

    #[test]
    fn test_close_cancels_pending_retry() {
        let now = Instant::now();
        let mut policy = open_policy(50);
        policy.on_closed(now);
        policy.close();
        assert_eq!(policy.state(), ConnectionState::Closed);
        assert_eq!(policy.pending_deadline(), None);
        assert_eq!(policy.on_closed(now), CloseDecision::Ignore);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        let at = Instant::now();
        assert_eq!(
            ConnectionState::RetryScheduled { attempt: 3, at }.to_string(),
            "RetryScheduled(3)"
        );
    }
}
