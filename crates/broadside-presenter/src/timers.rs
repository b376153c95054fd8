//! Cancelable deadline table.
//!
//! The presenter never spawns timers. It records deadlines here and the
//! driver sleeps until [`Timers::next_deadline`], then calls back in. That
//! keeps every transition synchronous and lets tests step the clock.

use std::collections::BTreeMap;

use tokio::time::{self, Instant};
use tracing::trace;

/// The timed transitions the presenter knows about.
///
/// At most one deadline exists per kind; scheduling a kind again replaces
/// the previous deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Hide the "position your ships" modal.
    PositionModalHide,
    /// The settle interval after an attack result ended; announce the turn.
    Settle,
    /// Hide the turn modal.
    TurnModalHide,
}

/// One deadline per [`TimerKind`].
#[derive(Debug, Clone, Default)]
pub struct Timers {
    deadlines: BTreeMap<TimerKind, Instant>,
}

impl Timers {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `kind` at `at`, replacing any pending deadline of that kind.
    pub fn schedule(&mut self, kind: TimerKind, at: Instant) {
        if self.deadlines.insert(kind, at).is_some() {
            trace!(?kind, "timer rescheduled");
        }
    }

    /// Cancels `kind`. Returns whether it was pending.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.deadlines.remove(&kind).is_some()
    }

    /// Cancels everything.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// Whether `kind` is pending.
    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    /// When `kind` fires, if pending.
    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.deadlines.get(&kind).copied()
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Removes and returns the earliest timer due at or before `now`.
    ///
    /// Equal deadlines come out in [`TimerKind`] order. Call repeatedly
    /// until it returns `None` to drain everything that is due.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKind> {
        let (&kind, _) = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .min_by_key(|(kind, at)| (**at, **kind))?;
        self.deadlines.remove(&kind);
        Some(kind)
    }

    /// Number of pending deadlines.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

/// Sleeps until `deadline`, or forever when there is none.
///
/// Meant for a `tokio::select!` branch: with no deadline the branch simply
/// never completes and the other branches keep running.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
