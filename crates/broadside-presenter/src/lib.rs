//! Turn presentation for Broadside.
//!
//! Converts discrete, possibly bursty session updates into a timed sequence
//! of UI states: which board is in front, when the turn modal appears and
//! disappears, and which enemy ships are known to be sunk.
//!
//! # Timing
//!
//! Two intervals drive everything ([`PresenterConfig`]):
//!
//! - **settle interval**: after an attack result, how long the outcome is
//!   shown before the turn indicator flips the visible board.
//! - **display interval**: how long the turn and position modals stay up.
//!
//! # Integration
//!
//! The presenter is designed to sit inside the session driver's
//! `tokio::select!` loop next to the transport:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = next_event(&conn) => {
//!             let change = router.dispatch(&mut store, &envelope)?;
//!             presenter.on_change(&store, &change, Instant::now());
//!         }
//!         _ = timers::sleep_until(presenter.next_deadline()) => {
//!             presenter.advance(&store, Instant::now());
//!         }
//!     }
//! }
//! ```
//!
//! Time is always passed in, so tests drive it with explicit instants or
//! `tokio::time::pause()`.

use std::time::Duration;

use tracing::warn;

mod presenter;
pub mod timers;
mod view;

pub use presenter::{Phase, TurnPresenter};
pub use timers::{TimerKind, Timers};
pub use view::{
    ActiveBoard, ENEMY_TURN, Notice, Outcome, PositionModal, PresentationState, StatusBanner,
    TurnModal, YOUR_TURN,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Presenter timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenterConfig {
    /// How long the turn and position modals stay visible. Default: 1500 ms.
    pub display_interval: Duration,
    /// Delay between an attack result and the next turn announcement.
    /// Default: 1000 ms.
    pub settle_interval: Duration,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            display_interval: Duration::from_millis(1500),
            settle_interval: Duration::from_millis(1000),
        }
    }
}

impl PresenterConfig {
    /// Longest interval accepted; anything above is clamped.
    pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

    /// Sets the display interval.
    pub fn with_display_interval(mut self, interval: Duration) -> Self {
        self.display_interval = interval;
        self
    }

    /// Sets the settle interval.
    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TurnPresenter::new`].
    pub fn validated(mut self) -> Self {
        for (name, interval) in [
            ("display_interval", &mut self.display_interval),
            ("settle_interval", &mut self.settle_interval),
        ] {
            if *interval > Self::MAX_INTERVAL {
                warn!(
                    name,
                    requested_ms = interval.as_millis() as u64,
                    max_ms = Self::MAX_INTERVAL.as_millis() as u64,
                    "presenter interval exceeds maximum, clamping"
                );
                *interval = Self::MAX_INTERVAL;
            }
        }
        self
    }
}
