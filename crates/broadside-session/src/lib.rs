//! Session state for Broadside.
//!
//! This crate owns the client's canonical view of the match:
//!
//! 1. **State** ([`SessionStore`]) — identity, both boards, attack
//!    histories, match and game state. Changed only through named
//!    mutations that each return a [`StoreChange`].
//! 2. **Identity persistence** ([`IdentityStore`] trait) — remembering who
//!    we are so a reconnect or restart lands in the same match.
//!
//! # How it fits in the stack
//!
//! ```text
//! Presenter (above)  ← reads the store, reacts to StoreChange
//!     ↕
//! Session Layer (this crate)  ← canonical state, single writer
//!     ↕
//! Protocol Layer (below)  ← provides payload and id types
//! ```
//!
//! Nothing here does I/O on the network or knows about time; the driver in
//! the `broadside` crate feeds decoded frames in and reads changes out.

mod error;
mod identity;
mod state;
mod store;

pub use error::SessionError;
pub use identity::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
pub use state::{AttackKind, BoardState, MatchState, Participant, Side, StoreChange};
pub use store::SessionStore;
