//! The decision-room core for Dicey.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns a
//! [`RoomStateMachine`]. The machine enforces the room lifecycle:
//!
//! ```text
//! Open ──start──→ Voting ──end──→ Resolved
//!                   └──tie──→ TieBreakPending ──draw──┘
//! ```
//!
//! # Key types
//!
//! - [`RoomManager`]: creates and deletes rooms, routes by room code
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`RoomStateMachine`]: the rules, with [`OptionRegistry`],
//!   [`VoteTally`] and [`TieResolver`] underneath
//! - [`RoomConfig`]: limits, default tiebreak, idle detection

mod config;
mod error;
mod machine;
mod manager;
mod options;
mod room;
mod tally;
mod tiebreak;

pub use config::{NewRoom, RoomConfig};
pub use error::RoomError;
pub use machine::{Decision, IdleCheck, RoomStateMachine, decide};
pub use manager::RoomManager;
pub use options::OptionRegistry;
pub use room::RoomHandle;
pub use tally::{Tally, VoteTally};
pub use tiebreak::TieResolver;
