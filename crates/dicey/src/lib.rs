//! # Dicey
//!
//! Group decision rooms: participants propose options, vote once each,
//! and get a single answer, with a fair random draw when the vote ties.
//!
//! The rules live in `dicey-room`; this crate hosts them. A
//! [`DecisionService`] takes requests from identified participants and
//! applies them to per-room actors, and a [`SyncReconciler`] keeps a
//! client's copy of a room up to date by polling.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use dicey::prelude::*;
//!
//! # async fn run() {
//! dicey::init_tracing();
//!
//! let identity = TokenTable::new().with("alice", ParticipantId(1));
//! let service = DecisionServiceBuilder::new().build(identity);
//!
//! let reply = service
//!     .handle_request(
//!         Some("alice"),
//!         Request::CreateRoom {
//!             title: "Pizza Night".into(),
//!             description: None,
//!             max_participants: None,
//!         },
//!     )
//!     .await;
//! # let _ = reply;
//! # }
//! ```

mod error;
mod handler;
mod identity;
mod service;
mod sync;

pub use error::DiceyError;
pub use identity::{IdentitySource, TokenTable};
pub use service::{DecisionService, DecisionServiceBuilder};
pub use sync::{ServiceSource, SnapshotSource, SyncConfig, SyncOutcome, SyncReconciler};

pub mod prelude {
    pub use crate::{
        DecisionService, DecisionServiceBuilder, DiceyError, IdentitySource, ServiceSource,
        SnapshotSource, SyncConfig, SyncOutcome, SyncReconciler, TokenTable,
    };
    pub use dicey_activity::{Clock, IdleCheckConfig, ManualClock, SystemClock};
    pub use dicey_protocol::{
        Codec, Envelope, ErrorKind, JsonCodec, OptionId, ParticipantId, Phase, Request,
        Resolution, ResolutionTrigger, Response, RoomCode, RoomFilter, RoomSnapshot,
        RoomSummary, TiebreakMethod,
    };
    pub use dicey_room::{RoomConfig, RoomError};
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls do nothing.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
