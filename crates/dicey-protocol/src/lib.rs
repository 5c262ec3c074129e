//! Shared vocabulary for Dicey decision rooms.
//!
//! - **Types** ([`Room`], [`DecisionOption`], [`Vote`], [`RoomSnapshot`],
//!   [`Phase`], [`Resolution`], ...): the entities a room is made of and
//!   the read model clients poll for.
//! - **Messages** ([`Request`], [`Response`], [`Envelope`]): what a
//!   client sends to the decision service and what it gets back.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how messages become bytes.
//!
//! This crate knows nothing about rules: it doesn't decide when a vote
//! is allowed, only what a vote looks like.

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{Envelope, ErrorKind, Request, Response};
pub use types::{
    DecisionOption, OptionId, Participant, ParticipantId, Phase, Resolution,
    ResolutionTrigger, Room, RoomCode, RoomFilter, RoomSnapshot, RoomSummary,
    TieBreakDraw, TiebreakMethod, Vote,
};
