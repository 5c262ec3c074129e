//! Request and response messages exchanged with the decision service.
//!
//! Transport is someone else's problem: a client wraps a [`Request`] in an
//! [`Envelope`], encodes it with a [`Codec`](crate::Codec) and hands the
//! bytes over however it likes. The reply comes back the same way.

use serde::{Deserialize, Serialize};

use crate::{OptionId, Resolution, RoomFilter, RoomSnapshot, RoomSummary, TiebreakMethod};

/// The outer wrapper for every message.
///
/// `seq` lets a client pair replies with requests; the service echoes the
/// request's `seq` on its reply. `timestamp` is milliseconds since the
/// sender started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub seq: u64,
    pub timestamp: u64,
    /// Identity token; only meaningful on requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u64, timestamp: u64, body: T) -> Self {
        Self {
            seq,
            timestamp,
            token: None,
            body,
        }
    }

    /// Attaches the caller's identity token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Everything a participant can ask of the service.
///
/// Room codes travel as typed by the user; the service normalizes them.
/// `expected_revision` on phase transitions is an optimistic-concurrency
/// guard: when present it must equal the room's current revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    CreateRoom {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        max_participants: Option<usize>,
    },
    JoinRoom {
        code: String,
    },
    GetSnapshot {
        code: String,
    },
    AddOption {
        code: String,
        text: String,
    },
    EditOption {
        code: String,
        option_id: OptionId,
        text: String,
    },
    DeleteOption {
        code: String,
        option_id: OptionId,
    },
    StartVoting {
        code: String,
        #[serde(default)]
        expected_revision: Option<u64>,
    },
    CastVote {
        code: String,
        option_id: OptionId,
    },
    EndVoting {
        code: String,
        #[serde(default)]
        expected_revision: Option<u64>,
    },
    BreakTie {
        code: String,
        method: TiebreakMethod,
        #[serde(default)]
        expected_revision: Option<u64>,
    },
    ArchiveRoom {
        code: String,
    },
    UnarchiveRoom {
        code: String,
    },
    DeleteRoom {
        code: String,
    },
    ListRooms {
        filter: RoomFilter,
    },
}

/// The service's answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// The room's state after the request was applied.
    Snapshot { snapshot: Box<RoomSnapshot> },

    /// The outcome of `EndVoting` or `BreakTie`, with the resulting state.
    Resolution {
        resolution: Resolution,
        snapshot: Box<RoomSnapshot>,
    },

    Rooms { rooms: Vec<RoomSummary> },

    Deleted { code: String },

    /// The request was rejected and had no effect.
    Error { kind: ErrorKind, message: String },
}

/// Machine-readable rejection reasons, one per named error condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidPhase,
    NotCreator,
    NotAuthor,
    InsufficientOptions,
    AlreadyVoted,
    UnknownOption,
    NoOptions,
    NoVotes,
    NotFound,
    Conflict,
    RoomFull,
    InvalidInput,
    Unavailable,
    Unauthorized,
    BadRequest,
}
