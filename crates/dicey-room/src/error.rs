//! Error types for the room layer.

use dicey_protocol::{ErrorKind, OptionId, Phase, RoomCode};

/// Why a room rejected a request. A rejected request changes nothing:
/// not the options, ballots or phase, and not the membership or revision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The action isn't allowed in the room's current phase, e.g. voting
    /// after the room resolved or editing an option once voting started.
    #[error("cannot {action} while room is {phase}")]
    InvalidPhase { action: &'static str, phase: Phase },

    #[error("only the room creator can do that")]
    NotCreator,

    #[error("only the option's author can change it")]
    NotAuthor,

    #[error("voting needs at least 2 options, room has {0}")]
    InsufficientOptions(usize),

    #[error("participant has already voted")]
    AlreadyVoted,

    #[error("option {0} is not in this room")]
    UnknownOption(OptionId),

    #[error("room has no options to decide between")]
    NoOptions,

    #[error("no votes have been cast")]
    NoVotes,

    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The request was based on a stale view of the room.
    #[error("room changed: expected revision {expected}, now at {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("room is full ({0} participants)")]
    RoomFull(usize),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The room's command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The wire-level kind for this rejection.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPhase { .. } => ErrorKind::InvalidPhase,
            Self::NotCreator => ErrorKind::NotCreator,
            Self::NotAuthor => ErrorKind::NotAuthor,
            Self::InsufficientOptions(_) => ErrorKind::InsufficientOptions,
            Self::AlreadyVoted => ErrorKind::AlreadyVoted,
            Self::UnknownOption(_) => ErrorKind::UnknownOption,
            Self::NoOptions => ErrorKind::NoOptions,
            Self::NoVotes => ErrorKind::NoVotes,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::RoomFull(_) => ErrorKind::RoomFull,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}
