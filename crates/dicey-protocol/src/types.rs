//! Entity shapes shared by the room core, the service and polling clients.
//!
//! Every type here is plain data: it serializes to the JSON a client
//! polls for, and carries no behaviour beyond small derived queries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable participant identity, as supplied by the identity source.
///
/// Serialized as a plain number (`#[serde(transparent)]`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifier of a proposed option.
///
/// Ids are allocated from one process-wide counter, so an id from one
/// room never names an option in another, and ordering by id is
/// ordering by submission.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OptionId(pub u64);

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O-{}", self.0)
    }
}

/// The short, human-shareable code that identifies a room.
///
/// Always [`RoomCode::LEN`] characters drawn from [`RoomCode::ALPHABET`].
/// Parsing is forgiving about what people type: surrounding whitespace
/// is dropped and lowercase letters are folded to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of characters in a room code.
    pub const LEN: usize = 6;

    /// Characters a room code is drawn from.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Normalizes and validates user input.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] if the normalized input
    /// isn't exactly six alphabet characters.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let normalized = input.trim().to_ascii_uppercase();
        let valid = normalized.len() == Self::LEN
            && normalized.bytes().all(|b| Self::ALPHABET.contains(&b));
        if valid {
            Ok(Self(normalized))
        } else {
            Err(ProtocolError::InvalidRoomCode(input.to_string()))
        }
    }

    /// Builds a code from six alphabet picks. `pick(n)` must return an
    /// index below `n`; larger values wrap.
    pub fn from_picks(mut pick: impl FnMut(usize) -> usize) -> Self {
        let n = Self::ALPHABET.len();
        Self(
            (0..Self::LEN)
                .map(|_| Self::ALPHABET[pick(n) % n] as char)
                .collect(),
        )
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// ```text
/// Open ──→ Voting ──────────────────────→ Resolved
///             └──→ TieBreakPending ──────────┘
/// ```
///
/// `TieBreakPending` is a sub-state of voting: ballots are closed, the
/// maximum is shared by several options, and the room waits for the
/// tie-break draw. There are no backward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Open,
    Voting,
    TieBreakPending,
    Resolved,
}

impl Phase {
    /// Options may be added, edited and deleted.
    pub fn accepts_options(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Ballots may be cast.
    pub fn accepts_votes(self) -> bool {
        matches!(self, Self::Voting)
    }

    /// Voting has started and no decision has been recorded yet.
    pub fn is_voting(self) -> bool {
        matches!(self, Self::Voting | Self::TieBreakPending)
    }

    /// Terminal phase.
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Position in the lifecycle; strictly increases across transitions.
    pub fn rank(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Voting => 1,
            Self::TieBreakPending => 2,
            Self::Resolved => 3,
        }
    }

    /// Returns `true` if moving from `self` to `target` is a legal step.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::Voting)
                | (Self::Voting, Self::TieBreakPending)
                | (Self::Voting, Self::Resolved)
                | (Self::TieBreakPending, Self::Resolved)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Voting => write!(f, "Voting"),
            Self::TieBreakPending => write!(f, "TieBreakPending"),
            Self::Resolved => write!(f, "Resolved"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tie breaks and resolution
// ---------------------------------------------------------------------------

/// How a tie break is presented to participants.
///
/// All three methods draw from the same uniform distribution; only the
/// animation differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiebreakMethod {
    Dice,
    Spinner,
    Coin,
}

impl TiebreakMethod {
    pub const ALL: [Self; 3] = [Self::Dice, Self::Spinner, Self::Coin];
}

impl fmt::Display for TiebreakMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dice => write!(f, "dice"),
            Self::Spinner => write!(f, "spinner"),
            Self::Coin => write!(f, "coin"),
        }
    }
}

impl FromStr for TiebreakMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dice" => Ok(Self::Dice),
            "spinner" => Ok(Self::Spinner),
            "coin" => Ok(Self::Coin),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown tiebreak method {other:?}"
            ))),
        }
    }
}

/// What ended the voting: the creator, or the idle monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTrigger {
    Creator,
    Idle,
}

impl fmt::Display for ResolutionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creator => write!(f, "creator"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// The outcome of one uniform tie-break draw.
///
/// `index` is the winner's position among the `candidates` tied options,
/// which is what a presentation layer settles its animation on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreakDraw {
    pub method: TiebreakMethod,
    pub winner: OptionId,
    pub index: usize,
    pub candidates: usize,
}

/// The result of asking a room to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum Resolution {
    /// A winner is recorded and the room is `Resolved`.
    /// `draw` is present exactly when a tie break picked the winner.
    Decided {
        option_id: OptionId,
        trigger: ResolutionTrigger,
        draw: Option<TieBreakDraw>,
    },

    /// Several options share the maximum; waiting for `BreakTie`.
    TieBreakPending { tied: Vec<OptionId> },

    /// Forced resolution found no ballots; nothing was recorded and the
    /// room was closed.
    NoDecision { trigger: ResolutionTrigger },
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// The room record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub title: String,
    pub description: Option<String>,
    pub creator: ParticipantId,
    pub max_participants: usize,
    /// Cleared when an idle check gives up on a room with no ballots.
    pub is_open: bool,
    pub archived: bool,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    /// Set if and only if `phase` is `Resolved`.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Set if and only if `phase` is `Resolved`.
    pub final_option_id: Option<OptionId>,
    pub tiebreaker_method: Option<TiebreakMethod>,
    pub resolution_trigger: Option<ResolutionTrigger>,
}

impl Room {
    /// `true` once a winner has been recorded.
    pub fn voting_ended(&self) -> bool {
        self.phase.is_resolved()
    }
}

/// A candidate choice submitted by a participant.
///
/// Named `DecisionOption` to stay clear of `std::option::Option`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub id: OptionId,
    pub text: String,
    pub submitted_by: ParticipantId,
    /// Append order within the room, starting at 0.
    pub position: u32,
    pub created_at: DateTime<Utc>,
}

/// A membership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub joined_at: DateTime<Utc>,
}

/// One participant's single, final ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: ParticipantId,
    pub option_id: OptionId,
    pub cast_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// The canonical view of a room that clients poll for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Incremented on every accepted mutation.
    pub revision: u64,
    pub room: Room,
    /// In submission order.
    pub options: Vec<DecisionOption>,
    pub participants: Vec<Participant>,
    pub votes: Vec<Vote>,
    /// Every option is present, including those with zero votes.
    pub tally: BTreeMap<OptionId, u32>,
    /// Shuffled presentation order while voting; empty otherwise.
    pub voting_order: Vec<OptionId>,
    /// Options awaiting a tie break; empty unless `TieBreakPending`.
    pub tied: Vec<OptionId>,
}

impl RoomSnapshot {
    pub fn option(&self, id: OptionId) -> Option<&DecisionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// The winning option, once the room is resolved.
    pub fn final_option(&self) -> Option<&DecisionOption> {
        self.room.final_option_id.and_then(|id| self.option(id))
    }

    pub fn vote_of(&self, voter: ParticipantId) -> Option<OptionId> {
        self.votes
            .iter()
            .find(|v| v.voter == voter)
            .map(|v| v.option_id)
    }

    pub fn is_participant(&self, id: ParticipantId) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn total_votes(&self) -> u32 {
        self.tally.values().sum()
    }

    /// Hides who voted for what. The tally stays complete; `votes` keeps
    /// only the viewer's own ballot.
    pub fn redacted_for(mut self, viewer: ParticipantId) -> Self {
        self.votes.retain(|v| v.voter == viewer);
        self
    }

    /// Condenses the snapshot into a listing entry.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            code: self.room.code.clone(),
            title: self.room.title.clone(),
            creator: self.room.creator,
            phase: self.room.phase,
            is_open: self.room.is_open,
            archived: self.room.archived,
            participant_count: self.participants.len(),
            max_participants: self.room.max_participants,
            created_at: self.room.created_at,
            resolved_at: self.room.resolved_at,
            final_option_text: self.final_option().map(|o| o.text.clone()),
            tiebreaker_method: self.room.tiebreaker_method,
        }
    }
}

/// A room as it appears in a participant's room listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub code: RoomCode,
    pub title: String,
    pub creator: ParticipantId,
    pub phase: Phase,
    pub is_open: bool,
    pub archived: bool,
    pub participant_count: usize,
    pub max_participants: usize,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub final_option_text: Option<String>,
    pub tiebreaker_method: Option<TiebreakMethod>,
}

/// Which of a participant's rooms to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomFilter {
    /// Not archived, still open, not yet resolved.
    Live,
    /// Resolved and not archived.
    Past,
    Archived,
}

impl RoomFilter {
    pub fn matches(self, summary: &RoomSummary) -> bool {
        match self {
            Self::Live => {
                !summary.archived
                    && summary.is_open
                    && !summary.phase.is_resolved()
            }
            Self::Past => !summary.archived && summary.phase.is_resolved(),
            Self::Archived => summary.archived,
        }
    }
}
