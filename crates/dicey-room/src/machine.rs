//! The decision-room state machine.
//!
//! [`RoomStateMachine`] owns everything about one room: its phase, the
//! option registry, the ballots and the activity monitor. Every operation
//! is validated against the state as it is at application time, so a
//! request built from a stale snapshot is rejected instead of merged.
//!
//! The machine is synchronous and takes `now` as an argument. The room
//! actor supplies time from its clock and serializes access.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dicey_activity::ActivityMonitor;
use dicey_protocol::{
    DecisionOption, OptionId, Participant, ParticipantId, Phase, Resolution,
    ResolutionTrigger, Room, RoomCode, RoomSnapshot, TieBreakDraw, TiebreakMethod, Vote,
};
use tracing::{debug, info, trace, warn};

use crate::config::ValidRoom;
use crate::{OptionRegistry, RoomConfig, RoomError, Tally, TieResolver, VoteTally};

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// What a tally says, before anything is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// A single option holds the maximum.
    Winner(OptionId),
    /// Two or more options share the maximum.
    Tie(Vec<OptionId>),
    /// Options exist but nobody voted.
    NoVotes,
}

/// Reads a tally.
///
/// # Errors
/// [`RoomError::NoOptions`] if the tally covers no options at all.
pub fn decide(tally: &Tally) -> Result<Decision, RoomError> {
    let (max, mut leaders) = tally.leaders().ok_or(RoomError::NoOptions)?;
    if max == 0 {
        return Ok(Decision::NoVotes);
    }
    Ok(match leaders.len() {
        1 => Decision::Winner(leaders.remove(0)),
        _ => Decision::Tie(leaders),
    })
}

/// Result of one idle check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleCheck {
    /// The room isn't in a phase idle checks care about (not voting, or
    /// already closed).
    NotApplicable,
    /// Voting, but someone acted recently.
    Active { idle_for: Duration },
    /// The room was quiet for too long and voting was forced to an end.
    Forced(Resolution),
}

impl IdleCheck {
    pub fn forced(&self) -> bool {
        matches!(self, Self::Forced(_))
    }
}

// ---------------------------------------------------------------------------
// RoomStateMachine
// ---------------------------------------------------------------------------

/// Authoritative state of one room.
///
/// Every method either applies its change in full or returns an error and
/// leaves the room untouched: membership, revision and last activity
/// included. Newcomers are admitted only once their action is accepted.
pub struct RoomStateMachine {
    room: Room,
    options: OptionRegistry,
    votes: VoteTally,
    participants: Vec<Participant>,
    activity: ActivityMonitor,
    voting_order: Vec<OptionId>,
    tied: Vec<OptionId>,
    revision: u64,
    default_tiebreak: TiebreakMethod,
}

impl RoomStateMachine {
    /// Opens a room. The creator is its first participant.
    pub(crate) fn new(
        code: RoomCode,
        creator: ParticipantId,
        valid: ValidRoom,
        config: &RoomConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let room = Room {
            code,
            title: valid.title,
            description: valid.description,
            creator,
            max_participants: valid.max_participants,
            is_open: true,
            archived: false,
            phase: Phase::Open,
            created_at: now,
            resolved_at: None,
            final_option_id: None,
            tiebreaker_method: None,
            resolution_trigger: None,
        };
        Self {
            room,
            options: OptionRegistry::new(config.max_option_len),
            votes: VoteTally::new(),
            participants: vec![Participant {
                id: creator,
                joined_at: now,
            }],
            activity: ActivityMonitor::new(now, config.idle.idle_threshold),
            voting_order: Vec::new(),
            tied: Vec::new(),
            revision: 1,
            default_tiebreak: config.default_tiebreak,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn code(&self) -> &RoomCode {
        &self.room.code
    }

    pub fn phase(&self) -> Phase {
        self.room.phase
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.activity.last_activity()
    }

    pub fn is_participant(&self, who: ParticipantId) -> bool {
        self.participants.iter().any(|p| p.id == who)
    }

    /// Whether idle checks can still change anything.
    pub fn watches_idle(&self) -> bool {
        self.room.is_open && !self.room.voting_ended()
    }

    pub fn tally(&self) -> Tally {
        self.votes.tally(&self.options)
    }

    /// The full, unredacted read model.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            revision: self.revision,
            room: self.room.clone(),
            options: self.options.iter().cloned().collect(),
            participants: self.participants.clone(),
            votes: self.votes.votes(),
            tally: self.tally().into_map(),
            voting_order: self.voting_order.clone(),
            tied: self.tied.clone(),
        }
    }

    /// Fails with `Conflict` if the caller's view is out of date.
    pub fn check_revision(&self, expected: Option<u64>) -> Result<(), RoomError> {
        match expected {
            Some(expected) if expected != self.revision => Err(RoomError::Conflict {
                expected,
                actual: self.revision,
            }),
            _ => Ok(()),
        }
    }

    // -- participants -------------------------------------------------------

    /// Adds `who` as a participant. Returns `false` if they already were
    /// one. Only a new membership counts as activity.
    pub fn join(&mut self, who: ParticipantId, now: DateTime<Utc>) -> Result<bool, RoomError> {
        if !self.admit(who)? {
            return Ok(false);
        }
        self.enrol(who, now);
        self.touch(now);
        Ok(true)
    }

    // -- options ------------------------------------------------------------

    /// Proposes an option while the room is `Open`, joining `who` first if
    /// they aren't a member yet.
    pub fn add_option(
        &mut self,
        who: ParticipantId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<DecisionOption, RoomError> {
        let newcomer = self.admit(who)?;
        let option = self.options.add(self.room.phase, who, text, now)?.clone();
        if newcomer {
            self.enrol(who, now);
        }
        self.touch(now);
        debug!(room = %self.room.code, participant = %who, option = %option.id, "option added");
        Ok(option)
    }

    /// Rewrites an option's text. Author only, `Open` only.
    pub fn edit_option(
        &mut self,
        who: ParticipantId,
        id: OptionId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<DecisionOption, RoomError> {
        // Only members author options, so a newcomer can never pass.
        self.admit(who)?;
        let option = self.options.edit(self.room.phase, who, id, text)?.clone();
        self.touch(now);
        debug!(room = %self.room.code, participant = %who, option = %id, "option edited");
        Ok(option)
    }

    /// Withdraws an option. Author only, `Open` only.
    pub fn delete_option(
        &mut self,
        who: ParticipantId,
        id: OptionId,
        now: DateTime<Utc>,
    ) -> Result<DecisionOption, RoomError> {
        self.admit(who)?;
        let option = self.options.delete(self.room.phase, who, id)?;
        self.touch(now);
        debug!(room = %self.room.code, participant = %who, option = %id, "option deleted");
        Ok(option)
    }

    // -- phase transitions --------------------------------------------------

    /// `Open → Voting`. Creator only, needs at least two options. Freezes
    /// the options and shuffles their display order.
    pub fn start_voting(
        &mut self,
        who: ParticipantId,
        expected_revision: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<(), RoomError> {
        self.check_revision(expected_revision)?;
        self.require_phase(Phase::Open, "start voting")?;
        self.require_creator(who)?;
        if self.options.len() < 2 {
            return Err(RoomError::InsufficientOptions(self.options.len()));
        }

        self.advance(Phase::Voting);
        self.voting_order = self.options.shuffled_ids();
        self.touch(now);
        info!(room = %self.room.code, options = self.options.len(), "voting started");
        Ok(())
    }

    /// Records `who`'s single ballot, joining them first if needed. A
    /// rejected ballot leaves the room exactly as it was.
    pub fn cast_vote(
        &mut self,
        who: ParticipantId,
        option_id: OptionId,
        now: DateTime<Utc>,
    ) -> Result<Vote, RoomError> {
        let newcomer = self.admit(who)?;
        let vote = self
            .votes
            .cast(self.room.phase, self.room.is_open, &self.options, who, option_id, now)?
            .clone();
        if newcomer {
            self.enrol(who, now);
        }
        self.touch(now);
        debug!(room = %self.room.code, participant = %who, option = %option_id, "vote cast");
        Ok(vote)
    }

    /// Creator ends voting. A unique leader wins outright; a shared
    /// maximum moves the room to `TieBreakPending`.
    pub fn end_voting(
        &mut self,
        who: ParticipantId,
        expected_revision: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Resolution, RoomError> {
        self.check_revision(expected_revision)?;
        self.require_phase(Phase::Voting, "end voting")?;
        self.require_open("end voting")?;
        self.require_creator(who)?;

        match decide(&self.tally())? {
            Decision::Winner(winner) => {
                self.touch(now);
                Ok(self.resolve(winner, ResolutionTrigger::Creator, None, now))
            }
            Decision::Tie(tied) => {
                self.touch(now);
                self.advance(Phase::TieBreakPending);
                self.tied = tied.clone();
                info!(room = %self.room.code, tied = tied.len(), "tie detected");
                Ok(Resolution::TieBreakPending { tied })
            }
            Decision::NoVotes => Err(RoomError::NoVotes),
        }
    }

    /// Creator breaks a pending tie with a uniform draw.
    pub fn break_tie(
        &mut self,
        who: ParticipantId,
        method: TiebreakMethod,
        expected_revision: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Resolution, RoomError> {
        self.check_revision(expected_revision)?;
        self.require_phase(Phase::TieBreakPending, "break a tie")?;
        self.require_creator(who)?;

        let draw = TieResolver::draw(&self.tied, method)?;
        self.touch(now);
        Ok(self.resolve(draw.winner, ResolutionTrigger::Creator, Some(draw), now))
    }

    /// Forces a conclusion if the room has been quiet past the threshold.
    ///
    /// Ties are broken on the spot with the configured default method. A
    /// room with no ballots is closed without a winner and stays in
    /// `Voting`. Once resolved or closed, checks are no-ops.
    pub fn check_idle(&mut self, now: DateTime<Utc>) -> IdleCheck {
        if !self.room.phase.is_voting() || !self.room.is_open {
            trace!(room = %self.room.code, phase = %self.room.phase, "idle check skipped");
            return IdleCheck::NotApplicable;
        }
        if !self.activity.is_idle(now) {
            let idle_for = self.activity.idle_for(now);
            trace!(room = %self.room.code, idle_s = idle_for.as_secs(), "idle check, room active");
            return IdleCheck::Active { idle_for };
        }

        let decision = match self.room.phase {
            Phase::TieBreakPending => Ok(Decision::Tie(self.tied.clone())),
            _ => decide(&self.tally()),
        };
        let resolution = match decision {
            Ok(Decision::Winner(winner)) => {
                self.resolve(winner, ResolutionTrigger::Idle, None, now)
            }
            Ok(Decision::Tie(tied)) => match TieResolver::draw(&tied, self.default_tiebreak) {
                Ok(draw) => self.resolve(draw.winner, ResolutionTrigger::Idle, Some(draw), now),
                Err(_) => self.close_undecided(),
            },
            Ok(Decision::NoVotes) | Err(_) => self.close_undecided(),
        };
        IdleCheck::Forced(resolution)
    }

    // -- dashboard ----------------------------------------------------------

    /// Archives or unarchives a resolved room. Creator only.
    pub fn set_archived(
        &mut self,
        who: ParticipantId,
        archived: bool,
        now: DateTime<Utc>,
    ) -> Result<(), RoomError> {
        let action = if archived { "archive" } else { "unarchive" };
        self.require_phase(Phase::Resolved, action)?;
        self.require_creator(who)?;
        if self.room.archived != archived {
            self.room.archived = archived;
            self.touch(now);
            info!(room = %self.room.code, archived, "room archive flag changed");
        }
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn resolve(
        &mut self,
        winner: OptionId,
        trigger: ResolutionTrigger,
        draw: Option<TieBreakDraw>,
        now: DateTime<Utc>,
    ) -> Resolution {
        self.advance(Phase::Resolved);
        self.room.final_option_id = Some(winner);
        self.room.resolved_at = Some(now);
        self.room.tiebreaker_method = draw.map(|d| d.method);
        self.room.resolution_trigger = Some(trigger);
        self.voting_order.clear();
        self.tied.clear();
        self.revision += 1;

        match trigger {
            ResolutionTrigger::Creator => info!(
                room = %self.room.code,
                winner = %winner,
                trigger = %trigger,
                tiebreak = ?self.room.tiebreaker_method,
                "room resolved"
            ),
            ResolutionTrigger::Idle => warn!(
                room = %self.room.code,
                winner = %winner,
                trigger = %trigger,
                tiebreak = ?self.room.tiebreaker_method,
                "room resolved by idle timeout"
            ),
        }

        Resolution::Decided {
            option_id: winner,
            trigger,
            draw,
        }
    }

    fn close_undecided(&mut self) -> Resolution {
        self.room.is_open = false;
        self.room.resolution_trigger = Some(ResolutionTrigger::Idle);
        self.revision += 1;
        warn!(
            room = %self.room.code,
            trigger = %ResolutionTrigger::Idle,
            "room closed by idle timeout with no decision"
        );
        Resolution::NoDecision {
            trigger: ResolutionTrigger::Idle,
        }
    }

    fn advance(&mut self, to: Phase) {
        debug_assert!(
            self.room.phase.can_transition_to(to),
            "illegal transition {} -> {}",
            self.room.phase,
            to
        );
        self.room.phase = to;
    }

    /// Whether `who` may act here, and whether they would be new. Changes
    /// nothing, so the caller can validate the action before enrolling.
    fn admit(&self, who: ParticipantId) -> Result<bool, RoomError> {
        if self.is_participant(who) {
            return Ok(false);
        }
        if self.participants.len() >= self.room.max_participants {
            debug!(room = %self.room.code, participant = %who, "join rejected, room full");
            return Err(RoomError::RoomFull(self.room.max_participants));
        }
        Ok(true)
    }

    fn enrol(&mut self, who: ParticipantId, now: DateTime<Utc>) {
        self.participants.push(Participant {
            id: who,
            joined_at: now,
        });
        debug!(
            room = %self.room.code,
            participant = %who,
            participants = self.participants.len(),
            "participant joined"
        );
    }

    /// Records participant activity and bumps the revision.
    fn touch(&mut self, now: DateTime<Utc>) {
        self.activity.record(now);
        self.revision += 1;
    }

    fn require_phase(&self, phase: Phase, action: &'static str) -> Result<(), RoomError> {
        if self.room.phase == phase {
            Ok(())
        } else {
            Err(RoomError::InvalidPhase {
                action,
                phase: self.room.phase,
            })
        }
    }

    fn require_open(&self, action: &'static str) -> Result<(), RoomError> {
        if self.room.is_open {
            Ok(())
        } else {
            Err(RoomError::InvalidPhase {
                action,
                phase: self.room.phase,
            })
        }
    }

    fn require_creator(&self, who: ParticipantId) -> Result<(), RoomError> {
        if who == self.room.creator {
            Ok(())
        } else {
            Err(RoomError::NotCreator)
        }
    }
}
