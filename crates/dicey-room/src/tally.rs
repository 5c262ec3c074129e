//! Ballots cast in one room and how they add up.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use dicey_protocol::{OptionId, ParticipantId, Phase, Vote};

use crate::{OptionRegistry, RoomError};

/// One ballot per participant, final once cast.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    votes: HashMap<ParticipantId, Vote>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `voter`'s ballot for `option_id`.
    ///
    /// Checks run in this order: the room accepts ballots, the voter has
    /// not voted yet, the option belongs to the room. A second ballot is
    /// rejected, never merged or overwritten.
    pub fn cast(
        &mut self,
        phase: Phase,
        is_open: bool,
        options: &OptionRegistry,
        voter: ParticipantId,
        option_id: OptionId,
        now: DateTime<Utc>,
    ) -> Result<&Vote, RoomError> {
        if !phase.accepts_votes() || !is_open {
            return Err(RoomError::InvalidPhase {
                action: "vote",
                phase,
            });
        }
        if self.votes.contains_key(&voter) {
            return Err(RoomError::AlreadyVoted);
        }
        if !options.contains(option_id) {
            return Err(RoomError::UnknownOption(option_id));
        }

        let vote = self.votes.entry(voter).or_insert(Vote {
            voter,
            option_id,
            cast_at: now,
        });
        Ok(vote)
    }

    pub fn vote_of(&self, voter: ParticipantId) -> Option<&Vote> {
        self.votes.get(&voter)
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Ballots in the order they were cast.
    pub fn votes(&self) -> Vec<Vote> {
        let mut votes: Vec<Vote> = self.votes.values().cloned().collect();
        votes.sort_by_key(|v| (v.cast_at, v.voter));
        votes
    }

    /// Counts per option. Every option in `options` is present, zero
    /// counts included.
    pub fn tally(&self, options: &OptionRegistry) -> Tally {
        let mut counts: BTreeMap<OptionId, u32> =
            options.ids().into_iter().map(|id| (id, 0)).collect();
        for vote in self.votes.values() {
            if let Some(count) = counts.get_mut(&vote.option_id) {
                *count += 1;
            }
        }
        Tally { counts }
    }
}

/// Per-option vote counts over the room's full option set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: BTreeMap<OptionId, u32>,
}

impl Tally {
    pub fn count(&self, id: OptionId) -> Option<u32> {
        self.counts.get(&id).copied()
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The maximum count and every option that reached it, in id order.
    /// `None` when there are no options.
    pub fn leaders(&self) -> Option<(u32, Vec<OptionId>)> {
        let max = *self.counts.values().max()?;
        let leaders = self
            .counts
            .iter()
            .filter(|(_, c)| **c == max)
            .map(|(id, _)| *id)
            .collect();
        Some((max, leaders))
    }

    pub fn into_map(self) -> BTreeMap<OptionId, u32> {
        self.counts
    }
}
