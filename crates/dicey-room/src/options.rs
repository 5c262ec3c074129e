//! The set of options proposed in one room.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dicey_protocol::{DecisionOption, OptionId, ParticipantId, Phase};
use rand::seq::SliceRandom;

use crate::RoomError;

/// Process-wide option id counter. Ids are never reused, so an option id
/// can't accidentally resolve inside a different room.
static NEXT_OPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Proposed options, kept in submission order.
///
/// Every mutation takes the room's current phase so the registry can refuse
/// changes once voting has started. Checks run phase first, then
/// existence and authorship, then the text itself: after `Open`, nobody may
/// edit, author or not, and only an option's author learns its text was bad.
#[derive(Debug, Clone)]
pub struct OptionRegistry {
    options: Vec<DecisionOption>,
    next_position: u32,
    max_len: usize,
}

impl OptionRegistry {
    pub fn new(max_len: usize) -> Self {
        Self {
            options: Vec::new(),
            next_position: 0,
            max_len,
        }
    }

    /// Adds an option authored by `author`.
    pub fn add(
        &mut self,
        phase: Phase,
        author: ParticipantId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<&DecisionOption, RoomError> {
        require_open(phase, "add options")?;
        let text = self.clean_text(text)?;

        let option = DecisionOption {
            id: OptionId(NEXT_OPTION_ID.fetch_add(1, Ordering::Relaxed)),
            text,
            submitted_by: author,
            position: self.next_position,
            created_at: now,
        };
        self.next_position += 1;
        self.options.push(option);
        Ok(&self.options[self.options.len() - 1])
    }

    /// Replaces the text of an option. Only its author may do this.
    pub fn edit(
        &mut self,
        phase: Phase,
        editor: ParticipantId,
        id: OptionId,
        text: &str,
    ) -> Result<&DecisionOption, RoomError> {
        require_open(phase, "edit options")?;
        let idx = self.authored_index(editor, id)?;
        let text = self.clean_text(text)?;
        self.options[idx].text = text;
        Ok(&self.options[idx])
    }

    /// Removes an option. Only its author may do this.
    ///
    /// Positions of the remaining options are left as they were; they
    /// record submission order, not a dense index.
    pub fn delete(
        &mut self,
        phase: Phase,
        deleter: ParticipantId,
        id: OptionId,
    ) -> Result<DecisionOption, RoomError> {
        require_open(phase, "delete options")?;
        let idx = self.authored_index(deleter, id)?;
        Ok(self.options.remove(idx))
    }

    pub fn get(&self, id: OptionId) -> Option<&DecisionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn contains(&self, id: OptionId) -> bool {
        self.get(id).is_some()
    }

    /// Ids in submission order.
    pub fn ids(&self) -> Vec<OptionId> {
        self.options.iter().map(|o| o.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecisionOption> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// A fresh uniform shuffle of the option ids for voting display.
    pub fn shuffled_ids(&self) -> Vec<OptionId> {
        let mut ids = self.ids();
        ids.shuffle(&mut rand::rng());
        ids
    }

    fn clean_text(&self, text: &str) -> Result<String, RoomError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RoomError::InvalidInput("option text is empty".into()));
        }
        if text.chars().count() > self.max_len {
            return Err(RoomError::InvalidInput(format!(
                "option text longer than {} characters",
                self.max_len
            )));
        }
        Ok(text.to_string())
    }

    fn authored_index(&self, who: ParticipantId, id: OptionId) -> Result<usize, RoomError> {
        let idx = self
            .options
            .iter()
            .position(|o| o.id == id)
            .ok_or(RoomError::UnknownOption(id))?;
        if self.options[idx].submitted_by != who {
            return Err(RoomError::NotAuthor);
        }
        Ok(idx)
    }
}

fn require_open(phase: Phase, action: &'static str) -> Result<(), RoomError> {
    if phase.accepts_options() {
        Ok(())
    } else {
        Err(RoomError::InvalidPhase { action, phase })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: ParticipantId = ParticipantId(1);
    const BOB: ParticipantId = ParticipantId(2);

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn registry_with(texts: &[&str]) -> OptionRegistry {
        let mut reg = OptionRegistry::new(100);
        for t in texts {
            reg.add(Phase::Open, ALICE, t, now()).unwrap();
        }
        reg
    }

    #[test]
    fn test_add_assigns_append_positions() {
        let reg = registry_with(&["Margherita", "Funghi", "Diavola"]);
        let positions: Vec<u32> = reg.iter().map(|o| o.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_add_trims_text() {
        let mut reg = OptionRegistry::new(100);
        let opt = reg.add(Phase::Open, ALICE, "  Sushi  ", now()).unwrap();
        assert_eq!(opt.text, "Sushi");
    }

    #[test]
    fn test_add_rejects_whitespace_only() {
        let mut reg = OptionRegistry::new(100);
        let err = reg.add(Phase::Open, ALICE, " \t\n ", now()).unwrap_err();
        assert!(matches!(err, RoomError::InvalidInput(_)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_add_rejects_text_over_limit() {
        let mut reg = OptionRegistry::new(100);
        assert!(reg.add(Phase::Open, ALICE, &"a".repeat(100), now()).is_ok());
        let err = reg.add(Phase::Open, ALICE, &"a".repeat(101), now()).unwrap_err();
        assert!(matches!(err, RoomError::InvalidInput(_)));
    }

    #[test]
    fn test_add_rejected_outside_open() {
        let mut reg = OptionRegistry::new(100);
        let err = reg.add(Phase::Voting, ALICE, "Tacos", now()).unwrap_err();
        assert!(matches!(err, RoomError::InvalidPhase { phase: Phase::Voting, .. }));
    }

    #[test]
    fn test_edit_by_author_replaces_text() {
        let mut reg = registry_with(&["Margherita"]);
        let id = reg.ids()[0];
        let opt = reg.edit(Phase::Open, ALICE, id, "Quattro Formaggi").unwrap();
        assert_eq!(opt.text, "Quattro Formaggi");
    }

    #[test]
    fn test_edit_by_other_participant_is_not_author() {
        let mut reg = registry_with(&["Margherita"]);
        let id = reg.ids()[0];
        assert_eq!(reg.edit(Phase::Open, BOB, id, "Hawaii"), Err(RoomError::NotAuthor));
    }

    #[test]
    fn test_edit_with_blank_text_reports_authorship_before_text() {
        let mut reg = registry_with(&["Margherita"]);
        let id = reg.ids()[0];

        assert_eq!(reg.edit(Phase::Open, BOB, id, "   "), Err(RoomError::NotAuthor));
        assert_eq!(
            reg.edit(Phase::Open, ALICE, OptionId(u64::MAX), ""),
            Err(RoomError::UnknownOption(OptionId(u64::MAX)))
        );
        assert!(matches!(
            reg.edit(Phase::Open, ALICE, id, "  "),
            Err(RoomError::InvalidInput(_))
        ));
        assert_eq!(reg.get(id).unwrap().text, "Margherita");
    }

    #[test]
    fn test_edit_after_voting_started_is_invalid_phase_even_for_author() {
        let mut reg = registry_with(&["Margherita"]);
        let id = reg.ids()[0];
        for who in [ALICE, BOB] {
            let err = reg.edit(Phase::Voting, who, id, "Hawaii").unwrap_err();
            assert!(matches!(err, RoomError::InvalidPhase { .. }));
            let err = reg.delete(Phase::Resolved, who, id).unwrap_err();
            assert!(matches!(err, RoomError::InvalidPhase { .. }));
        }
    }

    #[test]
    fn test_delete_keeps_remaining_order() {
        let mut reg = registry_with(&["A", "B", "C"]);
        let ids = reg.ids();
        let removed = reg.delete(Phase::Open, ALICE, ids[1]).unwrap();
        assert_eq!(removed.text, "B");
        assert_eq!(reg.ids(), vec![ids[0], ids[2]]);
    }

    #[test]
    fn test_delete_unknown_option() {
        let mut reg = registry_with(&["A"]);
        let err = reg.delete(Phase::Open, ALICE, OptionId(u64::MAX)).unwrap_err();
        assert_eq!(err, RoomError::UnknownOption(OptionId(u64::MAX)));
    }

    #[test]
    fn test_ids_unique_across_registries() {
        let a = registry_with(&["x"]);
        let b = registry_with(&["x"]);
        assert_ne!(a.ids()[0], b.ids()[0]);
    }

    #[test]
    fn test_shuffled_ids_is_a_permutation() {
        let reg = registry_with(&["A", "B", "C", "D", "E"]);
        let mut shuffled = reg.shuffled_ids();
        shuffled.sort();
        let mut ids = reg.ids();
        ids.sort();
        assert_eq!(shuffled, ids);
    }
}
