//! Room configuration and creation parameters.

use dicey_activity::IdleCheckConfig;
use dicey_protocol::TiebreakMethod;
use tracing::warn;

use crate::RoomError;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Limits and defaults shared by every room a manager creates.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Used when a room is created without an explicit cap.
    pub default_max_participants: usize,

    /// Largest cap a creator may ask for.
    pub max_participants_cap: usize,

    /// Maximum option text length, in characters, after trimming.
    pub max_option_len: usize,

    pub max_title_len: usize,

    pub max_description_len: usize,

    /// Method used when an idle check has to break a tie on its own.
    pub default_tiebreak: TiebreakMethod,

    /// Idle detection for the room actor.
    pub idle: IdleCheckConfig,

    /// Bounded command channel size per room actor.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_max_participants: 10,
            max_participants_cap: 100,
            max_option_len: 100,
            max_title_len: 100,
            max_description_len: 500,
            default_tiebreak: TiebreakMethod::Dice,
            idle: IdleCheckConfig::default(),
            command_buffer: 64,
        }
    }
}

impl RoomConfig {
    /// Smallest meaningful room: a creator and one other voter.
    pub const MIN_PARTICIPANTS: usize = 2;

    /// Clamps values that would make rooms unusable.
    pub fn validated(mut self) -> Self {
        if self.max_participants_cap < Self::MIN_PARTICIPANTS {
            warn!(
                cap = self.max_participants_cap,
                "max_participants_cap below minimum, clamping"
            );
            self.max_participants_cap = Self::MIN_PARTICIPANTS;
        }
        let clamped = self
            .default_max_participants
            .clamp(Self::MIN_PARTICIPANTS, self.max_participants_cap);
        if clamped != self.default_max_participants {
            warn!(
                requested = self.default_max_participants,
                clamped, "default_max_participants out of range, clamping"
            );
            self.default_max_participants = clamped;
        }
        if self.command_buffer == 0 {
            self.command_buffer = 1;
        }
        self.max_option_len = self.max_option_len.max(1);
        self.max_title_len = self.max_title_len.max(1);
        self.idle = self.idle.validated();
        self
    }
}

// ---------------------------------------------------------------------------
// NewRoom
// ---------------------------------------------------------------------------

/// What a creator asks for when opening a room.
#[derive(Debug, Clone, Default)]
pub struct NewRoom {
    pub title: String,
    pub description: Option<String>,
    pub max_participants: Option<usize>,
}

/// `NewRoom` after trimming and limit checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidRoom {
    pub title: String,
    pub description: Option<String>,
    pub max_participants: usize,
}

impl NewRoom {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub(crate) fn validate(self, config: &RoomConfig) -> Result<ValidRoom, RoomError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(RoomError::InvalidInput("room title is empty".into()));
        }
        if title.chars().count() > config.max_title_len {
            return Err(RoomError::InvalidInput(format!(
                "room title longer than {} characters",
                config.max_title_len
            )));
        }

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(d) = &description {
            if d.chars().count() > config.max_description_len {
                return Err(RoomError::InvalidInput(format!(
                    "description longer than {} characters",
                    config.max_description_len
                )));
            }
        }

        let max_participants = self
            .max_participants
            .unwrap_or(config.default_max_participants);
        if !(RoomConfig::MIN_PARTICIPANTS..=config.max_participants_cap)
            .contains(&max_participants)
        {
            return Err(RoomError::InvalidInput(format!(
                "max participants must be between {} and {}",
                RoomConfig::MIN_PARTICIPANTS,
                config.max_participants_cap
            )));
        }

        Ok(ValidRoom {
            title,
            description,
            max_participants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.default_max_participants, 10);
        assert_eq!(config.max_option_len, 100);
        assert_eq!(config.default_tiebreak, TiebreakMethod::Dice);
    }

    #[test]
    fn test_validated_clamps_default_into_cap() {
        let config = RoomConfig {
            default_max_participants: 500,
            max_participants_cap: 20,
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.default_max_participants, 20);
    }

    #[test]
    fn test_new_room_validate_trims_and_defaults() {
        let room = NewRoom {
            title: "  Pizza Night ".into(),
            description: Some("   ".into()),
            max_participants: None,
        }
        .validate(&RoomConfig::default())
        .unwrap();

        assert_eq!(room.title, "Pizza Night");
        assert_eq!(room.description, None);
        assert_eq!(room.max_participants, 10);
    }

    #[test]
    fn test_new_room_validate_rejects_blank_title() {
        let err = NewRoom::titled("  ").validate(&RoomConfig::default());
        assert!(matches!(err, Err(RoomError::InvalidInput(_))));
    }

    #[test]
    fn test_new_room_validate_rejects_cap_out_of_range() {
        let config = RoomConfig::default();
        for cap in [0, 1, 101] {
            let err = NewRoom {
                max_participants: Some(cap),
                ..NewRoom::titled("Movie")
            }
            .validate(&config);
            assert!(matches!(err, Err(RoomError::InvalidInput(_))), "cap {cap}");
        }
    }

    #[test]
    fn test_new_room_validate_rejects_long_description() {
        let err = NewRoom {
            description: Some("x".repeat(501)),
            ..NewRoom::titled("Movie")
        }
        .validate(&RoomConfig::default());
        assert!(matches!(err, Err(RoomError::InvalidInput(_))));
    }
}
