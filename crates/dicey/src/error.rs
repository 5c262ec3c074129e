//! Unified error type for Dicey.

use dicey_protocol::{ErrorKind, ProtocolError};
use dicey_room::RoomError;

/// Top-level error wrapping every crate-specific error.
#[derive(Debug, thiserror::Error)]
pub enum DiceyError {
    /// Encode/decode failures and malformed identifiers.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room rejected the request.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The identity source did not recognise the caller.
    #[error("identity rejected: {0}")]
    Identity(String),
}

impl DiceyError {
    /// The wire-level kind reported to the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            // A malformed code can't name any room.
            Self::Protocol(ProtocolError::InvalidRoomCode(_)) => ErrorKind::NotFound,
            Self::Protocol(_) => ErrorKind::BadRequest,
            Self::Room(e) => e.kind(),
            Self::Identity(_) => ErrorKind::Unauthorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicey_protocol::RoomCode;

    #[test]
    fn test_from_room_error_keeps_kind() {
        let err: DiceyError = RoomError::AlreadyVoted.into();
        assert!(matches!(err, DiceyError::Room(_)));
        assert_eq!(err.kind(), ErrorKind::AlreadyVoted);
    }

    #[test]
    fn test_from_protocol_error() {
        let err: DiceyError = ProtocolError::InvalidMessage("bad".into()).into();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_invalid_room_code_reports_not_found() {
        let err: DiceyError = RoomCode::parse("??").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_identity_error_is_unauthorized() {
        let err = DiceyError::Identity("expired".into());
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
