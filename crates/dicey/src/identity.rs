//! Identity hook: who is making a request.
//!
//! Dicey doesn't authenticate anyone. Whatever sits in front of it (an
//! auth provider, a session cookie, a signed token) turns the request's
//! token into a stable [`ParticipantId`] by implementing
//! [`IdentitySource`].

use std::collections::HashMap;

use dicey_protocol::ParticipantId;

use crate::DiceyError;

/// Maps a request token to a participant.
///
/// # Example
///
/// ```rust
/// use dicey::{DiceyError, IdentitySource};
/// use dicey_protocol::ParticipantId;
///
/// /// Treats the token as the participant number. Development only.
/// struct NumericTokens;
///
/// impl IdentitySource for NumericTokens {
///     async fn identify(&self, token: &str) -> Result<ParticipantId, DiceyError> {
///         token
///             .parse()
///             .map(ParticipantId)
///             .map_err(|_| DiceyError::Identity("token must be a number".into()))
///     }
/// }
/// ```
pub trait IdentitySource: Send + Sync + 'static {
    fn identify(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<ParticipantId, DiceyError>> + Send;
}

/// A fixed token table. Handy for demos and tests.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, ParticipantId>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: impl Into<String>, id: ParticipantId) -> Self {
        self.tokens.insert(token.into(), id);
        self
    }
}

impl IdentitySource for TokenTable {
    async fn identify(&self, token: &str) -> Result<ParticipantId, DiceyError> {
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| DiceyError::Identity("unknown token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_table_resolves_known_tokens() {
        let table = TokenTable::new()
            .with("alice", ParticipantId(1))
            .with("bob", ParticipantId(2));

        assert_eq!(table.identify("bob").await.unwrap(), ParticipantId(2));
        assert!(matches!(
            table.identify("mallory").await,
            Err(DiceyError::Identity(_))
        ));
    }
}
