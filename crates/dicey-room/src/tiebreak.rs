//! Uniform tie breaking.

use dicey_protocol::{OptionId, TieBreakDraw, TiebreakMethod};
use rand::{CryptoRng, Rng};

use crate::RoomError;

/// Picks one winner from a set of tied options.
///
/// Each candidate wins with probability exactly `1/N`. The method is only
/// a label for the presentation layer and never affects the draw.
pub struct TieResolver;

impl TieResolver {
    /// Draws with the thread-local CSPRNG.
    pub fn draw(tied: &[OptionId], method: TiebreakMethod) -> Result<TieBreakDraw, RoomError> {
        Self::draw_with(&mut rand::rng(), tied, method)
    }

    /// Draws with a caller-supplied cryptographically secure generator.
    pub fn draw_with<R>(
        rng: &mut R,
        tied: &[OptionId],
        method: TiebreakMethod,
    ) -> Result<TieBreakDraw, RoomError>
    where
        R: Rng + CryptoRng + ?Sized,
    {
        if tied.is_empty() {
            return Err(RoomError::NoOptions);
        }
        let index = rng.random_range(0..tied.len());
        Ok(TieBreakDraw {
            method,
            winner: tied[index],
            index,
            candidates: tied.len(),
        })
    }
}
