//! Community directory port: independent-game submissions and newsletter sign-ups.

use crate::domain::error::SquirrelError;
use crate::domain::game::{IndependentGame, NewIndependentGame, NewsletterEntry};

pub trait DirectoryPort {
    /// Every submission, verified or not, ordered by id.
    fn list_independent_games(&self) -> Result<Vec<IndependentGame>, SquirrelError>;

    /// Unique on game name and link URL.
    fn submit_independent_game(
        &self,
        game: &NewIndependentGame,
    ) -> Result<IndependentGame, SquirrelError>;

    /// Unique on address.
    fn subscribe_newsletter(&self, address: &str) -> Result<NewsletterEntry, SquirrelError>;
}
