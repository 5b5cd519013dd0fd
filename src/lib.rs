//! Card-matching memory game: deck dealing, turn resolution, game clock and
//! locally persisted high scores, driven from a single UI thread.

pub mod config;
pub mod error;
pub mod game;

pub use config::GameConfig;
pub use error::{GameError, Result};
pub use game::records::{HighScoreRecord, HighScoreStore};
pub use game::session::{GameEvent, GameResult, GameSession};
pub use game::state::{Card, Difficulty, GameStatus, MatchPhase};
