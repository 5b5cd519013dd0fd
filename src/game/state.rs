use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn pair_count(self) -> usize {
        match self {
            Difficulty::Easy => 6,
            Difficulty::Medium => 8,
            Difficulty::Hard => 10,
        }
    }

    pub fn card_count(self) -> usize {
        self.pair_count() * 2
    }

    /// Columns used to lay the deck out on a board.
    pub fn grid_columns(self) -> usize {
        match self {
            Difficulty::Easy | Difficulty::Medium => 4,
            Difficulty::Hard => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: u32,
    /// Pair key; exactly two cards in a deck share it.
    #[serde(rename = "type")]
    pub kind: String,
    pub matched: bool,
    pub flipped: bool,
}

impl Card {
    pub fn new(id: u32, kind: impl Into<String>) -> Self {
        Card {
            id,
            kind: kind.into(),
            matched: false,
            flipped: false,
        }
    }

    pub fn is_selectable(&self) -> bool {
        !self.matched && !self.flipped
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GameStatus {
    #[default]
    NotStarted,
    Active,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchPhase {
    Idle,
    OneSelected,
    Resolving,
}
