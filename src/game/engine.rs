use super::state::{Card, MatchPhase};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipOutcome {
    /// Locked board, unknown id, or a card that is already face up.
    Ignored,
    Continue,
    Match { all_matched: bool },
    /// Both cards stay face up until `resolve_mismatch`.
    Mismatch,
}

impl FlipOutcome {
    pub fn completes_turn(self) -> bool {
        matches!(self, FlipOutcome::Match { .. } | FlipOutcome::Mismatch)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MatchEngine {
    cards: Vec<Card>,
    first_choice: Option<usize>,
    second_choice: Option<usize>,
    lock_input: bool,
    completion_reported: bool,
}

impl MatchEngine {
    pub fn new(cards: Vec<Card>) -> Self {
        MatchEngine {
            cards,
            ..Self::default()
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn is_locked(&self) -> bool {
        self.lock_input
    }

    pub fn phase(&self) -> MatchPhase {
        match (self.first_choice, self.second_choice) {
            (Some(_), Some(_)) => MatchPhase::Resolving,
            (Some(_), None) => MatchPhase::OneSelected,
            _ => MatchPhase::Idle,
        }
    }

    pub fn first_choice(&self) -> Option<&Card> {
        self.first_choice.map(|idx| &self.cards[idx])
    }

    pub fn second_choice(&self) -> Option<&Card> {
        self.second_choice.map(|idx| &self.cards[idx])
    }

    pub fn matched_pairs(&self) -> usize {
        self.cards.iter().filter(|card| card.matched).count() / 2
    }

    pub fn all_matched(&self) -> bool {
        !self.cards.is_empty() && self.cards.iter().all(|card| card.matched)
    }

    pub fn select(&mut self, card_id: u32) -> FlipOutcome {
        if self.lock_input {
            return FlipOutcome::Ignored;
        }
        let Some(index) = self.cards.iter().position(|card| card.id == card_id) else {
            return FlipOutcome::Ignored;
        };
        if !self.cards[index].is_selectable() {
            return FlipOutcome::Ignored;
        }

        self.cards[index].flipped = true;
        let Some(first) = self.first_choice else {
            self.first_choice = Some(index);
            return FlipOutcome::Continue;
        };

        self.second_choice = Some(index);
        self.lock_input = true;

        if self.cards[first].kind == self.cards[index].kind {
            self.cards[first].matched = true;
            self.cards[index].matched = true;
            self.clear_choices();
            FlipOutcome::Match {
                all_matched: self.all_matched(),
            }
        } else {
            FlipOutcome::Mismatch
        }
    }

    /// Turns a pending mismatched pair face down again and unlocks input.
    /// Returns false when there is nothing to resolve.
    pub fn resolve_mismatch(&mut self) -> bool {
        if self.phase() != MatchPhase::Resolving {
            return false;
        }
        for card in self.cards.iter_mut() {
            if card.flipped && !card.matched {
                card.flipped = false;
            }
        }
        self.clear_choices();
        true
    }

    /// True exactly once, the first time it is called with every card matched.
    pub fn take_completion(&mut self) -> bool {
        if self.completion_reported || !self.all_matched() {
            return false;
        }
        self.completion_reported = true;
        true
    }

    fn clear_choices(&mut self) {
        self.first_choice = None;
        self.second_choice = None;
        self.lock_input = false;
    }
}
