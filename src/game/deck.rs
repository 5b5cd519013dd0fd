use rand::Rng;
use rand::seq::SliceRandom;

use super::state::{Card, Difficulty};

pub const SYMBOLS: [&str; 10] = [
    "lightbulb", "brain", "target", "key", "star", "lock", "search", "puzzle", "zap", "eye",
];

pub fn build_deck(difficulty: Difficulty) -> Vec<Card> {
    let mut rng = rand::rng();
    build_deck_with(difficulty, &mut rng)
}

/// Deals `2 * pair_count` cards with ids numbered in deck order.
pub fn build_deck_with<R: Rng + ?Sized>(difficulty: Difficulty, rng: &mut R) -> Vec<Card> {
    let pair_count = difficulty.pair_count();
    debug_assert!(pair_count <= SYMBOLS.len());

    let mut symbol_pool = SYMBOLS.to_vec();
    symbol_pool.shuffle(rng);

    let mut values = Vec::with_capacity(pair_count * 2);
    for symbol in symbol_pool.into_iter().take(pair_count) {
        values.push(symbol);
        values.push(symbol);
    }
    values.shuffle(rng);

    values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| Card::new(idx as u32, value))
        .collect()
}
