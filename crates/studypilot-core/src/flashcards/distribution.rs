use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use studypilot_schema::CardType;

/// Share of a batch each card type should take.
pub const CARD_TYPE_WEIGHTS: [(CardType, f64); 7] = [
    (CardType::Definition, 0.20),
    (CardType::Why, 0.15),
    (CardType::How, 0.15),
    (CardType::Compare, 0.10),
    (CardType::Trap, 0.15),
    (CardType::Example, 0.10),
    (CardType::Exam, 0.15),
];

/// Types used to fill a short distribution.
const PRIORITY_TYPES: [CardType; 3] = [CardType::Definition, CardType::Trap, CardType::Exam];

/// Balanced multiset of `n` card types in random order.
pub fn distribute(n: usize) -> Vec<CardType> {
    distribute_with_rng(n, &mut rand::thread_rng())
}

pub fn distribute_with_rng<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<CardType> {
    if n == 0 {
        return Vec::new();
    }

    let mut plan: Vec<CardType> = CARD_TYPE_WEIGHTS
        .iter()
        .flat_map(|(card_type, weight)| {
            let count = ((n as f64 * weight).floor() as usize).max(1);
            std::iter::repeat(*card_type).take(count)
        })
        .collect();

    plan.shuffle(rng);
    plan.truncate(n);
    while plan.len() < n {
        if let Some(pick) = PRIORITY_TYPES.choose(rng) {
            plan.push(*pick);
        }
    }
    plan.shuffle(rng);
    plan
}

/// Per-type counts of a plan.
pub fn type_counts(plan: &[CardType]) -> BTreeMap<CardType, usize> {
    let mut counts = BTreeMap::new();
    for card_type in plan {
        *counts.entry(*card_type).or_insert(0) += 1;
    }
    counts
}
