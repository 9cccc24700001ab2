//! Biased random problem selection
//!
//! Most draws come from the player's own tier, but a fixed share is taken
//! from the other tiers so the sequence of questions stays varied. The random
//! source is always passed in, so a seeded generator gives reproducible draws.

use crate::error::GameError;
use crate::question_bank::{Question, QuestionBank};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::Difficulty;
use std::sync::Arc;

/// Probability of restricting a draw to the requested tier.
pub const SAME_TIER_PROBABILITY: f64 = 0.8;

/// Picks one question for `target`.
///
/// With probability [`SAME_TIER_PROBABILITY`] the candidates are the questions
/// of the target tier, otherwise the questions of every other tier. An empty
/// candidate set falls back to the whole bank. The pick within the final set
/// is uniform.
pub fn select<R: Rng + ?Sized>(
    bank: &QuestionBank,
    target: Difficulty,
    rng: &mut R,
) -> Result<Arc<Question>, GameError> {
    if bank.is_empty() {
        return Err(GameError::NoQuestionsAvailable);
    }

    let same_tier = rng.gen_bool(SAME_TIER_PROBABILITY);
    let candidates: Vec<&Arc<Question>> = bank
        .questions()
        .iter()
        .filter(|q| (q.difficulty == target) == same_tier)
        .collect();

    let picked = if candidates.is_empty() {
        bank.questions().choose(rng)
    } else {
        candidates.choose(rng).copied()
    };

    picked.cloned().ok_or(GameError::NoQuestionsAvailable)
}
