//! Illustrative numeric synthesis for the visualized stages.
//!
//! None of this is real model math. The values only need the right shape:
//! a square attention matrix in [0, 1), a fixed-size ranked candidate list
//! with the actual chunk on top, plausible-looking scores.

use crate::state::Candidate;
use rand::Rng;

/// Words longer than this many characters are split for visual variety.
const SPLIT_THRESHOLD: usize = 5;

/// Character offset at which long words are split into two sub-tokens.
const SPLIT_AT: usize = 3;

/// Number of entries in the ranked candidate list.
pub const CANDIDATE_COUNT: usize = 4;

/// Filler texts for the 2nd..4th candidate slots.
const FILLERS: [&str; CANDIDATE_COUNT - 1] = ["the", "and", "of"];

/// Split input text into display tokens: one per whitespace-delimited word,
/// with words longer than five characters split into exactly two sub-tokens
/// after the third character.
pub fn split_words(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in input.split_whitespace() {
        if word.chars().count() > SPLIT_THRESHOLD {
            let cut = word
                .char_indices()
                .nth(SPLIT_AT)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            out.push(word[..cut].to_string());
            out.push(word[cut..].to_string());
        } else {
            out.push(word.to_string());
        }
    }
    out
}

/// An n×n matrix of pseudo-random weights, every cell in [0, 1).
pub fn attention_matrix(n: usize, rng: &mut impl Rng) -> Vec<Vec<f32>> {
    (0..n)
        .map(|_| (0..n).map(|_| rng.r#gen::<f32>()).collect())
        .collect()
}

/// Ranked next-token candidates for one generated chunk: the chunk itself on
/// top, fillers below, scores and probabilities strictly descending.
pub fn rank_candidates(chunk: &str, rng: &mut impl Rng) -> Vec<Candidate> {
    let mut score = rng.gen_range(7.5..9.8);
    let mut probability = rng.gen_range(0.55..0.85);

    let mut out = Vec::with_capacity(CANDIDATE_COUNT);
    out.push(Candidate {
        text: chunk.to_string(),
        score,
        probability,
    });
    for filler in FILLERS {
        score -= rng.gen_range(0.8..1.6);
        probability *= rng.gen_range(0.25..0.6);
        out.push(Candidate {
            text: filler.to_string(),
            score,
            probability,
        });
    }
    out
}
