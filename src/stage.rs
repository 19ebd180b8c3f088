//! Canonical pipeline stages and their descriptive metadata.
//!
//! The `Stage` enum is the externally visible state of a simulation run. The
//! derived `Ord` gives the canonical order with `Idle` first and `Finished`
//! last; the orchestrator only ever moves forward through it, except the
//! explicit reset back to `Idle` and the `LogitsCalc -> SamplingDecoding ->
//! Detokenization` cycle that repeats once per generated chunk.

use serde::{Deserialize, Serialize};

/// One named step of the simulated inference pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    InputGuard,
    Tokenization,
    EmbeddingLookup,
    PositionalEncoding,
    SelfAttention,
    FeedForward,
    LogitsCalc,
    SamplingDecoding,
    Detokenization,
    Finished,
}

/// Immutable per-stage display data. Created once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageMetadata {
    pub title: &'static str,
    pub description: &'static str,
    pub formula: &'static str,
    pub analogy: &'static str,
}

impl Stage {
    /// Every stage in canonical order.
    pub const ALL: [Stage; 11] = [
        Stage::Idle,
        Stage::InputGuard,
        Stage::Tokenization,
        Stage::EmbeddingLookup,
        Stage::PositionalEncoding,
        Stage::SelfAttention,
        Stage::FeedForward,
        Stage::LogitsCalc,
        Stage::SamplingDecoding,
        Stage::Detokenization,
        Stage::Finished,
    ];

    /// Zero-based position in the canonical order.
    pub fn position(self) -> usize {
        self as usize
    }

    /// True for the two states from which a fresh run may be started
    /// without an explicit reset.
    pub fn can_start(self) -> bool {
        matches!(self, Stage::Idle | Stage::Finished)
    }

    /// Display metadata. Total: the enumeration is closed, so there is no
    /// error case.
    pub fn metadata(self) -> &'static StageMetadata {
        match self {
            Stage::Idle => &StageMetadata {
                title: "Idle",
                description: "Waiting for a prompt. No run is active.",
                formula: "-",
                analogy: "An assembly line with the power switched off.",
            },
            Stage::InputGuard => &StageMetadata {
                title: "Input Guard",
                description: "The raw prompt is screened before any processing happens.",
                formula: "accept(x) ∈ {true, false}",
                analogy: "A doorman checking the guest list before letting anyone in.",
            },
            Stage::Tokenization => &StageMetadata {
                title: "Tokenization",
                description: "The prompt is chopped into sub-word units the model can count.",
                formula: "x → [t₁, t₂, …, tₙ]",
                analogy: "Cutting a sentence into fridge-magnet word tiles.",
            },
            Stage::EmbeddingLookup => &StageMetadata {
                title: "Embedding Lookup",
                description: "Each token id is mapped to a dense vector of learned features.",
                formula: "E[tᵢ] = eᵢ ∈ ℝᵈ",
                analogy: "Looking up each word's coordinates in a giant atlas of meaning.",
            },
            Stage::PositionalEncoding => &StageMetadata {
                title: "Positional Encoding",
                description: "Order information is mixed into the embeddings so position matters.",
                formula: "hᵢ = eᵢ + PE(i)",
                analogy: "Numbering the word tiles so they can't be shuffled unnoticed.",
            },
            Stage::SelfAttention => &StageMetadata {
                title: "Self-Attention",
                description: "Every token scores its relevance to every other token.",
                formula: "softmax(QKᵀ/√d)·V",
                analogy: "Everyone in a meeting deciding whom to listen to, all at once.",
            },
            Stage::FeedForward => &StageMetadata {
                title: "Feed-Forward",
                description: "Each position is transformed independently through a small network.",
                formula: "FFN(h) = W₂·act(W₁h)",
                analogy: "Each tile gets a moment alone with a specialist consultant.",
            },
            Stage::LogitsCalc => &StageMetadata {
                title: "Logits",
                description: "The model scores every vocabulary entry as the possible next token.",
                formula: "z = W·h_final",
                analogy: "A talent show jury holding up scores for every contestant.",
            },
            Stage::SamplingDecoding => &StageMetadata {
                title: "Sampling",
                description: "One candidate is drawn from the score distribution.",
                formula: "tₙ₊₁ ~ softmax(z/T)",
                analogy: "Spinning a weighted raffle drum and pulling one ticket.",
            },
            Stage::Detokenization => &StageMetadata {
                title: "Detokenization",
                description: "The chosen token is stitched back into readable text.",
                formula: "[t₁ … tₖ] → text",
                analogy: "Gluing the winning tile onto the growing sentence.",
            },
            Stage::Finished => &StageMetadata {
                title: "Finished",
                description: "The stream is exhausted and the output is complete.",
                formula: "-",
                analogy: "The assembly line rolls to a stop with the product boxed.",
            },
        }
    }

    pub fn title(self) -> &'static str {
        self.metadata().title
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}
