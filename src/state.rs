//! Observable snapshot of a simulation run.
//!
//! `SimulationState` is single-writer (the run task), multi-reader
//! (presentation). Readers take cloned snapshots; mutations happen only
//! between suspension points, so a snapshot is always stage-consistent.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

/// Rolling activity-log capacity.
pub const LOG_CAPACITY: usize = 5;

/// Length of the illustrative per-token embedding vector.
pub const EMBEDDING_DIM: usize = 8;

/// Display color tag cycled across tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTag {
    Sky,
    Amber,
    Rose,
    Emerald,
    Violet,
}

impl ColorTag {
    const PALETTE: [ColorTag; 5] = [
        ColorTag::Sky,
        ColorTag::Amber,
        ColorTag::Rose,
        ColorTag::Emerald,
        ColorTag::Violet,
    ];

    pub fn for_index(index: usize) -> Self {
        Self::PALETTE[index % Self::PALETTE.len()]
    }
}

/// One simulated sub-word unit. Created in a batch during tokenization and
/// frozen afterward until the next run resets the list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub index: usize,
    pub text: String,
    pub id: u32,
    pub color: ColorTag,
    /// Illustrative only; not a real embedding.
    pub embedding: Vec<f32>,
}

impl Token {
    pub fn synthesize(index: usize, text: &str, rng: &mut impl Rng) -> Self {
        Self {
            index,
            text: text.to_string(),
            id: synthetic_id(text),
            color: ColorTag::for_index(index),
            embedding: (0..EMBEDDING_DIM).map(|_| rng.gen_range(-1.0..1.0)).collect(),
        }
    }
}

/// Deterministic vocabulary-style id derived from the token text.
fn synthetic_id(text: &str) -> u32 {
    text.bytes()
        .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619))
        % 50257
}

/// One ranked candidate for the next output chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub text: String,
    pub score: f32,
    pub probability: f32,
}

/// One timestamped activity-log message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// The mutable snapshot consumed by observers. Reset wholesale when a run
/// starts or is reset; populated incrementally as stages execute.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationState {
    pub input: String,
    pub tokens: Vec<Token>,
    /// Square matrix, size = token count, cells in [0, 1).
    pub attention: Vec<Vec<f32>>,
    /// Ranked candidate-next-token entries, highest probability first.
    pub candidates: Vec<Candidate>,
    pub output: String,
    pub log: VecDeque<LogEntry>,
    /// Set when the external stream fails; never set on cancellation. A run
    /// with a failure recorded must not look finished.
    pub failure: Option<String>,
}

impl SimulationState {
    pub fn clear(&mut self) {
        *self = SimulationState::default();
    }

    /// Append a log message, evicting the oldest past capacity.
    pub fn push_log(&mut self, message: impl Into<String>) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(LogEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Shared handle around the state: one writer (the run task), many readers.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<SimulationState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloned point-in-time snapshot for observers.
    pub fn snapshot(&self) -> SimulationState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&SimulationState) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut SimulationState) -> R) -> R {
        f(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner))
    }
}
