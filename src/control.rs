//! Shared run-control flags read at every suspension point.
//!
//! Mode and play state are user-settable at any time and are not owned by any
//! single stage, so they live behind a `watch` channel: one writer surface,
//! any number of readers, and waiters can observe changes without restarting
//! their wait.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// How stage transitions are paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Transitions occur on fixed timers while playing.
    Auto,
    /// Transitions occur only on explicit advance signals.
    Manual,
}

/// Snapshot of the control flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub mode: Mode,
    pub playing: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            playing: false,
        }
    }
}

/// Handle to the shared control flags. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Controls {
    tx: Arc<watch::Sender<ControlState>>,
}

impl Controls {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> ControlState {
        *self.tx.borrow()
    }

    pub fn mode(&self) -> Mode {
        self.tx.borrow().mode
    }

    pub fn is_playing(&self) -> bool {
        self.tx.borrow().playing
    }

    pub fn set_mode(&self, mode: Mode) {
        self.tx.send_modify(|state| state.mode = mode);
    }

    pub fn set_playing(&self, playing: bool) {
        self.tx.send_modify(|state| state.playing = playing);
    }

    /// Flip play/pause and return the new value.
    pub fn toggle_playing(&self) -> bool {
        let mut now = false;
        self.tx.send_modify(|state| {
            state.playing = !state.playing;
            now = state.playing;
        });
        now
    }

    /// Subscribe for change notifications (used by waiters in the gate).
    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.tx.subscribe()
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new()
    }
}
