//! The execution gate: a reusable suspend/resume primitive pacing stage
//! transitions.
//!
//! A driving task calls [`ExecutionGate::pace`] to declare "I want to pause
//! for `delay` before the next visible step". What actually happens depends
//! on three independently toggleable conditions read at every suspension
//! point:
//!
//! - cancelled (before or during the wait) → `Err(Cancelled)`, always
//!   propagated, never swallowed here
//! - auto mode and playing → suspend for exactly `delay`
//! - auto mode, paused → poll in fixed increments until play resumes or
//!   cancellation lands, then run the full delay
//! - manual mode → suspend until one explicit advance signal is delivered
//!   through a fresh one-shot channel; at most one wait is pending at a time
//!   and delivering an advance with none pending is a no-op
//!
//! A pending manual wait also resolves when the mode flips back to auto: the
//! waiter subscribes to control changes and re-enters the auto path, so a
//! run can never get stuck holding a manual wait nobody will step.

use crate::cancel::RunToken;
use crate::control::{Controls, Mode};
use crate::errors::Cancelled;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;

/// Re-check interval while paused mid-autoplay.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of one manual suspension.
enum ManualOutcome {
    /// An advance signal was delivered.
    Advanced,
    /// Mode changed away from manual; re-evaluate from the top.
    ModeChanged,
}

pub struct ExecutionGate {
    controls: Controls,
    /// Single-slot rendezvous for the pending manual wait, if any.
    pending: Mutex<Option<oneshot::Sender<()>>>,
}

impl ExecutionGate {
    pub fn new(controls: Controls) -> Self {
        Self {
            controls,
            pending: Mutex::new(None),
        }
    }

    /// Deliver one advance signal to the pending manual wait.
    ///
    /// Returns `true` if a wait was resolved; delivering with none pending is
    /// a defined no-op and returns `false`.
    pub fn advance(&self) -> bool {
        let sender = self.take_pending();
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// True while a manual wait is suspended on the gate.
    pub fn is_waiting(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Suspend before the next visible step (gated milestone).
    pub async fn pace(&self, token: &RunToken, delay: Duration) -> Result<(), Cancelled> {
        loop {
            token.check()?;
            let ctl = self.controls.snapshot();
            match ctl.mode {
                Mode::Manual => match self.wait_for_advance(token).await? {
                    ManualOutcome::Advanced => return Ok(()),
                    ManualOutcome::ModeChanged => continue,
                },
                Mode::Auto if ctl.playing => {
                    self.timed_wait(token, delay).await?;
                    return Ok(());
                }
                // Paused mid-autoplay: poll, then re-read the flags.
                Mode::Auto => self.timed_wait(token, POLL_INTERVAL).await?,
            }
        }
    }

    /// Suspend before a sub-step. In manual mode this returns immediately
    /// with no gating at all: manual stepping only gates the big milestones,
    /// so token appends and per-chunk sub-stages flow through instantly.
    pub async fn pace_minor(&self, token: &RunToken, delay: Duration) -> Result<(), Cancelled> {
        loop {
            token.check()?;
            let ctl = self.controls.snapshot();
            if ctl.mode == Mode::Manual {
                return Ok(());
            }
            if ctl.playing {
                self.timed_wait(token, delay).await?;
                return Ok(());
            }
            self.timed_wait(token, POLL_INTERVAL).await?;
        }
    }

    /// Sleep for `delay`, cut short only by cancellation.
    async fn timed_wait(&self, token: &RunToken, delay: Duration) -> Result<(), Cancelled> {
        tokio::select! {
            _ = sleep(delay) => token.check(),
            _ = token.cancelled() => Err(Cancelled),
        }
    }

    async fn wait_for_advance(&self, token: &RunToken) -> Result<ManualOutcome, Cancelled> {
        let (tx, rx) = oneshot::channel();
        // Replacing a stale sender drops it; exactly one wait is pending.
        *self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);

        let mut ctl_rx = self.controls.subscribe();
        let outcome = tokio::select! {
            res = rx => match res {
                Ok(()) => Ok(ManualOutcome::Advanced),
                // Sender dropped without a signal; re-evaluate.
                Err(_) => Ok(ManualOutcome::ModeChanged),
            },
            _ = token.cancelled() => Err(Cancelled),
            res = ctl_rx.wait_for(|c| c.mode == Mode::Auto) => match res {
                Ok(_) => Ok(ManualOutcome::ModeChanged),
                // Controls torn down: nothing can ever step us again.
                Err(_) => Err(Cancelled),
            },
        };

        // Clear the slot so a late advance() is a no-op.
        self.take_pending();
        outcome
    }

    fn take_pending(&self) -> Option<oneshot::Sender<()>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::RunRegistry;
    use std::sync::Arc;

    fn gate_with(mode: Mode, playing: bool) -> (Arc<ExecutionGate>, Controls, RunRegistry) {
        let controls = Controls::new();
        controls.set_mode(mode);
        controls.set_playing(playing);
        let gate = Arc::new(ExecutionGate::new(controls.clone()));
        (gate, controls, RunRegistry::new())
    }

    async fn until_waiting(gate: &ExecutionGate) {
        while !gate.is_waiting() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn auto_playing_waits_exactly_the_delay() {
        let (gate, _controls, registry) = gate_with(Mode::Auto, true);
        let token = registry.issue();

        let start = tokio::time::Instant::now();
        gate.pace(&token, Duration::from_millis(500)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_timed_wait() {
        let (gate, _controls, registry) = gate_with(Mode::Auto, true);
        let token = registry.issue();

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.pace(&token, Duration::from_secs(3600)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.cancel_current();

        let result = waiter.await.unwrap();
        assert_eq!(result, Err(Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_fails_before_waiting() {
        let (gate, _controls, registry) = gate_with(Mode::Auto, true);
        let token = registry.issue();
        registry.cancel_current();

        let start = tokio::time::Instant::now();
        let result = gate.pace(&token, Duration::from_secs(10)).await;
        assert_eq!(result, Err(Cancelled));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_autoplay_polls_until_resumed() {
        let (gate, controls, registry) = gate_with(Mode::Auto, false);
        let token = registry.issue();

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.pace(&token, Duration::from_millis(200)).await }
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!waiter.is_finished(), "paused wait must not complete");

        controls.set_playing(true);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn manual_wait_resolves_on_advance() {
        let (gate, _controls, registry) = gate_with(Mode::Manual, false);
        let token = registry.issue();

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.pace(&token, Duration::from_secs(10)).await }
        });

        until_waiting(&gate).await;
        assert!(gate.advance());
        waiter.await.unwrap().unwrap();
        assert!(!gate.is_waiting());
    }

    #[tokio::test]
    async fn advance_with_nothing_pending_is_a_noop() {
        let (gate, _controls, _registry) = gate_with(Mode::Manual, false);
        assert!(!gate.advance());
        assert!(!gate.advance());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_wait_ignores_play_toggle() {
        let (gate, controls, registry) = gate_with(Mode::Manual, false);
        let token = registry.issue();

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.pace(&token, Duration::from_millis(50)).await }
        });

        until_waiting(&gate).await;
        controls.set_playing(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!waiter.is_finished(), "playing has no effect in manual mode");

        assert!(gate.advance());
        waiter.await.unwrap().unwrap();
    }

    // The documented "stuck" bug class: a pending manual wait must still
    // resolve when the user flips back to auto, without an advance signal.
    #[tokio::test(start_paused = true)]
    async fn manual_wait_resolves_when_mode_flips_to_auto() {
        let (gate, controls, registry) = gate_with(Mode::Manual, false);
        let token = registry.issue();

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.pace(&token, Duration::from_millis(100)).await }
        });

        until_waiting(&gate).await;
        controls.set_mode(Mode::Auto);
        controls.set_playing(true);

        waiter.await.unwrap().unwrap();
        assert!(!gate.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_manual_wait() {
        let (gate, _controls, registry) = gate_with(Mode::Manual, false);
        let token = registry.issue();

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.pace(&token, Duration::from_secs(10)).await }
        });

        until_waiting(&gate).await;
        registry.cancel_current();
        assert_eq!(waiter.await.unwrap(), Err(Cancelled));
        assert!(!gate.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn minor_pace_is_skipped_entirely_in_manual_mode() {
        let (gate, _controls, registry) = gate_with(Mode::Manual, false);
        let token = registry.issue();

        let start = tokio::time::Instant::now();
        gate.pace_minor(&token, Duration::from_secs(10)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(!gate.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn minor_pace_is_timed_in_auto_mode() {
        let (gate, _controls, registry) = gate_with(Mode::Auto, true);
        let token = registry.issue();

        let start = tokio::time::Instant::now();
        gate.pace_minor(&token, Duration::from_millis(120)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(120));
    }

    #[tokio::test(start_paused = true)]
    async fn minor_pace_respects_pause_in_auto_mode() {
        let (gate, controls, registry) = gate_with(Mode::Auto, false);
        let token = registry.issue();

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.pace_minor(&token, Duration::from_millis(50)).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!waiter.is_finished());
        controls.set_playing(true);
        waiter.await.unwrap().unwrap();
    }
}
