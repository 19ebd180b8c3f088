//! Run lifetime tracking via a generation counter.
//!
//! Exactly one run is logically current at a time. The registry stamps each
//! run with a generation number; issuing a new token (or cancelling outright)
//! bumps the counter, which invalidates every older token. Suspension points
//! ask "is my generation still the current one" instead of reading a shared
//! boolean, so a superseded run's late-arriving mutation can never race a new
//! run's start.

use crate::errors::Cancelled;
use std::sync::Arc;
use tokio::sync::watch;

/// Issues and invalidates run tokens.
#[derive(Debug, Clone)]
pub struct RunRegistry {
    current: Arc<watch::Sender<u64>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            current: Arc::new(tx),
        }
    }

    /// Invalidate any outstanding token and issue a fresh one.
    pub fn issue(&self) -> RunToken {
        let mut generation = 0;
        self.current.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        RunToken {
            generation,
            current: self.current.subscribe(),
        }
    }

    /// Invalidate any outstanding token without issuing a new one.
    pub fn cancel_current(&self) {
        self.current.send_modify(|g| *g += 1);
    }

    pub fn generation(&self) -> u64 {
        *self.current.borrow()
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Represents one run's lifetime. Held by the orchestrator task that owns the
/// run; the gate only observes the cancelled flag.
#[derive(Debug, Clone)]
pub struct RunToken {
    generation: u64,
    current: watch::Receiver<u64>,
}

impl RunToken {
    pub fn is_cancelled(&self) -> bool {
        *self.current.borrow() != self.generation
    }

    /// Fail fast at a checkpoint.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once this token is no longer current. Used in `select!` to
    /// cut timed waits short.
    pub async fn cancelled(&self) {
        let mut rx = self.current.clone();
        let generation = self.generation;
        // A dropped registry also means nothing will ever run again.
        let _ = rx.wait_for(|g| *g != generation).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_token_is_live() {
        let registry = RunRegistry::new();
        let token = registry.issue();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn issuing_a_new_token_cancels_the_previous_one() {
        let registry = RunRegistry::new();
        let first = registry.issue();
        let second = registry.issue();
        assert!(first.is_cancelled());
        assert!(first.check().is_err());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn cancel_current_invalidates_without_issuing() {
        let registry = RunRegistry::new();
        let token = registry.issue();
        registry.cancel_current();
        assert!(token.is_cancelled());
    }

    #[test]
    fn generations_are_monotonic() {
        let registry = RunRegistry::new();
        let before = registry.generation();
        registry.issue();
        registry.cancel_current();
        assert_eq!(registry.generation(), before + 2);
    }

    #[tokio::test]
    async fn cancelled_future_resolves_on_invalidation() {
        let registry = RunRegistry::new();
        let token = registry.issue();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.cancel_current();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_future_stays_pending_while_live() {
        let registry = RunRegistry::new();
        let token = registry.issue();
        let pending =
            tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(pending.is_err(), "live token must not report cancellation");
    }
}
