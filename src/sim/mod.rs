//! Simulation orchestrator: one end-to-end pipeline walk per run.
//!
//! The orchestrator walks the stage order, mutating the shared
//! [`SimulationState`] and driving the execution gate between every visible
//! step. Exactly one run is logically active at a time: starting a new run
//! cancels the previous one's token before touching any state, and every
//! suspension point re-checks cancellation before the next mutation.

pub mod synth;

use crate::cancel::{RunRegistry, RunToken};
use crate::control::Controls;
use crate::errors::{Cancelled, RunError, SimError};
use crate::gate::ExecutionGate;
use crate::source::{ChunkStream, GenerationRequest, TokenSource};
use crate::stage::Stage;
use crate::state::{SharedState, SimulationState, Token};
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Fixed per-stage delays. Developer-chosen constants, not user settings.
#[derive(Debug, Clone)]
pub struct SimTiming {
    pub input_guard: Duration,
    /// Hold on the tokenization stage after the last token appears.
    pub tokenization: Duration,
    /// Between per-token appends (skipped entirely in manual mode).
    pub per_token: Duration,
    pub embedding_lookup: Duration,
    pub positional_encoding: Duration,
    pub self_attention: Duration,
    pub feed_forward: Duration,
    /// Between the three per-chunk sub-stages (skipped in manual mode).
    pub chunk_step: Duration,
}

impl Default for SimTiming {
    fn default() -> Self {
        Self {
            input_guard: Duration::from_millis(900),
            tokenization: Duration::from_millis(600),
            per_token: Duration::from_millis(120),
            embedding_lookup: Duration::from_millis(1100),
            positional_encoding: Duration::from_millis(1000),
            self_attention: Duration::from_millis(1400),
            feed_forward: Duration::from_millis(1200),
            chunk_step: Duration::from_millis(600),
        }
    }
}

impl SimTiming {
    /// Same delay everywhere. Handy for tests and fast demos.
    pub fn uniform(delay: Duration) -> Self {
        Self {
            input_guard: delay,
            tokenization: delay,
            per_token: delay,
            embedding_lookup: delay,
            positional_encoding: delay,
            self_attention: delay,
            feed_forward: delay,
            chunk_step: delay,
        }
    }
}

/// Drives simulation runs and owns every piece of shared state observers
/// read: the stage, the state snapshot, and the control flags.
pub struct Simulator {
    state: SharedState,
    controls: Controls,
    gate: Arc<ExecutionGate>,
    runs: RunRegistry,
    stage: watch::Sender<Stage>,
    source: Arc<dyn TokenSource>,
    timing: SimTiming,
    system_instruction: Option<String>,
    prompt: Mutex<String>,
}

impl Simulator {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        let controls = Controls::new();
        let (stage, _rx) = watch::channel(Stage::Idle);
        Self {
            state: SharedState::new(),
            gate: Arc::new(ExecutionGate::new(controls.clone())),
            controls,
            runs: RunRegistry::new(),
            stage,
            source,
            timing: SimTiming::default(),
            system_instruction: None,
            prompt: Mutex::new(String::new()),
        }
    }

    pub fn with_timing(mut self, timing: SimTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Fixed system instruction forwarded with every generation request.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn stage(&self) -> Stage {
        *self.stage.borrow()
    }

    /// Observe stage transitions without polling.
    pub fn subscribe_stage(&self) -> watch::Receiver<Stage> {
        self.stage.subscribe()
    }

    /// Mode and play/pause flags, user-settable at any time.
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Point-in-time snapshot of the observable run state.
    pub fn snapshot(&self) -> SimulationState {
        self.state.snapshot()
    }

    /// True while a manual wait is suspended on the gate.
    pub fn awaiting_advance(&self) -> bool {
        self.gate.is_waiting()
    }

    pub fn prompt(&self) -> String {
        self.prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Edit the stored prompt. Permitted only while idle or finished.
    pub fn set_prompt(&self, text: &str) -> Result<(), SimError> {
        if !self.stage().can_start() {
            return Err(SimError::PromptLocked);
        }
        *self
            .prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = text.to_string();
        Ok(())
    }

    /// Start a run: cancel any previous run, reset state, and walk the
    /// pipeline on a spawned task. Returns the task handle so callers can
    /// await completion.
    pub fn start(self: &Arc<Self>, input: &str) -> JoinHandle<()> {
        // Issuing the token invalidates the previous run before any state is
        // touched, so its late mutations can never land on the new state.
        let token = self.runs.issue();
        *self
            .prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = input.to_string();
        let input = input.to_string();
        self.state.update(|s| {
            s.clear();
            s.input = input.clone();
        });
        self.stage.send_replace(Stage::Idle);
        self.controls.set_playing(true);
        tracing::info!(chars = input.len(), "starting simulation run");

        let sim = Arc::clone(self);
        tokio::spawn(async move {
            match sim.run(&token, input).await {
                Ok(()) => tracing::info!("run finished"),
                // Expected outcome of reset or a superseding start.
                Err(RunError::Cancelled(_)) => tracing::debug!("run cancelled"),
                Err(RunError::Stream(e)) => {
                    tracing::error!(error = %e, "token stream failed");
                    if !token.is_cancelled() {
                        sim.state.update(|s| {
                            let message = e.to_string();
                            s.push_log(format!("Generation failed: {message}"));
                            s.failure = Some(message);
                        });
                        sim.controls.set_playing(false);
                    }
                }
            }
        })
    }

    /// Cancel the current run and return to an empty idle state. Idempotent.
    pub fn reset(&self) {
        self.runs.cancel_current();
        self.controls.set_playing(false);
        self.stage.send_replace(Stage::Idle);
        self.state.update(|s| s.clear());
        tracing::debug!("simulation reset");
    }

    /// One press of the step control: delivers an advance signal to a
    /// pending manual wait, or, when no run is active (idle/finished),
    /// starts a fresh run with the stored prompt. The dual meaning is
    /// deliberate; the same user control both starts and steps a run.
    pub fn advance_manual_step(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.stage().can_start() {
            let prompt = self.prompt();
            Some(self.start(&prompt))
        } else {
            self.gate.advance();
            None
        }
    }

    fn transition(&self, token: &RunToken, stage: Stage) -> Result<(), Cancelled> {
        token.check()?;
        self.stage.send_replace(stage);
        tracing::debug!(stage = %stage, "stage transition");
        Ok(())
    }

    async fn run(&self, token: &RunToken, input: String) -> Result<(), RunError> {
        let t = &self.timing;

        self.transition(token, Stage::InputGuard)?;
        self.state
            .update(|s| s.push_log("Prompt received, screening input"));
        self.gate.pace(token, t.input_guard).await?;

        self.transition(token, Stage::Tokenization)?;
        let words = synth::split_words(&input);
        self.state
            .update(|s| s.push_log(format!("Splitting prompt into {} tokens", words.len())));
        for (index, word) in words.iter().enumerate() {
            token.check()?;
            let tok = {
                let mut rng = rand::thread_rng();
                Token::synthesize(index, word, &mut rng)
            };
            self.state.update(|s| s.tokens.push(tok));
            self.gate.pace_minor(token, t.per_token).await?;
        }
        self.gate.pace(token, t.tokenization).await?;

        self.transition(token, Stage::EmbeddingLookup)?;
        self.state
            .update(|s| s.push_log("Mapping token ids to dense vectors"));
        self.gate.pace(token, t.embedding_lookup).await?;

        self.transition(token, Stage::PositionalEncoding)?;
        self.gate.pace(token, t.positional_encoding).await?;

        self.transition(token, Stage::SelfAttention)?;
        let n = self.state.read(|s| s.tokens.len());
        let matrix = {
            let mut rng = rand::thread_rng();
            synth::attention_matrix(n, &mut rng)
        };
        self.state.update(|s| {
            s.attention = matrix;
            s.push_log("Scoring token-to-token relevance");
        });
        self.gate.pace(token, t.self_attention).await?;

        self.transition(token, Stage::FeedForward)?;
        self.gate.pace(token, t.feed_forward).await?;

        let mut request = GenerationRequest::new(input);
        if let Some(system) = &self.system_instruction {
            request = request.with_system_instruction(system.clone());
        }
        let mut stream = tokio::select! {
            opened = self.source.open(request) => opened?,
            _ = token.cancelled() => return Err(Cancelled.into()),
        };
        // Both select arms can be ready at once; re-check before mutating.
        token.check()?;
        self.state
            .update(|s| s.push_log("Streaming output from the model"));

        while let Some(chunk) = next_chunk(&mut stream, token).await? {
            self.transition(token, Stage::LogitsCalc)?;
            let candidates = {
                let mut rng = rand::thread_rng();
                synth::rank_candidates(&chunk, &mut rng)
            };
            self.state.update(|s| s.candidates = candidates);
            self.gate.pace_minor(token, t.chunk_step).await?;

            self.transition(token, Stage::SamplingDecoding)?;
            self.gate.pace_minor(token, t.chunk_step).await?;

            self.transition(token, Stage::Detokenization)?;
            self.gate.pace_minor(token, t.chunk_step).await?;

            token.check()?;
            self.state.update(|s| s.output.push_str(&chunk));
        }

        self.transition(token, Stage::Finished)?;
        self.state.update(|s| s.push_log("Generation complete"));
        self.controls.set_playing(false);
        Ok(())
    }
}

/// Await the next chunk, cut short by cancellation.
async fn next_chunk(
    stream: &mut ChunkStream,
    token: &RunToken,
) -> Result<Option<String>, RunError> {
    tokio::select! {
        item = stream.next() => match item {
            None => Ok(None),
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e.into()),
        },
        _ = token.cancelled() => Err(Cancelled.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ScriptedSource;

    fn simulator() -> Arc<Simulator> {
        Arc::new(Simulator::new(Arc::new(ScriptedSource::new(["hi"]))))
    }

    #[tokio::test]
    async fn starts_idle_and_empty() {
        let sim = simulator();
        assert_eq!(sim.stage(), Stage::Idle);
        assert!(!sim.awaiting_advance());
        assert!(!sim.controls().is_playing());

        let snapshot = sim.snapshot();
        assert!(snapshot.input.is_empty());
        assert!(snapshot.tokens.is_empty());
        assert!(snapshot.output.is_empty());
        assert!(!snapshot.has_failed());
    }

    #[tokio::test]
    async fn prompt_is_editable_while_idle() {
        let sim = simulator();
        sim.set_prompt("fresh prompt").unwrap();
        assert_eq!(sim.prompt(), "fresh prompt");
    }

    #[test]
    fn uniform_timing_sets_every_delay() {
        let t = SimTiming::uniform(Duration::from_millis(7));
        assert_eq!(t.input_guard, Duration::from_millis(7));
        assert_eq!(t.per_token, Duration::from_millis(7));
        assert_eq!(t.chunk_step, Duration::from_millis(7));
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let sim = simulator();
        sim.reset();
        sim.reset();
        assert_eq!(sim.stage(), Stage::Idle);
        assert!(!sim.controls().is_playing());
    }
}
