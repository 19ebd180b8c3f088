//! infersim — a pausable, steppable inference-pipeline simulation engine.
//!
//! The engine walks a fixed pipeline of stages (tokenization, attention,
//! sampling, ...) for one prompt, pacing every visible step through an
//! execution gate that supports auto-play, pause, manual single-stepping and
//! cooperative cancellation, while streaming generated text from an external
//! token source.

pub mod cancel;
pub mod control;
pub mod errors;
pub mod gate;
pub mod sim;
pub mod source;
pub mod stage;
pub mod state;

pub use cancel::{RunRegistry, RunToken};
pub use control::{ControlState, Controls, Mode};
pub use errors::{Cancelled, RunError, SimError, StreamError};
pub use gate::ExecutionGate;
pub use sim::{SimTiming, Simulator};
pub use source::{GenerationRequest, HttpTokenSource, ScriptedSource, TokenSource};
pub use stage::{Stage, StageMetadata};
pub use state::{Candidate, LogEntry, SimulationState, Token};
