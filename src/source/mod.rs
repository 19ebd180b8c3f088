//! Token-stream collaborator boundary.
//!
//! The orchestrator consumes generated text as a lazy, finite,
//! non-restartable sequence of chunks. Implementations may reject at open
//! time or fail mid-stream; the orchestrator must be able to drop the stream
//! early (on cancellation) without error.

pub mod http;
pub mod scripted;

pub use http::HttpTokenSource;
pub use scripted::ScriptedSource;

use crate::errors::StreamError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

/// A lazily produced sequence of text chunks.
pub type ChunkStream = BoxStream<'static, Result<String, StreamError>>;

/// Request handed to the collaborator when a run reaches generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Sampling temperature, clamped to [0, 1].
    pub temperature: f32,
    /// Nucleus-sampling threshold, clamped to [0, 1].
    pub top_p: f32,
    pub system_instruction: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.9,
            top_p: 0.95,
            system_instruction: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p.clamp(0.0, 1.0);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// The external text-generation service, seen from the orchestrator.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Open a fresh chunk stream for one request.
    async fn open(&self, request: GenerationRequest) -> Result<ChunkStream, StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_are_in_range() {
        let req = GenerationRequest::new("hello");
        assert_eq!(req.prompt, "hello");
        assert!((0.0..=1.0).contains(&req.temperature));
        assert!((0.0..=1.0).contains(&req.top_p));
        assert!(req.system_instruction.is_none());
    }

    #[test]
    fn sampling_parameters_are_clamped() {
        let req = GenerationRequest::new("x")
            .with_temperature(3.0)
            .with_top_p(-0.5);
        assert_eq!(req.temperature, 1.0);
        assert_eq!(req.top_p, 0.0);
    }

    #[test]
    fn builder_sets_system_instruction() {
        let req = GenerationRequest::new("x").with_system_instruction("be brief");
        assert_eq!(req.system_instruction.as_deref(), Some("be brief"));
    }
}
