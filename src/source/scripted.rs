//! Deterministic token source for tests and the offline demo.

use crate::errors::StreamError;
use crate::source::{ChunkStream, GenerationRequest, TokenSource};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::time::Duration;

/// Yields a scripted list of chunks, optionally delayed per chunk, optionally
/// rejecting at open time or failing after a prefix of the script.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    chunks: Vec<String>,
    chunk_delay: Duration,
    reject_open: Option<String>,
    fail_after: Option<(usize, String)>,
}

impl ScriptedSource {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            chunk_delay: Duration::ZERO,
            reject_open: None,
            fail_after: None,
        }
    }

    /// A source whose `open` always fails, e.g. quota exhaustion.
    pub fn rejecting(message: impl Into<String>) -> Self {
        let mut source = Self::new(Vec::<String>::new());
        source.reject_open = Some(message.into());
        source
    }

    /// Sleep this long before yielding each chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Yield the first `count` scripted chunks, then fail the stream.
    pub fn failing_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((count, message.into()));
        self
    }
}

#[async_trait]
impl TokenSource for ScriptedSource {
    async fn open(&self, _request: GenerationRequest) -> Result<ChunkStream, StreamError> {
        if let Some(message) = &self.reject_open {
            return Err(StreamError::Rejected(message.clone()));
        }

        let mut items: Vec<Result<String, String>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if let Some((count, message)) = &self.fail_after {
            items.truncate(*count);
            items.push(Err(message.clone()));
        }

        let delay = self.chunk_delay;
        let stream = stream::iter(items).then(move |item| async move {
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            item.map_err(StreamError::Rejected)
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_scripted_chunks_in_order() {
        let source = ScriptedSource::new(["Hello", " world", "!"]);
        let mut stream = source.open(GenerationRequest::new("hi")).await.unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.push(chunk.unwrap());
        }
        assert_eq!(collected, vec!["Hello", " world", "!"]);
    }

    #[tokio::test]
    async fn rejecting_source_fails_at_open() {
        let source = ScriptedSource::rejecting("quota exhausted");
        let err = source
            .open(GenerationRequest::new("hi"))
            .await
            .err()
            .expect("open must fail");
        assert!(matches!(err, StreamError::Rejected(msg) if msg == "quota exhausted"));
    }

    #[tokio::test]
    async fn failing_after_yields_prefix_then_error() {
        let source = ScriptedSource::new(["a", "b", "c"]).failing_after(2, "network block");
        let mut stream = source.open(GenerationRequest::new("hi")).await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert_eq!(stream.next().await.unwrap().unwrap(), "b");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::Rejected(msg) if msg == "network block"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn chunk_delay_paces_the_stream() {
        let source =
            ScriptedSource::new(["a", "b"]).with_chunk_delay(Duration::from_millis(250));
        let mut stream = source.open(GenerationRequest::new("hi")).await.unwrap();

        let start = tokio::time::Instant::now();
        stream.next().await.unwrap().unwrap();
        stream.next().await.unwrap().unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn dropping_the_stream_early_is_error_free() {
        let source = ScriptedSource::new(["a", "b", "c"]);
        let mut stream = source.open(GenerationRequest::new("hi")).await.unwrap();
        stream.next().await.unwrap().unwrap();
        drop(stream);
    }
}
