//! Streaming client for an OpenAI-compatible chat-completions endpoint.
//!
//! Sends `stream: true` requests and decodes the server-sent-event framing
//! incrementally: `data: {json}` lines carry one delta each, `data: [DONE]`
//! terminates the stream. Decoding is split into a synchronous line buffer
//! (unit-testable without a network) and a thin async adapter over
//! `bytes_stream`.

use crate::errors::StreamError;
use crate::source::{ChunkStream, GenerationRequest, TokenSource};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub struct HttpTokenSource {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpTokenSource {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    delta: WireDelta,
}

#[derive(Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental SSE line decoder. Fed raw byte slices, yields decoded chunks.
#[derive(Debug, Default)]
struct SseBuffer {
    buf: String,
    done: bool,
}

impl SseBuffer {
    /// Consume one network read and return every chunk it completed.
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, StreamError>> {
        self.buf.push_str(&String::from_utf8_lossy(bytes));
        let mut out = Vec::new();

        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            if self.done {
                continue;
            }
            let line = line.trim_end_matches(['\n', '\r']);
            let Some(data) = line.strip_prefix("data:") else {
                // Comments, event names and blank keep-alive lines.
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                self.done = true;
                continue;
            }
            if data.is_empty() {
                continue;
            }
            match serde_json::from_str::<WireChunk>(data) {
                Ok(chunk) => {
                    let text = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content);
                    if let Some(text) = text
                        && !text.is_empty()
                    {
                        out.push(Ok(text));
                    }
                }
                Err(e) => out.push(Err(StreamError::Malformed(e.to_string()))),
            }
        }
        out
    }

    /// Decode a final partial line once the byte stream ends. Servers that
    /// close right after the last `data:` line may omit its newline.
    fn flush(&mut self) -> Vec<Result<String, StreamError>> {
        if self.done || self.buf.is_empty() {
            self.buf.clear();
            return Vec::new();
        }
        self.buf.push('\n');
        self.push(&[])
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(&mut self) {
        self.done = true;
    }
}

struct DecodeState {
    inner: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    sse: SseBuffer,
    ready: VecDeque<Result<String, StreamError>>,
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn open(&self, request: GenerationRequest) -> Result<ChunkStream, StreamError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_instruction {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = WireRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            top_p: request.top_p,
            stream: true,
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            let detail = detail.chars().take(200).collect::<String>();
            return Err(StreamError::Rejected(format!("HTTP {status}: {detail}")));
        }

        let state = DecodeState {
            inner: resp.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
            sse: SseBuffer::default(),
            ready: VecDeque::new(),
        };

        let chunks = stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.ready.pop_front() {
                    return Some((item, st));
                }
                if st.sse.is_done() {
                    return None;
                }
                match st.inner.next().await {
                    None => {
                        let decoded = st.sse.flush();
                        st.sse.finish();
                        if decoded.is_empty() {
                            return None;
                        }
                        st.ready.extend(decoded);
                    }
                    Some(Err(e)) => {
                        st.sse.finish();
                        return Some((Err(StreamError::Transport(e)), st));
                    }
                    Some(Ok(bytes)) => {
                        let decoded = st.sse.push(&bytes);
                        st.ready.extend(decoded);
                    }
                }
            }
        });

        Ok(chunks.boxed())
    }
}
