//! External LLM provider streaming implementations.
//!
//! Each provider streams tokens via SSE from their respective APIs.
//! OpenAI and Groq use the same format. Anthropic uses a different one.
//! [`RemoteModel`] collects the stream into one completion text.

use std::pin::Pin;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::Stream;
use proposal_core::{Error, Result};
use reqwest::Client;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use crate::config::LLMConfig;
use crate::types::{CompletionRequest, LLMProvider, ResolvedProvider};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Boxed stream type for returning different stream implementations.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A single streamed token, end marker, or failure.
#[derive(Debug)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(Error),
}

/// A text completion model.
pub trait LanguageModel: Send + Sync {
    /// Run one completion and return the full response text.
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, Result<String>>;

    /// Model name, for logging.
    fn model_name(&self) -> &str;
}

/// A hosted model reached over HTTPS.
pub struct RemoteModel {
    client: Client,
    provider: ResolvedProvider,
}

impl RemoteModel {
    /// Build a client whose requests fail with [`Error::Timeout`] after `timeout`.
    pub fn new(provider: ResolvedProvider, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, provider })
    }

    /// Use whichever provider the configuration resolves to.
    pub fn from_config(config: &LLMConfig, timeout: Duration) -> Result<Self> {
        let provider = config.resolve_provider().ok_or_else(|| {
            Error::Config(
                "No LLM provider configured. Set OPENAI_API_KEY, ANTHROPIC_API_KEY or GROQ_API_KEY"
                    .into(),
            )
        })?;
        info!("Using {} model {}", provider.provider, provider.model);
        Self::new(provider, timeout)
    }

    pub fn provider(&self) -> &ResolvedProvider {
        &self.provider
    }
}

impl LanguageModel for RemoteModel {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let stream = stream_llm(&self.client, &self.provider, request);
            collect_stream(stream).await
        })
    }

    fn model_name(&self) -> &str {
        &self.provider.model
    }
}

/// Concatenate streamed tokens. The first error aborts collection.
pub async fn collect_stream(mut stream: BoxedStream) -> Result<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Token(token) => text.push_str(&token),
            StreamChunk::Done { tokens_used } => {
                debug!("Completion finished after {} stream events", tokens_used);
                break;
            }
            StreamChunk::Error(e) => return Err(e),
        }
    }
    Ok(text)
}

/// Stream tokens from the appropriate provider.
pub fn stream_llm(
    client: &Client,
    provider: &ResolvedProvider,
    request: &CompletionRequest,
) -> BoxedStream {
    match provider.provider {
        LLMProvider::OpenAI => Box::pin(stream_openai_compat(
            client.clone(),
            OPENAI_URL,
            provider,
            request,
        )),
        LLMProvider::Groq => Box::pin(stream_openai_compat(
            client.clone(),
            GROQ_URL,
            provider,
            request,
        )),
        LLMProvider::Anthropic => Box::pin(stream_anthropic(client.clone(), provider, request)),
    }
}

/// Decoded SSE `data:` payload.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Token(String),
    Done,
    Error(String),
}

fn request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Remove and return every complete line in `buffer`, decoded and trimmed.
///
/// Bytes after the last newline stay buffered, so a multi-byte character
/// split across network chunks is decoded only once it is whole.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=line_end).collect();
        lines.push(String::from_utf8_lossy(&line).trim().to_string());
    }
    lines
}

fn sse_data(line: &str) -> Option<&str> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    line.strip_prefix("data:").map(str::trim_start)
}

fn parse_openai_data(data: &str) -> Option<SseEvent> {
    if data.trim() == "[DONE]" {
        return Some(SseEvent::Done);
    }
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    if let Some(msg) = parsed["error"]["message"].as_str() {
        return Some(SseEvent::Error(msg.to_string()));
    }
    parsed["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|c| !c.is_empty())
        .map(|c| SseEvent::Token(c.to_string()))
}

fn parse_anthropic_data(data: &str) -> Option<SseEvent> {
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    match parsed["type"].as_str() {
        Some("content_block_delta") => parsed["delta"]["text"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(|t| SseEvent::Token(t.to_string())),
        Some("message_stop") => Some(SseEvent::Done),
        Some("error") => Some(SseEvent::Error(
            parsed["error"]["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
        )),
        _ => None,
    }
}

/// Send the request and turn its SSE body into [`StreamChunk`]s.
fn sse_stream(
    request: reqwest::RequestBuilder,
    parse: fn(&str) -> Option<SseEvent>,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    async_stream::stream! {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                yield StreamChunk::Error(request_error(e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!("Provider returned {}: {}", status, message);
            yield StreamChunk::Error(Error::Provider { status, message });
            return;
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut token_count = 0usize;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield StreamChunk::Error(request_error(e));
                    return;
                }
            };

            buffer.extend_from_slice(&bytes);

            for line in drain_lines(&mut buffer) {
                let Some(event) = sse_data(&line).and_then(parse) else {
                    continue;
                };
                match event {
                    SseEvent::Token(text) => {
                        token_count += 1;
                        yield StreamChunk::Token(text);
                    }
                    SseEvent::Done => {
                        yield StreamChunk::Done { tokens_used: token_count };
                        return;
                    }
                    SseEvent::Error(message) => {
                        error!("Provider stream error: {}", message);
                        yield StreamChunk::Error(Error::Provider { status: 200, message });
                        return;
                    }
                }
            }
        }

        yield StreamChunk::Done { tokens_used: token_count };
    }
}

/// Stream from OpenAI-compatible APIs (OpenAI, Groq).
fn stream_openai_compat(
    client: Client,
    url: &str,
    provider: &ResolvedProvider,
    request: &CompletionRequest,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    let msgs: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();

    let body = json!({
        "model": provider.model,
        "messages": msgs,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": true,
    });

    debug!("Streaming from {} with model {}", url, provider.model);

    let builder = client
        .post(url)
        .header("Authorization", format!("Bearer {}", provider.api_key))
        .header("Content-Type", "application/json")
        .json(&body);
    sse_stream(builder, parse_openai_data)
}

/// Stream from Anthropic's Messages API.
fn stream_anthropic(
    client: Client,
    provider: &ResolvedProvider,
    request: &CompletionRequest,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    // Separate system message from conversation
    let system_msg: Option<String> = request
        .messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| m.content.clone());

    let conv_msgs: Vec<serde_json::Value> = request
        .messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();

    let mut body = json!({
        "model": provider.model,
        "messages": conv_msgs,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": true,
    });

    if let Some(sys) = system_msg {
        body["system"] = json!(sys);
    }

    debug!("Streaming from Anthropic with model {}", provider.model);

    let builder = client
        .post(ANTHROPIC_URL)
        .header("x-api-key", &provider.api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Content-Type", "application/json")
        .json(&body);
    sse_stream(builder, parse_anthropic_data)
}
