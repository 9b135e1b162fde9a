//! Completer Client (C2): a provider-agnostic chat-completion interface plus
//! a registry of named completers selected by explicit/default/fallback
//! provider id.

mod anthropic;
mod mock;
mod openai;
mod registry;

pub use anthropic::AnthropicCompleter;
pub use mock::MockCompleter;
pub use openai::OpenAiCompatibleCompleter;
pub use registry::CompleterRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// A `role = system` message in a raw message list is dropped before it
/// ever reaches a completer; the caller's `system_prompt` is the only
/// system channel.
pub fn strip_system_messages(messages: Vec<(String, String)>) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .filter_map(|(role, content)| {
            let role = match role.as_str() {
                "user" => Some(MessageRole::User),
                "assistant" => Some(MessageRole::Assistant),
                _ => None,
            }?;
            Some(ChatMessage { role, content })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CompleterRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop_sequences: Vec<String>,
    pub cancel_signal: Option<CancellationToken>,
}

impl CompleterRequest {
    pub fn new(system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            messages: vec![ChatMessage {
                role: MessageRole::User,
                content: prompt.into(),
            }],
            max_tokens: None,
            temperature: None,
            stop_sequences: Vec::new(),
            cancel_signal: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleterResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub stop_reason: Option<String>,
    pub model: String,
}

/// HTTP 5xx and 429 are retryable; everything else (auth, quota, malformed
/// response shape) is fatal.
#[derive(Debug, Error, Clone)]
#[error("completer error ({provider}): {code}")]
pub struct CompleterError {
    pub provider: String,
    pub code: String,
    pub retryable: bool,
}

impl CompleterError {
    pub fn fatal(provider: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            code: code.into(),
            retryable: false,
        }
    }

    pub fn retryable(provider: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            code: code.into(),
            retryable: true,
        }
    }

    pub fn from_status(provider: impl Into<String>, status: reqwest::StatusCode, detail: impl Into<String>) -> Self {
        let provider = provider.into();
        let code = detail.into();
        if status.as_u16() == 429 || status.is_server_error() {
            Self::retryable(provider, code)
        } else {
            Self::fatal(provider, code)
        }
    }
}

#[derive(Debug, Clone)]
pub enum StreamChunk {
    TextDelta(String),
    Done {
        finish_reason: String,
        usage: Option<TokenUsage>,
    },
}

pub type CompletionResult<T> = Result<T, CompleterError>;
pub type ChunkStream = Pin<Box<dyn futures::Stream<Item = CompletionResult<StreamChunk>> + Send>>;

#[derive(Debug, Clone)]
pub struct CompleterInfo {
    pub id: String,
    pub name: String,
    pub default_model: String,
}

#[async_trait]
pub trait Completer: Send + Sync {
    fn info(&self) -> CompleterInfo;

    /// Whether credentials/configuration suffice to serve requests.
    fn is_available(&self) -> bool;

    async fn complete(&self, request: CompleterRequest) -> CompletionResult<CompleterResponse>;

    /// Not a spec operation; used internally by the worker-completion gate
    /// polling path. Default falls back to a single-chunk `complete()`.
    async fn stream(&self, request: CompleterRequest) -> CompletionResult<ChunkStream> {
        let response = self.complete(request).await?;
        let stream = futures::stream::iter(vec![
            Ok(StreamChunk::TextDelta(response.content)),
            Ok(StreamChunk::Done {
                finish_reason: response.stop_reason.unwrap_or_else(|| "stop".to_string()),
                usage: Some(response.usage),
            }),
        ]);
        Ok(Box::pin(stream))
    }
}
