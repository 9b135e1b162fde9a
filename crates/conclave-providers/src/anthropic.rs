use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::{
    CompleterError, CompleterInfo, CompleterRequest, CompleterResponse, CompletionResult,
    MessageRole, TokenUsage,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic's native `/v1/messages` wire format: system prompt is a
/// top-level field rather than a message with `role: system`.
pub struct AnthropicCompleter {
    api_key: Option<String>,
    default_model: String,
    base_url: String,
    client: Client,
}

impl AnthropicCompleter {
    pub fn new(api_key: Option<String>, default_model: impl Into<String>) -> Self {
        Self {
            api_key,
            default_model: default_model.into(),
            base_url: "https://api.anthropic.com".to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl crate::Completer for AnthropicCompleter {
    fn info(&self) -> CompleterInfo {
        CompleterInfo {
            id: "anthropic".to_string(),
            name: "Anthropic".to_string(),
            default_model: self.default_model.clone(),
        }
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: CompleterRequest) -> CompletionResult<CompleterResponse> {
        let messages = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                };
                json!({"role": role, "content": m.content})
            })
            .collect::<Vec<_>>();

        let mut body = json!({
            "model": self.default_model,
            "max_tokens": request.max_tokens.unwrap_or(1024),
            "messages": messages,
        });
        if let Some(system_prompt) = &request.system_prompt {
            body["system"] = json!(system_prompt);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if !request.stop_sequences.is_empty() {
            body["stop_sequences"] = json!(request.stop_sequences);
        }

        let mut req = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        } else {
            return Err(CompleterError::fatal("anthropic", "no API key configured"));
        }

        let response = req
            .send()
            .await
            .map_err(|e| CompleterError::retryable("anthropic", format!("request failed: {e}")))?;
        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompleterError::fatal("anthropic", format!("invalid response body: {e}")))?;

        if !status.is_success() {
            let detail = value["error"]["message"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("request failed with status {status}"));
            return Err(CompleterError::from_status("anthropic", status, detail));
        }

        let content = value["content"][0]["text"]
            .as_str()
            .ok_or_else(|| CompleterError::fatal("anthropic", "response had no completion content"))?
            .to_string();

        let usage = TokenUsage {
            input_tokens: value["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: value["usage"]["output_tokens"].as_u64().unwrap_or(0),
        };
        let stop_reason = value["stop_reason"].as_str().map(|s| s.to_string());

        Ok(CompleterResponse {
            content,
            usage,
            stop_reason,
            model: self.default_model.clone(),
        })
    }
}
