use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::{
    CompleterError, CompleterInfo, CompleterRequest, CompleterResponse, CompletionResult,
    MessageRole, TokenUsage,
};

/// Chat-completions over the OpenAI wire format, used by every
/// OpenAI-compatible provider (OpenAI itself, OpenRouter, Groq, Mistral,
/// local Ollama, and similar gateways).
pub struct OpenAiCompatibleCompleter {
    id: String,
    name: String,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: Client,
}

impl OpenAiCompatibleCompleter {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            api_key,
            default_model: default_model.into(),
            client: Client::new(),
        }
    }
}

fn extract_openai_error(value: &serde_json::Value) -> Option<String> {
    value["error"]["message"]
        .as_str()
        .map(|s| s.to_string())
        .or_else(|| value["error"].as_str().map(|s| s.to_string()))
}

#[async_trait]
impl crate::Completer for OpenAiCompatibleCompleter {
    fn info(&self) -> CompleterInfo {
        CompleterInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            default_model: self.default_model.clone(),
        }
    }

    fn is_available(&self) -> bool {
        self.id == "ollama" || self.api_key.is_some()
    }

    async fn complete(&self, request: CompleterRequest) -> CompletionResult<CompleterResponse> {
        let mut wire_messages = Vec::new();
        if let Some(system_prompt) = &request.system_prompt {
            wire_messages.push(json!({"role": "system", "content": system_prompt}));
        }
        for message in &request.messages {
            let role = match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };
            wire_messages.push(json!({"role": role, "content": message.content}));
        }

        let mut body = json!({
            "model": self.default_model,
            "messages": wire_messages,
            "stream": false,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if !request.stop_sequences.is_empty() {
            body["stop"] = json!(request.stop_sequences);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.client.post(url).json(&body);
        if self.id == "openrouter" {
            req = req
                .header("HTTP-Referer", "https://conclave.local")
                .header("X-Title", "Conclave");
        }
        if let Some(api_key) = &self.api_key {
            req = req.bearer_auth(api_key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| CompleterError::retryable(&self.id, format!("request failed: {e}")))?;
        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompleterError::fatal(&self.id, format!("invalid response body: {e}")))?;

        if !status.is_success() {
            let detail = extract_openai_error(&value)
                .unwrap_or_else(|| format!("request failed with status {status}"));
            return Err(CompleterError::from_status(&self.id, status, detail));
        }
        if let Some(detail) = extract_openai_error(&value) {
            return Err(CompleterError::fatal(&self.id, detail));
        }

        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CompleterError::fatal(&self.id, "response had no completion content"))?
            .to_string();

        let usage = TokenUsage {
            input_tokens: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            output_tokens: value["usage"]["completion_tokens"].as_u64().unwrap_or(0),
        };
        let stop_reason = value["choices"][0]["finish_reason"]
            .as_str()
            .map(|s| s.to_string());

        Ok(CompleterResponse {
            content,
            usage,
            stop_reason,
            model: self.default_model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nested_openai_error_message() {
        let value = json!({"error": {"message": "invalid api key", "type": "auth_error"}});
        assert_eq!(extract_openai_error(&value).as_deref(), Some("invalid api key"));
    }

    #[test]
    fn ollama_is_always_available_without_a_key() {
        let completer = OpenAiCompatibleCompleter::new(
            "ollama",
            "Ollama",
            "http://127.0.0.1:11434/v1",
            None,
            "llama3.1:8b",
        );
        use crate::Completer;
        assert!(completer.is_available());
    }
}
