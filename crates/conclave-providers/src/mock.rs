use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::{
    CompleterError, CompleterInfo, CompleterRequest, CompleterResponse, CompletionResult,
    TokenUsage,
};

/// Records call history and replays a preconfigured sequence of
/// responses/errors; used by test harnesses in place of a live provider.
pub struct MockCompleter {
    id: String,
    responses: Mutex<Vec<MockStep>>,
    calls: Mutex<Vec<CompleterRequest>>,
    delay: Option<Duration>,
}

enum MockStep {
    Response(CompleterResponse),
    Error(CompleterError),
}

impl MockCompleter {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_response(&self, content: impl Into<String>) {
        self.responses.lock().unwrap().push(MockStep::Response(CompleterResponse {
            content: content.into(),
            usage: TokenUsage::default(),
            stop_reason: Some("stop".to_string()),
            model: format!("{}-mock", self.id),
        }));
    }

    pub fn queue_error(&self, error: CompleterError) {
        self.responses.lock().unwrap().push(MockStep::Error(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl crate::Completer for MockCompleter {
    fn info(&self) -> CompleterInfo {
        CompleterInfo {
            id: self.id.clone(),
            name: format!("Mock ({})", self.id),
            default_model: format!("{}-mock", self.id),
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompleterRequest) -> CompletionResult<CompleterResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(request);
        let step = self.responses.lock().unwrap().pop();
        match step {
            Some(MockStep::Response(response)) => Ok(response),
            Some(MockStep::Error(error)) => Err(error),
            None => Err(CompleterError::fatal(&self.id, "mock has no queued response")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Completer;

    #[tokio::test]
    async fn replays_queued_responses_in_order() {
        let mock = MockCompleter::new("mock");
        mock.queue_response("second");
        mock.queue_response("first");
        let request = CompleterRequest::new("system", "prompt");
        let first = mock.complete(request.clone()).await.unwrap();
        assert_eq!(first.content, "first");
        assert_eq!(mock.call_count(), 1);
    }
}
