use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use mend_core::context::LlmContext;
use mend_core::errors::GatewayError;
use mend_core::ids::ToolCallId;
use mend_core::messages::{AssistantContent, AssistantMessage, StopReason, ToolCallBlock};
use mend_core::provider::{Completion, CompletionOptions, LlmProvider};

/// Pre-programmed responses for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Plain assistant text, `finish_reason: stop`.
    Text(String),
    /// One or more tool calls as (name, arguments) pairs.
    ToolCalls(Vec<(String, Value)>),
    /// Fail the call.
    Error(GatewayError),
    /// Wait a duration, then resolve the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn tool_call(name: &str, arguments: Value) -> Self {
        Self::ToolCalls(vec![(name.to_string(), arguments)])
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in sequence and
/// records every context it receives.
pub struct MockProvider {
    responses: Vec<MockResponse>,
    call_count: AtomicUsize,
    contexts: Mutex<Vec<LlmContext>>,
    vision: bool,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
            vision: true,
        }
    }

    /// Answer every call in `count` calls with the same text.
    pub fn repeating(text: &str, count: usize) -> Self {
        Self::new(vec![MockResponse::text(text); count])
    }

    pub fn without_vision(mut self) -> Self {
        self.vision = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Snapshot of the contexts received so far, in call order.
    pub fn contexts(&self) -> Vec<LlmContext> {
        self.contexts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    async fn complete(
        &self,
        context: &LlmContext,
        _options: &CompletionOptions,
    ) -> Result<Completion, GatewayError> {
        self.contexts.lock().push(context.clone());
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);

        let response = self.responses.get(idx).ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            ))
        })?;

        resolve_response(response).await
    }
}

/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: &MockResponse) -> Result<Completion, GatewayError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Text(text) => {
                return Ok(completion(AssistantMessage::text(text.as_str())));
            }
            MockResponse::ToolCalls(calls) => {
                let content = calls
                    .iter()
                    .map(|(name, arguments)| {
                        AssistantContent::ToolCall(ToolCallBlock {
                            id: ToolCallId::new(),
                            name: name.clone(),
                            arguments: arguments.clone(),
                        })
                    })
                    .collect();
                return Ok(completion(AssistantMessage {
                    content,
                    stop_reason: Some(StopReason::ToolUse),
                }));
            }
            MockResponse::Error(e) => return Err(e.clone()),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(*duration).await;
                current = inner;
            }
        }
    }
}

fn completion(message: AssistantMessage) -> Completion {
    Completion {
        message,
        usage: None,
        model: "mock-model".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mend_core::messages::Message;
    use serde_json::json;

    fn ctx(text: &str) -> LlmContext {
        LlmContext::new(vec!["be brief".into()]).with_message(Message::user_text(text))
    }

    #[tokio::test]
    async fn returns_responses_in_order() {
        let mock = MockProvider::new(vec![MockResponse::text("one"), MockResponse::text("two")]);
        let opts = CompletionOptions::default();
        let a = mock.complete(&ctx("a"), &opts).await.unwrap();
        let b = mock.complete(&ctx("b"), &opts).await.unwrap();
        assert_eq!(a.message.text_content(), "one");
        assert_eq!(b.message.text_content(), "two");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_returns_error() {
        let mock = MockProvider::new(vec![]);
        let err = mock
            .complete(&ctx("a"), &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no response configured"));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn scripted_error() {
        let mock = MockProvider::new(vec![MockResponse::Error(GatewayError::ServerError {
            status: 503,
            body: "overloaded".into(),
        })]);
        let err = mock
            .complete(&ctx("a"), &CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_kind(), "server_error");
    }

    #[tokio::test]
    async fn records_contexts() {
        let mock = MockProvider::repeating("ok", 2);
        let opts = CompletionOptions::default();
        mock.complete(&ctx("first"), &opts).await.unwrap();
        mock.complete(&ctx("second"), &opts).await.unwrap();
        let seen = mock.contexts();
        assert_eq!(seen.len(), 2);
        match &seen[1].messages[0] {
            Message::User(u) => assert_eq!(u.text_content(), "second"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_call_response() {
        let mock = MockProvider::new(vec![MockResponse::tool_call(
            "web_search",
            json!({"query": "healing"}),
        )]);
        let out = mock
            .complete(&ctx("a"), &CompletionOptions::default())
            .await
            .unwrap();
        assert!(out.message.has_tool_calls());
        assert_eq!(out.message.stop_reason, Some(StopReason::ToolUse));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_then_respond() {
        let mock = MockProvider::new(vec![MockResponse::delayed(
            Duration::from_secs(5),
            MockResponse::text("late"),
        )]);
        let out = mock
            .complete(&ctx("a"), &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(out.message.text_content(), "late");
    }
}
