use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::LlmContext;
use crate::errors::GatewayError;
use crate::messages::AssistantMessage;

/// Options controlling generation for a single completion.
#[derive(Clone, Debug, Default)]
pub struct CompletionOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One model response.
#[derive(Clone, Debug)]
pub struct Completion {
    pub message: AssistantMessage,
    pub usage: Option<TokenUsage>,
    pub model: String,
}

/// Trait implemented by each model-serving backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn supports_vision(&self) -> bool;

    async fn complete(
        &self,
        context: &LlmContext,
        options: &CompletionOptions,
    ) -> Result<Completion, GatewayError>;
}
