use std::sync::Arc;

use tracing::{debug, instrument, warn};

use mend_core::context::LlmContext;
use mend_core::errors::GatewayError;
use mend_core::messages::{Message, ToolCallBlock, UserMessage};
use mend_core::provider::{CompletionOptions, LlmProvider};
use mend_core::tools::ToolError;

use crate::persona::Persona;
use crate::registry::ToolRegistry;
use crate::staging::StagedAttachment;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 3;

/// Runs one persona call, including any web-search round trips.
pub struct PersonaRunner {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    options: CompletionOptions,
    max_tool_rounds: u32,
}

impl PersonaRunner {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            options: CompletionOptions::default(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Build the first user message. Images are dropped for text-only models.
    fn user_message(&self, prompt: String, attachments: &[StagedAttachment]) -> Message {
        if attachments.is_empty() {
            return Message::User(UserMessage::text(prompt));
        }
        if !self.provider.supports_vision() {
            warn!(
                model = self.provider.model(),
                dropped = attachments.len(),
                "model does not accept images; sending text only"
            );
            return Message::User(UserMessage::text(prompt));
        }
        let images: Vec<(String, std::path::PathBuf)> = attachments
            .iter()
            .map(|a| (a.mime_type.clone(), a.path.clone()))
            .collect();
        Message::User(UserMessage::with_images(prompt, &images))
    }

    async fn execute_tool(&self, call: &ToolCallBlock) -> Message {
        let outcome = match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call.arguments.clone()).await,
            None => Err(ToolError::UnknownTool(call.name.clone())),
        };
        match outcome {
            Ok(result) => {
                debug!(
                    tool = %call.name,
                    is_error = result.is_error,
                    duration_ms = result.duration.as_millis() as u64,
                    "tool executed"
                );
                Message::tool_result(call.id.clone(), result.content, result.is_error)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                Message::tool_result(call.id.clone(), format!("Error: {e}"), true)
            }
        }
    }

    /// Returns the persona's final Markdown text.
    #[instrument(skip_all, fields(persona = %persona.kind))]
    pub async fn run(
        &self,
        persona: &Persona,
        prompt: String,
        attachments: &[StagedAttachment],
    ) -> Result<String, GatewayError> {
        let tools_enabled = persona.uses_web_search && !self.tools.is_empty();
        let mut messages = vec![self.user_message(prompt, attachments)];
        let mut rounds = 0;

        loop {
            let offer_tools = tools_enabled && rounds < self.max_tool_rounds;
            let mut context = LlmContext::new(persona.system_instructions());
            context.messages = messages.clone();
            if offer_tools {
                context = context.with_tools(self.tools.definitions());
            }

            let completion = self.provider.complete(&context, &self.options).await?;
            let message = completion.message;

            if offer_tools && message.has_tool_calls() {
                rounds += 1;
                debug!(round = rounds, calls = message.tool_calls().len(), "model requested tools");
                let calls: Vec<ToolCallBlock> =
                    message.tool_calls().into_iter().cloned().collect();
                messages.push(Message::Assistant(message));
                for call in &calls {
                    messages.push(self.execute_tool(call).await);
                }
                continue;
            }

            return Ok(message.text_content());
        }
    }
}
