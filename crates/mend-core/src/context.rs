use crate::messages::Message;
use crate::tools::ToolDefinition;

/// The complete context sent to a provider for one completion.
#[derive(Clone, Debug, Default)]
pub struct LlmContext {
    /// Instruction lines, sent as the system prompt in order.
    pub instructions: Vec<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

impl LlmContext {
    pub fn new(instructions: Vec<String>) -> Self {
        Self {
            instructions,
            messages: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// The instruction lines joined into a single system prompt.
    pub fn system_prompt(&self) -> String {
        self.instructions.join("\n")
    }
}
