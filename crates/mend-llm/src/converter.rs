//! Conversion between `LlmContext` and the chat-completions wire format.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::{json, Value};

use mend_core::context::LlmContext;
use mend_core::errors::GatewayError;
use mend_core::ids::ToolCallId;
use mend_core::messages::{
    AssistantContent, AssistantMessage, Message, StopReason, ToolCallBlock, UserContent,
};
use mend_core::provider::{Completion, CompletionOptions, TokenUsage};

/// Base64 data URLs for staged images, keyed by path.
pub type EncodedImages = HashMap<PathBuf, String>;

/// Build a data URL for an image.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    use base64::Engine as _;
    format!(
        "data:{mime_type};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Convert a full LlmContext into the chat-completions request body.
///
/// Every image referenced by the context must be present in `images`.
pub fn build_request_body(
    context: &LlmContext,
    options: &CompletionOptions,
    model: &str,
    images: &EncodedImages,
) -> Result<Value, GatewayError> {
    let mut body = json!({ "model": model });

    if let Some(max) = options.max_tokens {
        body["max_tokens"] = json!(max);
    }
    if let Some(temp) = options.temperature {
        body["temperature"] = json!(temp);
    }

    let mut messages = Vec::with_capacity(context.messages.len() + 1);
    if !context.instructions.is_empty() {
        messages.push(json!({"role": "system", "content": context.system_prompt()}));
    }
    for message in &context.messages {
        messages.push(convert_message(message, images)?);
    }
    body["messages"] = json!(messages);

    if !context.tools.is_empty() {
        let tools: Vec<Value> = context
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }

    Ok(body)
}

fn convert_message(message: &Message, images: &EncodedImages) -> Result<Value, GatewayError> {
    match message {
        Message::User(user) => {
            let mut parts = Vec::with_capacity(user.content.len());
            for part in &user.content {
                match part {
                    UserContent::Text { text } => {
                        parts.push(json!({"type": "text", "text": text}));
                    }
                    UserContent::Image { path, .. } => {
                        let url = images.get(path).ok_or_else(|| {
                            GatewayError::InvalidRequest(format!(
                                "image not loaded: {}",
                                path.display()
                            ))
                        })?;
                        parts.push(json!({"type": "image_url", "image_url": {"url": url}}));
                    }
                }
            }
            Ok(json!({"role": "user", "content": parts}))
        }
        Message::Assistant(assistant) => {
            let text = assistant.text_content();
            let mut entry = json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { json!(text) },
            });
            let calls: Vec<Value> = assistant
                .tool_calls()
                .into_iter()
                .map(|tc| {
                    json!({
                        "id": tc.id.as_str(),
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string(),
                        }
                    })
                })
                .collect();
            if !calls.is_empty() {
                entry["tool_calls"] = json!(calls);
            }
            Ok(entry)
        }
        Message::ToolResult(result) => Ok(json!({
            "role": "tool",
            "tool_call_id": result.tool_call_id.as_str(),
            "content": result.content,
        })),
    }
}

/// Parse a chat-completions response body.
pub fn parse_response(body: &Value) -> Result<Completion, GatewayError> {
    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| GatewayError::MalformedResponse("response has no choices".into()))?;
    let message = &choice["message"];
    if !message.is_object() {
        return Err(GatewayError::MalformedResponse(
            "choice has no message".into(),
        ));
    }

    let mut content = Vec::new();
    if let Some(text) = message["content"].as_str() {
        if !text.is_empty() {
            content.push(AssistantContent::Text {
                text: text.to_string(),
            });
        }
    }

    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"].as_str().ok_or_else(|| {
                GatewayError::MalformedResponse("tool call without id".into())
            })?;
            let name = call["function"]["name"].as_str().ok_or_else(|| {
                GatewayError::MalformedResponse("tool call without function name".into())
            })?;
            let raw_args = call["function"]["arguments"].as_str().unwrap_or("{}");
            // Unparseable arguments are passed through so the tool can report them.
            let arguments = serde_json::from_str(raw_args)
                .unwrap_or_else(|_| Value::String(raw_args.to_string()));
            content.push(AssistantContent::ToolCall(ToolCallBlock {
                id: ToolCallId::from_raw(id),
                name: name.to_string(),
                arguments,
            }));
        }
    }

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("tool_calls") | Some("function_call") => Some(StopReason::ToolUse),
        Some("length") => Some(StopReason::MaxTokens),
        Some("content_filter") => Some(StopReason::ContentFilter),
        Some(_) => Some(StopReason::EndTurn),
        None => None,
    };

    let usage = body["usage"].as_object().map(|u| TokenUsage {
        input_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        output_tokens: u
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
    });

    Ok(Completion {
        message: AssistantMessage {
            content,
            stop_reason,
        },
        usage,
        model: body["model"].as_str().unwrap_or_default().to_string(),
    })
}
