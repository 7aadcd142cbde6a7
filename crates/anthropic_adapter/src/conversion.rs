//! Anthropic to Copilot Conversion
//!
//! Maps Anthropic Messages requests onto the upstream chat completion shape
//! and complete upstream responses back onto Anthropic messages.

use crate::models::*;
use copilot_client::api::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Content, ContentPart,
    FunctionCall, FunctionDefinition, Role, Tool, ToolCall, ToolChoice,
};
use log::warn;
use serde_json::{json, Value};

/// Map an upstream finish reason onto an Anthropic stop reason.
pub fn map_stop_reason(finish_reason: Option<&str>) -> &'static str {
    match finish_reason {
        Some("stop") => "end_turn",
        Some("length") => "max_tokens",
        Some("tool_calls") | Some("function_call") => "tool_use",
        Some("content_filter") => "stop_sequence",
        _ => "end_turn",
    }
}

/// Flatten the system prompt; text blocks are joined with newlines.
pub fn system_text(system: Option<&AnthropicSystem>) -> String {
    match system {
        None => String::new(),
        Some(AnthropicSystem::Text(text)) => text.clone(),
        Some(AnthropicSystem::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|block| match block {
                AnthropicSystemBlock::Text { text } => Some(text.as_str()),
                AnthropicSystemBlock::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn to_role(role: AnthropicRole) -> Role {
    match role {
        AnthropicRole::User => Role::User,
        AnthropicRole::Assistant => Role::Assistant,
        AnthropicRole::System => Role::System,
    }
}

/// Convert Anthropic messages and system prompt into upstream chat messages
pub fn convert_messages(
    messages: &[AnthropicMessage],
    system: Option<&AnthropicSystem>,
) -> Vec<ChatMessage> {
    let mut out_messages = Vec::new();

    let system_text = system_text(system);
    if !system_text.is_empty() {
        out_messages.push(ChatMessage::text(Role::System, system_text));
    }

    for message in messages {
        let role = to_role(message.role);
        let blocks = match &message.content {
            AnthropicContent::Text(text) => {
                out_messages.push(ChatMessage::text(role, text.clone()));
                continue;
            }
            AnthropicContent::Blocks(blocks) if blocks.is_empty() => {
                out_messages.push(ChatMessage::text(role, ""));
                continue;
            }
            AnthropicContent::Blocks(blocks) => blocks,
        };

        let mut user_parts = Vec::new();
        let mut assistant_text = Vec::new();
        let mut tool_calls = Vec::new();

        for block in blocks {
            match (block, message.role) {
                (AnthropicContentBlock::Text { text }, AnthropicRole::User) => {
                    user_parts.push(ContentPart::text(text.clone()));
                }
                (AnthropicContentBlock::Text { text }, AnthropicRole::Assistant) => {
                    assistant_text.push(text.as_str());
                }
                (AnthropicContentBlock::Image { source }, AnthropicRole::User) => {
                    if let Some(part) = image_part(source) {
                        user_parts.push(part);
                    }
                }
                (AnthropicContentBlock::ToolUse { id, name, input }, AnthropicRole::Assistant) => {
                    let arguments = serde_json::to_string(input).unwrap_or_else(|e| {
                        warn!("Failed to serialize tool input for {name}: {e}");
                        "{}".to_string()
                    });
                    tool_calls.push(ToolCall {
                        id: Some(id.clone()),
                        tool_type: "function".to_string(),
                        function: FunctionCall {
                            name: name.clone(),
                            arguments,
                        },
                    });
                }
                (
                    AnthropicContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    },
                    AnthropicRole::User,
                ) => {
                    out_messages.push(ChatMessage::tool_result(
                        tool_use_id.clone(),
                        serialize_tool_result(content),
                    ));
                }
                _ => {}
            }
        }

        match message.role {
            AnthropicRole::User => {
                if let Some(user_message) = user_message(user_parts) {
                    out_messages.push(user_message);
                }
            }
            AnthropicRole::Assistant => {
                let text = assistant_text
                    .into_iter()
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                match (text.is_empty(), tool_calls.is_empty()) {
                    (false, false) => {
                        out_messages.push(ChatMessage::text(Role::Assistant, text));
                        out_messages.push(ChatMessage::tool_calls(tool_calls));
                    }
                    (false, true) => out_messages.push(ChatMessage::text(Role::Assistant, text)),
                    (true, false) => out_messages.push(ChatMessage::tool_calls(tool_calls)),
                    (true, true) => out_messages.push(ChatMessage::text(Role::Assistant, "")),
                }
            }
            AnthropicRole::System => {}
        }
    }

    out_messages
}

fn image_part(source: &AnthropicImageSource) -> Option<ContentPart> {
    if source.source_type != "base64" {
        warn!("Skipping image with unsupported source type {}", source.source_type);
        return None;
    }
    let media_type = source.media_type.as_deref().unwrap_or_default();
    let data = source.data.as_deref().unwrap_or_default();
    Some(ContentPart::image_url(format!(
        "data:{media_type};base64,{data}"
    )))
}

/// A single text part collapses to plain string content.
fn user_message(mut parts: Vec<ContentPart>) -> Option<ChatMessage> {
    match parts.len() {
        0 => None,
        1 if !parts[0].is_image() => match parts.remove(0) {
            ContentPart::Text { text, .. } | ContentPart::InputText { text, .. } => {
                Some(ChatMessage::text(Role::User, text))
            }
            other => Some(ChatMessage::parts(Role::User, vec![other])),
        },
        _ => Some(ChatMessage::parts(Role::User, parts)),
    }
}

/// Render a `tool_result` content value as the upstream tool message text.
///
/// Strings pass through. Lists join text items verbatim and JSON-encode
/// everything else, one item per line.
pub fn serialize_tool_result(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("text") => {
                    match map.get("text") {
                        Some(Value::String(text)) => text.clone(),
                        Some(other) => other.to_string(),
                        None => encode_item(item),
                    }
                }
                _ => encode_item(item),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => serde_json::to_string(other).unwrap_or_else(|_| {
            json!({"error": "Serialization failed", "original_type": json_type(other)}).to_string()
        }),
    }
}

fn encode_item(item: &Value) -> String {
    serde_json::to_string(item)
        .unwrap_or_else(|_| format!("<unserializable_item type='{}'>", json_type(item)))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert Anthropic tool definitions; an absent or empty list yields `None`.
pub fn convert_tools(tools: Option<&[AnthropicTool]>) -> Option<Vec<Tool>> {
    let tools = tools.filter(|tools| !tools.is_empty())?;
    Some(
        tools
            .iter()
            .map(|tool| Tool {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone().unwrap_or_default(),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect(),
    )
}

pub fn convert_tool_choice(choice: Option<&AnthropicToolChoice>) -> Option<ToolChoice> {
    let choice = choice?;
    match (choice.choice_type.as_str(), choice.name.as_deref()) {
        ("tool", Some(name)) if !name.is_empty() => Some(ToolChoice::function(name)),
        _ => Some(ToolChoice::auto()),
    }
}

/// Build the upstream request for an Anthropic messages call targeting `copilot_model`.
pub fn build_upstream_request(
    request: &AnthropicMessagesRequest,
    copilot_model: &str,
) -> ChatCompletionRequest {
    let mut upstream = ChatCompletionRequest::new(
        copilot_model,
        convert_messages(&request.messages, request.system.as_ref()),
    );
    upstream.stream = Some(request.is_stream());
    upstream.max_tokens = request.max_tokens;
    upstream.tools = convert_tools(request.tools.as_deref());
    upstream.tool_choice = convert_tool_choice(request.tool_choice.as_ref());

    if let Some(temperature) = request.temperature {
        upstream
            .parameters
            .insert("temperature".to_string(), json!(temperature));
    }
    if let Some(top_p) = request.top_p {
        upstream.parameters.insert("top_p".to_string(), json!(top_p));
    }
    if let Some(stop_sequences) = request.stop_sequences.as_ref().filter(|s| !s.is_empty()) {
        upstream
            .parameters
            .insert("stop".to_string(), json!(stop_sequences));
    }

    upstream
}

/// Decode tool arguments; non-objects are wrapped and bad JSON is kept raw.
pub fn parse_tool_arguments(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        Ok(value) => json!({ "value": value }),
        Err(e) => {
            warn!("Failed to parse tool arguments: {e}");
            json!({ "error_parsing_arguments": arguments })
        }
    }
}

/// Convert a complete upstream response into an Anthropic message
pub fn convert_messages_response(
    response: &ChatCompletionResponse,
    response_model: &str,
    request_id: &str,
) -> AnthropicMessagesResponse {
    let mut content_blocks = Vec::new();
    let mut stop_reason = "end_turn";

    if let Some(choice) = response.choices.first() {
        let finish_reason = choice.finish_reason.as_deref();
        stop_reason = map_stop_reason(finish_reason);

        if let Some(text) = choice.message.content.as_ref().filter(|text| !text.is_empty()) {
            content_blocks.push(AnthropicResponseContentBlock::Text { text: text.clone() });
        }

        let tool_calls = choice.message.tool_calls.as_deref().unwrap_or_default();
        for (i, tool_call) in tool_calls.iter().enumerate() {
            if tool_call.tool_type != "function" {
                continue;
            }
            content_blocks.push(AnthropicResponseContentBlock::ToolUse {
                id: tool_call
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("tool_{request_id}_{i}")),
                name: tool_call.function.name.clone(),
                input: parse_tool_arguments(&tool_call.function.arguments),
            });
        }

        if finish_reason == Some("tool_calls") {
            stop_reason = "tool_use";
        }
    }

    if content_blocks.is_empty() {
        content_blocks.push(AnthropicResponseContentBlock::Text {
            text: String::new(),
        });
    }

    let id = match response.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => format!("msg_{id}"),
        None => format!("msg_{request_id}_completed"),
    };

    AnthropicMessagesResponse {
        id,
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        model: response_model.to_string(),
        content: content_blocks,
        stop_reason: stop_reason.to_string(),
        usage: AnthropicUsage::default(),
    }
}
