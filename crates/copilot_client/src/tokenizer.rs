//! Character-based token estimation.
//!
//! These numbers are an approximation (about four characters per token) used
//! for logging and client-visible usage hints. They are not the provider's
//! authoritative token count.

use serde::Serialize;

use crate::api::models::{ChatMessage, Content, ContentPart, Role};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenCount {
    pub input: u32,
    pub output: u32,
}

/// Estimated tokens for a piece of text: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    (chars + 3) / 4
}

/// Buckets assistant messages into `output` and everything else into `input`.
pub fn get_token_count(messages: &[ChatMessage]) -> TokenCount {
    messages
        .iter()
        .fold(TokenCount::default(), |mut count, message| {
            let tokens = estimate_tokens(&message_text(message));
            if message.role == Role::Assistant {
                count.output += tokens;
            } else {
                count.input += tokens;
            }
            count
        })
}

fn message_text(message: &ChatMessage) -> String {
    match &message.content {
        Some(Content::Text(text)) => text.clone(),
        Some(Content::Parts(parts)) => parts
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join(" "),
        None => {
            if let Some(tool_calls) = message.tool_calls.as_ref().filter(|calls| !calls.is_empty()) {
                return tool_calls
                    .iter()
                    .map(|call| {
                        format!(
                            "Function call: {}({})",
                            call.function.name, call.function.arguments
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
            }
            match (&message.role, &message.name) {
                (Role::Tool, Some(name)) if !name.is_empty() => {
                    format!("Tool response from {name}")
                }
                _ => String::new(),
            }
        }
    }
}
