//! Anthropic API Models
//!
//! Request and response types for Anthropic Messages API compatibility.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Anthropic Messages API Request
#[derive(Deserialize, Debug, Clone)]
pub struct AnthropicMessagesRequest {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<AnthropicMessage>,
    #[serde(default)]
    pub system: Option<AnthropicSystem>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(default)]
    pub tool_choice: Option<AnthropicToolChoice>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl AnthropicMessagesRequest {
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Body of `/v1/messages/count_tokens`
#[derive(Deserialize, Debug, Clone)]
pub struct AnthropicCountTokensRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<AnthropicMessage>,
    #[serde(default)]
    pub system: Option<AnthropicSystem>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AnthropicCountTokensResponse {
    pub input_tokens: u32,
}

/// Anthropic Message
#[derive(Deserialize, Debug, Clone)]
pub struct AnthropicMessage {
    pub role: AnthropicRole,
    pub content: AnthropicContent,
}

/// Anthropic Role
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnthropicRole {
    User,
    Assistant,
    System,
}

/// Anthropic Content (text or blocks)
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

/// Anthropic Content Block
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Image {
        source: AnthropicImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
    },
    /// Block types the upstream has no counterpart for (documents, thinking, ...).
    #[serde(other)]
    Unsupported,
}

/// Image payload; only `base64` sources are forwarded.
#[derive(Deserialize, Debug, Clone)]
pub struct AnthropicImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Anthropic System Prompt
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum AnthropicSystem {
    Text(String),
    Blocks(Vec<AnthropicSystemBlock>),
}

/// Anthropic System Block
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicSystemBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Unsupported,
}

/// Anthropic Tool Definition
#[derive(Deserialize, Debug, Clone)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

/// Anthropic Tool Choice: `{"type": "auto" | "any" | "tool" | ..., "name"?}`
#[derive(Deserialize, Debug, Clone)]
pub struct AnthropicToolChoice {
    #[serde(rename = "type", default)]
    pub choice_type: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Anthropic Messages API Response
#[derive(Serialize, Debug, Clone)]
pub struct AnthropicMessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub response_type: String,
    pub role: String,
    pub model: String,
    pub content: Vec<AnthropicResponseContentBlock>,
    pub stop_reason: String,
    pub usage: AnthropicUsage,
}

/// Anthropic Response Content Block
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicResponseContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
}

/// Anthropic Usage Information
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Anthropic Error Response
#[derive(Serialize, Debug, Clone)]
pub struct AnthropicErrorEnvelope {
    #[serde(rename = "type")]
    pub error_type: String,
    pub error: AnthropicErrorDetail,
}

/// Anthropic Error Detail
#[derive(Serialize, Debug, Clone)]
pub struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// Anthropic Error
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error_type}: {message}")]
pub struct AnthropicError {
    pub status: u16,
    pub error_type: String,
    pub message: String,
}

impl AnthropicError {
    pub fn new(status: u16, error_type: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type: error_type.to_string(),
            message: message.into(),
        }
    }

    /// `invalid_request_error` for 4xx statuses, `api_error` otherwise.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let error_type = if (400..500).contains(&status) {
            "invalid_request_error"
        } else {
            "api_error"
        };
        Self::new(status, error_type, message)
    }

    pub fn envelope(&self) -> AnthropicErrorEnvelope {
        AnthropicErrorEnvelope {
            error_type: "error".to_string(),
            error: AnthropicErrorDetail {
                error_type: self.error_type.clone(),
                message: self.message.clone(),
            },
        }
    }
}
