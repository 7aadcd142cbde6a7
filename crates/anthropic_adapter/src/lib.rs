//! Anthropic API Adapter
//!
//! Converts Anthropic Messages requests into Copilot chat completions and
//! translates complete and streamed responses back into the Anthropic format.

pub mod conversion;
pub mod model_mapping;
pub mod models;
pub mod stream;

pub use models::{
    AnthropicContent, AnthropicContentBlock, AnthropicCountTokensRequest,
    AnthropicCountTokensResponse, AnthropicError, AnthropicErrorDetail, AnthropicErrorEnvelope,
    AnthropicImageSource, AnthropicMessage, AnthropicMessagesRequest, AnthropicMessagesResponse,
    AnthropicResponseContentBlock, AnthropicRole, AnthropicSystem, AnthropicSystemBlock,
    AnthropicTool, AnthropicToolChoice, AnthropicUsage,
};

pub use model_mapping::{select_copilot_model, DEFAULT_COPILOT_MODEL};

pub use conversion::{
    build_upstream_request, convert_messages, convert_messages_response, convert_tool_choice,
    convert_tools, map_stop_reason, serialize_tool_result,
};

pub use stream::{pump_anthropic_stream, AnthropicStreamTranslator, SseEvent};
