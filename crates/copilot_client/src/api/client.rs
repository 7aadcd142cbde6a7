use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Response;
use serde_json::Value;

use crate::api::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Content, ContentPart,
    ModelsResponse, Role,
};
use crate::api::models_handler::CopilotModelsHandler;
use crate::api::stream::{chat_completion_events, UpstreamStream};
use crate::client_trait::CopilotClientTrait;
use crate::context::CopilotContext;
use crate::error::{CopilotError, Result, UpstreamError};
use crate::utils::http_utils::{copilot_headers, error_for_status};

const EMBEDDINGS_TIMEOUT: Duration = Duration::from_secs(90);

/// Result of a chat completion call: a full JSON body or an open event stream.
pub enum ChatCompletionOutcome {
    Complete(ChatCompletionResponse),
    Stream(UpstreamStream),
}

impl fmt::Debug for ChatCompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatCompletionOutcome::Complete(response) => {
                f.debug_tuple("Complete").field(response).finish()
            }
            ChatCompletionOutcome::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// Main Copilot Client struct
#[derive(Debug, Clone)]
pub struct CopilotClient {
    context: Arc<CopilotContext>,
    models_handler: CopilotModelsHandler,
}

impl CopilotClient {
    pub fn new(context: Arc<CopilotContext>) -> Self {
        let models_handler = CopilotModelsHandler::new(Arc::clone(&context));
        CopilotClient {
            context,
            models_handler,
        }
    }

    pub fn context(&self) -> &Arc<CopilotContext> {
        &self.context
    }

    pub async fn cache_models(&self) -> Result<ModelsResponse> {
        self.models_handler.cache_models().await
    }

    async fn bearer_token(&self) -> Result<String> {
        self.context
            .copilot_token()
            .await
            .ok_or(CopilotError::MissingToken)
    }

    async fn send_chat_completion_request(
        &self,
        request: &ChatCompletionRequest,
        vision: bool,
    ) -> Result<Response> {
        let token = self.bearer_token().await?;
        let vscode_version = self.context.vscode_version().await;
        let url = format!("{}/chat/completions", self.context.copilot_base_url());

        debug!(
            "Sending chat completion model={} messages={} stream={} vision={}",
            request.model,
            request.messages.len(),
            request.is_stream(),
            vision
        );

        let response = self
            .context
            .http_client()
            .post(&url)
            .headers(copilot_headers(&token, &vscode_version, vision))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send chat completion request: {e}");
                e
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(chat_completion_error(response, request.has_tools()).await)
        }
    }
}

/// Rewrites generic `input_image` parts to `image_url` on non-assistant, non-tool messages.
pub fn into_copilot_messages(messages: &mut [ChatMessage]) {
    for message in messages
        .iter_mut()
        .filter(|message| !matches!(message.role, Role::Assistant | Role::Tool))
    {
        if let Some(Content::Parts(parts)) = message.content.as_mut() {
            for part in parts.iter_mut() {
                if let ContentPart::InputImage { image_url, extra } = part {
                    *part = ContentPart::ImageUrl {
                        image_url: image_url.clone(),
                        extra: std::mem::take(extra),
                    };
                }
            }
        }
    }
}

/// True when any message carries an `image_url` part.
pub fn has_vision(messages: &[ChatMessage]) -> bool {
    messages.iter().any(|message| match &message.content {
        Some(Content::Parts(parts)) => parts
            .iter()
            .any(|part| matches!(part, ContentPart::ImageUrl { .. })),
        _ => false,
    })
}

async fn chat_completion_error(response: Response, has_tools: bool) -> CopilotError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    error!("Chat completion failed with status {status}: {body}");
    chat_completion_upstream_error(status, body, has_tools).into()
}

pub fn chat_completion_upstream_error(status: u16, body: String, has_tools: bool) -> UpstreamError {
    let message = if has_tools && status == 400 {
        format!(
            "Failed to create chat completions. GitHub Copilot may not support tool calls. Error: {body}"
        )
    } else {
        "Failed to create chat completions".to_string()
    };
    UpstreamError::new(message, status, body)
}

#[async_trait]
impl CopilotClientTrait for CopilotClient {
    async fn create_chat_completions(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChatCompletionOutcome> {
        into_copilot_messages(&mut request.messages);
        let vision = has_vision(&request.messages);
        if vision {
            info!("Request contains images, adding vision header");
        }

        let response = self.send_chat_completion_request(&request, vision).await?;

        if request.is_stream() {
            return Ok(ChatCompletionOutcome::Stream(chat_completion_events(response)));
        }

        let completion = response.json::<ChatCompletionResponse>().await?;
        Ok(ChatCompletionOutcome::Complete(completion))
    }

    async fn inject_default_max_tokens(&self, request: &mut ChatCompletionRequest) {
        if request.max_tokens.is_some() {
            return;
        }
        request.max_tokens = self.context.max_output_tokens(&request.model).await;
        if let Some(max_tokens) = request.max_tokens {
            debug!("Using max_tokens={max_tokens} from model registry for {}", request.model);
        }
    }

    async fn get_models(&self) -> Result<ModelsResponse> {
        self.models_handler.fetch_models().await
    }

    async fn select_cached_model(
        &self,
        select: &(dyn for<'m> Fn(Option<&'m ModelsResponse>) -> String + Sync),
    ) -> String {
        self.context.with_models(select).await
    }

    async fn create_embeddings(&self, payload: Value) -> Result<Value> {
        let token = self.bearer_token().await?;
        let vscode_version = self.context.vscode_version().await;
        let url = format!("{}/embeddings", self.context.copilot_base_url());

        let response = self
            .context
            .http_client()
            .post(&url)
            .headers(copilot_headers(&token, &vscode_version, false))
            .timeout(EMBEDDINGS_TIMEOUT)
            .json(&payload)
            .send()
            .await?;
        let response = error_for_status(response, "Failed to create embeddings").await?;

        Ok(response.json::<Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ImageUrl;

    fn image_part() -> ContentPart {
        ContentPart::InputImage {
            image_url: ImageUrl::from_url("data:image/png;base64,AAAA"),
            extra: Default::default(),
        }
    }

    #[test]
    fn input_images_are_rewritten_for_user_messages_only() {
        let mut messages = vec![
            ChatMessage::parts(Role::User, vec![image_part()]),
            ChatMessage::parts(Role::Assistant, vec![image_part()]),
        ];

        into_copilot_messages(&mut messages);

        assert!(matches!(
            messages[0].content,
            Some(Content::Parts(ref parts)) if matches!(parts[0], ContentPart::ImageUrl { .. })
        ));
        assert!(matches!(
            messages[1].content,
            Some(Content::Parts(ref parts)) if matches!(parts[0], ContentPart::InputImage { .. })
        ));
        assert!(has_vision(&messages));
    }

    #[test]
    fn text_only_requests_are_not_vision() {
        let messages = vec![ChatMessage::text(Role::User, "hello")];
        assert!(!has_vision(&messages));
    }

    #[test]
    fn bad_request_with_tools_flags_tool_support() {
        let error = chat_completion_upstream_error(400, "bad tools".to_string(), true);
        assert!(error.message.contains("may not support tool calls"));
        assert!(error.message.ends_with("Error: bad tools"));
        assert_eq!(error.status, 400);

        let plain = chat_completion_upstream_error(400, "bad".to_string(), false);
        assert_eq!(plain.message, "Failed to create chat completions");

        let server = chat_completion_upstream_error(500, "boom".to_string(), true);
        assert_eq!(server.message, "Failed to create chat completions");
        assert_eq!(server.body, "boom");
    }
}
