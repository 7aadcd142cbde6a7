use async_trait::async_trait;
use serde_json::Value;

use crate::api::client::ChatCompletionOutcome;
use crate::api::models::{ChatCompletionRequest, ModelsResponse};
use crate::error::Result;

#[async_trait]
pub trait CopilotClientTrait: Send + Sync {
    /// Sends a chat completion upstream. Non-success statuses are returned as
    /// [`crate::CopilotError::Upstream`] before any stream event is produced.
    async fn create_chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionOutcome>;

    /// Fills `max_tokens` from the cached model registry when the caller left it unset.
    async fn inject_default_max_tokens(&self, request: &mut ChatCompletionRequest);

    async fn get_models(&self) -> Result<ModelsResponse>;

    /// Picks a model id with `select`, which sees the cached registry without copying it.
    async fn select_cached_model(
        &self,
        select: &(dyn for<'m> Fn(Option<&'m ModelsResponse>) -> String + Sync),
    ) -> String;

    async fn create_embeddings(&self, payload: Value) -> Result<Value>;
}
