use std::{sync::Arc, time::Duration};

use log::info;

use crate::api::models::ModelsResponse;
use crate::context::CopilotContext;
use crate::error::{CopilotError, Result};
use crate::utils::http_utils::{copilot_headers, error_for_status};

const MODELS_TIMEOUT: Duration = Duration::from_secs(30);

// Struct for handling the model registry
#[derive(Debug, Clone)]
pub(crate) struct CopilotModelsHandler {
    context: Arc<CopilotContext>,
}

impl CopilotModelsHandler {
    pub(crate) fn new(context: Arc<CopilotContext>) -> Self {
        CopilotModelsHandler { context }
    }

    pub(crate) async fn fetch_models(&self) -> Result<ModelsResponse> {
        let token = self
            .context
            .copilot_token()
            .await
            .ok_or(CopilotError::MissingToken)?;
        let vscode_version = self.context.vscode_version().await;
        let url = format!("{}/models", self.context.copilot_base_url());

        let response = self
            .context
            .http_client()
            .get(&url)
            .headers(copilot_headers(&token, &vscode_version, false))
            .timeout(MODELS_TIMEOUT)
            .send()
            .await?;
        let response = error_for_status(response, "Failed to get models").await?;

        Ok(response.json::<ModelsResponse>().await?)
    }

    /// Fetches the registry and stores it in the context for max-token lookups.
    pub(crate) async fn cache_models(&self) -> Result<ModelsResponse> {
        let models = self.fetch_models().await?;
        let listing = models
            .ids()
            .map(|id| format!("- {id}"))
            .collect::<Vec<_>>()
            .join("\n");
        info!("Available models:\n{listing}");
        self.context.set_models(models.clone()).await;
        Ok(models)
    }
}
