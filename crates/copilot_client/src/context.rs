use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::anyhow;
use reqwest::{Client, Proxy};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use tokio::sync::RwLock;

use crate::api::models::ModelsResponse;
use crate::config::{Config, FALLBACK_VSCODE_VERSION};

/// Process-wide runtime state shared by request handlers and background tasks.
///
/// Built once at startup and handed out as `Arc<CopilotContext>`. Mutable
/// slots sit behind `RwLock`s so the token refresher can swap the bearer
/// token while requests keep reading it.
#[derive(Debug)]
pub struct CopilotContext {
    config: Config,
    app_dir: PathBuf,
    client: Arc<ClientWithMiddleware>,
    vscode_version: RwLock<String>,
    github_token: RwLock<Option<String>>,
    copilot_token: RwLock<Option<String>>,
    models: RwLock<Option<ModelsResponse>>,
}

impl CopilotContext {
    pub fn new(config: Config, app_dir: PathBuf) -> anyhow::Result<Self> {
        let client = build_http_client(&config)?;
        let client = Arc::new(build_retry_client(client, config.max_retries));

        Ok(Self {
            config,
            app_dir,
            client,
            vscode_version: RwLock::new(FALLBACK_VSCODE_VERSION.to_string()),
            github_token: RwLock::new(None),
            copilot_token: RwLock::new(None),
            models: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn app_dir(&self) -> &PathBuf {
        &self.app_dir
    }

    pub fn http_client(&self) -> Arc<ClientWithMiddleware> {
        Arc::clone(&self.client)
    }

    pub fn copilot_base_url(&self) -> String {
        self.config.copilot_base_url()
    }

    pub async fn vscode_version(&self) -> String {
        self.vscode_version.read().await.clone()
    }

    pub async fn set_vscode_version(&self, version: impl Into<String>) {
        *self.vscode_version.write().await = version.into();
    }

    pub async fn github_token(&self) -> Option<String> {
        self.github_token.read().await.clone()
    }

    pub async fn set_github_token(&self, token: impl Into<String>) {
        *self.github_token.write().await = Some(token.into());
    }

    pub async fn copilot_token(&self) -> Option<String> {
        self.copilot_token.read().await.clone()
    }

    pub async fn set_copilot_token(&self, token: impl Into<String>) {
        *self.copilot_token.write().await = Some(token.into());
    }

    /// Runs `f` against the cached registry under the read lock.
    pub async fn with_models<R>(&self, f: impl FnOnce(Option<&ModelsResponse>) -> R) -> R {
        let models = self.models.read().await;
        f(models.as_ref())
    }

    pub async fn set_models(&self, models: ModelsResponse) {
        *self.models.write().await = Some(models);
    }

    /// `max_output_tokens` advertised by the cached registry for `model_id`.
    pub async fn max_output_tokens(&self, model_id: &str) -> Option<u32> {
        self.models
            .read()
            .await
            .as_ref()?
            .find(model_id)?
            .max_output_tokens()
    }
}

fn build_http_client(config: &Config) -> anyhow::Result<Client> {
    let mut builder = Client::builder();
    if config.http_proxy.is_empty() && config.https_proxy.is_empty() {
        builder = builder.no_proxy();
    }
    if !config.http_proxy.is_empty() {
        builder = builder.proxy(Proxy::http(&config.http_proxy)?);
    }
    if !config.https_proxy.is_empty() {
        builder = builder.proxy(Proxy::https(&config.https_proxy)?);
    }
    builder
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {e}"))
}

fn build_retry_client(client: Client, max_retries: u32) -> ClientWithMiddleware {
    // Exponential backoff between 1s and 8s with jitter
    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(Duration::from_secs(1), Duration::from_secs(8))
        .build_with_max_retries(max_retries);

    ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn max_output_tokens_comes_from_cached_registry() {
        let context = CopilotContext::new(Config::default(), std::env::temp_dir()).expect("context");
        assert_eq!(context.max_output_tokens("gpt-4o").await, None);

        let models: ModelsResponse = serde_json::from_value(json!({
            "data": [{"id": "gpt-4o", "capabilities": {"limits": {"max_output_tokens": 16384}}}]
        }))
        .expect("models");
        context.set_models(models).await;

        assert_eq!(context.max_output_tokens("gpt-4o").await, Some(16384));
        assert_eq!(context.max_output_tokens("unknown").await, None);

        let first = context
            .with_models(|models| models.and_then(|m| m.ids().next().map(str::to_string)))
            .await;
        assert_eq!(first.as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn tokens_start_empty_and_can_be_replaced() {
        let context = CopilotContext::new(Config::default(), std::env::temp_dir()).expect("context");
        assert!(context.copilot_token().await.is_none());

        context.set_copilot_token("first").await;
        context.set_copilot_token("second").await;
        assert_eq!(context.copilot_token().await.as_deref(), Some("second"));
        assert_eq!(context.vscode_version().await, FALLBACK_VSCODE_VERSION);
    }
}
