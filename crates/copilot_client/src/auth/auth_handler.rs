use std::{
    fs,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;

use crate::config::{GITHUB_APP_SCOPES, GITHUB_CLIENT_ID};
use crate::context::CopilotContext;
use crate::error::{CopilotError, Result};
use crate::paths::{github_token_path, restrict_permissions};
use crate::utils::http_utils::{
    error_for_status, github_headers, github_user_headers, standard_headers,
};

const GITHUB_TIMEOUT: Duration = Duration::from_secs(20);
const COPILOT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_expires_in() -> u64 {
    900
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct AccessTokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CopilotTokenResponse {
    pub token: String,
    #[serde(default)]
    pub expires_at: u64,
    #[serde(default = "default_refresh_in")]
    pub refresh_in: u64,
}

fn default_refresh_in() -> u64 {
    3600
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GithubUser {
    pub login: String,
}

// Struct for handling the GitHub device flow and Copilot token exchange
#[derive(Debug, Clone)]
pub struct CopilotAuthHandler {
    context: Arc<CopilotContext>,
}

impl CopilotAuthHandler {
    pub fn new(context: Arc<CopilotContext>) -> Self {
        CopilotAuthHandler { context }
    }

    pub fn context(&self) -> &Arc<CopilotContext> {
        &self.context
    }

    pub async fn get_device_code(&self) -> Result<DeviceCodeResponse> {
        let url = format!("{}/login/device/code", self.context.config().github_base);
        let response = self
            .context
            .http_client()
            .post(&url)
            .headers(standard_headers())
            .timeout(GITHUB_TIMEOUT)
            .json(&json!({
                "client_id": GITHUB_CLIENT_ID,
                "scope": GITHUB_APP_SCOPES,
            }))
            .send()
            .await?;
        let response = error_for_status(response, "Failed to get device code").await?;

        Ok(response.json::<DeviceCodeResponse>().await?)
    }

    /// Polls until the user approves the device code or the code expires.
    pub async fn poll_access_token(&self, device_code: &DeviceCodeResponse) -> anyhow::Result<String> {
        let url = format!("{}/login/oauth/access_token", self.context.config().github_base);
        let interval = Duration::from_secs(device_code.interval + 1);
        let deadline = Instant::now() + Duration::from_secs(device_code.expires_in);
        debug!("Polling access token with interval of {}ms", interval.as_millis());

        loop {
            let response = self
                .context
                .http_client()
                .post(&url)
                .headers(standard_headers())
                .timeout(GITHUB_TIMEOUT)
                .json(&json!({
                    "client_id": GITHUB_CLIENT_ID,
                    "device_code": device_code.device_code,
                    "grant_type": "urn:ietf:params:oauth:grant-type:device_code",
                }))
                .send()
                .await?;

            if response.status().is_success() {
                let payload = response.json::<AccessTokenResponse>().await?;
                debug!("Polling access token response: {:?}", payload.error);
                if let Some(token) = payload.access_token.filter(|token| !token.is_empty()) {
                    return Ok(token);
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                error!("Failed to poll access token: {body}");
            }

            if Instant::now() >= deadline {
                return Err(anyhow!("Device code expired before authorization completed"));
            }
            sleep(interval).await;
        }
    }

    pub async fn get_github_user(&self) -> Result<GithubUser> {
        let github_token = self
            .context
            .github_token()
            .await
            .ok_or(CopilotError::MissingGithubToken)?;
        let url = format!("{}/user", self.context.config().github_api_base);

        let response = self
            .context
            .http_client()
            .get(&url)
            .headers(github_user_headers(&github_token))
            .timeout(GITHUB_TIMEOUT)
            .send()
            .await?;
        let response = error_for_status(response, "Failed to get GitHub user").await?;

        Ok(response.json::<GithubUser>().await?)
    }

    pub async fn get_copilot_token(&self) -> Result<CopilotTokenResponse> {
        let github_token = self
            .context
            .github_token()
            .await
            .ok_or(CopilotError::MissingGithubToken)?;
        let vscode_version = self.context.vscode_version().await;
        let url = format!(
            "{}/copilot_internal/v2/token",
            self.context.config().github_api_base
        );

        let response = self
            .context
            .http_client()
            .get(&url)
            .headers(github_headers(&github_token, &vscode_version))
            .timeout(COPILOT_TOKEN_TIMEOUT)
            .send()
            .await?;
        let response = error_for_status(response, "Failed to get Copilot token").await?;

        Ok(response.json::<CopilotTokenResponse>().await?)
    }

    /// Loads the persisted GitHub token, or runs the device flow when there is
    /// none (or `force` is set) and persists the result.
    pub async fn setup_github_token(&self, force: bool) -> anyhow::Result<()> {
        let token_path = github_token_path(self.context.app_dir());

        if !force {
            if let Some(token) = read_github_token(&token_path) {
                self.context.set_github_token(token).await;
                self.log_user().await?;
                return Ok(());
            }
        }

        info!("Not logged in, getting new access token");
        let device_code = self
            .get_device_code()
            .await
            .context("Failed to get GitHub token")?;
        debug!("Device code response: {device_code:?}");

        info!(
            "Please enter the code \"{}\" in {}",
            device_code.user_code, device_code.verification_uri
        );
        println!("{}", device_code_banner(&device_code));

        let token = self.poll_access_token(&device_code).await?;
        write_github_token(&token_path, &token)?;
        self.context.set_github_token(token).await;
        self.log_user().await?;
        Ok(())
    }

    async fn log_user(&self) -> anyhow::Result<()> {
        let user = self.get_github_user().await?;
        info!("Logged in as {}", user.login);
        Ok(())
    }
}

fn device_code_banner(device_code: &DeviceCodeResponse) -> String {
    format!(
        "GitHub Device Authorization\nVerification URL: {}\nUser Code: {}\n",
        device_code.verification_uri, device_code.user_code
    )
}

pub(crate) fn read_github_token(token_path: &Path) -> Option<String> {
    let token = fs::read_to_string(token_path).ok()?;
    let trimmed = token.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn write_github_token(token_path: &Path, token: &str) -> anyhow::Result<()> {
    if let Some(parent) = token_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(token_path, token)
        .with_context(|| format!("Failed to write {}", token_path.display()))?;
    restrict_permissions(token_path)?;
    Ok(())
}
