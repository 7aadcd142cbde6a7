use log::{error, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use uuid::Uuid;

use crate::config::{API_VERSION, COPILOT_VERSION};
use crate::error::{CopilotError, UpstreamError};

pub fn editor_plugin_version() -> String {
    format!("copilot-chat/{COPILOT_VERSION}")
}

pub fn user_agent() -> String {
    format!("GitHubCopilotChat/{COPILOT_VERSION}")
}

/// JSON content negotiation headers used for every GitHub call.
pub fn standard_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("accept", HeaderValue::from_static("application/json"));
    headers
}

/// Headers the Copilot chat API expects from the VSCode chat extension.
pub fn copilot_headers(token: &str, vscode_version: &str, vision: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, AUTHORIZATION, format!("Bearer {token}"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("copilot-integration-id", HeaderValue::from_static("vscode-chat"));
    insert_named(&mut headers, "editor-version", format!("vscode/{vscode_version}"));
    insert_named(&mut headers, "editor-plugin-version", editor_plugin_version());
    insert_named(&mut headers, "user-agent", user_agent());
    headers.insert("openai-intent", HeaderValue::from_static("conversation-panel"));
    headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
    insert_named(&mut headers, "x-request-id", Uuid::new_v4().to_string());
    headers.insert(
        "x-vscode-user-agent-library-version",
        HeaderValue::from_static("electron-fetch"),
    );
    if vision {
        headers.insert("copilot-vision-request", HeaderValue::from_static("true"));
    }
    headers
}

/// Headers for GitHub REST calls authenticated with the OAuth token.
pub fn github_headers(github_token: &str, vscode_version: &str) -> HeaderMap {
    let mut headers = standard_headers();
    insert(&mut headers, AUTHORIZATION, format!("token {github_token}"));
    insert_named(&mut headers, "editor-version", format!("vscode/{vscode_version}"));
    insert_named(&mut headers, "editor-plugin-version", editor_plugin_version());
    insert_named(&mut headers, "user-agent", user_agent());
    headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
    headers.insert(
        "x-vscode-user-agent-library-version",
        HeaderValue::from_static("electron-fetch"),
    );
    headers
}

/// Minimal headers for the GitHub identity endpoint.
pub fn github_user_headers(github_token: &str) -> HeaderMap {
    let mut headers = standard_headers();
    insert(&mut headers, AUTHORIZATION, format!("token {github_token}"));
    headers
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: String) {
    match HeaderValue::from_str(&value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => warn!("Skipping invalid value for header {name}: {e}"),
    }
}

fn insert_named(headers: &mut HeaderMap, name: &'static str, value: String) {
    insert(headers, HeaderName::from_static(name), value);
}

/// Passes successful responses through; otherwise reads the body into an
/// [`UpstreamError`] labelled with `message`.
pub async fn error_for_status(response: Response, message: &str) -> Result<Response, CopilotError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
        return Err(CopilotError::ProxyAuthRequired);
    }

    let body = response.text().await.unwrap_or_default();
    error!("{message}: status {status}, body {body}");
    Err(UpstreamError::new(message, status.as_u16(), body).into())
}
