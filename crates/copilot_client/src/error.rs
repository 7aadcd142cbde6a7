use thiserror::Error;

/// A non-success HTTP response from GitHub or Copilot.
///
/// `message` is a short summary suitable for clients; `body` is the raw
/// response text as returned by the upstream service.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub message: String,
    pub status: u16,
    pub body: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CopilotError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Copilot token not found")]
    MissingToken,

    #[error("GitHub token not found")]
    MissingGithubToken,

    #[error("proxy_auth_required")]
    ProxyAuthRequired,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest_middleware::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode upstream payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Error in SSE stream: {0}")]
    Stream(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CopilotError> = std::result::Result<T, E>;
