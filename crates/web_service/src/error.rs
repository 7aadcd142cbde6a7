use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use anthropic_adapter::AnthropicError;
use copilot_client::{CopilotError, UpstreamError};
use log::error;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Non-success response from the upstream provider.
    #[error("{0}")]
    Upstream(UpstreamError),

    /// Malformed client payload.
    #[error("{0}")]
    Validation(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },

    #[error("Request rejected")]
    Rejected,

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<CopilotError> for AppError {
    fn from(err: CopilotError) -> Self {
        match err {
            CopilotError::Upstream(upstream) => AppError::Upstream(upstream),
            CopilotError::ProxyAuthRequired => AppError::Upstream(UpstreamError::new(
                "Proxy authentication required",
                407,
                json!({ "message": "proxy_auth_required" }).to_string(),
            )),
            other => AppError::InternalError(other.into()),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Upstream(upstream) => {
                StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Rejected => StatusCode::FORBIDDEN,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// OpenAI-route message: the raw upstream body, or a `{"message"}` document
    /// for locally raised HTTP errors.
    fn raw_message(&self) -> String {
        match self {
            AppError::Upstream(upstream) => upstream.body.clone(),
            AppError::RateLimited { .. } | AppError::Rejected => {
                json!({ "message": self.to_string() }).to_string()
            }
            other => other.to_string(),
        }
    }

    fn summary_message(&self) -> String {
        match self {
            AppError::Upstream(upstream) => upstream.message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct JsonError {
    message: String,
    r#type: String,
}

#[derive(Serialize)]
struct JsonErrorWrapper {
    error: JsonError,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            error!("Request failed: {self}");
        }
        let error_response = JsonErrorWrapper {
            error: JsonError {
                message: self.raw_message(),
                r#type: "error".to_string(),
            },
        };
        let mut builder = HttpResponse::build(status_code);
        if let AppError::RateLimited { retry_after } = self {
            builder.insert_header(("Retry-After", retry_after.to_string()));
        }
        builder.json(error_response)
    }
}

/// [`AppError`] rendered with the Anthropic error envelope.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct AnthropicApiError(#[from] pub AppError);

impl From<CopilotError> for AnthropicApiError {
    fn from(err: CopilotError) -> Self {
        AnthropicApiError(err.into())
    }
}

impl AnthropicApiError {
    fn to_anthropic(&self) -> AnthropicError {
        AnthropicError::from_status(self.0.status().as_u16(), self.0.summary_message())
    }
}

impl ResponseError for AnthropicApiError {
    fn status_code(&self) -> StatusCode {
        self.0.status()
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        error!("Error handling Anthropic request: {}", self.0);
        HttpResponse::build(status_code).json(self.to_anthropic().envelope())
    }
}
