use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use copilot_client::CopilotClientTrait;
use log::{error, info};

use crate::config::ServerConfig;
use crate::controllers::{anthropic_controller, openai_controller, system_controller};
use crate::error::AppError;
use crate::middleware::TracingMiddleware;
use crate::services::{ManualApproval, RateLimiter};

pub struct AppState {
    pub copilot_client: Arc<dyn CopilotClientTrait>,
    pub rate_limiter: RateLimiter,
    /// Set when every request must be confirmed on the console.
    pub approval: Option<ManualApproval>,
}

impl AppState {
    pub fn new(copilot_client: Arc<dyn CopilotClientTrait>, config: &ServerConfig) -> Self {
        Self {
            copilot_client,
            rate_limiter: RateLimiter::new(config.rate_limit_seconds, config.rate_limit_wait),
            approval: config.manual_approve.then(ManualApproval::console),
        }
    }

    pub async fn await_approval(&self) -> Result<(), AppError> {
        match &self.approval {
            Some(approval) => approval.await_approval().await,
            None => Ok(()),
        }
    }
}

/// OpenAI routes are served both at the root and under `/v1`; the Anthropic
/// routes only under `/v1`.
pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.configure(system_controller::config)
        .configure(openai_controller::config)
        .service(
            web::scope("/v1")
                .configure(anthropic_controller::config)
                .configure(openai_controller::config),
        );
}

pub async fn run(config: ServerConfig, app_state: AppState) -> anyhow::Result<()> {
    let app_state = web::Data::new(app_state);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(TracingMiddleware)
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .workers(config.workers)
    .bind(config.bind_address())
    .with_context(|| format!("Failed to bind server to {}", config.bind_address()))?
    .run();

    info!("Server started at {}", config.display_url());

    if let Err(e) = server.await {
        error!("Web server error: {e}");
        return Err(e).context("Web server error");
    }

    info!("Server stopped");
    Ok(())
}
