//! Shared setup for the HTTP surface tests: a real Copilot client pointed at
//! a wiremock upstream, wired into the actix app.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    dev::{Service, ServiceResponse},
    test, web, App, Error,
};
use copilot_client::api::models::ModelsResponse;
use copilot_client::{Config, CopilotClient, CopilotClientTrait, CopilotContext};
use serde_json::{json, Value};
use web_service::server::{app_config, AppState};
use web_service::services::{ApprovalPrompt, ManualApproval, RateLimiter};
use wiremock::MockServer;

pub async fn copilot_client(mock_server: &MockServer) -> CopilotClient {
    let config = Config {
        api_base: Some(mock_server.uri()),
        github_api_base: mock_server.uri(),
        github_base: mock_server.uri(),
        max_retries: 0,
        ..Default::default()
    };
    let context = CopilotContext::new(config, std::env::temp_dir()).expect("context");
    context.set_copilot_token("test-copilot-token").await;
    CopilotClient::new(Arc::new(context))
}

pub fn models_registry(models: &[(&str, Option<u32>)]) -> ModelsResponse {
    let data: Vec<Value> = models
        .iter()
        .map(|(id, max_output)| match max_output {
            Some(limit) => json!({
                "id": id,
                "capabilities": { "limits": { "max_output_tokens": limit } }
            }),
            None => json!({ "id": id }),
        })
        .collect();
    serde_json::from_value(json!({ "object": "list", "data": data })).expect("registry")
}

pub struct Scripted(pub &'static str);

impl ApprovalPrompt for Scripted {
    fn ask(&self, _question: &str) -> io::Result<String> {
        Ok(self.0.to_string())
    }
}

pub struct TestApp {
    pub mock_server: MockServer,
    pub client: Arc<CopilotClient>,
}

impl TestApp {
    pub async fn start() -> Self {
        let mock_server = MockServer::start().await;
        let client = Arc::new(copilot_client(&mock_server).await);
        Self {
            mock_server,
            client,
        }
    }

    pub async fn with_models(self, registry: ModelsResponse) -> Self {
        self.client.context().set_models(registry).await;
        self
    }

    pub fn state(&self) -> AppState {
        AppState {
            copilot_client: self.client.clone() as Arc<dyn CopilotClientTrait>,
            rate_limiter: RateLimiter::disabled(),
            approval: None,
        }
    }

    pub fn state_with(&self, rate_limiter: RateLimiter, answer: Option<&'static str>) -> AppState {
        AppState {
            approval: answer.map(|answer| ManualApproval::new(Arc::new(Scripted(answer)))),
            rate_limiter,
            ..self.state()
        }
    }
}

pub async fn init_app(
    state: AppState,
) -> impl Service<Request, Response = ServiceResponse, Error = Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(app_config),
    )
    .await
}

pub fn sse_body(events: &[&str]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect()
}

/// Splits an Anthropic event-stream body into `(event, data)` pairs.
pub fn parse_named_events(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| {
            let mut event = String::new();
            let mut data = Value::Null;
            for line in frame.lines() {
                if let Some(name) = line.strip_prefix("event: ") {
                    event = name.to_string();
                } else if let Some(payload) = line.strip_prefix("data: ") {
                    data = serde_json::from_str(payload).expect("event data");
                }
            }
            (event, data)
        })
        .collect()
}
