//! Shared helpers for upstream client integration tests

use std::sync::Arc;

use copilot_client::{Config, CopilotClient, CopilotContext};
use wiremock::MockServer;

/// Builds a client whose Copilot and GitHub hosts both point at `server`,
/// with a bearer token already installed.
pub async fn client_for(server: &MockServer, max_retries: u32) -> CopilotClient {
    let config = Config {
        api_base: Some(server.uri()),
        github_api_base: server.uri(),
        github_base: server.uri(),
        max_retries,
        ..Default::default()
    };
    let context = CopilotContext::new(config, std::env::temp_dir()).expect("context");
    context.set_copilot_token("test-copilot-token").await;
    CopilotClient::new(Arc::new(context))
}

pub fn sse_body(events: &[&str]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect::<String>()
}
