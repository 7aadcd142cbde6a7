//! HTTP surface of the proxy: OpenAI-compatible and Anthropic-compatible
//! routes in front of the Copilot client.

pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod server;
pub mod services;

pub use config::ServerConfig;
pub use error::{AnthropicApiError, AppError};
pub use server::{app_config, run, AppState};
