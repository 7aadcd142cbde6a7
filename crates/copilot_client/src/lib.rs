pub mod api;
pub mod auth;
pub mod client_trait;
pub mod config;
pub mod context;
pub mod error;
pub mod paths;
pub mod tokenizer;
pub mod utils;
pub mod vscode_version;

pub use api::client::{ChatCompletionOutcome, CopilotClient};
pub use api::stream::UpstreamStream;
pub use client_trait::CopilotClientTrait;
pub use config::{AccountType, Config};
pub use context::CopilotContext;
pub use error::{CopilotError, UpstreamError};
pub use tokenizer::{get_token_count, TokenCount};
