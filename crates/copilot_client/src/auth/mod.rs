pub mod auth_handler;
pub mod refresh;

pub use auth_handler::{CopilotAuthHandler, CopilotTokenResponse, DeviceCodeResponse, GithubUser};
pub use refresh::{setup_copilot_token, RefreshHandle};
