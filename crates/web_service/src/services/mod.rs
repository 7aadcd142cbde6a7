pub mod approval;
pub mod rate_limit;

pub use approval::{ApprovalPrompt, ConsolePrompt, ManualApproval};
pub use rate_limit::RateLimiter;
