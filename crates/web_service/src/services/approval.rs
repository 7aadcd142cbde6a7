//! Console approval gate for `--manual` mode.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use log::{info, warn};

use crate::error::AppError;

pub const APPROVAL_QUESTION: &str = "Accept incoming request? [y/N] ";

/// Source of the operator's answer. Called from a blocking thread.
pub trait ApprovalPrompt: Send + Sync {
    fn ask(&self, question: &str) -> io::Result<String>;
}

/// Prompts on stdout and reads one line from stdin.
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl ApprovalPrompt for ConsolePrompt {
    fn ask(&self, question: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(question.as_bytes())?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer)
    }
}

#[derive(Clone)]
pub struct ManualApproval {
    prompt: Arc<dyn ApprovalPrompt>,
}

impl ManualApproval {
    pub fn new(prompt: Arc<dyn ApprovalPrompt>) -> Self {
        Self { prompt }
    }

    pub fn console() -> Self {
        Self::new(Arc::new(ConsolePrompt))
    }

    /// Blocks on the prompt off the async runtime; a refusal is
    /// [`AppError::Rejected`].
    pub async fn await_approval(&self) -> Result<(), AppError> {
        let prompt = Arc::clone(&self.prompt);
        let answer = tokio::task::spawn_blocking(move || prompt.ask(APPROVAL_QUESTION))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        let accepted = match answer {
            Ok(answer) => is_accepted(&answer),
            Err(e) => {
                warn!("Failed to read approval answer: {e}");
                false
            }
        };

        if accepted {
            info!("Request approved");
            Ok(())
        } else {
            Err(AppError::Rejected)
        }
    }
}

impl std::fmt::Debug for ManualApproval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualApproval").finish_non_exhaustive()
    }
}

pub fn is_accepted(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
