use std::time::Duration;

use chrono::Local;
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::auth_handler::CopilotAuthHandler;

pub const MAX_REFRESH_FAILURES: u32 = 3;

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Seconds to wait before the next refresh: one minute ahead of `refresh_in`.
pub fn refresh_delay(refresh_in: u64) -> Duration {
    Duration::from_secs(refresh_in.saturating_sub(60).max(1))
}

/// Handle to the background Copilot token refresh task.
#[derive(Debug)]
pub struct RefreshHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl RefreshHandle {
    /// Cancels the refresh loop and waits for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!("Token refresh task ended abnormally: {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Fetches the first Copilot token into the context and starts the refresher.
pub async fn setup_copilot_token(auth: CopilotAuthHandler) -> anyhow::Result<RefreshHandle> {
    let token = auth.get_copilot_token().await?;
    auth.context().set_copilot_token(token.token).await;
    info!(
        "[{}] Copilot token will refresh in {} seconds",
        timestamp(),
        token.refresh_in.saturating_sub(60)
    );
    Ok(spawn_refresh_loop(auth, token.refresh_in))
}

pub fn spawn_refresh_loop(auth: CopilotAuthHandler, initial_refresh_in: u64) -> RefreshHandle {
    let cancel = CancellationToken::new();
    let child = cancel.clone();
    let join = tokio::spawn(async move {
        refresh_loop(auth, initial_refresh_in, child).await;
    });
    RefreshHandle { cancel, join }
}

async fn refresh_loop(auth: CopilotAuthHandler, initial_refresh_in: u64, cancel: CancellationToken) {
    let mut refresh_in = initial_refresh_in;
    let mut failures = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Copilot token refresh cancelled");
                return;
            }
            _ = tokio::time::sleep(refresh_delay(refresh_in)) => {}
        }

        info!("[{}] Refreshing Copilot token", timestamp());
        match auth.get_copilot_token().await {
            Ok(token) => {
                auth.context().set_copilot_token(token.token).await;
                refresh_in = token.refresh_in;
                failures = 0;
                info!("[{}] Copilot token refreshed successfully", timestamp());
                debug!(
                    "[{}] Next refresh in {} seconds",
                    timestamp(),
                    refresh_in.saturating_sub(60)
                );
            }
            Err(e) => {
                failures += 1;
                error!(
                    "[{}] Failed to refresh Copilot token (attempt {}/{}): {}",
                    timestamp(),
                    failures,
                    MAX_REFRESH_FAILURES,
                    e
                );
                if failures >= MAX_REFRESH_FAILURES {
                    error!(
                        "[{}] Multiple refresh failures detected. This might indicate an expired GitHub token.",
                        timestamp()
                    );
                    info!(
                        "[{}] Consider running the 'auth' command to refresh your GitHub token",
                        timestamp()
                    );
                    failures = 0;
                }
            }
        }
    }
}
