mod cli;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use copilot_client::auth::{setup_copilot_token, CopilotAuthHandler};
use copilot_client::paths::{app_dir, ensure_paths, github_token_path};
use copilot_client::vscode_version::cache_vscode_version;
use copilot_client::{Config, CopilotClient, CopilotClientTrait, CopilotContext};
use log::info;
use web_service::AppState;

use crate::cli::{AuthArgs, Cli, Commands, StartArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => start(args).await,
        Commands::Auth(args) => auth(args).await,
    }
}

async fn start(args: StartArgs) -> anyhow::Result<()> {
    logging::init(args.verbose);

    let app_dir = app_dir();
    ensure_paths(&app_dir)
        .with_context(|| format!("Failed to prepare {}", app_dir.display()))?;

    let mut config = Config::load(&app_dir);
    if let Some(account_type) = args.account_type() {
        config.account_type = account_type;
    }
    info!("Using {} plan GitHub account", config.account_type);

    let context = Arc::new(CopilotContext::new(config, app_dir)?);
    cache_vscode_version(&context).await;

    let auth = CopilotAuthHandler::new(Arc::clone(&context));
    match args.github_token.as_deref().filter(|token| !token.trim().is_empty()) {
        Some(token) => {
            context.set_github_token(token.trim()).await;
            info!("Using provided GitHub token");
        }
        None => auth.setup_github_token(false).await?,
    }

    let refresher = setup_copilot_token(auth)
        .await
        .context("Failed to get Copilot token")?;

    let client = CopilotClient::new(Arc::clone(&context));
    let cached = client.cache_models().await;
    let served = match cached {
        Ok(_) => {
            let server_config = args.server_config();
            let state = AppState::new(
                Arc::new(client) as Arc<dyn CopilotClientTrait>,
                &server_config,
            );
            web_service::run(server_config, state).await
        }
        Err(e) => Err(anyhow::Error::new(e).context("Failed to cache models")),
    };

    refresher.stop().await;
    served
}

async fn auth(args: AuthArgs) -> anyhow::Result<()> {
    logging::init(args.verbose);

    let app_dir = app_dir();
    ensure_paths(&app_dir)
        .with_context(|| format!("Failed to prepare {}", app_dir.display()))?;

    let context = Arc::new(CopilotContext::new(Config::load(&app_dir), app_dir.clone())?);
    cache_vscode_version(&context).await;
    CopilotAuthHandler::new(context).setup_github_token(true).await?;

    info!("GitHub token written to {}", github_token_path(&app_dir).display());
    Ok(())
}
