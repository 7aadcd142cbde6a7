use clap::{Args, Parser, Subcommand};
use copilot_client::AccountType;
use web_service::ServerConfig;

#[derive(Debug, Parser)]
#[command(name = "copilot-api")]
#[command(
    about = "A wrapper around GitHub Copilot API to make it OpenAI compatible, making it usable for other tools."
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Start(StartArgs),
    /// Run the GitHub device flow and store the token
    Auth(AuthArgs),
}

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Port to listen on
    #[arg(long, short, env = "COPILOT_API_PORT", default_value_t = web_service::config::DEFAULT_PORT)]
    pub port: u16,

    /// Enable verbose logging
    #[arg(long, short, env = "COPILOT_API_VERBOSE")]
    pub verbose: bool,

    /// Use a business plan GitHub account
    #[arg(long, conflicts_with_all = ["enterprise", "individual"])]
    pub business: bool,

    /// Use an enterprise plan GitHub account
    #[arg(long, conflicts_with = "individual")]
    pub enterprise: bool,

    /// Use an individual plan GitHub account
    #[arg(long)]
    pub individual: bool,

    /// Enable manual request approval
    #[arg(long, env = "COPILOT_API_MANUAL")]
    pub manual: bool,

    /// Rate limit in seconds between requests
    #[arg(long, short = 'r', env = "COPILOT_API_RATE_LIMIT")]
    pub rate_limit: Option<u64>,

    /// Wait instead of error when rate limit is hit
    #[arg(long, short, env = "COPILOT_API_RATE_LIMIT_WAIT")]
    pub wait: bool,

    /// Provide GitHub token directly (must be generated using the `auth` subcommand)
    #[arg(long, short, env = "COPILOT_API_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

#[derive(Debug, Args)]
pub struct AuthArgs {
    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}

impl StartArgs {
    /// Plan chosen on the command line; `None` keeps the configured one.
    pub fn account_type(&self) -> Option<AccountType> {
        if self.enterprise {
            Some(AccountType::Enterprise)
        } else if self.individual {
            Some(AccountType::Individual)
        } else if self.business {
            Some(AccountType::Business)
        } else {
            None
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            rate_limit_seconds: self.rate_limit,
            rate_limit_wait: self.wait,
            manual_approve: self.manual,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_start(args: &[&str]) -> StartArgs {
        let cli = Cli::try_parse_from(args).expect("parse");
        match cli.command {
            Commands::Start(start) => start,
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn start_defaults() {
        let start = parse_start(&["copilot-api", "start"]);
        assert_eq!(start.account_type(), None);
        assert_eq!(start.server_config(), ServerConfig::default());
    }

    #[test]
    fn start_flags_map_to_server_config() {
        let start = parse_start(&[
            "copilot-api", "start", "-p", "8080", "--manual", "-r", "30", "-w", "--enterprise",
        ]);
        let config = start.server_config();
        assert_eq!(config.port, 8080);
        assert!(config.manual_approve);
        assert_eq!(config.rate_limit_seconds, Some(30));
        assert!(config.rate_limit_wait);
        assert_eq!(start.account_type(), Some(AccountType::Enterprise));
    }

    #[test]
    fn plan_flags_conflict() {
        assert!(Cli::try_parse_from(["copilot-api", "start", "--business", "--enterprise"]).is_err());
    }

    #[test]
    fn auth_accepts_verbose() {
        let cli = Cli::try_parse_from(["copilot-api", "auth", "-v"]).expect("parse");
        assert!(matches!(cli.command, Commands::Auth(AuthArgs { verbose: true })));
    }
}
