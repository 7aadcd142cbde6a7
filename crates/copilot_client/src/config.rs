use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

pub const GITHUB_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";
pub const GITHUB_APP_SCOPES: &str = "read:user";
pub const COPILOT_VERSION: &str = "0.26.7";
pub const API_VERSION: &str = "2025-04-01";
pub const FALLBACK_VSCODE_VERSION: &str = "1.98.1";

const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
const DEFAULT_GITHUB_BASE: &str = "https://github.com";
const DEFAULT_MAX_RETRIES: u32 = 3;
const CONFIG_FILE_NAME: &str = "config.toml";

/// GitHub Copilot plan the account belongs to; selects the API host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Individual,
    #[default]
    Business,
    Enterprise,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Individual => "individual",
            AccountType::Business => "business",
            AccountType::Enterprise => "enterprise",
        }
    }

    pub fn copilot_base_url(&self) -> String {
        match self {
            AccountType::Individual => "https://api.githubcopilot.com".to_string(),
            other => format!("https://api.{}.githubcopilot.com", other.as_str()),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "individual" => Ok(AccountType::Individual),
            "business" => Ok(AccountType::Business),
            "enterprise" => Ok(AccountType::Enterprise),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub account_type: AccountType,
    pub http_proxy: String,
    pub https_proxy: String,
    /// Overrides the Copilot API host derived from `account_type`.
    pub api_base: Option<String>,
    pub github_api_base: String,
    pub github_base: String,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            account_type: AccountType::default(),
            http_proxy: String::new(),
            https_proxy: String::new(),
            api_base: None,
            github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            github_base: DEFAULT_GITHUB_BASE.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Config {
    /// Defaults, then `config.toml` from `app_dir` when present, then env overrides.
    pub fn load(app_dir: &Path) -> Self {
        let mut config = Config::default();

        let config_path = app_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match toml::from_str::<Config>(&content) {
                    Ok(file_config) => config = file_config,
                    Err(e) => log::warn!("Ignoring malformed {}: {e}", config_path.display()),
                },
                Err(e) => log::warn!("Failed to read {}: {e}", config_path.display()),
            }
        }

        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(http_proxy) = std::env::var("HTTP_PROXY") {
            self.http_proxy = http_proxy;
        }
        if let Ok(https_proxy) = std::env::var("HTTPS_PROXY") {
            self.https_proxy = https_proxy;
        }
        if let Ok(api_base) = std::env::var("COPILOT_API_BASE") {
            self.api_base = Some(api_base);
        }
        if let Ok(github_api_base) = std::env::var("GITHUB_API_BASE") {
            self.github_api_base = github_api_base;
        }
        if let Ok(github_base) = std::env::var("GITHUB_BASE") {
            self.github_base = github_base;
        }
        self.max_retries = std::env::var("COPILOT_MAX_RETRIES")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(self.max_retries);
    }

    pub fn copilot_base_url(&self) -> String {
        match self.api_base.as_deref() {
            Some(base) if !base.trim().is_empty() => base.trim_end_matches('/').to_string(),
            _ => self.account_type.copilot_base_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_follows_account_type() {
        assert_eq!(
            AccountType::Business.copilot_base_url(),
            "https://api.business.githubcopilot.com"
        );
        assert_eq!(
            AccountType::Enterprise.copilot_base_url(),
            "https://api.enterprise.githubcopilot.com"
        );
        assert_eq!(
            AccountType::Individual.copilot_base_url(),
            "https://api.githubcopilot.com"
        );
    }

    #[test]
    fn api_base_override_wins() {
        let config = Config {
            api_base: Some("http://127.0.0.1:9000/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.copilot_base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn load_reads_toml_from_app_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("config.toml"),
            "account_type = \"enterprise\"\nmax_retries = 1\n",
        )
        .expect("write config");

        let config = Config::load(dir.path());
        assert_eq!(config.account_type, AccountType::Enterprise);
        assert_eq!(config.github_base, "https://github.com");
    }

    #[test]
    fn account_type_parses_case_insensitively() {
        assert_eq!("Enterprise".parse::<AccountType>(), Ok(AccountType::Enterprise));
        assert!("team".parse::<AccountType>().is_err());
    }
}
