//! HTTP server settings.

pub const DEFAULT_PORT: u16 = 4141;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_WORKER_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Minimum number of seconds between requests; `None` disables the cooldown.
    pub rate_limit_seconds: Option<u64>,
    /// Wait for the cooldown instead of failing with 429.
    pub rate_limit_wait: bool,
    /// Ask on the console before serving each request.
    pub manual_approve: bool,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            rate_limit_seconds: None,
            rate_limit_wait: false,
            manual_approve: false,
            workers: DEFAULT_WORKER_COUNT,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address printed for clients; the wildcard host is shown as localhost.
    pub fn display_url(&self) -> String {
        let host = if self.host == DEFAULT_HOST {
            "localhost"
        } else {
            self.host.as_str()
        };
        format!("http://{}:{}", host, self.port)
    }
}
