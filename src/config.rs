//! Configuration for the SDK client and the webhook receiver
//!
//! All settings come from environment variables. The API key is required and is
//! never logged. Everything else has a default.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TERMGAME_API_KEY` | required |
//! | `TERMGAME_BASE_URL` | `https://api-v2.termgameseller.com/v1/api` |
//! | `TERMGAME_TIMEOUT_SECS` | `30` |
//! | `WEBHOOK_HOST` / `WEBHOOK_PORT` | `127.0.0.1` / `8080` |
//! | `WEBHOOK_PATH` | `/webhook` |
//! | `WEBHOOK_LOG_FILE` / `WEBHOOK_LOGGING` | `webhook.log` / `true` |
//! | `WEBHOOK_RATE_LIMIT_MAX` / `WEBHOOK_RATE_LIMIT_WINDOW_SECS` | `10` / `60` |
//! | `WEBHOOK_RATE_LIMIT_KEY` | `ip` (or `transaction`) |
//! | `WEBHOOK_RATE_LIMIT_FILE` | unset (in-memory store) |
//! | `WEBHOOK_MAX_RETRIES` / `WEBHOOK_RETRY_BASE_SECS` | `3` / `2` |
//! | `WEBHOOK_DEADLINE_SECS` | `60` |
//! | `WEBHOOK_TRUSTED_PROXIES` | unset (`X-Forwarded-For` ignored) |
//! | `WEBHOOK_ALLOWED_IPS` | unset (every sender admitted) |

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ConfigError;

/// Vendor API base URL
pub const DEFAULT_BASE_URL: &str = "https://api-v2.termgameseller.com/v1/api";

/// User-Agent the vendor sends on every webhook delivery
pub const WEBHOOK_USER_AGENT: &str = "TermgameSeller";

/// Result type for configuration loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which request attribute the webhook rate limiter counts against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKey {
    /// The sender's IP address
    ClientIp,
    /// The transaction id in the webhook body
    TransactionId,
}

impl FromStr for RateLimitKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ip" | "client_ip" => Ok(Self::ClientIp),
            "transaction" | "transaction_id" | "id" => Ok(Self::TransactionId),
            other => Err(format!("expected `ip` or `transaction`, got `{}`", other)),
        }
    }
}

/// Outbound API client settings
#[derive(Clone)]
pub struct ApiConfig {
    /// API key issued by the vendor
    api_key: String,
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ApiConfig {
    /// Create API settings with the default base URL
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    /// The API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Webhook rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests admitted per identifier within the window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
    /// Identifier the limiter counts
    pub key: RateLimitKey,
    /// When set, entries persist in this JSON file instead of memory
    pub store_path: Option<PathBuf>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            key: RateLimitKey::ClientIp,
            store_path: None,
        }
    }
}

/// Retry settings for the order status lookup
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_retries: u32,
    /// Wait after the first failed attempt; doubles after each further failure
    pub base_delay: Duration,
    /// Upper bound on the whole lookup including backoff
    pub deadline: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            deadline: Duration::from_secs(60),
        }
    }
}

/// Webhook receiver settings
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Address to bind
    pub host: IpAddr,
    /// Port to bind
    pub port: u16,
    /// Route the vendor posts to
    pub path: String,
    /// Expected User-Agent
    pub user_agent: String,
    /// Append-only event log
    pub log_file: PathBuf,
    /// Whether the event log file is written
    pub logging_enabled: bool,
    /// Rate limiting
    pub rate_limit: RateLimitConfig,
    /// Retry of the status lookup
    pub retry: RetryConfig,
    /// Peers whose `X-Forwarded-For` header is honoured
    pub trusted_proxies: Vec<IpAddr>,
    /// Sender allowlist; empty admits everyone
    pub allowed_ips: Vec<IpAddr>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8080,
            path: "/webhook".to_string(),
            user_agent: WEBHOOK_USER_AGENT.to_string(),
            log_file: PathBuf::from("webhook.log"),
            logging_enabled: true,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            trusted_proxies: Vec::new(),
            allowed_ips: Vec::new(),
        }
    }
}

impl WebhookConfig {
    /// Socket address for binding
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Complete configuration
#[derive(Debug, Clone)]
pub struct SellerConfig {
    /// Outbound API settings
    pub api: ApiConfig,
    /// Webhook receiver settings
    pub webhook: WebhookConfig,
}

impl SellerConfig {
    /// Build a configuration with defaults around an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api: ApiConfig::new(api_key, Duration::from_secs(30)),
            webhook: WebhookConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `TERMGAME_API_KEY` is unset and
    /// [`ConfigError::Invalid`] when any variable cannot be parsed.
    pub fn from_env() -> ConfigResult<Self> {
        let api_key =
            env::var("TERMGAME_API_KEY").map_err(|_| ConfigError::Missing("TERMGAME_API_KEY"))?;

        let mut config = Self::new(api_key);

        if let Ok(base_url) = env::var("TERMGAME_BASE_URL") {
            config.api.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.api.timeout = Duration::from_secs(parse_var("TERMGAME_TIMEOUT_SECS", 30)?);

        let webhook = &mut config.webhook;
        webhook.host = parse_var("WEBHOOK_HOST", webhook.host)?;
        webhook.port = parse_var("WEBHOOK_PORT", webhook.port)?;
        if let Ok(path) = env::var("WEBHOOK_PATH") {
            webhook.path = path;
        }
        if let Ok(log_file) = env::var("WEBHOOK_LOG_FILE") {
            webhook.log_file = PathBuf::from(log_file);
        }
        webhook.logging_enabled = parse_bool("WEBHOOK_LOGGING", true)?;

        let rate_limit = &mut webhook.rate_limit;
        rate_limit.max_requests = parse_var("WEBHOOK_RATE_LIMIT_MAX", rate_limit.max_requests)?;
        rate_limit.window = Duration::from_secs(parse_var("WEBHOOK_RATE_LIMIT_WINDOW_SECS", 60)?);
        rate_limit.key = parse_var("WEBHOOK_RATE_LIMIT_KEY", rate_limit.key)?;
        rate_limit.store_path = env::var("WEBHOOK_RATE_LIMIT_FILE").ok().map(PathBuf::from);

        let retry = &mut webhook.retry;
        retry.max_retries = parse_var("WEBHOOK_MAX_RETRIES", retry.max_retries)?;
        retry.base_delay = Duration::from_secs(parse_var("WEBHOOK_RETRY_BASE_SECS", 2)?);
        retry.deadline = Duration::from_secs(parse_var("WEBHOOK_DEADLINE_SECS", 60)?);

        webhook.trusted_proxies = parse_ip_list("WEBHOOK_TRUSTED_PROXIES")?;
        webhook.allowed_ips = parse_ip_list("WEBHOOK_ALLOWED_IPS")?;

        config.validate()?;

        info!(
            base_url = %config.api.base_url,
            timeout_secs = config.api.timeout.as_secs(),
            webhook_addr = %config.webhook.socket_addr(),
            rate_limit_max = config.webhook.rate_limit.max_requests,
            rate_limit_window_secs = config.webhook.rate_limit.window.as_secs(),
            trusted_proxies = config.webhook.trusted_proxies.len(),
            allowed_ips = config.webhook.allowed_ips.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Check the configuration for values that would break the pipeline
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api.api_key().trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "TERMGAME_API_KEY",
                reason: "API key cannot be empty".to_string(),
            });
        }

        url::Url::parse(&self.api.base_url).map_err(|e| ConfigError::Invalid {
            name: "TERMGAME_BASE_URL",
            reason: e.to_string(),
        })?;

        if self.api.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "TERMGAME_TIMEOUT_SECS",
                reason: "timeout cannot be 0".to_string(),
            });
        }

        if !self.webhook.path.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "WEBHOOK_PATH",
                reason: "path must start with `/`".to_string(),
            });
        }

        let rate_limit = &self.webhook.rate_limit;
        if rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid {
                name: "WEBHOOK_RATE_LIMIT_MAX",
                reason: "rate limit cannot be 0".to_string(),
            });
        }
        if rate_limit.window.is_zero() {
            return Err(ConfigError::Invalid {
                name: "WEBHOOK_RATE_LIMIT_WINDOW_SECS",
                reason: "window cannot be 0".to_string(),
            });
        }

        if self.webhook.retry.max_retries == 0 {
            return Err(ConfigError::Invalid {
                name: "WEBHOOK_MAX_RETRIES",
                reason: "at least one attempt is required".to_string(),
            });
        }

        if !self.webhook.logging_enabled {
            warn!("Webhook event log file is disabled (WEBHOOK_LOGGING=false)");
        }

        Ok(())
    }

    /// Configuration for unit tests: no log file and millisecond backoff
    #[cfg(test)]
    pub fn test_config() -> Self {
        let mut config = Self::new("test-api-key-for-unit-tests");
        config.webhook.logging_enabled = false;
        config.webhook.retry.base_delay = Duration::from_millis(1);
        config
    }
}

fn parse_var<T>(name: &'static str, default: T) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Comma-separated IP addresses; unset or blank is an empty list
fn parse_ip_list(name: &'static str) -> ConfigResult<Vec<IpAddr>> {
    match env::var(name) {
        Ok(raw) => split_ip_list(name, &raw),
        Err(_) => Ok(Vec::new()),
    }
}

fn split_ip_list(name: &'static str, raw: &str) -> ConfigResult<Vec<IpAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                name,
                reason: format!("`{}`: {}", v, e),
            })
        })
        .collect()
}

fn parse_bool(name: &'static str, default: bool) -> ConfigResult<bool> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::Invalid {
                name,
                reason: format!("expected a boolean, got `{}`", other),
            }),
        },
        Err(_) => Ok(default),
    }
}
