use std::collections::BTreeMap;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "RECORDKIT_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "RECORDKIT_TIMEOUT_MS";
pub const ENV_TOKEN: &str = "RECORDKIT_TOKEN";

/// HTTP client configuration
///
/// Relative record URLs (`/posts/7`) are resolved against `base_url`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme, host and optional path prefix, e.g. `https://api.example.com/v1`
    pub base_url: String,

    /// Whole-request timeout
    pub timeout: Option<Duration>,

    /// Connection establishment timeout
    pub connect_timeout: Duration,

    /// Headers sent with every request
    pub default_headers: BTreeMap<String, String>,

    /// Bearer token for the `Authorization` header
    pub bearer_token: Option<String>,

    /// User agent string
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(10),
            default_headers: BTreeMap::new(),
            bearer_token: None,
            user_agent: format!("recordkit/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Parse and validate a base URL
    pub fn from_url(url: &str) -> Result<Self, String> {
        let config = Self::new(url.trim());
        config.validate()?;
        Ok(config)
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disable the request timeout
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Add a default header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn bearer_token(mut self, token: &str) -> Self {
        self.bearer_token = Some(token.to_string());
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// Read configuration from the environment
    ///
    /// `RECORDKIT_BASE_URL` is required, `RECORDKIT_TIMEOUT_MS` and `RECORDKIT_TOKEN` are optional.
    pub fn from_env() -> Result<Self, String> {
        let base_url =
            std::env::var(ENV_BASE_URL).map_err(|_| format!("{} is not set", ENV_BASE_URL))?;
        let mut config = Self::new(&base_url);

        if let Ok(raw) = std::env::var(ENV_TIMEOUT_MS) {
            let millis: u64 = raw
                .parse()
                .map_err(|_| format!("{} must be an integer, got '{}'", ENV_TIMEOUT_MS, raw))?;
            config = config.timeout(Duration::from_millis(millis));
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            config = config.bearer_token(&token);
        }

        config.validate()?;
        Ok(config)
    }

    /// Resolve a record URL against the base URL
    ///
    /// Absolute URLs are returned unchanged.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    /// Describe the configuration without exposing credentials
    pub fn describe(&self) -> String {
        format!(
            "{} (timeout: {:?}, auth: {})",
            self.base_url,
            self.timeout,
            if self.bearer_token.is_some() { "***" } else { "none" }
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Base URL must start with 'http://' or 'https://'".to_string());
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err("timeout must be > 0".to_string());
        }

        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}
