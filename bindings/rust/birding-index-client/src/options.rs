//! Client configuration options.

use birding_core::{IndexConfig, InitParams, ShelfError};
use serde::Deserialize;
use std::time::Duration;

/// Default index URL.
pub const DEFAULT_URL: &str = "http://127.0.0.1:9200";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for configuring the index client connection.
///
/// # Example
///
/// ```rust
/// use birding_index_client::IndexClientOptions;
/// use std::time::Duration;
///
/// let options = IndexClientOptions::new("http://localhost:9200")
///     .with_basic_auth("elastic", "changeme")
///     .with_timeout(Duration::from_secs(2));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct IndexClientOptions {
    /// The index base URL (e.g., "http://localhost:9200")
    pub url: String,

    /// Optional basic-auth user name
    pub username: Option<String>,

    /// Optional basic-auth password
    pub password: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

/// Init parameters a durable shelf may carry for its client.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClientInit {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout_secs: Option<u64>,
}

impl IndexClientOptions {
    /// Create new options with the given base URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set basic-auth credentials.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create options from environment variables.
    ///
    /// Reads:
    /// - `BIRDING_INDEX_URL` - Base URL (defaults to "http://127.0.0.1:9200")
    /// - `BIRDING_INDEX_USERNAME` - Optional basic-auth user
    /// - `BIRDING_INDEX_PASSWORD` - Optional basic-auth password
    pub fn from_env() -> Self {
        let url = std::env::var("BIRDING_INDEX_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let username = std::env::var("BIRDING_INDEX_USERNAME").ok();
        let password = std::env::var("BIRDING_INDEX_PASSWORD").ok();

        Self {
            url,
            username,
            password,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create options from the `index` section of the configuration file.
    pub fn from_config(config: &IndexConfig) -> Self {
        let mut options = Self::new(config.url.clone().unwrap_or_else(|| DEFAULT_URL.to_string()));
        options.username = config.username.clone();
        options.password = config.password.clone();
        if let Some(secs) = config.timeout_secs {
            options.timeout = Duration::from_secs(secs);
        }
        options
    }

    /// Overlay a durable shelf's init parameters onto these options.
    ///
    /// Accepts `url`, `username`, `password` and `timeout_secs`; anything
    /// else is a configuration error.
    pub fn merge_init(mut self, init: &InitParams) -> Result<Self, ShelfError> {
        let init: ClientInit = serde_json::from_value(serde_json::Value::Object(init.clone()))
            .map_err(|e| ShelfError::configuration(format!("invalid durable_index init: {e}")))?;

        if let Some(url) = init.url {
            self.url = url;
        }
        if init.username.is_some() {
            self.username = init.username;
        }
        if init.password.is_some() {
            self.password = init.password;
        }
        if let Some(secs) = init.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        Ok(self)
    }
}

impl Default for IndexClientOptions {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}
