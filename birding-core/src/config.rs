use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::registry::ShelfConfig;
use crate::shelf::InitParams;

/// Environment variable naming the configuration file.
pub const BIRDING_CONF_ENV: &str = "BIRDING_CONF";

/// Configuration file used when `BIRDING_CONF` is not set.
pub const BIRDING_CONF_DEFAULT: &str = "birding.json";

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or has unknown fields
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration parsed but a value is unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration for the whole pipeline.
///
/// Every field has a default, so a file only needs the values it changes;
/// nested sections fill their missing fields from defaults too. Unknown
/// fields are rejected, except inside `appendix`, which is free-form and
/// carried through untouched for code built on top of this one.
///
/// # Example
///
/// ```rust
/// use birding_core::BirdingConfig;
///
/// let config = BirdingConfig::from_json_str(r#"{"term_cycle": {"terms": ["rust"]}}"#).unwrap();
/// assert_eq!(config.term_cycle.terms, vec!["rust"]);
/// assert_eq!(config.term_cycle.interval_ms, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BirdingConfig {
    pub term_cycle: TermCycleConfig,
    pub search: SearchConfig,
    pub search_stage: StageConfig,
    pub publish_stage: PublishStageConfig,
    pub index: IndexConfig,
    pub appendix: InitParams,
}

impl Default for BirdingConfig {
    fn default() -> Self {
        Self {
            term_cycle: TermCycleConfig::default(),
            search: SearchConfig::default(),
            search_stage: StageConfig::default(),
            publish_stage: PublishStageConfig::default(),
            index: IndexConfig::default(),
            appendix: InitParams::new(),
        }
    }
}

/// Terms fed into the pipeline, cycled forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TermCycleConfig {
    pub terms: Vec<String>,
    /// Pause between emitted terms (default: 1000 ms)
    pub interval_ms: u64,
}

impl Default for TermCycleConfig {
    fn default() -> Self {
        Self {
            terms: vec![
                "real-time analytics".to_string(),
                "apache storm".to_string(),
                "pypi".to_string(),
            ],
            interval_ms: 1000,
        }
    }
}

impl TermCycleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Connection details for the search API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub base_url: String,
    pub stream: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Extra query parameters sent with every search
    pub params: InitParams,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gnip-api.twitter.com".to_string(),
            stream: "prod.json".to_string(),
            username: None,
            password: None,
            params: InitParams::new(),
        }
    }
}

/// A dedup-guarded stage: just its shelf.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageConfig {
    pub shelf: ShelfConfig,
}

/// The publish stage: its shelf plus where statuses go.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishStageConfig {
    pub shelf: ShelfConfig,
    pub output: PublishOutput,
}

/// Destination of published statuses.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PublishOutput {
    /// One JSON document per line on stdout
    #[default]
    Stdout,
    /// Each status indexed by id into the document index
    Index { index: String, doc_type: String },
}

/// Default connection details for the document index client.
///
/// A durable shelf's own init parameters override these.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Base URL; `None` means use an in-process index
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl BirdingConfig {
    /// Loads configuration from the path in `BIRDING_CONF`, or from
    /// `birding.json` in the working directory.
    ///
    /// A missing default file is fine (defaults are used); a missing file
    /// named explicitly through the environment is an error.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(BIRDING_CONF_ENV) {
            Ok(path) => Self::from_path(path, true),
            Err(_) => Self::from_path(BIRDING_CONF_DEFAULT, false),
        }
    }

    /// Loads configuration from `path`.
    ///
    /// When `required` is false and the file does not exist, returns the
    /// defaults.
    pub fn from_path(path: impl AsRef<Path>, required: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "Looking for configuration file");

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::info!(path = %path.display(), "No configuration file found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.term_cycle.terms.is_empty() {
            return Err(ConfigError::Invalid("term_cycle.terms must not be empty".to_string()));
        }
        if let Some(term) = self.term_cycle.terms.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "term_cycle.terms contains a blank term: {term:?}"
            )));
        }
        if self.search.base_url.is_empty() {
            return Err(ConfigError::Invalid("search.base_url must not be empty".to_string()));
        }
        for (name, shelf) in [
            ("search_stage", &self.search_stage.shelf),
            ("publish_stage", &self.publish_stage.shelf),
        ] {
            if shelf.kind.is_empty() {
                return Err(ConfigError::Invalid(format!("{name}.shelf.kind must not be empty")));
            }
        }
        Ok(())
    }

    /// Returns a value from the free-form appendix.
    pub fn appendix_value(&self, key: &str) -> Option<&Value> {
        self.appendix.get(key)
    }
}
