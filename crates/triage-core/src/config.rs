//! Triage configuration
//!
//! Loaded from TOML. Secrets never live in the file: the config names the
//! environment variables that hold them.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Poll loop timing
    pub schedule: ScheduleConfig,
    /// Input column names
    pub schema: SchemaConfig,
    /// Language model endpoint
    pub model: ModelConfig,
    /// Backing sheet
    pub store: StoreConfig,
}

impl TriageConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or fails validation
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values the loop cannot run with
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first bad value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "schedule.poll_interval_secs must be greater than zero".into(),
            ));
        }
        if self.schema.message_column.trim().is_empty() {
            return Err(ConfigError::Invalid("schema.message_column is blank".into()));
        }
        if self.schema.identity_column.trim().is_empty() {
            return Err(ConfigError::Invalid("schema.identity_column is blank".into()));
        }
        if self.model.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model.model is blank".into()));
        }
        Ok(())
    }

    /// With poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.schedule.poll_interval_secs = interval.as_secs();
        self
    }

    /// With input column names
    #[inline]
    #[must_use]
    pub fn with_columns(mut self, message: impl Into<String>, identity: impl Into<String>) -> Self {
        self.schema.message_column = message.into();
        self.schema.identity_column = identity.into();
        self
    }

    /// With backing store
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

/// Poll loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Delay between the end of one cycle and the start of the next
    pub poll_interval_secs: u64,
}

impl ScheduleConfig {
    /// Delay as a duration
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 20,
        }
    }
}

/// Names of the input columns, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Free-text message column
    pub message_column: String,
    /// Row identity column
    pub identity_column: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            message_column: "message".to_string(),
            identity_column: "hash value".to_string(),
        }
    }
}

/// OpenAI-compatible chat endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Per-request timeout; `None` keeps the client default
    pub timeout_secs: Option<u64>,
}

impl ModelConfig {
    /// Per-request timeout as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: None,
        }
    }
}

/// Backing sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Local JSON file holding `{ "columns": [...], "rows": [[...]] }`
    Json {
        /// File path
        path: PathBuf,
    },
    /// Google Sheets values API
    Google {
        /// Spreadsheet ID from the sheet URL
        spreadsheet_id: String,
        /// A1 range, usually the worksheet name
        #[serde(default = "default_google_range")]
        range: String,
        /// Environment variable holding an OAuth access token
        #[serde(default = "default_google_token_env")]
        token_env: String,
    },
}

fn default_google_range() -> String {
    "Sheet1".to_string()
}

fn default_google_token_env() -> String {
    "GOOGLE_SHEETS_TOKEN".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Json {
            path: PathBuf::from("incidents.json"),
        }
    }
}

/// Read a secret from the named environment variable
///
/// # Errors
/// Returns `ConfigError::MissingSecret` if unset or blank
pub fn secret_from_env(var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingSecret(var.to_string()))
}
