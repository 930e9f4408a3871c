//! Error types for the triage core
//!
//! Provides error handling for:
//! - Language model calls (transient, retried next cycle)
//! - Sheet store reads and commits (transient, retried next cycle)
//! - Schema resolution (fatal)
//! - Configuration loading (fatal at startup)

use std::fmt;
use std::path::PathBuf;

/// Main triage error type
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// Required column missing from the sheet
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Sheet store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TriageError {
    /// Check if the error must stop the poll loop
    ///
    /// Store failures are per-cycle conditions; schema and configuration
    /// problems leave the loop with undefined behavior and are fatal.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Schema(_) | Self::Config(_))
    }
}

/// Role of a required input column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    /// Free-text incident message
    Message,
    /// Stable row identity
    Identity,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => f.write_str("message"),
            Self::Identity => f.write_str("identity"),
        }
    }
}

/// Schema resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Required column not present in the header
    #[error("required {role} column '{name}' not found")]
    MissingColumn {
        /// What the column is used for
        role: ColumnRole,
        /// Configured column name
        name: String,
    },

    /// Sheet has no header row at all
    #[error("sheet has no header row")]
    EmptyHeader,
}

impl SchemaError {
    /// Create missing column error
    pub fn missing(role: ColumnRole, name: impl Into<String>) -> Self {
        Self::MissingColumn {
            role,
            name: name.into(),
        }
    }
}

/// Sheet store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error on a file-backed store
    #[error("io error on {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote side answered with a non-success status
    #[error("store returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Payload could not be decoded or encoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Store is unreachable or refused the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if retrying the same operation later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Transport(_) | Self::Unavailable(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// Language model call errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Endpoint answered with a non-success status
    #[error("model returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Response envelope could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Response carried no message content
    #[error("model returned an empty reply")]
    EmptyReply,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected shape
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value failed validation
    #[error("invalid value: {0}")]
    Invalid(String),

    /// Secret environment variable missing
    #[error("environment variable '{0}' is not set")]
    MissingSecret(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_and_config_errors_are_fatal() {
        let schema = TriageError::from(SchemaError::missing(ColumnRole::Identity, "hash value"));
        let config = TriageError::from(ConfigError::Invalid("poll interval".into()));
        let store = TriageError::from(StoreError::Transport("reset".into()));

        assert!(schema.is_fatal());
        assert!(config.is_fatal());
        assert!(!store.is_fatal());
    }

    #[test]
    fn store_status_retryability() {
        let throttled = StoreError::Status {
            status: 429,
            body: String::new(),
        };
        let server = StoreError::Status {
            status: 503,
            body: String::new(),
        };
        let forbidden = StoreError::Status {
            status: 403,
            body: String::new(),
        };

        assert!(throttled.is_retryable());
        assert!(server.is_retryable());
        assert!(!forbidden.is_retryable());
        assert!(!StoreError::Decode("bad".into()).is_retryable());
    }

    #[test]
    fn missing_column_message() {
        let err = SchemaError::missing(ColumnRole::Message, "Message");
        assert_eq!(err.to_string(), "required message column 'Message' not found");
    }
}
