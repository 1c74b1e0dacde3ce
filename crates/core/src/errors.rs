//! Error types for the person directory core library.
//!
//! Each failure class has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type. "Not found" is never an error: every lookup returns
//! `Ok(None)` when the queried person has no data.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CoreError {
    /// `true` for wiring bugs that must never be masked.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// `true` when raw backend output did not match the expected contract.
    pub fn is_shape(&self) -> bool {
        matches!(self, Self::Shape(_))
    }

    /// `true` when the failure came from a backend collaborator.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Invalid static configuration, detected eagerly or at first use.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// A mapping was configured with an empty-string key.
    #[error("mapping '{field}' contains an empty attribute name")]
    EmptyMappingKey {
        field: String,
    },

    /// The cache key generator was wired to an operation it does not know.
    #[error("unsupported cachable operation '{0}'")]
    UnsupportedOperation(String),

    /// The call arguments do not fit the operation's calling convention.
    #[error("operation '{operation}' expects {expected} arguments")]
    ArgumentMismatch {
        operation: String,
        expected: &'static str,
    },

    /// A wildcard query could not be compiled into a pattern.
    #[error("invalid wildcard pattern '{pattern}': {detail}")]
    InvalidPattern {
        pattern: String,
        detail: String,
    },

    /// The key-contributing attributes could not be serialized for hashing.
    #[error("cache key attributes could not be encoded: {0}")]
    KeyEncoding(String),

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Backend shape errors
// ---------------------------------------------------------------------------

/// Raw backend output does not match the expected row/column contract.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// The designated name column is missing from a row.
    #[error("row {row} has no name column '{column}'")]
    MissingNameColumn {
        row: usize,
        column: String,
    },

    /// The designated value column is missing from a row.
    #[error("row {row} has no value column '{column}'")]
    MissingValueColumn {
        row: usize,
        column: String,
    },

    /// Rows were grouped by an entity column that is missing.
    #[error("row {row} has no entity column '{column}'")]
    MissingEntityColumn {
        row: usize,
        column: String,
    },
}

// ---------------------------------------------------------------------------
// Backend failures
// ---------------------------------------------------------------------------

/// Opaque failure surfaced by a backend collaborator (SQL, directory, script).
///
/// Passed through unchanged; retry decisions belong to the caller.
#[derive(Debug, Error)]
#[error("backend '{backend}' failed: {message}")]
pub struct BackendError {
    pub backend: String,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// Create a failure with a message and no underlying cause.
    pub fn new(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attach the collaborator's own error as the cause.
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }
}
