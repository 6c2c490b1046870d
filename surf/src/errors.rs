/// Error types for surf searches.
///
/// Errors fall into four groups and each searcher treats them differently:
///
/// 1. **Backend errors** (`Backend`): a list, describe or scan call failed.
///    The recursive tree searcher aborts on them. The fan-out searchers skip
///    the failing resource unless `fail_fast` is set.
/// 2. **Selection errors** (`TooManyResources`, `InvalidInput`): surfaced
///    immediately and never retried.
/// 3. **Decode errors** (`Decode`): a record could not be rendered to text.
///    Always recovered locally by logging and dropping the record.
/// 4. **Matcher errors** (`InvalidPattern`): fatal, the same pattern would fail
///    for every item.
///
/// ```rust,ignore
/// match searcher.search(&input) {
///     Ok(output) => // Print matches,
///     Err(e) if e.is_too_many_resources() => // Ask for --all or a pattern,
///     Err(e) => // Report and exit,
/// }
/// ```
use thiserror::Error;

/// Result type for search operations
pub type SurfResult<T> = Result<T, SurfError>;

/// Errors that can occur during search operations
#[derive(Error, Debug)]
pub enum SurfError {
    #[error("Backend {operation} failed for '{target}': {message}")]
    Backend {
        operation: String,
        target: String,
        message: String,
    },
    #[error("Too many {kind} to search ({found} found, {allowed} allowed without an explicit pattern); pass a name pattern or allow all")]
    TooManyResources {
        kind: String,
        found: usize,
        allowed: usize,
    },
    #[error("Invalid search input: {0}")]
    InvalidInput(String),
    #[error("Failed decoding attribute '{attribute}': {message}")]
    Decode { attribute: String, message: String },
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SurfError {
    pub fn backend(
        operation: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            operation: operation.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn too_many_resources(kind: impl Into<String>, found: usize, allowed: usize) -> Self {
        Self::TooManyResources {
            kind: kind.into(),
            found,
            allowed,
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn decode(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for the selection error raised when no name pattern was given and
    /// the resource count exceeds the allowed cap.
    pub fn is_too_many_resources(&self) -> bool {
        matches!(self, Self::TooManyResources { .. })
    }

    /// True for errors the fan-out searchers may skip per resource.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    pub fn is_invalid_pattern(&self) -> bool {
        matches!(self, Self::InvalidPattern { .. })
    }
}

impl From<config::ConfigError> for SurfError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
