//! Error types for cache-relay
//!
//! All modules use `CacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cache-relay operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur in cache-relay
#[derive(Error, Debug)]
pub enum CacheError {
    // Input errors
    #[error("Input required and not supplied: {0}")]
    MissingInput(&'static str),

    #[error("{0}")]
    Validation(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // Restore outcome errors
    #[error(
        "Failed to restore cache entry. Exiting as fail-on-cache-miss is set. Input key: {key}{}",
        format_restore_keys(.restore_keys)
    )]
    CacheMiss {
        key: String,
        restore_keys: Vec<String>,
    },

    // Backend errors
    #[error("Cache service is not available: {0}")]
    ServiceUnavailable(String),

    #[error("Cache service returned {status} for {operation}: {message}")]
    CacheService {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),

    #[error("S3 cache error: {0}")]
    S3(String),

    // Subscription errors
    #[error("Subscription is not valid")]
    SubscriptionDenied,

    // Runner file command errors
    #[error("Unexpected input: {name} should not contain the delimiter {delimiter}")]
    FileCommandDelimiter { name: String, delimiter: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_restore_keys(restore_keys: &[String]) -> String {
    if restore_keys.is_empty() {
        String::new()
    } else {
        format!(", restore keys: {}", restore_keys.join(", "))
    }
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a cache service error for an unexpected HTTP status
    pub fn service(operation: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::CacheService {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// Transport failures and server-side errors are worth another attempt;
    /// client errors and validation failures never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CacheService { status, .. } => *status >= 500 || *status == 429,
            Self::Http(err) => !matches!(err, ureq::Error::StatusCode(code) if *code < 500),
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingInput("key") => Some("Set the `key` input (or pass --key)"),
            Self::MissingInput("path") => Some("Set the `path` input (or pass --path)"),
            Self::CacheMiss { .. } => Some("Unset fail-on-cache-miss to continue on a cache miss"),
            Self::SubscriptionDenied => Some("Reach out to support@stepsecurity.io"),
            Self::ServiceUnavailable(_) => {
                Some("ACTIONS_CACHE_URL and ACTIONS_RUNTIME_TOKEN are only set inside a runner job")
            }
            _ => None,
        }
    }
}
