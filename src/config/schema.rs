//! Configuration schema for cache-relay
//!
//! Configuration is stored at `~/.config/cache-relay/config.toml`. Every
//! section is optional; a missing file yields the defaults below.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Subscription check settings
    pub subscription: SubscriptionConfig,

    /// Hosted cache service settings
    pub hosted: HostedConfig,

    /// S3 bucket cache settings
    pub s3: S3Config,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" (workflow commands) or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Subscription check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Run the check before the standalone entry points
    pub enabled: bool,

    /// API base URL; the repository path is appended
    pub api_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://agent.api.stepsecurity.io/v1".to_string(),
            timeout_secs: 3,
        }
    }
}

/// Hosted cache service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostedConfig {
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Upload chunk size in bytes when the input does not set one
    pub upload_chunk_size: u64,

    /// Attempts per request before giving up on retryable failures
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Largest archive the service accepts, in bytes
    pub max_archive_size: u64,
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            upload_chunk_size: 32 * 1024 * 1024,
            max_attempts: 2,
            retry_delay_ms: 3000,
            max_archive_size: 10 * 1024 * 1024 * 1024,
        }
    }
}

/// S3 bucket cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// AWS CLI executable
    pub aws_cli: String,

    /// Object key prefix inside the bucket
    pub key_prefix: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            aws_cli: "aws".to_string(),
            key_prefix: "cache".to_string(),
        }
    }
}
