//! Cache inputs, requests and outcomes

use crate::cache::key::is_exact_key_match;
use crate::error::{CacheError, CacheResult};

/// Inputs as received from the step, before any requirement is enforced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheInputs {
    pub key: Option<String>,
    pub restore_keys: Vec<String>,
    pub paths: Vec<String>,
    pub enable_cross_os_archive: bool,
    pub fail_on_cache_miss: bool,
    pub lookup_only: bool,
    pub upload_chunk_size: Option<u64>,
}

impl CacheInputs {
    /// Normalize a multi-line list input
    ///
    /// Each raw value may itself hold several newline-separated entries.
    /// Entries are trimmed and blank ones dropped; order is kept.
    pub fn parse_list<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
        raw.iter()
            .flat_map(|value| value.as_ref().split('\n'))
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Parse the upload chunk size; anything but a positive integer is absent
    pub fn parse_chunk_size(raw: Option<&str>) -> Option<u64> {
        raw.and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|size| *size > 0)
    }

    /// The primary key input, if supplied
    pub fn key(&self) -> Option<&str> {
        self.key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// A validated cache request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub primary_key: String,
    pub restore_keys: Vec<String>,
    pub paths: Vec<String>,
    pub enable_cross_os_archive: bool,
    pub lookup_only: bool,
    pub fail_on_cache_miss: bool,
    pub upload_chunk_size: Option<u64>,
}

impl CacheRequest {
    /// Build a request for `primary_key`, requiring at least one path
    pub fn new(primary_key: impl Into<String>, inputs: &CacheInputs) -> CacheResult<Self> {
        if inputs.paths.is_empty() {
            return Err(CacheError::MissingInput("path"));
        }

        Ok(Self {
            primary_key: primary_key.into(),
            restore_keys: inputs.restore_keys.clone(),
            paths: inputs.paths.clone(),
            enable_cross_os_archive: inputs.enable_cross_os_archive,
            lookup_only: inputs.lookup_only,
            fail_on_cache_miss: inputs.fail_on_cache_miss,
            upload_chunk_size: inputs.upload_chunk_size,
        })
    }

    /// Primary key followed by restore keys, in lookup order
    pub fn all_keys(&self) -> Vec<&str> {
        std::iter::once(self.primary_key.as_str())
            .chain(self.restore_keys.iter().map(String::as_str))
            .collect()
    }
}

/// Result of a restore attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOutcome {
    pub matched_key: Option<String>,
    pub is_exact_match: bool,
}

impl CacheOutcome {
    /// Classify the key a backend returned against the requested primary key
    pub fn resolve(primary_key: &str, matched_key: Option<String>) -> Self {
        let is_exact_match = is_exact_key_match(primary_key, matched_key.as_deref());
        Self {
            matched_key,
            is_exact_match,
        }
    }

    /// Value of the `cache-hit` output
    pub fn cache_hit(&self) -> &'static str {
        if self.is_exact_match {
            "true"
        } else {
            "false"
        }
    }
}
