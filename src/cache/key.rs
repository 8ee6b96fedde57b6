//! Cache key matching and validation

use crate::error::{CacheError, CacheResult};

/// Maximum number of keys (primary plus restore keys) per lookup
pub const MAX_KEYS: usize = 10;

/// Maximum length of a single key
pub const MAX_KEY_LENGTH: usize = 512;

/// Whether `cache_key` is exactly the requested `key`
///
/// Case-sensitive equality with no trimming or folding. An absent or empty
/// candidate never matches.
pub fn is_exact_key_match(key: &str, cache_key: Option<&str>) -> bool {
    cache_key.is_some_and(|candidate| !candidate.is_empty() && candidate == key)
}

/// Validate a lookup: the primary key followed by its restore keys
pub fn validate_keys(primary_key: &str, restore_keys: &[String]) -> CacheResult<()> {
    if restore_keys.len() + 1 > MAX_KEYS {
        return Err(CacheError::Validation(format!(
            "Key Validation Error: Keys are limited to a maximum of {MAX_KEYS}."
        )));
    }

    std::iter::once(primary_key)
        .chain(restore_keys.iter().map(String::as_str))
        .try_for_each(validate_key)
}

/// Validate a single key
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(CacheError::Validation(format!(
            "Key Validation Error: {key} cannot be larger than {MAX_KEY_LENGTH} characters."
        )));
    }

    if key.contains(',') {
        return Err(CacheError::Validation(format!(
            "Key Validation Error: {key} cannot contain commas."
        )));
    }

    Ok(())
}

/// Require at least one cache path
pub fn validate_paths(paths: &[String]) -> CacheResult<()> {
    if paths.is_empty() {
        return Err(CacheError::Validation(
            "Path Validation Error: At least one directory or file path is required".to_string(),
        ));
    }
    Ok(())
}
