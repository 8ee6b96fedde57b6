//! Step outputs

use crate::error::CacheResult;
use crate::runner::{file_command, RunnerEnv};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Output reporting whether the primary key matched exactly
pub const CACHE_HIT: &str = "cache-hit";

/// Step outputs, written through the `GITHUB_OUTPUT` file command
///
/// Every value is also kept in memory so library callers can read it back.
#[derive(Debug, Default)]
pub struct ActionOutputs {
    file: Option<PathBuf>,
    values: Mutex<BTreeMap<String, String>>,
}

impl ActionOutputs {
    /// Create outputs writing to the given file command, if any
    pub fn new(file: Option<PathBuf>) -> Self {
        Self {
            file,
            values: Mutex::default(),
        }
    }

    /// Create outputs for the runner's `GITHUB_OUTPUT` file
    pub fn from_env(env: &RunnerEnv) -> Self {
        Self::new(env.output_file.clone())
    }

    /// Set an output value
    pub fn set(&self, name: &str, value: &str) -> CacheResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());

        match &self.file {
            Some(path) => file_command::issue(path, name, value),
            None => {
                debug!("GITHUB_OUTPUT is not set, keeping output {}={} in memory", name, value);
                Ok(())
            }
        }
    }

    /// Read back an output set during this process
    pub fn get(&self, name: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}
