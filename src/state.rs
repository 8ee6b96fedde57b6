//! Cross-phase state
//!
//! The restore phase records the keys it resolved; the save phase, running in
//! a different process after the job body, reads them back. The strategy is
//! chosen by the caller's execution mode:
//!
//! | Store | Used by | Persistence |
//! |-------|---------|-------------|
//! | [`RunnerStateStore`] | `restore` / `save` | `GITHUB_STATE` file, replayed as `STATE_*` |
//! | [`MemoryStateStore`] | both phases in one process | in memory |
//! | [`NullStateStore`] | `restore-only` / `save-only` | none |

use crate::error::CacheResult;
use crate::runner::{file_command, RunnerEnv};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Logical state entries shared between the phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// Primary key requested by the restore phase
    PrimaryKey,
    /// Key the restore phase actually matched
    MatchedKey,
}

impl StateKey {
    /// Name used on the runner
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "CACHE_KEY",
            Self::MatchedKey => "CACHE_RESULT",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value persistence between the restore and save phases
pub trait StateStore: Send + Sync {
    /// Record a value
    fn set_state(&self, key: StateKey, value: &str) -> CacheResult<()>;

    /// Read a value; empty when unset
    fn get_state(&self, key: StateKey) -> String;

    /// The key matched during restore, if any
    fn cache_state(&self) -> Option<String> {
        let matched = self.get_state(StateKey::MatchedKey);
        if matched.is_empty() {
            return None;
        }
        debug!("Cache state/key: {}", matched);
        Some(matched)
    }
}

/// State store backed by the runner
///
/// Writes go to the `GITHUB_STATE` file command; the runner replays them to
/// the post-job step as `STATE_<name>` variables, which were captured into
/// [`RunnerEnv::saved_state`] at startup.
#[derive(Debug, Default)]
pub struct RunnerStateStore {
    file: Option<PathBuf>,
    saved: HashMap<String, String>,
    written: Mutex<HashMap<StateKey, String>>,
}

impl RunnerStateStore {
    /// Create a store from the runner environment snapshot
    pub fn from_env(env: &RunnerEnv) -> Self {
        Self {
            file: env.state_file.clone(),
            saved: env.saved_state.clone(),
            written: Mutex::default(),
        }
    }
}

impl StateStore for RunnerStateStore {
    fn set_state(&self, key: StateKey, value: &str) -> CacheResult<()> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.to_string());

        match &self.file {
            Some(path) => file_command::issue(path, key.as_str(), value),
            None => {
                warn!("GITHUB_STATE is not set; {} will not reach the save phase", key);
                Ok(())
            }
        }
    }

    fn get_state(&self, key: StateKey) -> String {
        if let Some(value) = self
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return value.clone();
        }

        self.saved.get(key.as_str()).cloned().unwrap_or_default()
    }
}

/// In-process state store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<StateKey, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn set_state(&self, key: StateKey, value: &str) -> CacheResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.to_string());
        Ok(())
    }

    fn get_state(&self, key: StateKey) -> String {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }
}

/// State store that remembers nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStateStore;

impl StateStore for NullStateStore {
    fn set_state(&self, _key: StateKey, _value: &str) -> CacheResult<()> {
        Ok(())
    }

    fn get_state(&self, _key: StateKey) -> String {
        String::new()
    }
}
