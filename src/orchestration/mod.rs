//! Restore and save orchestration
//!
//! The two phases run in separate processes of the same job:
//! - restore: resolve the key, fetch a matching entry, record what matched
//! - save: read back what restore recorded and upload unless the primary key
//!   already hit
//!
//! Both receive everything they need through a [`CacheContext`] and a
//! [`StateStore`]; neither reads the process environment or exits the process.

mod restore;
mod save;

pub use restore::RestoreOrchestrator;
pub use save::SaveOrchestrator;

use crate::backend::SelectedBackend;
use crate::config::Config;
use crate::runner::{ActionOutputs, RunnerEnv};
use crate::state::{NullStateStore, RunnerStateStore, StateStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a phase needs from its surroundings
#[derive(Debug)]
pub struct CacheContext {
    pub env: RunnerEnv,
    pub backend: SelectedBackend,
    pub outputs: ActionOutputs,
}

impl CacheContext {
    /// Build a context, selecting the backend from the environment snapshot
    pub fn new(env: RunnerEnv, config: &Config) -> Self {
        let backend = SelectedBackend::select(&env, config);
        Self::with_backend(env, backend)
    }

    /// Build a context around an already selected backend
    pub fn with_backend(env: RunnerEnv, backend: SelectedBackend) -> Self {
        let outputs = ActionOutputs::from_env(&env);
        Self {
            env,
            backend,
            outputs,
        }
    }

    /// Log the shared prologue checks; `false` when the phase should stop
    fn is_valid_event(&self) -> bool {
        if self.env.is_valid_event() {
            return true;
        }

        warn!(
            "Event Validation Error: The event type {} is not supported because it's not tied to a branch or tag ref.",
            self.env.event_name()
        );
        false
    }

    fn announce_backend(&self) {
        if self.backend.kind().is_alternate() {
            info!("The cache action detected a local S3 bucket cache. Using it.");
        }
    }
}

/// How state travels between the phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    /// Through the runner's state file (`restore` then `save`)
    Persisted,
    /// Not at all (`restore-only`, `save-only`)
    Disabled,
}

impl StateMode {
    /// Create the store for this mode
    pub fn state_store(self, env: &RunnerEnv) -> Arc<dyn StateStore> {
        match self {
            Self::Persisted => Arc::new(RunnerStateStore::from_env(env)),
            Self::Disabled => Arc::new(NullStateStore),
        }
    }
}

/// Report panics as warnings instead of the default stderr dump
///
/// Installed by the save commands: a panic on any thread, including stray
/// transfer threads still running after the flow returned, must not read as
/// a failed step.
pub fn install_panic_downgrade() {
    std::panic::set_hook(Box::new(|info| {
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());

        match info.location() {
            Some(location) => warn!("{} ({})", message, location),
            None => warn!("{}", message),
        }
    }));
}
