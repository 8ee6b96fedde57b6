//! Command-line interface

mod args;
pub mod commands;

pub use args::{CacheArgs, Cli, Commands};

use crate::error::CacheResult;
use crate::orchestration::StateMode;
use std::future::Future;
use tracing::{error, info};

/// How a cache command was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One half of a `restore` / `save` pair sharing runner state
    Phase,
    /// `restore-only` or `save-only`
    Standalone,
}

impl ExecutionMode {
    /// State strategy for this mode
    pub fn state_mode(self) -> StateMode {
        match self {
            Self::Phase => StateMode::Persisted,
            Self::Standalone => StateMode::Disabled,
        }
    }
}

/// Drive a command to completion and map the outcome to an exit code
///
/// The command runs in its own task so a panic anywhere in it fails the step
/// with code 1 like any other error. The panic message itself is reported by
/// the panic hook.
pub async fn run_to_exit_code<F>(command: F) -> u8
where
    F: Future<Output = CacheResult<()>> + Send + 'static,
{
    match tokio::spawn(command).await {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error!("{}", e);
            if let Some(hint) = e.hint() {
                info!("Hint: {}", hint);
            }
            1
        }
        Err(e) => {
            error!("Unexpected failure: {}", e);
            1
        }
    }
}
