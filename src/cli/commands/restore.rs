//! Restore commands

use crate::cache::CacheInputs;
use crate::cli::{CacheArgs, ExecutionMode};
use crate::config::Config;
use crate::error::CacheResult;
use crate::orchestration::{CacheContext, RestoreOrchestrator};
use crate::subscription::SubscriptionGate;
use std::sync::Arc;
use tracing::debug;

/// Execute `restore` or `restore-only`
pub async fn execute(
    args: CacheArgs,
    mode: ExecutionMode,
    context: Arc<CacheContext>,
    config: &Config,
) -> CacheResult<()> {
    if mode == ExecutionMode::Standalone {
        SubscriptionGate::new(&config.subscription, &context.env)
            .check()
            .await?;
    }

    let inputs = CacheInputs::from(args);
    let state = mode.state_mode().state_store(&context.env);

    let matched = RestoreOrchestrator::new(context, state)
        .restore(&inputs)
        .await?;
    debug!("Restore finished, matched key: {:?}", matched);

    Ok(())
}
