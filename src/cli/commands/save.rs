//! Save commands

use crate::backend::SAVE_FAILED;
use crate::cache::CacheInputs;
use crate::cli::{CacheArgs, ExecutionMode};
use crate::config::Config;
use crate::error::CacheResult;
use crate::orchestration::{CacheContext, SaveOrchestrator};
use crate::subscription::SubscriptionGate;
use std::sync::Arc;
use tracing::{debug, warn};

/// Execute `save` or `save-only`
///
/// Only a denied subscription fails the step; every save failure has already
/// been reported as a warning by the time the orchestrator returns.
pub async fn execute(
    args: CacheArgs,
    mode: ExecutionMode,
    context: Arc<CacheContext>,
    config: &Config,
) -> CacheResult<()> {
    SubscriptionGate::new(&config.subscription, &context.env)
        .check()
        .await?;

    let inputs = CacheInputs::from(args);
    let state = mode.state_mode().state_store(&context.env);

    let cache_id = SaveOrchestrator::new(context, state).save(&inputs).await;
    debug!("Save finished with cache id {}", cache_id);

    if mode == ExecutionMode::Standalone && cache_id == SAVE_FAILED {
        warn!("Cache save failed.");
    }

    Ok(())
}
