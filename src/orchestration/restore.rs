//! Restore phase

use crate::backend::RestoreOptions;
use crate::cache::{CacheInputs, CacheOutcome, CacheRequest};
use crate::error::{CacheError, CacheResult};
use crate::orchestration::CacheContext;
use crate::runner::CACHE_HIT;
use crate::state::{StateKey, StateStore};
use std::sync::Arc;
use tracing::info;

/// Runs the restore phase against the selected backend
pub struct RestoreOrchestrator {
    context: Arc<CacheContext>,
    state: Arc<dyn StateStore>,
}

impl RestoreOrchestrator {
    pub fn new(context: Arc<CacheContext>, state: Arc<dyn StateStore>) -> Self {
        Self { context, state }
    }

    /// Restore the cache described by `inputs`
    ///
    /// Returns the matched key, or `None` when nothing was restored. Errors
    /// are left for the caller to report as a failed step.
    pub async fn restore(&self, inputs: &CacheInputs) -> CacheResult<Option<String>> {
        let context = &self.context;

        if !context.env.is_cache_feature_available() {
            context.outputs.set(CACHE_HIT, "false")?;
            return Ok(None);
        }

        if !context.is_valid_event() {
            return Ok(None);
        }

        let primary_key = inputs.key().ok_or(CacheError::MissingInput("key"))?;
        self.state.set_state(StateKey::PrimaryKey, primary_key)?;

        let request = CacheRequest::new(primary_key, inputs)?;

        context.announce_backend();

        let matched = context
            .backend
            .backend()
            .restore(
                &request.paths,
                &request.primary_key,
                &request.restore_keys,
                RestoreOptions {
                    lookup_only: request.lookup_only,
                },
                request.enable_cross_os_archive,
            )
            .await?;

        let Some(matched_key) = matched else {
            if request.fail_on_cache_miss {
                return Err(CacheError::CacheMiss {
                    key: request.primary_key,
                    restore_keys: request.restore_keys,
                });
            }

            info!(
                "Cache not found for input keys: {}",
                request.all_keys().join(", ")
            );
            return Ok(None);
        };

        self.state.set_state(StateKey::MatchedKey, &matched_key)?;

        let outcome = CacheOutcome::resolve(&request.primary_key, Some(matched_key.clone()));
        context.outputs.set(CACHE_HIT, outcome.cache_hit())?;

        if request.lookup_only {
            info!("Cache found and can be restored from key: {}", matched_key);
        } else {
            info!("Cache restored from key: {}", matched_key);
        }

        Ok(Some(matched_key))
    }
}
