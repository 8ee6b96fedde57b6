//! Save phase

use crate::backend::{SaveOptions, SAVE_FAILED};
use crate::cache::{is_exact_key_match, CacheInputs, CacheRequest};
use crate::error::CacheResult;
use crate::orchestration::CacheContext;
use crate::state::{StateKey, StateStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs the save phase against the selected backend
///
/// Saving is best effort: no failure inside the flow, panics included, ever
/// reaches the caller. The outcome is a cache id or [`SAVE_FAILED`].
#[derive(Clone)]
pub struct SaveOrchestrator {
    context: Arc<CacheContext>,
    state: Arc<dyn StateStore>,
}

impl SaveOrchestrator {
    pub fn new(context: Arc<CacheContext>, state: Arc<dyn StateStore>) -> Self {
        Self { context, state }
    }

    /// Save the cache described by `inputs`
    pub async fn save(&self, inputs: &CacheInputs) -> i64 {
        let this = self.clone();
        let inputs = inputs.clone();

        match tokio::spawn(async move { this.try_save(&inputs).await }).await {
            Ok(Ok(cache_id)) => cache_id,
            Ok(Err(err)) => {
                warn!("{}", err);
                SAVE_FAILED
            }
            // The panic hook has already reported the message
            Err(err) if err.is_panic() => {
                debug!("Cache save task panicked");
                SAVE_FAILED
            }
            Err(err) => {
                warn!("Cache save task failed: {}", err);
                SAVE_FAILED
            }
        }
    }

    async fn try_save(&self, inputs: &CacheInputs) -> CacheResult<i64> {
        let context = &self.context;

        if !context.backend.kind().is_alternate() && !context.env.is_cache_feature_available() {
            return Ok(SAVE_FAILED);
        }

        if !context.is_valid_event() {
            return Ok(SAVE_FAILED);
        }

        // Prefer the key restore resolved; the input may since have changed
        let stored = self.state.get_state(StateKey::PrimaryKey);
        let primary_key = if stored.is_empty() {
            inputs.key().map(str::to_string)
        } else {
            Some(stored)
        };

        let Some(primary_key) = primary_key else {
            warn!("Key is not specified.");
            return Ok(SAVE_FAILED);
        };

        let restored_key = self.state.cache_state();
        if is_exact_key_match(&primary_key, restored_key.as_deref()) {
            info!(
                "Cache hit occurred on the primary key {}, not saving cache.",
                primary_key
            );
            return Ok(SAVE_FAILED);
        }

        let request = CacheRequest::new(primary_key, inputs)?;

        context.announce_backend();

        let cache_id = context
            .backend
            .backend()
            .save(
                &request.paths,
                &request.primary_key,
                SaveOptions {
                    upload_chunk_size: request.upload_chunk_size,
                },
                request.enable_cross_os_archive,
            )
            .await?;

        if cache_id != SAVE_FAILED {
            info!("Cache saved with key: {}", request.primary_key);
        }

        Ok(cache_id)
    }
}
