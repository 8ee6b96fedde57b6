//! Cache backends
//!
//! Two interchangeable providers move archives to and from remote storage:
//! - Hosted: the runner's cache service
//! - S3: a bucket next to self-hosted runners, selected by `RUNS_ON_S3_BUCKET_CACHE`
//!
//! Past selection the orchestrators only see [`CacheBackend`].

mod archive;
mod factory;
#[cfg(test)]
mod fake_service;
mod hosted;
mod s3;

#[cfg(test)]
pub(crate) mod mock;

pub use archive::{cache_version, Archiver};
pub use factory::{create_backend, BackendKind, SelectedBackend};
pub use hosted::HostedBackend;
pub use s3::S3Backend;

use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;

/// Sentinel returned by [`CacheBackend::save`] when nothing was saved
pub const SAVE_FAILED: i64 = -1;

/// Options for a restore call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Report a hit without downloading the archive
    pub lookup_only: bool,
}

/// Options for a save call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Upload chunk size in bytes
    pub upload_chunk_size: Option<u64>,
}

/// Remote cache provider
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Restore the first entry matching `primary_key` or, failing that, one of
    /// `restore_keys` in order
    ///
    /// Returns the matched key, or `None` on a clean miss. Transport and
    /// authorization failures are errors.
    async fn restore(
        &self,
        paths: &[String],
        primary_key: &str,
        restore_keys: &[String],
        options: RestoreOptions,
        enable_cross_os_archive: bool,
    ) -> CacheResult<Option<String>>;

    /// Save `paths` under `key`
    ///
    /// Returns a positive id, or [`SAVE_FAILED`] when the save failed softly.
    /// Only malformed input is an error.
    async fn save(
        &self,
        paths: &[String],
        key: &str,
        options: SaveOptions,
        enable_cross_os_archive: bool,
    ) -> CacheResult<i64>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// Run blocking HTTP work off the async scheduler
pub(crate) async fn blocking<T, F>(task: F) -> CacheResult<T>
where
    F: FnOnce() -> CacheResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| CacheError::Internal(format!("blocking task failed: {e}")))?
}
