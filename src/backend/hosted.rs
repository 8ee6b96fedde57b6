//! Hosted cache service backend
//!
//! Talks to the runner's cache service (`ACTIONS_CACHE_URL`) over its REST
//! API. Lookups send every candidate key in one request; the service applies
//! exact-then-prefix matching in key order. Saves reserve an entry, upload the
//! archive in chunks and commit it.

use crate::backend::archive::{cache_version, describe_size, Archiver, ARCHIVE_NAME};
use crate::backend::{blocking, CacheBackend, RestoreOptions, SaveOptions, SAVE_FAILED};
use crate::cache::{validate_key, validate_keys, validate_paths};
use crate::config::schema::HostedConfig;
use crate::error::{CacheError, CacheResult};
use crate::runner::RunnerEnv;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use ureq::http::Response;
use ureq::Body;

const ACCEPT: &str = "application/json;api-version=6.0-preview.1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest chunk held in memory during an upload
const MAX_CHUNK_SIZE: u64 = 128 * 1024 * 1024;

/// Bytes sent per PATCH: the requested size clamped to `1..=MAX_CHUNK_SIZE`,
/// and never more than the archive itself
fn effective_chunk_size(requested: u64, archive_size: u64) -> u64 {
    requested.clamp(1, MAX_CHUNK_SIZE).min(archive_size.max(1))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactCacheEntry {
    cache_key: Option<String>,
    archive_location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReserveCacheRequest<'a> {
    key: &'a str,
    version: &'a str,
    cache_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReserveCacheResponse {
    cache_id: i64,
}

#[derive(Debug, Serialize)]
struct CommitCacheRequest {
    size: u64,
}

/// Blocking client for the cache service API
struct CacheService {
    api: ureq::Agent,
    transfer: ureq::Agent,
    base_url: String,
    token: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl CacheService {
    fn new(cache_url: &str, token: String, config: &HostedConfig) -> Self {
        let api = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.request_timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        // Archive downloads can legitimately take longer than any API call
        let transfer = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            api,
            transfer,
            base_url: format!("{}/_apis/artifactcache/", cache_url.trim_end_matches('/')),
            token,
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    fn url(&self, resource: &str) -> String {
        format!("{}{}", self.base_url, resource)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Send a request, retrying transport failures and server errors
    fn send<F>(&self, operation: &str, request: F) -> CacheResult<Response<Body>>
    where
        F: Fn() -> Result<Response<Body>, ureq::Error>,
    {
        let mut attempt = 1;
        loop {
            let result = request().map_err(CacheError::from).and_then(|response| {
                let status = response.status().as_u16();
                if status >= 500 || status == 429 {
                    Err(CacheError::service(operation, status, "server error"))
                } else {
                    Ok(response)
                }
            });

            match result {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    debug!("{} failed on attempt {}: {}", operation, attempt, err);
                    attempt += 1;
                    std::thread::sleep(self.retry_delay);
                }
                other => return other,
            }
        }
    }

    fn lookup(&self, keys: &[String], version: &str) -> CacheResult<Option<ArtifactCacheEntry>> {
        let joined = keys.join(",");
        let mut response = self.send("getCacheEntry", || {
            self.api
                .get(self.url("cache"))
                .header("Accept", ACCEPT)
                .header("Authorization", self.bearer())
                .query("keys", &joined)
                .query("version", version)
                .call()
        })?;

        match response.status().as_u16() {
            204 => Ok(None),
            status if (200..300).contains(&status) => {
                let entry: ArtifactCacheEntry = response.body_mut().read_json()?;
                if entry.archive_location.is_none() {
                    debug!("Cache entry for {} has no archive location", joined);
                    return Ok(None);
                }
                Ok(Some(entry))
            }
            status => Err(CacheError::service(
                "getCacheEntry",
                status,
                error_body(&mut response),
            )),
        }
    }

    fn download(&self, location: &str, archive: &Path) -> CacheResult<()> {
        let response = self.send("downloadCache", || self.transfer.get(location).call())?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(CacheError::service(
                "downloadCache",
                status,
                "archive download failed",
            ));
        }

        let mut file = File::create(archive)
            .map_err(|e| CacheError::io(format!("creating {}", archive.display()), e))?;
        let mut reader = response.into_body().into_reader();
        std::io::copy(&mut reader, &mut file)
            .map_err(|e| CacheError::io("downloading cache archive", e))?;

        Ok(())
    }

    /// Reserve an entry; `None` when the service refuses the reservation
    fn reserve(&self, key: &str, version: &str, cache_size: u64) -> CacheResult<Option<i64>> {
        let body = ReserveCacheRequest {
            key,
            version,
            cache_size,
        };

        let mut response = self.send("reserveCache", || {
            self.api
                .post(self.url("caches"))
                .header("Accept", ACCEPT)
                .header("Authorization", self.bearer())
                .send_json(&body)
        })?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            let reserved: ReserveCacheResponse = response.body_mut().read_json()?;
            return Ok(Some(reserved.cache_id));
        }

        debug!(
            "Reserve cache failed with {}: {}",
            status,
            error_body(&mut response)
        );
        Ok(None)
    }

    fn upload(&self, cache_id: i64, archive: &Path, size: u64, chunk_size: u64) -> CacheResult<()> {
        let resource = self.url(&format!("caches/{cache_id}"));
        let mut file = File::open(archive)
            .map_err(|e| CacheError::io(format!("opening {}", archive.display()), e))?;
        let chunk_size = effective_chunk_size(chunk_size, size);
        let mut chunk = Vec::with_capacity(chunk_size as usize);
        let mut offset: u64 = 0;

        loop {
            chunk.clear();
            let read = (&mut file)
                .take(chunk_size)
                .read_to_end(&mut chunk)
                .map_err(|e| CacheError::io("reading cache archive", e))?;
            if read == 0 {
                break;
            }

            let end = offset + read as u64 - 1;
            let range = format!("bytes {offset}-{end}/*");
            debug!("Uploading chunk {} of cache {}", range, cache_id);

            let mut response = self.send("uploadChunk", || {
                self.api
                    .patch(&resource)
                    .header("Accept", ACCEPT)
                    .header("Authorization", self.bearer())
                    .header("Content-Type", "application/octet-stream")
                    .header("Content-Range", &range)
                    .send(chunk.as_slice())
            })?;

            let status = response.status().as_u16();
            if !(200..300).contains(&status) {
                return Err(CacheError::service(
                    "uploadChunk",
                    status,
                    error_body(&mut response),
                ));
            }

            offset += read as u64;
        }

        Ok(())
    }

    fn commit(&self, cache_id: i64, size: u64) -> CacheResult<()> {
        let body = CommitCacheRequest { size };
        let mut response = self.send("commitCache", || {
            self.api
                .post(self.url(&format!("caches/{cache_id}")))
                .header("Accept", ACCEPT)
                .header("Authorization", self.bearer())
                .send_json(&body)
        })?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(CacheError::service(
                "commitCache",
                status,
                error_body(&mut response),
            ))
        }
    }
}

fn error_body(response: &mut Response<Body>) -> String {
    response
        .body_mut()
        .read_to_string()
        .unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}

/// Backend using the runner's hosted cache service
pub struct HostedBackend {
    service: Option<Arc<CacheService>>,
    archiver: Archiver,
    temp_dir: PathBuf,
    config: HostedConfig,
}

impl HostedBackend {
    /// Create a backend from the runner environment
    ///
    /// Construction never fails; calls fail when the runner did not provide
    /// a cache service URL.
    pub fn new(env: &RunnerEnv, config: &HostedConfig) -> Self {
        let service = env.cache_url.as_deref().map(|url| {
            Arc::new(CacheService::new(
                url,
                env.runtime_token.clone().unwrap_or_default(),
                config,
            ))
        });

        Self {
            service,
            archiver: Archiver::new(env.workspace_dir()),
            temp_dir: env.temp_dir(),
            config: config.clone(),
        }
    }

    fn service(&self) -> CacheResult<Arc<CacheService>> {
        self.service
            .clone()
            .ok_or_else(|| CacheError::ServiceUnavailable("ACTIONS_CACHE_URL is not set".to_string()))
    }

    fn scratch_dir(&self) -> CacheResult<tempfile::TempDir> {
        tempfile::Builder::new()
            .prefix("cache-relay-")
            .tempdir_in(&self.temp_dir)
            .map_err(|e| CacheError::io("creating scratch directory", e))
    }

    async fn upload_cache(
        &self,
        paths: &[String],
        key: &str,
        options: SaveOptions,
        enable_cross_os_archive: bool,
    ) -> CacheResult<i64> {
        let service = self.service()?;
        let scratch = self.scratch_dir()?;
        let archive = scratch.path().join(ARCHIVE_NAME);

        self.archiver.create(paths, &archive).await?;

        let size = tokio::fs::metadata(&archive)
            .await
            .map_err(|e| CacheError::io("reading archive size", e))?
            .len();
        debug!("Archive size: {}", describe_size(size));

        if size > self.config.max_archive_size {
            warn!(
                "Cache size of {} is over the {}GB limit, not saving cache.",
                describe_size(size),
                self.config.max_archive_size / (1024 * 1024 * 1024)
            );
            return Ok(SAVE_FAILED);
        }

        let chunk_size = options
            .upload_chunk_size
            .unwrap_or(self.config.upload_chunk_size);
        let version = cache_version(paths, enable_cross_os_archive);
        let key = key.to_string();

        blocking(move || {
            let Some(cache_id) = service.reserve(&key, &version, size)? else {
                info!(
                    "Unable to reserve cache with key {}, another job may be creating this cache.",
                    key
                );
                return Ok(SAVE_FAILED);
            };

            debug!("Cache ID: {}", cache_id);
            service.upload(cache_id, &archive, size, chunk_size)?;
            service.commit(cache_id, size)?;
            Ok(cache_id)
        })
        .await
    }
}

#[async_trait]
impl CacheBackend for HostedBackend {
    async fn restore(
        &self,
        paths: &[String],
        primary_key: &str,
        restore_keys: &[String],
        options: RestoreOptions,
        enable_cross_os_archive: bool,
    ) -> CacheResult<Option<String>> {
        validate_paths(paths)?;
        validate_keys(primary_key, restore_keys)?;

        let service = self.service()?;
        let version = cache_version(paths, enable_cross_os_archive);
        let keys: Vec<String> = std::iter::once(primary_key.to_string())
            .chain(restore_keys.iter().cloned())
            .collect();

        let lookup = Arc::clone(&service);
        let Some(entry) = blocking(move || lookup.lookup(&keys, &version)).await? else {
            return Ok(None);
        };

        let matched_key = entry
            .cache_key
            .unwrap_or_else(|| primary_key.to_string());

        if options.lookup_only {
            return Ok(Some(matched_key));
        }

        let Some(location) = entry.archive_location else {
            return Ok(None);
        };

        let scratch = self.scratch_dir()?;
        let archive = scratch.path().join(ARCHIVE_NAME);
        let destination = archive.clone();
        blocking(move || service.download(&location, &destination)).await?;

        if let Ok(metadata) = tokio::fs::metadata(&archive).await {
            info!("Cache Size: {}", describe_size(metadata.len()));
        }

        self.archiver.extract(&archive).await?;
        info!("Cache restored successfully");

        Ok(Some(matched_key))
    }

    async fn save(
        &self,
        paths: &[String],
        key: &str,
        options: SaveOptions,
        enable_cross_os_archive: bool,
    ) -> CacheResult<i64> {
        validate_paths(paths)?;
        validate_key(key)?;

        match self
            .upload_cache(paths, key, options, enable_cross_os_archive)
            .await
        {
            Ok(cache_id) => Ok(cache_id),
            Err(err) => {
                warn!("Failed to save: {}", err);
                Ok(SAVE_FAILED)
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "GitHub Actions cache"
    }
}
