//! S3 bucket backend
//!
//! Used on self-hosted runners that provide a bucket through
//! `RUNS_ON_S3_BUCKET_CACHE`. Objects live at
//! `<prefix>/<repository>/<key>.tgz`; transfers go through the `aws` CLI so
//! the runner's instance credentials apply unchanged.

use crate::backend::archive::{describe_size, Archiver, ARCHIVE_NAME};
use crate::backend::{CacheBackend, RestoreOptions, SaveOptions, SAVE_FAILED};
use crate::cache::{validate_key, validate_keys, validate_paths};
use crate::config::schema::S3Config;
use crate::error::{CacheError, CacheResult};
use crate::runner::RunnerEnv;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

const OBJECT_SUFFIX: &str = ".tgz";

/// Id reported for successful saves; S3 has no server-side cache ids
const SAVED_ID: i64 = 1;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectListing {
    #[serde(default)]
    contents: Vec<ObjectSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectSummary {
    key: String,
    last_modified: DateTime<Utc>,
}

/// Parse `aws s3api list-objects-v2 --output json`
///
/// An empty prefix makes the CLI print nothing at all.
fn parse_listing(stdout: &str) -> CacheResult<Vec<ObjectSummary>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let listing: ObjectListing = serde_json::from_str(stdout)?;
    Ok(listing.contents)
}

/// Pick the object for a lookup key: the exact object, else the newest one
/// starting with it
fn select_match<'a>(objects: &'a [ObjectSummary], object_prefix: &str) -> Option<&'a ObjectSummary> {
    let exact = format!("{object_prefix}{OBJECT_SUFFIX}");
    if let Some(object) = objects.iter().find(|o| o.key == exact) {
        return Some(object);
    }

    objects
        .iter()
        .filter(|o| o.key.starts_with(object_prefix) && o.key.ends_with(OBJECT_SUFFIX))
        .max_by_key(|o| o.last_modified)
}

/// Backend storing archives in an S3 bucket
pub struct S3Backend {
    bucket: String,
    region: Option<String>,
    prefix: String,
    aws_cli: String,
    archiver: Archiver,
    temp_dir: PathBuf,
}

impl S3Backend {
    pub fn new(bucket: String, env: &RunnerEnv, config: &S3Config) -> Self {
        let repository = env.repository.as_deref().unwrap_or("unknown");
        let prefix = [config.key_prefix.trim_matches('/'), repository]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/");

        Self {
            bucket,
            region: env.aws_region.clone(),
            prefix,
            aws_cli: config.aws_cli.clone(),
            archiver: Archiver::new(env.workspace_dir()),
            temp_dir: env.temp_dir(),
        }
    }

    /// Object key for a cache key
    fn object_key(&self, key: &str) -> String {
        format!("{}/{}{}", self.prefix, key, OBJECT_SUFFIX)
    }

    /// Object key without the suffix, used for prefix lookups
    fn object_prefix(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, key)
    }

    /// Cache key stored in an object key
    fn cache_key<'a>(&self, object_key: &'a str) -> &'a str {
        let without_prefix = object_key
            .strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(object_key);
        without_prefix
            .strip_suffix(OBJECT_SUFFIX)
            .unwrap_or(without_prefix)
    }

    fn s3_uri(&self, object_key: &str) -> String {
        format!("s3://{}/{}", self.bucket, object_key)
    }

    fn ensure_bucket(&self) -> CacheResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(CacheError::S3(
                "RUNS_ON_S3_BUCKET_CACHE is set but empty".to_string(),
            ));
        }
        Ok(())
    }

    fn scratch_dir(&self) -> CacheResult<tempfile::TempDir> {
        tempfile::Builder::new()
            .prefix("cache-relay-")
            .tempdir_in(&self.temp_dir)
            .map_err(|e| CacheError::io("creating scratch directory", e))
    }

    /// Execute an aws CLI command and return its stdout
    async fn aws(&self, args: &[&str]) -> CacheResult<String> {
        let mut cmd = Command::new(&self.aws_cli);
        cmd.args(args);
        if let Some(region) = &self.region {
            cmd.args(["--region", region.as_str()]);
        }

        debug!("Executing: {} {}", self.aws_cli, args.join(" "));

        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CacheError::command_failed(&self.aws_cli, e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(CacheError::command_exec(
                format!("{} {}", self.aws_cli, args.join(" ")),
                String::from_utf8_lossy(&output.stderr),
            ))
        }
    }

    async fn list_objects(&self, object_prefix: &str) -> CacheResult<Vec<ObjectSummary>> {
        let stdout = self
            .aws(&[
                "s3api",
                "list-objects-v2",
                "--bucket",
                self.bucket.as_str(),
                "--prefix",
                object_prefix,
                "--output",
                "json",
            ])
            .await?;
        parse_listing(&stdout)
    }

    async fn find_object(&self, keys: &[&str]) -> CacheResult<Option<ObjectSummary>> {
        for key in keys {
            let object_prefix = self.object_prefix(key);
            let objects = self.list_objects(&object_prefix).await?;
            if let Some(found) = select_match(&objects, &object_prefix) {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }

    async fn download(&self, object_key: &str, archive: &Path) -> CacheResult<()> {
        let source = self.s3_uri(object_key);
        let destination = archive.to_string_lossy().into_owned();
        self.aws(&[
            "s3",
            "cp",
            source.as_str(),
            destination.as_str(),
            "--only-show-errors",
        ])
        .await
        .map(|_| ())
    }

    async fn upload(&self, paths: &[String], key: &str) -> CacheResult<i64> {
        let scratch = self.scratch_dir()?;
        let archive = scratch.path().join(ARCHIVE_NAME);

        self.archiver.create(paths, &archive).await?;
        if let Ok(metadata) = tokio::fs::metadata(&archive).await {
            debug!("Archive size: {}", describe_size(metadata.len()));
        }

        let source = archive.to_string_lossy().into_owned();
        let destination = self.s3_uri(&self.object_key(key));
        self.aws(&[
            "s3",
            "cp",
            source.as_str(),
            destination.as_str(),
            "--only-show-errors",
        ])
        .await?;

        Ok(SAVED_ID)
    }
}

#[async_trait]
impl CacheBackend for S3Backend {
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
        self.ensure_bucket()?;

        if enable_cross_os_archive {
            debug!("enableCrossOsArchive has no effect on the S3 cache");
        }

        let keys: Vec<&str> = std::iter::once(primary_key)
            .chain(restore_keys.iter().map(String::as_str))
            .collect();

        let Some(object) = self.find_object(&keys).await? else {
            return Ok(None);
        };
        let matched_key = self.cache_key(&object.key).to_string();

        if options.lookup_only {
            return Ok(Some(matched_key));
        }

        let scratch = self.scratch_dir()?;
        let archive = scratch.path().join(ARCHIVE_NAME);
        self.download(&object.key, &archive).await?;

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

        if options.upload_chunk_size.is_some() || enable_cross_os_archive {
            debug!("uploadChunkSize and enableCrossOsArchive have no effect on the S3 cache");
        }

        if let Err(err) = self.ensure_bucket() {
            warn!("Failed to save: {}", err);
            return Ok(SAVE_FAILED);
        }

        match self.upload(paths, key).await {
            Ok(id) => Ok(id),
            Err(err) => {
                warn!("Failed to save: {}", err);
                Ok(SAVE_FAILED)
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "S3 bucket cache"
    }
}
