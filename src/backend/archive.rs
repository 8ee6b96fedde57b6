//! Cache archives
//!
//! Archives are gzip tarballs produced by the system `tar`, with paths kept
//! relative to the workspace so they unpack in the same place on the next run.

use crate::error::{CacheError, CacheResult};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Compression method recorded in the cache version
pub const COMPRESSION: &str = "gzip";

/// File name of the archive inside a scratch directory
pub const ARCHIVE_NAME: &str = "cache.tgz";

const VERSION_SALT: &str = "1.0";

/// Version string that scopes a cache entry to its paths and format
///
/// Entries saved on Windows are only visible to Windows unless the cross-OS
/// flag is set.
pub fn cache_version(paths: &[String], enable_cross_os_archive: bool) -> String {
    let mut components: Vec<&str> = paths.iter().map(String::as_str).collect();
    components.push(COMPRESSION);

    if cfg!(windows) && !enable_cross_os_archive {
        components.push("windows-only");
    }

    components.push(VERSION_SALT);

    hex::encode(Sha256::digest(components.join("|").as_bytes()))
}

/// Creates and extracts cache archives
#[derive(Debug, Clone)]
pub struct Archiver {
    workspace: PathBuf,
}

impl Archiver {
    /// Create an archiver rooted at the workspace directory
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    /// Archive `paths` into `archive`
    pub async fn create(&self, paths: &[String], archive: &Path) -> CacheResult<()> {
        let mut args: Vec<OsString> = vec![
            "-czf".into(),
            archive.into(),
            "-P".into(),
            "-C".into(),
            self.workspace.clone().into(),
            "--".into(),
        ];
        args.extend(paths.iter().map(|path| OsString::from(expand_home(path))));

        self.tar(&args).await
    }

    /// Unpack `archive` into the workspace
    pub async fn extract(&self, archive: &Path) -> CacheResult<()> {
        let args: Vec<OsString> = vec![
            "-xzf".into(),
            archive.into(),
            "-P".into(),
            "-C".into(),
            self.workspace.clone().into(),
        ];

        self.tar(&args).await
    }

    async fn tar(&self, args: &[OsString]) -> CacheResult<()> {
        debug!("Executing: tar {:?}", args);

        let output = Command::new("tar")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CacheError::command_failed("tar", e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CacheError::command_exec(
                format!("tar {:?}", args),
                String::from_utf8_lossy(&output.stderr),
            ))
        }
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => path.to_string(),
    }
}

/// Human-readable archive size, in the service's log format
pub(crate) fn describe_size(bytes: u64) -> String {
    format!("~{} MB ({} B)", bytes / (1024 * 1024), bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn version_is_stable() {
        let a = cache_version(&paths(&["target", "~/.cargo"]), false);
        let b = cache_version(&paths(&["target", "~/.cargo"]), false);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn version_depends_on_paths() {
        let a = cache_version(&paths(&["target"]), false);
        let b = cache_version(&paths(&["node_modules"]), false);
        assert_ne!(a, b);
    }

    #[cfg(not(windows))]
    #[test]
    fn cross_os_flag_is_ignored_off_windows() {
        let p = paths(&["target"]);
        assert_eq!(cache_version(&p, true), cache_version(&p, false));
    }

    #[test]
    fn expand_home_prefix() {
        assert_eq!(expand_home("target"), "target");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home("~/.cargo"),
                home.join(".cargo").to_string_lossy()
            );
        }
    }

    #[test]
    fn size_description() {
        assert_eq!(describe_size(3 * 1024 * 1024 + 5), "~3 MB (3145733 B)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn archive_roundtrip() {
        let source = TempDir::new().unwrap();
        std::fs::create_dir_all(source.path().join("deps")).unwrap();
        std::fs::write(source.path().join("deps/lib.txt"), "cached").unwrap();

        let scratch = TempDir::new().unwrap();
        let archive = scratch.path().join(ARCHIVE_NAME);
        Archiver::new(source.path().to_path_buf())
            .create(&paths(&["deps"]), &archive)
            .await
            .unwrap();

        let target = TempDir::new().unwrap();
        Archiver::new(target.path().to_path_buf())
            .extract(&archive)
            .await
            .unwrap();

        let restored = std::fs::read_to_string(target.path().join("deps/lib.txt")).unwrap();
        assert_eq!(restored, "cached");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_path_fails() {
        let source = TempDir::new().unwrap();
        let archive = source.path().join(ARCHIVE_NAME);
        let err = Archiver::new(source.path().to_path_buf())
            .create(&paths(&["does-not-exist"]), &archive)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::CommandExecution { .. }));
    }
}
