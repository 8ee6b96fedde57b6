//! CLI argument definitions using clap derive
//!
//! Every cache input can also come from the runner's `INPUT_*` variable, so
//! the binary works unchanged as an action entry point.

use crate::cache::CacheInputs;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// cache-relay - restore and save CI caches across job phases
///
/// Restores a keyed cache before the job body and saves it afterwards,
/// using the runner's hosted cache service or a local S3 bucket.
#[derive(Parser, Debug)]
#[command(name = "cache-relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CACHE_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Return the exit status instead of exiting as soon as the flow completes
    #[arg(long, global = true)]
    pub no_early_exit: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore phase; records state for a later `save`
    Restore(CacheArgs),

    /// Standalone restore; records no state
    RestoreOnly(CacheArgs),

    /// Save phase; reads the state recorded by `restore`
    Save(CacheArgs),

    /// Standalone save; always uploads unless the key is missing
    SaveOnly(CacheArgs),
}

impl Commands {
    /// Whether this is one of the best-effort save commands
    pub fn is_save(&self) -> bool {
        matches!(self, Self::Save(_) | Self::SaveOnly(_))
    }
}

/// Cache inputs shared by every command
#[derive(Parser, Debug, Clone, Default)]
pub struct CacheArgs {
    /// Primary cache key
    #[arg(long, env = "INPUT_KEY")]
    pub key: Option<String>,

    /// Ordered fallback key prefixes, one per line
    #[arg(long, env = "INPUT_RESTORE-KEYS", value_delimiter = '\n')]
    pub restore_keys: Vec<String>,

    /// Files and directories to cache, one per line
    #[arg(long, env = "INPUT_PATH", value_delimiter = '\n')]
    pub path: Vec<String>,

    /// Allow a Windows-created entry to be restored on other platforms
    #[arg(
        long,
        env = "INPUT_ENABLECROSSOSARCHIVE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_input_bool
    )]
    pub enable_cross_os_archive: bool,

    /// Fail the step when no entry matches
    #[arg(
        long,
        env = "INPUT_FAIL-ON-CACHE-MISS",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_input_bool
    )]
    pub fail_on_cache_miss: bool,

    /// Check for a matching entry without downloading it
    #[arg(
        long,
        env = "INPUT_LOOKUP-ONLY",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_input_bool
    )]
    pub lookup_only: bool,

    /// Upload chunk size in bytes
    #[arg(long, env = "INPUT_UPLOAD-CHUNK-SIZE")]
    pub upload_chunk_size: Option<String>,
}

/// Boolean inputs are true only for `true`, in any case
fn parse_input_bool(value: &str) -> Result<bool, String> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

impl From<CacheArgs> for CacheInputs {
    fn from(args: CacheArgs) -> Self {
        Self {
            key: args.key,
            restore_keys: CacheInputs::parse_list(args.restore_keys.as_slice()),
            paths: CacheInputs::parse_list(args.path.as_slice()),
            enable_cross_os_archive: args.enable_cross_os_archive,
            fail_on_cache_miss: args.fail_on_cache_miss,
            lookup_only: args.lookup_only,
            upload_chunk_size: CacheInputs::parse_chunk_size(args.upload_chunk_size.as_deref()),
        }
    }
}
