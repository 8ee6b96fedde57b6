//! Runner environment
//!
//! Everything the orchestrators need from the CI runner is captured once, at
//! process start, into a [`RunnerEnv`] value that is passed down explicitly.

pub mod file_command;
pub mod outputs;

pub use outputs::{ActionOutputs, CACHE_HIT};

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

/// Environment variable names read from the runner
pub mod vars {
    /// Name of the event that triggered the workflow
    pub const EVENT_NAME: &str = "GITHUB_EVENT_NAME";
    /// Branch or tag ref of the run; absent for events without one
    pub const REF: &str = "GITHUB_REF";
    /// Base URL of the hosted cache service
    pub const CACHE_URL: &str = "ACTIONS_CACHE_URL";
    /// Bearer token for runner services
    pub const RUNTIME_TOKEN: &str = "ACTIONS_RUNTIME_TOKEN";
    /// Server URL, used to tell github.com from GHES
    pub const SERVER_URL: &str = "GITHUB_SERVER_URL";
    /// `owner/repo`
    pub const REPOSITORY: &str = "GITHUB_REPOSITORY";
    /// Checkout directory
    pub const WORKSPACE: &str = "GITHUB_WORKSPACE";
    /// Runner scratch directory
    pub const RUNNER_TEMP: &str = "RUNNER_TEMP";
    /// File command receiving step state
    pub const STATE_FILE: &str = "GITHUB_STATE";
    /// File command receiving step outputs
    pub const OUTPUT_FILE: &str = "GITHUB_OUTPUT";
    /// Presence selects the S3 bucket backend; the value is the bucket name
    pub const S3_BUCKET: &str = "RUNS_ON_S3_BUCKET_CACHE";
    /// Region of the S3 bucket
    pub const AWS_REGION: &str = "RUNS_ON_AWS_REGION";
    /// Set to `1` when step debug logging is enabled
    pub const RUNNER_DEBUG: &str = "RUNNER_DEBUG";
    /// Prefix under which the runner replays saved state to post steps
    pub const STATE_PREFIX: &str = "STATE_";
}

/// Snapshot of the runner environment
#[derive(Debug, Clone, Default)]
pub struct RunnerEnv {
    pub event_name: Option<String>,
    pub git_ref: Option<String>,
    pub cache_url: Option<String>,
    pub runtime_token: Option<String>,
    pub server_url: Option<String>,
    pub repository: Option<String>,
    pub workspace: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    /// Kept even when empty: presence alone selects the S3 backend
    pub s3_bucket: Option<String>,
    pub aws_region: Option<String>,
    pub step_debug: bool,
    /// `STATE_*` values replayed by the runner, keyed without the prefix
    pub saved_state: HashMap<String, String>,
}

impl RunnerEnv {
    /// Capture the current process environment
    pub fn capture() -> Self {
        let mut env = Self::from_vars(std::env::vars());
        if env.workspace.is_none() {
            env.workspace = std::env::current_dir().ok();
        }
        env
    }

    /// Build a snapshot from an explicit set of variables
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut env = Self::default();

        for (name, value) in vars {
            let name = name.into();
            let value = value.into();

            if let Some(state) = name.strip_prefix(vars::STATE_PREFIX) {
                env.saved_state.insert(state.to_string(), value);
                continue;
            }

            match name.as_str() {
                vars::S3_BUCKET => env.s3_bucket = Some(value),
                vars::RUNNER_DEBUG => env.step_debug = value == "1",
                _ if value.is_empty() => {}
                vars::EVENT_NAME => env.event_name = Some(value),
                vars::REF => env.git_ref = Some(value),
                vars::CACHE_URL => env.cache_url = Some(value),
                vars::RUNTIME_TOKEN => env.runtime_token = Some(value),
                vars::SERVER_URL => env.server_url = Some(value),
                vars::REPOSITORY => env.repository = Some(value),
                vars::WORKSPACE => env.workspace = Some(PathBuf::from(value)),
                vars::RUNNER_TEMP => env.temp_dir = Some(PathBuf::from(value)),
                vars::STATE_FILE => env.state_file = Some(PathBuf::from(value)),
                vars::OUTPUT_FILE => env.output_file = Some(PathBuf::from(value)),
                vars::AWS_REGION => env.aws_region = Some(value),
                _ => {}
            }
        }

        env
    }

    /// Whether the hosted cache service can be reached from this job
    ///
    /// Logs a warning explaining why when it cannot.
    pub fn is_cache_feature_available(&self) -> bool {
        if self.cache_url.is_some() {
            return true;
        }

        if self.is_ghes() {
            warn!(
                "Cache action is only supported on GHES version >= 3.5. If you are on version >=3.5 Please check with GHES admin if Actions cache service is enabled or not."
            );
        } else {
            warn!(
                "An internal error has occurred in cache backend. Please check https://www.githubstatus.com/ for any ongoing issue in actions."
            );
        }
        false
    }

    /// Whether the run is tied to a branch or tag ref
    pub fn is_valid_event(&self) -> bool {
        self.git_ref.is_some()
    }

    /// Event name for diagnostics
    pub fn event_name(&self) -> &str {
        self.event_name.as_deref().unwrap_or("<unset>")
    }

    /// Whether the server is a GitHub Enterprise Server instance
    pub fn is_ghes(&self) -> bool {
        let url = self.server_url.as_deref().unwrap_or("https://github.com");
        let Some(host) = url
            .parse::<ureq::http::Uri>()
            .ok()
            .and_then(|uri| uri.host().map(str::to_ascii_lowercase))
        else {
            return false;
        };

        host != "github.com" && !host.ends_with(".ghe.com") && !host.ends_with(".localhost")
    }

    /// Directory cache paths are resolved against
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Scratch directory for archives
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
