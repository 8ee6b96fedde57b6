//! Backend factory
//!
//! The backend is chosen once, from the runner snapshot taken at startup, and
//! handed to both orchestrators as a [`SelectedBackend`] value.

use crate::backend::hosted::HostedBackend;
use crate::backend::s3::S3Backend;
use crate::backend::CacheBackend;
use crate::config::Config;
use crate::runner::RunnerEnv;
use std::fmt;
use std::sync::Arc;

/// Which provider serves this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// The runner's hosted cache service (default)
    Hosted,
    /// An S3 bucket, selected by `RUNS_ON_S3_BUCKET_CACHE`
    S3 { bucket: String },
}

impl BackendKind {
    /// Select the backend from the runner environment
    pub fn detect(env: &RunnerEnv) -> Self {
        match &env.s3_bucket {
            Some(bucket) => Self::S3 {
                bucket: bucket.clone(),
            },
            None => Self::Hosted,
        }
    }

    /// Short backend name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::S3 { .. } => "s3",
        }
    }

    /// Whether the alternate backend was selected
    pub fn is_alternate(&self) -> bool {
        matches!(self, Self::S3 { .. })
    }
}

/// Create the backend for `kind`
pub fn create_backend(kind: &BackendKind, env: &RunnerEnv, config: &Config) -> Arc<dyn CacheBackend> {
    match kind {
        BackendKind::Hosted => Arc::new(HostedBackend::new(env, &config.hosted)),
        BackendKind::S3 { bucket } => Arc::new(S3Backend::new(bucket.clone(), env, &config.s3)),
    }
}

/// A backend together with the kind it was selected as
#[derive(Clone)]
pub struct SelectedBackend {
    kind: BackendKind,
    backend: Arc<dyn CacheBackend>,
}

impl SelectedBackend {
    /// Select and create the backend for this process
    pub fn select(env: &RunnerEnv, config: &Config) -> Self {
        let kind = BackendKind::detect(env);
        let backend = create_backend(&kind, env, config);
        Self { kind, backend }
    }

    /// Wrap an already constructed backend
    pub fn new(kind: BackendKind, backend: Arc<dyn CacheBackend>) -> Self {
        Self { kind, backend }
    }

    pub fn kind(&self) -> &BackendKind {
        &self.kind
    }

    pub fn backend(&self) -> &dyn CacheBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for SelectedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedBackend")
            .field("kind", &self.kind)
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}
