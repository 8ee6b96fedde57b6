//! Scriptable backend for orchestrator tests

use crate::backend::{CacheBackend, RestoreOptions, SaveOptions};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// What a mocked restore does
#[derive(Debug, Clone)]
pub enum RestoreBehavior {
    Hit(String),
    Miss,
    Fail(String),
}

/// What a mocked save does
#[derive(Debug, Clone)]
pub enum SaveBehavior {
    Id(i64),
    Fail(String),
    Panic,
}

/// A recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Restore {
        primary_key: String,
        restore_keys: Vec<String>,
        lookup_only: bool,
    },
    Save {
        key: String,
        upload_chunk_size: Option<u64>,
    },
}

pub struct MockBackend {
    restore: RestoreBehavior,
    save: SaveBehavior,
    calls: Mutex<Vec<Call>>,
}

impl MockBackend {
    pub fn new(restore: RestoreBehavior, save: SaveBehavior) -> Self {
        Self {
            restore,
            save,
            calls: Mutex::default(),
        }
    }

    pub fn restoring(restore: RestoreBehavior) -> Self {
        Self::new(restore, SaveBehavior::Id(42))
    }

    pub fn saving(save: SaveBehavior) -> Self {
        Self::new(RestoreBehavior::Miss, save)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl CacheBackend for MockBackend {
    async fn restore(
        &self,
        _paths: &[String],
        primary_key: &str,
        restore_keys: &[String],
        options: RestoreOptions,
        _enable_cross_os_archive: bool,
    ) -> CacheResult<Option<String>> {
        self.record(Call::Restore {
            primary_key: primary_key.to_string(),
            restore_keys: restore_keys.to_vec(),
            lookup_only: options.lookup_only,
        });

        match &self.restore {
            RestoreBehavior::Hit(key) => Ok(Some(key.clone())),
            RestoreBehavior::Miss => Ok(None),
            RestoreBehavior::Fail(message) => Err(CacheError::service("getCacheEntry", 500, message.as_str())),
        }
    }

    async fn save(
        &self,
        _paths: &[String],
        key: &str,
        options: SaveOptions,
        _enable_cross_os_archive: bool,
    ) -> CacheResult<i64> {
        self.record(Call::Save {
            key: key.to_string(),
            upload_chunk_size: options.upload_chunk_size,
        });

        match &self.save {
            SaveBehavior::Id(id) => Ok(*id),
            SaveBehavior::Fail(message) => Err(CacheError::Validation(message.clone())),
            SaveBehavior::Panic => panic!("backend exploded"),
        }
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
