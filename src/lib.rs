//! cache-relay - CI cache restore and save
//!
//! Restores a keyed cache before a job body and saves it afterwards, through
//! the runner's hosted cache service or a local S3 bucket.

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod runner;
pub mod state;
pub mod subscription;

pub use error::{CacheError, CacheResult};
