//! Persistence layer for the TriTrack board
//!
//! This module provides a trait-based abstraction over where the state
//! document lives (a JSON file, a SQLite key-value table, or a remote URL)
//! while every backend shares the same load/save contract.

mod file_backend;
mod kv_backend;
mod remote_backend;
mod traits;

pub use file_backend::FileBackend;
pub use kv_backend::{KvBackend, LEGACY_STATE_KEYS, STATE_KEY};
pub use remote_backend::RemoteBackend;
pub use traits::{BackendConfig, BackendType, StateBackend};

use anyhow::Result;
use std::time::Duration;

/// Creates a backend from its configuration, inferring the type from the
/// location when it is not given explicitly
pub fn create_backend(config: &BackendConfig) -> Result<Box<dyn StateBackend>> {
    let backend: Box<dyn StateBackend> = match config.resolved_type() {
        BackendType::File => Box::new(FileBackend::new(&config.location)),
        BackendType::Kv => Box::new(KvBackend::new(&config.location)?),
        BackendType::Remote => Box::new(RemoteBackend::new(
            config.location.clone(),
            Duration::from_secs(config.timeout_secs),
        )?),
    };
    log::debug!("Using {} backend at {}", backend.backend_type(), backend.location());
    Ok(backend)
}
