//! Persistence abstraction traits
//!
//! This module defines the contract every state backend implements: raw
//! document access plus the shared load/save behavior built on top of it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::models::State;
use crate::normalize::{create_initial_state, normalize_state_reporting};

/// Types of state backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Single JSON document on the local filesystem
    File,
    /// SQLite-backed key-value store
    Kv,
    /// JSON document behind an HTTP GET/PUT endpoint
    Remote,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::File => write!(f, "file"),
            BackendType::Kv => write!(f, "kv"),
            BackendType::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for BackendType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" | "json" => Ok(BackendType::File),
            "kv" | "sqlite" => Ok(BackendType::Kv),
            "remote" | "http" => Ok(BackendType::Remote),
            other => anyhow::bail!("Unknown backend type: {} (expected file, kv or remote)", other),
        }
    }
}

/// Configuration for state backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type, inferred from `location` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<BackendType>,
    /// File path, database path or document URL
    pub location: String,
    /// Request timeout for the remote backend
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: None,
            location: "data/state.json".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    /// Returns the explicit backend type or infers it from the location
    pub fn resolved_type(&self) -> BackendType {
        if let Some(bt) = self.backend_type {
            return bt;
        }
        if self.location.starts_with("http://") || self.location.starts_with("https://") {
            return BackendType::Remote;
        }
        match std::path::Path::new(&self.location)
            .extension()
            .and_then(|e| e.to_str())
        {
            Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Kv,
            _ => BackendType::File,
        }
    }
}

/// Core trait for state backends
///
/// Backends only move a JSON document in and out of their store. Parsing,
/// normalization and the fallback to defaults are shared:
/// - `load()` never fails; any problem is logged and the initial state returned
/// - `try_load()` is the same read path with errors propagated
/// - `save()` always writes the whole document and reports failures
pub trait StateBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Human-readable location of the stored document
    fn location(&self) -> String;

    /// Reads the stored document, `None` if nothing is stored yet
    fn read_document(&self) -> Result<Option<String>>;

    /// Replaces the stored document
    fn write_document(&self, contents: &str) -> Result<()>;

    /// Whether a missing document is created with the initial state on first load
    fn seeds_missing_document(&self) -> bool {
        false
    }

    /// Loads and normalizes the stored state, propagating failures
    fn try_load(&self) -> Result<State> {
        Ok(self.try_load_reporting()?.0)
    }

    /// Like [`try_load`](Self::try_load), also reporting whether the stored
    /// document needed a workspace repair that has not been written back yet
    fn try_load_reporting(&self) -> Result<(State, bool)> {
        match self.read_document()? {
            Some(text) => {
                let raw: Value = serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse state JSON from {}", self.location()))?;
                let (state, repaired) = normalize_state_reporting(&raw);
                if repaired {
                    log::debug!("Repaired state loaded from {}", self.location());
                }
                Ok((state, repaired))
            }
            None => {
                let initial = create_initial_state();
                if self.seeds_missing_document() {
                    log::debug!("Seeding {} with the initial state", self.location());
                    if let Err(e) = self.save(&initial) {
                        log::warn!("Failed to seed {}: {:#}", self.location(), e);
                    }
                }
                Ok((initial, false))
            }
        }
    }

    /// Loads the stored state, falling back to the initial state on any failure
    fn load(&self) -> State {
        self.load_reporting().0
    }

    /// Like [`load`](Self::load), also reporting a pending repair. A fallback
    /// after a failed read is not a repair: the unreadable document is left alone.
    fn load_reporting(&self) -> (State, bool) {
        match self.try_load_reporting() {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!(
                    "Failed to load state from {}, restored defaults: {:#}",
                    self.location(),
                    e
                );
                (create_initial_state(), false)
            }
        }
    }

    /// Serializes the whole state and replaces the stored document
    fn save(&self, state: &State) -> Result<()> {
        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
        self.write_document(&json)
            .with_context(|| format!("Failed to save state to {}", self.location()))
    }
}

impl<B: StateBackend + ?Sized> StateBackend for Box<B> {
    fn backend_type(&self) -> BackendType {
        (**self).backend_type()
    }

    fn location(&self) -> String {
        (**self).location()
    }

    fn read_document(&self) -> Result<Option<String>> {
        (**self).read_document()
    }

    fn write_document(&self, contents: &str) -> Result<()> {
        (**self).write_document(contents)
    }

    fn seeds_missing_document(&self) -> bool {
        (**self).seeds_missing_document()
    }
}
