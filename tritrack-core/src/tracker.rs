//! Board controller
//!
//! [`Tracker`] owns the in-memory [`State`] together with the backend it was
//! loaded from. Every mutation goes through a method here and is followed by
//! a full-state save, so callers never touch raw JSON or a global.

use thiserror::Error;

use crate::db::StateBackend;
use crate::models::{Requirement, State, StatusCell, Workspace};
use crate::normalize::{create_empty_requirement, create_sample_requirements, new_workspace};
use crate::schema::{self, numbered_workspace_name, DEFAULT_WORKSPACE};
use crate::transfer::{self, ImportResult, TransferError};

/// Errors that can occur while editing the board
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Requirement not found: {0}")]
    RequirementNotFound(String),

    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Status {value:?} is not an option of phase {phase}")]
    InvalidStatus { phase: String, value: String },

    #[error("Workspace name cannot be empty")]
    EmptyName,

    #[error("At least one workspace must be kept")]
    LastWorkspace,

    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The in-memory change was applied but could not be written
    #[error("Change was not saved: {0:#}")]
    Save(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Explicit board state plus the backend it persists to
pub struct Tracker<B: StateBackend> {
    backend: B,
    state: State,
}

impl<B: StateBackend> Tracker<B> {
    /// Loads the board from `backend`. A state that had to be repaired on
    /// load is written back right away.
    pub fn open(backend: B) -> Self {
        let (state, repaired) = backend.load_reporting();
        Self::from_parts(backend, state, repaired)
    }

    /// Wraps an already loaded state
    pub fn with_state(backend: B, state: State) -> Self {
        Self::from_parts(backend, state, false)
    }

    fn from_parts(backend: B, state: State, repaired: bool) -> Self {
        let mut tracker = Self { backend, state };
        if tracker.ensure_workspace_availability() || repaired {
            if let Err(e) = tracker.persist() {
                log::warn!("Failed to save repaired state: {}", e);
            }
        }
        tracker
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn workspaces(&self) -> &[Workspace] {
        &self.state.workspaces
    }

    pub fn active_workspace(&self) -> Option<&Workspace> {
        self.state.active_workspace()
    }

    /// Restores the non-empty and active-workspace invariants.
    /// Returns true if the state had to be changed.
    fn ensure_workspace_availability(&mut self) -> bool {
        if self.state.workspaces.is_empty() {
            let fallback = new_workspace(DEFAULT_WORKSPACE, Vec::new());
            self.state.active_workspace_id = fallback.id.clone();
            self.state.workspaces.push(fallback);
            return true;
        }
        self.state.repair_active_workspace()
    }

    /// Writes the whole state to the backend
    pub fn persist(&self) -> Result<()> {
        log::debug!("Persisting state to {}", self.backend.location());
        self.backend.save(&self.state).map_err(TrackerError::Save)
    }

    fn active_workspace_mut(&mut self) -> Result<&mut Workspace> {
        self.ensure_workspace_availability();
        let id = self.state.active_workspace_id.clone();
        self.state
            .active_workspace_mut()
            .ok_or(TrackerError::WorkspaceNotFound(id))
    }

    fn requirement_mut(&mut self, id: &str) -> Result<&mut Requirement> {
        self.active_workspace_mut()?
            .get_requirement_mut(id)
            .ok_or_else(|| TrackerError::RequirementNotFound(id.to_string()))
    }

    fn cell_mut(&mut self, id: &str, phase: &str, platform: &str) -> Result<&mut StatusCell> {
        let phase = schema::phase(phase).ok_or_else(|| TrackerError::UnknownPhase(phase.into()))?;
        let platform = schema::platform(platform)
            .ok_or_else(|| TrackerError::UnknownPlatform(platform.into()))?;
        let requirement = self.requirement_mut(id)?;
        Ok(requirement
            .statuses
            .entry(phase.key.to_string())
            .or_default()
            .entry(platform.key.to_string())
            .or_insert_with(|| StatusCell::new(phase.default_value())))
    }

    // =========================================================================
    // Requirement operations (active workspace)
    // =========================================================================

    /// Appends an empty requirement and returns its ID
    pub fn add_requirement(&mut self) -> Result<String> {
        let requirement = create_empty_requirement();
        let id = requirement.id.clone();
        self.active_workspace_mut()?.requirements.push(requirement);
        self.persist()?;
        Ok(id)
    }

    pub fn delete_requirement(&mut self, id: &str) -> Result<()> {
        let workspace = self.active_workspace_mut()?;
        let original_len = workspace.requirements.len();
        workspace.requirements.retain(|r| r.id != id);
        if workspace.requirements.len() == original_len {
            return Err(TrackerError::RequirementNotFound(id.to_string()));
        }
        self.persist()
    }

    pub fn rename_requirement(&mut self, id: &str, name: &str) -> Result<()> {
        self.requirement_mut(id)?.name = name.to_string();
        self.persist()
    }

    /// Sets a cell's status; the value must belong to the phase's options
    pub fn set_status(&mut self, id: &str, phase: &str, platform: &str, value: &str) -> Result<()> {
        let allowed = schema::phase(phase).map(|p| p.allows(value)).unwrap_or(true);
        if !allowed {
            return Err(TrackerError::InvalidStatus {
                phase: phase.to_string(),
                value: value.to_string(),
            });
        }
        self.cell_mut(id, phase, platform)?.value = value.to_string();
        self.persist()
    }

    /// Sets a cell's owner. The owner picklist is advisory, any name is kept.
    pub fn set_owner(&mut self, id: &str, phase: &str, platform: &str, owner: &str) -> Result<()> {
        if !schema::is_known_owner(owner) {
            log::debug!("Owner {:?} is not in the picklist", owner);
        }
        self.cell_mut(id, phase, platform)?.owner = owner.to_string();
        self.persist()
    }

    // =========================================================================
    // Workspace operations
    // =========================================================================

    /// Adds a workspace seeded with the sample requirements and makes it active.
    /// A missing or blank name becomes `工作空间 N`.
    pub fn add_workspace(&mut self, name: Option<&str>) -> Result<String> {
        let default_name = numbered_workspace_name(self.state.workspaces.len() + 1);
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&default_name);
        let workspace = new_workspace(name, create_sample_requirements());
        let id = workspace.id.clone();
        self.state.workspaces.push(workspace);
        self.state.active_workspace_id = id.clone();
        self.persist()?;
        Ok(id)
    }

    pub fn rename_workspace(&mut self, name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(TrackerError::EmptyName);
        }
        self.active_workspace_mut()?.name = trimmed.to_string();
        self.persist()
    }

    /// Deletes the active workspace; the first remaining one becomes active
    pub fn delete_workspace(&mut self) -> Result<()> {
        if self.state.workspaces.len() <= 1 {
            return Err(TrackerError::LastWorkspace);
        }
        let id = self.active_workspace_mut()?.id.clone();
        self.state.workspaces.retain(|w| w.id != id);
        self.ensure_workspace_availability();
        self.persist()
    }

    pub fn set_active_workspace(&mut self, id: &str) -> Result<()> {
        if id == self.state.active_workspace_id {
            return Ok(());
        }
        if self.state.get_workspace(id).is_none() {
            return Err(TrackerError::WorkspaceNotFound(id.to_string()));
        }
        self.state.active_workspace_id = id.to_string();
        self.persist()
    }

    // =========================================================================
    // Import / export
    // =========================================================================

    /// Applies an already parsed import
    pub fn apply_import(&mut self, import: ImportResult) -> Result<()> {
        import.apply(&mut self.state);
        self.ensure_workspace_availability();
        self.persist()
    }

    /// Parses and applies an import payload; nothing changes if parsing fails
    pub fn import_payload(&mut self, text: &str) -> Result<()> {
        let import = transfer::import_workspace_payload(text)?;
        self.apply_import(import)
    }

    pub fn export_active_workspace(&self) -> Result<String> {
        Ok(transfer::export_workspace(self.active_workspace())?)
    }

    pub fn export_state(&self) -> Result<String> {
        Ok(transfer::export_state(&self.state)?)
    }
}
