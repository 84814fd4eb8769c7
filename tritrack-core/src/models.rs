use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status grid of a requirement: phase key -> platform key -> cell
pub type Statuses = BTreeMap<String, BTreeMap<String, StatusCell>>;

/// A single (phase, platform) cell of the board
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCell {
    /// Status value, one of the owning phase's options
    pub value: String,
    /// Person following up on this cell (free text)
    pub owner: String,
}

impl StatusCell {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            owner: String::new(),
        }
    }
}

/// Represents a single row of the board
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requirement {
    /// Opaque identifier, assigned once and never reassigned
    pub id: String,

    /// Display name, may span several lines
    pub name: String,

    /// Dense status grid covering every phase and platform
    pub statuses: Statuses,
}

impl Requirement {
    /// Gets a cell of the status grid
    pub fn cell(&self, phase: &str, platform: &str) -> Option<&StatusCell> {
        self.statuses.get(phase).and_then(|p| p.get(platform))
    }

    /// Gets a mutable cell of the status grid
    pub fn cell_mut(&mut self, phase: &str, platform: &str) -> Option<&mut StatusCell> {
        self.statuses.get_mut(phase).and_then(|p| p.get_mut(platform))
    }
}

/// A named, ordered collection of requirements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    /// Display order is significant
    pub requirements: Vec<Requirement>,
}

impl Workspace {
    /// Gets a requirement by ID
    pub fn get_requirement(&self, id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == id)
    }

    /// Gets a mutable reference to a requirement by ID
    pub fn get_requirement_mut(&mut self, id: &str) -> Option<&mut Requirement> {
        self.requirements.iter_mut().find(|r| r.id == id)
    }
}

/// The whole board: every workspace plus the one currently shown
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub active_workspace_id: String,
    pub workspaces: Vec<Workspace>,
}

impl State {
    /// Gets a workspace by ID
    pub fn get_workspace(&self, id: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|w| w.id == id)
    }

    /// Gets the active workspace
    pub fn active_workspace(&self) -> Option<&Workspace> {
        self.get_workspace(&self.active_workspace_id)
    }

    /// Gets the active workspace mutably
    pub fn active_workspace_mut(&mut self) -> Option<&mut Workspace> {
        let id = self.active_workspace_id.clone();
        self.workspaces.iter_mut().find(|w| w.id == id)
    }

    /// Repairs the active workspace pointer if it dangles.
    /// Returns true if anything changed. An empty workspace list is left
    /// to the caller, since refilling it needs the normalizer.
    pub fn repair_active_workspace(&mut self) -> bool {
        if self.active_workspace().is_some() {
            return false;
        }
        match self.workspaces.first() {
            Some(first) => {
                self.active_workspace_id = first.id.clone();
                true
            }
            None => false,
        }
    }
}
