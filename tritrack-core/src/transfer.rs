//! Import and export of JSON snapshots
//!
//! Exports are pretty-printed JSON, either a single workspace
//! (`{name, requirements}`) or the whole state. Imports accept three shapes,
//! checked from most to least specific: a full state document with a
//! `workspaces` list, a bare list of requirements, or an object carrying a
//! `requirements` list.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Requirement, State, Workspace};
use crate::normalize::{create_workspace, normalize_state};
use crate::schema::{IMPORTED_WORKSPACE, UNNAMED_WORKSPACE, WORKSPACE_FILE_STEM};

/// Errors that can occur while importing or exporting
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Cannot export: workspace not found")]
    WorkspaceNotFound,

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid data format: missing `requirements` field")]
    MissingRequirements,
}

/// Outcome of parsing an import payload
#[derive(Debug, Clone, PartialEq)]
pub enum ImportResult {
    /// A full state document; replaces the whole board
    State(State),
    /// A single workspace; replaces the active workspace's contents
    Workspace(Workspace),
}

impl ImportResult {
    /// Applies the import to `state`.
    ///
    /// A full state replaces everything. A single workspace overwrites the
    /// active workspace's name (unless the import's name is blank) and
    /// requirements, keeping its ID and leaving other workspaces untouched.
    pub fn apply(self, state: &mut State) {
        match self {
            ImportResult::State(imported) => *state = imported,
            ImportResult::Workspace(imported) => {
                state.repair_active_workspace();
                if let Some(active) = state.active_workspace_mut() {
                    if !imported.name.is_empty() {
                        active.name = imported.name;
                    }
                    active.requirements = imported.requirements;
                }
            }
        }
    }
}

/// Top-level shape of an import payload
enum PayloadShape<'a> {
    State,
    Requirements(&'a [Value]),
    Workspace {
        name: Option<&'a str>,
        requirements: &'a [Value],
    },
}

impl<'a> PayloadShape<'a> {
    fn detect(parsed: &'a Value) -> Option<Self> {
        if matches!(parsed.get("workspaces"), Some(Value::Array(_))) {
            return Some(PayloadShape::State);
        }
        if let Value::Array(items) = parsed {
            return Some(PayloadShape::Requirements(items));
        }
        match parsed.get("requirements") {
            Some(Value::Array(items)) => Some(PayloadShape::Workspace {
                name: parsed
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|n| !n.is_empty()),
                requirements: items,
            }),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct WorkspacePayload<'a> {
    name: &'a str,
    requirements: &'a [Requirement],
}

/// Serializes one workspace as `{name, requirements}`
pub fn export_workspace(workspace: Option<&Workspace>) -> Result<String, TransferError> {
    let workspace = workspace.ok_or(TransferError::WorkspaceNotFound)?;
    let name = if workspace.name.is_empty() {
        UNNAMED_WORKSPACE
    } else {
        workspace.name.as_str()
    };
    let payload = WorkspacePayload {
        name,
        requirements: &workspace.requirements,
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

/// Serializes the whole state verbatim
pub fn export_state(state: &State) -> Result<String, TransferError> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Parses a full state document
pub fn import_state(text: &str) -> Result<State, TransferError> {
    let parsed: Value = serde_json::from_str(text)?;
    Ok(normalize_state(&parsed))
}

/// Parses an import payload and classifies it by shape
pub fn import_workspace_payload(text: &str) -> Result<ImportResult, TransferError> {
    let parsed: Value = serde_json::from_str(text)?;
    match PayloadShape::detect(&parsed).ok_or(TransferError::MissingRequirements)? {
        PayloadShape::State => Ok(ImportResult::State(normalize_state(&parsed))),
        PayloadShape::Requirements(items) => Ok(ImportResult::Workspace(create_workspace(
            IMPORTED_WORKSPACE,
            items,
        ))),
        PayloadShape::Workspace { name, requirements } => Ok(ImportResult::Workspace(
            create_workspace(name.unwrap_or(IMPORTED_WORKSPACE), requirements),
        )),
    }
}

/// File name for an export: the workspace name without whitespace, then the
/// timestamp with `:` and `.` replaced so it is safe on every filesystem
pub fn export_file_name(workspace_name: &str, timestamp: DateTime<Utc>) -> String {
    let safe_name: String = workspace_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let safe_name = if safe_name.is_empty() {
        WORKSPACE_FILE_STEM.to_string()
    } else {
        safe_name
    };
    let stamp = timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(|c: char| c == ':' || c == '.', "-");
    format!("{}-{}.json", safe_name, stamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{create_initial_state, normalize_requirement};
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_bare_array_import() {
        let result = import_workspace_payload(r#"[{"name":"A"}]"#).unwrap();
        let ImportResult::Workspace(workspace) = result else {
            panic!("expected a workspace import");
        };
        assert_eq!(workspace.name, IMPORTED_WORKSPACE);
        assert_eq!(workspace.requirements.len(), 1);
        assert_eq!(workspace.requirements[0].name, "A");
        assert_eq!(
            workspace.requirements[0].cell("development", "harmony").unwrap().value,
            "未开发"
        );
    }

    #[test]
    fn test_state_import() {
        let text = r#"{"activeWorkspaceId":"w2","workspaces":[{"id":"w1"},{"id":"w2","name":"二"}]}"#;
        let ImportResult::State(state) = import_workspace_payload(text).unwrap() else {
            panic!("expected a state import");
        };
        assert_eq!(state.active_workspace_id, "w2");
        assert_eq!(state.workspaces[1].name, "二");
    }

    #[test]
    fn test_workspace_object_import() {
        let text = r#"{"name":"外部项目","requirements":[{"name":"X"},{"name":"Y"}]}"#;
        let ImportResult::Workspace(workspace) = import_workspace_payload(text).unwrap() else {
            panic!("expected a workspace import");
        };
        assert_eq!(workspace.name, "外部项目");
        assert_eq!(workspace.requirements.len(), 2);

        let ImportResult::Workspace(unnamed) =
            import_workspace_payload(r#"{"name":"","requirements":[]}"#).unwrap()
        else {
            panic!("expected a workspace import");
        };
        assert_eq!(unnamed.name, IMPORTED_WORKSPACE);
    }

    #[test]
    fn test_workspaces_take_priority_over_requirements() {
        let text = r#"{"workspaces":[{"id":"w"}],"requirements":[{"name":"ignored"}]}"#;
        assert!(matches!(
            import_workspace_payload(text).unwrap(),
            ImportResult::State(_)
        ));
    }

    #[test]
    fn test_unrecognized_payload_names_missing_field() {
        for text in [r#"{"foo":1}"#, r#"{"requirements":"x"}"#, "null", "3"] {
            let err = import_workspace_payload(text).unwrap_err();
            assert!(matches!(err, TransferError::MissingRequirements), "{}", text);
            assert!(err.to_string().contains("requirements"));
        }
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            import_workspace_payload("{oops"),
            Err(TransferError::InvalidJson(_))
        ));
        assert!(import_state("").is_err());
    }

    #[test]
    fn test_export_missing_workspace() {
        assert!(matches!(
            export_workspace(None),
            Err(TransferError::WorkspaceNotFound)
        ));
    }

    #[test]
    fn test_export_workspace_shape() {
        let state = create_initial_state();
        let text = export_workspace(state.active_workspace()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["name"], "A项目");
        assert_eq!(value["requirements"].as_array().unwrap().len(), 2);
        assert!(value.get("id").is_none());
        assert!(text.contains('\n'));
    }

    #[test]
    fn test_workspace_round_trip() {
        let mut state = create_initial_state();
        state.workspaces[0].requirements.push(normalize_requirement(&json!({
            "id": "custom",
            "name": "带负责人",
            "statuses": { "testing": { "android": { "value": "已出报告", "owner": "黄志豪" } } }
        })));
        let workspace = &state.workspaces[0];

        let text = export_workspace(Some(workspace)).unwrap();
        let ImportResult::Workspace(imported) = import_workspace_payload(&text).unwrap() else {
            panic!("expected a workspace import");
        };
        assert_eq!(imported.requirements, workspace.requirements);
        assert_eq!(imported.name, workspace.name);
    }

    #[test]
    fn test_state_round_trip() {
        let state = create_initial_state();
        let text = export_state(&state).unwrap();
        assert_eq!(import_state(&text).unwrap(), state);
    }

    #[test]
    fn test_apply_workspace_import_keeps_identity() {
        let mut state = create_initial_state();
        let active_id = state.active_workspace_id.clone();
        let other = state.workspaces[1].clone();

        let import = import_workspace_payload(r#"{"name":"新名称","requirements":[{"name":"唯一"}]}"#)
            .unwrap();
        import.apply(&mut state);

        let active = state.active_workspace().unwrap();
        assert_eq!(active.id, active_id);
        assert_eq!(active.name, "新名称");
        assert_eq!(active.requirements.len(), 1);
        assert_eq!(state.workspaces[1], other);
    }

    #[test]
    fn test_apply_state_import_replaces_everything() {
        let mut state = create_initial_state();
        let import = import_workspace_payload(r#"{"workspaces":[{"id":"only","name":"唯一"}]}"#)
            .unwrap();
        import.apply(&mut state);
        assert_eq!(state.workspaces.len(), 1);
        assert_eq!(state.active_workspace_id, "only");
    }

    #[test]
    fn test_export_file_name() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(
            export_file_name("A 项目 一", ts),
            "A项目一-2024-05-06T07-08-09-000Z.json"
        );
        assert_eq!(export_file_name("  ", ts), "工作空间-2024-05-06T07-08-09-000Z.json");
    }
}
