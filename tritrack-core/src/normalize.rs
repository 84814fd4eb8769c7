//! State normalization
//!
//! Turns whatever JSON was found in storage or in an import file into a
//! canonical [`State`]. Three document shapes are recognized (a bare list of
//! requirements, a `{workspaces: [...]}` document, or nothing usable) and
//! every status cell may be either a bare string or a `{value, owner}`
//! object. Normalization never fails: unusable input falls back to defaults.

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::models::{Requirement, State, StatusCell, Statuses, Workspace};
use crate::schema::{
    numbered_workspace_name, Phase, DEFAULT_WORKSPACE, PHASES, PLATFORMS, UNNAMED_WORKSPACE,
};

/// Names of the workspaces synthesized on a cold start
pub const SAMPLE_WORKSPACE_NAMES: [&str; 2] = ["A项目", "B项目"];

/// Generates a fresh opaque identifier
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// A status cell as it may appear in stored JSON
#[derive(Debug, PartialEq, Eq)]
enum RawCell<'a> {
    /// Legacy form: just the status value
    Bare(&'a str),
    /// Current form: `{value, owner}`, either field may be missing
    Object {
        value: Option<&'a str>,
        owner: Option<&'a str>,
    },
}

impl<'a> RawCell<'a> {
    fn parse(source: &'a Value) -> Option<Self> {
        match source {
            Value::String(s) if !s.is_empty() => Some(RawCell::Bare(s)),
            Value::Object(map) => Some(RawCell::Object {
                value: map
                    .get("value")
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty()),
                owner: map.get("owner").and_then(Value::as_str),
            }),
            _ => None,
        }
    }

    /// Overlays this cell onto a defaulted cell of `phase`
    fn apply(self, phase: &Phase, cell: &mut StatusCell) {
        let (value, owner) = match self {
            RawCell::Bare(value) => (Some(value), None),
            RawCell::Object { value, owner } => (value, owner),
        };
        if let Some(value) = value {
            if phase.allows(value) {
                cell.value = value.to_string();
            } else {
                log::debug!(
                    "Unknown {} status {:?}, using {:?}",
                    phase.key,
                    value,
                    phase.default_value()
                );
            }
        }
        if let Some(owner) = owner {
            cell.owner = owner.to_string();
        }
    }
}

/// Top-level shape of a state document
#[derive(Debug)]
enum StateShape<'a> {
    /// A bare list of requirements
    Requirements(&'a [Value]),
    /// A document carrying a `workspaces` list
    Workspaces(&'a [Value]),
    /// Anything else, including `null`
    Unrecognized,
}

impl<'a> StateShape<'a> {
    fn detect(raw: &'a Value) -> Self {
        if let Value::Array(items) = raw {
            return StateShape::Requirements(items);
        }
        match raw.get("workspaces") {
            Some(Value::Array(items)) => StateShape::Workspaces(items),
            _ => StateShape::Unrecognized,
        }
    }
}

/// Builds a status grid with every cell set to its phase's default
pub fn create_status_template() -> Statuses {
    PHASES
        .iter()
        .map(|phase| {
            let row: BTreeMap<String, StatusCell> = PLATFORMS
                .iter()
                .map(|platform| {
                    (
                        platform.key.to_string(),
                        StatusCell::new(phase.default_value()),
                    )
                })
                .collect();
            (phase.key.to_string(), row)
        })
        .collect()
}

/// Normalizes one requirement, filling every missing cell with defaults
pub fn normalize_requirement(raw: &Value) -> Requirement {
    let mut statuses = create_status_template();

    if let Some(source) = raw.get("statuses") {
        for phase in PHASES {
            let Some(phase_source) = source.get(phase.key) else {
                continue;
            };
            for platform in PLATFORMS {
                let Some(cell) = phase_source.get(platform.key).and_then(RawCell::parse) else {
                    continue;
                };
                if let Some(target) = statuses
                    .get_mut(phase.key)
                    .and_then(|row| row.get_mut(platform.key))
                {
                    cell.apply(phase, target);
                }
            }
        }
    }

    Requirement {
        id: non_empty_str(raw, "id")
            .map(str::to_string)
            .unwrap_or_else(generate_id),
        name: raw
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        statuses,
    }
}

/// Creates a requirement with a fresh ID and every cell defaulted
pub fn create_empty_requirement() -> Requirement {
    normalize_requirement(&Value::Null)
}

/// Creates a workspace from already-normalized requirements.
/// The name is trimmed; a blank name becomes the unnamed placeholder.
pub fn new_workspace(name: &str, requirements: Vec<Requirement>) -> Workspace {
    let trimmed = name.trim();
    Workspace {
        id: generate_id(),
        name: if trimmed.is_empty() {
            UNNAMED_WORKSPACE.to_string()
        } else {
            trimmed.to_string()
        },
        requirements,
    }
}

/// Creates a workspace from raw requirement values, normalizing each one.
/// Always mints a fresh workspace ID.
pub fn create_workspace(name: &str, requirements: &[Value]) -> Workspace {
    new_workspace(
        name,
        requirements.iter().map(normalize_requirement).collect(),
    )
}

/// Normalizes the `index`-th (1-based) entry of a `workspaces` list
fn normalize_workspace(raw: &Value, index: usize) -> Workspace {
    let name = non_empty_str(raw, "name")
        .map(str::to_string)
        .unwrap_or_else(|| numbered_workspace_name(index));
    let requirements = raw
        .get("requirements")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut workspace = create_workspace(&name, requirements);
    if let Some(id) = non_empty_str(raw, "id") {
        workspace.id = id.to_string();
    }
    workspace
}

/// Normalizes an arbitrary state document
pub fn normalize_state(raw: &Value) -> State {
    normalize_state_reporting(raw).0
}

/// Normalizes an arbitrary state document and reports whether any workspace
/// invariant had to be repaired: the initial state replaced an empty board,
/// a workspace id was minted or re-minted, or the active id was reassigned.
/// A repaired state differs from what is stored and should be written back.
pub fn normalize_state_reporting(raw: &Value) -> (State, bool) {
    let mut repaired = false;
    let mut workspaces = match StateShape::detect(raw) {
        StateShape::Requirements(items) => vec![create_workspace(DEFAULT_WORKSPACE, items)],
        StateShape::Workspaces(items) => {
            repaired |= items.iter().any(|item| non_empty_str(item, "id").is_none());
            items
                .iter()
                .enumerate()
                .map(|(i, item)| normalize_workspace(item, i + 1))
                .collect()
        }
        StateShape::Unrecognized => Vec::new(),
    };

    if workspaces.is_empty() {
        log::debug!("No workspaces in document, using initial state");
        return (create_initial_state(), true);
    }

    let mut seen = HashSet::new();
    for workspace in &mut workspaces {
        if !seen.insert(workspace.id.clone()) {
            let fresh = generate_id();
            log::debug!("Duplicate workspace id {}, reassigned to {}", workspace.id, fresh);
            workspace.id = fresh.clone();
            seen.insert(fresh);
            repaired = true;
        }
    }

    let active_workspace_id = match raw
        .get("activeWorkspaceId")
        .and_then(Value::as_str)
        .filter(|id| workspaces.iter().any(|w| w.id == *id))
    {
        Some(id) => id.to_string(),
        None => {
            repaired = true;
            workspaces[0].id.clone()
        }
    };

    let state = State {
        active_workspace_id,
        workspaces,
    };
    (state, repaired)
}

/// The two sample rows shown on a fresh board
pub fn create_sample_requirements() -> Vec<Requirement> {
    let untouched = json!({ "android": "未送测", "ios": "未送测", "harmony": "未送测" });
    let not_started = json!({ "android": "未发起", "ios": "未发起", "harmony": "未发起" });
    let samples = [
        json!({
            "name": "移动开户优化",
            "statuses": {
                "development": { "android": "开发中", "ios": "排队中", "harmony": "未开发" },
                "testing": untouched.clone(),
                "production": not_started.clone(),
            }
        }),
        json!({
            "name": "借记卡申请改版",
            "statuses": {
                "development": { "android": "排队中", "ios": "开发中", "harmony": "未开发" },
                "testing": untouched,
                "production": not_started,
            }
        }),
    ];
    samples.iter().map(normalize_requirement).collect()
}

/// Synthesizes the cold-start state: one sample workspace and one empty one
pub fn create_initial_state() -> State {
    let [first, second] = SAMPLE_WORKSPACE_NAMES;
    let workspaces = vec![
        new_workspace(first, create_sample_requirements()),
        new_workspace(second, Vec::new()),
    ];
    State {
        active_workspace_id: workspaces[0].id.clone(),
        workspaces,
    }
}

fn non_empty_str<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_dense(req: &Requirement) {
        for phase in PHASES {
            for platform in PLATFORMS {
                let cell = req
                    .cell(phase.key, platform.key)
                    .unwrap_or_else(|| panic!("missing {}/{}", phase.key, platform.key));
                assert!(phase.allows(&cell.value), "{:?} not in {}", cell.value, phase.key);
            }
        }
    }

    fn assert_state_invariants(state: &State) {
        assert!(!state.workspaces.is_empty());
        assert!(state.active_workspace().is_some());
        let ids: HashSet<_> = state.workspaces.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids.len(), state.workspaces.len());
    }

    #[test]
    fn test_empty_requirement_is_dense() {
        let req = create_empty_requirement();
        assert_dense(&req);
        assert_eq!(req.name, "");
        assert_eq!(req.cell("development", "android").unwrap().value, "未开发");
        assert_eq!(req.cell("testing", "ios").unwrap().value, "未送测");
        assert_eq!(req.cell("production", "harmony").unwrap().value, "未发起");
    }

    #[test]
    fn test_bare_string_cell_leaves_owner_empty() {
        let req = normalize_requirement(&json!({
            "statuses": { "development": { "android": "开发中" } }
        }));
        let cell = req.cell("development", "android").unwrap();
        assert_eq!(cell.value, "开发中");
        assert_eq!(cell.owner, "");
    }

    #[test]
    fn test_object_cell_overlays_value_and_owner() {
        let req = normalize_requirement(&json!({
            "statuses": { "development": { "android": { "value": "开发中", "owner": "张三" } } }
        }));
        let cell = req.cell("development", "android").unwrap();
        assert_eq!(cell.value, "开发中");
        assert_eq!(cell.owner, "张三");
    }

    #[test]
    fn test_object_cell_with_only_owner_keeps_default_value() {
        let req = normalize_requirement(&json!({
            "statuses": { "testing": { "ios": { "value": "", "owner": "" } } }
        }));
        let cell = req.cell("testing", "ios").unwrap();
        assert_eq!(cell.value, "未送测");
        assert_eq!(cell.owner, "");

        let req = normalize_requirement(&json!({
            "statuses": { "testing": { "ios": { "owner": "龙波" } } }
        }));
        assert_eq!(req.cell("testing", "ios").unwrap().owner, "龙波");
    }

    #[test]
    fn test_unknown_status_is_coerced_to_default() {
        let req = normalize_requirement(&json!({
            "statuses": {
                "development": { "android": "已投产", "ios": 42, "harmony": ["x"] },
                "testing": { "android": { "value": "bogus", "owner": "陈成" } }
            }
        }));
        assert_dense(&req);
        assert_eq!(req.cell("development", "android").unwrap().value, "未开发");
        assert_eq!(req.cell("development", "ios").unwrap().value, "未开发");
        let testing = req.cell("testing", "android").unwrap();
        assert_eq!(testing.value, "未送测");
        assert_eq!(testing.owner, "陈成");
    }

    #[test]
    fn test_unknown_phase_and_platform_are_dropped() {
        let req = normalize_requirement(&json!({
            "statuses": {
                "release": { "android": "开发中" },
                "development": { "web": "开发中" }
            }
        }));
        assert_dense(&req);
        assert!(req.statuses.get("release").is_none());
        assert!(req.cell("development", "web").is_none());
    }

    #[test]
    fn test_requirement_keeps_id_and_name() {
        let req = normalize_requirement(&json!({ "id": "req-1", "name": "登录改版" }));
        assert_eq!(req.id, "req-1");
        assert_eq!(req.name, "登录改版");

        let req = normalize_requirement(&json!({ "id": "", "name": 7 }));
        assert!(!req.id.is_empty());
        assert_eq!(req.name, "");
    }

    #[test]
    fn test_non_object_requirement_is_defaulted() {
        for raw in [Value::Null, json!("text"), json!(3), json!([1, 2])] {
            assert_dense(&normalize_requirement(&raw));
        }
    }

    #[test]
    fn test_create_workspace_trims_and_defaults_name() {
        assert_eq!(create_workspace("  项目X  ", &[]).name, "项目X");
        assert_eq!(create_workspace("   ", &[]).name, UNNAMED_WORKSPACE);
        assert_ne!(create_workspace("a", &[]).id, create_workspace("a", &[]).id);
    }

    #[test]
    fn test_degenerate_inputs_yield_initial_state() {
        for raw in [
            Value::Null,
            json!({}),
            json!({ "workspaces": [] }),
            json!({ "workspaces": "nope" }),
            json!(42),
        ] {
            let state = normalize_state(&raw);
            assert_state_invariants(&state);
            assert_eq!(state.workspaces.len(), 2, "input {}", raw);
            assert_eq!(state.workspaces[0].name, "A项目");
            assert_eq!(state.workspaces[0].requirements.len(), 2);
            assert_eq!(state.workspaces[1].name, "B项目");
            assert!(state.workspaces[1].requirements.is_empty());
        }
    }

    #[test]
    fn test_bare_array_becomes_default_workspace() {
        let state = normalize_state(&json!([]));
        assert_state_invariants(&state);
        assert_eq!(state.workspaces.len(), 1);
        assert_eq!(state.workspaces[0].name, DEFAULT_WORKSPACE);
        assert!(state.workspaces[0].requirements.is_empty());

        let state = normalize_state(&json!([{ "name": "A" }, { "name": "B" }]));
        let names: Vec<_> = state.workspaces[0]
            .requirements
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(state.active_workspace_id, state.workspaces[0].id);
    }

    #[test]
    fn test_workspaces_document_keeps_ids_and_positions() {
        let state = normalize_state(&json!({
            "activeWorkspaceId": "ws-2",
            "workspaces": [
                { "id": "ws-1", "name": "一", "requirements": [{ "id": "r1" }] },
                { "id": "ws-2", "requirements": "not a list" },
                null,
                { "name": "   " }
            ]
        }));
        assert_state_invariants(&state);
        assert_eq!(state.active_workspace_id, "ws-2");
        assert_eq!(state.workspaces[0].id, "ws-1");
        assert_eq!(state.workspaces[0].requirements[0].id, "r1");
        assert_eq!(state.workspaces[1].name, "工作空间 2");
        assert!(state.workspaces[1].requirements.is_empty());
        assert_eq!(state.workspaces[2].name, "工作空间 3");
        assert_eq!(state.workspaces[3].name, UNNAMED_WORKSPACE);
    }

    #[test]
    fn test_dangling_active_workspace_is_repaired() {
        let state = normalize_state(&json!({
            "activeWorkspaceId": "missing",
            "workspaces": [{ "id": "ws-1" }, { "id": "ws-2" }]
        }));
        assert_eq!(state.active_workspace_id, "ws-1");

        let state = normalize_state(&json!({
            "activeWorkspaceId": 5,
            "workspaces": [{ "id": "ws-1" }]
        }));
        assert_eq!(state.active_workspace_id, "ws-1");
    }

    #[test]
    fn test_duplicate_workspace_ids_are_reassigned() {
        let state = normalize_state(&json!({
            "activeWorkspaceId": "dup",
            "workspaces": [{ "id": "dup", "name": "first" }, { "id": "dup", "name": "second" }]
        }));
        assert_state_invariants(&state);
        assert_eq!(state.workspaces[0].id, "dup");
        assert_ne!(state.workspaces[1].id, "dup");
        assert_eq!(state.active_workspace().unwrap().name, "first");
    }

    #[test]
    fn test_workspaces_without_ids_are_not_stable() {
        let raw = json!({ "workspaces": [{ "name": "无ID" }] });
        let first = normalize_state(&raw);
        let second = normalize_state(&raw);
        assert_ne!(first.workspaces[0].id, second.workspaces[0].id);
    }

    #[test]
    fn test_repairs_are_reported() {
        let repaired = |raw: Value| normalize_state_reporting(&raw).1;

        assert!(repaired(Value::Null));
        assert!(repaired(json!({ "workspaces": [] })));
        assert!(repaired(json!([{ "name": "A" }])));
        assert!(repaired(json!({
            "activeWorkspaceId": "gone",
            "workspaces": [{ "id": "w1" }]
        })));
        assert!(repaired(json!({
            "activeWorkspaceId": "w1",
            "workspaces": [{ "id": "w1" }, { "id": "w1" }]
        })));
        assert!(repaired(json!({
            "activeWorkspaceId": "w1",
            "workspaces": [{ "id": "w1" }, { "name": "无ID" }]
        })));

        // Coerced cell values are not workspace repairs
        assert!(!repaired(json!({
            "activeWorkspaceId": "w2",
            "workspaces": [
                { "id": "w1", "requirements": [{ "statuses": { "testing": { "ios": "bogus" } } }] },
                { "id": "w2" }
            ]
        })));
    }

    #[test]
    fn test_canonical_state_needs_no_repair() {
        let state = create_initial_state();
        let raw = serde_json::to_value(&state).unwrap();
        assert_eq!(normalize_state_reporting(&raw), (state, false));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mut state = create_initial_state();
        state.workspaces[1]
            .requirements
            .push(normalize_requirement(&json!({
                "name": "多行\n名称",
                "statuses": { "production": { "ios": { "value": "已投产", "owner": "黄华宏" } } }
            })));
        state.active_workspace_id = state.workspaces[1].id.clone();

        let text = serde_json::to_string_pretty(&state).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(normalize_state(&reparsed), state);
    }

    #[test]
    fn test_initial_state_samples() {
        let state = create_initial_state();
        assert_state_invariants(&state);
        assert_eq!(state.active_workspace_id, state.workspaces[0].id);
        let samples = &state.workspaces[0].requirements;
        assert_eq!(samples[0].name, "移动开户优化");
        assert_eq!(samples[0].cell("development", "android").unwrap().value, "开发中");
        assert_eq!(samples[0].cell("development", "ios").unwrap().value, "排队中");
        assert_eq!(samples[1].name, "借记卡申请改版");
        assert_eq!(samples[1].cell("development", "ios").unwrap().value, "开发中");
        for req in samples {
            assert_dense(req);
        }
    }

    #[test]
    fn test_raw_cell_parse() {
        assert_eq!(RawCell::parse(&json!("开发中")), Some(RawCell::Bare("开发中")));
        assert_eq!(RawCell::parse(&json!("")), None);
        assert_eq!(RawCell::parse(&Value::Null), None);
        assert_eq!(
            RawCell::parse(&json!({ "value": "x", "owner": 1 })),
            Some(RawCell::Object {
                value: Some("x"),
                owner: None
            })
        );
    }
}
