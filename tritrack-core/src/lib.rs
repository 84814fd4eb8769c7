pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod normalize;
pub mod schema;
pub mod tracker;
pub mod transfer;

// Re-export commonly used types
pub use api::{ApiResponse, StateApi, MAX_BODY_BYTES, STATE_PATH};
pub use config::{get_config_path, resolve_config, TrackerConfig};
pub use db::{
    create_backend, BackendConfig, BackendType, FileBackend, KvBackend, RemoteBackend,
    StateBackend,
};
pub use models::{Requirement, State, StatusCell, Statuses, Workspace};
pub use normalize::{
    create_empty_requirement, create_initial_state, create_sample_requirements,
    create_workspace, generate_id, normalize_requirement, normalize_state,
    normalize_state_reporting,
};
pub use schema::{Phase, Platform, OWNER_OPTIONS, PHASES, PLATFORMS};
pub use tracker::{Tracker, TrackerError};
pub use transfer::{
    export_file_name, export_state, export_workspace, import_state, import_workspace_payload,
    ImportResult, TransferError,
};
