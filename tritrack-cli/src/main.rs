mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use std::fs;
use std::path::{Path, PathBuf};

use tritrack_core::schema::{Phase, NOT_NEEDED};
use tritrack_core::{
    create_backend, export_file_name, get_config_path, resolve_config, StateApi, StateBackend,
    Tracker, TrackerConfig, Workspace, PHASES, PLATFORMS,
};

use crate::cli::{BoardCommand, Cli, Command, ConfigCommand, WorkspaceCommand};

type BoardTracker = Tracker<Box<dyn StateBackend>>;

/// Base name of a full-state export
const STATE_EXPORT_STEM: &str = "tritrack";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match &cli.command {
        // Config management works without a backend
        Command::Config(config_cmd) => handle_config_command(config_cmd, cli.config.as_deref()),
        Command::Api { method, body } => {
            handle_api_command(open_backend(&cli)?, method, body.as_deref())
        }
        Command::Board(board_cmd) => {
            let mut tracker = Tracker::open(open_backend(&cli)?);
            handle_board_command(board_cmd, &mut tracker)
        }
    }
}

/// Resolves the config (file, environment, then flags) and opens its backend
fn open_backend(cli: &Cli) -> Result<Box<dyn StateBackend>> {
    let mut config = resolve_config(cli.config.as_deref())?;
    config.apply_overrides(cli.backend.as_deref(), cli.location.as_deref())?;
    let backend = create_backend(&config.backend)?;
    log::info!("Opened {} backend at {}", backend.backend_type(), backend.location());
    Ok(backend)
}

fn handle_board_command(cmd: &BoardCommand, tracker: &mut BoardTracker) -> Result<()> {
    match cmd {
        BoardCommand::Show => {
            show_active_workspace(tracker)?;
        }
        BoardCommand::Workspaces => {
            list_workspaces(tracker);
        }
        BoardCommand::Add { name } => {
            let id = tracker.add_requirement()?;
            if let Some(name) = name {
                tracker.rename_requirement(&id, name)?;
            }
            println!("{} {}", "Requirement added:".green(), id);
        }
        BoardCommand::Del { id, yes } => {
            delete_requirement(tracker, id, *yes)?;
        }
        BoardCommand::Rename { id, name } => {
            tracker.rename_requirement(id, name)?;
            println!("{}", "Requirement renamed.".green());
        }
        BoardCommand::Status {
            id,
            phase,
            platform,
            value,
        } => {
            let value = match value {
                Some(v) => v.clone(),
                None => {
                    let current = current_cell(tracker, id, phase, platform).map(|c| c.0);
                    prompts::prompt_status(phase, current.as_deref())?
                }
            };
            tracker.set_status(id, phase, platform, &value)?;
            println!("{} {} / {} = {}", "Status updated:".green(), phase, platform, value);
        }
        BoardCommand::Owner {
            id,
            phase,
            platform,
            owner,
        } => {
            let owner = match owner {
                Some(o) => o.clone(),
                None => {
                    let current = current_cell(tracker, id, phase, platform).map(|c| c.1);
                    prompts::prompt_owner(current.as_deref())?
                }
            };
            tracker.set_owner(id, phase, platform, &owner)?;
            println!("{}", "Owner updated.".green());
        }
        BoardCommand::Workspace(workspace_cmd) => {
            handle_workspace_command(workspace_cmd, tracker)?;
        }
        BoardCommand::Export { all, output } => {
            handle_export_command(tracker, *all, output.as_deref())?;
        }
        BoardCommand::Import { path } => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read import file: {:?}", path))?;
            tracker.import_payload(&text)?;
            log::info!("Imported {:?} into {}", path, tracker.backend().location());
            println!("{} {:?}", "Imported".green(), path);
            show_active_workspace(tracker)?;
        }
    }

    Ok(())
}

/// Current (value, owner) of a cell, if the requirement exists
fn current_cell(
    tracker: &BoardTracker,
    id: &str,
    phase: &str,
    platform: &str,
) -> Option<(String, String)> {
    tracker
        .active_workspace()?
        .get_requirement(id)?
        .cell(phase, platform)
        .map(|c| (c.value.clone(), c.owner.clone()))
}

fn status_color(phase: &Phase, value: &str) -> ColoredString {
    let done = phase
        .options
        .iter()
        .rev()
        .find(|o| **o != NOT_NEEDED)
        .copied();

    if value == NOT_NEEDED {
        value.dimmed()
    } else if value == phase.default_value() {
        value.red()
    } else if Some(value) == done {
        value.green()
    } else {
        value.yellow()
    }
}

fn print_workspace(workspace: &Workspace) {
    println!(
        "{} {} ({} requirements)",
        workspace.name.bold(),
        format!("[{}]", workspace.id).dimmed(),
        workspace.requirements.len()
    );

    if workspace.requirements.is_empty() {
        println!("  {}", "No requirements yet.".dimmed());
        return;
    }

    for req in &workspace.requirements {
        println!();
        let name = if req.name.is_empty() {
            "(unnamed)".italic()
        } else {
            req.name.cyan()
        };
        println!("  {} {}", name, req.id.dimmed());

        for phase in PHASES {
            let cells: Vec<String> = PLATFORMS
                .iter()
                .map(|platform| match req.cell(phase.key, platform.key) {
                    Some(cell) if cell.owner.is_empty() => {
                        format!("{} {}", platform.label, status_color(phase, &cell.value))
                    }
                    Some(cell) => format!(
                        "{} {} ({})",
                        platform.label,
                        status_color(phase, &cell.value),
                        cell.owner
                    ),
                    None => format!("{} {}", platform.label, "-".dimmed()),
                })
                .collect();
            println!("    {}  {}", phase.label, cells.join("  "));
        }
    }
}

fn show_active_workspace(tracker: &BoardTracker) -> Result<()> {
    let workspace = tracker
        .active_workspace()
        .context("No active workspace")?;
    print_workspace(workspace);
    Ok(())
}

fn list_workspaces(tracker: &BoardTracker) {
    let active_id = &tracker.state().active_workspace_id;
    for workspace in tracker.workspaces() {
        let marker = if &workspace.id == active_id { "*" } else { " " };
        let line = format!(
            "{} {}  {}  ({} requirements)",
            marker,
            workspace.id,
            workspace.name,
            workspace.requirements.len()
        );
        if &workspace.id == active_id {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
}

fn delete_requirement(tracker: &mut BoardTracker, id: &str, skip_confirm: bool) -> Result<()> {
    let req = tracker
        .active_workspace()
        .and_then(|w| w.get_requirement(id))
        .with_context(|| format!("Requirement not found: {}", id))?;

    println!("{}", "Requirement to delete:".yellow());
    println!("  ID: {}", req.id);
    println!("  Name: {}", req.name);

    if !skip_confirm && !prompts::confirm("Are you sure you want to delete this requirement?")? {
        println!("{}", "Deletion cancelled.".yellow());
        return Ok(());
    }

    tracker.delete_requirement(id)?;
    println!("{}", "Requirement deleted successfully!".green());
    Ok(())
}

fn handle_workspace_command(cmd: &WorkspaceCommand, tracker: &mut BoardTracker) -> Result<()> {
    match cmd {
        WorkspaceCommand::Add { name } => {
            let id = tracker.add_workspace(name.as_deref())?;
            println!("{} {}", "Workspace added and activated:".green(), id);
        }
        WorkspaceCommand::Rename { name } => {
            tracker.rename_workspace(name)?;
            println!("{}", "Workspace renamed.".green());
        }
        WorkspaceCommand::Del { yes } => {
            let workspace = tracker
                .active_workspace()
                .context("No active workspace")?;
            println!(
                "{} {} ({} requirements)",
                "Workspace to delete:".yellow(),
                workspace.name,
                workspace.requirements.len()
            );

            if !*yes && !prompts::confirm("Delete the active workspace?")? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }

            tracker.delete_workspace()?;
            println!("{}", "Workspace deleted.".green());
        }
        WorkspaceCommand::Switch { id } => {
            tracker.set_active_workspace(id)?;
            show_active_workspace(tracker)?;
        }
    }
    Ok(())
}

fn handle_export_command(tracker: &BoardTracker, all: bool, output: Option<&Path>) -> Result<()> {
    let (content, stem) = if all {
        (tracker.export_state()?, STATE_EXPORT_STEM.to_string())
    } else {
        let name = tracker
            .active_workspace()
            .map(|w| w.name.clone())
            .unwrap_or_default();
        (tracker.export_active_workspace()?, name)
    };

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(export_file_name(&stem, chrono::Utc::now())));

    fs::write(&output_path, content)
        .with_context(|| format!("Failed to write export to {:?}", output_path))?;
    log::info!("Wrote {} export to {:?}", if all { "state" } else { "workspace" }, output_path);
    println!("{} {:?}", "Exported to".green(), output_path);
    Ok(())
}

fn handle_api_command(
    backend: Box<dyn StateBackend>,
    method: &str,
    body: Option<&Path>,
) -> Result<()> {
    let body = match body {
        Some(path) => fs::read(path).with_context(|| format!("Failed to read body: {:?}", path))?,
        None => Vec::new(),
    };

    let api = StateApi::new(backend);
    let response = api.handle(method, &body);

    let status = response.status.to_string();
    if response.status < 400 {
        println!("{}", status.green());
    } else {
        println!("{}", status.red());
    }
    for (name, value) in &response.headers {
        println!("{}: {}", name.dimmed(), value);
    }
    println!("{}", response.body_pretty());
    Ok(())
}

fn handle_config_command(cmd: &ConfigCommand, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => get_config_path()?,
    };

    match cmd {
        ConfigCommand::Init => {
            if path.exists() {
                println!("{} {:?}", "Config already exists at".yellow(), path);
            } else {
                TrackerConfig::create_default(&path)?;
                println!("{} {:?}", "Created config at".green(), path);
            }
        }
        ConfigCommand::Path => {
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tritrack_core::BackendType;

    #[test]
    fn test_open_backend_flags_override_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut config = TrackerConfig::default();
        config.backend.location = dir.path().join("from-config.json").display().to_string();
        config.save(&config_path).unwrap();

        let location = dir.path().join("board.sqlite");
        let cli = Cli::parse_from([
            "tritrack",
            "--config",
            config_path.to_str().unwrap(),
            "--backend",
            "kv",
            "--location",
            location.to_str().unwrap(),
            "show",
        ]);

        let backend = open_backend(&cli).unwrap();
        assert_eq!(backend.backend_type(), BackendType::Kv);
        assert!(backend.location().starts_with(location.to_str().unwrap()));
    }

    #[test]
    fn test_board_command_persists_through_backend() {
        let dir = TempDir::new().unwrap();
        let location = dir.path().join("state.json");
        let cli = Cli::parse_from([
            "tritrack",
            "--config",
            dir.path().join("absent.yaml").to_str().unwrap(),
            "--backend",
            "file",
            "--location",
            location.to_str().unwrap(),
            "workspace",
            "rename",
            "新项目",
        ]);
        let Command::Board(cmd) = &cli.command else {
            panic!("expected a board command");
        };

        let mut tracker = Tracker::open(open_backend(&cli).unwrap());
        handle_board_command(cmd, &mut tracker).unwrap();

        let reopened = Tracker::open(open_backend(&cli).unwrap());
        assert_eq!(reopened.active_workspace().unwrap().name, "新项目");
    }
}
