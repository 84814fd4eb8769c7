use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Track requirements across platforms and delivery phases")]
pub struct Cli {
    /// Path to the config file (defaults to TRITRACK_CONFIG or the user config dir)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend type to use (file, kv, remote)
    #[clap(long, global = true)]
    pub backend: Option<String>,

    /// File path, database path or document URL of the backend
    #[clap(long, global = true)]
    pub location: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// Add a workspace seeded with sample requirements and switch to it
    Add {
        /// Name of the workspace
        #[clap(long)]
        name: Option<String>,
    },

    /// Rename the active workspace
    Rename {
        /// New name
        name: String,
    },

    /// Delete the active workspace
    Del {
        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Make another workspace active
    Switch {
        /// Workspace ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default config file if none exists
    Init,

    /// Print the path to the config file
    Path,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[clap(flatten)]
    Board(BoardCommand),

    /// Send a request to the /api/state handler and print the response
    Api {
        /// HTTP method
        method: String,

        /// File to send as the request body
        #[clap(long)]
        body: Option<PathBuf>,
    },

    /// Manage the config file
    #[clap(subcommand)]
    Config(ConfigCommand),
}

/// Commands that open the board and edit it through the tracker
#[derive(Subcommand, Debug)]
pub enum BoardCommand {
    /// Show the status grid of the active workspace
    Show,

    /// List all workspaces
    Workspaces,

    /// Add a requirement to the active workspace
    Add {
        /// Name of the requirement
        #[clap(long)]
        name: Option<String>,
    },

    /// Delete a requirement
    Del {
        /// Requirement ID
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Rename a requirement
    Rename {
        /// Requirement ID
        id: String,

        /// New name
        name: String,
    },

    /// Set the status of one cell
    Status {
        /// Requirement ID
        id: String,

        /// Phase key (development, testing, production)
        phase: String,

        /// Platform key (android, ios, harmony)
        platform: String,

        /// New status; prompts with the phase options when omitted
        value: Option<String>,
    },

    /// Set the owner of one cell
    Owner {
        /// Requirement ID
        id: String,

        /// Phase key (development, testing, production)
        phase: String,

        /// Platform key (android, ios, harmony)
        platform: String,

        /// Owner name; prompts with the known owners when omitted
        owner: Option<String>,
    },

    /// Manage workspaces
    #[clap(subcommand)]
    Workspace(WorkspaceCommand),

    /// Export the active workspace (or everything) as JSON
    Export {
        /// Export the whole state instead of the active workspace
        #[clap(long)]
        all: bool,

        /// Output path (defaults to a timestamped file name)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Import a JSON snapshot into the board
    Import {
        /// Path to the JSON file
        path: PathBuf,
    },
}
