//! Command-line interface definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "deskpilot",
    about = "Local agent that drives a desktop editor from remote session commands",
    version
)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the decision server and execute its commands
    Run {
        /// Override the server URL from the config file
        #[arg(long)]
        server_url: Option<String>,
    },

    /// Print one local status snapshot as JSON
    Status,

    /// Parse and execute a single command without a server
    Exec {
        /// The command as JSON, canonical or legacy shape
        #[arg(long)]
        json: String,
    },
}
