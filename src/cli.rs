//! Command-line interface definition for Inkforge
//!
//! This module defines the CLI structure using clap's derive API. The CLI
//! stands in for the desktop front end: every lifecycle action of the
//! studio (create, select, generate, delete, analyze) is a subcommand.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inkforge - conversational tattoo design generator
///
/// Iterate on a design over several requests; each generation builds on
/// the earlier requests of the same session.
#[derive(Parser, Debug, Clone)]
#[command(name = "inkforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the session database location
    #[arg(long, env = "INKFORGE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Override the generated image directory
    #[arg(long, env = "INKFORGE_IMAGES_DIR")]
    pub images_dir: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Inkforge
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage design sessions
    Sessions {
        /// Session subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Generate a design from a request
    Generate {
        /// Design request, e.g. "a dragon coiled around a sword"
        prompt: String,

        /// Session to continue; a new one is created when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// Image size (1024x1024, 1024x1792, 1792x1024)
        #[arg(long)]
        size: Option<String>,

        /// Image quality (standard, hd)
        #[arg(short, long)]
        quality: Option<String>,
    },

    /// Ask the vision model for a critique of a generated image
    Analyze {
        /// Session that owns the image
        session: String,

        /// Image identifier
        image: String,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy a generated image to another location
    Export {
        /// Image identifier
        image: String,

        /// Destination file, or an existing directory to copy into
        dest: PathBuf,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List sessions, most recently updated first
    List,

    /// Create an empty session
    New {
        /// Display name
        name: String,
    },

    /// Show a session's messages and images
    Show {
        /// Session identifier
        id: String,

        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a session with its messages and images
    Delete {
        /// Session identifier
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            db_path: None,
            images_dir: None,
            command: Commands::Sessions {
                command: SessionCommand::List,
            },
        }
    }
}
