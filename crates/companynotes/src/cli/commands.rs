//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::builder::NonEmptyStringValueParser;
use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Companies command arguments.
#[derive(Debug, Args)]
pub struct CompaniesCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Note commands.
#[derive(Debug, Subcommand)]
pub enum NotesCommand {
    /// List the notes on a company visible to a user
    List {
        /// Company id
        #[arg(long, value_name = "ID")]
        company: i64,

        /// Act as this user (anonymous when omitted)
        #[arg(long = "as", value_name = "USER")]
        as_user: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Create a note
    Create {
        /// Company id
        #[arg(long, value_name = "ID")]
        company: i64,

        /// Note text
        #[arg(long, value_name = "TEXT", value_parser = NonEmptyStringValueParser::new())]
        content: String,

        /// Hide the note from other users
        #[arg(long)]
        private: bool,

        /// Owner of the new note
        #[arg(long = "as", value_name = "USER")]
        as_user: String,
    },

    /// Update a note you own
    Update {
        /// Note id
        id: String,

        /// New note text
        #[arg(long, value_name = "TEXT", value_parser = NonEmptyStringValueParser::new())]
        content: Option<String>,

        /// New privacy flag
        #[arg(long, value_name = "BOOL")]
        private: Option<bool>,

        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        as_user: String,
    },

    /// Delete a note you own
    Delete {
        /// Note id
        id: String,

        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        as_user: String,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration with secrets hidden
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
