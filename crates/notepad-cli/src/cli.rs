use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "notepad")]
#[command(about = "Anonymous, live-synced rich-text notes from the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to a JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Application namespace for the notes collection
    #[arg(long, global = true, value_name = "ID")]
    pub app_id: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive shell (default)
    Shell,
    /// List notes, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export a note to PDF
    Export {
        /// Note ID or unique ID prefix
        id: String,
        /// Output directory (configured export dir when omitted)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
}
