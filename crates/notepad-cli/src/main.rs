//! Notepad CLI - anonymous, live-synced rich-text notes
//!
//! Runs the note workspace in an interactive terminal shell, with one-shot
//! commands for listing and exporting notes.

mod cli;
mod commands;
mod error;
mod shell;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{open_store, resolve_config};
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::error::CliError;
use crate::shell::run_shell;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("notepad=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config, cli.db_path, cli.app_id)?;
    let store = open_store(&config)?;
    let mut stdout = std::io::stdout();

    match cli.command {
        None | Some(Commands::Shell) => run_shell(&config, store).await?,
        Some(Commands::List { json }) => run_list(&config, store, json, &mut stdout).await?,
        Some(Commands::Export { id, output }) => {
            run_export(&config, store, &id, output.as_deref(), &mut stdout).await?;
        }
    }

    Ok(())
}
