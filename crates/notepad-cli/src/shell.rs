//! Interactive notepad shell.
//!
//! A single event loop multiplexes stdin and the live snapshot feed, so user
//! commands and remote updates are applied one at a time.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notepad_core::export::TextPdfRenderer;
use notepad_core::markup::plain_text;
use notepad_core::store::NoteStore;
use notepad_core::{DeleteOutcome, NotepadConfig, SaveOutcome, Workspace};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::common::{connect_workspace, format_note_lines, now_ms, resolve_note};
use crate::error::CliError;

const HELP: &str = "\
Commands:
  list                    list notes, newest first (* marks the open note)
  show                    print the open note
  new                     start a new unsaved note
  open <id-or-prefix>     open a listed note
  write <text>            replace the open note's text
  append <text>           add a paragraph to the open note
  save                    save the open note
  delete [id-or-prefix]   delete a note (the open one by default)
  export [dir]            export the open note to PDF
  whoami                  print the session identity
  quit                    leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    List,
    Show,
    New,
    Open(String),
    Write(String),
    Append(String),
    Save,
    Delete(Option<String>),
    Export(Option<PathBuf>),
    WhoAmI,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlow {
    Continue,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, CliError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(name, rest)| (name, rest.trim()));
    let argument = (!rest.is_empty()).then(|| rest.to_string());

    let command = match name.to_ascii_lowercase().as_str() {
        "help" | "?" => ShellCommand::Help,
        "list" | "ls" => ShellCommand::List,
        "show" => ShellCommand::Show,
        "new" => ShellCommand::New,
        "open" => ShellCommand::Open(argument.ok_or(CliError::MissingArgument("open"))?),
        "write" => ShellCommand::Write(argument.ok_or(CliError::MissingArgument("write"))?),
        "append" => ShellCommand::Append(argument.ok_or(CliError::MissingArgument("append"))?),
        "save" => ShellCommand::Save,
        "delete" | "rm" => ShellCommand::Delete(argument),
        "export" => ShellCommand::Export(argument.map(PathBuf::from)),
        "whoami" => ShellCommand::WhoAmI,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(CliError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

/// Wrap typed text as one paragraph of markup.
pub fn paragraph(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<p>{escaped}</p>")
}

/// Prompt reflecting the open note: `*` while dirty, `[saving]` while a write
/// is in flight and `[saved]` while the saved indicator is up.
pub fn prompt<S: NoteStore>(workspace: &Workspace<S>) -> String {
    let mut prompt = String::from("notepad");
    if workspace.controller().is_dirty() {
        prompt.push('*');
    }
    if workspace.is_saving() {
        prompt.push_str(" [saving]");
    } else if workspace.is_saved_indicator_visible() {
        prompt.push_str(" [saved]");
    }
    prompt.push_str("> ");
    prompt
}

/// Run one shell command against the workspace.
pub async fn execute<S: NoteStore>(
    workspace: &mut Workspace<S>,
    command: ShellCommand,
    export_dir: &Path,
    out: &mut impl Write,
) -> Result<ShellFlow, CliError> {
    match command {
        ShellCommand::Help => writeln!(out, "{HELP}")?,
        ShellCommand::List => {
            if workspace.notes().is_empty() {
                writeln!(out, "No saved notes")?;
            }
            for line in format_note_lines(workspace.notes(), workspace.active(), now_ms()) {
                writeln!(out, "{line}")?;
            }
        }
        ShellCommand::Show => match workspace.active() {
            Some(note) => {
                let id = note
                    .id
                    .as_ref()
                    .map_or_else(|| "unsaved".to_string(), ToString::to_string);
                let dirty = if workspace.controller().is_dirty() {
                    " (modified)"
                } else {
                    ""
                };
                writeln!(out, "# {} [{id}]{dirty}", note.title)?;
                writeln!(out, "{}", plain_text(&note.content).trim_end())?;
            }
            None => writeln!(out, "No note is open")?,
        },
        ShellCommand::New => {
            if let Some(discarded) = workspace.new_note() {
                writeln!(out, "Discarded unsaved changes to \"{}\"", discarded.title)?;
            }
            writeln!(out, "Started a new note")?;
        }
        ShellCommand::Open(query) => {
            let id = resolve_note(workspace.notes(), &query)?
                .id
                .clone()
                .ok_or_else(|| CliError::NoteNotFound(query.clone()))?;
            if let Some(discarded) = workspace.select(&id)? {
                writeln!(out, "Discarded unsaved changes to \"{}\"", discarded.title)?;
            }
            writeln!(out, "Opened {id}")?;
        }
        ShellCommand::Write(text) => {
            if !workspace.edit(paragraph(&text)) {
                writeln!(out, "No note is open")?;
            }
        }
        ShellCommand::Append(text) => {
            let Some(content) = workspace.active().map(|note| note.content.clone()) else {
                writeln!(out, "No note is open")?;
                return Ok(ShellFlow::Continue);
            };
            workspace.edit(format!("{content}{}", paragraph(&text)));
        }
        ShellCommand::Save => match workspace.save().await {
            SaveOutcome::Created(id) => writeln!(out, "Saved new note {id}")?,
            SaveOutcome::Updated => writeln!(out, "Saved")?,
            SaveOutcome::Unavailable => writeln!(out, "Nothing to save")?,
            SaveOutcome::Failed(message) => writeln!(out, "Save failed: {message}")?,
        },
        ShellCommand::Delete(query) => {
            let outcome = match query {
                Some(query) => {
                    let id = resolve_note(workspace.notes(), &query)?
                        .id
                        .clone()
                        .ok_or_else(|| CliError::NoteNotFound(query.clone()))?;
                    workspace.delete(&id).await
                }
                None => workspace.delete_active().await,
            };
            match outcome {
                DeleteOutcome::Deleted(id) => writeln!(out, "Deleted {id}")?,
                DeleteOutcome::Discarded => writeln!(out, "Discarded unsaved note")?,
                DeleteOutcome::Unavailable => writeln!(out, "Nothing to delete")?,
                DeleteOutcome::Failed(message) => writeln!(out, "Delete failed: {message}")?,
            }
        }
        ShellCommand::Export(dir) => {
            let dir = dir.unwrap_or_else(|| export_dir.to_path_buf());
            let path = workspace.export_active(&TextPdfRenderer, &dir)?;
            writeln!(out, "Exported {}", path.display())?;
        }
        ShellCommand::WhoAmI => match workspace.identity() {
            Some(identity) => writeln!(out, "{identity}")?,
            None => writeln!(out, "Not signed in")?,
        },
        ShellCommand::Quit => return Ok(ShellFlow::Quit),
    }
    Ok(ShellFlow::Continue)
}

pub async fn run_shell<S: NoteStore>(config: &NotepadConfig, store: Arc<S>) -> Result<(), CliError> {
    let mut workspace = connect_workspace(config, store).await?;
    let export_dir = config.export_dir();
    let mut stdout = std::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    writeln!(stdout, "Type `help` for commands.")?;
    write!(stdout, "{}", prompt(&workspace))?;
    stdout.flush()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let flow = match parse_command(&line) {
                    Ok(Some(command)) => {
                        match execute(&mut workspace, command, &export_dir, &mut stdout).await {
                            Ok(flow) => flow,
                            Err(error) => {
                                writeln!(stdout, "Error: {error}")?;
                                ShellFlow::Continue
                            }
                        }
                    }
                    Ok(None) => ShellFlow::Continue,
                    Err(error) => {
                        writeln!(stdout, "{error}")?;
                        ShellFlow::Continue
                    }
                };
                if flow == ShellFlow::Quit {
                    break;
                }
                write!(stdout, "{}", prompt(&workspace))?;
                stdout.flush()?;
            }
            item = workspace.next_snapshot() => {
                let Some(item) = item else {
                    tracing::warn!("Live updates stopped");
                    continue;
                };
                let failed = item.is_err();
                workspace.handle_snapshot(item);
                if failed {
                    if let Some(notice) = workspace.notice() {
                        writeln!(stdout, "\n{notice}")?;
                    }
                    write!(stdout, "{}", prompt(&workspace))?;
                    stdout.flush()?;
                }
            }
        }
    }

    workspace.close();
    Ok(())
}
