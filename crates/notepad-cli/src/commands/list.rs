use std::io::Write;
use std::sync::Arc;

use notepad_core::store::NoteStore;
use notepad_core::NotepadConfig;

use crate::commands::common::{
    connect_workspace, format_note_lines, note_to_list_item, now_ms, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list<S: NoteStore>(
    config: &NotepadConfig,
    store: Arc<S>,
    as_json: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut workspace = connect_workspace(config, store).await?;
    let now = now_ms();
    let notes = workspace.notes();

    if as_json {
        let json_items = notes
            .iter()
            .map(|note| note_to_list_item(note, now))
            .collect::<Vec<NoteListItem>>();
        writeln!(out, "{}", serde_json::to_string_pretty(&json_items)?)?;
    } else if notes.is_empty() {
        writeln!(out, "No notes yet")?;
    } else {
        for line in format_note_lines(notes, None, now) {
            writeln!(out, "{line}")?;
        }
    }

    workspace.close();
    Ok(())
}
