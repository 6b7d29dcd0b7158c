use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use notepad_core::export::TextPdfRenderer;
use notepad_core::store::NoteStore;
use notepad_core::NotepadConfig;

use crate::commands::common::{connect_workspace, resolve_note};
use crate::error::CliError;

pub async fn run_export<S: NoteStore>(
    config: &NotepadConfig,
    store: Arc<S>,
    id: &str,
    output_dir: Option<&Path>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut workspace = connect_workspace(config, store).await?;
    let note_id = resolve_note(workspace.notes(), id)?
        .id
        .clone()
        .ok_or_else(|| CliError::NoteNotFound(id.to_string()))?;
    workspace.select(&note_id)?;

    let dir = output_dir.map_or_else(|| config.export_dir(), Path::to_path_buf);
    let path = workspace.export_active(&TextPdfRenderer, &dir)?;
    writeln!(out, "{}", path.display())?;

    workspace.close();
    Ok(())
}
