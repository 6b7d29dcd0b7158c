//! PDF export of a single note.

mod layout;
mod pdf;

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::Note;

pub use layout::{PageLayout, A4_HEIGHT_MM, A4_WIDTH_MM};
pub use pdf::TextPdfRenderer;

/// File stem used when a note has no title.
pub const DEFAULT_FILE_STEM: &str = "document";

const RESERVED_FILE_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Turns a note into the bytes of a finished document.
pub trait DocumentRenderer: Send + Sync {
    /// File extension of the produced documents, without the dot
    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, note: &Note) -> Result<Vec<u8>>;
}

/// Export file stem for a title: whitespace and characters reserved by
/// common filesystems become `_`, an empty title becomes `document`.
#[must_use]
pub fn sanitize_file_stem(title: &str) -> String {
    if title.is_empty() {
        return DEFAULT_FILE_STEM.to_string();
    }
    title
        .chars()
        .map(|ch| {
            if ch.is_whitespace() || RESERVED_FILE_NAME_CHARS.contains(&ch) {
                '_'
            } else {
                ch
            }
        })
        .collect()
}

/// Build the PDF file name for a note title.
///
/// ```
/// use notepad_core::export::export_file_name;
///
/// assert_eq!(export_file_name("My Notes"), "My_Notes.pdf");
/// assert_eq!(export_file_name(""), "document.pdf");
/// ```
#[must_use]
pub fn export_file_name(title: &str) -> String {
    format!("{}.pdf", sanitize_file_stem(title))
}

/// Render `note` and write it into `dir`. Returns the written path.
///
/// Never touches the note itself.
pub fn export_note(renderer: &dyn DocumentRenderer, note: &Note, dir: &Path) -> Result<PathBuf> {
    let file_name = format!(
        "{}.{}",
        sanitize_file_stem(&note.title),
        renderer.extension()
    );
    let bytes = renderer.render(note)?;

    std::fs::create_dir_all(dir).map_err(|error| {
        Error::Export(format!(
            "failed to create export directory {}: {error}",
            dir.display()
        ))
    })?;
    let path = dir.join(file_name);
    std::fs::write(&path, bytes)
        .map_err(|error| Error::Export(format!("failed to write {}: {error}", path.display())))?;

    tracing::info!("Exported note to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    struct FailingRenderer;

    impl DocumentRenderer for FailingRenderer {
        fn render(&self, _note: &Note) -> Result<Vec<u8>> {
            Err(Error::Export("renderer unavailable".to_string()))
        }
    }

    fn note(title: &str) -> Note {
        Note {
            title: title.to_string(),
            content: "<h1>Heading</h1><p>Body text</p>".to_string(),
            ..Note::draft()
        }
    }

    #[test]
    fn file_name_replaces_whitespace() {
        assert_eq!(export_file_name("My Notes"), "My_Notes.pdf");
        assert_eq!(export_file_name("tab\there"), "tab_here.pdf");
    }

    #[test]
    fn file_name_falls_back_to_document() {
        assert_eq!(export_file_name(""), "document.pdf");
    }

    #[test]
    fn file_name_replaces_reserved_characters() {
        assert_eq!(
            export_file_name(r#"a/b\c:d*e?f"g<h>i|j"#),
            "a_b_c_d_e_f_g_h_i_j.pdf"
        );
    }

    #[test]
    fn export_note_writes_pdf_file() {
        let dir = tempdir().unwrap();
        let note = note("Lecture 1");

        let path = export_note(&TextPdfRenderer, &note, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Lecture_1.pdf"));

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn export_note_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("exports").join("pdf");

        let path = export_note(&TextPdfRenderer, &note(""), &target).unwrap();
        assert_eq!(path, target.join("document.pdf"));
    }

    #[test]
    fn renderer_failure_is_reported_and_nothing_written() {
        let dir = tempdir().unwrap();
        let result = export_note(&FailingRenderer, &note("x"), dir.path());

        assert!(matches!(result, Err(Error::Export(_))));
        assert!(!dir.path().join("x.pdf").exists());
    }
}
