//! Minimal plain-text PDF writer.

use std::io::Write as _;

use super::{DocumentRenderer, PageLayout, A4_HEIGHT_MM, A4_WIDTH_MM};
use crate::error::Result;
use crate::markup::plain_text;
use crate::models::Note;

const POINTS_PER_MM: f64 = 72.0 / 25.4;

// Text canvas, in abstract units before scaling to the page.
const FONT_SIZE: f64 = 10.0;
const LINE_HEIGHT: f64 = 13.0;
const GLYPH_ADVANCE: f64 = FONT_SIZE * 0.5;
const MARGIN: f64 = 40.0;
const WRAP_COLUMNS: usize = 90;

/// Writes a note's plain text onto A4 pages using the built-in Helvetica
/// font.
///
/// Lines are wrapped at a fixed column count; the resulting text block is
/// scaled to the page width and split across as many pages as needed, whole
/// lines per page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextPdfRenderer;

impl TextPdfRenderer {
    #[allow(clippy::cast_precision_loss)]
    fn canvas_width() -> f64 {
        MARGIN.mul_add(2.0, WRAP_COLUMNS as f64 * GLYPH_ADVANCE)
    }

    fn lines(note: &Note) -> Vec<String> {
        plain_text(&note.content)
            .lines()
            .flat_map(|line| wrap_line(line, WRAP_COLUMNS))
            .collect()
    }
}

impl DocumentRenderer for TextPdfRenderer {
    fn render(&self, note: &Note) -> Result<Vec<u8>> {
        let lines = Self::lines(note);
        let layout = PageLayout::fit_to_width(Self::canvas_width())?;
        let per_page = layout.rows_per_page(LINE_HEIGHT, MARGIN);

        let mut streams = lines
            .chunks(per_page)
            .map(|page| page_stream(&layout, page))
            .collect::<Result<Vec<_>>>()?;
        if streams.is_empty() {
            streams.push(page_stream(&layout, &[])?);
        }
        debug_assert_eq!(
            streams.len(),
            layout.page_count(lines.len(), LINE_HEIGHT, MARGIN)
        );
        tracing::debug!(
            "Rendered {} lines onto {} pages",
            lines.len(),
            streams.len()
        );
        write_document(&streams, &note.title)
    }
}

/// Break a line into chunks of at most `columns` characters, preferring
/// whitespace boundaries.
fn wrap_line(line: &str, columns: usize) -> Vec<String> {
    let mut wrapped = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in line.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > columns {
            wrapped.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len > columns {
            let chars = word.chars().collect::<Vec<_>>();
            for chunk in chars.chunks(columns) {
                if current_len > 0 {
                    wrapped.push(std::mem::take(&mut current));
                }
                current = chunk.iter().collect();
                current_len = chunk.len();
            }
            continue;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    wrapped.push(current);
    wrapped
}

#[allow(clippy::cast_precision_loss)]
fn page_stream(layout: &PageLayout, lines: &[String]) -> Result<Vec<u8>> {
    let points_per_unit = layout.scale() * POINTS_PER_MM;
    let page_height_pt = A4_HEIGHT_MM * POINTS_PER_MM;

    let mut stream = Vec::new();
    writeln!(stream, "BT")?;
    writeln!(stream, "/F1 {:.2} Tf", FONT_SIZE * points_per_unit)?;
    for (row, line) in lines.iter().enumerate() {
        let top = LINE_HEIGHT.mul_add(row as f64, MARGIN);
        let x = MARGIN * points_per_unit;
        let y = page_height_pt - (top + FONT_SIZE) * points_per_unit;
        write!(stream, "1 0 0 1 {x:.2} {y:.2} Tm (")?;
        stream.extend(encode_text(line));
        writeln!(stream, ") Tj")?;
    }
    writeln!(stream, "ET")?;
    Ok(stream)
}

/// Escape PDF string delimiters and map to single-byte `WinAnsi`; characters
/// outside Latin-1 become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '(' | ')' => {
                bytes.push(b'\\');
                bytes.push(ch as u8);
            }
            _ => bytes.push(u8::try_from(u32::from(ch)).unwrap_or(b'?')),
        }
    }
    bytes
}

fn write_document(streams: &[Vec<u8>], title: &str) -> Result<Vec<u8>> {
    let page_width_pt = A4_WIDTH_MM * POINTS_PER_MM;
    let page_height_pt = A4_HEIGHT_MM * POINTS_PER_MM;

    // 1 catalog, 2 page tree, 3 font, 4 info, then a page and its content
    // stream per page.
    let first_page_object = 5;
    let kids = (0..streams.len())
        .map(|index| format!("{} 0 R", first_page_object + index * 2))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!(
            "<< /Type /Pages /Kids [{kids}] /Count {} >>",
            streams.len()
        )
        .into_bytes(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_vec(),
    ];

    let mut info = b"<< /Producer (notepad) /Title (".to_vec();
    info.extend(encode_text(title));
    info.extend_from_slice(b") >>");
    objects.push(info);

    for (index, stream) in streams.iter().enumerate() {
        let content_object = first_page_object + index * 2 + 1;
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {page_width_pt:.2} {page_height_pt:.2}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {content_object} 0 R >>"
            )
            .into_bytes(),
        );

        let mut content = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
        content.extend_from_slice(stream);
        content.extend_from_slice(b"\nendstream");
        objects.push(content);
    }

    let mut output = Vec::new();
    output.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, object) in objects.iter().enumerate() {
        offsets.push(output.len());
        writeln!(output, "{} 0 obj", index + 1)?;
        output.extend_from_slice(object);
        output.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = output.len();
    writeln!(output, "xref")?;
    writeln!(output, "0 {}", objects.len() + 1)?;
    writeln!(output, "0000000000 65535 f ")?;
    for offset in offsets {
        writeln!(output, "{offset:010} 00000 n ")?;
    }
    writeln!(output, "trailer")?;
    writeln!(
        output,
        "<< /Size {} /Root 1 0 R /Info 4 0 R >>",
        objects.len() + 1
    )?;
    writeln!(output, "startxref")?;
    writeln!(output, "{xref_offset}")?;
    write!(output, "%%EOF")?;
    Ok(output)
}
