//! Page geometry for exported documents.

use crate::error::{Error, Result};

/// A4 portrait width in millimetres.
pub const A4_WIDTH_MM: f64 = 210.0;
/// A4 portrait height in millimetres.
pub const A4_HEIGHT_MM: f64 = 297.0;

/// Content of arbitrary size scaled onto A4 portrait pages.
///
/// The content is scaled uniformly to the full page width, so its aspect
/// ratio is kept. Content is laid out in rows, and a row never straddles a
/// page boundary: each page holds as many whole rows as fit between its
/// margins and the next row starts the following page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    scale: f64,
}

impl PageLayout {
    /// Fit content measured in any unit to the A4 page width.
    pub fn fit_to_width(content_width: f64) -> Result<Self> {
        if !(content_width.is_finite() && content_width > 0.0) {
            return Err(Error::Export(format!(
                "content width must be positive, got {content_width}"
            )));
        }
        Ok(Self {
            scale: A4_WIDTH_MM / content_width,
        })
    }

    /// Millimetres per content unit
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Height of one page expressed in content units.
    #[must_use]
    pub fn page_height_in_content(&self) -> f64 {
        A4_HEIGHT_MM / self.scale
    }

    /// Whole rows of `row_height` that fit on a page with `margin` above and
    /// below, in content units. Always at least one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rows_per_page(&self, row_height: f64, margin: f64) -> usize {
        if !(row_height.is_finite() && row_height > 0.0) {
            return 1;
        }
        let usable = margin.mul_add(-2.0, self.page_height_in_content());
        ((usable / row_height).floor().max(0.0) as usize).max(1)
    }

    /// Pages needed for `rows` rows; an empty document still takes one page.
    #[must_use]
    pub fn page_count(&self, rows: usize, row_height: f64, margin: f64) -> usize {
        rows.div_ceil(self.rows_per_page(row_height, margin)).max(1)
    }
}
