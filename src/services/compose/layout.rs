//! Page geometry for the exported comic. Everything here works in points with
//! the origin at the top-left corner of the page; the PDF writer flips the
//! y axis when it draws.

use crate::core::model::Character;
use crate::utils::text::{text_width, wrap_text};
use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f32 = 1e-3;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    pub const A4: PageGeometry = PageGeometry {
        width: 595.0,
        height: 842.0,
    };

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub columns: u32,
    pub rows: u32,
    pub margin: f32,
    pub gap: f32,
}

impl GridSpec {
    pub fn capacity(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    /// Side of a square cell: the largest that fits both across and down.
    pub fn cell_size(&self, page: &PageGeometry) -> f32 {
        let across = (page.width - 2.0 * self.margin - (self.columns as f32 - 1.0) * self.gap)
            / self.columns as f32;
        let down = (page.height - 2.0 * self.margin - (self.rows as f32 - 1.0) * self.gap)
            / self.rows as f32;
        across.min(down)
    }

    pub fn validate(&self, page: &PageGeometry) -> Result<()> {
        if self.columns == 0 || self.rows == 0 {
            bail!("Panel grid needs at least one column and one row");
        }
        if self.margin < 0.0 || self.gap < 0.0 {
            bail!("Panel grid margin and gap must not be negative");
        }
        if self.cell_size(page) <= 0.0 {
            bail!(
                "A {}x{} grid does not fit on a {}x{} page",
                self.columns,
                self.rows,
                page.width,
                page.height
            );
        }
        Ok(())
    }

    /// Cell `slot` (row-major) on a page. The grid block is centered between
    /// the side margins and starts at the top margin.
    pub fn cell_rect(&self, page: &PageGeometry, slot: usize) -> Rect {
        let cell = self.cell_size(page);
        let col = (slot % self.columns as usize) as f32;
        let row = (slot / self.columns as usize) as f32;
        let block = self.columns as f32 * cell + (self.columns as f32 - 1.0) * self.gap;
        let left = (page.width - block) / 2.0;

        Rect::new(
            left + col * (cell + self.gap),
            self.margin + row * (cell + self.gap),
            cell,
            cell,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelSlot {
    pub panel_index: usize,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelPage {
    /// 1-based among panel pages.
    pub number: usize,
    pub slots: Vec<PanelSlot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPlan {
    pub page: PageGeometry,
    pub panel_pages: Vec<PanelPage>,
}

impl DocumentPlan {
    /// Cover plus panel pages.
    pub fn page_count(&self) -> usize {
        1 + self.panel_pages.len()
    }
}

pub fn plan_document(panel_count: usize, page: PageGeometry, grid: GridSpec) -> Result<DocumentPlan> {
    grid.validate(&page)?;

    let capacity = grid.capacity();
    let panel_pages = (0..panel_count)
        .collect::<Vec<_>>()
        .chunks(capacity)
        .enumerate()
        .map(|(i, chunk)| PanelPage {
            number: i + 1,
            slots: chunk
                .iter()
                .enumerate()
                .map(|(slot, &panel_index)| PanelSlot {
                    panel_index,
                    rect: grid.cell_rect(&page, slot),
                })
                .collect(),
        })
        .collect();

    Ok(DocumentPlan { page, panel_pages })
}

// --- Cover ---

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Left edge of the line.
    pub x: f32,
    pub baseline: f32,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl TextLine {
    pub fn centered(text: impl Into<String>, center_x: f32, baseline: f32, size: f32, bold: bool) -> Self {
        let text = text.into();
        let width = text_width(&text, size, bold);
        Self {
            x: center_x - width / 2.0,
            text,
            baseline,
            size,
            bold,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverLayout {
    pub title: Vec<TextLine>,
    pub subtitle: TextLine,
    pub footer: TextLine,
    /// Backing plate behind the title block.
    pub plaque: Rect,
}

/// Credited in the cover footer and as the PDF author.
pub const BRAND: &str = "Comic Crafter AI";
pub const TITLE_SIZE: f32 = 48.0;
pub const SUBTITLE_SIZE: f32 = 24.0;
pub const FOOTER_SIZE: f32 = 12.0;
const LINE_HEIGHT: f32 = 1.15;
const TITLE_SIDE_PADDING: f32 = 40.0;
const PLAQUE_PADDING: f32 = 24.0;

pub fn plan_cover(title: &str, character: &Character, page: &PageGeometry) -> CoverLayout {
    let center = page.width / 2.0;
    let first_baseline = page.height / 3.0;

    let mut lines = wrap_text(title, TITLE_SIZE, true, page.width - 2.0 * TITLE_SIDE_PADDING);
    if lines.is_empty() {
        lines.push(String::new());
    }
    let title_lines: Vec<TextLine> = lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let baseline = first_baseline + i as f32 * TITLE_SIZE * LINE_HEIGHT;
            TextLine::centered(line, center, baseline, TITLE_SIZE, true)
        })
        .collect();

    let title_height = title_lines.len() as f32 * TITLE_SIZE * LINE_HEIGHT;
    let subtitle = TextLine::centered(
        format!("Featuring {}", character.name),
        center,
        first_baseline + title_height + 20.0,
        SUBTITLE_SIZE,
        false,
    );
    let footer = TextLine::centered(
        format!("Generated with {}", BRAND),
        center,
        page.height - 50.0,
        FOOTER_SIZE,
        false,
    );

    let top = first_baseline - TITLE_SIZE - PLAQUE_PADDING;
    let bottom = subtitle.baseline + SUBTITLE_SIZE * 0.3 + PLAQUE_PADDING;
    let plaque = Rect::new(
        TITLE_SIDE_PADDING / 2.0,
        top,
        page.width - TITLE_SIDE_PADDING,
        bottom - top,
    );

    CoverLayout {
        title: title_lines,
        subtitle,
        footer,
        plaque,
    }
}
