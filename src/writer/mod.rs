//! Content writers – title, overview table and detail sections.
//!
//! [`ContentWriter`] composes the independent renderers and is invoked once
//! per batch canvas by the pipeline.

pub mod attachments;
pub mod detail;
pub mod table;

use crate::canvas::Canvas;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::fonts::{wrap_text, FontManager};
use crate::i18n::Locale;
use crate::layout_config::{BorderStyle, LayoutBox};
use crate::meta::MetaMap;
use crate::model::{Column, WorkPackage};

use attachments::{AttachmentEmbedder, ResizedImageCache};
use detail::DetailRenderer;
use table::OverviewTable;

pub(crate) const HEADER_BACKGROUND: [f32; 4] = [0.9, 0.9, 0.9, 1.0];
const CELL_BORDER: BorderStyle = BorderStyle {
    width: 0.5,
    color: [0.6, 0.6, 0.6, 1.0],
};

pub struct ContentWriter<'a> {
    fonts: &'a FontManager,
    config: &'a ExportConfig,
    table: OverviewTable<'a>,
    detail: DetailRenderer<'a>,
}

impl<'a> ContentWriter<'a> {
    pub fn new(
        fonts: &'a FontManager,
        config: &'a ExportConfig,
        locale: Locale,
        with_attachments: bool,
    ) -> Self {
        let embedder = with_attachments.then(|| AttachmentEmbedder::new(config));
        Self {
            fonts,
            config,
            table: OverviewTable::new(fonts, config),
            detail: DetailRenderer::new(fonts, config, locale, embedder),
        }
    }

    /// Heading line at the top of the first page; also the PDF title.
    pub fn write_title(&self, canvas: &mut Canvas, heading: &str) {
        canvas.set_title(heading);
        let size = self.config.style.heading_size;
        let line_height = self.fonts.line_height(size, self.config.style.line_height);
        let lines = wrap_text(heading, size, true, canvas.content_width(), self.fonts);
        canvas.text_block(&lines, size, true, line_height);
        canvas.move_down(size);
    }

    pub fn write_overview(
        &self,
        canvas: &mut Canvas,
        columns: &[Column],
        work_packages: &[WorkPackage],
    ) -> Result<()> {
        self.table.write(canvas, columns, work_packages)
    }

    /// One detail block per work package, starting on a fresh page.
    /// `first_position` is the position of `work_packages[0]` in the full
    /// result.
    pub fn write_details(
        &self,
        canvas: &mut Canvas,
        columns: &[Column],
        work_packages: &[WorkPackage],
        first_position: usize,
        meta: &MetaMap,
        cache: &mut ResizedImageCache,
    ) -> Result<()> {
        if work_packages.is_empty() {
            return Ok(());
        }
        if !canvas.is_page_empty() {
            canvas.start_new_page();
        }
        for (offset, wp) in work_packages.iter().enumerate() {
            let record = meta.get(first_position + offset);
            self.detail.write(canvas, columns, wp, record, cache)?;
        }
        Ok(())
    }
}

/// Build one table row of bordered, wrapped cells in content coordinates.
pub(crate) fn table_row(
    fonts: &FontManager,
    config: &ExportConfig,
    cells: &[String],
    widths: &[f32],
    bold: &[bool],
    background: Option<[f32; 4]>,
) -> LayoutBox {
    let wrapped = wrap_cells(fonts, config, cells, widths, bold);
    let lines: Vec<&[String]> = wrapped.iter().map(Vec::as_slice).collect();
    row_box(fonts, config, &lines, widths, bold, background)
}

/// Like [`table_row`], but split by line into consecutive rows of at most
/// `max_height` each so that every part fits on a page. Always returns at
/// least one row.
pub(crate) fn table_row_parts(
    fonts: &FontManager,
    config: &ExportConfig,
    cells: &[String],
    widths: &[f32],
    bold: &[bool],
    background: Option<[f32; 4]>,
    max_height: f32,
) -> Vec<LayoutBox> {
    let line_height = fonts.line_height(config.style.table_size, config.style.line_height);
    let wrapped = wrap_cells(fonts, config, cells, widths, bold);
    let total = wrapped.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let per_part = ((max_height - 2.0 * config.cell_padding) / line_height)
        .floor()
        .max(1.0) as usize;

    (0..total)
        .step_by(per_part)
        .map(|start| {
            let lines: Vec<&[String]> = wrapped
                .iter()
                .map(|cell| {
                    let end = (start + per_part).min(cell.len());
                    cell.get(start..end).unwrap_or(&[])
                })
                .collect();
            row_box(fonts, config, &lines, widths, bold, background)
        })
        .collect()
}

fn wrap_cells(
    fonts: &FontManager,
    config: &ExportConfig,
    cells: &[String],
    widths: &[f32],
    bold: &[bool],
) -> Vec<Vec<String>> {
    let size = config.style.table_size;
    let pad = config.cell_padding;
    cells
        .iter()
        .zip(widths)
        .zip(bold)
        .map(|((text, &w), &b)| wrap_text(text, size, b, w - 2.0 * pad, fonts))
        .collect()
}

fn row_box(
    fonts: &FontManager,
    config: &ExportConfig,
    lines: &[&[String]],
    widths: &[f32],
    bold: &[bool],
    background: Option<[f32; 4]>,
) -> LayoutBox {
    let size = config.style.table_size;
    let pad = config.cell_padding;
    let line_height = fonts.line_height(size, config.style.line_height);
    let row_height = lines
        .iter()
        .map(|cell| cell.len() as f32 * line_height)
        .fold(line_height, f32::max)
        + 2.0 * pad;

    let mut row = LayoutBox::new(0.0, 0.0, widths.iter().sum(), row_height);
    row.background_color = background;
    let mut x = 0.0;
    for ((cell_lines, &w), &b) in lines.iter().zip(widths).zip(bold) {
        let mut cell = LayoutBox::new(x, 0.0, w, row_height);
        cell.border = Some(CELL_BORDER);
        cell.children.push(LayoutBox::text(
            x + pad,
            pad,
            w - 2.0 * pad,
            cell_lines,
            size,
            b,
            line_height,
        ));
        row.children.push(cell);
        x += w;
    }
    row
}
