//! Overview table: one row per exported work package, all of them.

use crate::canvas::Canvas;
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::fonts::FontManager;
use crate::model::{Column, WorkPackage};

use super::{table_row, table_row_parts, HEADER_BACKGROUND};

pub struct OverviewTable<'a> {
    fonts: &'a FontManager,
    config: &'a ExportConfig,
}

impl<'a> OverviewTable<'a> {
    pub fn new(fonts: &'a FontManager, config: &'a ExportConfig) -> Self {
        Self { fonts, config }
    }

    /// Distribute `available` points over the columns.
    ///
    /// A column never gets less than its caption's longest word (floored at
    /// the configured minimum). When even those minimums exceed the page,
    /// the table cannot be laid out.
    pub fn column_widths(
        &self,
        columns: &[Column],
        work_packages: &[WorkPackage],
        available: f32,
    ) -> Result<Vec<f32>> {
        let size = self.config.style.table_size;
        let padding = 2.0 * self.config.cell_padding;

        let minimum: Vec<f32> = columns
            .iter()
            .map(|c| {
                self.fonts
                    .widest_word(&c.caption, size, true)
                    .max(self.config.min_column_width)
                    + padding
            })
            .collect();
        let required: f32 = minimum.iter().sum();
        if required > available + 0.01 {
            return Err(ExportError::LayoutOverflow {
                columns: columns.len(),
                required,
                available,
            });
        }

        let natural: Vec<f32> = columns
            .iter()
            .zip(&minimum)
            .map(|(column, &min)| {
                let caption = self.fonts.measure_text_width(&column.caption, size, true);
                let widest_cell = work_packages
                    .iter()
                    .map(|wp| self.fonts.measure_text_width(&wp.value(&column.key), size, false))
                    .fold(caption, f32::max);
                (widest_cell + padding).max(min)
            })
            .collect();
        let natural_total: f32 = natural.iter().sum();

        if natural_total <= available {
            let grow = available / natural_total;
            return Ok(natural.iter().map(|w| w * grow).collect());
        }

        let shrink = (available - required) / (natural_total - required);
        Ok(minimum
            .iter()
            .zip(&natural)
            .map(|(min, nat)| min + (nat - min) * shrink)
            .collect())
    }

    /// Write the table, repeating the header row on every page it spans.
    pub fn write(
        &self,
        canvas: &mut Canvas,
        columns: &[Column],
        work_packages: &[WorkPackage],
    ) -> Result<()> {
        if columns.is_empty() {
            return Ok(());
        }
        let widths = self.column_widths(columns, work_packages, canvas.content_width())?;
        let captions: Vec<String> = columns.iter().map(|c| c.caption.clone()).collect();
        let header = table_row(
            self.fonts,
            self.config,
            &captions,
            &widths,
            &vec![true; columns.len()],
            Some(HEADER_BACKGROUND),
        );
        let plain = vec![false; columns.len()];

        canvas.ensure_space(header.height * 2.0);
        canvas.place(header.clone());
        // Row parts must fit below a repeated header on a fresh page.
        let max_row_height = canvas.content_height() - header.height;
        for wp in work_packages {
            let cells: Vec<String> = columns.iter().map(|c| wp.value(&c.key)).collect();
            let parts = table_row_parts(
                self.fonts,
                self.config,
                &cells,
                &widths,
                &plain,
                None,
                max_row_height,
            );
            for part in parts {
                if canvas.ensure_space(part.height) {
                    canvas.place(header.clone());
                }
                canvas.place(part);
            }
        }
        canvas.move_down(self.config.style.body_size);
        Ok(())
    }
}
