//! Per work package detail sections: numbered heading, attribute table,
//! description and embedded image attachments.

use crate::canvas::Canvas;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::fonts::{wrap_text, FontManager};
use crate::i18n::{Label, Locale};
use crate::layout_config::LayoutBox;
use crate::meta::RecordMeta;
use crate::model::{Column, WorkPackage};

use super::attachments::{AttachmentEmbedder, ResizedImageCache};
use super::table_row_parts;

/// Share of the content width given to attribute captions.
const CAPTION_SHARE: f32 = 0.3;

pub struct DetailRenderer<'a> {
    fonts: &'a FontManager,
    config: &'a ExportConfig,
    locale: Locale,
    /// `None` when attachments are not exported.
    embedder: Option<AttachmentEmbedder<'a>>,
}

impl<'a> DetailRenderer<'a> {
    pub fn new(
        fonts: &'a FontManager,
        config: &'a ExportConfig,
        locale: Locale,
        embedder: Option<AttachmentEmbedder<'a>>,
    ) -> Self {
        Self {
            fonts,
            config,
            locale,
            embedder,
        }
    }

    pub fn heading(wp: &WorkPackage, meta: Option<&RecordMeta>) -> String {
        let number = meta.map(RecordMeta::number).unwrap_or_default();
        [number, wp.type_name.clone(), format!("#{}", wp.id), wp.subject.clone()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn write(
        &self,
        canvas: &mut Canvas,
        columns: &[Column],
        wp: &WorkPackage,
        meta: Option<&RecordMeta>,
        cache: &mut ResizedImageCache,
    ) -> Result<()> {
        let style = &self.config.style;
        let width = canvas.content_width();

        let size = style.section_heading_size;
        let line_height = self.fonts.line_height(size, style.line_height);
        let lines = wrap_text(&Self::heading(wp, meta), size, true, width, self.fonts);
        // Keep the heading together with the first attribute row.
        let table_line = self.fonts.line_height(style.table_size, style.line_height);
        let first_row = table_line + 2.0 * self.config.cell_padding;
        canvas.ensure_space(lines.len() as f32 * line_height + first_row);
        canvas.text_block(&lines, size, true, line_height);
        canvas.move_down(size * 0.5);

        self.write_attributes(canvas, columns, wp);

        if let Some(description) = wp.description.as_deref().filter(|d| !d.trim().is_empty()) {
            self.write_labelled_text(canvas, self.locale.t(Label::Description), description);
        }

        if let Some(embedder) = &self.embedder {
            self.write_attachments(canvas, embedder, wp, cache)?;
        }

        canvas.move_down(style.body_size * 2.0);
        Ok(())
    }

    fn write_attributes(&self, canvas: &mut Canvas, columns: &[Column], wp: &WorkPackage) {
        let width = canvas.content_width();
        let widths = [width * CAPTION_SHARE, width * (1.0 - CAPTION_SHARE)];
        let max_height = canvas.content_height();
        for column in columns {
            let cells = [column.caption.clone(), wp.value(&column.key)];
            let parts = table_row_parts(
                self.fonts,
                self.config,
                &cells,
                &widths,
                &[true, false],
                None,
                max_height,
            );
            for part in parts {
                canvas.ensure_space(part.height);
                canvas.place(part);
            }
        }
    }

    fn write_labelled_text(&self, canvas: &mut Canvas, label: &str, text: &str) {
        let style = &self.config.style;
        let width = canvas.content_width();
        let line_height = self.fonts.line_height(style.body_size, style.line_height);
        canvas.move_down(style.body_size);
        canvas.ensure_space(line_height * 2.0);
        canvas.text_block(&[label.to_string()], style.body_size, true, line_height);
        let lines = wrap_text(text, style.body_size, false, width, self.fonts);
        canvas.text_block(&lines, style.body_size, false, line_height);
    }

    fn write_attachments(
        &self,
        canvas: &mut Canvas,
        embedder: &AttachmentEmbedder<'_>,
        wp: &WorkPackage,
        cache: &mut ResizedImageCache,
    ) -> Result<()> {
        let max_width = canvas.content_width();
        let max_height = canvas.content_height() * self.config.max_image_height_ratio;
        let gap = self.config.style.body_size * 0.5;
        let mut placed_any = false;

        for attachment in &wp.attachments {
            let Some(image) = embedder.embed(attachment, max_width, max_height, cache)? else {
                continue;
            };
            if !placed_any {
                let style = &self.config.style;
                let line_height = self.fonts.line_height(style.body_size, style.line_height);
                canvas.move_down(style.body_size);
                // Keep the label on the page of the first image.
                canvas.ensure_space(line_height + image.height);
                let label = self.locale.t(Label::Attachments).to_string();
                canvas.text_block(&[label], style.body_size, true, line_height);
                placed_any = true;
            }
            canvas.ensure_space(image.height);
            let mut lbox = LayoutBox::new(0.0, 0.0, image.width, image.height);
            lbox.image = Some(image);
            canvas.place(lbox);
            canvas.move_down(gap);
        }
        Ok(())
    }
}
