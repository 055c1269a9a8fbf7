//! Page canvas – page geometry plus a top-to-bottom flow that breaks pages.
//!
//! Writers place boxes in content coordinates (origin at the top-left corner
//! of the content area). The canvas moves them to page-absolute coordinates
//! and starts a new page whenever the next box would cross the bottom
//! margin.

use serde::{Deserialize, Serialize};

use crate::config::{ExportConfig, PageSize};
use crate::i18n::Locale;
use crate::layout_config::{DocumentLayout, LayoutBox, Margins, PageLayout};
use crate::model::ExportOptions;

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Geometry of every page of one canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    pub page_size: PageSize,
    pub orientation: PageOrientation,
    pub margins: Margins,
    pub locale: Locale,
}

impl PageSetup {
    /// Detail sections read best in portrait; the overview table alone gets
    /// the wider landscape page.
    pub fn for_export(options: &ExportOptions, locale: Locale, config: &ExportConfig) -> Self {
        Self {
            page_size: config.page_size,
            orientation: if options.with_descriptions {
                PageOrientation::Portrait
            } else {
                PageOrientation::Landscape
            },
            margins: Margins {
                top: config.top_margin,
                bottom: config.bottom_margin,
                left: config.side_margin,
                right: config.side_margin,
            },
            locale,
        }
    }

    /// Effective page width after applying orientation.
    pub fn page_width(&self) -> f32 {
        let (w, h) = self.page_size.dimensions_pt();
        match self.orientation {
            PageOrientation::Portrait => w,
            PageOrientation::Landscape => h,
        }
    }

    /// Effective page height after applying orientation.
    pub fn page_height(&self) -> f32 {
        let (w, h) = self.page_size.dimensions_pt();
        match self.orientation {
            PageOrientation::Portrait => h,
            PageOrientation::Landscape => w,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.page_width() - self.margins.left - self.margins.right
    }

    pub fn content_height(&self) -> f32 {
        self.page_height() - self.margins.top - self.margins.bottom
    }
}

/// A document under construction.
pub struct Canvas {
    setup: PageSetup,
    layout: DocumentLayout,
    /// Distance from the top of the content area on the current page.
    cursor: f32,
}

impl Canvas {
    /// A fresh canvas with one empty page.
    pub fn new(setup: PageSetup) -> Self {
        let layout = DocumentLayout {
            title: String::new(),
            language: setup.locale.code().to_string(),
            page_width_pt: setup.page_width(),
            page_height_pt: setup.page_height(),
            margins: setup.margins,
            pages: vec![PageLayout {
                page_index: 0,
                boxes: Vec::new(),
            }],
        };
        Self {
            setup,
            layout,
            cursor: 0.0,
        }
    }

    pub fn set_title(&mut self, title: &str) {
        self.layout.title = title.to_string();
    }

    pub fn content_width(&self) -> f32 {
        self.setup.content_width()
    }

    pub fn content_height(&self) -> f32 {
        self.setup.content_height()
    }

    pub fn remaining_height(&self) -> f32 {
        (self.content_height() - self.cursor).max(0.0)
    }

    pub fn page_count(&self) -> usize {
        self.layout.pages.len()
    }

    pub fn is_page_empty(&self) -> bool {
        self.current_page().boxes.is_empty()
    }

    fn current_page(&self) -> &PageLayout {
        // The canvas always holds at least one page.
        &self.layout.pages[self.layout.pages.len() - 1]
    }

    pub fn start_new_page(&mut self) {
        let page_index = self.layout.pages.len();
        self.layout.pages.push(PageLayout {
            page_index,
            boxes: Vec::new(),
        });
        self.cursor = 0.0;
    }

    /// Break the page unless `height` still fits. Callers split content
    /// taller than a whole page beforehand (`text_block`, table row parts).
    /// Returns whether a new page was started.
    pub fn ensure_space(&mut self, height: f32) -> bool {
        if height > self.remaining_height() && !self.is_page_empty() {
            self.start_new_page();
            true
        } else {
            false
        }
    }

    /// Place a box at the cursor and advance past it. The box's own `y` is
    /// treated as an offset below the cursor.
    pub fn place(&mut self, mut lbox: LayoutBox) {
        let dx = self.setup.margins.left;
        let dy = self.setup.margins.top + self.cursor;
        let bottom = lbox.y + lbox.height;
        lbox.translate(dx, dy);
        self.cursor += bottom;
        let last = self.layout.pages.len() - 1;
        self.layout.pages[last].boxes.push(lbox);
    }

    pub fn move_down(&mut self, dy: f32) {
        self.cursor = (self.cursor + dy).min(self.content_height());
    }

    /// Flow pre-wrapped lines, splitting them across pages where needed.
    pub fn text_block(&mut self, lines: &[String], font_size: f32, bold: bool, line_height: f32) {
        let mut rest = lines;
        while !rest.is_empty() {
            let mut fit = (self.remaining_height() / line_height).floor() as usize;
            if fit == 0 {
                if self.is_page_empty() {
                    fit = 1;
                } else {
                    self.start_new_page();
                    continue;
                }
            }
            let (chunk, tail) = rest.split_at(fit.min(rest.len()));
            let width = self.content_width();
            self.place(LayoutBox::text(
                0.0,
                0.0,
                width,
                chunk,
                font_size,
                bold,
                line_height,
            ));
            rest = tail;
        }
    }

    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    pub fn into_layout(self) -> DocumentLayout {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(with_descriptions: bool) -> PageSetup {
        let options = ExportOptions {
            with_descriptions,
            with_attachments: false,
        };
        PageSetup::for_export(&options, Locale::En, &ExportConfig::default())
    }

    #[test]
    fn orientation_follows_detail_sections() {
        let portrait = setup(true);
        assert_eq!(portrait.orientation, PageOrientation::Portrait);
        assert_eq!(portrait.page_width(), 522.0);
        assert_eq!(portrait.page_height(), 756.0);

        let landscape = setup(false);
        assert_eq!(landscape.orientation, PageOrientation::Landscape);
        assert_eq!(landscape.page_width(), 756.0);
        assert_eq!(landscape.content_width(), 756.0 - 72.0);
        assert_eq!(landscape.content_height(), 522.0 - 120.0);
    }

    #[test]
    fn new_canvas_has_one_empty_page() {
        let canvas = Canvas::new(setup(true));
        assert_eq!(canvas.page_count(), 1);
        assert!(canvas.is_page_empty());
        assert_eq!(canvas.layout().language, "en");
    }

    #[test]
    fn place_translates_into_content_area() {
        let mut canvas = Canvas::new(setup(true));
        canvas.place(LayoutBox::new(0.0, 0.0, 100.0, 30.0));
        canvas.place(LayoutBox::new(10.0, 5.0, 100.0, 30.0));
        let boxes = &canvas.layout().pages[0].boxes;
        assert_eq!((boxes[0].x, boxes[0].y), (36.0, 60.0));
        assert_eq!((boxes[1].x, boxes[1].y), (46.0, 95.0));
        assert_eq!(canvas.remaining_height(), canvas.content_height() - 65.0);
    }

    #[test]
    fn ensure_space_breaks_only_non_empty_pages() {
        let mut canvas = Canvas::new(setup(true));
        let full = canvas.content_height();
        assert!(!canvas.ensure_space(full * 2.0));
        canvas.place(LayoutBox::new(0.0, 0.0, 10.0, full - 10.0));
        assert!(!canvas.ensure_space(10.0));
        assert!(canvas.ensure_space(11.0));
        assert_eq!(canvas.page_count(), 2);
        assert_eq!(canvas.layout().pages[1].page_index, 1);
    }

    #[test]
    fn text_block_splits_across_pages() {
        let mut canvas = Canvas::new(setup(true));
        let per_page = (canvas.content_height() / 10.0).floor() as usize;
        let lines: Vec<String> = (0..per_page * 2 + 3).map(|i| format!("line {i}")).collect();
        canvas.text_block(&lines, 8.0, false, 10.0);
        assert_eq!(canvas.page_count(), 3);

        let placed: usize = canvas
            .layout()
            .boxes()
            .filter_map(|b| b.text.as_ref())
            .map(|t| t.lines.len())
            .sum();
        assert_eq!(placed, lines.len());
        for lbox in canvas.layout().pages.iter().flat_map(|p| &p.boxes) {
            assert!(lbox.y + lbox.height <= 60.0 + canvas.content_height() + 0.01);
        }
    }

    #[test]
    fn fresh_canvases_do_not_share_state() {
        let mut first = Canvas::new(setup(true));
        first.set_title("First");
        first.place(LayoutBox::new(0.0, 0.0, 10.0, 10.0));
        first.start_new_page();
        let second = Canvas::new(setup(true));
        assert_eq!(second.page_count(), 1);
        assert!(second.is_page_empty());
        assert!(second.layout().title.is_empty());
    }
}
