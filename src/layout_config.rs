//! Document layout – the intermediate representation between the content
//! writers and PDF rendering. This is the "frozen" structure that encodes
//! exactly what goes on each page of one batch.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// A complete laid-out batch document ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLayout {
    /// PDF title; also printed as the first heading.
    pub title: String,
    /// Language code of the document text.
    pub language: String,
    /// Page width in points, orientation applied.
    pub page_width_pt: f32,
    /// Page height in points, orientation applied.
    pub page_height_pt: f32,
    pub margins: Margins,
    /// Pages of this batch, in print order.
    pub pages: Vec<PageLayout>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

/// Boxes placed on one page of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,

    /// Either text or an image; table cells nest further boxes.
    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,

    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// Already wrapped to the box width.
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub bold: bool,
    pub color: [f32; 4],
    pub line_height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the layout box
    pub x_offset: f32,
    /// Y offset from the top of the text content area
    pub y_offset: f32,
}

/// An embedded image, already scaled to its box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    /// Filesystem path or base64 data URI.
    pub src: String,
    pub width: f32,
    pub height: f32,
    /// Pixel size of the image stored at `src`.
    pub px_width: u32,
    pub px_height: u32,
}

impl DocumentLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pretty JSON, as printed by `--dump-layout`.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ExportError::Config(e.to_string()))
    }

    /// Iterate every box on every page, depth first.
    pub fn boxes(&self) -> impl Iterator<Item = &LayoutBox> + '_ {
        self.pages.iter().flat_map(|p| p.boxes.iter()).flat_map(|b| b.descendants())
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
            image: None,
            children: Vec::new(),
        }
    }

    /// A box holding pre-wrapped lines, sized to fit them.
    pub fn text(
        x: f32,
        y: f32,
        width: f32,
        lines: &[String],
        font_size: f32,
        bold: bool,
        line_height: f32,
    ) -> Self {
        let mut lb = Self::new(x, y, width, lines.len() as f32 * line_height);
        lb.text = Some(TextContent {
            lines: lines
                .iter()
                .enumerate()
                .map(|(i, line)| TextLine {
                    text: line.clone(),
                    x_offset: 0.0,
                    y_offset: i as f32 * line_height,
                })
                .collect(),
            font_size,
            bold,
            color: [0.0, 0.0, 0.0, 1.0],
            line_height,
        });
        lb
    }

    /// Shift this box and all its children.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
        for child in &mut self.children {
            child.translate(dx, dy);
        }
    }

    /// This box followed by all its descendants, depth first.
    pub fn descendants(&self) -> Box<dyn Iterator<Item = &LayoutBox> + '_> {
        Box::new(std::iter::once(self).chain(self.children.iter().flat_map(|c| c.descendants())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_with(boxes: Vec<LayoutBox>) -> DocumentLayout {
        DocumentLayout {
            title: "t".into(),
            language: "en".into(),
            page_width_pt: 522.0,
            page_height_pt: 756.0,
            margins: Margins {
                top: 60.0,
                bottom: 60.0,
                left: 36.0,
                right: 36.0,
            },
            pages: vec![PageLayout {
                page_index: 0,
                boxes,
            }],
        }
    }

    #[test]
    fn translate_moves_children() {
        let mut parent = LayoutBox::new(0.0, 0.0, 100.0, 20.0);
        parent.children.push(LayoutBox::new(10.0, 5.0, 20.0, 10.0));
        parent.translate(36.0, 60.0);
        assert_eq!((parent.x, parent.y), (36.0, 60.0));
        assert_eq!((parent.children[0].x, parent.children[0].y), (46.0, 65.0));
    }

    #[test]
    fn text_box_height_matches_lines() {
        let lines = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let lb = LayoutBox::text(0.0, 0.0, 50.0, &lines, 10.0, false, 13.0);
        assert_eq!(lb.height, 39.0);
        assert_eq!(lb.text.unwrap().lines[2].y_offset, 26.0);
    }

    #[test]
    fn boxes_visits_nested_children() {
        let mut row = LayoutBox::new(0.0, 0.0, 100.0, 20.0);
        row.children.push(LayoutBox::new(0.0, 0.0, 50.0, 20.0));
        row.children.push(LayoutBox::new(50.0, 0.0, 50.0, 20.0));
        let layout = layout_with(vec![row]);
        assert_eq!(layout.boxes().count(), 3);
    }

    #[test]
    fn json_roundtrip() {
        let layout = layout_with(vec![LayoutBox::new(1.0, 2.0, 3.0, 4.0)]);
        let back = DocumentLayout::from_json(&layout.to_json()).unwrap();
        assert_eq!(back.page_count(), 1);
        assert_eq!(back.pages[0].boxes[0].height, 4.0);
        assert_eq!(back.margins, layout.margins);
    }
}
