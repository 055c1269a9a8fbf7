//! Font loading and text measurement using `ttf-parser`.
//!
//! Without a configured font the exporter renders with the builtin Helvetica
//! family and measures with Helvetica-like average advances. When a TrueType
//! font is loaded, glyph advances are read from the font itself and the same
//! bytes are embedded by the renderer.

use std::fs;
use std::path::Path;

use crate::error::{ExportError, Result};

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// Measures text for the writers and hands font bytes to the renderer.
#[derive(Clone, Default)]
pub struct FontManager {
    /// `None` means builtin Helvetica.
    custom: Option<FontData>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF font from bytes.
    pub fn load_font(&mut self, bytes: Vec<u8>) -> Result<()> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| ExportError::Config(format!("Failed to parse font: {e}")))?;

        self.custom = Some(FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        });
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let mut mgr = Self::new();
        mgr.load_font(fs::read(path)?)?;
        Ok(mgr)
    }

    /// Font bytes for embedding, `None` when rendering with Helvetica.
    pub fn font_bytes(&self) -> Option<&[u8]> {
        self.custom.as_ref().map(|d| d.bytes.as_slice())
    }

    /// Measure the width of a string at a given font size (in pt).
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        let Some(data) = &self.custom else {
            // Average Helvetica advance; bold is ~10 % wider.
            let avg = if bold { 0.55 } else { 0.5 };
            return text.chars().count() as f32 * font_size * avg;
        };

        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font_size / data.units_per_em;
                text.chars()
                    .map(|ch| {
                        face.glyph_index(ch)
                            .and_then(|gid| face.glyph_hor_advance(gid))
                            .map(|adv| adv as f32 * scale)
                            .unwrap_or(font_size * 0.5)
                    })
                    .sum()
            }
            Err(_) => text.chars().count() as f32 * font_size * 0.5,
        }
    }

    /// Line height in pt.
    pub fn line_height(&self, font_size: f32, factor: f32) -> f32 {
        font_size * factor
    }

    /// Baseline offset from the top of a line, in pt.
    pub fn ascender(&self, font_size: f32) -> f32 {
        match &self.custom {
            Some(data) => data.ascender * font_size / data.units_per_em,
            None => font_size * 0.75,
        }
    }

    /// Width of the widest single word, used as a column's minimum width.
    pub fn widest_word(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        text.split_whitespace()
            .map(|w| self.measure_text_width(w, font_size, bold))
            .fold(0.0, f32::max)
    }
}

/// Word-wrap text to fit within `max_width` points. Returns a vec of lines.
///
/// Words that do not fit on a line of their own are broken by character.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    // Split on existing newlines first
    for paragraph in text.lines() {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            if fonts.measure_text_width(&candidate, font_size, bold) <= max_width {
                current_line = candidate;
                continue;
            }
            if !current_line.is_empty() {
                lines.push(std::mem::take(&mut current_line));
            }
            if fonts.measure_text_width(word, font_size, bold) <= max_width {
                current_line = word.to_string();
            } else {
                let mut pieces = break_word(word, font_size, bold, max_width, fonts);
                current_line = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn break_word(
    word: &str,
    font_size: f32,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        current.push(ch);
        if fonts.measure_text_width(&current, font_size, bold) > max_width
            && current.chars().count() > 1
        {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("Hello", 16.0, false);
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_text("Hello world foo bar", 16.0, false, 60.0, &mgr);
        assert!(lines.len() >= 2, "Expected wrapping, got {:?}", lines);
    }

    #[test]
    fn long_word_is_broken_by_character() {
        let mgr = FontManager::default();
        // 10 pt → 5 pt per char, 20 pt fits 4 chars.
        let lines = wrap_text("abcdefghij", 10.0, false, 20.0, &mgr);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrapped_lines_keep_every_word() {
        let mgr = FontManager::default();
        let text = "the quick brown fox jumps over the lazy dog";
        let lines = wrap_text(text, 9.0, false, 50.0, &mgr);
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn blank_lines_are_preserved() {
        let mgr = FontManager::default();
        let lines = wrap_text("one\n\ntwo", 9.0, false, 500.0, &mgr);
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn widest_word_measures_longest() {
        let mgr = FontManager::default();
        let w = mgr.widest_word("a abc ab", 10.0, false);
        assert!((w - 15.0).abs() < 0.01);
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut mgr = FontManager::new();
        assert!(mgr.load_font(vec![0, 1, 2, 3]).is_err());
        assert!(mgr.font_bytes().is_none());
    }
}
