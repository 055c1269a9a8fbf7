//! Export configuration: page geometry, batch size, styles and resources.
//!
//! Every field has a default, so an empty JSON object (`{}`) is a valid
//! configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Number of work packages rendered per batch when batching kicks in.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Named paper sizes, dimensions in PDF points (portrait).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PageSize {
    /// 7.25 × 10.5 in.
    #[default]
    Executive,
    A4,
    Letter,
}

impl PageSize {
    /// `(width, height)` in points, portrait.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            PageSize::Executive => (522.0, 756.0),
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
        }
    }
}

/// Font sizes used by the writers and page decorations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub heading_size: f32,
    pub section_heading_size: f32,
    pub body_size: f32,
    pub table_size: f32,
    pub header_size: f32,
    pub footer_size: f32,
    pub line_height: f32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            heading_size: 14.0,
            section_heading_size: 11.0,
            body_size: 9.0,
            table_size: 8.0,
            header_size: 8.0,
            footer_size: 8.0,
            line_height: 1.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub page_size: PageSize,
    pub top_margin: f32,
    pub bottom_margin: f32,
    pub side_margin: f32,
    /// Distance of the header baseline above the content area.
    pub page_header_top: f32,
    /// Distance of the footer baseline below the content area.
    pub page_footer_top: f32,
    pub logo_height: f32,
    pub batch_size: usize,
    /// Floor for the width of an overview table column, padding excluded.
    pub min_column_width: f32,
    pub cell_padding: f32,
    /// Maximum height of an embedded image as a share of the content height.
    pub max_image_height_ratio: f32,
    /// Pixels kept per point of display size when downscaling attachments.
    pub image_resample_scale: f32,
    pub style: StyleConfig,
    pub logo_path: Option<PathBuf>,
    /// TrueType font used for measuring and rendering instead of Helvetica.
    pub font_path: Option<PathBuf>,
    /// Directory for intermediate batch files and resized images.
    pub temp_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::Executive,
            top_margin: 60.0,
            bottom_margin: 60.0,
            side_margin: 36.0,
            page_header_top: 20.0,
            page_footer_top: 30.0,
            logo_height: 20.0,
            batch_size: DEFAULT_BATCH_SIZE,
            min_column_width: 24.0,
            cell_padding: 3.0,
            max_image_height_ratio: 0.5,
            image_resample_scale: 2.0,
            style: StyleConfig::default(),
            logo_path: None,
            font_path: None,
            temp_dir: None,
        }
    }
}

impl ExportConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ExportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject values that cannot produce a document.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ExportError::Config("batch_size must be at least 1".into()));
        }
        let (w, h) = self.page_size.dimensions_pt();
        if 2.0 * self.side_margin >= w.min(h) {
            return Err(ExportError::Config(format!(
                "side_margin {} leaves no room on a {}x{} pt page",
                self.side_margin, w, h
            )));
        }
        if self.top_margin + self.bottom_margin >= w.min(h) {
            return Err(ExportError::Config(format!(
                "top/bottom margins {}+{} leave no room on a {}x{} pt page",
                self.top_margin, self.bottom_margin, w, h
            )));
        }
        if !(self.max_image_height_ratio > 0.0 && self.max_image_height_ratio <= 1.0) {
            return Err(ExportError::Config(
                "max_image_height_ratio must be within (0, 1]".into(),
            ));
        }
        if self.image_resample_scale <= 0.0 {
            return Err(ExportError::Config(
                "image_resample_scale must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Directory used for temporary files.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = ExportConfig::from_json("{}").unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.page_size, PageSize::Executive);
        assert_eq!(config.top_margin, 60.0);
        assert_eq!(config.style.heading_size, 14.0);
    }

    #[test]
    fn partial_json_overrides_fields() {
        let json = r#"{"page_size": "A4", "batch_size": 25, "style": {"body_size": 10}}"#;
        let config = ExportConfig::from_json(json).unwrap();
        assert_eq!(config.page_size, PageSize::A4);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.style.body_size, 10.0);
        assert_eq!(config.style.footer_size, 8.0);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = ExportConfig::from_json(r#"{"batch_size": 0}"#).unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
    }

    #[test]
    fn oversized_margins_are_rejected() {
        let err = ExportConfig::from_json(r#"{"side_margin": 400}"#).unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
    }
}
