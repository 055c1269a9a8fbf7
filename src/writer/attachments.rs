//! Attachment images: loading, downscaling to the layout box, and the
//! per-batch cache of resized temporary copies.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::imageops::FilterType;
use image::ImageFormat;
use tempfile::TempPath;

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::layout_config::ImageContent;
use crate::model::Attachment;

/// Read the bytes behind an image source: a base64 data URI or a path.
pub fn load_image_source(src: &str) -> Result<Vec<u8>> {
    if src.starts_with("data:") {
        parse_data_uri(src)
    } else {
        Ok(fs::read(src)?)
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
fn parse_data_uri(src: &str) -> Result<Vec<u8>> {
    let rest = &src["data:".len()..];
    let comma_pos = rest.find(',').ok_or_else(|| {
        ExportError::Image("Invalid data URI: missing `,` separator between header and data".into())
    })?;
    let header = &rest[..comma_pos];
    if !header.contains(";base64") {
        return Err(ExportError::Image(
            "Only base64-encoded data URIs are supported".into(),
        ));
    }
    let b64_data = rest[comma_pos + 1..].trim();
    BASE64_STD
        .decode(b64_data)
        .map_err(|e| ExportError::Image(format!("Base64 decode error: {e}")))
}

/// Resized image files written while laying out one batch.
///
/// Every file is removed by [`ResizedImageCache::delete_all`], or when the
/// cache is dropped on an error path.
#[derive(Default)]
pub struct ResizedImageCache {
    paths: Vec<TempPath>,
}

impl ResizedImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: TempPath) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.paths.iter().map(|p| &**p)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remove every file; returns how many were removed.
    pub fn delete_all(self) -> usize {
        let mut removed = 0;
        for path in self.paths {
            let display = path.to_path_buf();
            match path.close() {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Could not remove resized image {}: {e}", display.display()),
            }
        }
        removed
    }
}

/// Fits attachment images into the detail section layout.
pub struct AttachmentEmbedder<'a> {
    config: &'a ExportConfig,
    temp_dir: PathBuf,
}

impl<'a> AttachmentEmbedder<'a> {
    pub fn new(config: &'a ExportConfig) -> Self {
        Self {
            config,
            temp_dir: config.temp_dir(),
        }
    }

    /// Scale an image attachment into a `max_width` × `max_height` box.
    ///
    /// Returns `Ok(None)` for attachments that are not images or cannot be
    /// read or decoded; those are skipped with a warning. Images with more
    /// pixels than the box needs are downscaled into a temporary PNG that is
    /// recorded in `cache`.
    pub fn embed(
        &self,
        attachment: &Attachment,
        max_width: f32,
        max_height: f32,
        cache: &mut ResizedImageCache,
    ) -> Result<Option<ImageContent>> {
        if !attachment.is_image() {
            return Ok(None);
        }
        let bytes = match load_image_source(&attachment.source) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping attachment {}: {e}", attachment.filename);
                return Ok(None);
            }
        };
        let img = match image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Skipping attachment {}, decode error: {e}", attachment.filename);
                return Ok(None);
            }
        };
        let (px_width, px_height) = (img.width(), img.height());
        if px_width == 0 || px_height == 0 {
            return Ok(None);
        }

        // 1 px = 1 pt at 72 dpi; never upscale.
        let scale = (max_width / px_width as f32)
            .min(max_height / px_height as f32)
            .min(1.0);
        let width = px_width as f32 * scale;
        let height = px_height as f32 * scale;

        let target_w = (width * self.config.image_resample_scale).round().max(1.0) as u32;
        let target_h = (height * self.config.image_resample_scale).round().max(1.0) as u32;
        if target_w >= px_width && target_h >= px_height {
            return Ok(Some(ImageContent {
                src: attachment.source.clone(),
                width,
                height,
                px_width,
                px_height,
            }));
        }

        let resized = img.resize_exact(target_w, target_h, FilterType::Triangle);
        let mut tmp = tempfile::Builder::new()
            .prefix("resized_")
            .suffix(".png")
            .tempfile_in(&self.temp_dir)?;
        resized
            .write_to(tmp.as_file_mut(), ImageFormat::Png)
            .map_err(|e| ExportError::Image(format!("{}: {e}", attachment.filename)))?;
        let path = tmp.into_temp_path();
        let src = path.to_string_lossy().into_owned();
        cache.push(path);

        Ok(Some(ImageContent {
            src,
            width,
            height,
            px_width: target_w,
            px_height: target_h,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::solid_png_data_uri;

    fn attachment(source: String) -> Attachment {
        Attachment {
            filename: "shot.png".into(),
            content_type: "image/png".into(),
            source,
        }
    }

    fn config_in(dir: &Path) -> ExportConfig {
        ExportConfig {
            temp_dir: Some(dir.to_path_buf()),
            ..ExportConfig::default()
        }
    }

    #[test]
    fn data_uri_is_decoded() {
        let uri = solid_png_data_uri(4, 3, [255, 0, 0]).unwrap();
        let bytes = load_image_source(&uri).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn data_uri_without_base64_is_rejected() {
        assert!(load_image_source("data:image/png,abc").is_err());
        assert!(load_image_source("data:image/png;base64").is_err());
    }

    #[test]
    fn small_image_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let embedder = AttachmentEmbedder::new(&config);
        let mut cache = ResizedImageCache::new();
        let uri = solid_png_data_uri(100, 50, [0, 128, 0]).unwrap();
        let img = embedder
            .embed(&attachment(uri.clone()), 450.0, 300.0, &mut cache)
            .unwrap()
            .unwrap();
        assert_eq!((img.width, img.height), (100.0, 50.0));
        assert_eq!(img.src, uri);
        assert!(cache.is_empty());
    }

    #[test]
    fn large_image_is_resized_into_cache_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let embedder = AttachmentEmbedder::new(&config);
        let mut cache = ResizedImageCache::new();
        let uri = solid_png_data_uri(2000, 200, [0, 0, 255]).unwrap();
        let img = embedder
            .embed(&attachment(uri), 450.0, 300.0, &mut cache)
            .unwrap()
            .unwrap();
        assert!((img.width - 450.0).abs() < 0.01);
        assert!((img.height - 45.0).abs() < 0.01);
        assert_eq!((img.px_width, img.px_height), (900, 90));
        assert_eq!(cache.len(), 1);
        let resized: Vec<PathBuf> = cache.paths().map(Path::to_path_buf).collect();
        assert!(resized[0].exists());
        assert_eq!(resized[0].to_string_lossy(), img.src);

        assert_eq!(cache.delete_all(), 1);
        assert!(!resized[0].exists());
    }

    #[test]
    fn dropped_cache_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let embedder = AttachmentEmbedder::new(&config);
        let mut cache = ResizedImageCache::new();
        let uri = solid_png_data_uri(1000, 1000, [9, 9, 9]).unwrap();
        embedder
            .embed(&attachment(uri), 100.0, 100.0, &mut cache)
            .unwrap();
        let path = cache.paths().next().unwrap().to_path_buf();
        drop(cache);
        assert!(!path.exists());
    }

    #[test]
    fn non_images_and_broken_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let embedder = AttachmentEmbedder::new(&config);
        let mut cache = ResizedImageCache::new();

        let pdf = Attachment {
            filename: "manual.pdf".into(),
            content_type: "application/pdf".into(),
            source: "/nonexistent/manual.pdf".into(),
        };
        assert!(embedder.embed(&pdf, 100.0, 100.0, &mut cache).unwrap().is_none());

        let missing = attachment("/nonexistent/shot.png".into());
        assert!(embedder.embed(&missing, 100.0, 100.0, &mut cache).unwrap().is_none());

        let garbage = attachment("data:image/png;base64,AAAA".into());
        assert!(embedder.embed(&garbage, 100.0, 100.0, &mut cache).unwrap().is_none());
        assert!(cache.is_empty());
    }
}
