//! Pipeline – ties together page setup, content writing, batching,
//! rendering and merging into a single export call.

use std::fs;
use std::path::Path;

use tempfile::TempPath;

use crate::batch::{run_batches, BatchJob, BatchPlan, IntermediateFile, PageAccumulator};
use crate::canvas::{Canvas, PageSetup};
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportFailure, Result};
use crate::fonts::FontManager;
use crate::i18n::Label;
use crate::layout_config::DocumentLayout;
use crate::merge::merge_batches;
use crate::meta::MetaMap;
use crate::model::{ExportContext, ExportOptions, WorkPackageQuery};
use crate::render::{render_document, PageDecorations};
use crate::writer::attachments::ResizedImageCache;
use crate::writer::ContentWriter;

/// The finished document. The file is removed when this value is dropped
/// unless it has been persisted.
#[derive(Debug)]
pub struct ExportFile {
    path: TempPath,
    page_count: usize,
    filename: String,
}

impl ExportFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Suggested download name, e.g. `Demo - Sample.pdf`.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Keep the file at `dest`. Falls back to copying when `dest` is on
    /// another filesystem.
    pub fn persist(self, dest: &Path) -> std::io::Result<()> {
        match self.path.persist(dest) {
            Ok(()) => Ok(()),
            Err(e) => {
                fs::copy(&e.path, dest)?;
                Ok(())
            }
        }
    }

    pub fn into_temp_path(self) -> TempPath {
        self.path
    }
}

/// Exports the results of a work package query as one PDF.
pub struct WorkPackageListExport<'q, Q: WorkPackageQuery + ?Sized> {
    query: &'q Q,
    options: ExportOptions,
    context: ExportContext,
    config: ExportConfig,
    fonts: Option<FontManager>,
}

impl<'q, Q: WorkPackageQuery + ?Sized> WorkPackageListExport<'q, Q> {
    pub fn new(
        query: &'q Q,
        options: ExportOptions,
        context: ExportContext,
        config: ExportConfig,
    ) -> Self {
        Self {
            query,
            options,
            context,
            config,
            fonts: None,
        }
    }

    /// Use already loaded fonts instead of `config.font_path`.
    pub fn with_fonts(mut self, fonts: FontManager) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// `"<project> - <query name>"`; unsaved queries use the localized
    /// plural label.
    pub fn heading(&self) -> String {
        let title = match self.query.name() {
            Some(name) => name.to_string(),
            None => self.context.locale.t(Label::WorkPackagePlural).to_string(),
        };
        match self.query.project() {
            Some(project) => format!("{project} - {title}"),
            None => title,
        }
    }

    /// Download file name.
    pub fn title(&self) -> String {
        format!("{}.pdf", self.heading())
    }

    pub fn batch_plan(&self) -> BatchPlan {
        BatchPlan::new(
            self.query.work_packages().len(),
            self.config.batch_size,
            &self.options,
        )
    }

    /// Run the export. Every failure is reported exactly once, localized.
    pub fn export(&self) -> std::result::Result<ExportFile, ExportFailure> {
        self.render_work_packages().map_err(|e| {
            match &e {
                ExportError::LayoutOverflow { .. } => {
                    log::warn!("PDF export does not fit the page: {e}")
                }
                _ => log::error!("Failed to generate PDF export: {e}"),
            }
            ExportFailure::from_error(&e, self.context.locale)
        })
    }

    fn load_fonts(&self) -> Result<FontManager> {
        if let Some(fonts) = &self.fonts {
            return Ok(fonts.clone());
        }
        match &self.config.font_path {
            Some(path) => FontManager::from_file(path),
            None => Ok(FontManager::default()),
        }
    }

    fn render_work_packages(&self) -> Result<ExportFile> {
        self.config.validate()?;
        let fonts = self.load_fonts()?;
        let work_packages = self.query.work_packages();
        let meta = MetaMap::build(work_packages);
        let plan = self.batch_plan();
        let temp_dir = self.config.temp_dir();

        let (files, acc) = run_batches(&plan, |job, acc| {
            self.render_batch(job, acc, &meta, &fonts, &temp_dir)
        })?;
        let merged = merge_batches(files, &temp_dir, "pdf_export_")?;
        debug_assert_eq!(merged.page_count(), acc.page_count);

        log::info!(
            "Exported {} work packages in {} batch(es), {} pages",
            work_packages.len(),
            acc.batches,
            acc.page_count
        );
        Ok(ExportFile {
            page_count: merged.page_count(),
            path: merged.into_temp_path(),
            filename: self.title(),
        })
    }

    /// Lay out, render and store one batch. Resized images of the batch are
    /// removed before returning, on success and on failure.
    fn render_batch(
        &self,
        job: &BatchJob,
        acc: PageAccumulator,
        meta: &MetaMap,
        fonts: &FontManager,
        temp_dir: &Path,
    ) -> Result<(IntermediateFile, PageAccumulator)> {
        let mut cache = ResizedImageCache::new();
        let layout = self.layout_batch(job, meta, fonts, &mut cache)?;
        let rendered = render_document(&layout, &self.decorations(acc.page_count), fonts);
        let removed = cache.delete_all();
        if removed > 0 {
            log::debug!("Removed {removed} resized images of batch {}", job.index);
        }

        let pages = layout.page_count();
        let file = IntermediateFile::write(
            &rendered?,
            pages,
            temp_dir,
            &format!("pdf_batch_{}_", job.index),
        )?;
        Ok((file, acc.record(pages)))
    }

    /// Lay out one batch on a fresh canvas. The first batch also carries the
    /// title and the overview table of *all* work packages.
    pub fn layout_batch(
        &self,
        job: &BatchJob,
        meta: &MetaMap,
        fonts: &FontManager,
        cache: &mut ResizedImageCache,
    ) -> Result<DocumentLayout> {
        let all = self.query.work_packages();
        let columns = self.query.columns();
        let heading = self.heading();
        let writer = ContentWriter::new(
            fonts,
            &self.config,
            self.context.locale,
            self.options.with_attachments,
        );
        let mut canvas = Canvas::new(PageSetup::for_export(
            &self.options,
            self.context.locale,
            &self.config,
        ));
        canvas.set_title(&heading);

        if job.is_first() {
            writer.write_title(&mut canvas, &heading);
            writer.write_overview(&mut canvas, columns, all)?;
        }
        if self.options.with_descriptions {
            let batch = &all[job.range.clone()];
            writer.write_details(&mut canvas, columns, batch, job.range.start, meta, cache)?;
        }
        Ok(canvas.into_layout())
    }

    /// Layout of the first render pass, without rendering it.
    pub fn layout_first_batch(&self) -> Result<DocumentLayout> {
        let fonts = self.load_fonts()?;
        let meta = MetaMap::build(self.query.work_packages());
        let plan = self.batch_plan();
        let job = plan
            .jobs()
            .next()
            .ok_or_else(|| ExportError::Render("nothing to lay out".into()))?;
        let mut cache = ResizedImageCache::new();
        self.layout_batch(&job, &meta, &fonts, &mut cache)
    }

    fn decorations(&self, page_offset: usize) -> PageDecorations {
        let style = &self.config.style;
        PageDecorations {
            heading: self.heading(),
            user_name: self.context.user.as_ref().map(|u| u.full_name()),
            date: self.context.locale.format_date(self.context.today),
            page_offset,
            logo_path: self.config.logo_path.clone(),
            logo_height: self.config.logo_height,
            page_header_top: self.config.page_header_top,
            page_footer_top: self.config.page_footer_top,
            header_size: style.header_size,
            footer_size: style.footer_size,
        }
    }
}
