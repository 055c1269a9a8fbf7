//! # wp-pdf-export – Batched PDF export of work package lists
//!
//! Renders the result of a work package query into one PDF document. The
//! pipeline stages are:
//!
//! 1. **Set up** – page size, orientation and margins ([`canvas`])
//! 2. **Write** – title, overview table and detail sections ([`writer`])
//! 3. **Batch** – split large exports with embedded images ([`batch`])
//! 4. **Render** – emit PDF bytes per batch via printpdf ([`render`])
//! 5. **Merge** – combine batch files into one document ([`merge`])
//!
//! [`pipeline::WorkPackageListExport`] drives all stages.

pub mod batch;
pub mod canvas;
pub mod config;
pub mod error;
pub mod fonts;
pub mod i18n;
pub mod layout_config;
pub mod merge;
pub mod meta;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod samples;
pub mod writer;

// Re-exports for convenience
pub use config::ExportConfig;
pub use error::{ExportError, ExportFailure, FailureKind};
pub use i18n::Locale;
pub use model::{ExportContext, ExportOptions, ExportRequest, QuerySnapshot, WorkPackageQuery};
pub use pipeline::{ExportFile, WorkPackageListExport};
