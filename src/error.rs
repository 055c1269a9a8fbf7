//! Error types for the export pipeline.
//!
//! [`ExportError`] is what every internal step returns. The top-level export
//! call converts it exactly once into an [`ExportFailure`], which carries a
//! localized message safe to show to the user.

use std::fmt;

use crate::i18n::{Label, Locale};

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors raised below the export entry point.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The overview table needs more horizontal space than the page offers.
    #[error(
        "{columns} columns need at least {required:.1} pt but only {available:.1} pt are available"
    )]
    LayoutOverflow {
        columns: usize,
        required: f32,
        available: f32,
    },

    /// Loading, importing or writing batch files during the merge failed.
    #[error("Merge failed: {0}")]
    Merge(String),

    /// The merged document does not contain the pages rendered by the batches.
    #[error("Merged document has {actual} pages, expected {expected}")]
    PageCountMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Attachment image could not be decoded, resized or stored.
    #[error("Image error: {0}")]
    Image(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<lopdf::Error> for ExportError {
    fn from(e: lopdf::Error) -> Self {
        ExportError::Merge(e.to_string())
    }
}

/// The kind of a failed export, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    LayoutOverflow,
    MergeFailure,
    UnexpectedFailure,
}

/// A failed export: one per export call, with a localized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ExportFailure {
    /// Classify an internal error and localize its user-facing message.
    ///
    /// Details of merge and unexpected failures are not part of the message;
    /// the caller of this function is expected to have logged them.
    pub fn from_error(error: &ExportError, locale: Locale) -> Self {
        let kind = match error {
            ExportError::LayoutOverflow { .. } => FailureKind::LayoutOverflow,
            ExportError::Merge(_) | ExportError::PageCountMismatch { .. } => {
                FailureKind::MergeFailure
            }
            _ => FailureKind::UnexpectedFailure,
        };
        let message = match kind {
            FailureKind::LayoutOverflow => locale.t(Label::ErrorTooManyColumns),
            FailureKind::MergeFailure | FailureKind::UnexpectedFailure => {
                locale.t(Label::ErrorFailedToExport)
            }
        };
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExportFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_maps_to_layout_failure() {
        let err = ExportError::LayoutOverflow {
            columns: 40,
            required: 1200.0,
            available: 684.0,
        };
        let failure = ExportFailure::from_error(&err, Locale::En);
        assert_eq!(failure.kind, FailureKind::LayoutOverflow);
        assert_eq!(failure.message, Locale::En.t(Label::ErrorTooManyColumns));
    }

    #[test]
    fn page_count_mismatch_is_a_merge_failure() {
        let err = ExportError::PageCountMismatch {
            expected: 10,
            actual: 9,
        };
        let failure = ExportFailure::from_error(&err, Locale::De);
        assert_eq!(failure.kind, FailureKind::MergeFailure);
    }

    #[test]
    fn unexpected_failure_does_not_leak_detail() {
        let err = ExportError::Render("secret/path/on/server.png".to_string());
        let failure = ExportFailure::from_error(&err, Locale::En);
        assert_eq!(failure.kind, FailureKind::UnexpectedFailure);
        assert!(!failure.message.contains("secret"));
    }
}
