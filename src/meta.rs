//! Positional metadata of the exported work packages.

use crate::model::WorkPackage;

/// Display position of one work package within the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    /// Numbering path, e.g. `[3]` renders as `3.`.
    pub level_path: Vec<usize>,
    pub level: usize,
}

impl RecordMeta {
    pub fn number(&self) -> String {
        let parts: Vec<String> = self.level_path.iter().map(|n| n.to_string()).collect();
        format!("{}.", parts.join("."))
    }
}

/// Display metadata by position in the result. Built once per export so
/// that numbering continues across batches.
#[derive(Debug, Clone, Default)]
pub struct MetaMap {
    entries: Vec<RecordMeta>,
}

impl MetaMap {
    /// Number the work packages by their position in the result. A work
    /// package listed twice gets two numbers.
    pub fn build(work_packages: &[WorkPackage]) -> Self {
        let entries = (0..work_packages.len())
            .map(|index| RecordMeta {
                level_path: vec![index + 1],
                level: 0,
            })
            .collect();
        Self { entries }
    }

    /// Metadata of the work package at `position` in the full result.
    pub fn get(&self, position: usize) -> Option<&RecordMeta> {
        self.entries.get(position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
