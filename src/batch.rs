//! Batch splitting – bounds memory when detail sections embed images.
//!
//! Only exports that write detail sections *and* embed attachments for more
//! work packages than one batch holds are split; everything else renders in
//! a single pass. Batches are processed strictly one after another and the
//! only value carried from one batch to the next is the [`PageAccumulator`].

use std::io::Write;
use std::ops::Range;
use std::path::Path;

use tempfile::TempPath;

use crate::error::Result;
use crate::model::ExportOptions;

/// Progress of the batch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// One render pass over all work packages.
    NotBatched,
    /// Rendering batch `iteration` (1-indexed).
    Batched { iteration: usize },
    Done,
}

impl BatchState {
    pub fn advance(self, plan: &BatchPlan) -> BatchState {
        match self {
            BatchState::NotBatched => BatchState::Done,
            BatchState::Batched { iteration } if iteration < plan.batch_count() => {
                BatchState::Batched {
                    iteration: iteration + 1,
                }
            }
            BatchState::Batched { .. } | BatchState::Done => BatchState::Done,
        }
    }
}

/// How the work packages of one export are split into render passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    total: usize,
    batch_size: usize,
    batched: bool,
}

/// One render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    /// 1-indexed.
    pub index: usize,
    /// Positions of this pass's work packages in the full result.
    pub range: Range<usize>,
}

impl BatchJob {
    /// The first pass also carries the title and overview table.
    pub fn is_first(&self) -> bool {
        self.index == 1
    }
}

impl BatchPlan {
    pub fn new(total: usize, batch_size: usize, options: &ExportOptions) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            total,
            batch_size,
            batched: Self::should_batch(options, total, batch_size),
        }
    }

    /// Embedded images are what makes memory grow with the number of work
    /// packages, so only that combination is split.
    pub fn should_batch(options: &ExportOptions, total: usize, batch_size: usize) -> bool {
        options.with_descriptions && options.with_attachments && total > batch_size
    }

    pub fn is_batched(&self) -> bool {
        self.batched
    }

    /// Number of render passes.
    pub fn batch_count(&self) -> usize {
        if self.batched {
            self.total.div_ceil(self.batch_size)
        } else {
            1
        }
    }

    pub fn initial_state(&self) -> BatchState {
        if self.batched {
            BatchState::Batched { iteration: 1 }
        } else {
            BatchState::NotBatched
        }
    }

    /// The pass for `state`, or `None` once done.
    pub fn job(&self, state: BatchState) -> Option<BatchJob> {
        match state {
            BatchState::NotBatched => Some(BatchJob {
                index: 1,
                range: 0..self.total,
            }),
            BatchState::Batched { iteration } => {
                let start = (iteration - 1) * self.batch_size;
                let end = (start + self.batch_size).min(self.total);
                Some(BatchJob {
                    index: iteration,
                    range: start..end,
                })
            }
            BatchState::Done => None,
        }
    }

    /// All passes in order.
    pub fn jobs(&self) -> impl Iterator<Item = BatchJob> + '_ {
        let mut state = self.initial_state();
        std::iter::from_fn(move || {
            let job = self.job(state)?;
            state = state.advance(self);
            Some(job)
        })
    }
}

/// Pages rendered so far; footers of the next batch continue after them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageAccumulator {
    pub page_count: usize,
    pub batches: usize,
}

impl PageAccumulator {
    pub fn record(self, pages: usize) -> Self {
        Self {
            page_count: self.page_count + pages,
            batches: self.batches + 1,
        }
    }
}

/// A rendered batch on disk. The file is removed when this value is dropped.
#[derive(Debug)]
pub struct IntermediateFile {
    path: TempPath,
    page_count: usize,
}

impl IntermediateFile {
    /// Write rendered bytes into a new temporary file in `dir`.
    pub fn write(bytes: &[u8], page_count: usize, dir: &Path, prefix: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".pdf")
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self {
            path: file.into_temp_path(),
            page_count,
        })
    }

    pub fn from_temp_path(path: TempPath, page_count: usize) -> Self {
        Self { path, page_count }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn into_temp_path(self) -> TempPath {
        self.path
    }
}

/// Drive the render passes of `plan` one after another.
///
/// `render` receives the accumulator of all earlier passes and returns the
/// rendered file together with the updated accumulator. The first error
/// aborts the loop; files rendered so far are dropped and thereby deleted.
pub fn run_batches<F>(
    plan: &BatchPlan,
    mut render: F,
) -> Result<(Vec<IntermediateFile>, PageAccumulator)>
where
    F: FnMut(&BatchJob, PageAccumulator) -> Result<(IntermediateFile, PageAccumulator)>,
{
    let mut files = Vec::with_capacity(plan.batch_count());
    let mut acc = PageAccumulator::default();
    let mut state = plan.initial_state();

    while let Some(job) = plan.job(state) {
        log::debug!(
            "Rendering batch {}/{} (work packages {}..{})",
            job.index,
            plan.batch_count(),
            job.range.start,
            job.range.end
        );
        let (file, next) = render(&job, acc)?;
        files.push(file);
        acc = next;
        state = state.advance(plan);
    }
    Ok((files, acc))
}
