//! Multi-file annotation runs against a single index directory

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::thread;

use crate::bytes::PagedByteStore;
use crate::catalog::IndexCatalog;
use crate::database::AnnotationDatabase;
use crate::error::{Result, UsageError};
use crate::pipeline::{AnnotationStats, Annotator, AnnotatorConfig};
use crate::{DATABASE_FILE_NAME, DEFAULT_PAGE_BITS, INDEX_FILE_NAME};

/// Extension appended to input names when writing into an output directory
pub const OUTPUT_EXTENSION: &str = "out";

/// Pairs every input with its output path
///
/// A single output that is an existing directory receives one `<input-name>.out` file per
/// input. Otherwise there must be exactly one output per input. An output may never
/// point at its own input.
pub fn plan_outputs(inputs: &[PathBuf], outputs: &[PathBuf]) -> Result<Vec<(PathBuf, PathBuf)>> {
    let outputs = match outputs {
        [dir] if dir.is_dir() => inputs
            .iter()
            .map(|input| {
                let mut name = input
                    .file_name()
                    .map_or_else(OsString::new, ToOwned::to_owned);
                name.push(".");
                name.push(OUTPUT_EXTENSION);
                dir.join(name)
            })
            .collect(),
        _ if outputs.len() != inputs.len() => {
            return Err(UsageError::OutputCountMismatch {
                inputs: inputs.len(),
                outputs: outputs.len(),
            }
            .into());
        }
        _ => outputs.to_vec(),
    };

    let jobs = inputs.iter().cloned().zip(outputs).collect::<Vec<_>>();
    for (input, output) in &jobs {
        if same_path(input, output) {
            return Err(UsageError::InputEqualsOutput(input.display().to_string()).into());
        }
    }
    Ok(jobs)
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Locates the index and database files inside `dir`
pub fn index_paths<P: AsRef<Path>>(dir: P) -> Result<(PathBuf, PathBuf)> {
    let dir = dir.as_ref();
    let index = dir.join(INDEX_FILE_NAME);
    let database = dir.join(DATABASE_FILE_NAME);
    for path in [&index, &database] {
        if !path.is_file() {
            return Err(UsageError::MissingIndexFile(path.display().to_string()).into());
        }
    }
    Ok((index, database))
}

/// An opened index directory that annotates files in parallel
///
/// All workers share the same catalog and database, so each reference tree is read at
/// most once per run.
pub struct AnnotationRun {
    catalog: IndexCatalog,
    database: AnnotationDatabase<PagedByteStore>,
    config: AnnotatorConfig,
    num_threads: usize,
}
impl AnnotationRun {
    /// Opens the index directory with the default page size
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_with_page_bits(dir, DEFAULT_PAGE_BITS)
    }

    pub fn open_with_page_bits<P: AsRef<Path>>(dir: P, page_bits: u32) -> Result<Self> {
        let (index, database) = index_paths(dir)?;
        let catalog = IndexCatalog::open(index)?;
        log::info!("Opening file: {}", database.display());
        let database = AnnotationDatabase::open_with_page_bits(database, page_bits)?;
        Ok(Self {
            catalog,
            database,
            config: AnnotatorConfig::default(),
            num_threads: 0,
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: AnnotatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of worker threads (0 = all available cores)
    #[must_use]
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &IndexCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn database(&self) -> &AnnotationDatabase<PagedByteStore> {
        &self.database
    }

    fn effective_threads(&self, num_jobs: usize) -> usize {
        let num_threads = if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads.min(num_cpus::get())
        };
        num_threads.min(num_jobs).max(1)
    }

    /// Annotates every `(input, output)` pair and returns the combined counters
    ///
    /// Jobs are split into contiguous chunks, one per worker. The first failing job
    /// aborts its worker and is returned once all workers have finished.
    pub fn run(&self, jobs: &[(PathBuf, PathBuf)]) -> Result<AnnotationStats> {
        if jobs.is_empty() {
            return Ok(AnnotationStats::default());
        }
        let num_threads = self.effective_threads(jobs.len());
        let jobs_per_thread = jobs.len().div_ceil(num_threads);
        log::debug!("Annotating {} files on {num_threads} threads", jobs.len());

        let results = thread::scope(|scope| {
            let handles = jobs
                .chunks(jobs_per_thread)
                .map(|chunk| scope.spawn(move || self.run_chunk(chunk)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect::<Vec<_>>()
        });

        let mut total = AnnotationStats::default();
        for stats in results {
            total.merge(&stats?);
        }
        log::info!(
            "Resolved {} of {} references",
            self.catalog.num_resolved(),
            self.catalog.len()
        );
        Ok(total)
    }

    fn run_chunk(&self, chunk: &[(PathBuf, PathBuf)]) -> Result<AnnotationStats> {
        let mut total = AnnotationStats::default();
        for (input, output) in chunk {
            log::info!("Reading file: {}", input.display());
            let mut annotator = Annotator::with_config(&self.catalog, &self.database, self.config);
            let stats = annotator.annotate_file(input, output)?;
            log::info!("{}: {stats}", input.display());
            total.merge(&stats);
        }
        Ok(total)
    }

    /// Releases the database and reports its paging activity
    pub fn close(self) {
        self.database.into_source().close();
    }
}
