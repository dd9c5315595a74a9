//! # aadd
//!
//! Annotates SAM alignments with the genes they cover.
//!
//! Gene annotations live in a pair of files inside an index directory:
//!
//! - `aadd.idx` maps every reference id to the offset of its gene block
//! - `aadd.dbx` holds one block of `(start, end, gene)` intervals per reference
//!
//! The index is read eagerly into an [`IndexCatalog`]. Database blocks are read through a
//! lazily paged [`PagedByteStore`] and turned into [`IntervalTree`]s only when a reference
//! is first seen in the alignment stream.
//!
//! ## Example
//!
//! ```no_run
//! use aadd::{AnnotationDatabase, Annotator, IndexCatalog};
//!
//! let catalog = IndexCatalog::open("index/aadd.idx")?;
//! let database = AnnotationDatabase::open("index/aadd.dbx")?;
//!
//! let mut annotator = Annotator::new(&catalog, &database);
//! let stats = annotator.annotate_file("reads.sam.gz", "reads.annotated.sam")?;
//! println!("{stats}");
//! # Ok::<(), aadd::Error>(())
//! ```

pub mod bytes;
pub mod catalog;
pub mod cigar;
pub mod database;
pub mod error;
pub mod gene;
pub mod interval;
pub mod pipeline;
pub mod run;
pub mod write;

pub use bytes::{ByteCursor, ByteGetter, MappedByteStore, PagedByteStore};
pub use catalog::{IndexCatalog, Lookup, ReferenceEntry};
pub use database::{AnnotationDatabase, GeneTree};
pub use error::{Error, Result};
pub use gene::GeneItem;
pub use interval::{Interval, IntervalTree};
pub use pipeline::{AnnotationStats, Annotator, AnnotatorConfig};
pub use run::{AnnotationRun, plan_outputs};
pub use write::AnnotationWriter;

/// Magic number opening every index file
pub const INDEX_MAGIC: &[u8; 12] = b"AAddIdxV0.1.";
/// Magic number opening every database file
pub const DATABASE_MAGIC: &[u8; 12] = b"AAddDbxV0.1.";

pub const INDEX_FILE_NAME: &str = "aadd.idx";
pub const DATABASE_FILE_NAME: &str = "aadd.dbx";

/// Pages of 1 MiB
pub const DEFAULT_PAGE_BITS: u32 = 20;

/// Minimum overlap fraction for a gene to be reported
pub const DEFAULT_MIN_OVERLAP: f64 = 0.9;
