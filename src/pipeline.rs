//! Gene annotation of SAM alignment records
//!
//! Every alignment is matched against the gene intervals of its reference. When a gene
//! covers the aligned region well enough, the reference name is extended with the gene's
//! position and protein ids:
//!
//! ```text
//! NC_000913.3 E. coli  ->  NC_000913.3|pos|190..255|ref|WP_000001 E. coli
//! ```
//!
//! Everything else about the record is left untouched.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::DEFAULT_MIN_OVERLAP;
use crate::bytes::{ByteGetter, PagedByteStore};
use crate::catalog::{IndexCatalog, Lookup};
use crate::cigar::reference_length;
use crate::database::AnnotationDatabase;
use crate::error::Result;

/// Reference name of an unmapped record
pub const UNMAPPED_REFERENCE: &str = "*";

/// Column holding the reference name (0-based)
const REFERENCE_COLUMN: usize = 2;
/// Column holding the 1-based leftmost position (0-based)
const POSITION_COLUMN: usize = 3;
/// Column holding the CIGAR string (0-based)
const CIGAR_COLUMN: usize = 5;

/// Tunables for an annotation run
#[derive(Debug, Clone, Copy)]
pub struct AnnotatorConfig {
    /// Minimum overlap fraction a gene must reach to be reported
    pub min_overlap: f64,
}
impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            min_overlap: DEFAULT_MIN_OVERLAP,
        }
    }
}

/// Counters collected while annotating
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationStats {
    /// Lines read, header lines included
    pub lines: u64,
    /// Non-header lines
    pub alignments: u64,
    /// Records whose reference name was rewritten
    pub annotated: u64,
    /// Non-empty reference trees loaded from the database
    pub references_loaded: u64,
    /// Records whose reference id is not in the index
    pub unresolved: u64,
}
impl AnnotationStats {
    pub fn merge(&mut self, other: &Self) {
        self.lines += other.lines;
        self.alignments += other.alignments;
        self.annotated += other.annotated;
        self.references_loaded += other.references_loaded;
        self.unresolved += other.unresolved;
    }
}
impl fmt::Display for AnnotationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lines: {}, Alignments: {}, Annotated: {}, Loaded refs: {}, Unresolved: {}",
            self.lines, self.alignments, self.annotated, self.references_loaded, self.unresolved
        )
    }
}

/// Annotates alignment records against an index catalog and its database
///
/// An annotator processes one stream at a time. Several annotators may share the same
/// catalog and database from different threads; reference trees are then loaded once and
/// shared between them.
pub struct Annotator<'a, G: ByteGetter = PagedByteStore> {
    catalog: &'a IndexCatalog,
    database: &'a AnnotationDatabase<G>,
    config: AnnotatorConfig,
    stats: AnnotationStats,

    /// Reusable tab positions of the current line
    tabs: Vec<usize>,
    /// Reusable integer formatting buffer
    itoa_buf: itoa::Buffer,
}
impl<'a, G: ByteGetter> Annotator<'a, G> {
    #[must_use]
    pub fn new(catalog: &'a IndexCatalog, database: &'a AnnotationDatabase<G>) -> Self {
        Self::with_config(catalog, database, AnnotatorConfig::default())
    }

    #[must_use]
    pub fn with_config(
        catalog: &'a IndexCatalog,
        database: &'a AnnotationDatabase<G>,
        config: AnnotatorConfig,
    ) -> Self {
        Self {
            catalog,
            database,
            config,
            stats: AnnotationStats::default(),
            tabs: Vec::new(),
            itoa_buf: itoa::Buffer::new(),
        }
    }

    /// Counters accumulated over everything this annotator has processed
    #[must_use]
    pub fn stats(&self) -> AnnotationStats {
        self.stats
    }

    /// Annotates a single line (without its line terminator) and writes it, newline
    /// terminated, to `writer`
    ///
    /// Only the reference, position and CIGAR columns need to be UTF-8; all other bytes
    /// are copied through as they are.
    pub fn annotate_line<W: Write>(&mut self, line: &[u8], writer: &mut W) -> Result<()> {
        self.stats.lines += 1;
        if !line.starts_with(b"@") {
            self.stats.alignments += 1;
            if let Some((range, reference)) = self.annotate_reference(line)? {
                writer.write_all(&line[..range.start])?;
                writer.write_all(reference.as_bytes())?;
                writer.write_all(&line[range.end..])?;
                writer.write_all(b"\n")?;
                self.stats.annotated += 1;
                return Ok(());
            }
        }
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Annotates every line of `reader` into `writer`
    ///
    /// Returns the accumulated counters of this annotator.
    pub fn annotate_stream<R: BufRead, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<AnnotationStats> {
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            while let Some(b'\n' | b'\r') = line.last() {
                line.pop();
            }
            self.annotate_line(&line, &mut writer)?;
        }
        writer.flush()?;
        Ok(self.stats)
    }

    /// Annotates `input` into `output`
    ///
    /// The input may be compressed in any format recognized by `niffler`. The output is
    /// gzip-compressed when its name ends with `.gz`.
    pub fn annotate_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input: P,
        output: Q,
    ) -> Result<AnnotationStats> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let (reader, _format) = niffler::from_path(input)?;
        let reader = BufReader::new(reader);

        log::info!("Writing file: {}", output.display());
        let handle = BufWriter::new(File::create(output)?);
        if is_gzip_path(output) {
            let mut encoder = GzEncoder::new(handle, Compression::default());
            self.annotate_stream(reader, &mut encoder)?;
            encoder.finish()?.flush()?;
        } else {
            self.annotate_stream(reader, handle)?;
        }
        Ok(self.stats)
    }

    /// Returns the byte range of the reference column and its annotated replacement, or
    /// `None` if the record is to be left as is
    fn annotate_reference(&mut self, line: &[u8]) -> Result<Option<(Range<usize>, String)>> {
        self.tabs.clear();
        self.tabs.extend(memchr::memchr_iter(b'\t', line).take(CIGAR_COLUMN + 1));
        if self.tabs.len() < CIGAR_COLUMN {
            return Ok(None);
        }
        let column = |i: usize| -> Range<usize> {
            let start = if i == 0 { 0 } else { self.tabs[i - 1] + 1 };
            let end = self.tabs.get(i).copied().unwrap_or(line.len());
            start..end
        };
        let ref_range = column(REFERENCE_COLUMN);
        let pos_range = column(POSITION_COLUMN);
        let cigar_range = column(CIGAR_COLUMN);

        let Ok(reference) = std::str::from_utf8(&line[ref_range.clone()]) else {
            return Ok(None);
        };
        if reference == UNMAPPED_REFERENCE {
            return Ok(None);
        }

        let base_id = base_reference_id(reference);
        let tree = match self.catalog.resolve(base_id, self.database)? {
            Lookup::Miss => {
                log::debug!("Ref not found: {base_id}");
                self.stats.unresolved += 1;
                return Ok(None);
            }
            Lookup::Loaded(tree) => {
                if !tree.is_empty() {
                    self.stats.references_loaded += 1;
                }
                tree
            }
            Lookup::Cached(tree) => tree,
        };
        if tree.is_empty() {
            return Ok(None);
        }

        let Some(start) = std::str::from_utf8(&line[pos_range])
            .ok()
            .and_then(|pos| pos.parse::<i32>().ok())
        else {
            return Ok(None);
        };
        let ref_len = reference_length(&line[cigar_range]);
        if ref_len == 0 {
            return Ok(None);
        }
        let Some(end) = i64::try_from(ref_len)
            .ok()
            .and_then(|len| i64::from(start).checked_add(len - 1))
            .and_then(|end| i32::try_from(end).ok())
        else {
            return Ok(None);
        };

        let Some(hit) = tree.best_overlap(start, end, self.config.min_overlap) else {
            return Ok(None);
        };

        let (first, remainder) = match reference.find(' ') {
            Some(pos) => reference.split_at(pos),
            None => (reference, ""),
        };
        let gene = hit.data();
        let (from, to) = if gene.is_reverse() {
            (hit.end(), hit.start())
        } else {
            (hit.start(), hit.end())
        };

        let mut annotated = String::with_capacity(reference.len() + 48);
        annotated.push_str(first);
        annotated.push_str(if first.ends_with('|') { "pos|" } else { "|pos|" });
        annotated.push_str(self.itoa_buf.format(from));
        annotated.push_str("..");
        annotated.push_str(self.itoa_buf.format(to));
        annotated.push_str("|ref|");
        annotated.push_str(&gene.protein_label());
        annotated.push_str(remainder);

        Ok(Some((ref_range, annotated)))
    }
}

/// Strips a trailing `.`-suffix (such as a version) from a reference name
///
/// A leading `.` is not treated as a suffix separator.
#[must_use]
pub fn base_reference_id(reference: &str) -> &str {
    match reference.find('.') {
        Some(pos) if pos > 0 => &reference[..pos],
        _ => reference,
    }
}

pub(crate) fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}
