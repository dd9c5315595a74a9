//! Seek-addressable database of per-reference gene intervals
//!
//! The database starts with [`DATABASE_MAGIC`]. Each annotated reference owns one block,
//! addressed by the offset stored in the index:
//!
//! ```text
//! i32 interval count
//! count x (i32 start, i32 end, gene item)
//! ```
//!
//! Blocks are only read when a reference is first looked up.

use std::path::Path;
use std::sync::Arc;

use crate::bytes::{ByteCursor, ByteGetter, PagedByteStore, verify_magic};
use crate::error::{FormatError, Result};
use crate::gene::GeneItem;
use crate::interval::{Interval, IntervalTree};
use crate::{DATABASE_MAGIC, DEFAULT_PAGE_BITS};

/// Interval tree of gene annotations for a single reference
pub type GeneTree = IntervalTree<GeneItem>;

/// Random-access reader for the annotation database
pub struct AnnotationDatabase<G: ByteGetter = PagedByteStore> {
    source: G,

    /// Canonical tree handed out for references without annotations
    empty: Arc<GeneTree>,
}
impl AnnotationDatabase<PagedByteStore> {
    /// Opens a database file through a paged store with the default page size
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_page_bits(path, DEFAULT_PAGE_BITS)
    }

    pub fn open_with_page_bits<P: AsRef<Path>>(path: P, page_bits: u32) -> Result<Self> {
        Self::from_source(PagedByteStore::with_page_bits(path, page_bits)?)
    }
}
impl<G: ByteGetter> AnnotationDatabase<G> {
    /// Wraps a byte source after checking its magic number
    pub fn from_source(source: G) -> Result<Self> {
        verify_magic(&source, DATABASE_MAGIC)?;
        Ok(Self {
            source,
            empty: Arc::new(GeneTree::new()),
        })
    }

    #[must_use]
    pub fn source(&self) -> &G {
        &self.source
    }

    /// Consumes the database and returns its byte source
    #[must_use]
    pub fn into_source(self) -> G {
        self.source
    }

    /// The shared tree used for references without annotations
    #[must_use]
    pub fn empty_tree(&self) -> Arc<GeneTree> {
        Arc::clone(&self.empty)
    }

    /// Reads the block at `offset` and builds its interval tree
    ///
    /// A block with zero intervals yields the shared empty tree.
    pub fn load_tree(&self, offset: u64) -> Result<Arc<GeneTree>> {
        let mut cursor = ByteCursor::at(&self.source, offset);
        let num_intervals = cursor.read_count("interval count")?;
        if num_intervals == 0 {
            return Ok(self.empty_tree());
        }

        // start + end + strand + id count
        let mut tree = GeneTree::with_capacity(cursor.capacity_for(num_intervals, 13));
        for _ in 0..num_intervals {
            let start = cursor.read_i32("interval start")?;
            let end = cursor.read_i32("interval end")?;
            if start > end {
                return Err(FormatError::InvalidInterval { start, end }.into());
            }
            let gene = GeneItem::read_bytes(&mut cursor)?;
            tree.insert_interval(Interval::new(start, end, gene));
        }
        Ok(Arc::new(tree))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use byteorder::{BigEndian, WriteBytesExt};
    use tempfile::NamedTempFile;

    use super::*;
    use crate::Error;
    use crate::bytes::MappedByteStore;
    use crate::write::AnnotationWriter;

    fn write_database(refs: &[(&str, Vec<Interval<GeneItem>>)]) -> (NamedTempFile, Vec<u64>) {
        let mut writer = AnnotationWriter::new(Vec::new(), Vec::new()).unwrap();
        for (id, intervals) in refs {
            writer.add_reference(id, intervals).unwrap();
        }
        let (index, database) = writer.finish().unwrap();

        // offsets follow the id strings in the index
        let store_file = temp_with(&index);
        let store = MappedByteStore::new(store_file.path()).unwrap();
        let mut cursor = ByteCursor::at(&store, crate::INDEX_MAGIC.len() as u64);
        let n = cursor.read_count("entries").unwrap();
        let offsets = (0..n)
            .map(|_| {
                cursor.read_string("id").unwrap();
                cursor.read_i64("offset").unwrap() as u64
            })
            .collect();

        (temp_with(&database), offsets)
    }

    fn temp_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn gene(reverse: bool, id: &str) -> GeneItem {
        GeneItem::new(reverse, vec![id.to_string()])
    }

    #[test]
    fn test_load_tree_round_trip() -> Result<()> {
        let intervals = vec![
            Interval::new(10, 20, gene(true, "P1")),
            Interval::new(5, 500, GeneItem::new(false, vec!["P2".into(), "P3".into()])),
            Interval::new(-4, 3, gene(false, "P4")),
        ];
        let (file, offsets) = write_database(&[("chr1", intervals.clone())]);
        let db = AnnotationDatabase::open_with_page_bits(file.path(), 4)?;

        let tree = db.load_tree(offsets[0])?;
        assert_eq!(tree.len(), 3);
        let mut expected = intervals;
        expected.sort_by_key(|iv| (iv.start(), iv.end()));
        assert_eq!(tree.iter().cloned().collect::<Vec<_>>(), expected);
        Ok(())
    }

    #[test]
    fn test_second_reference_block() -> Result<()> {
        let (file, offsets) = write_database(&[
            ("a", vec![Interval::new(1, 2, gene(false, "A"))]),
            ("b", vec![Interval::new(3, 4, gene(true, "B"))]),
        ]);
        let db = AnnotationDatabase::open(file.path())?;
        let tree = db.load_tree(offsets[1])?;
        let only = tree.iter().next().unwrap();
        assert_eq!((only.start(), only.end()), (3, 4));
        assert!(only.data().is_reverse());
        assert_eq!(only.data().protein_ids(), ["B".to_string()]);
        Ok(())
    }

    #[test]
    fn test_zero_intervals_share_empty_tree() -> Result<()> {
        let mut bytes = DATABASE_MAGIC.to_vec();
        bytes.write_i32::<BigEndian>(0)?;
        bytes.write_i32::<BigEndian>(0)?;
        let file = temp_with(&bytes);
        let db = AnnotationDatabase::open(file.path())?;

        let first = db.load_tree(DATABASE_MAGIC.len() as u64)?;
        let second = db.load_tree(DATABASE_MAGIC.len() as u64 + 4)?;
        assert!(first.is_empty());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &db.empty_tree()));
        Ok(())
    }

    #[test]
    fn test_wrong_magic() {
        let file = temp_with(b"AAddIdxV0.1.\0\0\0\0");
        let err = AnnotationDatabase::open(file.path()).err().unwrap();
        assert!(err.requires_reindex());
        assert!(format!("{err}").contains("AAddDbxV0.1."));
    }

    #[test]
    fn test_inverted_interval_rejected() -> Result<()> {
        let mut bytes = DATABASE_MAGIC.to_vec();
        bytes.write_i32::<BigEndian>(1)?;
        bytes.write_i32::<BigEndian>(20)?;
        bytes.write_i32::<BigEndian>(10)?;
        GeneItem::default().write_bytes(&mut bytes)?;
        let file = temp_with(&bytes);
        let db = AnnotationDatabase::open(file.path())?;
        assert!(matches!(
            db.load_tree(DATABASE_MAGIC.len() as u64),
            Err(Error::FormatError(FormatError::InvalidInterval { start: 20, end: 10 }))
        ));
        Ok(())
    }

    #[test]
    fn test_oversized_interval_count_is_truncated() -> Result<()> {
        let mut bytes = DATABASE_MAGIC.to_vec();
        bytes.write_i32::<BigEndian>(i32::MAX)?;
        bytes.write_i32::<BigEndian>(1)?;
        bytes.write_i32::<BigEndian>(2)?;
        GeneItem::default().write_bytes(&mut bytes)?;
        let file = temp_with(&bytes);
        let db = AnnotationDatabase::open(file.path())?;
        assert!(matches!(
            db.load_tree(DATABASE_MAGIC.len() as u64),
            Err(Error::FormatError(FormatError::Truncated("interval start")))
        ));
        Ok(())
    }

    #[test]
    fn test_offset_past_end_is_truncated() -> Result<()> {
        let file = temp_with(DATABASE_MAGIC);
        let db = AnnotationDatabase::from_source(MappedByteStore::new(file.path())?)?;
        assert!(matches!(
            db.load_tree(1000),
            Err(Error::FormatError(FormatError::Truncated("interval count")))
        ));
        Ok(())
    }
}
