//! Writer for the index (`aadd.idx`) and database (`aadd.dbx`) file pair
//!
//! The database is streamed as references are added; the index needs the total entry
//! count up front and is therefore written on [`AnnotationWriter::finish`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::Result;
use crate::gene::GeneItem;
use crate::interval::Interval;
use crate::{DATABASE_FILE_NAME, DATABASE_MAGIC, INDEX_FILE_NAME, INDEX_MAGIC};

/// Writes an `i32` length-prefixed UTF-8 string in big-endian format
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    writer.write_i32::<BigEndian>(value.len() as i32)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// Builds an annotation index and its database
pub struct AnnotationWriter<I: Write, D: Write> {
    index: I,
    database: D,

    /// Number of bytes written to the database so far
    offset: u64,

    /// Reference ids and their database offsets (0 = no annotations)
    entries: Vec<(String, u64)>,
}
impl AnnotationWriter<BufWriter<File>, BufWriter<File>> {
    /// Creates `aadd.idx` and `aadd.dbx` inside `dir`
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let index = BufWriter::new(File::create(dir.join(INDEX_FILE_NAME))?);
        let database = BufWriter::new(File::create(dir.join(DATABASE_FILE_NAME))?);
        Self::new(index, database)
    }
}
impl<I: Write, D: Write> AnnotationWriter<I, D> {
    pub fn new(index: I, mut database: D) -> Result<Self> {
        database.write_all(DATABASE_MAGIC)?;
        Ok(Self {
            index,
            database,
            offset: DATABASE_MAGIC.len() as u64,
            entries: Vec::new(),
        })
    }

    /// Number of references added so far
    #[must_use]
    pub fn num_references(&self) -> usize {
        self.entries.len()
    }

    /// Adds a reference and its annotated intervals
    ///
    /// A reference without intervals is recorded with offset 0 and takes no space in the
    /// database.
    pub fn add_reference(&mut self, id: &str, intervals: &[Interval<GeneItem>]) -> Result<()> {
        if intervals.is_empty() {
            self.entries.push((id.to_string(), 0));
            return Ok(());
        }

        let mut buf = Vec::new();
        buf.write_i32::<BigEndian>(intervals.len() as i32)?;
        for interval in intervals {
            buf.write_i32::<BigEndian>(interval.start())?;
            buf.write_i32::<BigEndian>(interval.end())?;
            interval.data().write_bytes(&mut buf)?;
        }
        self.database.write_all(&buf)?;

        self.entries.push((id.to_string(), self.offset));
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Writes the index, flushes both outputs and returns them
    pub fn finish(mut self) -> Result<(I, D)> {
        self.index.write_all(INDEX_MAGIC)?;
        self.index.write_i32::<BigEndian>(self.entries.len() as i32)?;
        for (id, offset) in &self.entries {
            write_string(&mut self.index, id)?;
            self.index.write_i64::<BigEndian>(*offset as i64)?;
        }
        self.index.flush()?;
        self.database.flush()?;
        log::debug!(
            "Wrote {} index entries and {} database bytes",
            self.entries.len(),
            self.offset
        );
        Ok((self.index, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gene(reverse: bool, id: &str) -> GeneItem {
        GeneItem::new(reverse, vec![id.to_string()])
    }

    #[test]
    fn test_write_string() -> Result<()> {
        let mut buf = Vec::new();
        write_string(&mut buf, "chr1")?;
        assert_eq!(buf, [0, 0, 0, 4, b'c', b'h', b'r', b'1']);
        Ok(())
    }

    #[test]
    fn test_empty_writer() -> Result<()> {
        let writer = AnnotationWriter::new(Vec::new(), Vec::new())?;
        let (index, database) = writer.finish()?;
        assert_eq!(&index[..INDEX_MAGIC.len()], INDEX_MAGIC);
        assert_eq!(&index[INDEX_MAGIC.len()..], &0i32.to_be_bytes());
        assert_eq!(database, DATABASE_MAGIC);
        Ok(())
    }

    #[test]
    fn test_offsets() -> Result<()> {
        let mut writer = AnnotationWriter::new(Vec::new(), Vec::new())?;
        writer.add_reference("empty", &[])?;
        writer.add_reference("ref1", &[Interval::new(10, 20, gene(false, "P1"))])?;
        writer.add_reference(
            "ref2",
            &[
                Interval::new(1, 5, gene(true, "P2")),
                Interval::new(7, 9, gene(false, "P3")),
            ],
        )?;
        assert_eq!(writer.num_references(), 3);

        let entries = writer.entries.clone();
        assert_eq!(entries[0], ("empty".to_string(), 0));
        assert_eq!(entries[1].1, DATABASE_MAGIC.len() as u64);
        // count + (start, end) + strand + id count + (len, "P1")
        let block1 = 4 + 8 + 1 + 4 + 4 + 2;
        assert_eq!(entries[2].1, entries[1].1 + block1);

        let (_, database) = writer.finish()?;
        let start = entries[2].1 as usize;
        assert_eq!(&database[start..start + 4], &2i32.to_be_bytes());
        Ok(())
    }
}
