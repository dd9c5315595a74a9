use super::ByteGetter;
use crate::error::{FormatError, Result};

/// A positioned reader over a [`ByteGetter`]
///
/// Decodes the big-endian primitives used by the index and database files. Running off
/// the end of the source is reported as [`FormatError::Truncated`] naming the field
/// being read.
pub struct ByteCursor<'a, G: ByteGetter + ?Sized> {
    source: &'a G,
    pos: u64,
}
impl<'a, G: ByteGetter + ?Sized> ByteCursor<'a, G> {
    pub fn new(source: &'a G) -> Self {
        Self::at(source, 0)
    }

    /// Creates a cursor positioned at `pos`
    pub fn at(source: &'a G, pos: u64) -> Self {
        Self { source, pos }
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Bytes left between the cursor and the end of the source
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.source.limit().saturating_sub(self.pos)
    }

    /// Capacity to reserve for `count` records of at least `min_size` bytes each
    ///
    /// Bounded by how many such records the remaining bytes can hold.
    #[must_use]
    pub fn capacity_for(&self, count: usize, min_size: u64) -> usize {
        let fits = self.remaining() / min_size.max(1);
        count.min(usize::try_from(fits).unwrap_or(usize::MAX))
    }

    fn ensure(&self, n: u64, field: &'static str) -> Result<()> {
        if self.pos.saturating_add(n) > self.source.limit() {
            return Err(FormatError::Truncated(field).into());
        }
        Ok(())
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8> {
        self.ensure(1, field)?;
        let value = self.source.get(self.pos)?;
        self.pos += 1;
        Ok(value)
    }

    pub fn read_i32(&mut self, field: &'static str) -> Result<i32> {
        self.ensure(4, field)?;
        let value = self.source.get_int(self.pos)?;
        self.pos += 4;
        Ok(value as i32)
    }

    pub fn read_i64(&mut self, field: &'static str) -> Result<i64> {
        self.ensure(8, field)?;
        let hi = u64::from(self.source.get_int(self.pos)?);
        let lo = u64::from(self.source.get_int(self.pos + 4)?);
        self.pos += 8;
        Ok(((hi << 32) | lo) as i64)
    }

    /// Reads a non-negative `i32` count, rejecting negative values
    pub fn read_count(&mut self, field: &'static str) -> Result<usize> {
        let pos = self.pos;
        let value = self.read_i32(field)?;
        if value < 0 {
            return Err(FormatError::NegativeCount { field, value, pos }.into());
        }
        Ok(value as usize)
    }

    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>> {
        self.ensure(len as u64, field)?;
        let bytes = (0..len as u64)
            .map(|i| self.source.get(self.pos + i))
            .collect::<Result<Vec<_>>>()?;
        self.pos += len as u64;
        Ok(bytes)
    }

    /// Reads an `i32` length-prefixed UTF-8 string
    pub fn read_string(&mut self, field: &'static str) -> Result<String> {
        let len = self.read_count(field)?;
        let pos = self.pos;
        let bytes = self.read_bytes(len, field)?;
        String::from_utf8(bytes).map_err(|_| FormatError::InvalidString { field, pos }.into())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::Error;
    use crate::bytes::PagedByteStore;

    fn store_with(bytes: &[u8]) -> (NamedTempFile, PagedByteStore) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        let store = PagedByteStore::with_page_bits(file.path(), 3).unwrap();
        (file, store)
    }

    #[test]
    fn test_read_primitives() -> Result<()> {
        let mut bytes = Vec::new();
        bytes.push(1u8);
        bytes.extend_from_slice(&(-2i32).to_be_bytes());
        bytes.extend_from_slice(&0x0102_0304_0506_0708i64.to_be_bytes());
        bytes.extend_from_slice(&3i32.to_be_bytes());
        bytes.extend_from_slice(b"abc");
        let (_file, store) = store_with(&bytes);

        let mut cursor = ByteCursor::new(&store);
        assert_eq!(cursor.read_u8("flag")?, 1);
        assert_eq!(cursor.read_i32("value")?, -2);
        assert_eq!(cursor.read_i64("offset")?, 0x0102_0304_0506_0708);
        assert_eq!(cursor.read_string("name")?, "abc");
        assert_eq!(cursor.position(), bytes.len() as u64);
        Ok(())
    }

    #[test]
    fn test_capacity_bounded_by_remaining_bytes() -> Result<()> {
        let (_file, store) = store_with(&[0u8; 40]);
        let mut cursor = ByteCursor::new(&store);
        assert_eq!(cursor.remaining(), 40);
        assert_eq!(cursor.capacity_for(3, 12), 3);
        assert_eq!(cursor.capacity_for(i32::MAX as usize, 12), 3);
        cursor.read_i32("count")?;
        assert_eq!(cursor.capacity_for(usize::MAX, 4), 9);
        cursor.seek(100);
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.capacity_for(5, 1), 0);
        Ok(())
    }

    #[test]
    fn test_truncated_read() {
        let (_file, store) = store_with(&[0, 0, 1]);
        let mut cursor = ByteCursor::new(&store);
        let err = cursor.read_i32("count").unwrap_err();
        assert!(matches!(err, Error::FormatError(FormatError::Truncated("count"))));
    }

    #[test]
    fn test_negative_count() {
        let (_file, store) = store_with(&(-1i32).to_be_bytes());
        let mut cursor = ByteCursor::new(&store);
        let err = cursor.read_count("entries").unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::NegativeCount { value: -1, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut bytes = 2i32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        let (_file, store) = store_with(&bytes);
        let mut cursor = ByteCursor::new(&store);
        assert!(matches!(
            cursor.read_string("reference id"),
            Err(Error::FormatError(FormatError::InvalidString { pos: 4, .. }))
        ));
    }
}
