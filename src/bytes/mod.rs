//! Random-access byte sources
//!
//! This module provides two interchangeable ways of reading arbitrary bytes out of
//! very large, immutable files:
//! 1. [`PagedByteStore`] lazily reads fixed-size pages on first touch and keeps them resident
//! 2. [`MappedByteStore`] memory-maps the whole file
//!
//! Both implement [`ByteGetter`], so the database reader does not care which one it is
//! handed.

mod cursor;
mod mapped;
mod paged;

pub use cursor::ByteCursor;
pub use mapped::MappedByteStore;
pub use paged::PagedByteStore;

use auto_impl::auto_impl;

use crate::error::{FormatError, ReadError, Result};

/// Read-only, random-access view of a byte range `[0, limit)`
#[auto_impl(&, Box, Arc)]
pub trait ByteGetter {
    /// Returns the byte at `index`
    ///
    /// Fails with [`ReadError::OutOfRange`] if `index` is not below [`ByteGetter::limit`].
    fn get(&self, index: u64) -> Result<u8>;

    /// Reads `buf.len()` bytes starting at `index` without going through any cache
    ///
    /// Returns the number of bytes read, which is only smaller than `buf.len()` when the
    /// end of the source is reached.
    fn get_bulk(&self, index: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total number of addressable bytes
    fn limit(&self) -> u64;

    /// Big-endian unsigned integer over the four bytes starting at `index`
    fn get_int(&self, index: u64) -> Result<u32> {
        Ok((u32::from(self.get(index)?) << 24)
            | (u32::from(self.get(index + 1)?) << 16)
            | (u32::from(self.get(index + 2)?) << 8)
            | u32::from(self.get(index + 3)?))
    }
}

pub(crate) fn check_range(index: u64, limit: u64) -> Result<()> {
    if index >= limit {
        return Err(ReadError::OutOfRange {
            requested_index: index,
            limit,
        }
        .into());
    }
    Ok(())
}

/// Checks that the source starts with `expected`
///
/// The magic bytes are read with a single bulk read. A short file is reported with
/// whatever bytes it did contain.
pub fn verify_magic<G: ByteGetter + ?Sized>(source: &G, expected: &'static [u8]) -> Result<()> {
    let mut found = vec![0u8; expected.len()];
    let n = source.get_bulk(0, &mut found)?;
    found.truncate(n);
    if found != expected {
        return Err(FormatError::InvalidMagicNumber { expected, found }.into());
    }
    Ok(())
}
