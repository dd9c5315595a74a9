use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use super::{ByteGetter, check_range};
use crate::error::{ReadError, Result};

/// A memory-mapped byte source
///
/// Maps the entire file up front and leaves paging to the operating system. Useful when
/// the index comfortably fits in the address space, and as the reference the paged store
/// is checked against.
pub struct MappedByteStore {
    mmap: Mmap,
}
impl MappedByteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;

        // Safety: the file is open and won't be modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }
}

impl ByteGetter for MappedByteStore {
    fn get(&self, index: u64) -> Result<u8> {
        check_range(index, self.limit())?;
        Ok(self.mmap[index as usize])
    }

    fn get_bulk(&self, index: u64, buf: &mut [u8]) -> Result<usize> {
        if index > self.limit() {
            return Err(ReadError::OutOfRange {
                requested_index: index,
                limit: self.limit(),
            }
            .into());
        }
        let start = index as usize;
        let n = buf.len().min(self.mmap.len() - start);
        buf[..n].copy_from_slice(&self.mmap[start..start + n]);
        Ok(n)
    }

    fn limit(&self) -> u64 {
        self.mmap.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rand::{Rng, SeedableRng, rngs::SmallRng};
    use tempfile::NamedTempFile;

    use super::*;
    use crate::bytes::PagedByteStore;

    #[test]
    fn test_paged_and_mapped_agree() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        let data = (0..10_000).map(|_| rng.random::<u8>()).collect::<Vec<_>>();
        let mut file = NamedTempFile::new()?;
        file.write_all(&data)?;
        file.flush()?;

        let mapped = MappedByteStore::new(file.path())?;
        let paged = PagedByteStore::with_page_bits(file.path(), 10)?;
        assert_eq!(mapped.limit(), paged.limit());

        for _ in 0..2000 {
            let i = rng.random_range(0..data.len() as u64 - 3);
            assert_eq!(mapped.get(i)?, paged.get(i)?);
            assert_eq!(mapped.get_int(i)?, paged.get_int(i)?);
        }

        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        assert_eq!(mapped.get_bulk(9980, &mut a)?, paged.get_bulk(9980, &mut b)?);
        assert_eq!(a, b);

        paged.close();
        Ok(())
    }

    #[test]
    fn test_mapped_out_of_range() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"ACGT")?;
        file.flush()?;

        let mapped = MappedByteStore::new(file.path())?;
        assert_eq!(mapped.get(3)?, b'T');
        assert!(mapped.get(4).is_err());
        assert_eq!(mapped.get_int(0)?, u32::from_be_bytes(*b"ACGT"));
        assert!(mapped.get_int(1).is_err());
        Ok(())
    }
}
