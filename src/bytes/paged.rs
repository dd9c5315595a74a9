use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::{ByteGetter, check_range};
use crate::DEFAULT_PAGE_BITS;
use crate::error::{ReadError, Result};

/// A lazily paged reader over a large immutable file
///
/// The byte space is cut into pages of `2^page_bits` bytes. A page is read in full the
/// first time any of its bytes is requested and stays resident until the store is
/// dropped, so repeated lookups into hot regions of an index never go back to disk.
///
/// The store is `Sync`: resident pages are read without locking, and materializing a
/// missing page happens under the file-handle lock with a re-check, so each page is read
/// exactly once and no reader ever observes a partially filled page.
pub struct PagedByteStore {
    path: PathBuf,
    file: Mutex<File>,
    pages: Box<[OnceCell<Box<[u8]>>]>,
    page_bits: u32,
    limit: u64,
    loaded: AtomicUsize,
}
impl PagedByteStore {
    /// Opens a paged store with the default page size (1 MiB)
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_page_bits(path, DEFAULT_PAGE_BITS)
    }

    /// Opens a paged store with pages of `2^page_bits` bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or `page_bits` is outside `[1, 30]`
    pub fn with_page_bits<P: AsRef<Path>>(path: P, page_bits: u32) -> Result<Self> {
        if !(1..=30).contains(&page_bits) {
            return Err(ReadError::InvalidPageBits(page_bits).into());
        }
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let limit = file.metadata()?.len();
        let num_pages = limit.div_ceil(1 << page_bits) as usize;
        log::debug!(
            "Opening file: {} ({} bytes, {} pages)",
            path.display(),
            limit,
            num_pages
        );

        let pages = (0..num_pages)
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            path,
            file: Mutex::new(file),
            pages,
            page_bits,
            limit,
            loaded: AtomicUsize::new(0),
        })
    }

    /// Size of a full page in bytes
    #[must_use]
    pub fn page_size(&self) -> u64 {
        1 << self.page_bits
    }

    /// Total number of pages covering the file
    #[must_use]
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Number of pages that have been materialized so far
    #[must_use]
    pub fn pages_loaded(&self) -> usize {
        self.loaded.load(Ordering::Relaxed)
    }

    /// Releases the file handle and all resident pages
    pub fn close(self) {
        log::debug!(
            "Closing file: {} ({}/{} pages)",
            self.path.display(),
            self.pages_loaded(),
            self.num_pages()
        );
    }

    fn page_index(&self, index: u64) -> usize {
        (index >> self.page_bits) as usize
    }

    fn page_pos(&self, index: u64) -> usize {
        (index - ((index >> self.page_bits) << self.page_bits)) as usize
    }

    fn page_len(&self, page: usize) -> usize {
        let start = (page as u64) << self.page_bits;
        (self.limit - start).min(self.page_size()) as usize
    }

    fn page(&self, page: usize) -> Result<&[u8]> {
        if let Some(data) = self.pages[page].get() {
            return Ok(data);
        }

        let mut file = self.file.lock();
        if let Some(data) = self.pages[page].get() {
            return Ok(data);
        }

        let mut data = vec![0u8; self.page_len(page)];
        file.seek(SeekFrom::Start((page as u64) << self.page_bits))?;
        file.read_exact(&mut data)?;
        self.loaded.fetch_add(1, Ordering::Relaxed);

        // the lock is still held, so this is the only initializer of the slot
        Ok(self.pages[page].get_or_init(|| data.into_boxed_slice()))
    }
}

impl ByteGetter for PagedByteStore {
    fn get(&self, index: u64) -> Result<u8> {
        check_range(index, self.limit)?;
        let page = self.page(self.page_index(index))?;
        Ok(page[self.page_pos(index)])
    }

    fn get_bulk(&self, index: u64, buf: &mut [u8]) -> Result<usize> {
        if index > self.limit {
            return Err(ReadError::OutOfRange {
                requested_index: index,
                limit: self.limit,
            }
            .into());
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(index))?;
        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn limit(&self) -> u64 {
        self.limit
    }
}
