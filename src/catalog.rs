//! In-memory catalog of the annotation index
//!
//! The index file maps every reference id to the offset of its block in the database:
//!
//! ```text
//! INDEX_MAGIC
//! i32 entry count
//! count x (i32 length-prefixed reference id, i64 database offset)
//! ```
//!
//! Offset 0 means the reference has no annotations. Trees are resolved lazily, once per
//! entry, and cached for the lifetime of the catalog.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::INDEX_MAGIC;
use crate::bytes::{ByteCursor, ByteGetter, PagedByteStore, verify_magic};
use crate::database::{AnnotationDatabase, GeneTree};
use crate::error::{FormatError, Result};

/// A reference id's database offset and its lazily resolved tree
///
/// The tree slot starts unresolved and is filled exactly once. Concurrent first lookups
/// of the same entry block on that entry only while one of them loads the tree; once
/// resolved, reads take no lock.
#[derive(Debug)]
pub struct ReferenceEntry {
    offset: u64,
    tree: OnceCell<Arc<GeneTree>>,
}
impl ReferenceEntry {
    fn new(offset: u64) -> Self {
        Self {
            offset,
            tree: OnceCell::new(),
        }
    }

    /// Database offset of the reference's block, 0 if it has no annotations
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn has_annotations(&self) -> bool {
        self.offset != 0
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.tree.get().is_some()
    }

    /// The cached tree, if already resolved
    #[must_use]
    pub fn tree(&self) -> Option<&Arc<GeneTree>> {
        self.tree.get()
    }
}

/// Outcome of resolving a reference id against the catalog
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The id is not in the index
    Miss,
    /// The tree had already been resolved
    Cached(Arc<GeneTree>),
    /// This lookup resolved the tree
    Loaded(Arc<GeneTree>),
}
impl Lookup {
    /// The resolved tree, `None` on a miss
    #[must_use]
    pub fn tree(&self) -> Option<&Arc<GeneTree>> {
        match self {
            Self::Miss => None,
            Self::Cached(tree) | Self::Loaded(tree) => Some(tree),
        }
    }
}

/// Table of reference id to [`ReferenceEntry`], loaded once per run
#[derive(Debug, Default)]
pub struct IndexCatalog {
    entries: HashMap<String, ReferenceEntry>,
}
impl IndexCatalog {
    /// Reads and validates an index file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::info!("Reading file: {}", path.as_ref().display());
        let store = PagedByteStore::new(path)?;
        let catalog = Self::from_source(&store)?;
        store.close();
        log::info!("Index entries: {}", catalog.len());
        Ok(catalog)
    }

    /// Parses a catalog from any byte source
    ///
    /// The magic number is verified before any entry is read.
    pub fn from_source<G: ByteGetter + ?Sized>(source: &G) -> Result<Self> {
        verify_magic(source, INDEX_MAGIC)?;

        let mut cursor = ByteCursor::at(source, INDEX_MAGIC.len() as u64);
        let num_entries = cursor.read_count("entry count")?;

        // id length prefix + offset
        let mut entries = HashMap::with_capacity(cursor.capacity_for(num_entries, 12));
        for _ in 0..num_entries {
            let id = cursor.read_string("reference id")?;
            let offset = cursor.read_i64("database offset")?;
            if offset < 0 {
                return Err(FormatError::NegativeOffset { id, offset }.into());
            }
            if let Some(previous) = entries.insert(id, ReferenceEntry::new(offset as u64)) {
                log::warn!(
                    "Duplicate reference id in index; replacing offset {}",
                    previous.offset
                );
            }
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ReferenceEntry> {
        self.entries.get(id)
    }

    /// Number of entries whose tree has been resolved
    #[must_use]
    pub fn num_resolved(&self) -> usize {
        self.entries.values().filter(|e| e.is_resolved()).count()
    }

    /// Resolves the tree for `id`, loading it from `database` on first use
    ///
    /// Unknown ids are a [`Lookup::Miss`], never an error. Entries with offset 0 resolve to
    /// the database's shared empty tree without reading it.
    pub fn resolve<G: ByteGetter>(
        &self,
        id: &str,
        database: &AnnotationDatabase<G>,
    ) -> Result<Lookup> {
        let Some(entry) = self.entries.get(id) else {
            return Ok(Lookup::Miss);
        };
        if let Some(tree) = entry.tree.get() {
            return Ok(Lookup::Cached(Arc::clone(tree)));
        }

        let mut loaded = false;
        let tree = entry.tree.get_or_try_init(|| {
            loaded = true;
            if entry.has_annotations() {
                database.load_tree(entry.offset)
            } else {
                Ok(database.empty_tree())
            }
        })?;

        if loaded {
            Ok(Lookup::Loaded(Arc::clone(tree)))
        } else {
            Ok(Lookup::Cached(Arc::clone(tree)))
        }
    }
}
