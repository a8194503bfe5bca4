//! Archive-backed asset resolution
//!
//! A dataset either lives inside a zip archive (fetched from a location or
//! dropped in as an in-memory blob) or as a plain file tree under a base
//! location. `ArchiveResolver::resolve` hides the difference:
//!
//! 1. The archive at a location is opened and indexed at most once. The
//!    in-flight build itself is cached, so concurrent callers join it.
//! 2. Paths are looked up in the index; missing entries and directory
//!    entries are reported, never read.
//! 3. Only when the archive cannot be opened does the resolver fall back to
//!    fetching `location/path` directly.
//!
//! The cache is owned by whoever owns the resolver, has a capacity bound and
//! supports explicit invalidation.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::ZipArchive;

/// Upper bound on buffer space reserved from an entry's declared size
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

use crate::reader::{join_location, ByteSource, IoError};

/// Default number of archives kept indexed
pub const DEFAULT_ARCHIVE_CAPACITY: usize = 8;

/// Errors raised while resolving an asset
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("Entry '{path}' not found in {location}")]
    EntryNotFound { location: String, path: String },

    #[error("'{path}' in {location} is not a file entry (likely a directory)")]
    NotAFile { location: String, path: String },

    #[error("Failed to open archive {location}: {message}")]
    Archive { location: String, message: String },

    #[error("Failed to resolve '{path}' from {location} (archive: {archive}; direct: {direct})")]
    Unresolved {
        location: String,
        path: String,
        archive: String,
        direct: IoError,
    },
}

/// Result type for resolve operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// An archive handed over in memory (e.g. a dropped file)
pub struct ArchiveBlob {
    id: Uuid,
    name: String,
    bytes: Arc<[u8]>,
}

impl fmt::Debug for ArchiveBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveBlob")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Where a dataset's assets live
#[derive(Clone, Debug)]
pub enum DataLocation {
    /// Archive location or base directory, handed to the byte source
    Path(String),
    /// Archive bytes held in memory
    Blob(Arc<ArchiveBlob>),
}

impl DataLocation {
    pub fn path(location: impl Into<String>) -> Self {
        DataLocation::Path(location.into())
    }

    /// Wrap in-memory archive bytes; every blob gets its own identity
    pub fn blob(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        DataLocation::Blob(Arc::new(ArchiveBlob {
            id: Uuid::new_v4(),
            name: name.into(),
            bytes: bytes.into(),
        }))
    }

    /// Key identifying this location in the archive cache
    pub fn cache_key(&self) -> String {
        match self {
            DataLocation::Path(path) => path.clone(),
            DataLocation::Blob(blob) => format!("blob:{}:{}", blob.name, blob.id),
        }
    }

    /// The base path, if this location can be fetched from directly
    pub fn as_path(&self) -> Option<&str> {
        match self {
            DataLocation::Path(path) => Some(path),
            DataLocation::Blob(_) => None,
        }
    }
}

impl PartialEq for DataLocation {
    fn eq(&self, other: &Self) -> bool {
        self.cache_key() == other.cache_key()
    }
}

impl Eq for DataLocation {}

impl fmt::Display for DataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLocation::Path(path) => write!(f, "{}", path),
            DataLocation::Blob(blob) => write!(f, "{} (in memory)", blob.name),
        }
    }
}

/// Kind of an archive entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Index record for one archive entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Position in the archive's central directory
    pub index: usize,
    /// Entry name as stored
    pub name: String,
    pub kind: EntryKind,
    /// Uncompressed size in bytes
    pub size: u64,
}

/// An opened archive with its path → entry index
pub struct ArchiveIndex {
    location: String,
    entries: HashMap<String, EntryDescriptor>,
    archive: ZipArchive<Cursor<Arc<[u8]>>>,
}

impl fmt::Debug for ArchiveIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveIndex")
            .field("location", &self.location)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ArchiveIndex {
    /// Parse archive bytes and index every entry
    pub fn open(location: &str, bytes: Arc<[u8]>) -> ResolveResult<Self> {
        let archive_err = |e: zip::result::ZipError| ResolveError::Archive {
            location: location.to_string(),
            message: e.to_string(),
        };

        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;
        let mut entries = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i).map_err(archive_err)?;
            let kind = if file.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let descriptor = EntryDescriptor {
                index: i,
                name: file.name().to_string(),
                kind,
                size: file.size(),
            };

            // Directories are addressable with or without the trailing slash
            if kind == EntryKind::Directory {
                let trimmed = descriptor.name.trim_end_matches('/').to_string();
                entries.insert(trimmed, descriptor.clone());
            }
            entries.insert(descriptor.name.clone(), descriptor);
        }

        Ok(Self {
            location: location.to_string(),
            entries,
            archive,
        })
    }

    /// Look up an entry by path
    pub fn entry(&self, path: &str) -> Option<&EntryDescriptor> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of indexed paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read the bytes of a file entry
    pub fn read(&self, path: &str) -> ResolveResult<Vec<u8>> {
        let entry = self.entry(path).ok_or_else(|| ResolveError::EntryNotFound {
            location: self.location.clone(),
            path: path.to_string(),
        })?;

        if entry.kind == EntryKind::Directory {
            return Err(ResolveError::NotAFile {
                location: self.location.clone(),
                path: path.to_string(),
            });
        }

        let archive_err = |message: String| ResolveError::Archive {
            location: self.location.clone(),
            message,
        };

        // Clones share the parsed central directory; only the cursor is copied
        let mut archive = self.archive.clone();
        let mut file = archive
            .by_index(entry.index)
            .map_err(|e| archive_err(e.to_string()))?;
        let mut bytes = Vec::with_capacity(entry.size.min(MAX_PREALLOC) as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| archive_err(e.to_string()))?;
        Ok(bytes)
    }
}

type IndexSlot = Arc<OnceCell<ResolveResult<Arc<ArchiveIndex>>>>;

#[derive(Default)]
struct CacheSlots {
    slots: HashMap<String, IndexSlot>,
    order: VecDeque<String>,
}

/// Bounded cache of archive indexes, keyed by location
///
/// Each slot holds the build itself: the first caller runs it, later callers
/// await the same cell. Failed opens are cached as well, so a plain base
/// directory is probed once rather than on every resolve.
pub struct ArchiveCache {
    capacity: usize,
    inner: Mutex<CacheSlots>,
    opens: AtomicUsize,
}

impl ArchiveCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheSlots::default()),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of locations currently cached
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, location: &DataLocation) -> bool {
        self.lock().slots.contains_key(&location.cache_key())
    }

    /// Total archive opens attempted through this cache
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Drop the cached index for `location`; returns whether one existed
    pub fn invalidate(&self, location: &DataLocation) -> bool {
        let key = location.cache_key();
        let mut inner = self.lock();
        inner.order.retain(|k| k != &key);
        inner.slots.remove(&key).is_some()
    }

    /// Drop every cached index
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.slots.clear();
        inner.order.clear();
    }

    fn slot(&self, key: &str) -> IndexSlot {
        let mut inner = self.lock();
        if let Some(slot) = inner.slots.get(key) {
            return slot.clone();
        }

        let slot: IndexSlot = Arc::new(OnceCell::new());
        inner.slots.insert(key.to_string(), slot.clone());
        inner.order.push_back(key.to_string());

        while inner.slots.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            debug!(location = %oldest, "evicting archive index");
            inner.slots.remove(&oldest);
        }
        slot
    }

    fn record_open(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheSlots> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ArchiveCache {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_CAPACITY)
    }
}

/// Resolves asset paths against archives or plain file trees
pub struct ArchiveResolver<S> {
    source: Arc<S>,
    cache: Arc<ArchiveCache>,
}

impl<S> Clone for ArchiveResolver<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<S: ByteSource> ArchiveResolver<S> {
    /// Create a resolver with its own default-sized cache
    pub fn new(source: S) -> Self {
        Self::with_cache(Arc::new(source), Arc::new(ArchiveCache::default()))
    }

    pub fn with_cache(source: Arc<S>, cache: Arc<ArchiveCache>) -> Self {
        Self { source, cache }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &ArchiveCache {
        &self.cache
    }

    /// Get the index for the archive at `location`, building it at most once
    pub async fn index(&self, location: &DataLocation) -> ResolveResult<Arc<ArchiveIndex>> {
        let key = location.cache_key();
        let slot = self.cache.slot(&key);
        slot.get_or_init(|| self.open(location, &key)).await.clone()
    }

    async fn open(&self, location: &DataLocation, key: &str) -> ResolveResult<Arc<ArchiveIndex>> {
        self.cache.record_open();

        let bytes: Arc<[u8]> = match location {
            DataLocation::Path(path) => self
                .source
                .fetch(path)
                .await
                .map_err(|e| ResolveError::Archive {
                    location: key.to_string(),
                    message: e.to_string(),
                })?
                .into(),
            DataLocation::Blob(blob) => blob.bytes.clone(),
        };

        let index = ArchiveIndex::open(key, bytes)?;
        info!(
            location = %location,
            entries = index.len(),
            source = self.source.name(),
            "indexed archive"
        );
        Ok(Arc::new(index))
    }

    /// Resolve `path` inside the dataset at `location` to raw bytes
    pub async fn resolve(&self, location: &DataLocation, path: &str) -> ResolveResult<Vec<u8>> {
        let archive_err = match self.index(location).await {
            Ok(index) => {
                return index.read(path).inspect_err(|e| {
                    warn!(location = %location, path, error = %e, "archive lookup failed");
                })
            }
            Err(e) => e,
        };

        let Some(base) = location.as_path() else {
            return Err(archive_err);
        };

        let direct = join_location(base, path);
        debug!(location = %location, path, "not an archive, fetching directly");
        self.source
            .fetch(&direct)
            .await
            .map_err(|direct| ResolveError::Unresolved {
                location: location.to_string(),
                path: path.to_string(),
                archive: archive_err.to_string(),
                direct,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{IoResult, MemorySource};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn make_archive(files: &[(&str, &[u8])], dirs: &[&str]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for dir in dirs {
            writer.add_directory(*dir, options).unwrap();
        }
        for (name, bytes) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Memory source that yields before answering, forcing interleaving
    struct SlowSource(MemorySource);

    impl ByteSource for SlowSource {
        async fn fetch(&self, location: &str) -> IoResult<Vec<u8>> {
            tokio::task::yield_now().await;
            self.0.fetch(location).await
        }
    }

    fn resolver_with(files: &[(&str, Vec<u8>)]) -> ArchiveResolver<MemorySource> {
        let source = MemorySource::new();
        for (location, bytes) in files {
            source.insert(*location, bytes.clone());
        }
        ArchiveResolver::new(source)
    }

    #[tokio::test]
    async fn test_resolve_entry_from_archive() {
        let archive = make_archive(&[("mesh/nodes.npy", b"abc")], &["mesh/"]);
        let resolver = resolver_with(&[("data.zip", archive)]);
        let location = DataLocation::path("data.zip");

        let bytes = resolver.resolve(&location, "mesh/nodes.npy").await.unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[tokio::test]
    async fn test_missing_entry_is_entry_not_found() {
        let archive = make_archive(&[("a.npy", b"a")], &[]);
        let resolver = resolver_with(&[("data.zip", archive)]);
        let location = DataLocation::path("data.zip");

        let err = resolver.resolve(&location, "b.npy").await.unwrap_err();
        assert!(matches!(err, ResolveError::EntryNotFound { .. }));
        // No direct fetch is attempted when the archive itself opened
        assert_eq!(resolver.source().fetch_count("data.zip/b.npy"), 0);
    }

    #[tokio::test]
    async fn test_directory_entry_is_not_a_file() {
        let archive = make_archive(&[("stacks/0/000.jpg", b"jpg")], &["stacks/"]);
        let resolver = resolver_with(&[("data.zip", archive)]);
        let location = DataLocation::path("data.zip");

        for path in ["stacks/", "stacks"] {
            let err = resolver.resolve(&location, path).await.unwrap_err();
            assert!(matches!(err, ResolveError::NotAFile { .. }), "{path}");
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_direct_fetch() {
        let resolver = resolver_with(&[("dataset/nodes.npy", b"direct".to_vec())]);
        let location = DataLocation::path("dataset");

        let bytes = resolver.resolve(&location, "nodes.npy").await.unwrap();
        assert_eq!(bytes, b"direct");

        // The failed open is cached, a second resolve does not re-probe it
        let _ = resolver.resolve(&location, "nodes.npy").await;
        assert_eq!(resolver.source().fetch_count("dataset"), 1);
    }

    #[tokio::test]
    async fn test_fallback_failure_is_unresolved() {
        let resolver = resolver_with(&[]);
        let location = DataLocation::path("dataset");

        let err = resolver.resolve(&location, "nodes.npy").await.unwrap_err();
        assert!(matches!(err, ResolveError::Unresolved { .. }));
    }

    #[tokio::test]
    async fn test_blob_location() {
        let archive = make_archive(&[("vectors.npy", b"vv")], &[]);
        let resolver = resolver_with(&[]);
        let location = DataLocation::blob("drop.zip", archive);

        assert_eq!(resolver.resolve(&location, "vectors.npy").await.unwrap(), b"vv");
        assert!(matches!(
            resolver.resolve(&location, "nodes.npy").await,
            Err(ResolveError::EntryNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_blob_that_is_not_an_archive() {
        let resolver = resolver_with(&[]);
        let location = DataLocation::blob("notes.txt", b"hello".to_vec());

        let err = resolver.resolve(&location, "x").await.unwrap_err();
        assert!(matches!(err, ResolveError::Archive { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_build() {
        let archive = make_archive(&[("a.npy", b"a"), ("b.npy", b"b")], &[]);
        let source = MemorySource::new();
        source.insert("fresh.zip", archive);
        let resolver = ArchiveResolver::new(SlowSource(source));
        let location = DataLocation::path("fresh.zip");

        let (a, b) = tokio::join!(
            resolver.resolve(&location, "a.npy"),
            resolver.resolve(&location, "b.npy")
        );

        assert_eq!(a.unwrap(), b"a");
        assert_eq!(b.unwrap(), b"b");
        assert_eq!(resolver.cache().opens(), 1);
        assert_eq!(resolver.source().0.fetch_count("fresh.zip"), 1);
    }

    #[tokio::test]
    async fn test_cache_capacity_evicts_oldest() {
        let source = MemorySource::new();
        for name in ["a.zip", "b.zip", "c.zip"] {
            source.insert(name, make_archive(&[("x", b"x")], &[]));
        }
        let resolver =
            ArchiveResolver::with_cache(Arc::new(source), Arc::new(ArchiveCache::new(2)));

        for name in ["a.zip", "b.zip", "c.zip"] {
            resolver.resolve(&DataLocation::path(name), "x").await.unwrap();
        }

        assert_eq!(resolver.cache().len(), 2);
        assert!(!resolver.cache().contains(&DataLocation::path("a.zip")));
        assert!(resolver.cache().contains(&DataLocation::path("c.zip")));
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let archive = make_archive(&[("x", b"x")], &[]);
        let resolver = resolver_with(&[("data.zip", archive)]);
        let location = DataLocation::path("data.zip");

        resolver.resolve(&location, "x").await.unwrap();
        assert!(resolver.cache().invalidate(&location));
        resolver.resolve(&location, "x").await.unwrap();

        assert_eq!(resolver.cache().opens(), 2);
        assert_eq!(resolver.source().fetch_count("data.zip"), 2);
    }

    #[test]
    fn test_location_identity() {
        assert_eq!(DataLocation::path("a"), DataLocation::path("a"));
        let one = DataLocation::blob("drop.zip", vec![]);
        let two = DataLocation::blob("drop.zip", vec![]);
        assert_ne!(one, two);
        assert_eq!(one, one.clone());
    }
}
