//! Byte source capability and common I/O types
//!
//! The `ByteSource` trait is the only way the resolver touches the outside
//! world: given a location string it yields the raw bytes stored there.
//! Hosts plug in whatever transport they have (HTTP, object storage,
//! bundled assets); `FsSource` covers the local filesystem.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use thiserror::Error;

/// Errors that can occur while fetching bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Failed to fetch {location}: {message}")]
    FetchFailed { location: String, message: String },

    #[error("Invalid location: {0}")]
    InvalidLocation(String),
}

impl IoError {
    /// Map a `std::io::Error` raised while reading `location`
    pub fn from_std(location: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(location.to_string()),
            _ => IoError::FetchFailed {
                location: location.to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// Result type for I/O operations
pub type IoResult<T> = Result<T, IoError>;

/// Asynchronous source of raw bytes addressed by location
///
/// Implementations must be cheap to share; the resolver keeps one behind an
/// `Arc` and calls it from spawned load tasks.
pub trait ByteSource: Send + Sync + 'static {
    /// Fetch every byte stored at `location`
    fn fetch(&self, location: &str) -> impl Future<Output = IoResult<Vec<u8>>> + Send;

    /// Get the source name (for logging)
    fn name(&self) -> &'static str {
        "bytes"
    }
}

/// Join a base location and a relative path with a single `/`
pub fn join_location(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.trim_start_matches('/').to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Filesystem-backed byte source
///
/// Locations are interpreted as paths, relative to `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FsSource {
    root: Option<PathBuf>,
}

impl FsSource {
    /// Create a source resolving locations against the working directory
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Create a source resolving relative locations against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Resolve a location to a concrete path
    pub fn path_for(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ByteSource for FsSource {
    async fn fetch(&self, location: &str) -> IoResult<Vec<u8>> {
        if location.is_empty() {
            return Err(IoError::InvalidLocation(location.to_string()));
        }
        let path = self.path_for(location);
        tokio::fs::read(&path)
            .await
            .map_err(|e| IoError::from_std(location, e))
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}

/// In-memory byte source for bundled assets
///
/// Keeps a per-location fetch counter, which hosts use to verify caching.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RwLock<HashMap<String, Vec<u8>>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` at `location`, replacing any previous content
    pub fn insert(&self, location: impl Into<String>, bytes: Vec<u8>) {
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(location.into(), bytes);
    }

    /// Number of fetches issued for `location` so far
    pub fn fetch_count(&self, location: &str) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(location)
            .copied()
            .unwrap_or(0)
    }
}

impl ByteSource for MemorySource {
    async fn fetch(&self, location: &str) -> IoResult<Vec<u8>> {
        *self
            .fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(location.to_string())
            .or_insert(0) += 1;

        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(location)
            .cloned()
            .ok_or_else(|| IoError::NotFound(location.to_string()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
