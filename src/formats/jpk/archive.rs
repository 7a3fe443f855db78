//! ZIP archive access and the bounded handle cache.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use zip::ZipArchive;

use crate::errors::FormatError;

/// An open JPK archive handle.
///
/// Member reads lock the underlying ZIP reader briefly; handles are shared
/// read-only across callers via [`ArchiveCache`].
pub struct JpkArchive {
    path: PathBuf,
    zip: Mutex<ZipArchive<BufReader<File>>>,
}

impl JpkArchive {
    /// Open the archive at `path`.
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let file = File::open(path)?;
        let zip = ZipArchive::new(BufReader::new(file))?;
        Ok(JpkArchive {
            path: path.to_path_buf(),
            zip: Mutex::new(zip),
        })
    }

    /// Path the archive was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all archive members, in archive order.
    pub fn member_names(&self) -> Vec<String> {
        self.zip.lock().file_names().map(String::from).collect()
    }

    /// Read one archive member into memory.
    ///
    /// A missing member is an index error (the archive itself is valid);
    /// anything else is a broken file.
    pub fn read_member(&self, name: &str) -> Result<Vec<u8>, FormatError> {
        let mut zip = self.zip.lock();
        let mut member = zip.by_name(name).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => {
                FormatError::Index(format!("archive member '{name}' not found"))
            }
            other => FormatError::Zip(other),
        })?;
        let mut data = Vec::with_capacity(member.size() as usize);
        member.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl std::fmt::Debug for JpkArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JpkArchive").field("path", &self.path).finish()
    }
}

struct CacheInner {
    handles: HashMap<PathBuf, Arc<JpkArchive>>,
    order: VecDeque<PathBuf>,
}

/// Bounded LRU cache of open archive handles.
///
/// Many curves may be read from one archive across independent load calls;
/// the cache keeps a small number of handles open and evicts the least
/// recently used one beyond capacity. Handles are reference counted, so an
/// eviction never invalidates in-flight reads holding the evicted `Arc`.
pub struct ArchiveCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl ArchiveCache {
    /// Create a cache holding at most `capacity` open handles.
    pub fn with_capacity(capacity: usize) -> Self {
        ArchiveCache {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                handles: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// The process-wide shared cache (capacity 16).
    pub fn shared() -> &'static ArchiveCache {
        static SHARED: OnceLock<ArchiveCache> = OnceLock::new();
        SHARED.get_or_init(|| ArchiveCache::with_capacity(16))
    }

    /// Number of handles currently held open.
    pub fn open_handles(&self) -> usize {
        self.inner.lock().handles.len()
    }

    /// Get or open the archive at `path`.
    pub fn open(&self, path: &Path) -> Result<Arc<JpkArchive>, FormatError> {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(handle) = self.lookup(&key) {
            return Ok(handle);
        }
        // Open outside the lock so slow opens of distinct archives do not
        // serialize each other.
        let handle = Arc::new(JpkArchive::open(path)?);
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.handles.get(&key) {
            // another caller won the race
            return Ok(existing.clone());
        }
        inner.handles.insert(key.clone(), handle.clone());
        inner.order.push_back(key);
        while inner.handles.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.handles.remove(&evicted);
            }
        }
        Ok(handle)
    }

    fn lookup(&self, key: &Path) -> Option<Arc<JpkArchive>> {
        let mut inner = self.inner.lock();
        let handle = inner.handles.get(key).cloned()?;
        // refresh LRU position
        if let Some(pos) = inner.order.iter().position(|p| p == key) {
            let entry = inner.order.remove(pos);
            if let Some(entry) = entry {
                inner.order.push_back(entry);
            }
        }
        Some(handle)
    }
}

impl std::fmt::Debug for ArchiveCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveCache")
            .field("capacity", &self.capacity)
            .field("open_handles", &self.open_handles())
            .finish()
    }
}
