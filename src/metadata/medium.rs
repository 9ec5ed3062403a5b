//! Storage media for the metadata region
//!
//! The store sees a small fixed-size region it can read whole, overwrite at an
//! offset and sync, and an exclusive lock that spans read-modify-write
//! cycles. `FileMedium` backs it with a file or block device; `MemoryMedium`
//! keeps it in memory and can inject faults.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// A fixed-size region holding the metadata banks
pub trait BlockMedium: Send {
    /// Read up to `len` bytes from the start of the region.
    ///
    /// Returns `None` when the region does not exist yet. A shorter buffer
    /// means the region was never fully written.
    fn read_region(&mut self, len: usize) -> io::Result<Option<Vec<u8>>>;

    /// Overwrite bytes at `offset`, extending the region if needed
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()>;

    /// Make every completed write durable
    fn sync(&mut self) -> io::Result<()>;

    /// Block until this handle holds the region exclusively.
    ///
    /// Other handles to the same region, in this process or another, wait in
    /// `lock` until `unlock`. Locking a handle that already holds the lock is
    /// a no-op.
    fn lock(&mut self) -> io::Result<()>;

    /// Release the lock taken by `lock`, if held
    fn unlock(&mut self);
}

/// File or block-device backed region
pub struct FileMedium {
    path: PathBuf,
    file: Option<File>,
    created: bool,
    locked: bool,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            created: false,
            locked: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_write(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)?;
                }
            }
            self.created = !self.path.exists();
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&self.path)?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "metadata file not open"))
    }
}

impl BlockMedium for FileMedium {
    fn read_region(&mut self, len: usize) -> io::Result<Option<Vec<u8>>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut buf = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let file = self.open_for_write()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)
    }

    fn sync(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.sync_all()?;
        }

        // A new file is only durable once its directory entry is
        if self.created {
            if let Some(parent) = self.path.parent() {
                if let Ok(dir) = File::open(parent) {
                    let _ = dir.sync_all();
                }
            }
            self.created = false;
        }
        Ok(())
    }

    fn lock(&mut self) -> io::Result<()> {
        if self.locked {
            return Ok(());
        }
        // flock on the metadata file itself; the kernel drops it if we die
        self.open_for_write()?.lock()?;
        self.locked = true;
        Ok(())
    }

    fn unlock(&mut self) {
        if !self.locked {
            return;
        }
        if let Some(file) = self.file.as_ref() {
            let _ = file.unlock();
        }
        self.locked = false;
    }
}

#[derive(Debug, Default)]
struct MemoryRegion {
    bytes: Option<Vec<u8>>,
    fail_writes: usize,
    fail_syncs: usize,
    tear_next_write: Option<usize>,
    writes: usize,
    locked: bool,
}

#[derive(Debug, Default)]
struct SharedRegion {
    region: Mutex<MemoryRegion>,
    unlocked: Condvar,
}

/// In-memory region with fault injection.
///
/// Clones share the same region, so a test can keep a handle after moving the
/// medium into a store. Each clone is a separate handle for `lock`, the way
/// two processes opening one file are.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    shared: Arc<SharedRegion>,
    holds_lock: bool,
}

impl Clone for MemoryMedium {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            holds_lock: false,
        }
    }
}

impl Drop for MemoryMedium {
    fn drop(&mut self) {
        self.unlock();
    }
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region pre-filled with `bytes`
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        let medium = Self::new();
        medium.region().bytes = Some(bytes);
        medium
    }

    fn region(&self) -> MutexGuard<'_, MemoryRegion> {
        self.shared
            .region
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current contents
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.region().bytes.clone()
    }

    /// Replace the contents, simulating an external writer or bit rot
    pub fn set_bytes(&self, bytes: Vec<u8>) {
        self.region().bytes = Some(bytes);
    }

    /// Fail the next `n` writes without touching the region
    pub fn fail_next_writes(&self, n: usize) {
        self.region().fail_writes = n;
    }

    /// Fail the next `n` syncs
    pub fn fail_next_syncs(&self, n: usize) {
        self.region().fail_syncs = n;
    }

    /// Let the next write land only its first `keep` bytes, then fail.
    ///
    /// Models power loss in the middle of a write.
    pub fn tear_next_write(&self, keep: usize) {
        self.region().tear_next_write = Some(keep);
    }

    /// Number of writes that reached the region, torn ones included
    pub fn write_count(&self) -> usize {
        self.region().writes
    }
}

impl BlockMedium for MemoryMedium {
    fn read_region(&mut self, len: usize) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .region()
            .bytes
            .as_ref()
            .map(|b| b[..b.len().min(len)].to_vec()))
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let mut region = self.region();
        if region.fail_writes > 0 {
            region.fail_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }

        let torn = region.tear_next_write.take();
        let landed = match torn {
            Some(keep) => &bytes[..keep.min(bytes.len())],
            None => bytes,
        };

        let offset = offset as usize;
        let data = region.bytes.get_or_insert_with(Vec::new);
        if data.len() < offset + landed.len() {
            data.resize(offset + landed.len(), 0);
        }
        data[offset..offset + landed.len()].copy_from_slice(landed);
        region.writes += 1;

        match torn {
            Some(_) => Err(io::Error::new(io::ErrorKind::Other, "injected torn write")),
            None => Ok(()),
        }
    }

    fn sync(&mut self) -> io::Result<()> {
        let mut region = self.region();
        if region.fail_syncs > 0 {
            region.fail_syncs -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "injected sync failure"));
        }
        Ok(())
    }

    fn lock(&mut self) -> io::Result<()> {
        if self.holds_lock {
            return Ok(());
        }
        let mut region = self.region();
        while region.locked {
            region = self
                .shared
                .unlocked
                .wait(region)
                .unwrap_or_else(PoisonError::into_inner);
        }
        region.locked = true;
        drop(region);
        self.holds_lock = true;
        Ok(())
    }

    fn unlock(&mut self) {
        if !self.holds_lock {
            return;
        }
        self.region().locked = false;
        self.holds_lock = false;
        self.shared.unlocked.notify_all();
    }
}
