//! Byte-level content store.
//!
//! The content store keeps file bytes keyed by logical path. The VFS core
//! relies on exactly two guarantees from it:
//!
//! - **Exclusive create**: [`ContentStore::create_exclusive`] fails with
//!   `AlreadyExists` when the path is taken. This is what makes concurrent
//!   creators of the same path lose instead of overwrite.
//! - **Rename never replaces**: [`ContentStore::rename`] fails with
//!   `AlreadyExists` when the destination is taken.
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryContentStore`] - ephemeral, for tests and embedding
//! - [`LocalContentStore`] - a directory on the local disk

mod local;
mod memory;
mod types;

pub use local::LocalContentStore;
pub use memory::MemoryContentStore;
pub use types::{EntryKind, FileAttr};

use async_trait::async_trait;
use std::io::SeekFrom;

use crate::error::VfsResult;

/// Readable handle on one content entry.
#[async_trait]
pub trait ContentReader: Send {
    /// Read up to `buf.len()` bytes; 0 means end of content.
    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Move the read cursor. Returns the new absolute offset.
    async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64>;
}

/// Writable handle on a freshly created content entry.
#[async_trait]
pub trait ContentWriter: Send {
    /// Append bytes. Returns how many were accepted.
    async fn write(&mut self, buf: &[u8]) -> VfsResult<usize>;

    /// Flush and release the handle.
    async fn close(self: Box<Self>) -> VfsResult<()>;
}

/// Content store operations.
///
/// All paths are absolute logical paths (`/dir/name`).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Open an existing file for reading.
    async fn open(&self, path: &str) -> VfsResult<Box<dyn ContentReader>>;

    /// Create a new file, write-only, failing if anything exists at `path`.
    async fn create_exclusive(&self, path: &str, mode: u32) -> VfsResult<Box<dyn ContentWriter>>;

    /// Create a directory, failing if anything exists at `path`.
    async fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()>;

    /// Move an entry (and, for directories, everything below it).
    ///
    /// Fails with `AlreadyExists` if `to` is occupied.
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Remove a file.
    async fn remove(&self, path: &str) -> VfsResult<()>;

    /// Remove an empty directory.
    async fn remove_dir(&self, path: &str) -> VfsResult<()>;

    /// Change permission bits.
    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()>;

    /// Get entry attributes.
    async fn stat(&self, path: &str) -> VfsResult<FileAttr>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check whether anything exists at `path`.
    ///
    /// Errors other than "not found" are propagated, not read as absence.
    async fn exists(&self, path: &str) -> VfsResult<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read an entire file.
    async fn read_all(&self, path: &str) -> VfsResult<Vec<u8>> {
        let mut reader = self.open(path).await?;
        let mut out = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }
}
