//! Local-disk content store.
//!
//! Every logical path maps below a root directory. Logical paths are cleaned
//! before joining, so `..` can never climb out of the root.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::types::{EntryKind, FileAttr};
use super::{ContentReader, ContentStore, ContentWriter};
use crate::error::{VfsError, VfsResult};
use crate::vpath;

/// Content store backed by a directory on the local filesystem.
///
/// If `root` is `/var/lib/hearth/alice`, the logical path `/photos/cat.jpg`
/// lives at `/var/lib/hearth/alice/photos/cat.jpg`.
#[derive(Debug, Clone)]
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// The root is canonicalized once here so symlinked roots (macOS `/tmp`)
    /// compare correctly later.
    pub async fn open(root: impl Into<PathBuf>) -> VfsResult<Self> {
        let root: PathBuf = root.into();
        fs::create_dir_all(&root).await?;
        let root = dunce::canonicalize(&root)?;
        Ok(Self { root })
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical path to a host path under the root.
    fn resolve(&self, path: &str) -> VfsResult<PathBuf> {
        if !vpath::is_abs(path) {
            return Err(VfsError::non_absolute(path));
        }
        let cleaned = vpath::clean(path);
        let relative = cleaned.trim_start_matches('/');
        if relative.is_empty() {
            return Ok(self.root.clone());
        }
        Ok(self.root.join(relative))
    }

    fn metadata_to_attr(meta: &std::fs::Metadata) -> FileAttr {
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        FileAttr {
            size: if meta.is_dir() { 0 } else { meta.len() },
            kind,
            perm: meta.permissions().mode() & 0o7777,
            mtime: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        }
    }

    /// Attach the logical path to "not found" errors from the OS.
    fn map_io(err: std::io::Error, path: &str) -> VfsError {
        match err.kind() {
            std::io::ErrorKind::NotFound => VfsError::not_found(path),
            std::io::ErrorKind::AlreadyExists => VfsError::already_exists(path),
            _ => VfsError::Io(err),
        }
    }
}

struct LocalReader {
    file: fs::File,
}

#[async_trait]
impl ContentReader for LocalReader {
    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        Ok(self.file.read(buf).await?)
    }

    async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        Ok(self.file.seek(pos).await?)
    }
}

struct LocalWriter {
    file: fs::File,
}

#[async_trait]
impl ContentWriter for LocalWriter {
    async fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        self.file.write_all(buf).await?;
        Ok(buf.len())
    }

    async fn close(self: Box<Self>) -> VfsResult<()> {
        let mut file = self.file;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn open(&self, path: &str) -> VfsResult<Box<dyn ContentReader>> {
        let full = self.resolve(path)?;
        let file = fs::File::open(&full)
            .await
            .map_err(|e| Self::map_io(e, path))?;
        Ok(Box::new(LocalReader { file }))
    }

    async fn create_exclusive(&self, path: &str, mode: u32) -> VfsResult<Box<dyn ContentWriter>> {
        let full = self.resolve(path)?;
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(&full)
            .await
            .map_err(|e| Self::map_io(e, path))?;
        Ok(Box::new(LocalWriter { file }))
    }

    async fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()> {
        let full = self.resolve(path)?;
        fs::DirBuilder::new()
            .mode(mode)
            .create(&full)
            .await
            .map_err(|e| Self::map_io(e, path))
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        if vpath::is_within(&vpath::clean(to), &vpath::clean(from)) {
            return Err(VfsError::ForbiddenMove(format!("{from} into its own subtree {to}")));
        }
        // rename(2) silently replaces files, so check first. The gap between
        // the check and the rename is the backend's race window.
        match fs::symlink_metadata(&to_path).await {
            Ok(_) => return Err(VfsError::already_exists(to)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Self::map_io(e, to)),
        }
        fs::rename(&from_path, &to_path)
            .await
            .map_err(|e| Self::map_io(e, from))
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        let full = self.resolve(path)?;
        fs::remove_file(&full)
            .await
            .map_err(|e| Self::map_io(e, path))
    }

    async fn remove_dir(&self, path: &str) -> VfsResult<()> {
        let full = self.resolve(path)?;
        if full == self.root {
            return Err(VfsError::ForbiddenMove("cannot remove root".to_string()));
        }
        fs::remove_dir(&full)
            .await
            .map_err(|e| Self::map_io(e, path))
    }

    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        let full = self.resolve(path)?;
        fs::set_permissions(&full, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| Self::map_io(e, path))
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let full = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full)
            .await
            .map_err(|e| Self::map_io(e, path))?;
        Ok(Self::metadata_to_attr(&meta))
    }
}
