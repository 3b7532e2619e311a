//! In-memory content store.
//!
//! Used for testing and embedding. All data is ephemeral.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

use super::types::FileAttr;
use super::{ContentReader, ContentStore, ContentWriter};
use crate::error::{VfsError, VfsResult};
use crate::vpath;

/// Entry in the memory store.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, attr: FileAttr },
    Directory { attr: FileAttr },
}

impl Entry {
    fn attr(&self) -> &FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr } => attr,
        }
    }

    fn attr_mut(&mut self) -> &mut FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr } => attr,
        }
    }
}

type Entries = Arc<RwLock<HashMap<String, Entry>>>;

/// In-memory content store.
///
/// Cheap to clone: clones share the same entries.
#[derive(Debug, Clone)]
pub struct MemoryContentStore {
    entries: Entries,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentStore {
    /// Create an empty store holding only the root directory.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "/".to_string(),
            Entry::Directory {
                attr: FileAttr::directory(0o755),
            },
        );
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Normalize a path into a map key. Relative paths are rejected.
    fn key(path: &str) -> VfsResult<String> {
        if !vpath::is_abs(path) {
            return Err(VfsError::non_absolute(path));
        }
        Ok(vpath::clean(path))
    }

    /// All keys currently stored, sorted. Test helper.
    pub fn paths(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check_parent_dir(entries: &HashMap<String, Entry>, key: &str) -> VfsResult<()> {
        let parent = vpath::dir(key);
        match entries.get(&parent) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(Entry::File { .. }) => Err(VfsError::other(format!("not a directory: {parent}"))),
            None => Err(VfsError::not_found(parent)),
        }
    }
}

/// Reader over a snapshot of the file taken at open time.
struct MemoryReader {
    data: Vec<u8>,
    pos: u64,
}

#[async_trait]
impl ContentReader for MemoryReader {
    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        let start = (self.pos as usize).min(self.data.len());
        let end = (start + buf.len()).min(self.data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.data[start..end]);
        self.pos += n as u64;
        Ok(n)
    }

    async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        let len = self.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(delta) => len + delta,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
        };
        if target < 0 {
            return Err(VfsError::other("seek before start of content"));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Writer appending straight into the shared entry.
struct MemoryWriter {
    entries: Entries,
    key: String,
}

#[async_trait]
impl ContentWriter for MemoryWriter {
    async fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        let mut entries = self.entries.write();
        match entries.get_mut(&self.key) {
            Some(Entry::File { data, attr }) => {
                data.extend_from_slice(buf);
                attr.size = data.len() as u64;
                attr.mtime = SystemTime::now();
                Ok(buf.len())
            }
            Some(Entry::Directory { .. }) => {
                Err(VfsError::other(format!("is a directory: {}", self.key)))
            }
            None => Err(VfsError::not_found(self.key.clone())),
        }
    }

    async fn close(self: Box<Self>) -> VfsResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn open(&self, path: &str) -> VfsResult<Box<dyn ContentReader>> {
        let key = Self::key(path)?;
        let entries = self.entries.read();
        match entries.get(&key) {
            Some(Entry::File { data, .. }) => Ok(Box::new(MemoryReader {
                data: data.clone(),
                pos: 0,
            })),
            Some(Entry::Directory { .. }) => Err(VfsError::other(format!("is a directory: {key}"))),
            None => Err(VfsError::not_found(key)),
        }
    }

    async fn create_exclusive(&self, path: &str, mode: u32) -> VfsResult<Box<dyn ContentWriter>> {
        let key = Self::key(path)?;
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(VfsError::already_exists(key));
        }
        Self::check_parent_dir(&entries, &key)?;
        entries.insert(
            key.clone(),
            Entry::File {
                data: Vec::new(),
                attr: FileAttr::file(0, mode),
            },
        );
        Ok(Box::new(MemoryWriter {
            entries: Arc::clone(&self.entries),
            key,
        }))
    }

    async fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()> {
        let key = Self::key(path)?;
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(VfsError::already_exists(key));
        }
        Self::check_parent_dir(&entries, &key)?;
        entries.insert(
            key,
            Entry::Directory {
                attr: FileAttr::directory(mode),
            },
        );
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from_key = Self::key(from)?;
        let to_key = Self::key(to)?;
        if from_key == "/" {
            return Err(VfsError::ForbiddenMove("cannot move root".to_string()));
        }
        if vpath::is_within(&to_key, &from_key) {
            return Err(VfsError::ForbiddenMove(format!(
                "{from_key} into its own subtree {to_key}"
            )));
        }

        let mut entries = self.entries.write();
        if !entries.contains_key(&from_key) {
            return Err(VfsError::not_found(from_key));
        }
        if entries.contains_key(&to_key) {
            return Err(VfsError::already_exists(to_key));
        }
        Self::check_parent_dir(&entries, &to_key)?;

        let entry = entries
            .remove(&from_key)
            .ok_or_else(|| VfsError::not_found(from_key.clone()))?;

        // Directories carry their subtree along
        if matches!(entry, Entry::Directory { .. }) {
            let prefix = format!("{from_key}/");
            let children: Vec<String> = entries
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect();
            for child in children {
                if let Some(child_entry) = entries.remove(&child) {
                    let new_path = format!("{to_key}/{}", &child[prefix.len()..]);
                    entries.insert(new_path, child_entry);
                }
            }
        }

        entries.insert(to_key, entry);
        Ok(())
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        let key = Self::key(path)?;
        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(Entry::File { .. }) => {
                entries.remove(&key);
                Ok(())
            }
            Some(Entry::Directory { .. }) => Err(VfsError::other(format!("is a directory: {key}"))),
            None => Err(VfsError::not_found(key)),
        }
    }

    async fn remove_dir(&self, path: &str) -> VfsResult<()> {
        let key = Self::key(path)?;
        if key == "/" {
            return Err(VfsError::ForbiddenMove("cannot remove root".to_string()));
        }
        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => {
                return Err(VfsError::other(format!("not a directory: {key}")));
            }
            None => return Err(VfsError::not_found(key)),
        }
        let prefix = format!("{key}/");
        if entries.keys().any(|k| k.starts_with(&prefix)) {
            return Err(VfsError::other(format!("directory not empty: {key}")));
        }
        entries.remove(&key);
        Ok(())
    }

    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        let key = Self::key(path)?;
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| VfsError::not_found(key.clone()))?;
        entry.attr_mut().perm = mode;
        Ok(())
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let key = Self::key(path)?;
        self.entries
            .read()
            .get(&key)
            .map(|e| e.attr().clone())
            .ok_or_else(|| VfsError::not_found(key))
    }
}
