//! Content-store entry attributes.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Entry type in the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// Attributes of a content-store entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttr {
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Entry type.
    pub kind: EntryKind,
    /// Unix permission bits (e.g., 0o644).
    pub perm: u32,
    /// Last modification time.
    pub mtime: SystemTime,
}

impl FileAttr {
    /// Attributes for a new, empty file.
    pub fn file(size: u64, perm: u32) -> Self {
        Self {
            size,
            kind: EntryKind::File,
            perm,
            mtime: SystemTime::now(),
        }
    }

    /// Attributes for a new directory.
    pub fn directory(perm: u32) -> Self {
        Self {
            size: 0,
            kind: EntryKind::Directory,
            perm,
            mtime: SystemTime::now(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// True when any execute bit is set.
    pub fn is_executable(&self) -> bool {
        self.perm & 0o111 != 0
    }
}
