//! Typed identifiers for metadata documents.
//!
//! Generated ids are UUIDv7 (time-ordered) rendered as 32 hex characters.
//! Reserved ids such as [`ROOT_DIR_ID`](crate::constants::ROOT_DIR_ID) are
//! plain strings, so `DocId` wraps a `String` rather than a `Uuid`.
//!
//! Revisions follow the `<generation>-<tag>` shape: the generation counts
//! successful writes, the tag is random. Only the store mints them; callers
//! compare them for equality and nothing else.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::constants::{ROOT_DIR_ID, TRASH_DIR_ID};

/// A metadata document identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Create a new time-ordered id (UUIDv7, hex without hyphens).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().as_simple().to_string())
    }

    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The root directory id.
    pub fn root() -> Self {
        Self(ROOT_DIR_ID.to_string())
    }

    /// The trash directory id.
    pub fn trash() -> Self {
        Self(TRASH_DIR_ID.to_string())
    }

    /// The empty id: "not assigned yet".
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_DIR_ID
    }

    pub fn is_trash(&self) -> bool {
        self.0 == TRASH_DIR_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for log lines only.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocId({})", self.short())
    }
}

/// An opaque revision token. Empty means "never stored".
#[derive(Clone, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    /// The revision before the first write.
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Write counter encoded in the token; 0 for an unstored document.
    pub fn generation(&self) -> u64 {
        self.0
            .split_once('-')
            .and_then(|(generation, _)| generation.parse().ok())
            .unwrap_or(0)
    }

    /// Mint the revision that follows this one.
    pub fn next(&self) -> Self {
        let tag = uuid::Uuid::now_v7().as_simple().to_string();
        Self(format!("{}-{}", self.generation() + 1, &tag[tag.len() - 12..]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({})", self.0)
    }
}

/// Kind of node a metadata document describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeType {
    File,
    Directory,
}

// ============================================================================
// Tests
// ============================================================================
