//! Partial metadata updates.

use chrono::{DateTime, Utc};
use hearth_types::DocId;
use serde::{Deserialize, Serialize};

use crate::error::{VfsError, VfsResult};

/// Fields to change on a node. `None` keeps the current value.
///
/// Used for both files and directories; directories ignore `executable`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir_id: Option<DocId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<bool>,
}

impl DocPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn dir_id(mut self, dir_id: DocId) -> Self {
        self.dir_id = Some(dir_id);
        self
    }

    pub fn restore_path(mut self, restore_path: impl Into<String>) -> Self {
        self.restore_path = Some(restore_path.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn executable(mut self, executable: bool) -> Self {
        self.executable = Some(executable);
        self
    }

    /// Fill unset fields from `current` and check the result.
    ///
    /// Fails with [`VfsError::IllegalTime`] when the resulting update time
    /// is earlier than `created_at`.
    pub fn normalize(
        self,
        current: NormalizedPatch,
        created_at: DateTime<Utc>,
    ) -> VfsResult<NormalizedPatch> {
        let patch = NormalizedPatch {
            name: self.name.unwrap_or(current.name),
            dir_id: self.dir_id.unwrap_or(current.dir_id),
            restore_path: self.restore_path.unwrap_or(current.restore_path),
            tags: self.tags.unwrap_or(current.tags),
            updated_at: self.updated_at.unwrap_or(current.updated_at),
            executable: self.executable.unwrap_or(current.executable),
        };
        if patch.updated_at < created_at {
            return Err(VfsError::IllegalTime);
        }
        Ok(patch)
    }
}

/// A patch with every field decided.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPatch {
    pub name: String,
    pub dir_id: DocId,
    pub restore_path: String,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
    pub executable: bool,
}
