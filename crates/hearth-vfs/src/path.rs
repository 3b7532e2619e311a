//! Path resolution: from a node's parent chain to its absolute path.
//!
//! Paths are never stored. They are rebuilt by walking `dir_id` references
//! up to the root, so a rename or move of a directory is a single document
//! update. Walks are bounded by [`VfsConfig::max_depth`]; a longer chain
//! means the tree is corrupt (most likely a cycle) and yields
//! [`VfsError::CyclicTree`].
//!
//! [`VfsConfig::max_depth`]: crate::config::VfsConfig::max_depth

use hearth_types::DocId;

use crate::dir::DirDoc;
use crate::error::{VfsError, VfsResult};
use crate::vfs::Vfs;
use crate::vpath;

impl Vfs {
    /// Absolute path of a directory.
    pub async fn resolve_dir_path(&self, dir: &DirDoc) -> VfsResult<String> {
        if dir.id.is_root() {
            return Ok("/".to_string());
        }
        let max_depth = self.config().max_depth;
        let mut names = vec![dir.name.clone()];
        let mut parent_id = dir.dir_id.clone();
        while !parent_id.is_root() {
            if names.len() >= max_depth {
                return Err(VfsError::CyclicTree {
                    id: dir.id.to_string(),
                    max_depth,
                });
            }
            let parent = self.get_dir_doc(&parent_id).await?;
            names.push(parent.name);
            parent_id = parent.dir_id;
        }
        names.reverse();
        Ok(vpath::join("/", &names.join("/")))
    }

    /// Absolute path of the child `name` of the directory `dir_id`.
    ///
    /// `parent` is used instead of fetching when it is that directory.
    pub(crate) async fn resolve_child_path(
        &self,
        dir_id: &DocId,
        parent: Option<&DirDoc>,
        name: &str,
    ) -> VfsResult<String> {
        if dir_id.is_root() {
            return Ok(vpath::join("/", name));
        }
        let parent_path = match parent {
            Some(p) if &p.id == dir_id => self.resolve_dir_path(p).await?,
            _ => {
                let p = self.get_dir_doc(dir_id).await?;
                self.resolve_dir_path(&p).await?
            }
        };
        Ok(vpath::join(&parent_path, name))
    }

    /// True when `dir_id` is `ancestor` or lies somewhere below it.
    pub async fn is_in_subtree(&self, dir_id: &DocId, ancestor: &DocId) -> VfsResult<bool> {
        let max_depth = self.config().max_depth;
        let mut current = dir_id.clone();
        for _ in 0..=max_depth {
            if &current == ancestor {
                return Ok(true);
            }
            if current.is_root() || current.is_empty() {
                return Ok(false);
            }
            current = self.get_dir_doc(&current).await?.dir_id;
        }
        Err(VfsError::CyclicTree {
            id: dir_id.to_string(),
            max_depth,
        })
    }
}
