//! Directory nodes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use hearth_types::constants::{TRASH_DIR_NAME, TRASH_DIR_PATH};
use hearth_types::{DocId, NodeType, Revision};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{VfsError, VfsResult};
use crate::naming::{
    SuffixPattern, check_file_name, strip_conflict_suffix, try_or_use_suffix, unique_tags,
};
use crate::node::{Node, Selector};
use crate::patch::{DocPatch, NormalizedPatch};
use crate::safe::{safe_mkdir, safe_rename};
use crate::vfs::Vfs;
use crate::vpath;

/// Metadata document of a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirDoc {
    #[serde(rename = "_id", default, skip_serializing_if = "DocId::is_empty")]
    pub id: DocId,
    #[serde(rename = "_rev", default, skip_serializing_if = "Revision::is_none")]
    pub rev: Revision,
    pub name: String,
    /// Parent directory. Empty only for the root.
    #[serde(default, skip_serializing_if = "DocId::is_empty")]
    pub dir_id: DocId,
    /// Original parent path while trashed, empty otherwise.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub restore_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DirDoc {
    /// Build a directory document. The name is validated and an empty
    /// `dir_id` means the root.
    pub fn new(
        name: impl Into<String>,
        dir_id: DocId,
        created_at: DateTime<Utc>,
        tags: Vec<String>,
    ) -> VfsResult<Self> {
        let name = name.into();
        check_file_name(&name)?;
        Ok(Self {
            id: DocId::empty(),
            rev: Revision::none(),
            name,
            dir_id: if dir_id.is_empty() { DocId::root() } else { dir_id },
            restore_path: String::new(),
            created_at,
            updated_at: created_at,
            tags: unique_tags(tags),
        })
    }

    pub fn root(now: DateTime<Utc>) -> Self {
        Self {
            id: DocId::root(),
            rev: Revision::none(),
            name: String::new(),
            dir_id: DocId::empty(),
            restore_path: String::new(),
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        }
    }

    pub fn trash(now: DateTime<Utc>) -> Self {
        Self {
            id: DocId::trash(),
            rev: Revision::none(),
            name: TRASH_DIR_NAME.to_string(),
            dir_id: DocId::root(),
            restore_path: String::new(),
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        }
    }

    /// Root or trash: never moved, renamed, or destroyed.
    pub fn is_reserved(&self) -> bool {
        self.id.is_root() || self.id.is_trash()
    }

    pub async fn path(&self, vfs: &Vfs) -> VfsResult<String> {
        vfs.resolve_dir_path(self).await
    }

    fn current_patch(&self) -> NormalizedPatch {
        NormalizedPatch {
            name: self.name.clone(),
            dir_id: self.dir_id.clone(),
            restore_path: self.restore_path.clone(),
            tags: self.tags.clone(),
            updated_at: self.updated_at,
            executable: false,
        }
    }
}

impl Vfs {
    /// Fetch a directory by id. `NotFound` if the id names a file.
    pub async fn get_dir_doc(&self, id: &DocId) -> VfsResult<DirDoc> {
        self.get_node(id)
            .await?
            .into_dir()
            .ok_or_else(|| VfsError::not_found(format!("directory {id}")))
    }

    /// Fetch a directory by absolute path, walking down from the root.
    pub async fn get_dir_doc_from_path(&self, path: &str) -> VfsResult<DirDoc> {
        if !vpath::is_abs(path) {
            return Err(VfsError::non_absolute(path));
        }
        let mut current = self.get_dir_doc(&DocId::root()).await?;
        for name in vpath::clean(path).split('/').filter(|s| !s.is_empty()) {
            let selector = Selector::child(current.id.clone(), name, NodeType::Directory);
            current = self
                .meta()
                .find(&selector, Some(1))
                .await?
                .into_iter()
                .next()
                .and_then(Node::into_dir)
                .ok_or_else(|| VfsError::not_found(path))?;
        }
        Ok(current)
    }

    /// Create a directory: the content-store directory first, then its
    /// document. If storing the document fails the directory is removed.
    #[tracing::instrument(skip(self, doc), fields(dir.name = %doc.name), name = "vfs.create_dir")]
    pub async fn create_dir(&self, doc: DirDoc) -> VfsResult<DirDoc> {
        let path = self.resolve_child_path(&doc.dir_id, None, &doc.name).await?;
        safe_mkdir(self.fs(), &path).await?;
        match self.meta().create(Node::Directory(doc)).await {
            Ok(node) => {
                debug!(%path, "directory created");
                node.into_dir()
                    .ok_or_else(|| VfsError::other("store returned a file for a directory"))
            }
            Err(e) => {
                if let Err(cleanup) = self.fs().remove_dir(&path).await {
                    warn!(%path, error = %cleanup, "could not remove directory after failed create");
                }
                Err(e)
            }
        }
    }

    /// Every file and directory directly inside `dir`.
    pub async fn list_children(&self, dir: &DirDoc) -> VfsResult<Vec<Node>> {
        self.meta()
            .find(&Selector::children_of(dir.id.clone()), None)
            .await
    }

    /// Rename, move, or retag a directory.
    ///
    /// The root and the trash cannot be modified, and a directory cannot be
    /// moved below itself.
    #[tracing::instrument(skip(self, olddoc, patch), fields(dir.id = %olddoc.id), name = "vfs.modify_dir")]
    pub async fn modify_dir_metadata(&self, olddoc: &DirDoc, patch: DocPatch) -> VfsResult<DirDoc> {
        if olddoc.is_reserved() {
            return Err(VfsError::ForbiddenMove(format!(
                "{} is a reserved directory",
                olddoc.id
            )));
        }

        let patch = patch.normalize(olddoc.current_patch(), olddoc.created_at)?;
        let mut newdoc = DirDoc::new(patch.name, patch.dir_id, olddoc.created_at, patch.tags)?;
        newdoc.restore_path = patch.restore_path;
        newdoc.id = olddoc.id.clone();
        newdoc.rev = olddoc.rev.clone();
        newdoc.updated_at = patch.updated_at;

        if newdoc.dir_id != olddoc.dir_id && self.is_in_subtree(&newdoc.dir_id, &olddoc.id).await? {
            return Err(VfsError::ForbiddenMove(format!(
                "{} cannot be moved below itself",
                olddoc.id
            )));
        }

        let oldpath = self.resolve_dir_path(olddoc).await?;
        let newpath = self.resolve_dir_path(&newdoc).await?;
        if newpath != oldpath {
            safe_rename(self.fs(), &oldpath, &newpath).await?;
        }

        self.meta()
            .update(Node::Directory(newdoc))
            .await?
            .into_dir()
            .ok_or_else(|| VfsError::other("store returned a file for a directory"))
    }

    /// Move a directory, with everything inside it, into the trash.
    #[tracing::instrument(skip(self, olddoc), fields(dir.id = %olddoc.id), name = "vfs.trash_dir")]
    pub async fn trash_dir(&self, olddoc: &DirDoc) -> VfsResult<DirDoc> {
        let oldpath = self.resolve_dir_path(olddoc).await?;
        if vpath::is_within(&oldpath, TRASH_DIR_PATH) {
            return Err(VfsError::AlreadyInTrash(oldpath));
        }
        let restore_path = vpath::dir(&oldpath);
        try_or_use_suffix(
            &olddoc.name,
            SuffixPattern::Trash,
            self.config().max_suffix_attempts,
            |name| {
                let patch = DocPatch::new()
                    .dir_id(DocId::trash())
                    .restore_path(restore_path.clone())
                    .name(name);
                self.modify_dir_metadata(olddoc, patch)
            },
        )
        .await
    }

    /// Move a trashed directory back where it came from.
    #[tracing::instrument(skip(self, olddoc), fields(dir.id = %olddoc.id), name = "vfs.restore_dir")]
    pub async fn restore_dir(&self, olddoc: &DirDoc) -> VfsResult<DirDoc> {
        let oldpath = self.resolve_dir_path(olddoc).await?;
        let restore_dir = self.restore_target(&oldpath, &olddoc.restore_path).await?;
        let name = strip_conflict_suffix(&olddoc.name);
        try_or_use_suffix(
            name,
            SuffixPattern::Counter,
            self.config().max_suffix_attempts,
            |name| {
                let patch = DocPatch::new()
                    .dir_id(restore_dir.id.clone())
                    .restore_path("")
                    .name(name);
                self.modify_dir_metadata(olddoc, patch)
            },
        )
        .await
    }

    /// Permanently delete a directory and everything below it.
    ///
    /// Files go first, then directories deepest first; each node's content
    /// is removed before its document.
    #[tracing::instrument(skip(self, doc), fields(dir.id = %doc.id), name = "vfs.destroy_dir")]
    pub async fn destroy_dir(&self, doc: &DirDoc) -> VfsResult<()> {
        if doc.is_reserved() {
            return Err(VfsError::ForbiddenMove(format!(
                "{} is a reserved directory",
                doc.id
            )));
        }

        let mut seen = HashSet::from([doc.id.clone()]);
        let mut dirs = vec![doc.clone()];
        let mut next = 0;
        while next < dirs.len() {
            let children = self.list_children(&dirs[next]).await?;
            next += 1;
            for child in children {
                match child {
                    Node::File(mut file) => self.destroy_file(&mut file).await?,
                    Node::Directory(dir) => {
                        if !seen.insert(dir.id.clone()) {
                            return Err(VfsError::CyclicTree {
                                id: dir.id.to_string(),
                                max_depth: self.config().max_depth,
                            });
                        }
                        dirs.push(dir);
                    }
                }
            }
        }

        // breadth-first order reversed puts children before their parents
        for dir in dirs.iter().rev() {
            let path = self.resolve_dir_path(dir).await?;
            self.fs().remove_dir(&path).await?;
            self.meta().delete(&Node::Directory(dir.clone())).await?;
        }
        debug!(count = dirs.len(), "directories destroyed");
        Ok(())
    }

    /// The directory a trashed node goes back to.
    ///
    /// Fails with `NotInTrash` if `path` is not inside the trash, and with
    /// `NotFound` if the node has no restore path or it no longer exists.
    pub(crate) async fn restore_target(&self, path: &str, restore_path: &str) -> VfsResult<DirDoc> {
        if !vpath::is_within(path, TRASH_DIR_PATH) || path == TRASH_DIR_PATH {
            return Err(VfsError::NotInTrash(path.to_string()));
        }
        if restore_path.is_empty() {
            return Err(VfsError::not_found(format!("no restore path for {path}")));
        }
        self.get_dir_doc_from_path(restore_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_dir(name: &str, parent: &DocId) -> DirDoc {
        DirDoc::new(name, parent.clone(), Utc::now(), vec![]).unwrap()
    }

    #[test]
    fn test_new_validates_and_defaults_parent() {
        let d = DirDoc::new("docs", DocId::empty(), Utc::now(), vec!["a".into(), "a".into()]).unwrap();
        assert!(d.dir_id.is_root());
        assert_eq!(d.tags, vec!["a".to_string()]);
        assert!(matches!(
            DirDoc::new("a/b", DocId::root(), Utc::now(), vec![]),
            Err(VfsError::InvalidName(_))
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let d = new_dir("docs", &DocId::root());
        let json = serde_json::to_value(Node::Directory(d)).unwrap();
        assert_eq!(json["type"], "directory");
        assert_eq!(json["name"], "docs");
        assert!(json.get("_id").is_none());
        assert!(json.get("restore_path").is_none());
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_path() {
        let vfs = Vfs::in_memory().await.unwrap();
        let a = vfs.create_dir(new_dir("a", &DocId::root())).await.unwrap();
        let b = vfs.create_dir(new_dir("b", &a.id)).await.unwrap();
        assert!(vfs.fs().stat("/a/b").await.unwrap().is_dir());

        let found = vfs.get_dir_doc_from_path("/a//b/").await.unwrap();
        assert_eq!(found.id, b.id);
        assert!(vfs.get_dir_doc_from_path("/").await.unwrap().id.is_root());
        assert!(vfs.get_dir_doc_from_path("/a/zz").await.unwrap_err().is_not_found());
        assert!(matches!(
            vfs.get_dir_doc_from_path("a").await,
            Err(VfsError::NonAbsolutePath(_))
        ));
    }

    #[tokio::test]
    async fn test_create_duplicate_sibling_fails() {
        let vfs = Vfs::in_memory().await.unwrap();
        vfs.create_dir(new_dir("a", &DocId::root())).await.unwrap();
        let err = vfs.create_dir(new_dir("a", &DocId::root())).await.unwrap_err();
        assert!(err.is_collision());
        let root = vfs.get_dir_doc(&DocId::root()).await.unwrap();
        let names: Vec<_> = vfs
            .list_children(&root)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name().to_string())
            .collect();
        assert_eq!(names.iter().filter(|n| *n == "a").count(), 1);
    }

    #[tokio::test]
    async fn test_move_and_rename() {
        let vfs = Vfs::in_memory().await.unwrap();
        let a = vfs.create_dir(new_dir("a", &DocId::root())).await.unwrap();
        let b = vfs.create_dir(new_dir("b", &DocId::root())).await.unwrap();

        let moved = vfs
            .modify_dir_metadata(&a, DocPatch::new().dir_id(b.id.clone()).name("a2"))
            .await
            .unwrap();
        assert_eq!(moved.path(&vfs).await.unwrap(), "/b/a2");
        assert!(vfs.fs().stat("/b/a2").await.unwrap().is_dir());
        assert!(!vfs.fs().exists("/a").await.unwrap());
        assert_ne!(moved.rev, a.rev);

        // the stale document is refused
        assert!(matches!(
            vfs.modify_dir_metadata(&a, DocPatch::new().tags(vec!["t".into()]))
                .await,
            Err(VfsError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_move_below_itself_is_forbidden() {
        let vfs = Vfs::in_memory().await.unwrap();
        let a = vfs.create_dir(new_dir("a", &DocId::root())).await.unwrap();
        let b = vfs.create_dir(new_dir("b", &a.id)).await.unwrap();

        for target in [&a.id, &b.id] {
            assert!(matches!(
                vfs.modify_dir_metadata(&a, DocPatch::new().dir_id(target.clone()))
                    .await,
                Err(VfsError::ForbiddenMove(_))
            ));
        }
        let root = vfs.get_dir_doc(&DocId::root()).await.unwrap();
        assert!(matches!(
            vfs.modify_dir_metadata(&root, DocPatch::new().name("x")).await,
            Err(VfsError::ForbiddenMove(_))
        ));
    }

    #[tokio::test]
    async fn test_trash_and_restore() {
        let vfs = Vfs::in_memory().await.unwrap();
        let a = vfs.create_dir(new_dir("a", &DocId::root())).await.unwrap();
        vfs.create_dir(new_dir("inner", &a.id)).await.unwrap();

        let trashed = vfs.trash_dir(&a).await.unwrap();
        assert!(trashed.dir_id.is_trash());
        assert_eq!(trashed.restore_path, "/");
        assert!(vfs.fs().exists("/.hearth_trash/a/inner").await.unwrap());
        assert!(matches!(
            vfs.trash_dir(&trashed).await,
            Err(VfsError::AlreadyInTrash(_))
        ));

        // a new "a" takes the old place while the first one is trashed
        vfs.create_dir(new_dir("a", &DocId::root())).await.unwrap();
        let restored = vfs.restore_dir(&trashed).await.unwrap();
        assert_eq!(restored.name, "a (1)");
        assert!(restored.restore_path.is_empty());
        assert!(vfs.fs().exists("/a (1)/inner").await.unwrap());
        assert!(matches!(
            vfs.restore_dir(&restored).await,
            Err(VfsError::NotInTrash(_))
        ));
    }

    #[tokio::test]
    async fn test_destroy_removes_subtree() {
        let vfs = Vfs::in_memory().await.unwrap();
        let a = vfs.create_dir(new_dir("a", &DocId::root())).await.unwrap();
        let b = vfs.create_dir(new_dir("b", &a.id)).await.unwrap();
        vfs.create_dir(new_dir("c", &b.id)).await.unwrap();

        vfs.destroy_dir(&a).await.unwrap();
        assert!(!vfs.fs().exists("/a").await.unwrap());
        assert!(vfs.get_dir_doc(&b.id).await.unwrap_err().is_not_found());
        let root = vfs.get_dir_doc(&DocId::root()).await.unwrap();
        assert!(vfs
            .list_children(&root)
            .await
            .unwrap()
            .iter()
            .all(|n| n.name() != "a"));

        let trash = vfs.get_dir_doc(&DocId::trash()).await.unwrap();
        assert!(matches!(
            vfs.destroy_dir(&trash).await,
            Err(VfsError::ForbiddenMove(_))
        ));
    }
}
