//! File nodes: the document, lookups, the metadata mutator, and the trash.

use chrono::{DateTime, Utc};
use hearth_types::constants::TRASH_DIR_PATH;
use hearth_types::{DocId, NodeType, ResourceIdentifier, Revision};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::digest::base64_opt;
use crate::dir::DirDoc;
use crate::error::{VfsError, VfsResult};
use crate::naming::{
    SuffixPattern, check_file_name, strip_conflict_suffix, try_or_use_suffix, unique_tags,
};
use crate::node::{Node, Selector};
use crate::patch::{DocPatch, NormalizedPatch};
use crate::safe::{file_mode, safe_rename};
use crate::vfs::Vfs;
use crate::vpath;

/// Metadata document of a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDoc {
    #[serde(rename = "_id", default, skip_serializing_if = "DocId::is_empty")]
    pub id: DocId,
    #[serde(rename = "_rev", default, skip_serializing_if = "Revision::is_none")]
    pub rev: Revision,
    pub name: String,
    #[serde(default, skip_serializing_if = "DocId::is_empty")]
    dir_id: DocId,
    /// Original parent path while trashed, empty otherwise.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub restore_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Byte length. Negative means "not known yet": measured on write.
    #[serde(with = "size_string")]
    pub size: i64,
    #[serde(default, with = "base64_opt")]
    pub md5sum: Option<Vec<u8>>,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub executable: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_by: Vec<ResourceIdentifier>,

    #[serde(skip)]
    parent: Option<Box<DirDoc>>,
}

impl FileDoc {
    /// Build a file document. The name is validated, an empty `dir_id`
    /// means the root, and duplicate tags are dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        dir_id: DocId,
        size: i64,
        md5sum: Option<Vec<u8>>,
        mime: impl Into<String>,
        class: impl Into<String>,
        created_at: DateTime<Utc>,
        executable: bool,
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
            size,
            md5sum,
            mime: mime.into(),
            class: class.into(),
            executable,
            tags: unique_tags(tags),
            referenced_by: Vec::new(),
            parent: None,
        })
    }

    pub fn dir_id(&self) -> &DocId {
        &self.dir_id
    }

    /// Change the parent. Drops the cached parent document.
    pub fn set_dir_id(&mut self, dir_id: DocId) {
        self.dir_id = if dir_id.is_empty() { DocId::root() } else { dir_id };
        self.parent = None;
    }

    /// The parent directory, fetched once and then cached on this value.
    pub async fn parent(&mut self, vfs: &Vfs) -> VfsResult<&DirDoc> {
        let cached = self.parent.as_ref().is_some_and(|p| p.id == self.dir_id);
        if !cached {
            let parent = vfs.get_dir_doc(&self.dir_id).await?;
            self.parent = Some(Box::new(parent));
        }
        self.parent
            .as_deref()
            .ok_or_else(|| VfsError::not_found(format!("directory {}", self.dir_id)))
    }

    /// Absolute path: the parent's path joined with the name.
    pub async fn path(&mut self, vfs: &Vfs) -> VfsResult<String> {
        if self.dir_id.is_root() {
            return Ok(vpath::join("/", &self.name));
        }
        let parent_path = {
            let parent = self.parent(vfs).await?;
            vfs.resolve_dir_path(parent).await?
        };
        Ok(vpath::join(&parent_path, &self.name))
    }

    pub fn add_referenced_by(&mut self, refs: impl IntoIterator<Item = ResourceIdentifier>) {
        self.referenced_by.extend(refs);
    }

    /// Drop every reference equal to `r`. Returns whether any was present.
    pub fn remove_referenced_by(&mut self, r: &ResourceIdentifier) -> bool {
        let before = self.referenced_by.len();
        self.referenced_by.retain(|x| x != r);
        self.referenced_by.len() != before
    }

    pub(crate) fn cached_parent(&self) -> Option<&DirDoc> {
        self.parent.as_deref()
    }

    pub(crate) fn set_cached_parent(&mut self, parent: Option<DirDoc>) {
        self.parent = parent.filter(|p| p.id == self.dir_id).map(Box::new);
    }

    fn current_patch(&self) -> NormalizedPatch {
        NormalizedPatch {
            name: self.name.clone(),
            dir_id: self.dir_id.clone(),
            restore_path: self.restore_path.clone(),
            tags: self.tags.clone(),
            updated_at: self.updated_at,
            executable: self.executable,
        }
    }
}

/// Sizes are stored as decimal strings so that JavaScript readers do not
/// lose precision. Plain numbers are accepted on input.
mod size_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(i64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(size: &i64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&size.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(t) => t.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl Vfs {
    /// Fetch a file by id. `NotFound` if the id names a directory.
    pub async fn get_file_doc(&self, id: &DocId) -> VfsResult<FileDoc> {
        self.get_node(id)
            .await?
            .into_file()
            .ok_or_else(|| VfsError::not_found(format!("file {id}")))
    }

    /// Fetch a file by absolute path. The returned document has its parent
    /// cached.
    pub async fn get_file_doc_from_path(&self, path: &str) -> VfsResult<FileDoc> {
        if !vpath::is_abs(path) {
            return Err(VfsError::non_absolute(path));
        }
        let parent = self.get_dir_doc_from_path(&vpath::dir(path)).await?;
        let selector = Selector::child(parent.id.clone(), vpath::base(path), NodeType::File);
        let mut doc = self
            .meta()
            .find(&selector, Some(1))
            .await?
            .into_iter()
            .next()
            .and_then(Node::into_file)
            .ok_or_else(|| VfsError::not_found(path))?;
        doc.set_cached_parent(Some(parent));
        Ok(doc)
    }

    /// Apply a patch to a file's metadata: rename, move, retag, flip the
    /// executable bit, or set the restore path.
    ///
    /// The content is moved first, then the document is stored with a
    /// revision check. A failure after the move does not undo it.
    #[tracing::instrument(skip(self, olddoc, patch), fields(file.id = %olddoc.id), name = "vfs.modify_file")]
    pub async fn modify_file_metadata(
        &self,
        olddoc: &mut FileDoc,
        patch: DocPatch,
    ) -> VfsResult<FileDoc> {
        let patch = patch.normalize(olddoc.current_patch(), olddoc.created_at)?;
        let mut newdoc = FileDoc::new(
            patch.name,
            patch.dir_id,
            olddoc.size,
            olddoc.md5sum.clone(),
            olddoc.mime.clone(),
            olddoc.class.clone(),
            olddoc.created_at,
            patch.executable,
            patch.tags,
        )?;
        newdoc.restore_path = patch.restore_path;
        newdoc.id = olddoc.id.clone();
        newdoc.rev = olddoc.rev.clone();
        newdoc.referenced_by = olddoc.referenced_by.clone();
        newdoc.updated_at = patch.updated_at;
        if newdoc.dir_id == olddoc.dir_id {
            newdoc.set_cached_parent(olddoc.cached_parent().cloned());
        }

        let oldpath = olddoc.path(self).await?;
        let newpath = newdoc.path(self).await?;
        if newpath != oldpath {
            safe_rename(self.fs(), &oldpath, &newpath).await?;
        }
        if newdoc.executable != olddoc.executable {
            self.fs().chmod(&newpath, file_mode(newdoc.executable)).await?;
        }

        let parent = newdoc.cached_parent().cloned();
        let mut stored = self
            .meta()
            .update(Node::File(newdoc))
            .await?
            .into_file()
            .ok_or_else(|| VfsError::other("store returned a directory for a file"))?;
        stored.set_cached_parent(parent);
        debug!(from = %oldpath, to = %newpath, "file metadata updated");
        Ok(stored)
    }

    /// Move a file into the trash, remembering where it came from.
    ///
    /// Name clashes inside the trash are resolved with a decorated name.
    #[tracing::instrument(skip(self, olddoc), fields(file.id = %olddoc.id), name = "vfs.trash_file")]
    pub async fn trash_file(&self, olddoc: &mut FileDoc) -> VfsResult<FileDoc> {
        let oldpath = olddoc.path(self).await?;
        if vpath::is_within(&oldpath, TRASH_DIR_PATH) {
            return Err(VfsError::AlreadyInTrash(oldpath));
        }
        let restore_path = vpath::dir(&oldpath);
        let olddoc = &*olddoc;
        try_or_use_suffix(
            &olddoc.name,
            SuffixPattern::Trash,
            self.config().max_suffix_attempts,
            |name| {
                let mut doc = olddoc.clone();
                let patch = DocPatch::new()
                    .dir_id(DocId::trash())
                    .restore_path(restore_path.clone())
                    .name(name);
                async move { self.modify_file_metadata(&mut doc, patch).await }
            },
        )
        .await
    }

    /// Move a trashed file back into the directory it was trashed from.
    ///
    /// The trash decoration is removed from the name; if the original name
    /// is taken, a counter suffix is added instead.
    #[tracing::instrument(skip(self, olddoc), fields(file.id = %olddoc.id), name = "vfs.restore_file")]
    pub async fn restore_file(&self, olddoc: &mut FileDoc) -> VfsResult<FileDoc> {
        let oldpath = olddoc.path(self).await?;
        let restore_dir = self.restore_target(&oldpath, &olddoc.restore_path).await?;
        let olddoc = &*olddoc;
        try_or_use_suffix(
            strip_conflict_suffix(&olddoc.name),
            SuffixPattern::Counter,
            self.config().max_suffix_attempts,
            |name| {
                let mut doc = olddoc.clone();
                let patch = DocPatch::new()
                    .dir_id(restore_dir.id.clone())
                    .restore_path("")
                    .name(name);
                async move { self.modify_file_metadata(&mut doc, patch).await }
            },
        )
        .await
    }

    /// Permanently delete a file: content first, then the document.
    #[tracing::instrument(skip(self, doc), fields(file.id = %doc.id), name = "vfs.destroy_file")]
    pub async fn destroy_file(&self, doc: &mut FileDoc) -> VfsResult<()> {
        let path = doc.path(self).await?;
        self.fs().remove(&path).await?;
        self.meta().delete(&Node::File(doc.clone())).await
    }
}
