//! File handles and the staged write protocol.
//!
//! A [`File`] is either a reader or a staged writer, never both. Writing is
//! a three-step protocol:
//!
//! 1. [`Vfs::create_file`] moves the current content (if any) aside to a
//!    backup path and exclusively creates the target.
//! 2. [`File::write`] streams bytes into the target while counting and
//!    hashing them.
//! 3. [`File::close`] checks the bytes against the declared size and
//!    digest, then stores the document. On success the backup is dropped;
//!    on any failure the partial target is removed and the backup put back.
//!
//! Content and metadata live in different stores, so a crash between the
//! steps can leave a backup entry or an orphan content entry behind.
//! Reconciling those is left to an external process.

use std::io::SeekFrom;

use chrono::Utc;
use tracing::{debug, warn};

use crate::content::{ContentReader, ContentWriter};
use crate::digest::ContentHasher;
use crate::error::{VfsError, VfsResult};
use crate::file::FileDoc;
use crate::node::Node;
use crate::safe::{safe_create_file, safe_rename};
use crate::vfs::Vfs;

/// An open file.
pub struct File {
    vfs: Vfs,
    mode: Mode,
}

enum Mode {
    Read(Box<dyn ContentReader>),
    Write(Box<FileCreation>),
    Closed,
}

/// Where the previous content was moved while a replacement is written.
struct Backup {
    path: String,
    restore_to: String,
}

/// A staged write: the open content writer plus everything `close` needs.
struct FileCreation {
    writer: Box<dyn ContentWriter>,
    staged: Staged,
}

struct Staged {
    written: i64,
    newdoc: FileDoc,
    replacing: bool,
    newpath: String,
    backup: Option<Backup>,
    check_hash: bool,
    hasher: ContentHasher,
    /// First write error, reported again by `close`.
    write_err: Option<String>,
}

/// Backup path for the content of `doc` while it is being replaced.
pub fn backup_path(doc: &FileDoc) -> String {
    format!("/.{}_{}", doc.id, doc.rev)
}

impl Vfs {
    /// Open a file for reading.
    pub async fn open_file(&self, doc: &mut FileDoc) -> VfsResult<File> {
        let path = doc.path(self).await?;
        let reader = self.fs().open(&path).await?;
        Ok(File {
            vfs: self.clone(),
            mode: Mode::Read(reader),
        })
    }

    /// Start writing the content of `newdoc`.
    ///
    /// Without `olddoc` this creates a new file; the target path must be
    /// free. With `olddoc` it replaces that file's content: the new
    /// document takes over its id, revision, and creation time. Nothing is
    /// stored until [`File::close`] succeeds.
    #[tracing::instrument(skip(self, newdoc, olddoc), fields(file.name = %newdoc.name), name = "vfs.create_file")]
    pub async fn create_file(
        &self,
        mut newdoc: FileDoc,
        olddoc: Option<&mut FileDoc>,
    ) -> VfsResult<File> {
        let newpath = newdoc.path(self).await?;

        let mut backup = None;
        let replacing = olddoc.is_some();
        if let Some(old) = olddoc {
            let oldpath = old.path(self).await?;
            let bakpath = backup_path(old);
            if let Err(e) = safe_rename(self.fs(), &oldpath, &bakpath).await {
                // content already moved away, or a backup of this revision
                // already exists: another writer is replacing this revision
                return Err(if e.is_not_found() || e.is_collision() {
                    VfsError::conflict(format!("{oldpath} is being replaced concurrently"))
                } else {
                    e
                });
            }
            debug!(from = %oldpath, to = %bakpath, "previous content backed up");
            backup = Some(Backup {
                path: bakpath,
                restore_to: oldpath,
            });

            newdoc.id = old.id.clone();
            newdoc.rev = old.rev.clone();
            newdoc.created_at = old.created_at;
            newdoc.updated_at = Utc::now();
            if newdoc.referenced_by.is_empty() {
                newdoc.referenced_by = old.referenced_by.clone();
            }
        }

        let writer = match safe_create_file(self.fs(), &newpath, newdoc.executable).await {
            Ok(w) => w,
            Err(e) => {
                if let Some(backup) = &backup {
                    self.restore_backup(backup).await;
                }
                return Err(e);
            }
        };

        debug!(path = %newpath, replacing, "staged write open");
        let check_hash = newdoc.md5sum.is_some();
        Ok(File {
            vfs: self.clone(),
            mode: Mode::Write(Box::new(FileCreation {
                writer,
                staged: Staged {
                    written: 0,
                    newdoc,
                    replacing,
                    newpath,
                    backup,
                    check_hash,
                    hasher: ContentHasher::new(),
                    write_err: None,
                },
            })),
        })
    }

    async fn restore_backup(&self, backup: &Backup) {
        if let Err(e) = self.fs().rename(&backup.path, &backup.restore_to).await {
            warn!(
                backup = %backup.path,
                target = %backup.restore_to,
                error = %e,
                "could not put backup content back"
            );
        }
    }

    /// Check the written bytes against the document, then store it.
    async fn finish_creation(&self, fc: &mut Staged) -> VfsResult<FileDoc> {
        let newdoc = &mut fc.newdoc;

        let md5sum = fc.hasher.current();
        if fc.check_hash && newdoc.md5sum.as_deref() != Some(md5sum.as_slice()) {
            return Err(VfsError::InvalidHash);
        }
        if newdoc.size < 0 {
            newdoc.size = fc.written;
        }
        if newdoc.md5sum.is_none() {
            newdoc.md5sum = Some(md5sum);
        }
        if newdoc.size != fc.written {
            return Err(VfsError::ContentLengthMismatch {
                declared: newdoc.size,
                written: fc.written,
            });
        }

        let node = Node::File(newdoc.clone());
        let stored = if fc.replacing {
            self.meta().update(node).await?
        } else {
            self.meta().create(node).await?
        };
        let mut stored = stored
            .into_file()
            .ok_or_else(|| VfsError::other("store returned a directory for a file"))?;
        stored.set_cached_parent(newdoc.cached_parent().cloned());
        Ok(stored)
    }

    /// Undo a failed staged write.
    async fn roll_back(&self, fc: &Staged) {
        match self.fs().remove(&fc.newpath).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(path = %fc.newpath, error = %e, "could not remove partial content"),
        }
        if let Some(backup) = &fc.backup {
            self.restore_backup(backup).await;
        }
    }
}

impl File {
    /// True for handles returned by [`Vfs::create_file`].
    pub fn is_writer(&self) -> bool {
        matches!(self.mode, Mode::Write(_))
    }

    /// Read into `buf`. Read handles only.
    pub async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        match &mut self.mode {
            Mode::Read(reader) => reader.read(buf).await,
            Mode::Write(_) => Err(VfsError::InvalidOperation("read on a write handle")),
            Mode::Closed => Err(VfsError::InvalidOperation("read on a closed handle")),
        }
    }

    /// Move the read cursor. Read handles only.
    pub async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        match &mut self.mode {
            Mode::Read(reader) => reader.seek(pos).await,
            Mode::Write(_) => Err(VfsError::InvalidOperation("seek on a write handle")),
            Mode::Closed => Err(VfsError::InvalidOperation("seek on a closed handle")),
        }
    }

    /// Read from the cursor to the end. Read handles only.
    pub async fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Append bytes. Write handles only.
    ///
    /// After a failed write every later call fails, and so does `close`.
    pub async fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        let FileCreation { writer, staged } = match &mut self.mode {
            Mode::Write(fc) => fc.as_mut(),
            Mode::Read(_) => return Err(VfsError::InvalidOperation("write on a read handle")),
            Mode::Closed => return Err(VfsError::InvalidOperation("write on a closed handle")),
        };
        if let Some(msg) = &staged.write_err {
            return Err(VfsError::WriteFailed(msg.clone()));
        }
        match writer.write(buf).await {
            Ok(n) => {
                staged.written += n as i64;
                staged.hasher.update(&buf[..n]);
                Ok(n)
            }
            Err(e) => {
                staged.write_err = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Write the whole buffer.
    pub async fn write_all(&mut self, mut buf: &[u8]) -> VfsResult<()> {
        while !buf.is_empty() {
            let n = self.write(buf).await?;
            if n == 0 {
                return Err(VfsError::WriteFailed("content store accepted no bytes".into()));
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Release the handle.
    ///
    /// For a write handle this is where the document is committed: the
    /// stored document (with its new revision) is returned. Always check
    /// the result; a failed close means nothing was committed and the
    /// previous content, if any, is back in place.
    pub async fn close(mut self) -> VfsResult<Option<FileDoc>> {
        match std::mem::replace(&mut self.mode, Mode::Closed) {
            Mode::Read(_) | Mode::Closed => Ok(None),
            Mode::Write(fc) => self.commit(*fc).await.map(Some),
        }
    }

    async fn commit(&self, fc: FileCreation) -> VfsResult<FileDoc> {
        let vfs = &self.vfs;
        let FileCreation { writer, staged: mut fc } = fc;
        let closed = writer.close().await;

        let result = match (fc.write_err.take(), closed) {
            (Some(msg), _) => Err(VfsError::WriteFailed(msg)),
            (None, Err(e)) => Err(e),
            (None, Ok(())) => vfs.finish_creation(&mut fc).await,
        };

        match &result {
            Ok(doc) => {
                if let Some(backup) = &fc.backup {
                    if let Err(e) = vfs.fs().remove(&backup.path).await {
                        warn!(backup = %backup.path, error = %e, "could not remove backup content");
                    }
                }
                debug!(id = %doc.id, rev = %doc.rev, size = doc.size, "staged write committed");
            }
            Err(e) => {
                vfs.roll_back(&fc).await;
                debug!(path = %fc.newpath, error = %e, "staged write rolled back");
            }
        }
        result
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if let Mode::Write(fc) = &self.mode {
            warn!(path = %fc.staged.newpath, "write handle dropped without close; content left uncommitted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VfsConfig;
    use crate::content::{ContentStore, FileAttr, MemoryContentStore};
    use crate::digest::md5_of;
    use crate::meta::MemoryMetadataStore;
    use async_trait::async_trait;
    use hearth_types::DocId;
    use std::sync::Arc;

    fn doc(name: &str, size: i64, md5sum: Option<Vec<u8>>) -> FileDoc {
        FileDoc::new(
            name,
            DocId::root(),
            size,
            md5sum,
            "text/plain",
            "text",
            Utc::now(),
            false,
            vec![],
        )
        .unwrap()
    }

    async fn put(vfs: &Vfs, name: &str, body: &[u8]) -> FileDoc {
        let mut f = vfs.create_file(doc(name, -1, None), None).await.unwrap();
        f.write_all(body).await.unwrap();
        f.close().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_create_measures_size_and_digest() {
        let vfs = Vfs::in_memory().await.unwrap();
        let stored = put(&vfs, "a.txt", b"hello world").await;
        assert_eq!(stored.size, 11);
        assert_eq!(stored.md5sum, Some(md5_of(b"hello world")));
        assert_eq!(stored.rev.generation(), 1);

        let mut stored = stored;
        let mut reader = vfs.open_file(&mut stored).await.unwrap();
        reader.seek(SeekFrom::Start(6)).await.unwrap();
        assert_eq!(reader.read_to_end().await.unwrap(), b"world");
        assert_eq!(reader.close().await.unwrap().map(|d| d.id), None);
    }

    #[tokio::test]
    async fn test_wrong_mode_is_invalid_operation() {
        let vfs = Vfs::in_memory().await.unwrap();
        let mut stored = put(&vfs, "a.txt", b"x").await;

        let mut reader = vfs.open_file(&mut stored).await.unwrap();
        assert!(!reader.is_writer());
        assert!(matches!(
            reader.write(b"y").await,
            Err(VfsError::InvalidOperation(_))
        ));

        let mut writer = vfs.create_file(doc("b.txt", -1, None), None).await.unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            writer.read(&mut buf).await,
            Err(VfsError::InvalidOperation(_))
        ));
        assert!(matches!(
            writer.seek(SeekFrom::Start(0)).await,
            Err(VfsError::InvalidOperation(_))
        ));
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_keeps_identity_and_drops_backup() {
        let vfs = Vfs::in_memory().await.unwrap();
        let mut old = put(&vfs, "a.txt", b"v1").await;
        let bak = backup_path(&old);

        let mut f = vfs
            .create_file(doc("a.txt", 2, Some(md5_of(b"v2"))), Some(&mut old))
            .await
            .unwrap();
        assert!(vfs.fs().exists(&bak).await.unwrap());
        f.write_all(b"v2").await.unwrap();
        let new = f.close().await.unwrap().unwrap();

        assert_eq!(new.id, old.id);
        assert_eq!(new.created_at, old.created_at);
        assert_eq!(new.rev.generation(), 2);
        assert_eq!(vfs.fs().read_all("/a.txt").await.unwrap(), b"v2");
        assert!(!vfs.fs().exists(&bak).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_replace_restores_previous_content() {
        let vfs = Vfs::in_memory().await.unwrap();
        let mut old = put(&vfs, "a.txt", b"v1").await;

        let mut f = vfs
            .create_file(doc("a.txt", -1, Some(md5_of(b"other"))), Some(&mut old))
            .await
            .unwrap();
        f.write_all(b"v2").await.unwrap();
        assert!(matches!(f.close().await, Err(VfsError::InvalidHash)));

        assert_eq!(vfs.fs().read_all("/a.txt").await.unwrap(), b"v1");
        assert!(!vfs.fs().exists(&backup_path(&old)).await.unwrap());
        let current = vfs.get_file_doc(&old.id).await.unwrap();
        assert_eq!(current.rev, old.rev);
    }

    #[tokio::test]
    async fn test_second_replacer_of_same_revision_conflicts() {
        let vfs = Vfs::in_memory().await.unwrap();
        let mut old = put(&vfs, "a.txt", b"v1").await;
        let mut stale = old.clone();

        let f = vfs
            .create_file(doc("a.txt", -1, None), Some(&mut old))
            .await
            .unwrap();
        let err = vfs
            .create_file(doc("a.txt", -1, None), Some(&mut stale))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, VfsError::Conflict(_)));
        f.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_of_vanished_content_conflicts() {
        let vfs = Vfs::in_memory().await.unwrap();
        let mut old = put(&vfs, "a.txt", b"v1").await;
        vfs.fs().rename("/a.txt", "/elsewhere.txt").await.unwrap();

        let err = vfs
            .create_file(doc("a.txt", -1, None), Some(&mut old))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, VfsError::Conflict(_)), "got {err:?}");

        assert!(!vfs.fs().exists("/a.txt").await.unwrap());
        assert!(!vfs.fs().exists(&backup_path(&old)).await.unwrap());
        assert_eq!(vfs.fs().read_all("/elsewhere.txt").await.unwrap(), b"v1");
        assert_eq!(vfs.get_file_doc(&old.id).await.unwrap().rev, old.rev);
    }

    #[tokio::test]
    async fn test_stale_commit_rolls_back() {
        let vfs = Vfs::in_memory().await.unwrap();
        let mut old = put(&vfs, "a.txt", b"v1").await;
        let mut stale = old.clone();
        let retagged = vfs
            .modify_file_metadata(&mut old, crate::patch::DocPatch::new().tags(vec!["t".into()]))
            .await
            .unwrap();

        let mut f = vfs
            .create_file(doc("a.txt", -1, None), Some(&mut stale))
            .await
            .unwrap();
        f.write_all(b"v2").await.unwrap();
        assert!(matches!(f.close().await, Err(VfsError::Conflict(_))));
        assert_eq!(vfs.fs().read_all("/a.txt").await.unwrap(), b"v1");
        assert_eq!(vfs.get_file_doc(&old.id).await.unwrap().rev, retagged.rev);
    }

    /// Content store whose writers fail once a byte budget is used up.
    struct FailingStore {
        inner: MemoryContentStore,
        budget: usize,
    }

    struct FailingWriter {
        inner: Box<dyn ContentWriter>,
        left: usize,
    }

    #[async_trait]
    impl ContentWriter for FailingWriter {
        async fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
            if buf.len() > self.left {
                return Err(VfsError::Io(std::io::Error::other("disk full")));
            }
            self.left -= buf.len();
            self.inner.write(buf).await
        }

        async fn close(self: Box<Self>) -> VfsResult<()> {
            self.inner.close().await
        }
    }

    #[async_trait]
    impl ContentStore for FailingStore {
        async fn open(&self, path: &str) -> VfsResult<Box<dyn ContentReader>> {
            self.inner.open(path).await
        }
        async fn create_exclusive(&self, path: &str, mode: u32) -> VfsResult<Box<dyn ContentWriter>> {
            let inner = self.inner.create_exclusive(path, mode).await?;
            Ok(Box::new(FailingWriter {
                inner,
                left: self.budget,
            }))
        }
        async fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()> {
            self.inner.mkdir(path, mode).await
        }
        async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
            self.inner.rename(from, to).await
        }
        async fn remove(&self, path: &str) -> VfsResult<()> {
            self.inner.remove(path).await
        }
        async fn remove_dir(&self, path: &str) -> VfsResult<()> {
            self.inner.remove_dir(path).await
        }
        async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
            self.inner.chmod(path, mode).await
        }
        async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
            self.inner.stat(path).await
        }
    }

    #[tokio::test]
    async fn test_latched_write_error_blocks_commit() {
        let fs = MemoryContentStore::new();
        let store = FailingStore {
            inner: fs.clone(),
            budget: 4,
        };
        let vfs = Vfs::new(
            Arc::new(MemoryMetadataStore::new()),
            Arc::new(store),
            VfsConfig::default(),
        );
        vfs.init().await.unwrap();

        let mut f = vfs.create_file(doc("a.txt", -1, None), None).await.unwrap();
        f.write(b"1234").await.unwrap();
        assert!(f.write(b"5678").await.is_err());
        // the handle stays poisoned even for writes that would fit
        assert!(matches!(f.write(b"").await, Err(VfsError::WriteFailed(_))));
        assert!(matches!(f.close().await, Err(VfsError::WriteFailed(_))));

        assert!(!fs.exists("/a.txt").await.unwrap());
        let root = vfs.get_dir_doc(&DocId::root()).await.unwrap();
        assert!(vfs
            .list_children(&root)
            .await
            .unwrap()
            .iter()
            .all(|n| n.name() != "a.txt"));
    }
}
