//! End-to-end file lifecycle through the public API: create, replace,
//! rename, trash, restore, destroy, on both the in-memory and the on-disk
//! backends.

use chrono::Utc;
use hearth_vfs::digest::md5_of;
use hearth_vfs::{
    DirDoc, DocId, DocPatch, FileDoc, Vfs, VfsConfig, VfsError, VfsResult,
};

fn text_doc(name: &str, dir_id: DocId) -> FileDoc {
    FileDoc::new(
        name,
        dir_id,
        -1,
        None,
        "text/plain",
        "text",
        Utc::now(),
        false,
        vec![],
    )
    .unwrap()
}

async fn write_file(vfs: &Vfs, doc: FileDoc, body: &[u8]) -> VfsResult<FileDoc> {
    let mut file = vfs.create_file(doc, None).await?;
    file.write_all(body).await?;
    Ok(file.close().await?.expect("write handle returns the stored document"))
}

async fn read_file(vfs: &Vfs, doc: &mut FileDoc) -> Vec<u8> {
    let mut file = vfs.open_file(doc).await.unwrap();
    let body = file.read_to_end().await.unwrap();
    file.close().await.unwrap();
    body
}

#[tokio::test]
async fn create_then_read_back() {
    let vfs = Vfs::in_memory().await.unwrap();
    let mut doc = write_file(&vfs, text_doc("hello.txt", DocId::root()), b"hello world")
        .await
        .unwrap();
    assert_eq!(doc.size, 11);
    assert_eq!(doc.md5sum, Some(md5_of(b"hello world")));
    assert_eq!(read_file(&vfs, &mut doc).await, b"hello world");

    let mut by_path = vfs.get_file_doc_from_path("/hello.txt").await.unwrap();
    assert_eq!(by_path.id, doc.id);
    assert_eq!(read_file(&vfs, &mut by_path).await, b"hello world");
}

#[tokio::test]
async fn bad_digest_or_size_leaves_nothing_behind() {
    let vfs = Vfs::in_memory().await.unwrap();

    let mut wrong_hash = text_doc("a.txt", DocId::root());
    wrong_hash.md5sum = Some(md5_of(b"something else"));
    let err = write_file(&vfs, wrong_hash, b"hello").await.unwrap_err();
    assert!(matches!(err, VfsError::InvalidHash));

    let mut wrong_size = text_doc("a.txt", DocId::root());
    wrong_size.size = 3;
    let err = write_file(&vfs, wrong_size, b"hello").await.unwrap_err();
    assert!(matches!(
        err,
        VfsError::ContentLengthMismatch {
            declared: 3,
            written: 5
        }
    ));

    assert!(!vfs.fs().exists("/a.txt").await.unwrap());
    assert!(vfs.get_file_doc_from_path("/a.txt").await.unwrap_err().is_not_found());

    // the name is free again
    write_file(&vfs, text_doc("a.txt", DocId::root()), b"ok")
        .await
        .unwrap();
}

#[tokio::test]
async fn trash_twice_fails() {
    let vfs = Vfs::in_memory().await.unwrap();
    let mut doc = write_file(&vfs, text_doc("a.txt", DocId::root()), b"x")
        .await
        .unwrap();
    let mut trashed = vfs.trash_file(&mut doc).await.unwrap();
    assert!(trashed.dir_id().is_trash());
    assert!(matches!(
        vfs.trash_file(&mut trashed).await,
        Err(VfsError::AlreadyInTrash(_))
    ));
}

#[tokio::test]
async fn restore_strips_decoration_and_avoids_collisions() {
    let vfs = Vfs::in_memory().await.unwrap();
    let mut first = write_file(&vfs, text_doc("a.txt", DocId::root()), b"1")
        .await
        .unwrap();
    vfs.trash_file(&mut first).await.unwrap();
    let mut second = write_file(&vfs, text_doc("a.txt", DocId::root()), b"2")
        .await
        .unwrap();
    let mut decorated = vfs.trash_file(&mut second).await.unwrap();
    assert_eq!(decorated.name, "a.txt (__hearth__: 1)");

    let mut restored = vfs.restore_file(&mut decorated).await.unwrap();
    assert_eq!(restored.name, "a.txt");
    assert!(restored.dir_id().is_root());
    assert!(restored.restore_path.is_empty());
    assert_eq!(read_file(&vfs, &mut restored).await, b"2");

    // the first one now finds "a.txt" taken
    let mut first_trashed = vfs.get_file_doc_from_path("/.hearth_trash/a.txt").await.unwrap();
    let restored_first = vfs.restore_file(&mut first_trashed).await.unwrap();
    assert_eq!(restored_first.name, "a.txt (1)");

    assert!(matches!(
        vfs.restore_file(&mut restored).await,
        Err(VfsError::NotInTrash(_))
    ));
}

/// Two writers open the same new path before either has written: the
/// content store's exclusive create lets only the first one in.
async fn overlapping_creates(vfs: &Vfs) {
    let mut first = vfs
        .create_file(text_doc("race.txt", DocId::root()), None)
        .await
        .unwrap();
    let second = vfs
        .create_file(text_doc("race.txt", DocId::root()), None)
        .await;
    let err = second.err().expect("second writer must be refused");
    assert!(err.is_collision(), "got {err:?}");

    first.write_all(b"first").await.unwrap();
    let mut stored = first.close().await.unwrap().unwrap();
    assert_eq!(read_file(vfs, &mut stored).await, b"first");

    let root = vfs.get_dir_doc(&DocId::root()).await.unwrap();
    let named: Vec<_> = vfs
        .list_children(&root)
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.name() == "race.txt")
        .collect();
    assert_eq!(named.len(), 1);
}

#[tokio::test]
async fn overlapping_creates_in_memory() {
    let vfs = Vfs::in_memory().await.unwrap();
    overlapping_creates(&vfs).await;
}

#[tokio::test]
async fn overlapping_creates_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let vfs = Vfs::open_local(tmp.path(), VfsConfig::default())
        .await
        .unwrap();
    overlapping_creates(&vfs).await;
}

#[tokio::test]
async fn restore_into_destroyed_parent_fails() {
    let vfs = Vfs::in_memory().await.unwrap();
    let docs = vfs
        .create_dir(DirDoc::new("docs", DocId::root(), Utc::now(), vec![]).unwrap())
        .await
        .unwrap();
    let mut file = write_file(&vfs, text_doc("a.txt", docs.id.clone()), b"keep me")
        .await
        .unwrap();
    let mut trashed = vfs.trash_file(&mut file).await.unwrap();
    assert_eq!(trashed.restore_path, "/docs");

    let docs = vfs.get_dir_doc(&docs.id).await.unwrap();
    let trashed_dir = vfs.trash_dir(&docs).await.unwrap();
    vfs.destroy_dir(&trashed_dir).await.unwrap();

    let err = vfs.restore_file(&mut trashed).await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");

    // nothing was redirected to the root
    assert!(!vfs.fs().exists("/a.txt").await.unwrap());
    assert!(vfs.fs().exists("/.hearth_trash/a.txt").await.unwrap());
    let still_trashed = vfs.get_file_doc(&trashed.id).await.unwrap();
    assert!(still_trashed.dir_id().is_trash());
    assert_eq!(still_trashed.rev, trashed.rev);
    assert_eq!(read_file(&vfs, &mut trashed).await, b"keep me");
}

#[tokio::test]
async fn stale_revision_conflicts() {
    let vfs = Vfs::in_memory().await.unwrap();
    let mut doc = write_file(&vfs, text_doc("a.txt", DocId::root()), b"x")
        .await
        .unwrap();
    let mut stale = doc.clone();
    vfs.modify_file_metadata(&mut doc, DocPatch::new().tags(vec!["new".into()]))
        .await
        .unwrap();
    let err = vfs
        .modify_file_metadata(&mut stale, DocPatch::new().tags(vec!["other".into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::Conflict(_)));
}

/// Rename a.txt to b.txt, trash it, restore it: it comes back as b.txt in
/// the root with the same content.
async fn rename_trash_restore(vfs: &Vfs) {
    let mut a = write_file(vfs, text_doc("a.txt", DocId::root()), b"payload")
        .await
        .unwrap();
    let mut b = vfs
        .modify_file_metadata(&mut a, DocPatch::new().name("b.txt"))
        .await
        .unwrap();
    assert!(!vfs.fs().exists("/a.txt").await.unwrap());

    let mut trashed = vfs.trash_file(&mut b).await.unwrap();
    assert_eq!(trashed.restore_path, "/");
    assert!(!vfs.fs().exists("/b.txt").await.unwrap());
    assert!(vfs.fs().exists("/.hearth_trash/b.txt").await.unwrap());

    let mut restored = vfs.restore_file(&mut trashed).await.unwrap();
    assert_eq!(restored.name, "b.txt");
    assert_eq!(restored.path(vfs).await.unwrap(), "/b.txt");
    assert_eq!(restored.id, a.id);
    assert_eq!(read_file(vfs, &mut restored).await, b"payload");

    vfs.destroy_file(&mut restored).await.unwrap();
    assert!(!vfs.fs().exists("/b.txt").await.unwrap());
    assert!(vfs.get_file_doc(&a.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn rename_trash_restore_in_memory() {
    let vfs = Vfs::in_memory().await.unwrap();
    rename_trash_restore(&vfs).await;
}

#[tokio::test]
async fn rename_trash_restore_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let vfs = Vfs::open_local(tmp.path(), VfsConfig::default())
        .await
        .unwrap();
    rename_trash_restore(&vfs).await;
}

#[tokio::test]
async fn replace_on_disk_keeps_identity() {
    let tmp = tempfile::tempdir().unwrap();
    let vfs = Vfs::open_local(tmp.path(), VfsConfig::default())
        .await
        .unwrap();
    let dir = vfs
        .create_dir(DirDoc::new("docs", DocId::root(), Utc::now(), vec![]).unwrap())
        .await
        .unwrap();
    let mut v1 = write_file(&vfs, text_doc("notes.md", dir.id.clone()), b"v1")
        .await
        .unwrap();

    let mut file = vfs
        .create_file(text_doc("notes.md", dir.id.clone()), Some(&mut v1))
        .await
        .unwrap();
    file.write_all(b"version two").await.unwrap();
    let mut v2 = file.close().await.unwrap().unwrap();

    assert_eq!(v2.id, v1.id);
    assert_eq!(v2.size, 11);
    assert_eq!(read_file(&vfs, &mut v2).await, b"version two");
    assert!(vfs.list_children(&dir).await.unwrap().len() == 1);

    // the data survives reopening
    drop(vfs);
    let vfs = Vfs::open_local(tmp.path(), VfsConfig::default())
        .await
        .unwrap();
    let mut again = vfs.get_file_doc_from_path("/docs/notes.md").await.unwrap();
    assert_eq!(again.rev, v2.rev);
    assert_eq!(read_file(&vfs, &mut again).await, b"version two");
}

#[tokio::test]
async fn directory_cannot_move_into_itself() {
    let vfs = Vfs::in_memory().await.unwrap();
    let outer = vfs
        .create_dir(DirDoc::new("outer", DocId::root(), Utc::now(), vec![]).unwrap())
        .await
        .unwrap();
    let inner = vfs
        .create_dir(DirDoc::new("inner", outer.id.clone(), Utc::now(), vec![]).unwrap())
        .await
        .unwrap();
    let err = vfs
        .modify_dir_metadata(&outer, DocPatch::new().dir_id(inner.id.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::ForbiddenMove(_)));
    assert_eq!(vfs.resolve_dir_path(&inner).await.unwrap(), "/outer/inner");
}
