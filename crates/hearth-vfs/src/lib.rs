//! # hearth-vfs
//!
//! Virtual filesystem core for hearth.
//!
//! Each tenant's file tree is split across two stores that share no
//! transactions:
//! - a **metadata store** holding one document per file or directory, with
//!   optimistic revisions ([`MetadataStore`])
//! - a **content store** holding the bytes, keyed by logical path
//!   ([`ContentStore`])
//!
//! [`Vfs`] keeps the two consistent. Creation relies on exclusive creates
//! in the content store, replacement goes through a backup rename
//! ([`Vfs::create_file`]), and concurrent updaters of a document are caught
//! by its revision. Deleting is a move into the trash
//! ([`Vfs::trash_file`]), undone by [`Vfs::restore_file`] and made final
//! by [`Vfs::destroy_file`].
//!
//! ```no_run
//! # async fn demo() -> hearth_vfs::VfsResult<()> {
//! use chrono::Utc;
//! use hearth_vfs::{DocId, FileDoc, Vfs};
//!
//! let vfs = Vfs::in_memory().await?;
//! let doc = FileDoc::new("a.txt", DocId::root(), -1, None, "text/plain", "text",
//!                        Utc::now(), false, vec![])?;
//! let mut file = vfs.create_file(doc, None).await?;
//! file.write_all(b"hello").await?;
//! let mut stored = file.close().await?.expect("write handles return the document");
//! let trashed = vfs.trash_file(&mut stored).await?;
//! # let _ = trashed;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod content;
pub mod digest;
pub mod dir;
pub mod error;
pub mod file;
pub mod handle;
pub mod meta;
pub mod naming;
pub mod node;
pub mod patch;
pub mod path;
pub mod safe;
pub mod serve;
pub mod vfs;
pub mod vpath;

pub use config::VfsConfig;
pub use content::{
    ContentReader, ContentStore, ContentWriter, EntryKind, FileAttr, LocalContentStore,
    MemoryContentStore,
};
pub use dir::DirDoc;
pub use error::{VfsError, VfsResult};
pub use file::FileDoc;
pub use handle::File;
pub use meta::{MemoryMetadataStore, MetadataStore, SqliteMetadataStore};
pub use naming::SuffixPattern;
pub use node::{Node, Selector};
pub use patch::DocPatch;
pub use serve::{ContentRequest, ContentResponse, Disposition};
pub use vfs::Vfs;

pub use hearth_types::{DocId, NodeType, ResourceIdentifier, Revision};
