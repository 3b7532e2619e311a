//! The VFS context: a metadata store, a content store, and configuration.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use hearth_types::DocId;
use hearth_types::constants::TRASH_DIR_PATH;
use tracing::{debug, info};

use crate::config::VfsConfig;
use crate::content::{ContentStore, LocalContentStore, MemoryContentStore};
use crate::dir::DirDoc;
use crate::error::{VfsError, VfsResult};
use crate::meta::{MemoryMetadataStore, MetadataStore, SqliteMetadataStore};
use crate::node::Node;
use crate::safe::safe_mkdir;

/// File name of the metadata database inside a data dir.
pub const METADATA_DB_FILE: &str = "metadata.db";

/// Sub-directory of a data dir holding file content.
pub const CONTENT_DIR: &str = "files";

/// Handle on one tenant's file tree.
///
/// Every VFS operation is a method on this type. Cloning is cheap: clones
/// share both stores.
#[derive(Clone)]
pub struct Vfs {
    meta: Arc<dyn MetadataStore>,
    fs: Arc<dyn ContentStore>,
    config: Arc<VfsConfig>,
}

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vfs")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Vfs {
    pub fn new(
        meta: Arc<dyn MetadataStore>,
        fs: Arc<dyn ContentStore>,
        config: VfsConfig,
    ) -> Self {
        Self {
            meta,
            fs,
            config: Arc::new(config),
        }
    }

    /// A VFS over in-memory stores, already initialized.
    pub async fn in_memory() -> VfsResult<Self> {
        let vfs = Self::new(
            Arc::new(MemoryMetadataStore::new()),
            Arc::new(MemoryContentStore::new()),
            VfsConfig::default(),
        );
        vfs.init().await?;
        Ok(vfs)
    }

    /// Open (creating if needed) a VFS persisted under `data_dir`: SQLite
    /// metadata plus a content directory. Initializes it.
    pub async fn open_local(data_dir: impl AsRef<Path>, config: VfsConfig) -> VfsResult<Self> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;
        let meta = SqliteMetadataStore::open(data_dir.join(METADATA_DB_FILE))?;
        let fs = LocalContentStore::open(data_dir.join(CONTENT_DIR)).await?;
        let vfs = Self::new(Arc::new(meta), Arc::new(fs), config);
        vfs.init().await?;
        info!(data_dir = %data_dir.display(), "opened local vfs");
        Ok(vfs)
    }

    /// Create the root and trash directories if they do not exist yet.
    ///
    /// Safe to call on an already initialized tree.
    pub async fn init(&self) -> VfsResult<()> {
        let now = Utc::now();
        for dir in [DirDoc::root(now), DirDoc::trash(now)] {
            let id = dir.id.clone();
            match self.meta.create_with_id(Node::Directory(dir)).await {
                Ok(_) => debug!(%id, "created reserved directory"),
                Err(e) if e.is_collision() => {}
                Err(e) => return Err(e),
            }
        }
        match safe_mkdir(self.fs(), TRASH_DIR_PATH).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_collision() => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn meta(&self) -> &dyn MetadataStore {
        self.meta.as_ref()
    }

    pub fn fs(&self) -> &dyn ContentStore {
        self.fs.as_ref()
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Fetch any node by id.
    pub async fn get_node(&self, id: &DocId) -> VfsResult<Node> {
        if id.is_empty() {
            return Err(VfsError::not_found("empty document id"));
        }
        self.meta.get(id).await
    }
}
