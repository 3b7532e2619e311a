//! Metadata document store.
//!
//! One document per node. The store owns revisions: every successful write
//! mints a new one, and `update`/`delete` refuse a document whose revision
//! is not the current one. That check is the only thing standing between two
//! concurrent updaters of the same node; this crate never retries on
//! `Conflict`.

mod memory;
mod sqlite;

pub use memory::MemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

use async_trait::async_trait;
use hearth_types::DocId;

use crate::error::VfsResult;
use crate::node::{Node, Selector};

/// Metadata store operations.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetch a document by id.
    async fn get(&self, id: &DocId) -> VfsResult<Node>;

    /// Store a new document, assigning a fresh id and the first revision.
    async fn create(&self, node: Node) -> VfsResult<Node>;

    /// Store a new document under the id it already carries.
    ///
    /// Fails with `AlreadyExists` if the id is taken.
    async fn create_with_id(&self, node: Node) -> VfsResult<Node>;

    /// Replace a document. Fails with `Conflict` unless `node.rev()` is
    /// the stored revision. Returns the document with its new revision.
    async fn update(&self, node: Node) -> VfsResult<Node>;

    /// Delete a document, with the same revision check as `update`.
    async fn delete(&self, node: &Node) -> VfsResult<()>;

    /// Documents matching `selector`, at most `limit` of them.
    async fn find(&self, selector: &Selector, limit: Option<usize>) -> VfsResult<Vec<Node>>;
}
