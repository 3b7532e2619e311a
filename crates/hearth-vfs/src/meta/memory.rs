//! In-memory metadata store.
//!
//! Documents are kept serialized, like a real document database would, so
//! transient fields (the parent cache) never leak between readers.

use async_trait::async_trait;
use hearth_types::{DocId, Revision};
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::MetadataStore;
use crate::error::{VfsError, VfsResult};
use crate::node::{Node, Selector};

/// In-memory metadata store. All data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    docs: RwLock<BTreeMap<DocId, serde_json::Value>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    fn decode(value: &serde_json::Value) -> VfsResult<Node> {
        Ok(serde_json::from_value(value.clone())?)
    }

    fn check_rev(stored: &serde_json::Value, node: &Node) -> VfsResult<()> {
        let current = Self::decode(stored)?;
        if current.rev() != node.rev() {
            return Err(VfsError::conflict(format!(
                "{}: revision {} is stale (current {})",
                node.id(),
                node.rev(),
                current.rev()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get(&self, id: &DocId) -> VfsResult<Node> {
        let docs = self.docs.read();
        let value = docs
            .get(id)
            .ok_or_else(|| VfsError::not_found(format!("document {id}")))?;
        Self::decode(value)
    }

    async fn create(&self, mut node: Node) -> VfsResult<Node> {
        node.set_id(DocId::generate());
        self.create_with_id(node).await
    }

    async fn create_with_id(&self, mut node: Node) -> VfsResult<Node> {
        if node.id().is_empty() {
            return Err(VfsError::other("create_with_id needs an id"));
        }
        node.set_rev(Revision::none().next());
        let value = serde_json::to_value(&node)?;
        let mut docs = self.docs.write();
        if docs.contains_key(node.id()) {
            return Err(VfsError::already_exists(format!("document {}", node.id())));
        }
        docs.insert(node.id().clone(), value);
        Ok(node)
    }

    async fn update(&self, mut node: Node) -> VfsResult<Node> {
        let mut docs = self.docs.write();
        let stored = docs
            .get(node.id())
            .ok_or_else(|| VfsError::not_found(format!("document {}", node.id())))?;
        Self::check_rev(stored, &node)?;
        node.set_rev(node.rev().next());
        let value = serde_json::to_value(&node)?;
        docs.insert(node.id().clone(), value);
        Ok(node)
    }

    async fn delete(&self, node: &Node) -> VfsResult<()> {
        let mut docs = self.docs.write();
        let stored = docs
            .get(node.id())
            .ok_or_else(|| VfsError::not_found(format!("document {}", node.id())))?;
        Self::check_rev(stored, node)?;
        docs.remove(node.id());
        Ok(())
    }

    async fn find(&self, selector: &Selector, limit: Option<usize>) -> VfsResult<Vec<Node>> {
        let docs = self.docs.read();
        let mut out = Vec::new();
        for value in docs.values() {
            if limit.is_some_and(|l| out.len() >= l) {
                break;
            }
            let node = Self::decode(value)?;
            if selector.matches(&node) {
                out.push(node);
            }
        }
        Ok(out)
    }
}
