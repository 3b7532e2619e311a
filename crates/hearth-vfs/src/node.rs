//! The stored document envelope and the selectors used to find documents.

use hearth_types::{DocId, NodeType, Revision};
use serde::{Deserialize, Serialize};

use crate::dir::DirDoc;
use crate::file::FileDoc;

/// A metadata document as held by the metadata store.
///
/// Serialized with a `type` tag of `"file"` or `"directory"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    File(FileDoc),
    Directory(DirDoc),
}

impl Node {
    pub fn id(&self) -> &DocId {
        match self {
            Node::File(f) => &f.id,
            Node::Directory(d) => &d.id,
        }
    }

    pub fn rev(&self) -> &Revision {
        match self {
            Node::File(f) => &f.rev,
            Node::Directory(d) => &d.rev,
        }
    }

    pub fn set_id(&mut self, id: DocId) {
        match self {
            Node::File(f) => f.id = id,
            Node::Directory(d) => d.id = id,
        }
    }

    pub fn set_rev(&mut self, rev: Revision) {
        match self {
            Node::File(f) => f.rev = rev,
            Node::Directory(d) => d.rev = rev,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::File(f) => &f.name,
            Node::Directory(d) => &d.name,
        }
    }

    pub fn dir_id(&self) -> &DocId {
        match self {
            Node::File(f) => f.dir_id(),
            Node::Directory(d) => &d.dir_id,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Node::File(_) => NodeType::File,
            Node::Directory(_) => NodeType::Directory,
        }
    }

    pub fn into_file(self) -> Option<FileDoc> {
        match self {
            Node::File(f) => Some(f),
            Node::Directory(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<DirDoc> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }
}

impl From<FileDoc> for Node {
    fn from(f: FileDoc) -> Self {
        Node::File(f)
    }
}

impl From<DirDoc> for Node {
    fn from(d: DirDoc) -> Self {
        Node::Directory(d)
    }
}

/// Equality selector over the indexed document fields.
///
/// Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub dir_id: Option<DocId>,
    pub name: Option<String>,
    pub node_type: Option<NodeType>,
}

impl Selector {
    /// Every node whose parent is `dir_id`.
    pub fn children_of(dir_id: DocId) -> Self {
        Self {
            dir_id: Some(dir_id),
            ..Default::default()
        }
    }

    /// The sibling of the given type named `name` under `dir_id`.
    pub fn child(dir_id: DocId, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            dir_id: Some(dir_id),
            name: Some(name.into()),
            node_type: Some(node_type),
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.dir_id.as_ref().is_none_or(|d| d == node.dir_id())
            && self.name.as_deref().is_none_or(|n| n == node.name())
            && self.node_type.is_none_or(|t| t == node.node_type())
    }
}
