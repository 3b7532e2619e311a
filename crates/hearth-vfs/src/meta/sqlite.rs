//! SQLite metadata store.
//!
//! Documents are stored as JSON bodies, with the fields selectors filter on
//! (`type`, `dir_id`, `name`) and the revision copied into indexed columns.

use async_trait::async_trait;
use hearth_types::{DocId, Revision};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};
use std::path::Path;

use super::MetadataStore;
use crate::error::{VfsError, VfsResult};
use crate::node::{Node, Selector};

const SCHEMA: &str = r#"
-- One row per file or directory node
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    rev TEXT NOT NULL,
    type TEXT NOT NULL,
    dir_id TEXT NOT NULL,
    name TEXT NOT NULL,
    body TEXT NOT NULL,
    written_at INTEGER DEFAULT (unixepoch())
);
CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(dir_id, type, name);
"#;

/// Metadata store persisted in a SQLite database.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMetadataStore").finish_non_exhaustive()
    }
}

impl SqliteMetadataStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> VfsResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> VfsResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn insert(&self, node: &Node) -> VfsResult<()> {
        let body = serde_json::to_string(node)?;
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO nodes (id, rev, type, dir_id, name, body) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                node.id().as_str(),
                node.rev().as_str(),
                node.node_type().to_string(),
                node.dir_id().as_str(),
                node.name(),
                body,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(VfsError::already_exists(format!("document {}", node.id())))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Distinguish "stale revision" from "no such document" after a
    /// revision-guarded statement touched no row.
    fn missed_row(conn: &Connection, node: &Node) -> VfsError {
        let current: Result<Option<String>, rusqlite::Error> = conn
            .query_row(
                "SELECT rev FROM nodes WHERE id = ?1",
                params![node.id().as_str()],
                |row| row.get(0),
            )
            .optional();
        match current {
            Ok(Some(rev)) => VfsError::conflict(format!(
                "{}: revision {} is stale (current {rev})",
                node.id(),
                node.rev()
            )),
            Ok(None) => VfsError::not_found(format!("document {}", node.id())),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, id: &DocId) -> VfsResult<Node> {
        let body: Option<String> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT body FROM nodes WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?
        };
        let body = body.ok_or_else(|| VfsError::not_found(format!("document {id}")))?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn create(&self, mut node: Node) -> VfsResult<Node> {
        node.set_id(DocId::generate());
        node.set_rev(Revision::none().next());
        self.insert(&node)?;
        Ok(node)
    }

    async fn create_with_id(&self, mut node: Node) -> VfsResult<Node> {
        if node.id().is_empty() {
            return Err(VfsError::other("create_with_id needs an id"));
        }
        node.set_rev(Revision::none().next());
        self.insert(&node)?;
        Ok(node)
    }

    async fn update(&self, node: Node) -> VfsResult<Node> {
        let expected = node.rev().clone();
        let mut next = node;
        next.set_rev(expected.next());
        let body = serde_json::to_string(&next)?;

        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE nodes SET rev = ?1, type = ?2, dir_id = ?3, name = ?4, body = ?5,
                 written_at = unixepoch()
             WHERE id = ?6 AND rev = ?7",
            params![
                next.rev().as_str(),
                next.node_type().to_string(),
                next.dir_id().as_str(),
                next.name(),
                body,
                next.id().as_str(),
                expected.as_str(),
            ],
        )?;
        if changed == 0 {
            next.set_rev(expected);
            return Err(Self::missed_row(&conn, &next));
        }
        Ok(next)
    }

    async fn delete(&self, node: &Node) -> VfsResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM nodes WHERE id = ?1 AND rev = ?2",
            params![node.id().as_str(), node.rev().as_str()],
        )?;
        if changed == 0 {
            return Err(Self::missed_row(&conn, node));
        }
        Ok(())
    }

    async fn find(&self, selector: &Selector, limit: Option<usize>) -> VfsResult<Vec<Node>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(dir_id) = &selector.dir_id {
            values.push(dir_id.to_string());
            clauses.push(format!("dir_id = ?{}", values.len()));
        }
        if let Some(name) = &selector.name {
            values.push(name.clone());
            clauses.push(format!("name = ?{}", values.len()));
        }
        if let Some(node_type) = selector.node_type {
            values.push(node_type.to_string());
            clauses.push(format!("type = ?{}", values.len()));
        }

        let mut sql = String::from("SELECT body FROM nodes");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        // LIMIT -1 is "no limit" in SQLite
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        sql.push_str(&format!(" ORDER BY name, id LIMIT {limit}"));

        let bodies: Vec<String> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(VfsError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::DirDoc;
    use crate::file::FileDoc;
    use chrono::Utc;
    use hearth_types::NodeType;

    fn file(name: &str) -> Node {
        Node::File(
            FileDoc::new(
                name,
                DocId::root(),
                3,
                None,
                "text/plain",
                "text",
                Utc::now(),
                false,
                vec!["b".into(), "a".into(), "b".into()],
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_roundtrip_document() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let created = store.create(file("notes.txt")).await.unwrap();
        let fetched = store.get(created.id()).await.unwrap().into_file().unwrap();
        assert_eq!(fetched.name, "notes.txt");
        assert_eq!(fetched.size, 3);
        assert_eq!(fetched.tags, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(&fetched.rev, created.rev());
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let v1 = store.create(file("a")).await.unwrap();
        let v2 = store.update(v1.clone()).await.unwrap();
        assert_eq!(v2.rev().generation(), 2);
        assert!(matches!(
            store.update(v1).await.unwrap_err(),
            VfsError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let mut ghost = file("ghost");
        ghost.set_id(DocId::from("nope"));
        ghost.set_rev(Revision::new("1-x"));
        assert!(store.update(ghost).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_with_id_duplicate() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let mut root = Node::Directory(DirDoc::root(Utc::now()));
        root.set_id(DocId::root());
        store.create_with_id(root.clone()).await.unwrap();
        assert!(store.create_with_id(root).await.unwrap_err().is_collision());
    }

    #[tokio::test]
    async fn test_find_and_delete() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let a = store.create(file("a")).await.unwrap();
        store.create(file("b")).await.unwrap();

        let found = store
            .find(&Selector::child(DocId::root(), "a", NodeType::File), Some(1))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), a.id());

        store.delete(&a).await.unwrap();
        let rest = store
            .find(&Selector::children_of(DocId::root()), None)
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name(), "b");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.db");
        let id = {
            let store = SqliteMetadataStore::open(&path).unwrap();
            store.create(file("kept")).await.unwrap().id().clone()
        };
        let store = SqliteMetadataStore::open(&path).unwrap();
        assert_eq!(store.get(&id).await.unwrap().name(), "kept");
    }
}
