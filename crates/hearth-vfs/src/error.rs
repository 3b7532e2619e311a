//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Document or content entry not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already occupied (content-store collision).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Stale revision, or a concurrent writer won the race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The node already lives under the trash directory.
    #[error("already in trash: {0}")]
    AlreadyInTrash(String),

    /// The node is not in the trash, so it cannot be restored.
    #[error("not in trash: {0}")]
    NotInTrash(String),

    /// Node name rejected by validation.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// A path that had to be absolute was not.
    #[error("path is not absolute: {0}")]
    NonAbsolutePath(String),

    /// Declared digest differs from the digest of the written bytes.
    #[error("invalid hash: content digest does not match the declared one")]
    InvalidHash,

    /// Declared size differs from the number of written bytes.
    #[error("content length mismatch: declared {declared}, written {written}")]
    ContentLengthMismatch { declared: i64, written: i64 },

    /// Handle used in the wrong mode (write on a reader, read on a writer).
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// Update time earlier than creation time.
    #[error("illegal time: updated_at is before created_at")]
    IllegalTime,

    /// Move that would break the tree (into itself, or of a reserved dir).
    #[error("forbidden move: {0}")]
    ForbiddenMove(String),

    /// Parent chain longer than the configured bound, most likely a cycle.
    #[error("parent chain exceeds {max_depth} levels at {id}")]
    CyclicTree { id: String, max_depth: usize },

    /// The conflict namer ran out of alternate names.
    #[error("no free name for {name:?} after {attempts} attempts")]
    SuffixExhausted { name: String, attempts: usize },

    /// A write failed earlier on this handle; reported again at close.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// SQLite error from the metadata store.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a Conflict error.
    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    /// Create a NonAbsolutePath error.
    pub fn non_absolute(path: impl Into<String>) -> Self {
        Self::NonAbsolutePath(path.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for errors caused by a name already being taken.
    ///
    /// These are the only errors the conflict namer swallows and retries.
    pub fn is_collision(&self) -> bool {
        match self {
            Self::AlreadyExists(_) => true,
            Self::Io(e) => e.kind() == io::ErrorKind::AlreadyExists,
            _ => false,
        }
    }

    /// True for "does not exist" errors, whichever layer produced them.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::NonAbsolutePath(msg) | VfsError::InvalidName(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            VfsError::InvalidOperation(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            VfsError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
