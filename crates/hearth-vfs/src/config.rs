//! VFS configuration.
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! data_dir = "/var/lib/hearth"
//! max_depth = 256
//! max_suffix_attempts = 1024
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VfsError, VfsResult};

/// Default bound on parent-chain walks.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default bound on conflict-namer retries.
pub const DEFAULT_MAX_SUFFIX_ATTEMPTS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Where on-disk backends keep their data. Unused by in-memory stores.
    pub data_dir: Option<PathBuf>,
    /// Longest parent chain the path resolver follows before giving up.
    pub max_depth: usize,
    /// Alternate names the conflict namer tries before giving up.
    pub max_suffix_attempts: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_suffix_attempts: DEFAULT_MAX_SUFFIX_ATTEMPTS,
        }
    }
}

impl VfsConfig {
    pub fn from_toml_str(text: &str) -> VfsResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| VfsError::other(format!("invalid config: {e}")))?;
        if config.max_depth == 0 {
            return Err(VfsError::other("invalid config: max_depth must be positive"));
        }
        Ok(config)
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| VfsError::other(format!("{}: {e}", path.display())))
    }
}
