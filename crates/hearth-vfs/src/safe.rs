//! Content-store primitives that never overwrite.
//!
//! Every path that reaches the content store from the VFS layer goes
//! through one of these.

use hearth_types::constants::{DIR_MODE, EXECUTABLE_FILE_MODE, FILE_MODE};

use crate::content::{ContentStore, ContentWriter};
use crate::error::{VfsError, VfsResult};
use crate::vpath;

/// Permission bits for a file with the given executable flag.
pub fn file_mode(executable: bool) -> u32 {
    if executable {
        EXECUTABLE_FILE_MODE
    } else {
        FILE_MODE
    }
}

/// Open a new file write-only, failing with `AlreadyExists` if anything is
/// at `path` already.
pub async fn safe_create_file(
    fs: &dyn ContentStore,
    path: &str,
    executable: bool,
) -> VfsResult<Box<dyn ContentWriter>> {
    fs.create_exclusive(path, file_mode(executable)).await
}

/// Create a directory, failing with `AlreadyExists` if `path` is taken.
pub async fn safe_mkdir(fs: &dyn ContentStore, path: &str) -> VfsResult<()> {
    let path = absolute(path)?;
    fs.mkdir(&path, DIR_MODE).await
}

/// Move `old` to `new` unless `new` is occupied.
///
/// Both paths are cleaned first and must be absolute.
pub async fn safe_rename(fs: &dyn ContentStore, old: &str, new: &str) -> VfsResult<()> {
    let old = absolute(old)?;
    let new = absolute(new)?;
    if fs.exists(&new).await? {
        return Err(VfsError::already_exists(new));
    }
    fs.rename(&old, &new).await
}

fn absolute(path: &str) -> VfsResult<String> {
    let cleaned = vpath::clean(path);
    if !vpath::is_abs(&cleaned) {
        return Err(VfsError::non_absolute(path));
    }
    Ok(cleaned)
}
