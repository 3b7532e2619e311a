//! Node names: validation, tag normalization, and collision-safe renaming.

use std::future::Future;

use tracing::debug;

use crate::error::{VfsError, VfsResult};

/// Marker placed inside the suffix given to names moved into the trash.
const TRASH_SUFFIX_MARKER: &str = "__hearth__";

/// Check that `name` can be a node name.
///
/// Rejects the empty name, `.`, `..`, and names containing `/`, NUL or
/// other control characters.
pub fn check_file_name(name: &str) -> VfsResult<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(VfsError::InvalidName(name.to_string()));
    }
    if name.contains('/') || name.chars().any(char::is_control) {
        return Err(VfsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Drop duplicate tags, keeping the first occurrence of each.
pub fn unique_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// How an alternate name is built from a candidate and an attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixPattern {
    /// `"{name} (__hearth__: {n})"`, used inside the trash and removed again
    /// on restore.
    Trash,
    /// `"{name} ({n})"`, used when restoring next to an existing sibling.
    Counter,
}

impl SuffixPattern {
    pub fn apply(self, name: &str, n: usize) -> String {
        match self {
            SuffixPattern::Trash => format!("{name} ({TRASH_SUFFIX_MARKER}: {n})"),
            SuffixPattern::Counter => format!("{name} ({n})"),
        }
    }
}

/// Remove a trailing [`SuffixPattern::Trash`] decoration, if any.
pub fn strip_conflict_suffix(name: &str) -> &str {
    let Some(body) = name.strip_suffix(')') else {
        return name;
    };
    let Some(open) = body.rfind(&format!(" ({TRASH_SUFFIX_MARKER}: ")) else {
        return name;
    };
    let digits = &body[open + TRASH_SUFFIX_MARKER.len() + 4..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || open == 0 {
        return name;
    }
    &name[..open]
}

/// Run `op` with `candidate`, then with decorated names while it keeps
/// failing on a name collision.
///
/// Any other error is returned as is. After `max_attempts` decorated names
/// have collided too, gives up with [`VfsError::SuffixExhausted`].
pub async fn try_or_use_suffix<T, F, Fut>(
    candidate: &str,
    pattern: SuffixPattern,
    max_attempts: usize,
    mut op: F,
) -> VfsResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = VfsResult<T>>,
{
    match op(candidate.to_string()).await {
        Err(e) if e.is_collision() => {
            debug!(candidate, "name taken, trying suffixes");
        }
        other => return other,
    }
    for n in 1..=max_attempts {
        let name = pattern.apply(candidate, n);
        match op(name).await {
            Err(e) if e.is_collision() => continue,
            other => return other,
        }
    }
    Err(VfsError::SuffixExhausted {
        name: candidate.to_string(),
        attempts: max_attempts,
    })
}
