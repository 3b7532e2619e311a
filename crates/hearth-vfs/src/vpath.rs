//! Slash-separated logical paths.
//!
//! Content-store keys are logical paths like `/photos/cat.jpg`, independent
//! of the host OS separator, so these helpers work on `&str` rather than
//! `std::path::Path`.

/// Lexically normalize a path: collapse `//`, drop `.`, resolve `..`.
///
/// An absolute input stays absolute and never climbs above `/`. The empty
/// string normalizes to `.`.
pub fn clean(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

pub fn is_abs(path: &str) -> bool {
    path.starts_with('/')
}

/// Join a parent path and a leaf name, then clean the result.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        return clean(name);
    }
    clean(&format!("{parent}/{name}"))
}

/// Everything but the last element (`/a/b` → `/a`, `/a` → `/`).
pub fn dir(path: &str) -> String {
    let cleaned = clean(path);
    match cleaned.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => cleaned[..i].to_string(),
        None => ".".to_string(),
    }
}

/// The last element (`/a/b` → `b`, `/` → `/`).
pub fn base(path: &str) -> String {
    let cleaned = clean(path);
    if cleaned == "/" {
        return cleaned;
    }
    match cleaned.rfind('/') {
        Some(i) => cleaned[i + 1..].to_string(),
        None => cleaned,
    }
}

/// True when `path` is `ancestor` itself or lies somewhere below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return is_abs(path);
    }
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}
