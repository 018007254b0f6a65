//! Slash-separated virtual path helpers
//!
//! Virtual paths are always relative, use `/` as separator and never contain
//! `.` or `..` segments. The root of every filesystem is spelled `"."`.

/// The distinguished root path
pub const ROOT: &str = ".";

/// Check whether `name` is a valid virtual path.
///
/// `"."` is the root. Any other path must be a non-empty sequence of
/// non-empty segments separated by single slashes, none of them `.` or `..`.
pub fn valid_path(name: &str) -> bool {
    if name == ROOT {
        return true;
    }
    if name.is_empty() {
        return false;
    }
    name.split('/')
        .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// Last segment of a path; the root is its own base name.
pub fn base(name: &str) -> &str {
    let trimmed = name.trim_end_matches('/');
    if trimmed.is_empty() {
        return if name.is_empty() { ROOT } else { "/" };
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Extension of the last segment, including the leading dot.
///
/// Returns an empty string when the last segment has no dot.
pub fn ext(name: &str) -> &str {
    let last = match name.rfind('/') {
        Some(idx) => &name[idx + 1..],
        None => name,
    };
    match last.rfind('.') {
        Some(idx) => &last[idx..],
        None => "",
    }
}

/// Join two virtual paths, treating the root as the empty prefix.
pub fn join(parent: &str, child: &str) -> String {
    match (parent, child) {
        (ROOT, ROOT) | ("", ROOT) | (ROOT, "") => ROOT.to_string(),
        (ROOT, c) | ("", c) => c.to_string(),
        (p, ROOT) | (p, "") => p.to_string(),
        (p, c) => format!("{}/{}", p, c),
    }
}

/// Parent of a path; the parent of a single segment is the root.
pub fn parent(name: &str) -> &str {
    match name.rfind('/') {
        Some(idx) => &name[..idx],
        None => ROOT,
    }
}
