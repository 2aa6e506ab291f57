//! # Page Mirror Utilities
//!
//! Common helpers for hashing, slug generation and slash-separated relative
//! paths.
//!
//! Relative paths handled here always use `/` as the separator, regardless of
//! platform, because they are what the mirror state file records.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of content string
///
/// # Examples
///
/// ```
/// use utils::compute_content_hash;
///
/// let hash = compute_content_hash("hello world");
/// assert_eq!(hash.len(), 64);
/// ```
#[must_use]
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Turn a page title into a filesystem-safe slug.
///
/// Lowercases, maps whitespace, `-` and `_` to single hyphens and drops every
/// other non-alphanumeric character. An empty result becomes `untitled`.
///
/// ```
/// assert_eq!(utils::slugify("Getting Started: Part 1"), "getting-started-part-1");
/// assert_eq!(utils::slugify("???"), "untitled");
/// ```
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(ch.to_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Normalize a slash-separated relative path, resolving `.` and `..`.
///
/// Returns `None` when the path is absolute, empty, or climbs above its
/// starting directory.
#[must_use]
pub fn normalize_relative(path: &str) -> Option<String> {
    if path.starts_with('/') || path.starts_with('\\') || path.contains(':') {
        return None;
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other)
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Directory part of a relative file path (`""` for top-level files).
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// Resolve a link `target` written inside the document at `from_file`.
///
/// ```
/// assert_eq!(
///     utils::resolve_link("guides/setup.md", "../api/auth.md").as_deref(),
///     Some("api/auth.md")
/// );
/// ```
#[must_use]
pub fn resolve_link(from_file: &str, target: &str) -> Option<String> {
    let dir = parent_dir(from_file);
    if dir.is_empty() {
        normalize_relative(target)
    } else {
        normalize_relative(&format!("{}/{}", dir, target))
    }
}

/// Relative link from the document at `from_file` to the document at `to_file`.
///
/// ```
/// assert_eq!(utils::relative_link("guides/setup.md", "api/auth.md"), "../api/auth.md");
/// assert_eq!(utils::relative_link("a/b.md", "a/c.md"), "c.md");
/// ```
#[must_use]
pub fn relative_link(from_file: &str, to_file: &str) -> String {
    let from_dir: Vec<&str> = parent_dir(from_file)
        .split('/')
        .filter(|p| !p.is_empty())
        .collect();
    let to_parts: Vec<&str> = to_file.split('/').filter(|p| !p.is_empty()).collect();

    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    // Never treat the file name itself as a shared directory.
    let common = common.min(to_parts.len().saturating_sub(1));

    let mut segments: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        segments.push("..");
    }
    segments.extend(&to_parts[common..]);
    segments.join("/")
}
