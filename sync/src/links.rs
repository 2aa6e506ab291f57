//! Markdown link extraction and rewriting.
//!
//! Only inline links (`[text](target "title")`) are handled. Rewrites keep
//! the link text, the optional title and any `#anchor` untouched.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use utils::{relative_link, resolve_link};

/// Scheme used in remote bodies to reference another page by id.
pub const PAGE_SCHEME: &str = "page://";

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]]*)\]\(\s*([^)\s]+)(\s+"[^"]*")?\s*\)"#)
        .expect("valid link pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    /// Target without the anchor.
    pub target: String,
    pub anchor: Option<String>
}

fn split_anchor(raw: &str) -> (&str, Option<&str>) {
    match raw.find('#') {
        Some(idx) => (&raw[..idx], Some(&raw[idx + 1..])),
        None => (raw, None)
    }
}

/// Every inline link in `body`, in document order.
pub fn extract_links(body: &str) -> Vec<Link> {
    LINK_RE
        .captures_iter(body)
        .map(|caps| {
            let (target, anchor) = split_anchor(&caps[2]);
            Link {
                text: caps[1].to_string(),
                target: target.to_string(),
                anchor: anchor.map(str::to_string)
            }
        })
        .collect()
}

/// Whether a link target points at another document in the mirror.
pub fn is_local_document(target: &str) -> bool {
    !target.is_empty()
        && !target.contains("://")
        && !target.starts_with("mailto:")
        && target.to_ascii_lowercase().ends_with(".md")
}

/// Mirror-relative paths of the local documents `body` links to.
pub fn local_targets(from_path: &str, body: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for link in extract_links(body) {
        if !is_local_document(&link.target) {
            continue;
        }
        if let Some(resolved) = resolve_link(from_path, &link.target) {
            if !out.contains(&resolved) {
                out.push(resolved);
            }
        }
    }
    out
}

/// Rewrite link targets in `body`. `replace` receives the target without its
/// anchor and returns the new target, or `None` to leave the link alone.
/// Returns the new body and the number of links rewritten.
pub fn rewrite_links<F>(body: &str, mut replace: F) -> (String, usize)
where
    F: FnMut(&str) -> Option<String>
{
    let mut count = 0;
    let rewritten = LINK_RE.replace_all(body, |caps: &regex::Captures<'_>| {
        let (target, anchor) = split_anchor(&caps[2]);
        match replace(target) {
            Some(new_target) => {
                count += 1;
                let anchor = anchor.map(|a| format!("#{}", a)).unwrap_or_default();
                let title = caps.get(3).map_or("", |m| m.as_str());
                format!("[{}]({}{}{})", &caps[1], new_target, anchor, title)
            }
            None => caps[0].to_string()
        }
    });
    (rewritten.into_owned(), count)
}

/// Point links in the document at `from_path` that resolve to `old_path` at
/// `new_path` instead.
pub fn repoint(body: &str, from_path: &str, old_path: &str, new_path: &str) -> (String, usize) {
    rewrite_links(body, |target| {
        if !is_local_document(target) {
            return None;
        }
        match resolve_link(from_path, target) {
            Some(resolved) if resolved == old_path => Some(relative_link(from_path, new_path)),
            _ => None
        }
    })
}

/// Turn `page://<id>` links into relative links for the document at
/// `from_path`. Ids without a known path are left as they are and returned.
pub fn to_local_links(
    body: &str,
    from_path: &str,
    id_to_path: &HashMap<String, String>
) -> (String, Vec<String>) {
    let mut unresolved = Vec::new();
    let (text, _) = rewrite_links(body, |target| {
        let id = target.strip_prefix(PAGE_SCHEME)?;
        match id_to_path.get(id) {
            Some(path) => Some(relative_link(from_path, path)),
            None => {
                unresolved.push(id.to_string());
                None
            }
        }
    });
    (text, unresolved)
}

/// Turn relative links to known documents into `page://<id>` links.
/// Local document links that `lookup` cannot resolve are returned.
pub fn to_remote_links<F>(body: &str, from_path: &str, lookup: F) -> (String, Vec<String>)
where
    F: Fn(&str) -> Option<String>
{
    let mut unresolved = Vec::new();
    let (text, _) = rewrite_links(body, |target| {
        if !is_local_document(target) {
            return None;
        }
        let resolved = resolve_link(from_path, target)?;
        match lookup(&resolved) {
            Some(id) => Some(format!("{}{}", PAGE_SCHEME, id)),
            None => {
                unresolved.push(resolved);
                None
            }
        }
    });
    (text, unresolved)
}
