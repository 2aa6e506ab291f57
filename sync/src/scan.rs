//! Push-side scan of the mirror for documents with local changes.

use crate::error::{Result, SyncError};
use crate::frontmatter::{self, FrontMatter};
use crate::paths::resolve_in_root;
use crate::rename::markdown_files;
use crate::state::MirrorState;
use chrono::{DateTime, Duration, Utc};
use mirror_core::types::{CandidateKind, PushCandidate};
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub candidates: Vec<PushCandidate>,
    pub warnings: Vec<String>
}

/// Whether a synced document has edits that were never pushed.
///
/// The file must have been modified more than `tolerance_seconds` after
/// `synced_at`, and when a body hash was recorded at sync time the body must
/// also differ from it. Without `synced_at` only the hash decides.
pub fn is_locally_modified(
    modified: SystemTime,
    front_matter: &FrontMatter,
    body: &str,
    recorded_hash: Option<&str>,
    tolerance_seconds: u64
) -> bool {
    let body_changed = || recorded_hash.is_none_or(|h| h != utils::compute_content_hash(body));

    let Some(synced_at) = front_matter.synced_at else {
        return body_changed();
    };
    let modified: DateTime<Utc> = modified.into();
    let tolerance = Duration::seconds(i64::try_from(tolerance_seconds).unwrap_or(i64::MAX / 1000));
    if modified <= synced_at + tolerance {
        return false;
    }
    body_changed()
}

/// Check a single document on disk, as used by the deletion guard.
pub fn document_has_local_edits(
    root: &Path,
    relative: &str,
    recorded_hash: Option<&str>,
    tolerance_seconds: u64
) -> bool {
    let Ok(path) = resolve_in_root(root, relative) else {
        return false;
    };
    let (Ok(text), Ok(meta)) = (std::fs::read_to_string(&path), std::fs::metadata(&path)) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    match frontmatter::parse(relative, &text) {
        Ok(doc) => {
            let fm = doc.front_matter.unwrap_or_default();
            is_locally_modified(modified, &fm, &doc.body, recorded_hash, tolerance_seconds)
        }
        // A document we cannot parse has been edited by hand.
        Err(_) => true
    }
}

/// Collect push candidates: documents without a page id are new; synced
/// documents are modified when [`is_locally_modified`] says so.
///
/// With `only`, just that document is considered and a synced document is a
/// candidate whether or not it looks edited.
pub fn scan_candidates(
    root: &Path,
    state: &MirrorState,
    tolerance_seconds: u64,
    only: Option<&str>
) -> Result<ScanResult> {
    let files = match only {
        Some(relative) => {
            let normalized = utils::normalize_relative(relative)
                .ok_or_else(|| errors::MirrorError::PathEscapesRoot {
                    path: relative.to_string()
                })?;
            if !resolve_in_root(root, &normalized)?.is_file() {
                return Err(SyncError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no document at {}", normalized)
                )));
            }
            vec![normalized]
        }
        None => markdown_files(root)
    };

    let mut result = ScanResult::default();
    for relative in files {
        let path = root.join(&relative);
        let text = std::fs::read_to_string(&path)?;
        let doc = match frontmatter::parse(&relative, &text) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("skipping {}: {}", relative, e);
                result.warnings.push(e.to_string());
                continue;
            }
        };

        let title = doc.title().unwrap_or_else(|| title_from_path(&relative));
        let fm = doc.front_matter.clone().unwrap_or_default();

        let Some(page_id) = fm.page_id.clone() else {
            result.candidates.push(PushCandidate {
                path: relative,
                kind: CandidateKind::New,
                title,
                page_id: None,
                version: None,
                body: doc.body
            });
            continue;
        };

        let edited = only.is_some() || {
            let modified = std::fs::metadata(&path)?.modified()?;
            is_locally_modified(
                modified,
                &fm,
                &doc.body,
                state.hash_of(&page_id),
                tolerance_seconds
            )
        };
        if edited {
            result.candidates.push(PushCandidate {
                path: relative,
                kind: CandidateKind::Modified,
                title,
                page_id: Some(page_id),
                version: fm.version,
                body: doc.body
            });
        }
    }

    tracing::debug!("scan found {} push candidates", result.candidates.len());
    Ok(result)
}

fn title_from_path(relative: &str) -> String {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    let stem = name.strip_suffix(".md").unwrap_or(name);
    let words: Vec<String> = stem
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new()
            }
        })
        .collect();
    if words.is_empty() {
        "Untitled".to_string()
    } else {
        words.join(" ")
    }
}
