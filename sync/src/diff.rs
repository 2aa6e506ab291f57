//! Pull-side classification of remote pages against the local mirror.

use crate::frontmatter;
use crate::paths::resolve_in_root;
use mirror_core::types::{ChangeEntry, ChangeSet, PageState, RemoteNode};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Pages reported as modified even when versions match.
    pub force: HashSet<String>,
    /// Restrict the diff to these pages.
    pub only: Option<HashSet<String>>,
    /// Ignore every existing record: all remote pages come back as added.
    pub full_resync: bool
}

/// Classify every remote page as added, modified or deleted.
///
/// `records` maps page id to recorded path; `local` holds the page state read
/// from each recorded document's front matter. A recorded page with no
/// readable state counts as local version 0.
pub fn compute_diff(
    remote: &[RemoteNode],
    records: &BTreeMap<String, String>,
    local: &HashMap<String, PageState>,
    options: &DiffOptions
) -> ChangeSet {
    let empty = BTreeMap::new();
    let records = if options.full_resync { &empty } else { records };
    let wanted = |id: &str| options.only.as_ref().is_none_or(|only| only.contains(id));

    let mut changes = ChangeSet::default();
    let mut remote_ids: HashSet<&str> = HashSet::new();

    for node in remote.iter().filter(|n| !n.is_folder()) {
        if !remote_ids.insert(node.id.as_str()) || !wanted(node.id.as_str()) {
            continue;
        }
        match records.get(&node.id) {
            None => changes.added.push(ChangeEntry {
                page_id: node.id.clone(),
                title: node.title.clone(),
                local_path: None
            }),
            Some(path) => {
                let local_version = local.get(&node.id).map_or(0, |s| s.version);
                if node.version_or_zero() > local_version || options.force.contains(&node.id) {
                    changes.modified.push(ChangeEntry {
                        page_id: node.id.clone(),
                        title: node.title.clone(),
                        local_path: Some(path.clone())
                    });
                }
            }
        }
    }

    for (id, path) in records {
        if remote_ids.contains(id.as_str()) || !wanted(id.as_str()) {
            continue;
        }
        changes.deleted.push(ChangeEntry {
            page_id: id.clone(),
            title: local.get(id).map(|s| s.title.clone()).unwrap_or_default(),
            local_path: Some(path.clone())
        });
    }

    tracing::debug!(
        "diff: {} added, {} modified, {} deleted",
        changes.added.len(),
        changes.modified.len(),
        changes.deleted.len()
    );
    changes
}

/// Read the front matter of every recorded document.
///
/// Documents that are missing, unreadable, unparsable or that claim a
/// different page id are left out.
pub async fn read_page_states(
    root: &Path,
    records: &BTreeMap<String, String>
) -> HashMap<String, PageState> {
    let mut states = HashMap::new();
    for (id, relative) in records {
        let Ok(path) = resolve_in_root(root, relative) else {
            continue;
        };
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("no readable document for {} at {}: {}", id, relative, e);
                continue;
            }
        };
        match frontmatter::read_page_state(relative, &text) {
            Some(state) if &state.page_id == id => {
                states.insert(id.clone(), state);
            }
            Some(state) => tracing::warn!(
                "{} is recorded for page {} but its front matter says {}",
                relative,
                id,
                state.page_id
            ),
            None => {}
        }
    }
    states
}
