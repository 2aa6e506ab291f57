use chrono::{DateTime, Utc};
use errors::MirrorError;
use mirror_core::types::{FolderRecord, LocalRecord, SpaceInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Everything the mirror remembers between runs.
///
/// Serialized as `.mirror/state.json`. `pages` maps page id to the document's
/// path relative to the mirror root; `content_hashes` holds the hash of each
/// document body as last written or pushed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorState {
    pub space_key: String,
    pub space_id: String,
    #[serde(default)]
    pub space_name: String,
    #[serde(default)]
    pub homepage_id: Option<String>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pages: BTreeMap<String, String>,
    #[serde(default)]
    pub folders: BTreeMap<String, FolderRecord>,
    #[serde(default)]
    pub content_hashes: BTreeMap<String, String>
}

impl MirrorState {
    pub fn new(space: &SpaceInfo) -> Self {
        Self {
            space_key: space.key.clone(),
            space_id: space.id.clone(),
            space_name: space.name.clone(),
            homepage_id: space.homepage_id.clone(),
            ..Default::default()
        }
    }

    /// Record a synced page.
    pub fn record(&mut self, page_id: &str, local_path: &str, body_hash: String) {
        self.pages
            .insert(page_id.to_string(), local_path.to_string());
        self.content_hashes.insert(page_id.to_string(), body_hash);
    }

    pub fn forget(&mut self, page_id: &str) -> Option<String> {
        self.content_hashes.remove(page_id);
        self.pages.remove(page_id)
    }

    pub fn path_of(&self, page_id: &str) -> Option<&str> {
        self.pages.get(page_id).map(String::as_str)
    }

    pub fn page_at(&self, local_path: &str) -> Option<&str> {
        self.pages
            .iter()
            .find(|(_, path)| path.as_str() == local_path)
            .map(|(id, _)| id.as_str())
    }

    pub fn folder_at(&self, local_path: &str) -> Option<&str> {
        self.folders
            .iter()
            .find(|(_, f)| f.local_path == local_path)
            .map(|(id, _)| id.as_str())
    }

    pub fn hash_of(&self, page_id: &str) -> Option<&str> {
        self.content_hashes.get(page_id).map(String::as_str)
    }

    pub fn records(&self) -> Vec<LocalRecord> {
        self.pages
            .iter()
            .map(|(page_id, local_path)| LocalRecord {
                page_id: page_id.clone(),
                local_path: local_path.clone()
            })
            .collect()
    }

    /// Path to page id, for every recorded page.
    pub fn path_index(&self) -> HashMap<String, String> {
        self.pages
            .iter()
            .map(|(id, path)| (path.clone(), id.clone()))
            .collect()
    }

    /// Drop records whose path is unusable: outside the root, not normalized,
    /// or already claimed by another page. Returns what was rejected.
    pub fn sanitize(&mut self) -> Vec<MirrorError> {
        let mut rejected = Vec::new();
        let mut claimed: HashMap<String, String> = HashMap::new();
        let mut doomed: HashSet<String> = HashSet::new();

        for (id, path) in &self.pages {
            match utils::normalize_relative(path) {
                Some(normalized) if &normalized == path => {}
                Some(_) => {
                    rejected.push(MirrorError::InvalidPath {
                        path: path.clone(),
                        reason: "recorded path is not normalized".to_string()
                    });
                    doomed.insert(id.clone());
                    continue;
                }
                None => {
                    rejected.push(MirrorError::PathEscapesRoot { path: path.clone() });
                    doomed.insert(id.clone());
                    continue;
                }
            }
            if let Some(first) = claimed.get(path) {
                rejected.push(MirrorError::DuplicatePath {
                    path: path.clone(),
                    first: first.clone(),
                    second: id.clone()
                });
                doomed.insert(id.clone());
            } else {
                claimed.insert(path.clone(), id.clone());
            }
        }

        for id in &doomed {
            self.forget(id);
        }
        self.folders.retain(|_, f| {
            utils::normalize_relative(&f.local_path).as_deref() == Some(f.local_path.as_str())
        });

        for e in &rejected {
            tracing::warn!("dropping mirror record: {}", e);
        }
        rejected
    }
}
