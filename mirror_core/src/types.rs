use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Page,
    Folder,
}

/// A page or folder in the remote tree.
///
/// `version` is only meaningful for pages; folders carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNode {
    pub id: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub kind: NodeKind,
    pub version: Option<u64>,
}

impl RemoteNode {
    pub fn page(
        id: impl Into<String>,
        title: impl Into<String>,
        parent_id: Option<&str>,
        version: u64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            parent_id: parent_id.map(str::to_string),
            kind: NodeKind::Page,
            version: Some(version),
        }
    }

    pub fn folder(id: impl Into<String>, title: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            parent_id: parent_id.map(str::to_string),
            kind: NodeKind::Folder,
            version: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Remote version, `0` for folders.
    pub fn version_or_zero(&self) -> u64 {
        self.version.unwrap_or(0)
    }
}

/// A remote page together with its body in the remote format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePage {
    pub node: RemoteNode,
    pub body: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceInfo {
    pub id: String,
    pub key: String,
    pub name: String,
    pub homepage_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePageRequest {
    pub space_id: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub body: String,
}

/// Update request; `version` is the new version number the remote expects
/// (current remote version + 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePageRequest {
    pub page_id: String,
    pub title: String,
    pub body: String,
    pub version: u64,
}

/// Persisted mapping from a remote page to its file in the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecord {
    pub page_id: String,
    pub local_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub title: String,
    pub parent_id: Option<String>,
    pub local_path: String,
}

/// What the local file's front matter says about a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub page_id: String,
    pub title: String,
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub page_id: String,
    pub title: String,
    pub local_path: Option<String>,
}

/// Pull-side classification of every page, produced fresh on each run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<ChangeEntry>,
    pub modified: Vec<ChangeEntry>,
    pub deleted: Vec<ChangeEntry>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CandidateKind {
    New,
    Modified,
}

/// A local document waiting to be pushed.
///
/// `body` is the document text without front matter; the dependency sorter
/// reads links from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushCandidate {
    pub path: String,
    pub kind: CandidateKind,
    pub title: String,
    pub page_id: Option<String>,
    pub version: Option<u64>,
    #[serde(skip)]
    pub body: String,
}
