use async_trait::async_trait;
use chrono::Utc;
use errors::ApiError;
use mirror_core::traits::RemoteApi;
use mirror_core::types::{
    CreatePageRequest, RemoteNode, RemotePage, SpaceInfo, UpdatePageRequest
};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

struct RemoteData {
    space: SpaceInfo,
    nodes: Vec<RemoteNode>,
    bodies: HashMap<String, String>,
    failing: HashSet<String>,
    calls: Vec<String>,
    next_id: u64
}

/// In-memory `RemoteApi` with the remote's version rules: updates must carry
/// exactly `current + 1`, otherwise they fail with a conflict.
pub struct InMemoryRemote {
    data: RwLock<RemoteData>
}

impl InMemoryRemote {
    pub fn new(space_key: &str, space_id: &str) -> Self {
        Self {
            data: RwLock::new(RemoteData {
                space: SpaceInfo {
                    id: space_id.to_string(),
                    key: space_key.to_string(),
                    name: format!("{} space", space_key),
                    homepage_id: None
                },
                nodes: Vec::new(),
                bodies: HashMap::new(),
                failing: HashSet::new(),
                calls: Vec::new(),
                next_id: 1000
            })
        }
    }

    /// Add the homepage and mark it as the space's homepage.
    pub async fn set_homepage(&self, id: &str, title: &str, body: &str) {
        self.add_page(RemoteNode::page(id, title, None, 1), body).await;
        self.data.write().await.space.homepage_id = Some(id.to_string());
    }

    pub async fn add_page(&self, node: RemoteNode, body: &str) {
        let mut data = self.data.write().await;
        data.bodies.insert(node.id.clone(), body.to_string());
        data.nodes.retain(|n| n.id != node.id);
        data.nodes.push(node);
    }

    pub async fn add_folder(&self, id: &str, title: &str, parent_id: Option<&str>) {
        let mut data = self.data.write().await;
        data.nodes.push(RemoteNode::folder(id, title, parent_id));
    }

    /// Simulate an edit made by someone else: new body, optional new title,
    /// version bumped by one.
    pub async fn edit_page(&self, id: &str, title: Option<&str>, body: &str) {
        let mut data = self.data.write().await;
        if let Some(node) = data.nodes.iter_mut().find(|n| n.id == id) {
            node.version = Some(node.version_or_zero() + 1);
            if let Some(title) = title {
                node.title = title.to_string();
            }
        }
        data.bodies.insert(id.to_string(), body.to_string());
    }

    pub async fn remove(&self, id: &str) {
        let mut data = self.data.write().await;
        data.nodes.retain(|n| n.id != id);
        data.bodies.remove(id);
    }

    /// Make every `get_page` for `id` fail with a transport error.
    pub async fn fail_page(&self, id: &str) {
        self.data.write().await.failing.insert(id.to_string());
    }

    pub async fn node(&self, id: &str) -> Option<RemoteNode> {
        self.data
            .read()
            .await
            .nodes
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    pub async fn body(&self, id: &str) -> Option<String> {
        self.data.read().await.bodies.get(id).cloned()
    }

    pub async fn find_by_title(&self, title: &str) -> Option<RemoteNode> {
        self.data
            .read()
            .await
            .nodes
            .iter()
            .find(|n| n.title == title)
            .cloned()
    }

    /// Names of the mutating calls received, in order (`create:<title>`,
    /// `update:<id>`, `move:<id>:<parent>`).
    pub async fn calls(&self) -> Vec<String> {
        self.data.read().await.calls.clone()
    }
}

#[async_trait]
impl RemoteApi for InMemoryRemote {
    async fn get_space(&self, space_key: &str) -> Result<SpaceInfo, ApiError> {
        let data = self.data.read().await;
        if data.space.key == space_key {
            Ok(data.space.clone())
        } else {
            Err(ApiError::not_found("space", space_key))
        }
    }

    async fn list_pages(&self, space_id: &str) -> Result<Vec<RemoteNode>, ApiError> {
        let data = self.data.read().await;
        if data.space.id != space_id {
            return Err(ApiError::not_found("space", space_id));
        }
        Ok(data.nodes.iter().filter(|n| !n.is_folder()).cloned().collect())
    }

    async fn get_page(&self, page_id: &str) -> Result<RemotePage, ApiError> {
        let data = self.data.read().await;
        if data.failing.contains(page_id) {
            return Err(ApiError::Transport {
                reason: format!("connection reset fetching {}", page_id)
            });
        }
        let node = data
            .nodes
            .iter()
            .find(|n| n.id == page_id && !n.is_folder())
            .cloned()
            .ok_or_else(|| ApiError::not_found("page", page_id))?;
        Ok(RemotePage {
            body: data.bodies.get(page_id).cloned().unwrap_or_default(),
            node,
            updated_at: Some(Utc::now())
        })
    }

    async fn create_page(&self, request: CreatePageRequest) -> Result<RemoteNode, ApiError> {
        let mut data = self.data.write().await;
        if request.space_id != data.space.id {
            return Err(ApiError::not_found("space", &request.space_id));
        }
        data.next_id += 1;
        let id = data.next_id.to_string();
        let node = RemoteNode::page(&id, &request.title, request.parent_id.as_deref(), 1);
        data.bodies.insert(id.clone(), request.body);
        data.nodes.push(node.clone());
        data.calls.push(format!("create:{}", request.title));
        tracing::debug!("fake remote created page {} ({})", id, request.title);
        Ok(node)
    }

    async fn update_page(&self, request: UpdatePageRequest) -> Result<RemoteNode, ApiError> {
        let mut data = self.data.write().await;
        data.calls.push(format!("update:{}", request.page_id));
        let node = data
            .nodes
            .iter_mut()
            .find(|n| n.id == request.page_id && !n.is_folder())
            .ok_or_else(|| ApiError::not_found("page", &request.page_id))?;

        let current = node.version_or_zero();
        if request.version != current + 1 {
            return Err(ApiError::Conflict {
                id: request.page_id.clone(),
                reason: format!("expected version {}, got {}", current + 1, request.version)
            });
        }
        node.version = Some(request.version);
        node.title = request.title;
        let updated = node.clone();
        data.bodies.insert(request.page_id, request.body);
        Ok(updated)
    }

    async fn move_page(&self, page_id: &str, target_parent_id: &str) -> Result<(), ApiError> {
        let mut data = self.data.write().await;
        data.calls
            .push(format!("move:{}:{}", page_id, target_parent_id));
        let node = data
            .nodes
            .iter_mut()
            .find(|n| n.id == page_id)
            .ok_or_else(|| ApiError::not_found("page", page_id))?;
        node.parent_id = Some(target_parent_id.to_string());
        Ok(())
    }

    async fn list_folders(&self, space_id: &str) -> Result<Vec<RemoteNode>, ApiError> {
        let data = self.data.read().await;
        if data.space.id != space_id {
            return Err(ApiError::not_found("space", space_id));
        }
        Ok(data.nodes.iter().filter(|n| n.is_folder()).cloned().collect())
    }

    async fn get_folder(&self, folder_id: &str) -> Result<RemoteNode, ApiError> {
        self.data
            .read()
            .await
            .nodes
            .iter()
            .find(|n| n.id == folder_id && n.is_folder())
            .cloned()
            .ok_or_else(|| ApiError::not_found("folder", folder_id))
    }
}
