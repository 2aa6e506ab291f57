//! Collaborator contracts consumed by the sync engine

use crate::types::{
    CreatePageRequest, RemoteNode, RemotePage, SpaceInfo, UpdatePageRequest,
};
use async_trait::async_trait;
use errors::ApiError;

/// Remote content repository.
///
/// Implementations own pagination, authentication and rate-limit retries.
/// The engine only ever sees the final outcome of a call.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn get_space(&self, space_key: &str) -> Result<SpaceInfo, ApiError>;

    /// Every page of a space, in remote list order.
    async fn list_pages(&self, space_id: &str) -> Result<Vec<RemoteNode>, ApiError>;

    async fn get_page(&self, page_id: &str) -> Result<RemotePage, ApiError>;

    async fn create_page(&self, request: CreatePageRequest) -> Result<RemoteNode, ApiError>;

    /// Fails with `ApiError::Conflict` when `request.version` is not the next
    /// version on the remote.
    async fn update_page(&self, request: UpdatePageRequest) -> Result<RemoteNode, ApiError>;

    async fn move_page(&self, page_id: &str, target_parent_id: &str) -> Result<(), ApiError>;

    async fn list_folders(&self, space_id: &str) -> Result<Vec<RemoteNode>, ApiError>;

    async fn get_folder(&self, folder_id: &str) -> Result<RemoteNode, ApiError>;
}

/// Output of a content conversion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Converted {
    pub text: String,
    pub warnings: Vec<String>,
}

/// Converts page bodies between the remote format and the local text format.
///
/// Pure from the engine's point of view.
pub trait ContentConverter: Send + Sync {
    fn to_local_format(&self, remote_body: &str) -> Converted;

    fn to_remote_format(&self, text: &str) -> Converted;
}
