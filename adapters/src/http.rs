//! HTTP client for the remote content API.
//!
//! JSON REST API rooted at `{base_url}/api/v2`. Listing endpoints are cursor
//! paginated through `_links.next`; the client follows them until exhausted.
//! Rate-limited responses (429) are retried with exponential backoff and
//! jitter, using `Retry-After` as a floor, up to `max_retries` times.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use errors::ApiError;
use mirror_core::traits::RemoteApi;
use mirror_core::types::{
    CreatePageRequest, NodeKind, RemoteNode, RemotePage, SpaceInfo, UpdatePageRequest
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

const PAGE_LIMIT: u32 = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000
        }
    }
}

impl RetryPolicy {
    fn delays(&self) -> impl Iterator<Item = Duration> {
        let max = Duration::from_millis(self.max_backoff_ms);
        ExponentialBackoff::from_millis(2)
            .factor((self.initial_backoff_ms / 2).max(1))
            .max_delay(max)
            .map(jitter)
            .take(self.max_retries as usize)
    }
}

pub struct HttpRemoteApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy
}

impl HttpRemoteApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, token, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: &str,
        token: Option<String>,
        timeout: Duration
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport {
                reason: e.to_string()
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            retry: RetryPolicy::default()
        })
    }

    /// Build a client from configuration, reading the token from the
    /// environment variable the config names.
    pub fn from_config(remote: &config::RemoteConfig) -> Result<Self, ApiError> {
        let token = std::env::var(&remote.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!(
                "{} is not set, requests will be sent without credentials",
                remote.token_env
            );
        }

        Ok(Self::with_timeout(
            &remote.base_url,
            token,
            Duration::from_secs(remote.timeout_seconds)
        )?
        .with_retry_policy(RetryPolicy {
            max_retries: remote.max_retries,
            initial_backoff_ms: remote.initial_backoff_ms,
            max_backoff_ms: remote.max_backoff_ms
        }))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request
        }
    }

    /// Send a request, retrying while the remote rate-limits us.
    async fn send<F>(&self, resource: &str, id: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder
    {
        let mut delays = self.retry.delays();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let response = self
                .authorize(build())
                .send()
                .await
                .map_err(|e| ApiError::Transport {
                    reason: e.to_string()
                })?;

            match check_status(response, resource, id).await {
                Err(ApiError::RateLimited { retry_after }) => {
                    let Some(delay) = delays.next() else {
                        tracing::warn!("rate limit retries exhausted for {} {}", resource, id);
                        return Err(ApiError::RateLimited { retry_after });
                    };
                    let delay = delay.max(Duration::from_secs(retry_after));
                    tracing::debug!(
                        "rate limited on {} {}, retrying in {}ms (attempt {})",
                        resource,
                        id,
                        delay.as_millis(),
                        attempt
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other
            }
        }
    }

    async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(|e| ApiError::Decode {
            reason: e.to_string()
        })
    }

    /// Follow `_links.next` until the listing is exhausted.
    async fn list_all(&self, resource: &str, first_path: String) -> Result<Vec<NodeDto>, ApiError> {
        let mut results = Vec::new();
        let mut next = Some(self.url(&first_path));

        while let Some(url) = next.take() {
            let response = self
                .send(resource, &first_path, || self.client.get(&url))
                .await?;
            let page: ListDto = Self::decode(response).await?;
            results.extend(page.results);

            next = page
                .links
                .and_then(|l| l.next)
                .map(|n| self.absolute(&n));
        }

        Ok(results)
    }

    fn absolute(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else if link.starts_with("/api/") {
            format!("{}{}", self.base_url, link)
        } else {
            self.url(link)
        }
    }
}

async fn check_status(response: Response, resource: &str, id: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let message = response.text().await.unwrap_or_default();

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Authentication {
            reason: if message.is_empty() {
                status.to_string()
            } else {
                message
            }
        },
        StatusCode::NOT_FOUND => ApiError::not_found(resource, id),
        StatusCode::CONFLICT => ApiError::Conflict {
            id: id.to_string(),
            reason: message
        },
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { retry_after },
        other => ApiError::Api {
            status: other.as_u16(),
            message
        }
    })
}

#[derive(Debug, Deserialize)]
struct ListDto {
    #[serde(default)]
    results: Vec<NodeDto>,
    #[serde(rename = "_links")]
    links: Option<LinksDto>
}

#[derive(Debug, Deserialize)]
struct LinksDto {
    next: Option<String>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeDto {
    id: String,
    #[serde(default)]
    title: String,
    parent_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    version: Option<VersionDto>,
    body: Option<BodyDto>
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionDto {
    number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>
}

#[derive(Debug, Deserialize)]
struct BodyDto {
    storage: Option<BodyValueDto>
}

#[derive(Debug, Deserialize, Serialize)]
struct BodyValueDto {
    #[serde(default)]
    representation: String,
    value: String
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpaceDto {
    id: String,
    key: String,
    name: String,
    homepage_id: Option<String>
}

#[derive(Debug, Deserialize)]
struct SpaceListDto {
    #[serde(default)]
    results: Vec<SpaceDto>
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePageDto<'a> {
    space_id: &'a str,
    status: &'static str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
    body: BodyValueDto
}

#[derive(Debug, Serialize)]
struct UpdatePageDto<'a> {
    id: &'a str,
    status: &'static str,
    title: &'a str,
    body: BodyValueDto,
    version: VersionDto
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveDto<'a> {
    target_parent_id: &'a str
}

fn storage_body(value: &str) -> BodyValueDto {
    BodyValueDto {
        representation: "storage".to_string(),
        value: value.to_string()
    }
}

impl NodeDto {
    fn into_node(self, default_kind: NodeKind) -> RemoteNode {
        let kind = match self.kind.as_deref() {
            Some("folder") => NodeKind::Folder,
            Some("page") => NodeKind::Page,
            _ => default_kind
        };
        RemoteNode {
            id: self.id,
            title: self.title,
            parent_id: self.parent_id,
            kind,
            version: match kind {
                NodeKind::Page => Some(self.version.map_or(1, |v| v.number)),
                NodeKind::Folder => None
            }
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn get_space(&self, space_key: &str) -> Result<SpaceInfo, ApiError> {
        let url = self.url("/spaces");
        let response = self
            .send("space", space_key, || {
                self.client.get(&url).query(&[("keys", space_key)])
            })
            .await?;
        let list: SpaceListDto = Self::decode(response).await?;

        list.results
            .into_iter()
            .find(|s| s.key == space_key)
            .map(|s| SpaceInfo {
                id: s.id,
                key: s.key,
                name: s.name,
                homepage_id: s.homepage_id
            })
            .ok_or_else(|| ApiError::not_found("space", space_key))
    }

    async fn list_pages(&self, space_id: &str) -> Result<Vec<RemoteNode>, ApiError> {
        let nodes = self
            .list_all(
                "space",
                format!("/spaces/{}/pages?limit={}", space_id, PAGE_LIMIT)
            )
            .await?;
        Ok(nodes
            .into_iter()
            .map(|n| n.into_node(NodeKind::Page))
            .collect())
    }

    async fn get_page(&self, page_id: &str) -> Result<RemotePage, ApiError> {
        let url = self.url(&format!("/pages/{}", page_id));
        let response = self
            .send("page", page_id, || {
                self.client.get(&url).query(&[("body-format", "storage")])
            })
            .await?;
        let mut dto: NodeDto = Self::decode(response).await?;

        let body = dto
            .body
            .take()
            .and_then(|b| b.storage)
            .map(|s| s.value)
            .unwrap_or_default();
        let updated_at = dto.version.as_ref().and_then(|v| v.created_at);

        Ok(RemotePage {
            node: dto.into_node(NodeKind::Page),
            body,
            updated_at
        })
    }

    async fn create_page(&self, request: CreatePageRequest) -> Result<RemoteNode, ApiError> {
        let url = self.url("/pages");
        let payload = CreatePageDto {
            space_id: &request.space_id,
            status: "current",
            title: &request.title,
            parent_id: request.parent_id.as_deref(),
            body: storage_body(&request.body)
        };
        let response = self
            .send("page", &request.title, || self.client.post(&url).json(&payload))
            .await?;
        let dto: NodeDto = Self::decode(response).await?;
        Ok(dto.into_node(NodeKind::Page))
    }

    async fn update_page(&self, request: UpdatePageRequest) -> Result<RemoteNode, ApiError> {
        let url = self.url(&format!("/pages/{}", request.page_id));
        let payload = UpdatePageDto {
            id: &request.page_id,
            status: "current",
            title: &request.title,
            body: storage_body(&request.body),
            version: VersionDto {
                number: request.version,
                created_at: None
            }
        };
        let response = self
            .send("page", &request.page_id, || self.client.put(&url).json(&payload))
            .await?;
        let dto: NodeDto = Self::decode(response).await?;
        Ok(dto.into_node(NodeKind::Page))
    }

    async fn move_page(&self, page_id: &str, target_parent_id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/pages/{}/move", page_id));
        let payload = MoveDto { target_parent_id };
        self.send("page", page_id, || self.client.put(&url).json(&payload))
            .await?;
        Ok(())
    }

    async fn list_folders(&self, space_id: &str) -> Result<Vec<RemoteNode>, ApiError> {
        let nodes = self
            .list_all(
                "space",
                format!("/spaces/{}/folders?limit={}", space_id, PAGE_LIMIT)
            )
            .await?;
        Ok(nodes
            .into_iter()
            .map(|n| n.into_node(NodeKind::Folder))
            .collect())
    }

    async fn get_folder(&self, folder_id: &str) -> Result<RemoteNode, ApiError> {
        let url = self.url(&format!("/folders/{}", folder_id));
        let response = self
            .send("folder", folder_id, || self.client.get(&url))
            .await?;
        let dto: NodeDto = Self::decode(response).await?;
        Ok(dto.into_node(NodeKind::Folder))
    }
}
