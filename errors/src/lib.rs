//! # Page Mirror Errors
//!
//! Error taxonomies shared across the page mirror crates.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields everywhere so callers can pattern-match on context
//! - `ApiError` is the contract every remote client implementation returns

use thiserror::Error;

/// Errors surfaced by a remote content API client.
///
/// Rate limiting is retried inside the client; it only escapes as
/// `RateLimited` once the retry budget is spent.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("Not found: {resource} {id}")]
    NotFound { resource: String, id: String },

    #[error("Version conflict on {id}: {reason}")]
    Conflict { id: String, reason: String },

    #[error("Rate limited: retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Malformed response: {reason}")]
    Decode { reason: String }
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into()
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Local mirror errors (paths, documents, front matter).
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Path escapes mirror root: {path}")]
    PathEscapesRoot { path: String },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Front matter in {path} is invalid: {reason}")]
    FrontMatter { path: String, reason: String },

    #[error("Duplicate local path {path} for pages {first} and {second}")]
    DuplicatePath {
        path: String,
        first: String,
        second: String
    },

    #[error("Cannot write page {page_id} to {path}: the file holds another document")]
    PathOccupied { path: String, page_id: String },

    #[error("Mirror is not configured: {reason}")]
    NotConfigured { reason: String }
}
