//! # Adapters
//!
//! Concrete collaborators for the sync engine: the HTTP client for the remote
//! content API and the content converter.

pub mod converter;
pub mod http;

pub use converter::MarkdownPassthrough;
pub use http::{HttpRemoteApi, RetryPolicy};
