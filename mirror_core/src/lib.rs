//! # Page Mirror Core
//!
//! Shared types and traits for the page mirror.
//!
//! This crate provides:
//! - The content-location model (remote nodes, local records, page state)
//! - Change sets and push candidates exchanged between engine stages
//! - Collaborator contracts (`RemoteApi`, `ContentConverter`)

pub mod traits;
pub mod types;

pub use traits::{ContentConverter, Converted, RemoteApi};
pub use types::{
    CandidateKind, ChangeEntry, ChangeSet, CreatePageRequest, FolderRecord, LocalRecord,
    NodeKind, PageState, PushCandidate, RemoteNode, RemotePage, SpaceInfo, UpdatePageRequest
};
