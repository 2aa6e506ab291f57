//! # Sync Engine
//!
//! Bidirectional reconciliation between a remote page tree and a local
//! mirror of markdown files with front matter.
//!
//! - `diff`: classify remote pages as added, modified or deleted
//! - `paths`: derive a collision-free file layout from the remote tree
//! - `rename`: atomic writes, rename with rollback and link repair
//! - `scheduler`: order pushes so link targets go first
//! - `conflict`: optimistic-concurrency guard used before each push
//! - `bridge`: the orchestrator tying it together (`pull`, `push`, `status`)

pub mod bridge;
pub mod conflict;
pub mod diff;
pub mod error;
pub mod frontmatter;
pub mod links;
pub mod paths;
pub mod rename;
pub mod scan;
pub mod scheduler;
pub mod state;
pub mod state_persister;
pub mod tree;

pub use bridge::{
    PageFailure, PullOptions, PullReport, PushAccumulator, PushConflict, PushOptions, PushReport,
    StatusReport, SyncManager
};
pub use conflict::GuardOutcome;
pub use error::{Result, SyncError};
pub use state::MirrorState;
pub use state_persister::{JsonFilePersister, MemoryPersister, StatePersister};

#[cfg(test)]
mod proptests;
