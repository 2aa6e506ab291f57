//! Optimistic-concurrency guard run before every update push.
//!
//! The guard never merges or overwrites anything itself; it only tells the
//! caller whether the update may go ahead.

use errors::ApiError;
use mirror_core::traits::RemoteApi;

#[derive(Debug)]
pub enum GuardOutcome {
    /// Local and remote versions agree.
    Clear { remote: u64 },
    /// Versions differ but the caller asked to force the push.
    Forced { local: u64, remote: u64 },
    /// The page no longer exists remotely.
    NotFound,
    Conflict { local: u64, remote: u64 },
    Transport(ApiError)
}

impl GuardOutcome {
    /// Remote version to build the update on, when the push may proceed.
    pub fn proceed_from(&self) -> Option<u64> {
        match self {
            GuardOutcome::Clear { remote } | GuardOutcome::Forced { remote, .. } => Some(*remote),
            _ => None
        }
    }
}

/// Compare versions already fetched.
pub fn evaluate(local: u64, remote: u64, force: bool) -> GuardOutcome {
    if local == remote {
        GuardOutcome::Clear { remote }
    } else if force {
        GuardOutcome::Forced { local, remote }
    } else {
        GuardOutcome::Conflict { local, remote }
    }
}

/// Fetch the current remote version of `page_id` and compare it with the
/// version the local document was synced at.
pub async fn check_versions(
    api: &dyn RemoteApi,
    page_id: &str,
    local_version: u64,
    force: bool
) -> GuardOutcome {
    match api.get_page(page_id).await {
        Ok(page) => {
            let outcome = evaluate(local_version, page.node.version_or_zero(), force);
            if let GuardOutcome::Forced { local, remote } = &outcome {
                tracing::warn!(
                    "forcing push of {} over remote version {} (local {})",
                    page_id,
                    remote,
                    local
                );
            }
            outcome
        }
        Err(e) if e.is_not_found() => GuardOutcome::NotFound,
        Err(e) => GuardOutcome::Transport(e)
    }
}
