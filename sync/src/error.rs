use errors::{ApiError, MirrorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote API error: {0}")]
    Api(#[from] ApiError),
    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Front matter error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Version conflict on {path}: local version {local}, remote version {remote}")]
    Conflict {
        path: String,
        local: u64,
        remote: u64
    },
    #[error("Rename {from} -> {to} failed: {reason}")]
    Rename {
        from: String,
        to: String,
        reason: String
    },
    #[error("State persistence failed: {0}")]
    Persistence(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String)
}

impl SyncError {
    /// Whether the error means the mirror has not been initialized.
    pub fn is_not_configured(&self) -> bool {
        matches!(self, SyncError::Mirror(MirrorError::NotConfigured { .. }))
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::Api(e) => e.is_not_found(),
            SyncError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false
        }
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            SyncError::Conflict { .. } => true,
            SyncError::Api(e) => e.is_conflict(),
            _ => false
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display() {
        let errors = vec![
            (
                SyncError::Conflict {
                    path: "a.md".to_string(),
                    local: 2,
                    remote: 3
                },
                "Version conflict on a.md: local version 2, remote version 3"
            ),
            (
                SyncError::Persistence("disk full".to_string()),
                "State persistence failed: disk full"
            ),
            (SyncError::Cancelled, "Operation cancelled"),
            (
                SyncError::Internal("unexpected".to_string()),
                "Internal error: unexpected"
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_classification() {
        let not_configured: SyncError = MirrorError::NotConfigured {
            reason: "no state".to_string()
        }
        .into();
        assert!(not_configured.is_not_configured());

        let not_found: SyncError = ApiError::not_found("page", "1").into();
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let conflict: SyncError = ApiError::Conflict {
            id: "1".to_string(),
            reason: "stale".to_string()
        }
        .into();
        assert!(conflict.is_conflict());
    }
}
