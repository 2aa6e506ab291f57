use colored::Colorize;
use config::ConfigFileError;
use errors::ApiError;
use sync::{PageFailure, PushConflict, SyncError};

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_NOT_CONFIGURED: i32 = 2;
pub const EXIT_CONFLICT: i32 = 3;
pub const EXIT_NOT_FOUND: i32 = 4;
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Clone)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>,
    pub exit_code: i32,
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None,
            exit_code: EXIT_FAILURE,
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

pub fn not_configured() -> UxError {
    UxError::new("This directory is not a mirror")
        .why("Expected .mirror/config.toml and .mirror/state.json under the mirror root")
        .fix("Initialize the mirror against a remote space")
        .fix("Or pass --root pointing at an existing mirror")
        .suggest("mirror init --space <KEY> --url <BASE_URL>")
        .code(EXIT_NOT_CONFIGURED)
}

pub fn missing_url() -> UxError {
    UxError::new("No remote URL configured")
        .why("init needs to know where the remote API lives")
        .fix("Pass --url, or set MIRROR_BASE_URL")
        .suggest("mirror init --space <KEY> --url https://wiki.example.com")
}

pub fn authentication_failed(reason: &str) -> UxError {
    UxError::new("The remote rejected our credentials")
        .why(reason.to_string())
        .fix("Export a valid API token in MIRROR_API_TOKEN (or the variable named by remote.token_env)")
        .fix("Check that the token can read the space")
}

pub fn rate_limited(retry_after: u64) -> UxError {
    UxError::new("Rate limit exceeded")
        .why(format!(
            "Retries were exhausted; the remote asked to wait {} seconds",
            retry_after
        ))
        .fix("Wait before retrying")
}

pub fn not_found(resource: &str, id: &str) -> UxError {
    UxError::new(format!("{} not found: {}", resource, id))
        .why("It does not exist remotely, or is not recorded in this mirror")
        .fix("Check the id or path")
        .suggest("mirror status")
        .code(EXIT_NOT_FOUND)
}

pub fn version_conflicts(conflicts: &[PushConflict]) -> UxError {
    let mut err = UxError::new(format!(
        "{} page(s) changed remotely since your last pull",
        conflicts.len()
    ))
    .why("Pushing would overwrite someone else's edits");
    for c in conflicts {
        err = err.fix(format!(
            "{}: local version {}, remote version {}",
            c.path, c.local, c.remote
        ));
    }
    err.fix("Pull to get the remote changes, or push with --force to overwrite them")
        .suggest("mirror pull")
        .code(EXIT_CONFLICT)
}

pub fn pages_failed(operation: &str, failures: &[PageFailure]) -> UxError {
    let mut err = UxError::new(format!("{} failed for {} page(s)", operation, failures.len()));
    for f in failures {
        err = err.fix(format!("{}: {}", f.path, f.error));
    }
    err.suggest("mirror status")
}

pub fn cancelled() -> UxError {
    UxError::new("Interrupted")
        .why("Pages completed before the interrupt were saved; run the command again to resume")
        .code(EXIT_CANCELLED)
}

pub fn config_error(message: &str) -> UxError {
    UxError::new(format!("Configuration error: {}", message))
        .why("The configuration file or MIRROR_* variables hold an invalid value")
        .fix("Check .mirror/config.toml")
        .fix("Re-initialize with defaults")
        .suggest("mirror init --force --space <KEY> --url <BASE_URL>")
}

fn from_api(err: &ApiError) -> UxError {
    match err {
        ApiError::Authentication { reason } => authentication_failed(reason),
        ApiError::NotFound { resource, id } => not_found(resource, id),
        ApiError::RateLimited { retry_after } => rate_limited(*retry_after),
        ApiError::Conflict { id, reason } => UxError::new(format!("Version conflict on page {}", id))
            .why(reason.clone())
            .suggest("mirror pull")
            .code(EXIT_CONFLICT),
        other => UxError::new(other.to_string()).fix("Check the remote URL and your network"),
    }
}

/// Turn any error surfaced by a command into something worth showing.
pub fn explain(err: &anyhow::Error) -> UxError {
    for cause in err.chain() {
        if let Some(ux) = cause.downcast_ref::<UxError>() {
            return ux.clone();
        }
        if let Some(sync) = cause.downcast_ref::<SyncError>() {
            if sync.is_not_configured() {
                return not_configured();
            }
            match sync {
                SyncError::Cancelled => return cancelled(),
                SyncError::Api(api) => return from_api(api),
                SyncError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    return UxError::new(sync.to_string()).code(EXIT_NOT_FOUND);
                }
                _ => {}
            }
        }
        if let Some(api) = cause.downcast_ref::<ApiError>() {
            return from_api(api);
        }
        if let Some(config) = cause.downcast_ref::<ConfigFileError>() {
            return config_error(&config.to_string());
        }
    }

    let mut ux = UxError::new(err.to_string());
    if let Some(source) = err.chain().nth(1) {
        ux = ux.why(source.to_string());
    }
    ux
}

/// Process exit code for an error: 2 not configured, 3 version conflict,
/// 4 not found, 130 interrupted, 1 anything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(ux) = cause.downcast_ref::<UxError>() {
            return ux.exit_code;
        }
        if let Some(sync) = cause.downcast_ref::<SyncError>() {
            if sync.is_not_configured() {
                return EXIT_NOT_CONFIGURED;
            }
            if matches!(sync, SyncError::Cancelled) {
                return EXIT_CANCELLED;
            }
            if sync.is_conflict() {
                return EXIT_CONFLICT;
            }
            if sync.is_not_found() {
                return EXIT_NOT_FOUND;
            }
        }
        if let Some(api) = cause.downcast_ref::<ApiError>() {
            if api.is_conflict() {
                return EXIT_CONFLICT;
            }
            if api.is_not_found() {
                return EXIT_NOT_FOUND;
            }
        }
    }
    EXIT_FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use errors::MirrorError;

    #[test]
    fn test_ux_error_builder_chain() {
        let err = UxError::new("test error")
            .why("because reasons")
            .fix("try this")
            .fix("or this")
            .suggest("run command");

        assert_eq!(err.what, "test error");
        assert_eq!(err.why, Some("because reasons".to_string()));
        assert_eq!(err.how_to_fix, vec!["try this", "or this"]);
        assert_eq!(err.suggested_command, Some("run command".to_string()));
        assert_eq!(err.exit_code, EXIT_FAILURE);
        assert_eq!(format!("{}", err), "test error");
    }

    #[test]
    fn test_not_configured_exit_code() {
        let err: anyhow::Error = SyncError::Mirror(MirrorError::NotConfigured {
            reason: "no state".to_string(),
        })
        .into();
        assert_eq!(exit_code(&err), EXIT_NOT_CONFIGURED);
        assert_eq!(explain(&err).suggested_command.as_deref(), Some("mirror init --space <KEY> --url <BASE_URL>"));
    }

    #[test]
    fn test_exit_codes_by_error_kind() {
        let cases: Vec<(anyhow::Error, i32)> = vec![
            (SyncError::Cancelled.into(), EXIT_CANCELLED),
            (
                SyncError::Conflict {
                    path: "a.md".to_string(),
                    local: 2,
                    remote: 3,
                }
                .into(),
                EXIT_CONFLICT,
            ),
            (ApiError::not_found("page", "9").into(), EXIT_NOT_FOUND),
            (SyncError::Api(ApiError::not_found("page", "9")).into(), EXIT_NOT_FOUND),
            (
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into(),
                EXIT_FAILURE,
            ),
            (
                version_conflicts(&[PushConflict {
                    path: "a.md".to_string(),
                    local: 2,
                    remote: 3,
                }])
                .into(),
                EXIT_CONFLICT,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(exit_code(&err), expected, "{}", err);
        }
    }

    #[test]
    fn test_context_is_looked_through() {
        let err = anyhow::Error::from(ApiError::not_found("space", "DOCS")).context("init failed");
        assert_eq!(exit_code(&err), EXIT_NOT_FOUND);
        assert!(explain(&err).what.contains("DOCS"));
    }

    #[test]
    fn test_version_conflicts_lists_pages() {
        let err = version_conflicts(&[PushConflict {
            path: "faq.md".to_string(),
            local: 1,
            remote: 2,
        }]);
        assert!(err.how_to_fix[0].contains("faq.md"));
        assert!(err.how_to_fix[0].contains("remote version 2"));
        assert_eq!(err.suggested_command.as_deref(), Some("mirror pull"));
    }

    #[test]
    fn test_pages_failed_enumerates_paths() {
        let err = pages_failed(
            "Push",
            &[PageFailure {
                path: "a.md".to_string(),
                error: "boom".to_string(),
            }],
        );
        assert!(err.what.contains("1 page"));
        assert_eq!(err.how_to_fix, vec!["a.md: boom"]);
    }
}
