//! # Configuration Structures
//!
//! Typed configuration for the page mirror, grouped by concern.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Directory (relative to the mirror root) holding config, state and scratch
/// files.
pub const STATE_DIR: &str = ".mirror";

/// Config file name inside [`STATE_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Single configuration object handed to the CLI and the sync engine.
///
/// ## Sections
/// - `remote`: API endpoint, credentials lookup and retry budget
/// - `space`: which remote space the mirror tracks
/// - `mirror`: where the mirror lives on disk
/// - `sync`: engine behavior knobs
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Default)]
pub struct MirrorConfig {
    #[serde(default)]
    #[validate(nested)]
    pub remote: RemoteConfig,

    #[serde(default)]
    #[validate(nested)]
    pub space: SpaceConfig,

    #[serde(default)]
    pub mirror: MirrorPaths,

    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncConfig
}

impl MirrorConfig {
    /// Whether enough is configured to talk to a remote space.
    pub fn is_configured(&self) -> bool {
        !self.remote.base_url.is_empty() && !self.space.key.is_empty()
    }

    /// Absolute-or-relative path of the state directory.
    pub fn state_dir(&self) -> PathBuf {
        self.mirror.root.join(STATE_DIR)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir().join("state.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.state_dir().join(CONFIG_FILE)
    }
}

/// Remote API configuration.
///
/// ## Fields
/// - `base_url`: API root, e.g. `https://wiki.example.com` (no default)
/// - `token_env`: environment variable holding the API token (default:
///   `MIRROR_API_TOKEN`)
/// - `timeout_seconds`: per-request timeout (default: 30, range: 1-300)
/// - `max_retries`: attempts on rate limiting (default: 5, range: 0-10)
/// - `initial_backoff_ms`: first backoff delay (default: 500)
/// - `max_backoff_ms`: backoff ceiling (default: 30000)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RemoteConfig {
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub base_url: String,

    #[serde(default = "default_token_env")]
    #[validate(length(min = 1, max = 128))]
    pub token_env: String,

    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,

    #[serde(default = "default_max_retries")]
    #[validate(range(max = 10))]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    #[validate(range(min = 10, max = 60000))]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    #[validate(range(min = 10, max = 600_000))]
    pub max_backoff_ms: u64
}

fn default_token_env() -> String {
    "MIRROR_API_TOKEN".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_env: default_token_env(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms()
        }
    }
}

/// Tracked space. `id` is resolved from `key` by `init` and cached here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Default)]
pub struct SpaceConfig {
    #[serde(default)]
    #[validate(length(max = 255))]
    pub key: String,

    #[serde(default)]
    pub id: Option<String>
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirrorPaths {
    #[serde(default = "default_root")]
    pub root: PathBuf
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for MirrorPaths {
    fn default() -> Self {
        Self {
            root: default_root()
        }
    }
}

/// Engine behavior.
///
/// ## Fields
/// - `mtime_tolerance_seconds`: slack between file mtime and `synced_at`
///   before a file counts as locally modified (default: 2, range: 0-3600)
/// - `repair_links`: rewrite links in other documents after a pull-side
///   rename (default: true)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct SyncConfig {
    #[serde(default = "default_mtime_tolerance")]
    #[validate(range(max = 3600))]
    pub mtime_tolerance_seconds: u64,

    #[serde(default = "default_repair_links")]
    pub repair_links: bool
}

fn default_mtime_tolerance() -> u64 {
    2
}

fn default_repair_links() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mtime_tolerance_seconds: default_mtime_tolerance(),
            repair_links: default_repair_links()
        }
    }
}
