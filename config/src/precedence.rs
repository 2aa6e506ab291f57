//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)

use crate::config::MirrorConfig;
use crate::file_loader::{ConfigFileError, load_from_file};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Sparse set of values layered on top of a loaded config.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub space_key: Option<String>,
    pub space_id: Option<String>,
    pub root: Option<PathBuf>,
    pub token_env: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub mtime_tolerance_seconds: Option<u64>,
    pub repair_links: Option<bool>
}

impl ConfigOverrides {
    /// Apply every set value onto `config`.
    pub fn apply(self, mut config: MirrorConfig, source_name: &str) -> MirrorConfig {
        macro_rules! layer {
            ($value:expr, $target:expr, $field:literal) => {
                if let Some(v) = $value {
                    tracing::debug!("config {} overridden by {}", $field, source_name);
                    $target = v;
                }
            };
        }

        layer!(self.base_url, config.remote.base_url, "remote.base_url");
        layer!(self.space_key, config.space.key, "space.key");
        layer!(self.root, config.mirror.root, "mirror.root");
        layer!(self.token_env, config.remote.token_env, "remote.token_env");
        layer!(self.timeout_seconds, config.remote.timeout_seconds, "remote.timeout_seconds");
        layer!(self.max_retries, config.remote.max_retries, "remote.max_retries");
        layer!(
            self.mtime_tolerance_seconds,
            config.sync.mtime_tolerance_seconds,
            "sync.mtime_tolerance_seconds"
        );
        layer!(self.repair_links, config.sync.repair_links, "sync.repair_links");
        if let Some(id) = self.space_id {
            tracing::debug!("config space.id overridden by {}", source_name);
            config.space.id = Some(id);
        }

        config
    }
}

/// Merge multiple configuration sources with precedence.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Layers file config, environment overrides and CLI overrides:
/// CLI arguments > environment variables > config file > defaults.
///
/// ## Usage
/// ```rust,no_run
/// use config::{ConfigOverrides, MirrorConfig, load_from_env, merge_configs};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let env = load_from_env()?;
///     let config = merge_configs(MirrorConfig::default(), env, ConfigOverrides::default());
///     println!("{}", config.space.key);
///     Ok(())
/// }
/// ```
pub fn merge_configs(
    file_config: MirrorConfig,
    env_overrides: ConfigOverrides,
    cli_overrides: ConfigOverrides
) -> MirrorConfig {
    let config = env_overrides.apply(file_config, "env");
    cli_overrides.apply(config, "cli")
}

/// Resolve the effective configuration for a mirror rooted at `root`.
///
/// A missing config file is not an error: defaults are used and the caller
/// decides whether the result is configured enough to proceed.
pub fn resolve(
    root: &Path,
    env_overrides: ConfigOverrides,
    cli_overrides: ConfigOverrides
) -> Result<MirrorConfig, ConfigFileError> {
    let path = root
        .join(crate::config::STATE_DIR)
        .join(crate::config::CONFIG_FILE);

    let file_config = if path.exists() {
        load_from_file(&path)?
    } else {
        tracing::debug!("no config file at {}, using defaults", path.display());
        MirrorConfig::default()
    };

    let mut config = merge_configs(file_config, env_overrides, cli_overrides);
    if config.mirror.root == Path::new(".") {
        config.mirror.root = root.to_path_buf();
    }

    config
        .validate()
        .map_err(|e| ConfigFileError::Invalid(e.to_string()))?;

    Ok(config)
}
