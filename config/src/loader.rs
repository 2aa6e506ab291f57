//! # Environment Variable Loader
//!
//! Reads `MIRROR_*` environment variables into a set of overrides that sit
//! between the config file and CLI flags in the precedence chain.
//!
//! ## Environment Variables
//! - `MIRROR_BASE_URL`: remote API root
//! - `MIRROR_SPACE_KEY`: tracked space key
//! - `MIRROR_SPACE_ID`: tracked space id
//! - `MIRROR_ROOT`: mirror root directory
//! - `MIRROR_TOKEN_ENV`: name of the variable holding the API token
//! - `MIRROR_TIMEOUT_SECONDS`: per-request timeout
//! - `MIRROR_MAX_RETRIES`: rate-limit retry budget
//! - `MIRROR_MTIME_TOLERANCE_SECONDS`: local-modification slack
//! - `MIRROR_REPAIR_LINKS`: `true`/`false`

use crate::file_loader::ConfigFileError;
use crate::precedence::ConfigOverrides;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Load overrides from the process environment.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let overrides = load_from_env()?;
///     println!("base url override: {:?}", overrides.base_url);
///     Ok(())
/// }
/// ```
pub fn load_from_env() -> Result<ConfigOverrides, ConfigFileError> {
    Ok(ConfigOverrides {
        base_url: string_var("MIRROR_BASE_URL"),
        space_key: string_var("MIRROR_SPACE_KEY"),
        space_id: string_var("MIRROR_SPACE_ID"),
        root: string_var("MIRROR_ROOT").map(PathBuf::from),
        token_env: string_var("MIRROR_TOKEN_ENV"),
        timeout_seconds: parsed_var("MIRROR_TIMEOUT_SECONDS")?,
        max_retries: parsed_var("MIRROR_MAX_RETRIES")?,
        mtime_tolerance_seconds: parsed_var("MIRROR_MTIME_TOLERANCE_SECONDS")?,
        repair_links: parsed_var("MIRROR_REPAIR_LINKS")?
    })
}

fn string_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigFileError> {
    match string_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigFileError::Invalid(format!("{} has invalid value '{}'", name, raw))),
        None => Ok(None)
    }
}
