//! # Configuration System
//!
//! Configuration management for the page mirror.
//!
//! This crate provides:
//! - Configuration structures for the remote, space, mirror and engine
//! - Configuration file loading (TOML/YAML)
//! - Environment variable overrides
//! - Configuration precedence (CLI > env > file > defaults)
//! - Validation through the `validator` crate

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;

pub use config::{
    CONFIG_FILE, MirrorConfig, MirrorPaths, RemoteConfig, STATE_DIR, SpaceConfig, SyncConfig,
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml, save_to_toml};
pub use loader::load_from_env;
pub use precedence::{ConfigOverrides, merge_configs, resolve};
pub use validator::Validate;
