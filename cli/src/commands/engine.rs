//! Wiring shared by the commands that talk to a configured mirror.

use crate::ux_error;
use adapters::{HttpRemoteApi, MarkdownPassthrough};
use anyhow::Result;
use config::{ConfigOverrides, MirrorConfig};
use std::path::Path;
use std::sync::Arc;
use sync::{JsonFilePersister, SyncManager};
use tokio::sync::watch;

/// Resolve configuration for the mirror at `root`: CLI over environment over
/// `.mirror/config.toml` over defaults.
pub fn load_config(root: &Path, cli: ConfigOverrides) -> Result<MirrorConfig> {
    let env = config::load_from_env()?;
    Ok(config::resolve(root, env, cli)?)
}

/// Build a sync manager for an initialized mirror. Ctrl-C flips the
/// cancellation flag so the run stops after the page in flight.
pub fn manager(root: &Path) -> Result<SyncManager> {
    let config = load_config(root, ConfigOverrides::default())?;
    if !config.is_configured() || !config.state_file().exists() {
        return Err(ux_error::not_configured().into());
    }

    let api = HttpRemoteApi::from_config(&config.remote)?;
    let persister = JsonFilePersister::new(config.state_file());
    tracing::debug!(root = %config.mirror.root.display(), space = %config.space.key, "mirror configured");

    Ok(SyncManager::new(
        Arc::new(api),
        Arc::new(MarkdownPassthrough::new()),
        Arc::new(persister),
        &config.mirror.root,
        &config.sync
    )
    .with_cancellation(interrupt_signal()))
}

fn interrupt_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current page");
            let _ = tx.send(true);
        }
    });
    rx
}
