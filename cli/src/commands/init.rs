use super::engine;
use crate::{output, ux_error};
use adapters::HttpRemoteApi;
use anyhow::{Context, Result};
use clap::Args;
use config::ConfigOverrides;
use mirror_core::traits::RemoteApi;
use std::path::Path;
use sync::{JsonFilePersister, MirrorState, StatePersister};

#[derive(Args)]
pub struct InitArgs {
    #[arg(long, help = "Key of the remote space to mirror")]
    pub space: String,

    #[arg(long, env = "MIRROR_BASE_URL", help = "Base URL of the remote API")]
    pub url: Option<String>,

    #[arg(long, help = "Environment variable holding the API token")]
    pub token_env: Option<String>,

    #[arg(long, help = "Overwrite an existing configuration")]
    pub force: bool
}

pub async fn run(root: &Path, args: InitArgs) -> Result<()> {
    let config_path = root.join(config::STATE_DIR).join(config::CONFIG_FILE);
    if config_path.exists() && !args.force {
        output::warn(&format!(
            "{} already exists, leaving it untouched",
            config_path.display()
        ));
        output::hint("Use --force to overwrite it");
        return Ok(());
    }

    let mut config = engine::load_config(
        root,
        ConfigOverrides {
            base_url: args.url,
            space_key: Some(args.space),
            token_env: args.token_env,
            ..Default::default()
        }
    )?;
    if config.remote.base_url.is_empty() {
        return Err(ux_error::missing_url().into());
    }

    let api = HttpRemoteApi::from_config(&config.remote)?;
    let space = api
        .get_space(&config.space.key)
        .await
        .with_context(|| format!("Failed to look up space {}", config.space.key))?;
    config.space.id = Some(space.id.clone());

    config::save_to_toml(&config, &config_path)?;

    let persister = JsonFilePersister::new(config.state_file());
    let keep_existing = persister
        .load()
        .await?
        .is_some_and(|existing| existing.space_id == space.id);
    if keep_existing {
        output::info("Existing mirror state matches this space, keeping it");
    } else {
        persister.save(&MirrorState::new(&space)).await?;
    }

    output::success(&format!(
        "Mirroring {} ({}) into {}",
        space.name,
        space.key,
        config.mirror.root.display()
    ));
    output::hint("Run `mirror pull` to fetch the pages");
    Ok(())
}
