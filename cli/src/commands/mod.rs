pub mod engine;
pub mod init;
pub mod pull;
pub mod push;
pub mod status;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mirror",
    author,
    version,
    about = "Mirror - keep a remote page space and a folder of markdown in step",
    long_about = "Pulls a remote page tree into markdown files with front matter and pushes \
                  local edits back.\n\nVersion conflicts are detected and refused, never \
                  merged. Run `mirror init` once per mirror directory."
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        env = "MIRROR_ROOT",
        help = "Mirror root directory"
    )]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Connect this directory to a remote space")]
    Init(init::InitArgs),

    #[command(about = "Bring remote changes into the mirror")]
    Pull(pull::PullArgs),

    #[command(about = "Send local changes to the remote")]
    Push(push::PushArgs),

    #[command(about = "Show pending changes in both directions")]
    Status(status::StatusArgs)
}
