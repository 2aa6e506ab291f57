use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;
pub mod ux_error;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let root = cli.root.clone();

    let result = match cli.command {
        Commands::Init(args) => commands::init::run(&root, args).await,
        Commands::Pull(args) => commands::pull::run(&root, args).await,
        Commands::Push(args) => commands::push::run(&root, args).await,
        Commands::Status(args) => commands::status::run(&root, args).await
    };

    if let Err(err) = result {
        ux_error::explain(&err).display();
        std::process::exit(ux_error::exit_code(&err));
    }
}
