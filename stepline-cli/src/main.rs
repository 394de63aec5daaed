//! Stepline CLI
//!
//! Command-line interface for managing and running pipelines against a
//! compute manager.

mod commands;
mod config;
mod id_resolver;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stepline")]
#[command(about = "Stepline pipeline CLI", long_about = None)]
struct Cli {
    /// Compute manager URL
    #[arg(
        long,
        env = "STEPLINE_MANAGER_URL",
        default_value = "http://localhost:8081"
    )]
    manager_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepline_cli=info,stepline_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.manager_url)?;

    handle_command(cli.command, &config).await
}
