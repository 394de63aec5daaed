//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod code;
mod component;
mod pipeline;

pub use code::CodeCommands;
pub use component::ComponentCommands;
pub use pipeline::PipelineCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline management and full runs
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Component management and single runs
    Component {
        #[command(subcommand)]
        command: ComponentCommands,
    },
    /// Component source code
    Code {
        #[command(subcommand)]
        command: CodeCommands,
    },
    /// Show the logs of a component's latest completed run
    Logs {
        /// Pipeline name or unambiguous prefix
        pipeline: String,
        /// Component position, starting at 0
        index: usize,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Component { command } => {
            component::handle_component_command(command, config).await
        }
        Commands::Code { command } => code::handle_code_command(command, config).await,
        Commands::Logs { pipeline, index } => code::show_logs(config, &pipeline, index).await,
    }
}
