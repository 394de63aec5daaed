//! Code and log command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;

use crate::config::Config;
use crate::id_resolver::resolve_pipeline_id;

/// Code subcommands
#[derive(Subcommand)]
pub enum CodeCommands {
    /// Print a component's code
    Show { pipeline: String, index: usize },
    /// Replace a component's code from a local file
    Set {
        pipeline: String,
        index: usize,

        /// Path to the source file
        #[arg(short, long)]
        file: String,
    },
}

/// Handle code commands
pub async fn handle_code_command(command: CodeCommands, config: &Config) -> Result<()> {
    let (service, _) = config.services();

    match command {
        CodeCommands::Show { pipeline, index } => {
            let pipeline = resolve_pipeline_id(&service, &pipeline).await?;
            let code = service.load_code(&pipeline, index).await?;
            if code.is_empty() {
                println!("{}", "(empty)".dimmed());
            } else {
                print!("{}", code);
            }
        }
        CodeCommands::Set {
            pipeline,
            index,
            file,
        } => {
            let code = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read source file: {}", file))?;
            let pipeline = resolve_pipeline_id(&service, &pipeline).await?;
            service.save_code(&pipeline, index, &code).await?;
            println!(
                "{}",
                format!("✓ Code of component {} saved; it must run again", index)
                    .green()
                    .bold()
            );
        }
    }

    Ok(())
}

/// Print the logs of a component's latest completed run
pub async fn show_logs(config: &Config, pipeline: &str, index: usize) -> Result<()> {
    let (service, _) = config.services();
    let pipeline = resolve_pipeline_id(&service, pipeline).await?;

    match service.load_logs(&pipeline, index).await? {
        Some(logs) => print!("{}", logs),
        None => println!("{}", "No logs yet: the component has not completed a run.".yellow()),
    }
    Ok(())
}
