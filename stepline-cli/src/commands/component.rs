//! Component command handlers

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::*;
use stepline_core::domain::component::ResourceRequest;
use stepline_core::domain::session::ConsoleStream;
use stepline_core::dto::component::NewComponent;

use crate::config::Config;
use crate::id_resolver::resolve_pipeline_id;

/// Component subcommands
#[derive(Subcommand)]
pub enum ComponentCommands {
    /// Append a component to a pipeline
    Add {
        /// Pipeline name or unambiguous prefix
        pipeline: String,

        #[command(flatten)]
        fields: ComponentFields,
    },
    /// Replace a component; its executed flag is reset
    Update {
        pipeline: String,
        index: usize,

        #[command(flatten)]
        fields: ComponentFields,
    },
    /// Remove a component; its folder is left in place
    Remove { pipeline: String, index: usize },
    /// List a pipeline's components in order
    List { pipeline: String },
    /// Run one component after its predecessors have been executed
    Run { pipeline: String, index: usize },
}

#[derive(Args)]
pub struct ComponentFields {
    #[arg(short, long)]
    title: String,

    /// Folder name of the component (slugified)
    #[arg(short, long)]
    path: String,

    #[arg(short, long, default_value = "")]
    description: String,

    /// CPU cores
    #[arg(long, default_value_t = 1)]
    cpu: u32,

    /// Memory in GiB
    #[arg(long, default_value_t = 1.0)]
    mem: f64,

    /// GPU units
    #[arg(long, default_value_t = 0.0)]
    gpu: f64,
}

impl From<ComponentFields> for NewComponent {
    fn from(fields: ComponentFields) -> Self {
        NewComponent::new(fields.title, fields.path)
            .with_description(fields.description)
            .with_resources(ResourceRequest::new(fields.cpu, fields.mem, fields.gpu))
    }
}

/// Handle component commands
pub async fn handle_component_command(command: ComponentCommands, config: &Config) -> Result<()> {
    let (service, orchestrator) = config.services();

    match command {
        ComponentCommands::Add { pipeline, fields } => {
            let pipeline = resolve_pipeline_id(&service, &pipeline).await?;
            let index = service.add_component(&pipeline, fields.into()).await?;
            println!(
                "{}",
                format!("✓ Component {} added to {}", index, pipeline).green().bold()
            );
        }
        ComponentCommands::Update {
            pipeline,
            index,
            fields,
        } => {
            let pipeline = resolve_pipeline_id(&service, &pipeline).await?;
            service
                .update_component(&pipeline, index, fields.into())
                .await?;
            println!(
                "{}",
                format!("✓ Component {} of {} updated", index, pipeline).green().bold()
            );
        }
        ComponentCommands::Remove { pipeline, index } => {
            let pipeline = resolve_pipeline_id(&service, &pipeline).await?;
            let removed = service.remove_component(&pipeline, index).await?;
            println!(
                "{}",
                format!("✓ Component {} ({}) removed", index, removed.path)
                    .green()
                    .bold()
            );
        }
        ComponentCommands::List { pipeline } => {
            let pipeline = resolve_pipeline_id(&service, &pipeline).await?;
            let components = service.list_components(&pipeline).await?;

            if components.is_empty() {
                println!("{}", "No components found.".yellow());
            }
            for (index, component) in components.iter().enumerate() {
                let status = if component.executed {
                    "executed".green()
                } else {
                    "pending".yellow()
                };
                println!("  {} {} {}", "▸".cyan(), index, component.title.bold());
                println!("    Path:      {}", component.path.dimmed());
                println!(
                    "    Resources: {} cpu, {} GiB, {} gpu",
                    component.resources.cpu, component.resources.mem, component.resources.gpu
                );
                println!("    Status:    {}", status);
                println!();
            }
        }
        ComponentCommands::Run { pipeline, index } => {
            let pipeline = resolve_pipeline_id(&service, &pipeline).await?;
            let report = orchestrator.run_single_component(&pipeline, index).await?;

            for entry in &report.console {
                match entry.stream {
                    ConsoleStream::Stdout => print!("{}", entry.text),
                    ConsoleStream::Stderr => eprint!("{}", entry.text.red()),
                }
            }
            println!(
                "{}",
                format!(
                    "✓ Component {} ({}) completed in {} poll(s)",
                    report.index, report.path, report.polls
                )
                .green()
                .bold()
            );
        }
    }

    Ok(())
}
