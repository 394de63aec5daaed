//! Pipeline command handlers
//!
//! Handles pipeline creation, listing, viewing, editing and full runs.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use colored::*;
use stepline_core::domain::pipeline::PipelineDefinition;
use stepline_engine::{ComponentOutcome, PipelineReport, PipelineSummary};

use crate::config::Config;
use crate::id_resolver::resolve_pipeline_id;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Create a new pipeline
    Create {
        /// Pipeline title (at most 30 characters)
        #[arg(short, long)]
        title: String,

        /// Pipeline description (at most 200 characters)
        #[arg(short, long, default_value = "")]
        description: String,

        /// Environment image
        #[arg(short, long)]
        environment: String,

        /// Environment image tag
        #[arg(short, long)]
        version: String,

        /// Scaling group sessions are launched in
        #[arg(short, long)]
        scaling_group: String,

        /// Storage host of the pipeline container
        #[arg(long)]
        host: String,
    },
    /// List all pipelines
    List,
    /// Show a pipeline's definition and components
    Show {
        /// Pipeline name or unambiguous prefix
        id: String,
    },
    /// Edit a pipeline's definition
    Update {
        /// Pipeline name or unambiguous prefix
        id: String,

        #[command(flatten)]
        changes: DefinitionChanges,
    },
    /// Run every component in order
    Run {
        /// Pipeline name or unambiguous prefix
        id: String,
    },
}

/// Definition fields to replace; unset fields are kept
#[derive(Args)]
pub struct DefinitionChanges {
    #[arg(short, long)]
    title: Option<String>,
    #[arg(short, long)]
    description: Option<String>,
    #[arg(short, long)]
    environment: Option<String>,
    #[arg(short, long)]
    version: Option<String>,
    #[arg(short, long)]
    scaling_group: Option<String>,
    #[arg(long)]
    host: Option<String>,
}

impl DefinitionChanges {
    fn apply(self, definition: &mut PipelineDefinition) {
        let fields = [
            (self.title, &mut definition.title),
            (self.description, &mut definition.description),
            (self.environment, &mut definition.environment),
            (self.version, &mut definition.version),
            (self.scaling_group, &mut definition.scaling_group),
            (self.host, &mut definition.storage_host),
        ];
        for (change, field) in fields {
            if let Some(value) = change {
                *field = value;
            }
        }
    }
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let (service, orchestrator) = config.services();

    match command {
        PipelineCommands::Create {
            title,
            description,
            environment,
            version,
            scaling_group,
            host,
        } => {
            let definition = PipelineDefinition {
                title,
                description,
                environment,
                version,
                scaling_group,
                storage_host: host,
            };
            let id = service.create_pipeline(&definition).await?;

            println!("{}", "✓ Pipeline created successfully!".green().bold());
            println!("  ID:    {}", id.cyan());
            println!("  Title: {}", definition.title.bold());
            println!("  Image: {}", definition.image().dimmed());
            Ok(())
        }
        PipelineCommands::List => {
            let pipelines = service.list_pipelines().await?;

            if pipelines.is_empty() {
                println!("{}", "No pipelines found.".yellow());
            } else {
                println!(
                    "{}",
                    format!("Found {} pipeline(s):", pipelines.len()).bold()
                );
                println!();
                for pipeline in &pipelines {
                    print_pipeline_summary(pipeline);
                }
            }
            Ok(())
        }
        PipelineCommands::Show { id } => {
            let id = resolve_pipeline_id(&service, &id).await?;
            let definition = service.get_definition(&id).await?;
            let components = service.list_components(&id).await?;

            println!("{}", "Pipeline Details:".bold());
            println!("  ID:            {}", id.cyan());
            println!("  Title:         {}", definition.title.bold());
            if !definition.description.is_empty() {
                println!("  Description:   {}", definition.description);
            }
            println!("  Image:         {}", definition.image());
            println!("  Scaling group: {}", definition.scaling_group);
            println!("  Host:          {}", definition.storage_host);

            println!("\n{}", "Components:".bold());
            if components.is_empty() {
                println!("  {}", "(none)".dimmed());
            }
            for (index, component) in components.iter().enumerate() {
                let mark = if component.executed {
                    "✓".green()
                } else {
                    "·".dimmed()
                };
                println!(
                    "  {} {:>2}  {} {}",
                    mark,
                    index,
                    component.title.bold(),
                    format!("({})", component.path).dimmed()
                );
            }
            Ok(())
        }
        PipelineCommands::Update { id, changes } => {
            let id = resolve_pipeline_id(&service, &id).await?;
            let mut definition = service.get_definition(&id).await?;
            changes.apply(&mut definition);
            service.update_definition(&id, &definition).await?;

            println!(
                "{}",
                format!("✓ Pipeline {} updated successfully!", id).green().bold()
            );
            Ok(())
        }
        PipelineCommands::Run { id } => {
            let id = resolve_pipeline_id(&service, &id).await?;
            let report = orchestrator.run_pipeline(&id).await?;
            print_report(&report);

            if !report.is_success() {
                bail!("Pipeline {} did not complete every component", id);
            }
            Ok(())
        }
    }
}

/// Print a pipeline summary
fn print_pipeline_summary(pipeline: &PipelineSummary) {
    println!("  {} {}", "▸".cyan(), pipeline.definition.title.bold());
    println!("    ID:    {}", pipeline.id.dimmed());
    println!("    Image: {}", pipeline.definition.image().dimmed());
    println!("    Host:  {}", pipeline.host.dimmed());
    if !pipeline.definition.description.is_empty() {
        println!("    Description: {}", pipeline.definition.description.dimmed());
    }
    println!();
}

/// Print the outcome of each component of a full run
fn print_report(report: &PipelineReport) {
    println!("{}", format!("Run of {}:", report.pipeline_id).bold());
    for result in &report.results {
        let line = match &result.outcome {
            ComponentOutcome::Completed(run) => format!(
                "{} completed in {} poll(s)",
                "✓".green(),
                run.polls
            ),
            ComponentOutcome::Failed(e) => format!("{} failed: {}", "✗".red(), e.root()),
            ComponentOutcome::Denied(e) => format!("{} denied: {}", "⊘".yellow(), e),
            ComponentOutcome::NotAttempted => format!("{} not attempted", "·".dimmed()),
        };
        println!("  {:>2} {:<24} {}", result.index, result.path, line);
    }

    let summary = format!(
        "{} completed, {} failed, {} denied, {} not attempted in {}s",
        report.completed(),
        report.failed(),
        report.denied(),
        report.not_attempted(),
        (report.finished_at - report.started_at).num_seconds()
    );
    if report.is_success() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
    }
}
