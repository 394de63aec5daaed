//! ID resolver module
//!
//! Lets users name a pipeline by an unambiguous part of its container name
//! instead of the full `pipeline-<slug>-<suffix>`.

use anyhow::{Context, Result, anyhow};
use stepline_core::slug::PIPELINE_PREFIX;
use stepline_engine::PipelineService;

/// Resolve a pipeline name or prefix to a full container name
///
/// The `pipeline-` prefix may be omitted.
///
/// # Errors
/// Returns an error if:
/// - No pipeline matches the prefix
/// - Multiple pipelines match the prefix (ambiguous)
/// - Listing pipelines fails
pub async fn resolve_pipeline_id(service: &PipelineService, input: &str) -> Result<String> {
    let pipelines = service
        .list_pipelines()
        .await
        .context("Failed to fetch pipelines for ID resolution")?;

    let ids: Vec<String> = pipelines.into_iter().map(|p| p.id).collect();
    match_pipeline_id(&ids, input)
}

fn match_pipeline_id(ids: &[String], input: &str) -> Result<String> {
    let input = input.to_lowercase();
    let prefix = if input.starts_with(PIPELINE_PREFIX) {
        input
    } else {
        format!("{}{}", PIPELINE_PREFIX, input)
    };

    if let Some(exact) = ids.iter().find(|id| **id == prefix) {
        return Ok(exact.clone());
    }

    let matches: Vec<&String> = ids.iter().filter(|id| id.starts_with(&prefix)).collect();

    match matches.len() {
        0 => Err(anyhow!("No pipeline found matching '{}'", prefix)),
        1 => Ok(matches[0].clone()),
        _ => {
            let names: Vec<&str> = matches.iter().map(|id| id.as_str()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple pipelines: {}",
                prefix,
                names.join(", ")
            ))
        }
    }
}
