//! Pipeline orchestrator
//!
//! Runs a pipeline's components in order, one at a time. Before each
//! component the sequence is reloaded from the store and passed through the
//! dependency gate, so a component blocked by an earlier failure is reported
//! as denied instead of being run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use stepline_client::{ComputeSessions, ContentStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::execution::RunReport;
use crate::gate;
use crate::lock::RunLocks;
use crate::repository::PipelineStore;
use crate::runner::{ComponentRunner, RunRequest};

/// What happened to one component during a full run
#[derive(Debug)]
pub enum ComponentOutcome {
    Completed(RunReport),
    Failed(EngineError),
    /// Blocked by an unexecuted predecessor
    Denied(EngineError),
    /// Skipped because the run stopped early
    NotAttempted,
}

#[derive(Debug)]
pub struct ComponentResult {
    pub index: usize,
    pub path: String,
    pub outcome: ComponentOutcome,
}

/// Aggregate result of a full pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    pub pipeline_id: String,
    pub results: Vec<ComponentResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    fn count(&self, matches: impl Fn(&ComponentOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| matches(&r.outcome)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::Completed(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::Failed(_)))
    }

    pub fn denied(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::Denied(_)))
    }

    pub fn not_attempted(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::NotAttempted))
    }

    /// True when every component completed
    pub fn is_success(&self) -> bool {
        self.completed() == self.results.len()
    }
}

/// Entry point for running pipelines
pub struct PipelineOrchestrator {
    pipelines: PipelineStore,
    runner: ComponentRunner,
    locks: RunLocks,
    config: EngineConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        sessions: Arc<dyn ComputeSessions>,
        config: EngineConfig,
    ) -> Self {
        Self {
            pipelines: PipelineStore::new(store.clone()),
            runner: ComponentRunner::new(store, sessions, config.clone()),
            locks: RunLocks::new(),
            config,
        }
    }

    /// Shares a lock registry with other components, such as the management service
    pub fn with_locks(mut self, locks: RunLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &RunLocks {
        &self.locks
    }

    /// Runs every component of a pipeline in order
    pub async fn run_pipeline(&self, pipeline_id: &str) -> Result<PipelineReport> {
        self.run_pipeline_with_cancel(pipeline_id, &CancellationToken::new())
            .await
    }

    /// Runs every component of a pipeline in order until cancelled
    ///
    /// Component failures and denials are recorded in the report and the
    /// loop moves on. Only failing to take the lock or to load the pipeline
    /// fails the whole call.
    pub async fn run_pipeline_with_cancel(
        &self,
        pipeline_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport> {
        let _token = self.locks.try_acquire(pipeline_id)?;
        let started_at = Utc::now();

        let definition = self.pipelines.load_definition(pipeline_id).await?;
        let count = self.pipelines.load_components(pipeline_id).await?.len();

        info!(
            "Running pipeline {} ({}) with {} component(s)",
            pipeline_id, definition.title, count
        );

        let mut results = Vec::with_capacity(count);
        let mut stopped = false;

        for index in 0..count {
            let components = self.pipelines.load_components(pipeline_id).await;
            let path = components
                .as_ref()
                .ok()
                .and_then(|c| c.get(index))
                .map(|c| c.path.clone())
                .unwrap_or_default();

            if stopped || cancel.is_cancelled() {
                results.push(ComponentResult {
                    index,
                    path,
                    outcome: ComponentOutcome::NotAttempted,
                });
                continue;
            }

            let outcome = match components {
                Err(e) => {
                    error!("Failed to reload components of {}: {}", pipeline_id, e);
                    ComponentOutcome::Failed(e)
                }
                Ok(components) => match gate::check(&components, index) {
                    Err(e) => {
                        warn!("Skipping component {} of {}: {}", index, pipeline_id, e);
                        if self.config.stop_on_violation {
                            stopped = true;
                        }
                        ComponentOutcome::Denied(e)
                    }
                    Ok(()) => {
                        let request = RunRequest {
                            pipeline_id: pipeline_id.to_string(),
                            definition: definition.clone(),
                            components,
                            index,
                        };
                        match self.runner.run(request, cancel).await {
                            Ok(report) => ComponentOutcome::Completed(report),
                            Err(e) => ComponentOutcome::Failed(e),
                        }
                    }
                },
            };

            results.push(ComponentResult {
                index,
                path,
                outcome,
            });
        }

        let report = PipelineReport {
            pipeline_id: pipeline_id.to_string(),
            results,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            "Pipeline {} finished: {} completed, {} failed, {} denied, {} not attempted",
            pipeline_id,
            report.completed(),
            report.failed(),
            report.denied(),
            report.not_attempted()
        );

        Ok(report)
    }

    /// Runs one component, provided every earlier component has been executed
    pub async fn run_single_component(&self, pipeline_id: &str, index: usize) -> Result<RunReport> {
        self.run_single_component_with_cancel(pipeline_id, index, &CancellationToken::new())
            .await
    }

    pub async fn run_single_component_with_cancel(
        &self,
        pipeline_id: &str,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let _token = self.locks.try_acquire(pipeline_id)?;

        let definition = self.pipelines.load_definition(pipeline_id).await?;
        let components = self.pipelines.load_components(pipeline_id).await?;

        if index >= components.len() {
            return Err(EngineError::NotFound(format!(
                "component {} of pipeline {}",
                index, pipeline_id
            )));
        }

        if let Err(e) = gate::check(&components, index) {
            warn!("Refusing to run component {} of {}: {}", index, pipeline_id, e);
            return Err(e);
        }

        let request = RunRequest {
            pipeline_id: pipeline_id.to_string(),
            definition,
            components,
            index,
        };
        self.runner.run(request, cancel).await
    }
}
