//! Stepline Engine
//!
//! Executes pipelines: ordered chains of components, each run in its own
//! compute session, with configuration, code, logs and completion state kept
//! in a content store.
//!
//! - [`repository`]: the pipeline documents and component blobs
//! - [`gate`]: whether a component may run given its predecessors
//! - [`runner`]: the per-component session state machine
//! - [`orchestrator`]: full and single-component runs under a per-pipeline lock
//! - [`service`]: pipeline and component management
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stepline_client::ManagerClient;
//! use stepline_engine::{EngineConfig, PipelineOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::from_env()?;
//!     let client = Arc::new(ManagerClient::new(&config.manager_url));
//!     let orchestrator = PipelineOrchestrator::new(client.clone(), client, config);
//!
//!     let report = orchestrator.run_pipeline("pipeline-churn-model-1a2b3c4d").await?;
//!     println!("{} of {} completed", report.completed(), report.results.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod gate;
pub mod lock;
pub mod orchestrator;
pub mod repository;
pub mod runner;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind, Result};
pub use execution::{RunLimits, RunReport, RunState};
pub use lock::RunLocks;
pub use orchestrator::{ComponentOutcome, ComponentResult, PipelineOrchestrator, PipelineReport};
pub use runner::{ComponentRunner, RunRequest};
pub use service::{PipelineService, PipelineSummary};
