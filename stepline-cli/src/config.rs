//! Configuration module
//!
//! Loads the engine configuration and wires the engine services to one
//! manager client.

use std::sync::Arc;

use anyhow::{Context, Result};
use stepline_client::ManagerClient;
use stepline_engine::{EngineConfig, PipelineOrchestrator, PipelineService};
use tracing::debug;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
}

impl Config {
    /// Reads `STEPLINE_*` variables, with the manager URL taken from the command line
    pub fn load(manager_url: String) -> Result<Self> {
        let mut engine = EngineConfig::from_env().context("Failed to read configuration")?;
        engine.manager_url = manager_url;
        engine.validate().context("Invalid configuration")?;
        debug!("Using compute manager at {}", engine.manager_url);
        Ok(Self { engine })
    }

    /// Builds the management service and orchestrator sharing one lock registry
    pub fn services(&self) -> (PipelineService, PipelineOrchestrator) {
        let client = Arc::new(ManagerClient::new(&self.engine.manager_url));
        let orchestrator =
            PipelineOrchestrator::new(client.clone(), client.clone(), self.engine.clone());
        let service =
            PipelineService::new(client, &self.engine).with_locks(orchestrator.locks().clone());
        (service, orchestrator)
    }
}
