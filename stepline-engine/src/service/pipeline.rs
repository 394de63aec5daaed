//! Pipeline Service
//!
//! Management operations for pipelines. Every mutation loads the whole
//! component list, changes it and saves it back under the pipeline's run
//! lock, so edits never interleave with a run in this process.

use std::sync::Arc;

use stepline_client::ContentStore;
use stepline_core::domain::component::{PipelineComponent, ensure_unique_paths};
use stepline_core::domain::pipeline::PipelineDefinition;
use stepline_core::dto::component::NewComponent;
use stepline_core::slug::{is_pipeline_container, pipeline_container_name};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::lock::RunLocks;
use crate::repository::{ComponentFiles, PipelineStore};

/// A pipeline as found in the content store
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    /// Name of the pipeline container
    pub id: String,
    pub host: String,
    pub definition: PipelineDefinition,
}

/// Management operations on pipelines
#[derive(Clone)]
pub struct PipelineService {
    store: Arc<dyn ContentStore>,
    pipelines: PipelineStore,
    files: ComponentFiles,
    locks: RunLocks,
}

impl PipelineService {
    pub fn new(store: Arc<dyn ContentStore>, config: &EngineConfig) -> Self {
        Self {
            pipelines: PipelineStore::new(store.clone()),
            files: ComponentFiles::new(store.clone(), config.code_entry.clone()),
            store,
            locks: RunLocks::new(),
        }
    }

    /// Shares the lock registry of an orchestrator
    pub fn with_locks(mut self, locks: RunLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Creates a pipeline container with its definition and no components
    pub async fn create_pipeline(&self, definition: &PipelineDefinition) -> Result<String> {
        definition.validate()?;

        let pipeline_id = pipeline_container_name(&definition.title);
        self.store
            .create(&pipeline_id, &definition.storage_host)
            .await
            .map_err(|e| EngineError::storage(format!("creating container {}", pipeline_id), e))?;

        let _token = self.locks.try_acquire(&pipeline_id)?;
        self.pipelines.save_definition(&pipeline_id, definition).await?;
        self.pipelines.save_components(&pipeline_id, &[]).await?;

        info!("Pipeline created: {} ({})", definition.title, pipeline_id);
        Ok(pipeline_id)
    }

    /// Lists every pipeline container with a readable definition
    pub async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        let folders = self
            .store
            .list()
            .await
            .map_err(|e| EngineError::storage("listing containers", e))?;

        let mut summaries = Vec::new();
        for folder in folders.into_iter().filter(|f| is_pipeline_container(&f.name)) {
            match self.pipelines.load_definition(&folder.name).await {
                Ok(definition) => summaries.push(PipelineSummary {
                    id: folder.name,
                    host: folder.host,
                    definition,
                }),
                Err(e) => warn!("Skipping folder {}: {}", folder.name, e),
            }
        }

        Ok(summaries)
    }

    pub async fn get_definition(&self, pipeline_id: &str) -> Result<PipelineDefinition> {
        self.pipelines.load_definition(pipeline_id).await
    }

    /// Replaces the definition of an existing pipeline
    pub async fn update_definition(
        &self,
        pipeline_id: &str,
        definition: &PipelineDefinition,
    ) -> Result<()> {
        definition.validate()?;
        let _token = self.locks.try_acquire(pipeline_id)?;

        self.pipelines.load_definition(pipeline_id).await?;
        self.pipelines.save_definition(pipeline_id, definition).await?;

        info!("Pipeline updated: {}", pipeline_id);
        Ok(())
    }

    pub async fn list_components(&self, pipeline_id: &str) -> Result<Vec<PipelineComponent>> {
        self.pipelines.load_components(pipeline_id).await
    }

    /// Appends a component, returning its index
    pub async fn add_component(&self, pipeline_id: &str, request: NewComponent) -> Result<usize> {
        let component = request.into_component();
        component.validate()?;
        let _token = self.locks.try_acquire(pipeline_id)?;

        let mut components = self.pipelines.load_components(pipeline_id).await?;
        components.push(component);
        ensure_unique_paths(&components)?;
        self.pipelines.save_components(pipeline_id, &components).await?;

        let index = components.len() - 1;
        info!(
            "Component {} ({}) added to {}",
            index, components[index].path, pipeline_id
        );
        Ok(index)
    }

    /// Replaces a component, resetting its executed flag
    ///
    /// A new path must not be used by another component. The blobs stay in
    /// the old folder.
    pub async fn update_component(
        &self,
        pipeline_id: &str,
        index: usize,
        request: NewComponent,
    ) -> Result<()> {
        let component = request.into_component();
        component.validate()?;
        let _token = self.locks.try_acquire(pipeline_id)?;

        let mut components = self.pipelines.load_components(pipeline_id).await?;
        let slot = components
            .get_mut(index)
            .ok_or_else(|| component_not_found(pipeline_id, index))?;
        let previous = std::mem::replace(slot, component);

        ensure_unique_paths(&components)?;
        self.pipelines.save_components(pipeline_id, &components).await?;

        if previous.path != components[index].path {
            warn!(
                "Component {} of {} moved from {} to {}; folder {} is no longer referenced",
                index, pipeline_id, previous.path, components[index].path, previous.path
            );
        }
        info!("Component {} of {} updated", index, pipeline_id);
        Ok(())
    }

    /// Removes a component, leaving its folder in place
    pub async fn remove_component(&self, pipeline_id: &str, index: usize) -> Result<PipelineComponent> {
        let _token = self.locks.try_acquire(pipeline_id)?;

        let mut components = self.pipelines.load_components(pipeline_id).await?;
        if index >= components.len() {
            return Err(component_not_found(pipeline_id, index));
        }
        let removed = components.remove(index);
        self.pipelines.save_components(pipeline_id, &components).await?;

        info!(
            "Component {} ({}) removed from {}",
            index, removed.path, pipeline_id
        );
        Ok(removed)
    }

    /// Returns a component's code, seeding an empty code blob when missing
    pub async fn load_code(&self, pipeline_id: &str, index: usize) -> Result<String> {
        let _token = self.locks.try_acquire(pipeline_id)?;
        let component = self.component(pipeline_id, index).await?;
        self.files.ensure_code(pipeline_id, &component).await
    }

    /// Replaces a component's code and resets its executed flag
    pub async fn save_code(&self, pipeline_id: &str, index: usize, code: &str) -> Result<()> {
        let _token = self.locks.try_acquire(pipeline_id)?;

        let mut components = self.pipelines.load_components(pipeline_id).await?;
        let component = components
            .get_mut(index)
            .ok_or_else(|| component_not_found(pipeline_id, index))?;

        self.files.save_code(pipeline_id, component, code).await?;
        component.executed = false;
        self.pipelines.save_components(pipeline_id, &components).await?;

        info!("Code of component {} of {} saved", index, pipeline_id);
        Ok(())
    }

    /// Returns the logs of a component's latest completed run
    pub async fn load_logs(&self, pipeline_id: &str, index: usize) -> Result<Option<String>> {
        let component = self.component(pipeline_id, index).await?;
        self.files.load_logs(pipeline_id, &component).await
    }

    async fn component(&self, pipeline_id: &str, index: usize) -> Result<PipelineComponent> {
        self.pipelines
            .load_components(pipeline_id)
            .await?
            .into_iter()
            .nth(index)
            .ok_or_else(|| component_not_found(pipeline_id, index))
    }
}

fn component_not_found(pipeline_id: &str, index: usize) -> EngineError {
    EngineError::NotFound(format!("component {} of pipeline {}", index, pipeline_id))
}
