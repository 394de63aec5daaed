//! Component files
//!
//! Code and log blobs live in the component's folder inside the pipeline
//! container: `<path>/<code entry>` and `<path>/logs.txt`. Renaming a
//! component does not move them.

use std::sync::Arc;

use stepline_client::{ClientError, ContentStore};
use stepline_core::domain::component::PipelineComponent;
use tracing::{debug, info};

use crate::error::{EngineError, Result};

/// Access to the blobs of a pipeline's components
#[derive(Clone)]
pub struct ComponentFiles {
    store: Arc<dyn ContentStore>,
    code_entry: String,
}

impl ComponentFiles {
    pub fn new(store: Arc<dyn ContentStore>, code_entry: impl Into<String>) -> Self {
        Self {
            store,
            code_entry: code_entry.into(),
        }
    }

    /// Creates the component folder, ignoring one that already exists
    pub async fn ensure_folder(&self, pipeline_id: &str, component: &PipelineComponent) -> Result<()> {
        match self.store.mkdir(pipeline_id, &component.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_conflict() => {
                debug!("Folder {} already exists in {}", component.path, pipeline_id);
                Ok(())
            }
            Err(e) => Err(EngineError::storage(
                format!("creating folder {}", component.path),
                e,
            )),
        }
    }

    /// Returns the component's code, seeding an empty code blob when it has none
    pub async fn ensure_code(&self, pipeline_id: &str, component: &PipelineComponent) -> Result<String> {
        self.ensure_folder(pipeline_id, component).await?;

        let path = component.code_path(&self.code_entry);
        match self.store.download(pipeline_id, &path).await {
            Ok(bytes) => text(&path, bytes),
            Err(e) if e.is_not_found() => {
                info!("No code at {} in {}, seeding an empty file", path, pipeline_id);
                self.store
                    .upload(pipeline_id, &path, Vec::new())
                    .await
                    .map_err(|e| EngineError::storage(format!("seeding {}", path), e))?;
                Ok(String::new())
            }
            Err(e) => Err(EngineError::storage(format!("reading {}", path), e)),
        }
    }

    /// Replaces the component's code
    pub async fn save_code(&self, pipeline_id: &str, component: &PipelineComponent, code: &str) -> Result<()> {
        self.ensure_folder(pipeline_id, component).await?;

        let path = component.code_path(&self.code_entry);
        self.store
            .upload(pipeline_id, &path, code.as_bytes().to_vec())
            .await
            .map_err(|e| EngineError::storage(format!("writing {}", path), e))
    }

    /// Writes the log blob of the latest run
    pub async fn save_logs(&self, pipeline_id: &str, component: &PipelineComponent, logs: String) -> Result<()> {
        let path = component.log_path();
        self.store
            .upload(pipeline_id, &path, logs.into_bytes())
            .await
            .map_err(|e| EngineError::storage(format!("writing {}", path), e))
    }

    /// Reads the log blob of the latest run, if the component ever completed one
    pub async fn load_logs(&self, pipeline_id: &str, component: &PipelineComponent) -> Result<Option<String>> {
        let path = component.log_path();
        match self.store.download(pipeline_id, &path).await {
            Ok(bytes) => text(&path, bytes).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(EngineError::storage(format!("reading {}", path), e)),
        }
    }
}

/// Code and logs are text; a blob that is not UTF-8 is refused rather than altered
fn text(path: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        EngineError::storage(
            format!("reading {}", path),
            ClientError::Malformed(format!("{} is not UTF-8 text: {}", path, e.utf8_error())),
        )
    })
}
