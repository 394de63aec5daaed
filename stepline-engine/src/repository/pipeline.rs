//! Pipeline store
//!
//! Reads and writes the two documents kept at the root of every pipeline
//! container: the definition and the ordered component list. Each call is
//! exactly one blob read or one blob write. There is no merging: callers load
//! the whole document, modify it and save it back, and the last writer wins.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use stepline_client::{ClientError, ContentStore};
use stepline_core::domain::component::{PipelineComponent, ensure_unique_paths};
use stepline_core::domain::pipeline::PipelineDefinition;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Key of the definition document
pub const DEFINITION_KEY: &str = "config.json";

/// Key of the component list document
pub const COMPONENTS_KEY: &str = "components.json";

/// Persistence of pipeline documents
#[derive(Clone)]
pub struct PipelineStore {
    store: Arc<dyn ContentStore>,
}

impl PipelineStore {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Loads the definition, failing with [`EngineError::NotFound`] when absent
    pub async fn load_definition(&self, pipeline_id: &str) -> Result<PipelineDefinition> {
        match self.read(pipeline_id, DEFINITION_KEY).await? {
            Some(definition) => Ok(definition),
            None => Err(EngineError::NotFound(format!(
                "definition of pipeline {}",
                pipeline_id
            ))),
        }
    }

    /// Validates and replaces the definition
    pub async fn save_definition(
        &self,
        pipeline_id: &str,
        definition: &PipelineDefinition,
    ) -> Result<()> {
        definition.validate()?;
        self.write(pipeline_id, DEFINITION_KEY, definition).await
    }

    /// Loads the ordered component list
    ///
    /// A pipeline without a component document has no components yet.
    pub async fn load_components(&self, pipeline_id: &str) -> Result<Vec<PipelineComponent>> {
        let components: Option<Option<Vec<PipelineComponent>>> =
            self.read(pipeline_id, COMPONENTS_KEY).await?;
        Ok(components.flatten().unwrap_or_default())
    }

    /// Validates and replaces the ordered component list
    pub async fn save_components(
        &self,
        pipeline_id: &str,
        components: &[PipelineComponent],
    ) -> Result<()> {
        for component in components {
            component.validate()?;
        }
        ensure_unique_paths(components)?;
        self.write(pipeline_id, COMPONENTS_KEY, &components).await
    }

    async fn read<T: DeserializeOwned>(&self, pipeline_id: &str, key: &str) -> Result<Option<T>> {
        debug!("Reading {} from {}", key, pipeline_id);

        let bytes = match self.store.download(pipeline_id, key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(EngineError::storage(format!("reading {}", key), e)),
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            EngineError::storage(
                format!("reading {}", key),
                ClientError::Malformed(e.to_string()),
            )
        })
    }

    async fn write<T: Serialize + ?Sized>(&self, pipeline_id: &str, key: &str, value: &T) -> Result<()> {
        debug!("Writing {} to {}", key, pipeline_id);

        let bytes = serde_json::to_vec_pretty(value).map_err(|e| {
            EngineError::storage(
                format!("encoding {}", key),
                ClientError::Encode(e.to_string()),
            )
        })?;

        self.store
            .upload(pipeline_id, key, bytes)
            .await
            .map_err(|e| EngineError::storage(format!("writing {}", key), e))
    }
}
