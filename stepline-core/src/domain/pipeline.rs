//! Pipeline domain types

use serde::{Deserialize, Serialize};

use crate::validation::{ValidationError, max_len, require};

/// Longest accepted pipeline title
pub const MAX_TITLE_LEN: usize = 30;

/// Longest accepted pipeline description
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Pipeline definition
///
/// Identifies the execution environment and target infrastructure shared by
/// every component of the pipeline. Stored as a single document in the
/// pipeline's container and always replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Image identifier (without tag)
    pub environment: String,
    /// Image tag
    pub version: String,
    pub scaling_group: String,
    /// Storage host the pipeline container lives on
    #[serde(rename = "folder_host")]
    pub storage_host: String,
}

impl PipelineDefinition {
    /// Full image reference passed to the compute provider
    pub fn image(&self) -> String {
        format!("{}:{}", self.environment, self.version)
    }

    /// Validates the definition before it is persisted
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        max_len("title", &self.title, MAX_TITLE_LEN)?;
        max_len("description", &self.description, MAX_DESCRIPTION_LEN)?;
        require("environment", &self.environment)?;
        require("version", &self.version)?;
        require("scaling_group", &self.scaling_group)?;
        require("storage_host", &self.storage_host)?;
        Ok(())
    }
}
