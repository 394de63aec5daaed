//! Pipeline component domain types

use serde::{Deserialize, Deserializer, Serialize};

use crate::slug::slugify;
use crate::domain::pipeline::{MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use crate::validation::{ValidationError, max_len, require};

/// Name of the log blob written inside a component folder after each run
pub const LOG_FILE: &str = "logs.txt";

/// Longest accepted component path
pub const MAX_PATH_LEN: usize = 300;

/// Smallest memory request accepted, in GiB
pub const MIN_MEMORY_GIB: f64 = 0.1;

/// One executable step of a pipeline
///
/// Its position in the pipeline's component list is its dependency: a
/// component may only run once every component before it has `executed` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineComponent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Folder holding the component's code and logs, unique within the pipeline
    pub path: String,
    #[serde(flatten)]
    pub resources: ResourceRequest,
    #[serde(default)]
    pub executed: bool,
}

impl PipelineComponent {
    /// Creates an unexecuted component, slugifying `path`
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        path: &str,
        resources: ResourceRequest,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            path: slugify(path),
            resources,
            executed: false,
        }
    }

    /// Location of the code blob, relative to the pipeline container
    pub fn code_path(&self, entry: &str) -> String {
        format!("{}/{}", self.path, entry)
    }

    /// Location of the log blob, relative to the pipeline container
    pub fn log_path(&self) -> String {
        format!("{}/{}", self.path, LOG_FILE)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        max_len("title", &self.title, MAX_TITLE_LEN)?;
        max_len("description", &self.description, MAX_DESCRIPTION_LEN)?;
        require("path", &self.path)?;
        max_len("path", &self.path, MAX_PATH_LEN)?;
        if slugify(&self.path) != self.path {
            return Err(ValidationError::Invalid(format!(
                "component path '{}' is not a slug",
                self.path
            )));
        }
        self.resources.validate()
    }
}

/// Compute resources requested for one run of a component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// CPU cores, at least 1
    #[serde(deserialize_with = "lenient::cpu")]
    pub cpu: u32,
    /// Memory in GiB, at least 0.1
    #[serde(deserialize_with = "lenient::float")]
    pub mem: f64,
    /// GPU units, fractional allowed
    #[serde(default, deserialize_with = "lenient::float")]
    pub gpu: f64,
}

impl ResourceRequest {
    pub fn new(cpu: u32, mem: f64, gpu: f64) -> Self {
        Self { cpu, mem, gpu }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cpu < 1 {
            return Err(ValidationError::InvalidResource(
                "CPU should be at least 1".to_string(),
            ));
        }
        if !self.mem.is_finite() || self.mem < MIN_MEMORY_GIB {
            return Err(ValidationError::InvalidResource(format!(
                "Memory should be at least {} GiB",
                MIN_MEMORY_GIB
            )));
        }
        if !self.gpu.is_finite() || self.gpu < 0.0 {
            return Err(ValidationError::InvalidResource(
                "GPU should not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self {
            cpu: 1,
            mem: 1.0,
            gpu: 0.0,
        }
    }
}

/// Checks that no two components share a path
pub fn ensure_unique_paths(components: &[PipelineComponent]) -> Result<(), ValidationError> {
    for (i, component) in components.iter().enumerate() {
        if components[..i].iter().any(|c| c.path == component.path) {
            return Err(ValidationError::DuplicatePath(component.path.clone()));
        }
    }
    Ok(())
}

/// Deserializers accepting numbers written either as JSON numbers or strings
///
/// Component documents produced by form inputs carry `"cpu": "2"`.
mod lenient {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(serde_json::Number),
        String(String),
    }

    fn parse<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => n
                .as_f64()
                .ok_or_else(|| serde::de::Error::custom("number out of range")),
            NumberOrString::String(s) if s.trim().is_empty() => Ok(0.0),
            NumberOrString::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid number '{}'", s))),
        }
    }

    pub fn float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        parse(deserializer)
    }

    pub fn cpu<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = parse(deserializer)?;
        if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
            return Err(serde::de::Error::custom(format!(
                "invalid cpu count {}",
                value
            )));
        }
        Ok(value as u32)
    }
}
