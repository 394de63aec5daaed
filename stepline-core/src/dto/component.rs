//! Component DTOs

use serde::{Deserialize, Serialize};

use crate::domain::component::{PipelineComponent, ResourceRequest};

/// Request to add or replace a component
///
/// Carries everything the user edits. The `executed` flag is never taken
/// from a request: new and replaced components always start unexecuted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComponent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub path: String,
    #[serde(flatten)]
    pub resources: ResourceRequest,
}

impl NewComponent {
    pub fn new(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            path: path.into(),
            resources: ResourceRequest::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_resources(mut self, resources: ResourceRequest) -> Self {
        self.resources = resources;
        self
    }

    /// Builds the unexecuted component, slugifying the path
    pub fn into_component(self) -> PipelineComponent {
        PipelineComponent::new(self.title, self.description, &self.path, self.resources)
    }
}
