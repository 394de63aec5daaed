//! Service Module
//!
//! Pipeline management on top of the store: creating pipelines and editing
//! their components, code and definition.

pub mod pipeline;

pub use pipeline::{PipelineService, PipelineSummary};
