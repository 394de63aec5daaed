//! Engine error types

use std::time::Duration;

use stepline_client::ClientError;
use stepline_core::ValidationError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the pipeline engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input, rejected before any remote call
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Content store read or write failed
    #[error("Storage error while {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: ClientError,
    },

    /// Compute provider call failed
    #[error("Provider error while {context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: ClientError,
    },

    /// An earlier component has not been executed yet
    #[error("Component {index} cannot run before component {blocking} has been executed")]
    DependencyViolation { index: usize, blocking: usize },

    /// Expected document or component is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another run or edit holds the pipeline
    #[error("Pipeline {0} is busy with another run")]
    RunInProgress(String),

    /// The polling loop used its whole step budget
    #[error("Execution did not finish within {0} polls")]
    PollBudgetExhausted(u32),

    /// The polling loop ran past its deadline
    #[error("Execution did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    /// The run was cancelled by the caller
    #[error("Run cancelled")]
    Cancelled,

    /// A component run failed; wraps the originating error with its position
    #[error("Component {index} of pipeline {pipeline_id} failed: {source}")]
    ComponentFailed {
        pipeline_id: String,
        index: usize,
        #[source]
        source: Box<EngineError>,
    },
}

/// Coarse classification of [`EngineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Provider,
    DependencyViolation,
    NotFound,
    Busy,
    Aborted,
}

impl EngineError {
    pub fn storage(context: impl Into<String>, source: ClientError) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    pub fn provider(context: impl Into<String>, source: ClientError) -> Self {
        Self::Provider {
            context: context.into(),
            source,
        }
    }

    pub fn component_failed(pipeline_id: impl Into<String>, index: usize, source: EngineError) -> Self {
        Self::ComponentFailed {
            pipeline_id: pipeline_id.into(),
            index,
            source: Box::new(source),
        }
    }

    /// Classifies the error, looking through [`EngineError::ComponentFailed`]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::DependencyViolation { .. } => ErrorKind::DependencyViolation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RunInProgress(_) => ErrorKind::Busy,
            Self::PollBudgetExhausted(_) | Self::DeadlineExceeded(_) | Self::Cancelled => {
                ErrorKind::Aborted
            }
            Self::ComponentFailed { source, .. } => source.kind(),
        }
    }

    /// The innermost engine error
    pub fn root(&self) -> &EngineError {
        match self {
            Self::ComponentFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
