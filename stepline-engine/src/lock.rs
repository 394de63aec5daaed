//! Per-pipeline run locks
//!
//! At most one run or edit holds a pipeline at a time. A second caller is
//! rejected with [`EngineError::RunInProgress`] instead of waiting.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{EngineError, Result};

/// Registry of pipelines currently held
#[derive(Debug, Clone, Default)]
pub struct RunLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock of a pipeline, released when the token is dropped
    pub fn try_acquire(&self, pipeline_id: &str) -> Result<RunToken> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(pipeline_id.to_string()) {
            return Err(EngineError::RunInProgress(pipeline_id.to_string()));
        }
        debug!("Locked pipeline {}", pipeline_id);

        Ok(RunToken {
            pipeline_id: pipeline_id.to_string(),
            held: self.held.clone(),
        })
    }

    pub fn is_running(&self, pipeline_id: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(pipeline_id)
    }
}

/// Proof of holding a pipeline's lock
#[derive(Debug)]
pub struct RunToken {
    pipeline_id: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl RunToken {
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }
}

impl Drop for RunToken {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.pipeline_id);
        debug!("Released pipeline {}", self.pipeline_id);
    }
}
