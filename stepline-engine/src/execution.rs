//! Execution types for the component runner
//!
//! These types only exist at runtime while a component runs.
//! They are not persisted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use stepline_core::domain::session::{ConsoleEntry, ExecutionMode, ExecutionStatus};
use stepline_core::dto::session::{ExecuteRequest, ExecuteResponse};

/// States a component run moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// Validating inputs, ensuring the component folder and code blob exist
    Preparing,
    /// Requesting a compute session
    Launching,
    /// Polling the session until the provider reports `finished`
    Executing,
    /// Capturing logs, destroying the session and persisting the flag
    Finalizing,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Preparing => write!(f, "Preparing"),
            RunState::Launching => write!(f, "Launching"),
            RunState::Executing => write!(f, "Executing"),
            RunState::Finalizing => write!(f, "Finalizing"),
            RunState::Completed => write!(f, "Completed"),
            RunState::Failed => write!(f, "Failed"),
        }
    }
}

/// Local limits on a component's polling loop
///
/// Both limits are off by default, leaving progress to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLimits {
    /// Maximum number of execute calls
    pub max_polls: Option<u32>,
    /// Maximum wall-clock time spent polling
    pub deadline: Option<Duration>,
}

impl RunLimits {
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// State of one compute session while its code runs
///
/// Threads the provider's continuation token and options from each response
/// into the next request.
#[derive(Debug, Clone)]
pub struct ExecutionSession {
    pub session_id: String,
    pub run_id: Option<String>,
    pub mode: ExecutionMode,
    pub options: JsonValue,
    pub console: Vec<ConsoleEntry>,
    pub status: Option<ExecutionStatus>,
    pub polls: u32,
}

impl ExecutionSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            run_id: None,
            mode: ExecutionMode::Initial,
            options: JsonValue::Null,
            console: Vec::new(),
            status: None,
            polls: 0,
        }
    }

    /// Builds the next poll
    ///
    /// The code is only submitted with the initial poll; continuation polls
    /// carry empty code.
    pub fn next_request(&self, code: &str) -> ExecuteRequest {
        let code = match self.mode {
            ExecutionMode::Initial => code.to_string(),
            ExecutionMode::Continue => String::new(),
        };

        ExecuteRequest {
            mode: self.mode,
            code,
            run_id: self.run_id.clone(),
            options: self.options.clone(),
        }
    }

    /// Records a poll response, returning whether execution finished
    pub fn absorb(&mut self, response: ExecuteResponse) -> bool {
        self.polls += 1;
        self.run_id = response.run_id;
        self.options = response.options;
        self.console.extend(response.console);

        let finished = response.status.is_finished();
        self.status = Some(response.status);
        if !finished {
            self.mode = ExecutionMode::Continue;
        }
        finished
    }

    pub fn is_finished(&self) -> bool {
        self.status.as_ref().is_some_and(ExecutionStatus::is_finished)
    }
}

/// Outcome of a completed component run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline_id: String,
    pub index: usize,
    pub path: String,
    pub session_id: String,
    /// Number of execute calls issued
    pub polls: u32,
    pub console: Vec<ConsoleEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
