//! Compute session domain types
//!
//! These types only exist while a component runs. They are never persisted.

use serde::{Deserialize, Serialize};

/// Execution mode of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// First submission carrying the component's code
    #[serde(rename = "query")]
    Initial,
    /// Follow-up poll with empty code, echoing the previous run id
    #[serde(rename = "continue")]
    Continue,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Initial => "query",
            ExecutionMode::Continue => "continue",
        }
    }
}

/// Status reported by the provider after a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStatus {
    Finished,
    Continued,
    WaitingInput,
    BuildFinished,
    /// Any status this crate does not know about; treated as still running
    #[serde(other)]
    Running,
}

impl ExecutionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, ExecutionStatus::Finished)
    }
}

impl From<&str> for ExecutionStatus {
    fn from(value: &str) -> Self {
        match value {
            "finished" => ExecutionStatus::Finished,
            "continued" => ExecutionStatus::Continued,
            "waiting-input" => ExecutionStatus::WaitingInput,
            "build-finished" => ExecutionStatus::BuildFinished,
            _ => ExecutionStatus::Running,
        }
    }
}

/// Output stream of a console entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for ConsoleStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleStream::Stdout => write!(f, "stdout"),
            ConsoleStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// A piece of console output captured from one poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub stream: ConsoleStream,
    pub text: String,
}

impl ConsoleEntry {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: ConsoleStream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: ConsoleStream::Stderr,
            text: text.into(),
        }
    }
}
