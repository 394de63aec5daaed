//! Compute session DTOs

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::component::ResourceRequest;
use crate::domain::session::{ConsoleEntry, ConsoleStream, ExecutionMode, ExecutionStatus};

/// Placement and resource options for a new compute session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub domain: String,
    pub group: String,
    pub scaling_group: String,
    /// Storage containers mounted into the session
    pub mounts: Vec<String>,
    pub resources: ResourceRequest,
    /// How long the provider may wait for the session to start before answering
    pub max_wait_seconds: u64,
}

/// Handle to a session created by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    #[serde(rename = "sessionId", alias = "kernelId")]
    pub session_id: String,
}

/// One poll submitted to a running session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub mode: ExecutionMode,
    pub code: String,
    /// Continuation token from the previous response, absent on the first poll
    #[serde(rename = "runId")]
    pub run_id: Option<String>,
    /// Provider options, echoed verbatim from the previous response
    #[serde(default)]
    pub options: JsonValue,
}

/// Result of one poll, unwrapped from the provider envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteResponse {
    pub status: ExecutionStatus,
    pub run_id: Option<String>,
    pub options: JsonValue,
    pub console: Vec<ConsoleEntry>,
}

impl ExecuteResponse {
    /// A finished poll with no console output
    pub fn finished(run_id: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Finished,
            run_id: Some(run_id.into()),
            options: JsonValue::Null,
            console: Vec::new(),
        }
    }

    /// A poll that is still in progress
    pub fn running(run_id: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Continued,
            run_id: Some(run_id.into()),
            options: JsonValue::Null,
            console: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: JsonValue) -> Self {
        self.options = options;
        self
    }

    pub fn with_console(mut self, entry: ConsoleEntry) -> Self {
        self.console.push(entry);
        self
    }
}

// =============================================================================
// Wire Envelopes
// =============================================================================

/// Request body for session creation
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub image: String,
    #[serde(rename = "clientSessionToken")]
    pub client_session_token: String,
    pub domain: String,
    pub group_name: String,
    pub scaling_group: String,
    pub mounts: Vec<String>,
    pub resources: ResourceSlots,
    #[serde(rename = "maxWaitSeconds")]
    pub max_wait_seconds: u64,
}

/// Resource slots in the provider's notation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSlots {
    pub cpu: u32,
    /// Memory with unit suffix, e.g. `"1.5g"`
    pub mem: String,
    /// Fractional GPU units
    pub fgpu: f64,
}

impl From<&ResourceRequest> for ResourceSlots {
    fn from(req: &ResourceRequest) -> Self {
        Self {
            cpu: req.cpu,
            mem: format!("{}g", req.mem),
            fgpu: req.gpu,
        }
    }
}

impl CreateSessionRequest {
    pub fn new(image: String, client_session_token: String, options: &SessionOptions) -> Self {
        Self {
            image,
            client_session_token,
            domain: options.domain.clone(),
            group_name: options.group.clone(),
            scaling_group: options.scaling_group.clone(),
            mounts: options.mounts.clone(),
            resources: ResourceSlots::from(&options.resources),
            max_wait_seconds: options.max_wait_seconds,
        }
    }
}

/// `{"result": {...}}` wrapper used by execute and logs responses
#[derive(Debug, Clone, Deserialize)]
pub struct ResultEnvelope<T> {
    pub result: T,
}

/// Raw execute result as returned by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct RawExecuteResult {
    pub status: String,
    #[serde(rename = "runId", default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub options: JsonValue,
    /// `[stream, payload]` pairs; only `stdout`/`stderr` text is kept
    #[serde(default)]
    pub console: Vec<(String, JsonValue)>,
}

impl From<RawExecuteResult> for ExecuteResponse {
    fn from(raw: RawExecuteResult) -> Self {
        let console = raw
            .console
            .into_iter()
            .filter_map(|(stream, payload)| {
                let stream = match stream.as_str() {
                    "stdout" => ConsoleStream::Stdout,
                    "stderr" => ConsoleStream::Stderr,
                    _ => return None,
                };
                let text = match payload {
                    JsonValue::String(s) => s,
                    other => other.to_string(),
                };
                Some(ConsoleEntry { stream, text })
            })
            .collect();

        Self {
            status: ExecutionStatus::from(raw.status.as_str()),
            run_id: raw.run_id,
            options: raw.options,
            console,
        }
    }
}

/// Raw logs result as returned by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct RawLogsResult {
    #[serde(default)]
    pub logs: String,
}
