//! In-memory collaborators for tests
//!
//! `MemoryStore` keeps blobs in a map and counts every read and write.
//! `ScriptedSessions` answers execute calls from a queue of scripted polls and
//! records every request it receives.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use stepline_client::{ClientError, ComputeSessions, ContentStore, Result};
use stepline_core::domain::component::{PipelineComponent, ResourceRequest};
use stepline_core::domain::pipeline::PipelineDefinition;
use stepline_core::dto::folder::FolderInfo;
use stepline_core::dto::session::{ExecuteRequest, ExecuteResponse, SessionHandle, SessionOptions};

type Key = (String, String);

fn key(container: &str, path: &str) -> Key {
    (container.to_string(), path.to_string())
}

pub fn definition() -> PipelineDefinition {
    PipelineDefinition {
        title: "Churn model".to_string(),
        description: "weekly retrain".to_string(),
        environment: "cr.backend.ai/stable/python".to_string(),
        version: "3.9-ubuntu20.04".to_string(),
        scaling_group: "gpu-pool".to_string(),
        storage_host: "local:volume1".to_string(),
    }
}

pub fn component(path: &str) -> PipelineComponent {
    PipelineComponent::new(
        format!("Step {}", path),
        "",
        path,
        ResourceRequest::new(2, 1.5, 0.0),
    )
}

// =============================================================================
// Content Store
// =============================================================================

#[derive(Default)]
struct StoreState {
    folders: Vec<FolderInfo>,
    blobs: HashMap<Key, Vec<u8>>,
    dirs: HashSet<Key>,
    uploads: HashMap<Key, usize>,
    downloads: HashMap<Key, usize>,
    failing_downloads: HashSet<String>,
    failing_uploads: HashSet<String>,
    failing_mkdir: bool,
    reject_existing_dirs: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn with_folder(name: &str) -> Self {
        let store = Self::default();
        store.add_folder(name, "local:volume1");
        store
    }

    pub fn add_folder(&self, name: &str, host: &str) {
        let mut state = self.state.lock().unwrap();
        let id = format!("id-{}", state.folders.len());
        state.folders.push(FolderInfo {
            name: name.to_string(),
            id,
            host: host.to_string(),
        });
    }

    pub fn put(&self, container: &str, path: &str, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.blobs.insert(key(container, path), bytes.to_vec());
    }

    pub fn blob(&self, container: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.blobs.get(&key(container, path)).cloned()
    }

    pub fn text(&self, container: &str, path: &str) -> Option<String> {
        self.blob(container, path)
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    pub fn has_dir(&self, container: &str, path: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.dirs.contains(&key(container, path))
    }

    pub fn folder_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.folders.iter().map(|f| f.name.clone()).collect()
    }

    pub fn upload_count(&self, container: &str, path: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.uploads.get(&key(container, path)).copied().unwrap_or(0)
    }

    pub fn download_count(&self, container: &str, path: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.downloads.get(&key(container, path)).copied().unwrap_or(0)
    }

    pub fn fail_downloads_of(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_downloads
            .insert(path.to_string());
    }

    pub fn fail_uploads_of(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_uploads
            .insert(path.to_string());
    }

    pub fn fail_mkdir(&self) {
        self.state.lock().unwrap().failing_mkdir = true;
    }

    /// Makes mkdir of an existing directory answer 409 Conflict
    pub fn reject_existing_dirs(&self) {
        self.state.lock().unwrap().reject_existing_dirs = true;
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list(&self) -> Result<Vec<FolderInfo>> {
        Ok(self.state.lock().unwrap().folders.clone())
    }

    async fn create(&self, container: &str, host: &str) -> Result<()> {
        if self.folder_names().iter().any(|name| name == container) {
            return Err(ClientError::rejected(409, "folder already exists"));
        }
        self.add_folder(container, host);
        Ok(())
    }

    async fn mkdir(&self, container: &str, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_mkdir {
            return Err(ClientError::rejected(500, "storage unavailable"));
        }
        let inserted = state.dirs.insert(key(container, path));
        if !inserted && state.reject_existing_dirs {
            return Err(ClientError::rejected(409, "directory already exists"));
        }
        Ok(())
    }

    async fn upload(&self, container: &str, path: &str, bytes: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state.uploads.entry(key(container, path)).or_default() += 1;
        if state.failing_uploads.contains(path) {
            return Err(ClientError::rejected(500, "storage unavailable"));
        }
        state.blobs.insert(key(container, path), bytes);
        Ok(())
    }

    async fn download(&self, container: &str, path: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        *state.downloads.entry(key(container, path)).or_default() += 1;
        if state.failing_downloads.contains(path) {
            return Err(ClientError::rejected(500, "storage unavailable"));
        }
        state
            .blobs
            .get(&key(container, path))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("{}/{}", container, path)))
    }
}

// =============================================================================
// Compute Sessions
// =============================================================================

/// One scripted answer to an execute call
pub enum Poll {
    Respond(ExecuteResponse),
    Fail(u16),
    /// Never answers
    Hang,
}

#[derive(Default)]
struct SessionState {
    polls: VecDeque<Poll>,
    created: Vec<(String, SessionOptions)>,
    requests: Vec<(String, ExecuteRequest)>,
    destroyed: Vec<String>,
    log_requests: usize,
    logs: Option<String>,
    fail_logs: bool,
    fail_create: bool,
    fail_destroy: bool,
    poll_delay: Option<Duration>,
}

/// Compute provider answering from a script
///
/// When the script runs out, every further poll reports `finished`.
#[derive(Default)]
pub struct ScriptedSessions {
    state: Mutex<SessionState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, polls: Vec<Poll>) {
        self.state.lock().unwrap().polls.extend(polls);
    }

    pub fn with_logs(self, logs: &str) -> Self {
        self.state.lock().unwrap().logs = Some(logs.to_string());
        self
    }

    pub fn with_poll_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().poll_delay = Some(delay);
        self
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn fail_logs(&self) {
        self.state.lock().unwrap().fail_logs = true;
    }

    pub fn fail_destroy(&self) {
        self.state.lock().unwrap().fail_destroy = true;
    }

    pub fn created(&self) -> Vec<(String, SessionOptions)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn requests(&self) -> Vec<(String, ExecuteRequest)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.state.lock().unwrap().destroyed.clone()
    }

    pub fn log_requests(&self) -> usize {
        self.state.lock().unwrap().log_requests
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputeSessions for ScriptedSessions {
    async fn create_session(
        &self,
        image: &str,
        options: &SessionOptions,
    ) -> Result<SessionHandle> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(ClientError::rejected(503, "no capacity in scaling group"));
        }
        state.created.push((image.to_string(), options.clone()));
        Ok(SessionHandle {
            session_id: format!("sess-{}", state.created.len()),
        })
    }

    async fn execute(&self, session_id: &str, request: ExecuteRequest) -> Result<ExecuteResponse> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let (poll, delay) = {
            let mut state = self.state.lock().unwrap();
            state.requests.push((session_id.to_string(), request));
            let n = state.requests.len();
            let poll = state
                .polls
                .pop_front()
                .unwrap_or_else(|| Poll::Respond(ExecuteResponse::finished(format!("r-{}", n))));
            (poll, state.poll_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = match poll {
            Poll::Respond(response) => Ok(response),
            Poll::Fail(status) => Err(ClientError::rejected(status, "kernel execution failed")),
            Poll::Hang => std::future::pending().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_logs(&self, session_id: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.log_requests += 1;
        if state.fail_logs {
            return Err(ClientError::rejected(502, "log service unavailable"));
        }
        Ok(state
            .logs
            .clone()
            .unwrap_or_else(|| format!("logs of {}\n", session_id)))
    }

    async fn destroy_session(&self, session_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.destroyed.push(session_id.to_string());
        if state.fail_destroy {
            return Err(ClientError::rejected(500, "failed to terminate kernel"));
        }
        Ok(())
    }
}
