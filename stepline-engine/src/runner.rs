//! Component runner
//!
//! Drives one component through a compute session:
//!
//! ```text
//! Preparing -> Launching -> Executing -> Finalizing -> Completed
//!     \___________\_____________\____________\______-> Failed
//! ```
//!
//! A component is marked executed only after the provider reported
//! `finished`, its logs were stored and the session was torn down. Whatever
//! state a run fails in, a session that was created is destroyed before the
//! error is returned.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use stepline_client::{ComputeSessions, ContentStore};
use stepline_core::domain::component::PipelineComponent;
use stepline_core::domain::pipeline::PipelineDefinition;
use stepline_core::domain::session::ConsoleStream;
use stepline_core::dto::session::SessionOptions;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::execution::{ExecutionSession, RunReport, RunState};
use crate::repository::{ComponentFiles, PipelineStore};

/// Everything a single component run needs, loaded by the caller
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub pipeline_id: String,
    pub definition: PipelineDefinition,
    /// The whole ordered sequence, persisted again once the run completes
    pub components: Vec<PipelineComponent>,
    pub index: usize,
}

/// Mutable state of one run
struct Run {
    request: RunRequest,
    code: String,
    /// Live session, owned until it is torn down
    session: Option<ExecutionSession>,
    /// Session after teardown, kept for the report
    closed: Option<ExecutionSession>,
}

impl Run {
    fn component(&self) -> Result<&PipelineComponent> {
        self.request
            .components
            .get(self.request.index)
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "component {} of pipeline {}",
                    self.request.index, self.request.pipeline_id
                ))
            })
    }
}

/// Runs components against a compute provider
#[derive(Clone)]
pub struct ComponentRunner {
    sessions: Arc<dyn ComputeSessions>,
    files: ComponentFiles,
    pipelines: PipelineStore,
    config: EngineConfig,
}

impl ComponentRunner {
    pub fn new(
        store: Arc<dyn ContentStore>,
        sessions: Arc<dyn ComputeSessions>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sessions,
            files: ComponentFiles::new(store.clone(), config.code_entry.clone()),
            pipelines: PipelineStore::new(store),
            config,
        }
    }

    /// Runs one component to completion
    ///
    /// The caller is responsible for the dependency check. Failures are
    /// wrapped in [`EngineError::ComponentFailed`].
    pub async fn run(&self, request: RunRequest, cancel: &CancellationToken) -> Result<RunReport> {
        let pipeline_id = request.pipeline_id.clone();
        let index = request.index;
        let started_at = Utc::now();

        let mut run = Run {
            request,
            code: String::new(),
            session: None,
            closed: None,
        };

        info!("Running component {} of pipeline {}", index, pipeline_id);

        let mut state = RunState::Preparing;
        while !state.is_terminal() {
            match self.step(state, &mut run, cancel).await {
                Ok(next) => {
                    debug!(
                        "Component {} of {}: {} -> {}",
                        index, pipeline_id, state, next
                    );
                    state = next;
                }
                Err(e) => {
                    error!(
                        "Component {} of {} failed while {}: {}",
                        index, pipeline_id, state, e
                    );
                    if let Some(session) = run.session.take() {
                        self.teardown(&session.session_id).await;
                    }
                    debug!("Component {} of {}: {} -> {}", index, pipeline_id, state, RunState::Failed);
                    return Err(EngineError::component_failed(pipeline_id, index, e));
                }
            }
        }

        let session = run.closed.unwrap_or_else(|| ExecutionSession::new(String::new()));
        let path = run
            .request
            .components
            .get(index)
            .map(|c| c.path.clone())
            .unwrap_or_default();

        let report = RunReport {
            pipeline_id,
            index,
            path,
            session_id: session.session_id,
            polls: session.polls,
            console: session.console,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            "Component {} ({}) of {} completed after {} poll(s) in {}ms",
            report.index,
            report.path,
            report.pipeline_id,
            report.polls,
            report.duration().num_milliseconds()
        );

        Ok(report)
    }

    /// Performs the work of one state, returning the next state
    async fn step(&self, state: RunState, run: &mut Run, cancel: &CancellationToken) -> Result<RunState> {
        match state {
            RunState::Preparing => {
                let pipeline_id = run.request.pipeline_id.clone();
                run.request.definition.validate()?;
                let component = run.component()?;
                component.validate()?;

                let code = cancellable(cancel, self.files.ensure_code(&pipeline_id, component)).await?;
                run.code = code;
                Ok(RunState::Launching)
            }

            RunState::Launching => {
                let component = run.component()?;
                let definition = &run.request.definition;
                let image = definition.image();
                let options = SessionOptions {
                    domain: self.config.domain.clone(),
                    group: self.config.group.clone(),
                    scaling_group: definition.scaling_group.clone(),
                    mounts: vec![run.request.pipeline_id.clone()],
                    resources: component.resources,
                    max_wait_seconds: self.config.max_wait_seconds,
                };

                let create = async {
                    self.sessions
                        .create_session(&image, &options)
                        .await
                        .map_err(|e| EngineError::provider("creating session", e))
                };
                let handle = cancellable(cancel, create).await?;

                info!(
                    "Started session {} ({}) for {}",
                    handle.session_id, image, component.path
                );
                run.session = Some(ExecutionSession::new(handle.session_id));
                Ok(RunState::Executing)
            }

            RunState::Executing => {
                self.execute(run, cancel).await?;
                Ok(RunState::Finalizing)
            }

            RunState::Finalizing => {
                let session = run.session.take().ok_or_else(|| {
                    EngineError::NotFound("session of the finished run".to_string())
                })?;
                let pipeline_id = run.request.pipeline_id.clone();
                let index = run.request.index;

                let captured = self
                    .capture_logs(&pipeline_id, run.component()?, &session.session_id)
                    .await;
                self.teardown(&session.session_id).await;
                run.closed = Some(session);
                captured?;

                let mut components = run.request.components.clone();
                if let Some(component) = components.get_mut(index) {
                    component.executed = true;
                }
                self.pipelines.save_components(&pipeline_id, &components).await?;
                run.request.components = components;

                Ok(RunState::Completed)
            }

            RunState::Completed | RunState::Failed => Ok(state),
        }
    }

    /// Polls the session until the provider reports `finished`
    async fn execute(&self, run: &mut Run, cancel: &CancellationToken) -> Result<()> {
        let limits = self.config.limits();
        let deadline = limits.deadline.map(|limit| (Instant::now() + limit, limit));
        let path = run.component()?.path.clone();

        let session = run
            .session
            .as_mut()
            .ok_or_else(|| EngineError::NotFound("session of the run".to_string()))?;

        loop {
            if let Some(max) = limits.max_polls
                && session.polls >= max
            {
                return Err(EngineError::PollBudgetExhausted(max));
            }
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let request = session.next_request(&run.code);
            debug!(
                "Polling session {} ({}, poll {})",
                session.session_id,
                request.mode.as_str(),
                session.polls + 1
            );

            let call = async {
                self.sessions
                    .execute(&session.session_id, request)
                    .await
                    .map_err(|e| EngineError::provider("executing code", e))
            };
            let response = match deadline {
                Some((at, limit)) => tokio::time::timeout_at(at, cancellable(cancel, call))
                    .await
                    .map_err(|_| EngineError::DeadlineExceeded(limit))??,
                None => cancellable(cancel, call).await?,
            };

            for entry in &response.console {
                match entry.stream {
                    ConsoleStream::Stdout => info!("[{}] {}", path, entry.text.trim_end()),
                    ConsoleStream::Stderr => warn!("[{}] {}", path, entry.text.trim_end()),
                }
            }

            if session.absorb(response) {
                debug!("Session {} finished after {} poll(s)", session.session_id, session.polls);
                return Ok(());
            }
        }
    }

    async fn capture_logs(
        &self,
        pipeline_id: &str,
        component: &PipelineComponent,
        session_id: &str,
    ) -> Result<()> {
        let logs = self
            .sessions
            .get_logs(session_id)
            .await
            .map_err(|e| EngineError::provider("fetching logs", e))?;
        self.files.save_logs(pipeline_id, component, logs).await
    }

    /// Destroys a session, logging failures
    async fn teardown(&self, session_id: &str) {
        match self.sessions.destroy_session(session_id).await {
            Ok(()) => debug!("Destroyed session {}", session_id),
            Err(e) => warn!("Failed to destroy session {}: {}", session_id, e),
        }
    }
}

/// Races a remote call against cancellation
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::RunLimits;
    use crate::repository::COMPONENTS_KEY;
    use crate::testing::{MemoryStore, Poll, ScriptedSessions, component, definition};
    use serde_json::json;
    use std::time::Duration;
    use stepline_core::domain::component::ResourceRequest;
    use stepline_core::domain::session::{ConsoleEntry, ExecutionMode};
    use stepline_core::dto::session::ExecuteResponse;

    const PIPELINE: &str = "pipeline-churn-model-1a2b3c4d";

    struct Fixture {
        memory: Arc<MemoryStore>,
        sessions: Arc<ScriptedSessions>,
        runner: ComponentRunner,
    }

    fn fixture(config: EngineConfig, sessions: ScriptedSessions) -> Fixture {
        let memory = Arc::new(MemoryStore::with_folder(PIPELINE));
        let sessions = Arc::new(sessions);
        let runner = ComponentRunner::new(memory.clone(), sessions.clone(), config);
        Fixture {
            memory,
            sessions,
            runner,
        }
    }

    fn request(components: Vec<PipelineComponent>, index: usize) -> RunRequest {
        RunRequest {
            pipeline_id: PIPELINE.to_string(),
            definition: definition(),
            components,
            index,
        }
    }

    fn stored_components(memory: &MemoryStore) -> Vec<PipelineComponent> {
        serde_json::from_slice(&memory.blob(PIPELINE, COMPONENTS_KEY).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_run_threads_continuation_and_marks_executed() {
        let f = fixture(
            EngineConfig::default().with_placement("lab", "vision"),
            ScriptedSessions::new().with_logs("epoch 1\nepoch 2\n"),
        );
        f.memory.put(PIPELINE, "001-load/main.py", b"print('load')");
        f.sessions.script(vec![
            Poll::Respond(
                ExecuteResponse::running("r1")
                    .with_options(json!({"cursor": 1}))
                    .with_console(ConsoleEntry::stdout("epoch 1\n")),
            ),
            Poll::Respond(
                ExecuteResponse::running("r2").with_console(ConsoleEntry::stderr("slow\n")),
            ),
            Poll::Respond(ExecuteResponse::finished("r3")),
        ]);

        let report = f
            .runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.polls, 3);
        assert_eq!(report.path, "001-load");
        assert_eq!(report.console.len(), 2);

        let requests = f.sessions.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].1.mode, ExecutionMode::Initial);
        assert_eq!(requests[0].1.code, "print('load')");
        assert_eq!(requests[1].1.mode, ExecutionMode::Continue);
        assert_eq!(requests[1].1.code, "");
        assert_eq!(requests[1].1.run_id.as_deref(), Some("r1"));
        assert_eq!(requests[1].1.options, json!({"cursor": 1}));
        assert_eq!(requests[2].1.run_id.as_deref(), Some("r2"));

        let created = f.sessions.created();
        assert_eq!(created.len(), 1);
        let (image, options) = &created[0];
        assert_eq!(image, "cr.backend.ai/stable/python:3.9-ubuntu20.04");
        assert_eq!(options.domain, "lab");
        assert_eq!(options.group, "vision");
        assert_eq!(options.scaling_group, "gpu-pool");
        assert_eq!(options.mounts, vec![PIPELINE.to_string()]);
        assert_eq!(options.resources, ResourceRequest::new(2, 1.5, 0.0));
        assert_eq!(options.max_wait_seconds, 5);

        assert_eq!(
            f.memory.text(PIPELINE, "001-load/logs.txt").as_deref(),
            Some("epoch 1\nepoch 2\n")
        );
        assert_eq!(f.sessions.destroyed(), vec![report.session_id.clone()]);
        assert!(stored_components(&f.memory)[0].executed);
    }

    #[tokio::test]
    async fn test_finished_first_poll_issues_single_execute() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        f.memory.put(PIPELINE, "001-load/main.py", b"print('once')");
        f.sessions
            .script(vec![Poll::Respond(ExecuteResponse::finished("r1"))]);

        let report = f
            .runner
            .run(
                request(vec![component("001-load"), component("002-train")], 0),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.polls, 1);
        let requests = f.sessions.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1.mode, ExecutionMode::Initial);
        assert_eq!(requests[0].1.code, "print('once')");
        assert!(
            requests
                .iter()
                .all(|(_, r)| r.mode != ExecutionMode::Continue)
        );

        let flags: Vec<bool> = stored_components(&f.memory)
            .iter()
            .map(|c| c.executed)
            .collect();
        assert_eq!(flags, vec![true, false]);
        assert_eq!(f.sessions.destroyed(), vec![report.session_id.clone()]);
    }

    #[tokio::test]
    async fn test_missing_code_is_seeded_and_run_empty() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());

        f.runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(f.memory.blob(PIPELINE, "001-load/main.py"), Some(Vec::new()));
        assert_eq!(f.sessions.requests()[0].1.code, "");
    }

    #[tokio::test]
    async fn test_execute_failure_destroys_session_and_keeps_flag() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        f.sessions.script(vec![
            Poll::Respond(ExecuteResponse::running("r1")),
            Poll::Fail(500),
        ]);

        let err = f
            .runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::ComponentFailed { index: 0, .. }));
        assert!(matches!(err.root(), EngineError::Provider { .. }));
        assert_eq!(f.sessions.destroyed(), vec!["sess-1".to_string()]);
        assert_eq!(f.sessions.log_requests(), 0);
        assert!(f.memory.blob(PIPELINE, "001-load/logs.txt").is_none());
        assert!(f.memory.blob(PIPELINE, COMPONENTS_KEY).is_none());
    }

    #[tokio::test]
    async fn test_log_failure_still_destroys_and_keeps_flag() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        f.sessions.fail_logs();

        let err = f
            .runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::Provider { .. }));
        assert_eq!(f.sessions.destroyed().len(), 1);
        assert!(f.memory.blob(PIPELINE, COMPONENTS_KEY).is_none());
    }

    #[tokio::test]
    async fn test_log_upload_failure_keeps_flag() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        f.memory.fail_uploads_of("001-load/logs.txt");

        let err = f
            .runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::Storage { .. }));
        assert_eq!(f.sessions.destroyed().len(), 1);
        assert!(f.memory.blob(PIPELINE, COMPONENTS_KEY).is_none());
    }

    #[tokio::test]
    async fn test_destroy_failure_after_success_is_not_fatal() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        f.sessions.fail_destroy();

        f.runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap();

        assert!(stored_components(&f.memory)[0].executed);
    }

    #[tokio::test]
    async fn test_session_creation_failure_creates_nothing_to_destroy() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        f.sessions.fail_create();

        let err = f
            .runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::Provider { .. }));
        assert!(f.sessions.requests().is_empty());
        assert!(f.sessions.destroyed().is_empty());
    }

    #[tokio::test]
    async fn test_code_read_failure_stops_before_launch() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        f.memory.fail_downloads_of("001-load/main.py");

        let err = f
            .runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::Storage { .. }));
        assert!(f.sessions.created().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_resources_rejected_before_remote_calls() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        let mut c = component("001-load");
        c.resources.cpu = 0;

        let err = f
            .runner
            .run(request(vec![c], 0), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::Validation(_)));
        assert!(!f.memory.has_dir(PIPELINE, "001-load"));
        assert!(f.sessions.created().is_empty());
    }

    #[tokio::test]
    async fn test_index_out_of_range() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());

        let err = f
            .runner
            .run(request(vec![component("001-load")], 3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::NotFound(_)));
        assert!(f.sessions.created().is_empty());
    }

    #[tokio::test]
    async fn test_poll_budget_destroys_session() {
        let f = fixture(
            EngineConfig::default().with_limits(RunLimits::default().with_max_polls(2)),
            ScriptedSessions::new(),
        );
        f.sessions.script(vec![
            Poll::Respond(ExecuteResponse::running("r1")),
            Poll::Respond(ExecuteResponse::running("r2")),
            Poll::Respond(ExecuteResponse::running("r3")),
        ]);

        let err = f
            .runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::PollBudgetExhausted(2)));
        assert_eq!(f.sessions.requests().len(), 2);
        assert_eq!(f.sessions.destroyed().len(), 1);
        assert!(f.memory.blob(PIPELINE, COMPONENTS_KEY).is_none());
    }

    #[tokio::test]
    async fn test_deadline_destroys_session() {
        let f = fixture(
            EngineConfig::default()
                .with_limits(RunLimits::default().with_deadline(Duration::from_millis(50))),
            ScriptedSessions::new(),
        );
        f.sessions.script(vec![Poll::Hang]);

        let err = f
            .runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::DeadlineExceeded(_)));
        assert_eq!(f.sessions.destroyed().len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_poll_and_destroys_session() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        f.sessions.script(vec![Poll::Respond(ExecuteResponse::running("r1")), Poll::Hang]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let err = f
            .runner
            .run(request(vec![component("001-load")], 0), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::Cancelled));
        assert_eq!(f.sessions.requests().len(), 2);
        assert_eq!(f.sessions.destroyed(), vec!["sess-1".to_string()]);
        assert!(f.memory.blob(PIPELINE, COMPONENTS_KEY).is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_remote_calls() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = f
            .runner
            .run(request(vec![component("001-load")], 0), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err.root(), EngineError::Cancelled));
        assert!(f.sessions.created().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_status_keeps_polling() {
        let f = fixture(EngineConfig::default(), ScriptedSessions::new());
        let mut waiting = ExecuteResponse::running("r1");
        waiting.status = "waiting-input".into();
        f.sessions.script(vec![Poll::Respond(waiting)]);

        let report = f
            .runner
            .run(request(vec![component("001-load")], 0), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.polls, 2);
    }
}
