//! Message-passing client for an external optimization backend.
//!
//! The backend runs on its own thread and is reached only through
//! channels. Each request carries a correlation id; the client keeps a
//! table of pending continuations keyed by that id and resolves each one
//! with exactly one final event. A client-side timeout removes the entry,
//! so a late answer for a superseded id is dropped instead of applied.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Column values returned by a backend, as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub col_name: Vec<String>,
    pub col_value: Vec<f64>,
}

/// Outcome status of one solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Ok,
    Error,
    NoSolver,
}

/// Options forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOptions {
    pub time_limit_sec: u64,
}

/// A request as seen by the backend thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub correlation_id: Uuid,
    pub model: String,
    pub options: SolveOptions,
}

/// Non-final events emitted while a backend is working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SolverEvent {
    #[serde(rename_all = "camelCase")]
    Status {
        correlation_id: Option<Uuid>,
        stage: String,
        detail: String,
    },
    #[serde(rename_all = "camelCase")]
    Heartbeat { solver_ready: bool },
}

/// Result of a solve call, with or without a solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub status: SolveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SolveResult {
    pub fn ok(solution: Solution) -> Self {
        Self {
            status: SolveStatus::Ok,
            solution: Some(solution),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SolveStatus::Error,
            solution: None,
            message: Some(message.into()),
        }
    }

    pub fn no_solver(message: impl Into<String>) -> Self {
        Self {
            status: SolveStatus::NoSolver,
            solution: None,
            message: Some(message.into()),
        }
    }

    /// True only for `Ok` with a solution attached.
    pub fn is_success(&self) -> bool {
        self.status == SolveStatus::Ok && self.solution.is_some()
    }
}

/// The single final event for a correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalEvent {
    pub correlation_id: Uuid,
    #[serde(flatten)]
    pub result: SolveResult,
}

/// Everything the backend thread sends back.
#[derive(Debug, Clone)]
pub enum BackendMessage {
    Progress(SolverEvent),
    Final(FinalEvent),
}

/// An optimization engine that accepts LP text.
///
/// `solve` runs on the backend thread and may block.
pub trait SolverBackend: Send + 'static {
    fn name(&self) -> &str;

    fn is_ready(&self) -> bool {
        true
    }

    /// Solves `model`, reporting `(stage, detail)` progress through `status`.
    fn solve(
        &mut self,
        model: &str,
        options: &SolveOptions,
        status: &mut dyn FnMut(&str, &str),
    ) -> SolveResult;
}

/// Backend used when no optimizer is linked in. Always answers `no_solver`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSolverBackend;

impl SolverBackend for NoSolverBackend {
    fn name(&self) -> &str {
        "none"
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn solve(
        &mut self,
        _model: &str,
        _options: &SolveOptions,
        _status: &mut dyn FnMut(&str, &str),
    ) -> SolveResult {
        SolveResult::no_solver("no optimization backend is available")
    }
}

struct Pending {
    reply: oneshot::Sender<SolveResult>,
    progress: Option<mpsc::UnboundedSender<SolverEvent>>,
}

type PendingTable = Arc<Mutex<HashMap<Uuid, Pending>>>;

/// Handle to a running backend. Cheap to clone.
#[derive(Clone)]
pub struct SolverClient {
    requests: mpsc::UnboundedSender<SolveRequest>,
    pending: PendingTable,
    backend_name: Arc<str>,
}

impl SolverClient {
    /// Starts `backend` on a dedicated thread and a dispatcher task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<B: SolverBackend>(backend: B) -> Self {
        let backend_name: Arc<str> = Arc::from(backend.name());
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));

        // If the thread cannot start, the request receiver is dropped and every
        // call resolves as `no_solver`.
        if let Err(e) = std::thread::Builder::new()
            .name(format!("solver-{}", backend_name))
            .spawn(move || run_backend(backend, request_rx, message_tx))
        {
            warn!(error = %e, "failed to start solver thread");
        }

        tokio::spawn(dispatch(message_rx, pending.clone()));

        Self {
            requests: request_tx,
            pending,
            backend_name,
        }
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Submits a model and waits for its final event, at most `timeout` when
    /// one is given.
    ///
    /// Never fails: a dead worker reads as `no_solver`, a timeout as `error`.
    /// Progress events for this request are forwarded to `progress`.
    pub async fn solve(
        &self,
        model: String,
        options: SolveOptions,
        timeout: Option<Duration>,
        progress: Option<mpsc::UnboundedSender<SolverEvent>>,
    ) -> SolveResult {
        let correlation_id = Uuid::new_v4();
        let (reply, rx) = oneshot::channel();
        self.pending
            .lock()
            .insert(correlation_id, Pending { reply, progress });

        let request = SolveRequest {
            correlation_id,
            model,
            options,
        };
        if self.requests.send(request).is_err() {
            self.pending.lock().remove(&correlation_id);
            return SolveResult::no_solver("solver worker is not running");
        }

        let Some(timeout) = timeout else {
            return rx
                .await
                .unwrap_or_else(|_| SolveResult::error("solver worker dropped the request"));
        };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => SolveResult::error("solver worker dropped the request"),
            Err(_) => {
                self.pending.lock().remove(&correlation_id);
                warn!(
                    %correlation_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "solver call timed out"
                );
                SolveResult::error(format!(
                    "Solver timed out after {}s",
                    timeout.as_secs_f64().round() as u64
                ))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

fn run_backend<B: SolverBackend>(
    mut backend: B,
    mut requests: mpsc::UnboundedReceiver<SolveRequest>,
    messages: mpsc::UnboundedSender<BackendMessage>,
) {
    while let Some(request) = requests.blocking_recv() {
        let correlation_id = request.correlation_id;
        let _ = messages.send(BackendMessage::Progress(SolverEvent::Heartbeat {
            solver_ready: backend.is_ready(),
        }));
        let _ = messages.send(BackendMessage::Progress(SolverEvent::Status {
            correlation_id: Some(correlation_id),
            stage: "request:recv".to_string(),
            detail: format!("Received request {}", correlation_id),
        }));

        let mut status = |stage: &str, detail: &str| {
            let _ = messages.send(BackendMessage::Progress(SolverEvent::Status {
                correlation_id: Some(correlation_id),
                stage: stage.to_string(),
                detail: detail.to_string(),
            }));
        };
        let result = backend.solve(&request.model, &request.options, &mut status);

        if messages
            .send(BackendMessage::Final(FinalEvent {
                correlation_id,
                result,
            }))
            .is_err()
        {
            break;
        }
    }
    debug!(backend = backend.name(), "solver thread stopped");
}

async fn dispatch(mut messages: mpsc::UnboundedReceiver<BackendMessage>, pending: PendingTable) {
    while let Some(message) = messages.recv().await {
        match message {
            BackendMessage::Final(event) => {
                let entry = pending.lock().remove(&event.correlation_id);
                match entry {
                    Some(entry) => {
                        info!(
                            correlation_id = %event.correlation_id,
                            status = ?event.result.status,
                            "solver call finished"
                        );
                        let _ = entry.reply.send(event.result);
                    }
                    None => debug!(
                        correlation_id = %event.correlation_id,
                        "discarding late solver response"
                    ),
                }
            }
            BackendMessage::Progress(event) => {
                let table = pending.lock();
                match &event {
                    SolverEvent::Status {
                        correlation_id: Some(id),
                        ..
                    } => {
                        if let Some(sink) = table.get(id).and_then(|p| p.progress.as_ref()) {
                            let _ = sink.send(event.clone());
                        }
                    }
                    _ => {
                        for sink in table.values().filter_map(|p| p.progress.as_ref()) {
                            let _ = sink.send(event.clone());
                        }
                    }
                }
            }
        }
    }
}
