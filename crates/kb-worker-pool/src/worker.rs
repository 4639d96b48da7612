//! One long-lived subprocess worker: a `kb-bootstrap --persistent` child
//! bound to its own IPC channel, executing one request at a time across
//! many `execute` frames, per spec §4.7.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use kb_config::WorkerPoolConfig;
use kb_core::error::{ErrorCode, PluginError};
use kb_core::ExecutionRequest;
use kb_exec::BackendOutcome;
use kb_ipc::{AdapterDispatch, Frame, IpcServer};
use kb_subprocess::{terminate, WorkerBootstrapConfig};

use crate::conn::WorkerConnection;

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const SOFT_ABORT_GRACE: Duration = Duration::from_secs(1);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
/// "Recycled workers are shut down gracefully (up to 5 s)."
pub const RECYCLE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A worker's admission state, per spec §5 ("the worker pool is the only
/// component that holds long-lived shared state... all mutations happen in
/// a single logical executor").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Connected, ready to accept a request.
    Idle,
    /// Currently running one request.
    Busy,
    /// Finishing its current request before graceful shutdown.
    Recycling,
}

/// One pool worker: its IPC connection and the subprocess backing it.
pub struct Worker {
    id: String,
    conn: WorkerConnection,
    child: Mutex<Child>,
    auth_token: String,
    spawned_at: Instant,
    requests_served: AtomicU64,
    state: Mutex<WorkerState>,
}

impl Worker {
    /// Spawn a fresh persistent bootstrap child and wait for its `ready`.
    pub async fn spawn(
        bootstrap_bin: &Path,
        socket_dir: &Path,
        dispatcher: Option<Arc<dyn AdapterDispatch>>,
    ) -> Result<Arc<Worker>, PluginError> {
        let id = uuid::Uuid::new_v4().to_string();
        let sock_path = socket_dir.join(format!("kb-worker-pool-{id}.sock"));
        let server = IpcServer::bind(&sock_path, dispatcher).map_err(ipc_bind_error)?;

        let auth_token = uuid::Uuid::new_v4().to_string();
        let config = WorkerBootstrapConfig {
            auth_token: Some(auth_token.clone()),
        };
        let request_file = write_config_file(&config)?;

        let mut child = spawn_child(bootstrap_bin, server.path(), request_file.path())?;
        forward_output(&mut child, &id);

        let mut channel = match timeout(READY_TIMEOUT, server.accept()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(error)) => return Err(wrap_io("failed to accept worker ipc connection", error)),
            Err(_elapsed) => {
                return Err(PluginError::new(
                    ErrorCode::TimeoutError,
                    "worker did not connect to its ipc socket in time",
                ))
            }
        };

        match timeout(READY_TIMEOUT, channel.recv()).await {
            Ok(Some(Frame::Ready)) => {}
            Ok(Some(other)) => {
                return Err(PluginError::new(
                    ErrorCode::WorkerCrashed,
                    format!("expected ready frame from worker, got {other:?}"),
                ))
            }
            Ok(None) => {
                return Err(PluginError::new(
                    ErrorCode::WorkerCrashed,
                    "worker closed its ipc connection before sending ready",
                ))
            }
            Err(_elapsed) => {
                return Err(PluginError::new(ErrorCode::TimeoutError, "worker did not send ready in time"))
            }
        }

        let _ = request_file.close();

        Ok(Arc::new(Worker {
            id,
            conn: WorkerConnection::new(channel),
            child: Mutex::new(child),
            auth_token,
            spawned_at: Instant::now(),
            requests_served: AtomicU64::new(0),
            state: Mutex::new(WorkerState::Idle),
        }))
    }

    /// This worker's id, used as the `DashMap` key and surfaced in
    /// `BackendOutcome::execution_meta`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The current admission state.
    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    /// Transition to a new admission state.
    pub async fn set_state(&self, state: WorkerState) {
        *self.state.lock().await = state;
    }

    /// Whether this worker has served enough requests, or lived long
    /// enough, that it should be retired before taking more work.
    #[must_use]
    pub fn should_recycle(&self, config: &WorkerPoolConfig) -> bool {
        let served = self.requests_served.load(Ordering::Relaxed);
        let uptime_ms = self.spawned_at.elapsed().as_millis() as u64;
        served >= config.max_requests_per_worker || uptime_ms >= config.max_uptime_ms_per_worker
    }

    /// Run one request to completion, soft-aborting then hard-killing on
    /// timeout or external cancellation, per spec §4.6 steps 6/7 (the same
    /// escalation the one-shot subprocess backend uses).
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        cancellation: CancellationToken,
        effective_timeout: Duration,
    ) -> Result<BackendOutcome, PluginError> {
        let request_id = request.execution_id.clone();
        let frame = Frame::Execute {
            request_id: request_id.clone(),
            request: serde_json::to_value(request).unwrap_or(serde_json::Value::Null),
            auth_token: Some(self.auth_token.clone()),
        };
        let worker_id = self.id.clone();

        // `call_unbounded` races against our own timeout/cancellation below
        // rather than imposing one of its own.
        let reply = self.conn.call_unbounded(frame);
        self.requests_served.fetch_add(1, Ordering::Relaxed);

        tokio::select! {
            result = reply => match result {
                Ok(Frame::Result { data, .. }) => Ok(BackendOutcome {
                    data,
                    execution_meta: json!({ "backend": "worker-pool", "workerId": worker_id }),
                }),
                Ok(Frame::Error { error, .. }) => Err(error),
                Ok(other) => Err(PluginError::new(
                    ErrorCode::WorkerCrashed,
                    format!("unexpected response frame for {request_id}: {other:?}"),
                )),
                Err(error) => Err(error),
            },
            _ = tokio::time::sleep(effective_timeout) => {
                self.abort(&request_id).await;
                Err(PluginError::new(ErrorCode::TimeoutError, "worker execution timed out")
                    .with_retry_after_ms(effective_timeout.as_millis() as u64))
            }
            () = cancellation.cancelled() => {
                self.abort(&request_id).await;
                Err(PluginError::new(ErrorCode::AbortError, "worker execution was cancelled"))
            }
        }
    }

    async fn abort(&self, request_id: &str) {
        let _ = self.conn.send(Frame::Abort {
            request_id: request_id.to_string(),
        });
        tokio::time::sleep(SOFT_ABORT_GRACE).await;
        let mut child = self.child.lock().await;
        if let Ok(Some(_status)) = child.try_wait() {
            return;
        }
        terminate(&mut child).await;
    }

    /// Probe liveness; `healthOk` must arrive within [`HEALTH_TIMEOUT`].
    pub async fn health_check(&self) -> bool {
        let request_id = kb_core::new_id(kb_core::IdKind::Request);
        matches!(
            self.conn.call(Frame::Health { request_id }, HEALTH_TIMEOUT).await,
            Ok(Frame::HealthOk { .. })
        )
    }

    /// Ask the worker to shut down, waiting up to `bound` before escalating
    /// to a hard kill.
    pub async fn shutdown(&self, graceful: bool, bound: Duration) {
        let _ = self.conn.send(Frame::Shutdown { graceful });
        let mut child = self.child.lock().await;
        match timeout(bound, child.wait()).await {
            Ok(Ok(_status)) => {}
            Ok(Err(error)) => warn!(%error, worker = %self.id, "error waiting for worker exit"),
            Err(_elapsed) => terminate(&mut child).await,
        }
    }

    /// Poll whether the worker's process has exited on its own (a crash,
    /// not a pool-initiated shutdown).
    pub async fn has_crashed(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(Some(_status)))
    }
}

fn write_config_file(config: &WorkerBootstrapConfig) -> Result<tempfile::NamedTempFile, PluginError> {
    use std::io::Write as _;
    let mut file = tempfile::Builder::new()
        .prefix("kb-worker-bootstrap-")
        .suffix(".json")
        .tempfile()
        .map_err(|error| wrap_io("failed to create worker bootstrap config file", error))?;
    let json = serde_json::to_vec(config)
        .map_err(|error| PluginError::wrap(format!("failed to serialize worker bootstrap config: {error}")))?;
    file.write_all(&json)
        .map_err(|error| wrap_io("failed to write worker bootstrap config file", error))?;
    Ok(file)
}

fn spawn_child(bootstrap_bin: &Path, socket_path: &Path, request_file: &Path) -> Result<Child, PluginError> {
    Command::new(bootstrap_bin)
        .arg("--socket")
        .arg(socket_path)
        .arg("--request-file")
        .arg(request_file)
        .arg("--persistent")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|error| wrap_io("failed to spawn worker bootstrap", error))
}

fn forward_output(child: &mut Child, worker_id: &str) {
    let worker_id = worker_id.to_string();
    if let Some(stdout) = child.stdout.take() {
        let worker_id = worker_id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target: "kb_worker_pool::child_stdout", worker = %worker_id, "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "kb_worker_pool::child_stderr", worker = %worker_id, "{line}");
            }
        });
    }
}

fn ipc_bind_error(error: io::Error) -> PluginError {
    PluginError::new(ErrorCode::PlatformError, format!("failed to bind worker ipc socket: {error}"))
        .with_details(json!({ "transport": "ipc" }))
}

fn wrap_io(context: &str, error: io::Error) -> PluginError {
    PluginError::new(ErrorCode::InternalError, format!("{context}: {error}"))
}
