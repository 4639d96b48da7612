//! C6: one-shot subprocess execution, implementing [`kb_exec::ExecutionBackend`].
//!
//! Grounded on the teacher's `astrid-mcp::client` connect/reconnect shape
//! (reused directly via `kb-ipc`) and its `restart_if_allowed`
//! check-then-act discipline for the kill escalation; the bootstrap-child
//! spawn itself follows `tokio::process::Command` idioms as used in
//! `astrid-capsule`'s `SandboxCommand::wrap` call sites.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kb_core::error::{ErrorCode, PluginError};
use kb_core::ExecutionRequest;
use kb_exec::{BackendOutcome, ExecutionBackend};
use kb_ipc::{AdapterDispatch, Channel, Frame, IpcServer};

use crate::bootstrap_request::BootstrapRequest;
use crate::kill::terminate;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const READY_TIMEOUT: Duration = Duration::from_secs(10);
const SOFT_ABORT_GRACE: Duration = Duration::from_secs(1);

/// Runs exactly one execution per spawned child, then tears the child and
/// its socket down — no pooling, no reuse (that is `kb-worker-pool`'s job).
pub struct SubprocessBackend {
    bootstrap_bin: PathBuf,
    socket_dir: PathBuf,
    default_timeout: Duration,
    dispatcher: Option<std::sync::Arc<dyn AdapterDispatch>>,
}

impl SubprocessBackend {
    /// Build a backend that spawns `bootstrap_bin` for every execution,
    /// binding per-execution sockets under the OS temp directory.
    #[must_use]
    pub fn new(bootstrap_bin: PathBuf) -> Self {
        Self {
            bootstrap_bin,
            socket_dir: std::env::temp_dir(),
            default_timeout: DEFAULT_TIMEOUT,
            dispatcher: None,
        }
    }

    /// Override where per-execution sockets and request files are created.
    #[must_use]
    pub fn with_socket_dir(mut self, socket_dir: PathBuf) -> Self {
        self.socket_dir = socket_dir;
        self
    }

    /// Override the default timeout used when a request carries none.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Wire a platform-adapter dispatcher so a bootstrap child's
    /// `Frame::AdapterCall` requests (fs/fetch/env calls routed back through
    /// C4) get real answers instead of the channel's built-in
    /// "no adapter dispatcher configured" fallback.
    #[must_use]
    pub fn with_adapter_dispatch(mut self, dispatcher: std::sync::Arc<dyn AdapterDispatch>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    fn socket_path(&self, execution_id: &str) -> PathBuf {
        self.socket_dir.join(format!("kb-subprocess-{execution_id}.sock"))
    }
}

#[async_trait]
impl ExecutionBackend for SubprocessBackend {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    async fn execute(
        &self,
        request: ExecutionRequest,
        cancellation: CancellationToken,
    ) -> Result<BackendOutcome, PluginError> {
        // Step 1: the handler file must exist under the plugin root.
        let handler_path = Path::new(&request.plugin_root).join(&request.handler_ref.file);
        if !handler_path.exists() {
            return Err(PluginError::new(
                ErrorCode::HandlerNotFound,
                format!("handler file not found under plugin root: {}", handler_path.display()),
            )
            .with_details(json!({
                "pluginId": request.descriptor.plugin_id,
                "file": request.handler_ref.file,
            })));
        }

        // Step 2: a fresh IPC server for this one execution. The dispatcher
        // lets the child's outbound AdapterCall frames get answered by the
        // real platform adapters rather than falling through to the
        // channel's "no dispatcher configured" default.
        let sock_path = self.socket_path(&request.execution_id);
        let server = IpcServer::bind(&sock_path, self.dispatcher.clone()).map_err(ipc_bind_error)?;

        // Step 3: write the bootstrap request file; no user input on argv.
        let auth_token = uuid::Uuid::new_v4().to_string();
        let bootstrap_request = BootstrapRequest {
            descriptor: request.descriptor.clone(),
            plugin_id: request.descriptor.plugin_id.clone(),
            plugin_root: PathBuf::from(&request.plugin_root),
            handler_ref: request.handler_ref.clone(),
            export_name: request.export_name.clone(),
            input: request.input.clone(),
            cwd: PathBuf::from(&request.workspace),
            outdir: PathBuf::from(&request.workspace).join(".kb").join("output"),
            auth_token: Some(auth_token.clone()),
        };
        let request_file = write_request_file(&bootstrap_request)?;

        // The façade enforces its own outer timeout too; this one exists so
        // the subprocess still gets a soft-abort chance even when the
        // façade's race drops this future before our own grace period runs.
        let effective_timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        let mut child = spawn_child(&self.bootstrap_bin, server.path(), request_file.path())?;
        let pid = child.id();
        forward_output(&mut child);

        let result = self
            .run_execution(&server, &mut child, &request, &auth_token, &cancellation, effective_timeout)
            .await;

        // Step 8: guaranteed-release scope. The IPC server's `Drop` removes
        // the socket file; here we make sure the child is reaped or killed
        // regardless of how `run_execution` exited.
        reap_or_kill(&mut child, pid).await;
        let _ = request_file.close();

        result
    }
}

fn write_request_file(request: &BootstrapRequest) -> Result<tempfile::NamedTempFile, PluginError> {
    use std::io::Write as _;
    let mut file = tempfile::Builder::new()
        .prefix("kb-bootstrap-request-")
        .suffix(".json")
        .tempfile()
        .map_err(|error| wrap_io("failed to create bootstrap request file", error))?;
    let json = serde_json::to_vec(request)
        .map_err(|error| PluginError::wrap(format!("failed to serialize bootstrap request: {error}")))?;
    file.write_all(&json)
        .map_err(|error| wrap_io("failed to write bootstrap request file", error))?;
    Ok(file)
}

fn spawn_child(bootstrap_bin: &Path, socket_path: &Path, request_file: &Path) -> Result<Child, PluginError> {
    Command::new(bootstrap_bin)
        .arg("--socket")
        .arg(socket_path)
        .arg("--request-file")
        .arg(request_file)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|error| wrap_io("failed to spawn subprocess bootstrap", error))
}

fn forward_output(child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target: "kb_subprocess::child_stdout", "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "kb_subprocess::child_stderr", "{line}");
            }
        });
    }
}

impl SubprocessBackend {
    #[allow(clippy::too_many_arguments)]
    async fn run_execution(
        &self,
        server: &IpcServer,
        child: &mut Child,
        request: &ExecutionRequest,
        auth_token: &str,
        cancellation: &CancellationToken,
        effective_timeout: Duration,
    ) -> Result<BackendOutcome, PluginError> {
        let mut channel = match timeout(READY_TIMEOUT, server.accept()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(error)) => return Err(wrap_io("failed to accept subprocess ipc connection", error)),
            Err(_elapsed) => {
                return Err(PluginError::new(
                    ErrorCode::TimeoutError,
                    "subprocess did not connect to its ipc socket in time",
                ))
            }
        };

        match timeout(READY_TIMEOUT, channel.recv()).await {
            Ok(Some(Frame::Ready)) => {}
            Ok(Some(other)) => {
                return Err(PluginError::new(
                    ErrorCode::WorkerCrashed,
                    format!("expected ready frame, got {other:?}"),
                ))
            }
            Ok(None) => {
                return Err(PluginError::new(
                    ErrorCode::WorkerCrashed,
                    "subprocess closed its ipc connection before sending ready",
                ))
            }
            Err(_elapsed) => {
                return Err(PluginError::new(ErrorCode::TimeoutError, "subprocess did not send ready in time"))
            }
        }

        let request_id = request.execution_id.clone();
        channel
            .send(Frame::Execute {
                request_id: request_id.clone(),
                request: serde_json::to_value(request).unwrap_or(serde_json::Value::Null),
                auth_token: Some(auth_token.to_string()),
            })
            .map_err(|error| {
                PluginError::new(ErrorCode::PlatformError, format!("failed to send execute frame: {error}"))
            })?;

        tokio::select! {
            frame = channel.recv() => self.handle_response(frame, &request_id),
            _ = tokio::time::sleep(effective_timeout) => {
                self.abort(&channel, &request_id, child).await;
                Err(PluginError::new(ErrorCode::TimeoutError, "subprocess execution timed out")
                    .with_retry_after_ms(effective_timeout.as_millis() as u64))
            }
            () = cancellation.cancelled() => {
                self.abort(&channel, &request_id, child).await;
                Err(PluginError::new(ErrorCode::AbortError, "subprocess execution was cancelled"))
            }
        }
    }

    fn handle_response(&self, frame: Option<Frame>, request_id: &str) -> Result<BackendOutcome, PluginError> {
        match frame {
            Some(Frame::Result { data, .. }) => Ok(BackendOutcome {
                data,
                execution_meta: json!({ "backend": "subprocess" }),
            }),
            Some(Frame::Error { error, .. }) => Err(error),
            Some(other) => Err(PluginError::new(
                ErrorCode::WorkerCrashed,
                format!("unexpected response frame for {request_id}: {other:?}"),
            )),
            None => Err(PluginError::new(
                ErrorCode::WorkerCrashed,
                "subprocess closed its ipc connection before responding",
            )),
        }
    }

    /// Step 6/7: soft-abort, grace period, then escalate to a hard kill.
    async fn abort(&self, channel: &Channel, request_id: &str, child: &mut Child) {
        let _ = channel.send(Frame::Abort {
            request_id: request_id.to_string(),
        });
        tokio::time::sleep(SOFT_ABORT_GRACE).await;
        if let Ok(Some(_status)) = child.try_wait() {
            return;
        }
        terminate(child).await;
    }
}

async fn reap_or_kill(child: &mut Child, pid: Option<u32>) {
    match child.try_wait() {
        Ok(Some(_status)) => debug!(?pid, "subprocess already exited"),
        Ok(None) => {
            terminate(child).await;
        }
        Err(error) => warn!(%error, ?pid, "failed to poll subprocess exit status"),
    }
}

fn ipc_bind_error(error: io::Error) -> PluginError {
    PluginError::new(ErrorCode::PlatformError, format!("failed to bind subprocess ipc socket: {error}"))
        .with_details(json!({ "transport": "ipc" }))
}

fn wrap_io(context: &str, error: io::Error) -> PluginError {
    PluginError::new(ErrorCode::InternalError, format!("{context}: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_core::descriptor::{HandlerRef, HostContext, PluginContextDescriptor};
    use kb_core::permission::PermissionSpec;
    use kb_core::HostType;
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    fn sample_request(plugin_root: &Path) -> ExecutionRequest {
        ExecutionRequest {
            execution_id: "exec-1".into(),
            descriptor: PluginContextDescriptor {
                host_type: HostType::Cli,
                plugin_id: "demo".into(),
                plugin_version: "1.0.0".into(),
                request_id: "req-1".into(),
                trace_id: "trace-1".into(),
                span_id: "span-1".into(),
                invocation_id: "inv-1".into(),
                execution_id: "exec-1".into(),
                handler_id: "handlers/main.ts#run".into(),
                command_id: None,
                tenant_id: None,
                permissions: PermissionSpec::default(),
                host_context: HostContext::Cli {
                    argv: vec![],
                    flags: HashMap::new(),
                },
            },
            plugin_root: plugin_root.display().to_string(),
            handler_ref: HandlerRef {
                file: "handlers/missing.js".into(),
                export: "run".into(),
            },
            input: serde_json::json!({}),
            workspace: plugin_root.display().to_string(),
            timeout_ms: None,
            target: None,
            export_name: None,
            invoke_chain: None,
        }
    }

    #[tokio::test]
    async fn missing_handler_file_fails_before_spawning_anything() {
        let plugin_root = tempfile::tempdir().unwrap();
        let backend = SubprocessBackend::new(PathBuf::from("/nonexistent/kb-bootstrap"));
        let request = sample_request(plugin_root.path());

        let result = backend.execute(request, CancellationToken::new()).await;

        let error = result.expect_err("missing handler must fail");
        assert_eq!(error.code, ErrorCode::HandlerNotFound);
    }

    #[test]
    fn socket_path_is_scoped_to_execution_id() {
        let backend = SubprocessBackend::new(PathBuf::from("/usr/bin/kb-bootstrap"))
            .with_socket_dir(PathBuf::from("/tmp/kb-sockets"));
        let path = backend.socket_path("exec-42");
        assert_eq!(path, PathBuf::from("/tmp/kb-sockets/kb-subprocess-exec-42.sock"));
    }
}
