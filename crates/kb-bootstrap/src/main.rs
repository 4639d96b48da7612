//! The bootstrap entrypoint spawned by `kb-subprocess`/`kb-worker-pool` for
//! every subprocess execution, per spec §4.6 step 3.
//!
//! Command line carries only `--socket <path>` and `--request-file <path>`
//! — never user input. Everything else (the descriptor, the handler to
//! resolve, the input payload, the per-execution auth token) rides inside
//! the request file the parent wrote before spawning this process.
//!
//! Two modes, selected by `--persistent`:
//!
//! - One-shot (default, `kb-subprocess`'s C6 backend): the request file is a
//!   [`kb_subprocess::BootstrapRequest`] naming one handler/input up front;
//!   this process serves exactly one `execute` frame and exits.
//! - Persistent (`kb-worker-pool`'s C7 backend): the request file is a
//!   [`kb_subprocess::WorkerBootstrapConfig`] carrying only the worker's
//!   shared auth token; this process serves `execute` frames in a loop,
//!   resolving a (possibly different) handler fresh each time, until the
//!   parent sends `shutdown` or the connection closes.
//!
//! Both modes resolve handlers through the same [`kb_handler::HandlerRegistry`]
//! the in-process backend uses, run them via the shared [`kb_handler::run`]
//! path, and report back over the parent's IPC socket.

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(unreachable_pub)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kb_context::factory::{self, ContextInputs};
use kb_core::error::{ErrorCode, PluginError};
use kb_core::ExecutionRequest;
use kb_handler::HandlerRegistry;
use kb_ipc::{Frame, IpcClient, IpcPlatformAdapter};
use kb_subprocess::{BootstrapRequest, WorkerBootstrapConfig};
use kb_telemetry::{setup_default_logging, RequestContext};

#[derive(Parser)]
#[command(name = "kb-bootstrap")]
#[command(about = "Subprocess bootstrap spawned by kb-subprocess/kb-worker-pool", long_about = None)]
struct Cli {
    /// Path to the per-execution (or per-worker) Unix-domain socket to
    /// connect to.
    #[arg(long)]
    socket: PathBuf,

    /// Path to the serialized request file: a `BootstrapRequest` in
    /// one-shot mode, a `WorkerBootstrapConfig` in `--persistent` mode.
    #[arg(long = "request-file")]
    request_file: PathBuf,

    /// Serve `execute` frames in a loop instead of exiting after the first,
    /// per spec §4.7's long-lived pool workers.
    #[arg(long)]
    persistent: bool,
}

/// Registers the handlers this bootstrap knows how to run.
///
/// Concrete plugin handler implementations are out of scope here (this
/// workspace provides the execution platform, not a bundled plugin set) —
/// a real deployment wires its manifest-declared handlers in at this point,
/// the same way `kb-daemon` populates the in-process registry.
fn register_handlers(_registry: &mut HandlerRegistry) {}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = setup_default_logging() {
        eprintln!("kb-bootstrap: failed to initialize logging: {error}");
    }

    let cli = Cli::parse();
    let client = Arc::new(IpcClient::new(cli.socket.clone()));

    if cli.persistent {
        run_persistent(client, cli.request_file).await
    } else {
        run_one_shot(client, cli.request_file).await
    }
}

async fn run_one_shot(client: Arc<IpcClient>, request_file: PathBuf) -> Result<()> {
    let raw = tokio::fs::read(&request_file)
        .await
        .with_context(|| format!("reading bootstrap request file {}", request_file.display()))?;
    let bootstrap_request: BootstrapRequest =
        serde_json::from_slice(&raw).context("parsing bootstrap request file")?;

    let request_context = RequestContext::new("kb-bootstrap")
        .with_operation("execute")
        .with_request_id(&bootstrap_request.descriptor.request_id)
        .with_trace_id(&bootstrap_request.descriptor.trace_id)
        .with_plugin_id(&bootstrap_request.plugin_id);
    let _guard = request_context.enter();

    client
        .send(Frame::Ready)
        .await
        .context("sending ready frame to parent")?;

    let execution_id = bootstrap_request.descriptor.execution_id.clone();
    let (request_id, request_value, auth_token) = match await_execute(&client, &execution_id).await {
        Ok(triple) => triple,
        Err(error) => {
            error!(%error, "failed waiting for execute frame");
            return Err(error.into());
        }
    };

    if let (Some(expected), Some(provided)) = (&bootstrap_request.auth_token, &auth_token) {
        if expected != provided {
            let error = PluginError::new(
                ErrorCode::PlatformError,
                "auth token on execute frame did not match the bootstrap request",
            );
            let _ = client.send(Frame::Error { request_id, error }).await;
            anyhow::bail!("auth token mismatch on execute frame");
        }
    }

    let mut registry = HandlerRegistry::new();
    register_handlers(&mut registry);

    let handler = match registry.resolve(
        &bootstrap_request.plugin_id,
        &bootstrap_request.handler_ref,
        bootstrap_request.export_name.as_deref(),
    ) {
        Ok(handler) => handler,
        Err(error) => {
            let _ = client.send(Frame::Error { request_id, error }).await;
            return Ok(());
        }
    };

    let signal = CancellationToken::new();
    let inputs = ContextInputs {
        platform_adapter: Arc::new(IpcPlatformAdapter::new(client.clone())),
        cwd: bootstrap_request.cwd.clone(),
        outdir: Some(bootstrap_request.outdir.clone()),
        signal: Some(signal.clone()),
        http: reqwest::Client::new(),
    };
    let build = factory::build(&bootstrap_request.descriptor, inputs);
    let mut context = build.context;
    let mut cleanup = build.cleanup;
    context.signal = signal.clone();

    let abort_watch = spawn_abort_watch(client.clone(), signal.clone(), request_id.clone());

    let input = request_value
        .get("input")
        .cloned()
        .unwrap_or_else(|| bootstrap_request.input.clone());

    let result = kb_handler::run(handler.as_ref(), &context, input, &mut cleanup).await;
    abort_watch.abort();

    match result {
        Ok(output) => {
            let data = json!({
                "exitCode": output.exit_code,
                "data": output.data,
                "meta": output.meta,
            });
            client
                .send(Frame::Result { request_id, data })
                .await
                .context("sending result frame to parent")?;
        }
        Err(error) => {
            warn!(message = %error.message, code = error.code.as_str(), "handler execution failed");
            client
                .send(Frame::Error { request_id, error })
                .await
                .context("sending error frame to parent")?;
        }
    }

    info!("bootstrap execution complete, exiting");
    Ok(())
}

/// Serve `execute` frames in a loop over one long-lived channel, per spec
/// §4.7. Each frame carries a complete [`ExecutionRequest`] of its own —
/// unlike the one-shot request file, nothing about the handler to run is
/// known until the frame arrives.
async fn run_persistent(client: Arc<IpcClient>, request_file: PathBuf) -> Result<()> {
    let raw = tokio::fs::read(&request_file)
        .await
        .with_context(|| format!("reading worker bootstrap config {}", request_file.display()))?;
    let config: WorkerBootstrapConfig =
        serde_json::from_slice(&raw).context("parsing worker bootstrap config")?;

    client
        .send(Frame::Ready)
        .await
        .context("sending ready frame to parent")?;

    let mut registry = HandlerRegistry::new();
    register_handlers(&mut registry);

    loop {
        match client.recv_unsolicited().await {
            Some(Frame::Execute {
                request_id,
                request,
                auth_token,
            }) => {
                if let (Some(expected), Some(provided)) = (&config.auth_token, &auth_token) {
                    if expected != provided {
                        let error = PluginError::new(
                            ErrorCode::PlatformError,
                            "auth token on execute frame did not match worker bootstrap config",
                        );
                        let _ = client.send(Frame::Error { request_id, error }).await;
                        continue;
                    }
                }
                handle_one_execution(&client, &registry, request_id, request).await;
            }
            Some(Frame::Health { request_id }) => {
                let _ = client.send(Frame::HealthOk { request_id }).await;
            }
            Some(Frame::Shutdown { graceful }) => {
                info!(graceful, "parent requested shutdown, exiting persistent worker loop");
                break;
            }
            Some(other) => {
                warn!(?other, "ignoring unexpected frame in persistent worker loop");
            }
            None => {
                warn!("ipc connection closed, exiting persistent worker loop");
                break;
            }
        }
    }

    Ok(())
}

async fn handle_one_execution(
    client: &Arc<IpcClient>,
    registry: &HandlerRegistry,
    request_id: String,
    request_value: Value,
) {
    let request: ExecutionRequest = match serde_json::from_value(request_value) {
        Ok(request) => request,
        Err(error) => {
            let error = PluginError::new(
                ErrorCode::PlatformError,
                format!("failed to parse execution request: {error}"),
            );
            let _ = client.send(Frame::Error { request_id, error }).await;
            return;
        }
    };

    let request_context = RequestContext::new("kb-bootstrap")
        .with_operation("execute")
        .with_request_id(&request.descriptor.request_id)
        .with_trace_id(&request.descriptor.trace_id)
        .with_plugin_id(&request.descriptor.plugin_id);
    let _guard = request_context.enter();

    let handler = match registry.resolve(
        &request.descriptor.plugin_id,
        &request.handler_ref,
        request.export_name.as_deref(),
    ) {
        Ok(handler) => handler,
        Err(error) => {
            let _ = client.send(Frame::Error { request_id, error }).await;
            return;
        }
    };

    let signal = CancellationToken::new();
    let inputs = ContextInputs {
        platform_adapter: Arc::new(IpcPlatformAdapter::new(client.clone())),
        cwd: PathBuf::from(&request.workspace),
        outdir: Some(PathBuf::from(&request.workspace).join(".kb").join("output")),
        signal: Some(signal.clone()),
        http: reqwest::Client::new(),
    };
    let build = factory::build(&request.descriptor, inputs);
    let mut context = build.context;
    let mut cleanup = build.cleanup;
    context.signal = signal.clone();

    let abort_watch = spawn_abort_watch(client.clone(), signal.clone(), request_id.clone());

    let result = kb_handler::run(handler.as_ref(), &context, request.input.clone(), &mut cleanup).await;
    abort_watch.abort();

    match result {
        Ok(output) => {
            let data = json!({
                "exitCode": output.exit_code,
                "data": output.data,
                "meta": output.meta,
            });
            if let Err(error) = client.send(Frame::Result { request_id, data }).await {
                warn!(%error, "failed to send result frame to parent");
            }
        }
        Err(error) => {
            warn!(message = %error.message, code = error.code.as_str(), "handler execution failed");
            if let Err(error) = client.send(Frame::Error { request_id, error }).await {
                warn!(%error, "failed to send error frame to parent");
            }
        }
    }
}

/// Drain unsolicited frames looking for the `abort` that targets
/// `request_id`, cancelling `signal` when it arrives. The caller aborts this
/// task once its execution finishes, whether or not an abort ever came.
fn spawn_abort_watch(
    client: Arc<IpcClient>,
    signal: CancellationToken,
    request_id: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = client.recv_unsolicited().await {
            if let Frame::Abort { request_id: aborted } = frame {
                if aborted == request_id {
                    signal.cancel();
                    break;
                }
            }
        }
    })
}

/// Drain unsolicited frames until the parent's `execute` arrives, per spec
/// §4.6 step 4 — a bootstrap child never initiates this itself, so it can
/// only ever see it via [`IpcClient::recv_unsolicited`].
async fn await_execute(
    client: &IpcClient,
    expected_execution_id: &str,
) -> Result<(String, serde_json::Value, Option<String>), kb_core::error::PluginError> {
    loop {
        match client.recv_unsolicited().await {
            Some(Frame::Execute {
                request_id,
                request,
                auth_token,
            }) => return Ok((request_id, request, auth_token)),
            Some(Frame::Shutdown { .. }) => {
                return Err(kb_core::error::PluginError::new(
                    kb_core::error::ErrorCode::AbortError,
                    "parent requested shutdown before sending an execute frame",
                ))
            }
            Some(other) => {
                warn!(?other, "ignoring unexpected frame while waiting for execute");
            }
            None => {
                return Err(kb_core::error::PluginError::new(
                    kb_core::error::ErrorCode::WorkerCrashed,
                    format!("ipc connection closed before execute arrived for {expected_execution_id}"),
                ))
            }
        }
    }
}
