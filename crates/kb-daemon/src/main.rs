//! The parent daemon: wires C1-C11 and the three host adapters into one
//! running process, per spec §4's component table.
//!
//! Mirrors `astrid-kernel::Kernel`'s "one struct, built once at startup,
//! handed to everything that needs it" shape, generalized from a single
//! WASM-capsule router into this workspace's façade/backend/broker
//! collection. Concrete plugin handlers, a manifest loader, and the
//! front-ends' own accept loops are all out of scope here (spec §1) — this
//! binary's job ends at handing a wired `ExecutionFacade` to the three
//! host adapters.

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(unreachable_pub)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use kb_cli_host::CliHost;
use kb_config::RuntimeConfig;
use kb_connection_registry::ConnectionRegistry;
use kb_degradation::{DegradationController, FixedResourceSampler};
use kb_exec::{AlwaysActiveRegistry, ExecutionBackend, ExecutionFacade, LocalWorkspaceManager};
use kb_handler::{HandlerRegistry, InProcessBackend};
use kb_invoke::InvokeBroker;
use kb_platform::{EventBus, NoopPlatformAdapter};
use kb_rest_host::RestHost;
use kb_subprocess::SubprocessBackend;
use kb_telemetry::setup_default_logging;
use kb_worker_pool::{WorkerPool, WorkerPoolBuilder};
use kb_ws_host::WsHost;

/// Which `ExecutionBackend` the daemon dispatches to, per spec §4.10.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendKind {
    /// Runs every handler on this process's own runtime. No sandbox
    /// boundary beyond C1/C2's facades.
    InProcess,
    /// One fresh subprocess per execution (C6).
    Subprocess,
    /// A long-lived, recycled worker pool (C7).
    Pool,
}

#[derive(Parser)]
#[command(name = "kb-daemon")]
#[command(about = "Parent daemon wiring the plugin execution runtime together", long_about = None)]
struct Cli {
    /// Optional TOML file merged over the built-in defaults, per
    /// `kb-config`'s layered loader.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Which execution backend to dispatch every request to.
    #[arg(long, value_enum, default_value = "in-process")]
    backend: BackendKind,

    /// Path to the `kb-bootstrap` binary. Required for `subprocess`/`pool`
    /// backends; ignored for `in-process`.
    #[arg(long)]
    bootstrap_bin: Option<PathBuf>,
}

/// Registers the handlers this daemon's in-process/subprocess backends
/// resolve against.
///
/// Concrete plugin handler implementations and manifest-driven discovery
/// are out of scope here (this workspace provides the execution platform,
/// not a bundled plugin set) — a real deployment populates this from every
/// loaded manifest's `handler` reference, the same point `kb-bootstrap`
/// leaves open for its own in-subprocess registry.
fn register_handlers(_registry: &mut HandlerRegistry) {}

/// Builds the `in-process`/`subprocess` backends; the `pool` backend is
/// built separately in `main` since it additionally needs the loaded
/// `WorkerPoolConfig` and its own handle for graceful shutdown.
fn build_simple_backend(cli: &Cli) -> Result<Arc<dyn ExecutionBackend>> {
    match cli.backend {
        BackendKind::InProcess => {
            let mut registry = HandlerRegistry::new();
            register_handlers(&mut registry);
            Ok(Arc::new(InProcessBackend::new(Arc::new(registry), Arc::new(NoopPlatformAdapter))))
        }
        BackendKind::Subprocess => {
            let bootstrap_bin = cli
                .bootstrap_bin
                .clone()
                .context("--bootstrap-bin is required for the subprocess backend")?;
            Ok(Arc::new(SubprocessBackend::new(bootstrap_bin)))
        }
        BackendKind::Pool => unreachable!("pool backend is built directly in main"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = setup_default_logging() {
        eprintln!("kb-daemon: failed to initialize logging: {error}");
    }

    let cli = Cli::parse();
    let config: RuntimeConfig = kb_config::load(cli.config.as_deref()).context("loading runtime config")?;

    info!(backend = ?cli.backend, "kb-daemon starting");

    let (backend, pool): (Arc<dyn ExecutionBackend>, Option<WorkerPool>) = match cli.backend {
        BackendKind::Pool => {
            let bootstrap_bin = cli
                .bootstrap_bin
                .clone()
                .context("--bootstrap-bin is required for the pool backend")?;
            let pool = WorkerPoolBuilder::new(bootstrap_bin, config.worker_pool.clone()).build();
            (Arc::new(pool.clone()), Some(pool))
        }
        _ => (build_simple_backend(&cli)?, None),
    };

    let events = EventBus::new();
    let degradation = DegradationController::new(config.degradation.clone(), events.clone());
    let sampler_loop = {
        let degradation = degradation.clone();
        tokio::spawn(async move {
            // No OS resource counter is wired in here (out of scope, per
            // `kb-platform::NoopPlatformAdapter`'s own framing) — an idle
            // fixed sample keeps the FSM resident at `normal` until a real
            // deployment supplies its own `ResourceSampler`.
            degradation.run(Arc::new(FixedResourceSampler::idle())).await;
        })
    };

    let facade = Arc::new(ExecutionFacade::new(
        backend,
        Arc::new(LocalWorkspaceManager),
        Arc::new(degradation),
        Arc::new(AlwaysActiveRegistry),
    ));

    // Wired for cross-plugin `invoke` calls; no adapter surfaces it yet since
    // bridging a handler's `context.api.invoke` down to this broker is a
    // `kb-context`/`kb-ipc` concern outside this binary's scope.
    let _invoke_broker = Arc::new(InvokeBroker::new(facade.clone()));

    let connections = ConnectionRegistry::new();
    let _cli_host = CliHost::new(facade.clone());
    let _rest_host = RestHost::new(facade.clone());
    let _ws_host = WsHost::new(facade.clone(), connections);

    info!("kb-daemon ready");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("kb-daemon received shutdown signal, tearing down");

    sampler_loop.abort();
    if let Some(pool) = pool {
        pool.shutdown().await;
    }

    Ok(())
}
