//! C7: the long-lived worker pool, implementing [`kb_exec::ExecutionBackend`].
//!
//! Per `worker.rs`'s own framing, "the worker pool is the only component
//! that holds long-lived shared state... all mutations happen in a single
//! logical executor": admission, queueing, per-plugin quotas, and worker
//! bookkeeping all live in one actor task (grounded on the same
//! channel-owned-state shape as `kb-ipc::client`'s demux task), reached only
//! through an mpsc command channel. Each admitted request then runs on its
//! own spawned task so slow executions never block the admission decision
//! for anyone else.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use kb_config::WorkerPoolConfig;
use kb_core::error::{ErrorCode, PluginError};
use kb_core::ExecutionRequest;
use kb_exec::{BackendOutcome, ExecutionBackend};
use kb_ipc::AdapterDispatch;

use crate::stats::{PoolStats, PoolStatsSnapshot};
use crate::worker::{Worker, WorkerState, RECYCLE_SHUTDOWN_TIMEOUT};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

struct QueuedItem {
    id: String,
    plugin_id: String,
    request: ExecutionRequest,
    cancellation: CancellationToken,
    queued_at: Instant,
    reply: oneshot::Sender<Result<BackendOutcome, PluginError>>,
}

enum Command {
    Execute(QueuedItem),
    Release {
        worker_id: String,
        plugin_id: String,
        crashed: bool,
        recycle: bool,
    },
    WorkerReady(Arc<Worker>),
    WorkerSpawnFailed,
    WorkerUnhealthy(String),
    ExpireAcquire(String),
    CancelAcquire(String),
    HealthTick,
    Shutdown { reply: oneshot::Sender<()> },
}

/// Admission bookkeeping owned exclusively by the actor loop in [`run_actor`].
#[derive(Default)]
struct PoolState {
    idle: VecDeque<String>,
    busy: HashSet<String>,
    plugin_inflight: HashMap<String, usize>,
    queue: VecDeque<QueuedItem>,
    total_workers: usize,
}

struct Inner {
    config: WorkerPoolConfig,
    bootstrap_bin: PathBuf,
    socket_dir: PathBuf,
    dispatcher: Option<Arc<dyn AdapterDispatch>>,
    workers: DashMap<String, Arc<Worker>>,
    stats: PoolStats,
    commands: mpsc::UnboundedSender<Command>,
    shutting_down: AtomicBool,
    health_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// A cloneable handle onto the pool's shared state and its admission actor.
pub struct WorkerPool(Arc<Inner>);

impl Clone for WorkerPool {
    fn clone(&self) -> Self {
        WorkerPool(self.0.clone())
    }
}

impl WorkerPool {
    /// A point-in-time read of pool counters and execution/wait-time
    /// percentiles.
    #[must_use]
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.0.stats.snapshot()
    }

    /// The number of workers currently tracked (idle, busy, or recycling).
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.0.workers.len()
    }

    /// Gracefully tear the pool down: reject anything still queued, shut
    /// down every worker (graceful, escalating to a hard kill per worker's
    /// own bound), and stop the health-check loop.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.0.commands.send(Command::Shutdown { reply }).is_ok() {
            let _ = done.await;
        }
        let handle = self.0.health_task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

#[async_trait]
impl ExecutionBackend for WorkerPool {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    async fn execute(
        &self,
        request: ExecutionRequest,
        cancellation: CancellationToken,
    ) -> Result<BackendOutcome, PluginError> {
        let (reply, done) = oneshot::channel();
        let item = QueuedItem {
            id: uuid::Uuid::new_v4().to_string(),
            plugin_id: request.descriptor.plugin_id.clone(),
            request,
            cancellation,
            queued_at: Instant::now(),
            reply,
        };
        self.0.commands.send(Command::Execute(item)).map_err(|_| {
            PluginError::new(ErrorCode::InternalError, "worker pool admission task is no longer running")
        })?;
        done.await.unwrap_or_else(|_canceled| {
            Err(PluginError::new(
                ErrorCode::InternalError,
                "worker pool admission task dropped the reply channel",
            ))
        })
    }
}

/// Builds a [`WorkerPool`], per spec §4.7's construction-time warm-up.
///
/// `warmup_mode` beyond `none` has no extra effect in this implementation:
/// pool workers are handler-agnostic persistent `kb-bootstrap --persistent`
/// children (every `execute` frame names its own handler), so there is no
/// additional "pre-warm this route" action a generic worker could take
/// beyond simply being spawned and idle — which eagerly spawning `min`
/// workers already provides regardless of `top-n`/`marked`.
pub struct WorkerPoolBuilder {
    bootstrap_bin: PathBuf,
    config: WorkerPoolConfig,
    socket_dir: PathBuf,
    dispatcher: Option<Arc<dyn AdapterDispatch>>,
}

impl WorkerPoolBuilder {
    /// Start building a pool that spawns `bootstrap_bin` persistent workers.
    #[must_use]
    pub fn new(bootstrap_bin: PathBuf, config: WorkerPoolConfig) -> Self {
        Self {
            bootstrap_bin,
            config,
            socket_dir: std::env::temp_dir(),
            dispatcher: None,
        }
    }

    /// Override where worker sockets and bootstrap config files are created.
    #[must_use]
    pub fn with_socket_dir(mut self, socket_dir: PathBuf) -> Self {
        self.socket_dir = socket_dir;
        self
    }

    /// Wire a platform-adapter dispatcher so workers' outbound
    /// `Frame::AdapterCall` requests get real answers.
    #[must_use]
    pub fn with_adapter_dispatch(mut self, dispatcher: Arc<dyn AdapterDispatch>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Start the admission actor and the health-check loop, and eagerly
    /// spawn `config.min` workers in the background.
    #[must_use]
    pub fn build(self) -> WorkerPool {
        let (commands, receiver) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            config: self.config,
            bootstrap_bin: self.bootstrap_bin,
            socket_dir: self.socket_dir,
            dispatcher: self.dispatcher,
            workers: DashMap::new(),
            stats: PoolStats::default(),
            commands: commands.clone(),
            shutting_down: AtomicBool::new(false),
            health_task: std::sync::Mutex::new(None),
        });

        tokio::spawn(run_actor(inner.clone(), receiver));

        for _ in 0..inner.config.min {
            spawn_worker_async(inner.clone(), commands.clone());
        }

        let health_handle = spawn_health_check(inner.clone(), commands);
        *inner.health_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(health_handle);

        WorkerPool(inner)
    }
}

async fn run_actor(inner: Arc<Inner>, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut state = PoolState {
        total_workers: inner.config.min,
        ..PoolState::default()
    };
    let commands_tx = inner.commands.clone();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Execute(item) => {
                inner.stats.record_request();
                if inner.shutting_down.load(Ordering::SeqCst) {
                    let _ = item.reply.send(Err(PluginError::new(
                        ErrorCode::InternalError,
                        "worker pool is shutting down",
                    )));
                    continue;
                }
                admit_or_queue(&inner, &mut state, item, &commands_tx).await;
            }
            Command::Release {
                worker_id,
                plugin_id,
                crashed,
                recycle,
            } => {
                release_worker(&inner, &mut state, &worker_id, &plugin_id, crashed, recycle, &commands_tx).await;
            }
            Command::WorkerReady(worker) => {
                inner.workers.insert(worker.id().to_string(), worker.clone());
                state.idle.push_back(worker.id().to_string());
                drain_queue(&inner, &mut state, &commands_tx).await;
            }
            Command::WorkerSpawnFailed => {
                state.total_workers = state.total_workers.saturating_sub(1);
            }
            Command::WorkerUnhealthy(worker_id) => {
                state.idle.retain(|id| id != &worker_id);
                if inner.workers.remove(&worker_id).is_some() {
                    inner.stats.record_worker_crash();
                    state.total_workers = state.total_workers.saturating_sub(1);
                }
                replenish_minimum(&inner, &mut state, &commands_tx);
                drain_queue(&inner, &mut state, &commands_tx).await;
            }
            Command::ExpireAcquire(id) => {
                if let Some(item) = remove_from_queue(&mut state, &id) {
                    inner.stats.record_acquire_timeout();
                    let _ = item.reply.send(Err(PluginError::new(
                        ErrorCode::AcquireTimeout,
                        "timed out waiting for a worker to become available",
                    )
                    .with_retry_after_ms(inner.config.acquire_timeout_ms)));
                }
            }
            Command::CancelAcquire(id) => {
                if let Some(item) = remove_from_queue(&mut state, &id) {
                    let _ = item.reply.send(Err(PluginError::new(
                        ErrorCode::AbortError,
                        "execution was cancelled while queued",
                    )));
                }
            }
            Command::HealthTick => {
                health_tick(&inner, &state, &commands_tx);
            }
            Command::Shutdown { reply } => {
                shutdown_all(&inner, &mut state).await;
                let _ = reply.send(());
                break;
            }
        }
    }
}

async fn admit_or_queue(inner: &Arc<Inner>, state: &mut PoolState, item: QueuedItem, commands_tx: &mpsc::UnboundedSender<Command>) {
    if !quota_allows(inner, state, &item.plugin_id) {
        enqueue(inner, state, item, commands_tx);
        return;
    }

    if let Some(worker_id) = state.idle.pop_front() {
        dispatch(inner, state, worker_id, item, commands_tx).await;
        return;
    }

    if state.total_workers < inner.config.max {
        state.total_workers += 1;
        spawn_worker_async(inner.clone(), commands_tx.clone());
    }
    enqueue(inner, state, item, commands_tx);
}

fn quota_allows(inner: &Inner, state: &PoolState, plugin_id: &str) -> bool {
    match inner.config.max_concurrent_per_plugin {
        Some(max) => state.plugin_inflight.get(plugin_id).copied().unwrap_or(0) < max,
        None => true,
    }
}

fn enqueue(inner: &Arc<Inner>, state: &mut PoolState, item: QueuedItem, commands_tx: &mpsc::UnboundedSender<Command>) {
    if state.queue.len() >= inner.config.max_queue_size {
        inner.stats.record_queue_full();
        let _ = item.reply.send(Err(PluginError::new(
            ErrorCode::QueueFull,
            "worker pool queue is at capacity",
        )));
        return;
    }

    spawn_expiry_watcher(
        item.id.clone(),
        item.queued_at,
        inner.config.acquire_timeout_ms,
        item.cancellation.clone(),
        commands_tx.clone(),
    );
    state.queue.push_back(item);
}

async fn dispatch(inner: &Arc<Inner>, state: &mut PoolState, worker_id: String, item: QueuedItem, commands_tx: &mpsc::UnboundedSender<Command>) {
    let Some(worker) = inner.workers.get(&worker_id).map(|entry| entry.value().clone()) else {
        // the worker vanished between being marked idle and being picked;
        // re-run admission for this item rather than losing it.
        Box::pin(admit_or_queue(inner, state, item, commands_tx)).await;
        return;
    };

    state.busy.insert(worker_id.clone());
    *state.plugin_inflight.entry(item.plugin_id.clone()).or_insert(0) += 1;
    inner.stats.record_wait(u64::try_from(item.queued_at.elapsed().as_millis()).unwrap_or(u64::MAX));
    worker.set_state(WorkerState::Busy).await;

    let inner = inner.clone();
    let commands_tx = commands_tx.clone();
    let effective_timeout = item.request.timeout_ms.map(Duration::from_millis).unwrap_or(DEFAULT_TIMEOUT);
    let QueuedItem {
        plugin_id,
        request,
        cancellation,
        reply,
        ..
    } = item;

    tokio::spawn(async move {
        let started = Instant::now();
        let result = worker.execute(&request, cancellation, effective_timeout).await;
        let execution_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(_) => inner.stats.record_success(execution_ms),
            Err(_) => inner.stats.record_error(execution_ms),
        }

        let crashed = worker.has_crashed().await;
        let recycle = !crashed && worker.should_recycle(&inner.config);
        if recycle {
            worker.set_state(WorkerState::Recycling).await;
        } else if !crashed {
            worker.set_state(WorkerState::Idle).await;
        }

        let _ = commands_tx.send(Command::Release {
            worker_id: worker.id().to_string(),
            plugin_id,
            crashed,
            recycle,
        });
        let _ = reply.send(result);
    });
}

#[allow(clippy::too_many_arguments)]
async fn release_worker(
    inner: &Arc<Inner>,
    state: &mut PoolState,
    worker_id: &str,
    plugin_id: &str,
    crashed: bool,
    recycle: bool,
    commands_tx: &mpsc::UnboundedSender<Command>,
) {
    state.busy.remove(worker_id);
    if let Some(count) = state.plugin_inflight.get_mut(plugin_id) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            state.plugin_inflight.remove(plugin_id);
        }
    }

    if crashed {
        inner.stats.record_worker_crash();
        inner.workers.remove(worker_id);
        state.total_workers = state.total_workers.saturating_sub(1);
    } else if recycle {
        inner.stats.record_worker_recycled();
        if let Some((_, worker)) = inner.workers.remove(worker_id) {
            tokio::spawn(async move { worker.shutdown(true, RECYCLE_SHUTDOWN_TIMEOUT).await });
        }
        state.total_workers = state.total_workers.saturating_sub(1);
    } else {
        state.idle.push_back(worker_id.to_string());
    }

    replenish_minimum(inner, state, commands_tx);
    drain_queue(inner, state, commands_tx).await;
}

fn replenish_minimum(inner: &Arc<Inner>, state: &mut PoolState, commands_tx: &mpsc::UnboundedSender<Command>) {
    if inner.shutting_down.load(Ordering::SeqCst) {
        return;
    }
    while state.total_workers < inner.config.min {
        state.total_workers += 1;
        spawn_worker_async(inner.clone(), commands_tx.clone());
    }
}

async fn drain_queue(inner: &Arc<Inner>, state: &mut PoolState, commands_tx: &mpsc::UnboundedSender<Command>) {
    loop {
        let Some(item) = state.queue.pop_front() else { break };
        if !quota_allows(inner, state, &item.plugin_id) {
            state.queue.push_front(item);
            break;
        }
        match state.idle.pop_front() {
            Some(worker_id) => dispatch(inner, state, worker_id, item, commands_tx).await,
            None => {
                state.queue.push_front(item);
                break;
            }
        }
    }
}

fn remove_from_queue(state: &mut PoolState, id: &str) -> Option<QueuedItem> {
    let position = state.queue.iter().position(|queued| queued.id == id)?;
    state.queue.remove(position)
}

fn spawn_worker_async(inner: Arc<Inner>, commands_tx: mpsc::UnboundedSender<Command>) {
    tokio::spawn(async move {
        match Worker::spawn(&inner.bootstrap_bin, &inner.socket_dir, inner.dispatcher.clone()).await {
            Ok(worker) => {
                let _ = commands_tx.send(Command::WorkerReady(worker));
            }
            Err(error) => {
                warn!(%error, "failed to spawn worker pool child");
                let _ = commands_tx.send(Command::WorkerSpawnFailed);
            }
        }
    });
}

fn spawn_expiry_watcher(
    id: String,
    queued_at: Instant,
    acquire_timeout_ms: u64,
    cancellation: CancellationToken,
    commands_tx: mpsc::UnboundedSender<Command>,
) {
    let deadline = queued_at + Duration::from_millis(acquire_timeout_ms);
    tokio::spawn(async move {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::select! {
            () = tokio::time::sleep(remaining) => {
                let _ = commands_tx.send(Command::ExpireAcquire(id));
            }
            () = cancellation.cancelled() => {
                let _ = commands_tx.send(Command::CancelAcquire(id));
            }
        }
    });
}

fn health_tick(inner: &Arc<Inner>, state: &PoolState, commands_tx: &mpsc::UnboundedSender<Command>) {
    for worker_id in state.idle.iter().cloned().collect::<Vec<_>>() {
        let Some(worker) = inner.workers.get(&worker_id).map(|entry| entry.value().clone()) else {
            continue;
        };
        let commands_tx = commands_tx.clone();
        tokio::spawn(async move {
            if !worker.health_check().await {
                let _ = commands_tx.send(Command::WorkerUnhealthy(worker_id));
            }
        });
    }
}

fn spawn_health_check(inner: Arc<Inner>, commands_tx: mpsc::UnboundedSender<Command>) -> JoinHandle<()> {
    let interval = Duration::from_millis(inner.config.health_check_interval_ms.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if inner.shutting_down.load(Ordering::SeqCst) {
                break;
            }
            let _ = commands_tx.send(Command::HealthTick);
        }
    })
}

async fn shutdown_all(inner: &Arc<Inner>, state: &mut PoolState) {
    inner.shutting_down.store(true, Ordering::SeqCst);

    while let Some(item) = state.queue.pop_front() {
        let _ = item.reply.send(Err(PluginError::new(
            ErrorCode::InternalError,
            "worker pool is shutting down",
        )));
    }

    let worker_ids: Vec<String> = inner.workers.iter().map(|entry| entry.key().clone()).collect();
    for worker_id in worker_ids {
        if let Some((_, worker)) = inner.workers.remove(&worker_id) {
            worker.shutdown(true, RECYCLE_SHUTDOWN_TIMEOUT).await;
        }
    }
}
