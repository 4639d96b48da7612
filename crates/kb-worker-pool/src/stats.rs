//! Pool statistics, per spec §4.7: "counters (`totalRequests`,
//! `successCount`, `errorCount`, `acquireTimeouts`, `queueFullRejections`,
//! `workerCrashes`, `workersRecycled`), rolling window of execution/wait
//! times (last 1000) for averages, p95, p99."

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const ROLLING_WINDOW_CAPACITY: usize = 1000;

/// Fixed-capacity FIFO of recent sample values, used for the execution-time
/// and wait-time rolling windows.
#[derive(Debug, Default)]
struct RollingWindow {
    samples: VecDeque<u64>,
}

impl RollingWindow {
    fn push(&mut self, value_ms: u64) {
        if self.samples.len() >= ROLLING_WINDOW_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(value_ms);
    }

    fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.samples.iter().sum();
        sum as f64 / self.samples.len() as f64
    }

    fn percentile(&self, p: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = ((p / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }
}

/// A point-in-time read of [`PoolStats`], safe to hand to a stats endpoint
/// without holding any lock (spec §5's "external observers read a
/// snapshot" invariant).
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStatsSnapshot {
    /// Total `execute` calls accepted or rejected.
    pub total_requests: u64,
    /// Calls that completed with a handler success.
    pub success_count: u64,
    /// Calls that completed with a handler or backend error.
    pub error_count: u64,
    /// Calls rejected because they waited past `acquireTimeoutMs`.
    pub acquire_timeouts: u64,
    /// Calls rejected because the queue was at `maxQueueSize`.
    pub queue_full_rejections: u64,
    /// Workers that died unexpectedly (crash, not recycle).
    pub worker_crashes: u64,
    /// Workers retired via the recycling policy.
    pub workers_recycled: u64,
    /// Mean execution time over the last 1000 completed calls, milliseconds.
    pub avg_execution_ms: f64,
    /// 95th percentile execution time, milliseconds.
    pub p95_execution_ms: u64,
    /// 99th percentile execution time, milliseconds.
    pub p99_execution_ms: u64,
    /// Mean queue wait time over the last 1000 calls that were ever queued.
    pub avg_wait_ms: f64,
    /// 95th percentile queue wait time, milliseconds.
    pub p95_wait_ms: u64,
    /// 99th percentile queue wait time, milliseconds.
    pub p99_wait_ms: u64,
}

/// Counters and rolling windows for one pool's lifetime.
#[derive(Debug, Default)]
pub struct PoolStats {
    total_requests: AtomicU64,
    success_count: AtomicU64,
    error_count: AtomicU64,
    acquire_timeouts: AtomicU64,
    queue_full_rejections: AtomicU64,
    worker_crashes: AtomicU64,
    workers_recycled: AtomicU64,
    execution_times: Mutex<RollingWindow>,
    wait_times: Mutex<RollingWindow>,
}

impl PoolStats {
    /// A request was accepted into the acceptance protocol (admitted,
    /// queued, or rejected) — incremented once per `execute` call.
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// A handler completed successfully.
    pub fn record_success(&self, execution_ms: u64) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.execution_times.lock().unwrap_or_else(|e| e.into_inner()).push(execution_ms);
    }

    /// A handler or backend error terminated the call.
    pub fn record_error(&self, execution_ms: u64) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        self.execution_times.lock().unwrap_or_else(|e| e.into_inner()).push(execution_ms);
    }

    /// A queued call was admitted or rejected after waiting `wait_ms`.
    pub fn record_wait(&self, wait_ms: u64) {
        self.wait_times.lock().unwrap_or_else(|e| e.into_inner()).push(wait_ms);
    }

    /// A queued call missed its `acquireTimeoutMs`.
    pub fn record_acquire_timeout(&self) {
        self.acquire_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// A call was rejected because the queue was full.
    pub fn record_queue_full(&self) {
        self.queue_full_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker exited without being asked to (crash path).
    pub fn record_worker_crash(&self) {
        self.worker_crashes.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker was retired by the recycling policy.
    pub fn record_worker_recycled(&self) {
        self.workers_recycled.fetch_add(1, Ordering::Relaxed);
    }

    /// A consistent snapshot of every counter and rolling-window derivative.
    #[must_use]
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        let execution_times = self.execution_times.lock().unwrap_or_else(|e| e.into_inner());
        let wait_times = self.wait_times.lock().unwrap_or_else(|e| e.into_inner());
        PoolStatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            acquire_timeouts: self.acquire_timeouts.load(Ordering::Relaxed),
            queue_full_rejections: self.queue_full_rejections.load(Ordering::Relaxed),
            worker_crashes: self.worker_crashes.load(Ordering::Relaxed),
            workers_recycled: self.workers_recycled.load(Ordering::Relaxed),
            avg_execution_ms: execution_times.average(),
            p95_execution_ms: execution_times.percentile(95.0),
            p99_execution_ms: execution_times.percentile(99.0),
            avg_wait_ms: wait_times.average(),
            p95_wait_ms: wait_times.percentile(95.0),
            p99_wait_ms: wait_times.percentile(99.0),
        }
    }
}
