//! Resource sampling — the inputs the FSM in [`crate::state`] reacts to.

use async_trait::async_trait;

/// One point-in-time reading of the three signals the controller watches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// CPU usage, averaged across cores, as a percentage in `[0, 100]`.
    pub cpu_percent: f64,
    /// Memory usage as a percentage of total, in `[0, 100]`.
    pub memory_percent: f64,
    /// Queue depth summed across priority queues; zero if unavailable.
    pub queue_depth: u64,
}

/// Produces [`ResourceSample`]s for the controller's periodic tick.
///
/// Concrete OS-counter and cache-adapter wiring lives outside this crate —
/// the controller only needs something that can answer "how loaded are we
/// right now", the same narrow-seam shape `kb-platform`'s adapter traits use.
#[async_trait]
pub trait ResourceSampler: Send + Sync {
    /// Take one sample. Never fails — an unavailable signal reads as zero
    /// rather than aborting the sampling loop.
    async fn sample(&self) -> ResourceSample;
}

/// A sampler that always reports the same fixed reading.
///
/// Useful for tests and for deployments that have not wired a real sampler
/// yet — it is the `kb-degradation` analogue of `kb-platform`'s
/// `NoopPlatformAdapter`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedResourceSampler {
    sample: ResourceSample,
}

impl FixedResourceSampler {
    /// Always report `sample`.
    #[must_use]
    pub fn new(sample: ResourceSample) -> Self {
        Self { sample }
    }

    /// Always report an all-zero, fully idle sample.
    #[must_use]
    pub fn idle() -> Self {
        Self::new(ResourceSample {
            cpu_percent: 0.0,
            memory_percent: 0.0,
            queue_depth: 0,
        })
    }
}

#[async_trait]
impl ResourceSampler for FixedResourceSampler {
    async fn sample(&self) -> ResourceSample {
        self.sample
    }
}

/// The cache key the queue-depth component of a sample is read from, keyed
/// per namespace. Any concrete cache adapter backing queue-depth reporting
/// must write to this key for the controller to see it.
#[must_use]
pub fn queue_depth_cache_key(namespace: &str) -> String {
    format!("kb:queue-depth:{namespace}")
}
