//! Wires the [`crate::state`] FSM and a [`crate::sample::ResourceSampler`]
//! into a [`kb_exec::DegradationAdvisor`], publishing each committed
//! transition onto a [`kb_platform::EventBus`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kb_config::DegradationConfig;
use kb_exec::{Advisory, DegradationAdvisor};
use kb_platform::{EventBus, PlatformEvent};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::sample::ResourceSampler;
use crate::state::{DebouncedState, DegradationLevel};

/// The C9 degradation controller.
///
/// Cloning shares the same underlying state and event bus — a clone is
/// handed to the façade as the [`DegradationAdvisor`] while the original
/// drives the periodic sampling loop via [`DegradationController::run`].
#[derive(Clone)]
pub struct DegradationController {
    config: DegradationConfig,
    state: Arc<RwLock<DebouncedState>>,
    events: EventBus,
}

impl DegradationController {
    /// Build a controller starting in `normal`, publishing transitions on
    /// `events`.
    #[must_use]
    pub fn new(config: DegradationConfig, events: EventBus) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(DebouncedState::new())),
            events,
        }
    }

    /// The currently committed level.
    pub async fn level(&self) -> DegradationLevel {
        self.state.read().await.committed()
    }

    /// Run the periodic sampling loop until cancelled by dropping this
    /// future. Intended to be spawned as a background task by the process
    /// wiring this controller in (e.g. `kb-daemon`).
    pub async fn run(&self, sampler: Arc<dyn ResourceSampler>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.sample_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick(sampler.as_ref()).await;
        }
    }

    /// Take one sample and feed it through the FSM, publishing an event if
    /// it causes a committed transition. Exposed separately from [`Self::run`]
    /// so tests can drive the controller without waiting on real time.
    pub async fn tick(&self, sampler: &dyn ResourceSampler) {
        let sample = sampler.sample().await;
        let transitioned = {
            let mut state = self.state.write().await;
            state.observe(&sample, &self.config, std::time::Instant::now())
        };

        if let Some(level) = transitioned {
            info!(level = level.as_str(), "degradation controller transitioned");
            self.events.publish(PlatformEvent::new(
                "degradation.transition",
                serde_json::json!({
                    "level": level.as_str(),
                    "cpuPercent": sample.cpu_percent,
                    "memoryPercent": sample.memory_percent,
                    "queueDepth": sample.queue_depth,
                }),
            ));
        }
    }
}

#[async_trait]
impl DegradationAdvisor for DegradationController {
    async fn advise(&self) -> Advisory {
        match self.level().await {
            DegradationLevel::Normal => Advisory::Proceed,
            DegradationLevel::Degraded => {
                Advisory::Delay(Duration::from_millis(self.config.degraded_delay_ms))
            }
            DegradationLevel::Critical => {
                if self.config.reject_on_critical {
                    Advisory::Reject
                } else {
                    Advisory::Delay(Duration::from_millis(self.config.critical_delay_ms))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{FixedResourceSampler, ResourceSample};

    #[tokio::test]
    async fn idle_samples_advise_proceed() {
        let controller = DegradationController::new(DegradationConfig::default(), EventBus::new());
        let sampler = FixedResourceSampler::idle();
        controller.tick(&sampler).await;
        assert_eq!(controller.advise().await, Advisory::Proceed);
    }

    #[tokio::test]
    async fn sustained_high_cpu_transitions_to_degraded_and_publishes() {
        let mut config = DegradationConfig::default();
        config.debounce_ms = 0;
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let controller = DegradationController::new(config, events);
        let sampler = FixedResourceSampler::new(ResourceSample {
            cpu_percent: 85.0,
            memory_percent: 0.0,
            queue_depth: 0,
        });

        controller.tick(&sampler).await;

        assert_eq!(controller.level().await, DegradationLevel::Degraded);
        match controller.advise().await {
            Advisory::Delay(duration) => assert_eq!(duration, Duration::from_millis(1000)),
            other => panic!("expected Delay advisory, got {other:?}"),
        }

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "degradation.transition");
    }

    #[tokio::test]
    async fn critical_with_reject_on_critical_advises_reject() {
        let mut config = DegradationConfig::default();
        config.debounce_ms = 0;
        config.reject_on_critical = true;
        let controller = DegradationController::new(config, EventBus::new());
        let sampler = FixedResourceSampler::new(ResourceSample {
            cpu_percent: 95.0,
            memory_percent: 0.0,
            queue_depth: 0,
        });

        controller.tick(&sampler).await;

        assert_eq!(controller.level().await, DegradationLevel::Critical);
        assert_eq!(controller.advise().await, Advisory::Reject);
    }

    #[tokio::test]
    async fn transition_below_debounce_interval_does_not_commit() {
        let config = DegradationConfig::default(); // debounce_ms = 30_000
        let controller = DegradationController::new(config, EventBus::new());
        let sampler = FixedResourceSampler::new(ResourceSample {
            cpu_percent: 95.0,
            memory_percent: 0.0,
            queue_depth: 0,
        });

        controller.tick(&sampler).await;

        assert_eq!(controller.level().await, DegradationLevel::Normal);
        assert_eq!(controller.advise().await, Advisory::Proceed);
    }
}
