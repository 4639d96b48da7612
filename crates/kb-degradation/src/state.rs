//! The normal/degraded/critical finite-state machine and its debounce
//! bookkeeping, per spec §4.9.
//!
//! Grounded on `astrid-approval/src/budget.rs`'s threshold-crossing style
//! (compare a reading against a pair of configured limits, carry a small
//! amount of state between calls) adapted from a one-shot budget check into
//! a continuously-resampled, hysteretic, debounced FSM.

use std::time::{Duration, Instant};

use kb_config::DegradationConfig;

use crate::sample::ResourceSample;

/// The controller's three operating levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DegradationLevel {
    /// No throttling; submissions proceed immediately.
    Normal,
    /// Submissions proceed after `degradedDelay`.
    Degraded,
    /// Submissions are delayed by `criticalDelay`, or rejected outright if
    /// `rejectOnCritical` is set.
    Critical,
}

impl DegradationLevel {
    /// Wire/log-friendly name, e.g. for the published transition event.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DegradationLevel::Normal => "normal",
            DegradationLevel::Degraded => "degraded",
            DegradationLevel::Critical => "critical",
        }
    }
}

/// Given the currently *committed* level and a fresh sample, compute the
/// level the sample alone indicates — before debouncing.
///
/// Entry into `degraded`/`critical` uses the upper thresholds and applies
/// regardless of the current level. Recovery toward `normal` is hysteretic:
/// once a level worse than `normal` is committed, the sample must fall below
/// the (lower) recovery thresholds before `normal` is indicated again, not
/// merely below the entry thresholds — otherwise a reading that oscillates
/// around the entry threshold would flap the state on every sample.
#[must_use]
pub fn indicated_level(
    current: DegradationLevel,
    sample: &ResourceSample,
    config: &DegradationConfig,
) -> DegradationLevel {
    let [cpu_degraded, cpu_critical] = config.cpu_thresholds;
    let [mem_degraded, mem_critical] = config.memory_thresholds;
    let [queue_degraded, queue_critical] = config.queue_thresholds;
    let [recovery_cpu, recovery_mem, recovery_queue] = config.recovery_thresholds;

    if sample.cpu_percent >= cpu_critical
        || sample.memory_percent >= mem_critical
        || sample.queue_depth >= queue_critical
    {
        return DegradationLevel::Critical;
    }

    if sample.cpu_percent >= cpu_degraded
        || sample.memory_percent >= mem_degraded
        || sample.queue_depth >= queue_degraded
    {
        return DegradationLevel::Degraded;
    }

    match current {
        DegradationLevel::Normal => DegradationLevel::Normal,
        DegradationLevel::Degraded | DegradationLevel::Critical => {
            let recovered = sample.cpu_percent <= recovery_cpu
                && sample.memory_percent <= recovery_mem
                && (sample.queue_depth as f64) <= recovery_queue;
            if recovered {
                DegradationLevel::Normal
            } else {
                DegradationLevel::Degraded
            }
        }
    }
}

/// Tracks the committed level plus a pending, not-yet-stable target level
/// and how long it has been indicated — the debounce timer of spec §4.9.
#[derive(Debug)]
pub struct DebouncedState {
    committed: DegradationLevel,
    pending: Option<(DegradationLevel, Instant)>,
}

impl DebouncedState {
    /// Start the FSM in `normal` with no pending transition.
    #[must_use]
    pub fn new() -> Self {
        Self {
            committed: DegradationLevel::Normal,
            pending: None,
        }
    }

    /// The currently committed level.
    #[must_use]
    pub fn committed(&self) -> DegradationLevel {
        self.committed
    }

    /// Feed one sample in at `now`. Returns `Some(new_level)` if this sample
    /// caused a debounced transition to commit, `None` otherwise.
    pub fn observe(
        &mut self,
        sample: &ResourceSample,
        config: &DegradationConfig,
        now: Instant,
    ) -> Option<DegradationLevel> {
        let indicated = indicated_level(self.committed, sample, config);

        if indicated == self.committed {
            self.pending = None;
            return None;
        }

        match self.pending {
            Some((level, since)) if level == indicated => {
                if now.duration_since(since) >= Duration::from_millis(config.debounce_ms) {
                    self.committed = indicated;
                    self.pending = None;
                    Some(indicated)
                } else {
                    None
                }
            }
            _ => {
                self.pending = Some((indicated, now));
                None
            }
        }
    }
}

impl Default for DebouncedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f64, mem: f64, queue: u64) -> ResourceSample {
        ResourceSample {
            cpu_percent: cpu,
            memory_percent: mem,
            queue_depth: queue,
        }
    }

    #[test]
    fn idle_sample_indicates_normal() {
        let config = DegradationConfig::default();
        let level = indicated_level(DegradationLevel::Normal, &sample(5.0, 5.0, 0), &config);
        assert_eq!(level, DegradationLevel::Normal);
    }

    #[test]
    fn cpu_above_degraded_threshold_indicates_degraded() {
        let config = DegradationConfig::default();
        let level = indicated_level(DegradationLevel::Normal, &sample(75.0, 5.0, 0), &config);
        assert_eq!(level, DegradationLevel::Degraded);
    }

    #[test]
    fn queue_above_critical_threshold_indicates_critical_even_from_normal() {
        let config = DegradationConfig::default();
        let level = indicated_level(DegradationLevel::Normal, &sample(0.0, 0.0, 600), &config);
        assert_eq!(level, DegradationLevel::Critical);
    }

    #[test]
    fn recovery_from_degraded_requires_dropping_below_recovery_threshold() {
        let config = DegradationConfig::default();
        // Below the degraded-entry threshold (70) but above the recovery
        // threshold (50) - should stay degraded, not snap back to normal.
        let level = indicated_level(DegradationLevel::Degraded, &sample(60.0, 0.0, 0), &config);
        assert_eq!(level, DegradationLevel::Degraded);

        let level = indicated_level(DegradationLevel::Degraded, &sample(40.0, 0.0, 0), &config);
        assert_eq!(level, DegradationLevel::Normal);
    }

    #[test]
    fn debounce_requires_the_indicated_level_to_hold_for_the_full_interval() {
        let mut config = DegradationConfig::default();
        config.debounce_ms = 1000;
        let mut state = DebouncedState::new();
        let t0 = Instant::now();

        // First over-threshold sample starts the pending timer but does not
        // commit yet.
        assert_eq!(state.observe(&sample(95.0, 0.0, 0), &config, t0), None);
        assert_eq!(state.committed(), DegradationLevel::Normal);

        // Still within the debounce window.
        let half_way = t0 + Duration::from_millis(500);
        assert_eq!(state.observe(&sample(95.0, 0.0, 0), &config, half_way), None);
        assert_eq!(state.committed(), DegradationLevel::Normal);

        // Past the debounce window - now it commits.
        let past_window = t0 + Duration::from_millis(1001);
        assert_eq!(
            state.observe(&sample(95.0, 0.0, 0), &config, past_window),
            Some(DegradationLevel::Critical)
        );
        assert_eq!(state.committed(), DegradationLevel::Critical);
    }

    #[test]
    fn a_reading_that_drops_back_before_debounce_elapses_resets_the_pending_timer() {
        let mut config = DegradationConfig::default();
        config.debounce_ms = 1000;
        let mut state = DebouncedState::new();
        let t0 = Instant::now();

        assert_eq!(state.observe(&sample(95.0, 0.0, 0), &config, t0), None);

        // Drops back to normal before the debounce window elapses - pending
        // is cleared.
        let recovered_at = t0 + Duration::from_millis(200);
        assert_eq!(state.observe(&sample(5.0, 0.0, 0), &config, recovered_at), None);

        // Indicated critical again afterwards - the timer restarts from here,
        // so this alone (900ms later, short of the 1000ms window since the
        // *new* pending start) must not commit.
        let reindicated_at = recovered_at + Duration::from_millis(900);
        assert_eq!(state.observe(&sample(95.0, 0.0, 0), &config, reindicated_at), None);
        assert_eq!(state.committed(), DegradationLevel::Normal);
    }
}
