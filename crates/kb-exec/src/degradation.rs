//! The advisory contract C9 feeds into the façade's admission path (spec
//! §4.9 "Advisory output consumed by C7" — the façade consults the same
//! advisory before dispatching to *any* backend, not only the pool).

use std::time::Duration;

use async_trait::async_trait;

/// What the degradation controller advises for a new admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    /// No delay; admit immediately.
    Proceed,
    /// Admit after waiting `Duration`.
    Delay(Duration),
    /// Refuse admission outright (only returned in the `critical` state
    /// when `rejectOnCritical` is configured).
    Reject,
}

/// Consulted by C10 before running a request through a backend.
#[async_trait]
pub trait DegradationAdvisor: Send + Sync {
    /// The current advisory for a new admission.
    async fn advise(&self) -> Advisory;
}

/// An advisor that always proceeds immediately — the façade's default when
/// no degradation controller has been wired in (e.g. in tests).
pub struct NoopDegradationAdvisor;

#[async_trait]
impl DegradationAdvisor for NoopDegradationAdvisor {
    async fn advise(&self) -> Advisory {
        Advisory::Proceed
    }
}
