//! The CLI front-end's only contract with the execution subsystem: submit
//! an already-built [`ExecutionRequest`] and get back an [`ExecutionResult`].
//!
//! Grounded on `astrid-kernel/src/server/inbound_router.rs`'s shape of a
//! thin front-end that resolves a caller to a live backend and hands off,
//! narrowed here to a single façade call since command mounting and argv
//! parsing are out of scope for this core.

use std::sync::Arc;

use kb_core::{ExecutionRequest, ExecutionResult};
use kb_exec::ExecutionFacade;
use tokio_util::sync::CancellationToken;

/// Binds a [`ExecutionFacade`] to the CLI front-end's submission contract.
pub struct CliHost {
    facade: Arc<ExecutionFacade>,
}

impl CliHost {
    /// Wrap a façade already wired to its backend/workspace/degradation
    /// collaborators.
    #[must_use]
    pub fn new(facade: Arc<ExecutionFacade>) -> Self {
        Self { facade }
    }

    /// Run `request` to completion, cancellable via `cancellation`.
    pub async fn submit(&self, request: ExecutionRequest, cancellation: CancellationToken) -> ExecutionResult {
        self.facade.execute(request, cancellation).await
    }
}
