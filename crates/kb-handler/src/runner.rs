//! The in-process runner: invoke a resolved handler, inject standard
//! metadata, and drain the cleanup stack, per spec §4.5.

use std::time::Instant;

use serde_json::Value;

use kb_context::{CleanupStack, PluginContext};
use kb_core::error::PluginError;

use crate::metadata::inject_standard_metadata;
use crate::output::HandlerOutput;
use crate::registry::Handler;

/// Run `handler.execute(context, input)`, then drain `cleanup` LIFO
/// regardless of outcome, then inject standard metadata into the result.
///
/// Cleanup errors are logged by [`CleanupStack::drain`] and never alter the
/// handler's own result — this mirrors spec §4.3/§4.5's guarantee that a
/// cleanup failure cannot mask or replace the primary outcome.
pub async fn run(
    handler: &dyn Handler,
    context: &PluginContext,
    input: Value,
    cleanup: &mut CleanupStack,
) -> Result<HandlerOutput, PluginError> {
    let started = Instant::now();
    let result = handler.execute(context, input).await;
    cleanup.drain().await;

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    result.map(|mut output| {
        output.meta = Some(inject_standard_metadata(context, output.meta, duration_ms));
        output
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kb_core::error::ErrorCode;
    use kb_test::sample_context;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct SucceedingHandler;

    #[async_trait]
    impl Handler for SucceedingHandler {
        async fn execute(
            &self,
            _context: &PluginContext,
            input: Value,
        ) -> Result<HandlerOutput, PluginError> {
            Ok(HandlerOutput {
                exit_code: Some(0),
                data: Some(input),
                meta: Some(serde_json::json!({ "custom": "value" })),
            })
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl Handler for FailingHandler {
        async fn execute(
            &self,
            _context: &PluginContext,
            _input: Value,
        ) -> Result<HandlerOutput, PluginError> {
            Err(PluginError::new(ErrorCode::InternalError, "handler blew up"))
        }
    }

    #[tokio::test]
    async fn successful_handler_gets_standard_metadata_injected() {
        let context = sample_context("demo", "1.0.0");
        let mut cleanup = CleanupStack::new();
        let output = run(
            &SucceedingHandler,
            &context,
            serde_json::json!({"ok": true}),
            &mut cleanup,
        )
        .await
        .unwrap();

        let meta = output.meta.unwrap();
        assert_eq!(meta["pluginId"], "demo");
        assert_eq!(meta["custom"], "value");
        assert!(meta["duration"].as_u64().is_some());
    }

    #[tokio::test]
    async fn cleanup_runs_even_when_handler_fails() {
        let context = sample_context("demo", "1.0.0");
        let mut cleanup = CleanupStack::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        cleanup.push(move || async move {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let result = run(&FailingHandler, &context, Value::Null, &mut cleanup).await;
        assert!(result.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(cleanup.is_empty());
    }

    #[tokio::test]
    async fn cleanup_runs_even_when_handler_succeeds() {
        let context = sample_context("demo", "1.0.0");
        let mut cleanup = CleanupStack::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        cleanup.push(move || async move {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let _ = run(&SucceedingHandler, &context, Value::Null, &mut cleanup).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
