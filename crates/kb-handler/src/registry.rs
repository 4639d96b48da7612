//! Handler resolution: a `{file, export}` pair to a callable `execute`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use kb_context::PluginContext;
use kb_core::error::{ErrorCode, PluginError};
use kb_core::HandlerRef;

use crate::output::HandlerOutput;

/// A resolved plugin handler: the callable behind a manifest's `handler`
/// reference.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run `execute(context, input)`.
    async fn execute(
        &self,
        context: &PluginContext,
        input: Value,
    ) -> Result<HandlerOutput, PluginError>;
}

/// Resolves a plugin id + [`HandlerRef`] to a registered [`Handler`].
///
/// Per spec §9's "Cyclic plugin imports" design note: handler modules are
/// enumerated from manifests ahead of time rather than dynamically resolved
/// at call time, so this is a plain lookup table rather than a module
/// loader. A deployment populates it once at startup from every manifest's
/// `handler` references.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String, String), Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `plugin_id` + its `{file, export}` pair.
    pub fn register(
        &mut self,
        plugin_id: impl Into<String>,
        handler_ref: &HandlerRef,
        handler: Arc<dyn Handler>,
    ) {
        self.handlers.insert(
            (
                plugin_id.into(),
                handler_ref.file.clone(),
                handler_ref.export.clone(),
            ),
            handler,
        );
    }

    /// Resolve `plugin_id` + `handler_ref` (optionally with an export-name
    /// override, as C8 supplies when a route maps to a different export
    /// than the manifest's default), or `HandlerNotFound`.
    pub fn resolve(
        &self,
        plugin_id: &str,
        handler_ref: &HandlerRef,
        export_override: Option<&str>,
    ) -> Result<Arc<dyn Handler>, PluginError> {
        let export = export_override.unwrap_or(&handler_ref.export);
        let key = (plugin_id.to_string(), handler_ref.file.clone(), export.to_string());
        self.handlers.get(&key).cloned().ok_or_else(|| {
            PluginError::new(
                ErrorCode::HandlerNotFound,
                format!("no handler registered for {plugin_id}:{}#{export}", handler_ref.file),
            )
            .with_details(serde_json::json!({
                "pluginId": plugin_id,
                "file": handler_ref.file,
                "export": export,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_test::sample_context;

    struct EchoHandler;

    #[async_trait]
    impl Handler for EchoHandler {
        async fn execute(
            &self,
            _context: &PluginContext,
            input: Value,
        ) -> Result<HandlerOutput, PluginError> {
            Ok(HandlerOutput {
                exit_code: None,
                data: Some(input),
                meta: None,
            })
        }
    }

    #[tokio::test]
    async fn resolves_registered_handler() {
        let mut registry = HandlerRegistry::new();
        let handler_ref = HandlerRef {
            file: "handlers/main.ts".into(),
            export: "run".into(),
        };
        registry.register("demo", &handler_ref, Arc::new(EchoHandler));

        let handler = registry.resolve("demo", &handler_ref, None).unwrap();
        let context = sample_context("demo", "1.0.0");
        let output = handler
            .execute(&context, serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(output.data.unwrap()["a"], 1);
    }

    #[test]
    fn unregistered_handler_is_not_found() {
        let registry = HandlerRegistry::new();
        let handler_ref = HandlerRef {
            file: "handlers/missing.ts".into(),
            export: "run".into(),
        };
        let err = registry.resolve("demo", &handler_ref, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::HandlerNotFound);
    }

    #[test]
    fn export_override_resolves_a_different_registration() {
        let mut registry = HandlerRegistry::new();
        let handler_ref = HandlerRef {
            file: "handlers/main.ts".into(),
            export: "run".into(),
        };
        let alt_ref = HandlerRef {
            export: "alt".into(),
            ..handler_ref.clone()
        };
        registry.register("demo", &alt_ref, Arc::new(EchoHandler));

        assert!(registry.resolve("demo", &handler_ref, Some("alt")).is_ok());
        assert!(registry.resolve("demo", &handler_ref, None).is_err());
    }
}
