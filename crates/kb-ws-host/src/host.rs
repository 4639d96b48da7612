//! The WS front-end's contract with the execution subsystem (`submit`) and
//! with C11's connection registry (`connect`/`disconnect`/`send`/
//! `broadcast`), per spec §6/§9's lifecycle events `connect, message,
//! disconnect, error`.

use std::sync::Arc;

use kb_connection_registry::{ConnectionRegistry, DeliveryError, WsMessage};
use kb_core::{ExecutionRequest, ExecutionResult};
use kb_exec::ExecutionFacade;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Binds a [`ExecutionFacade`] and a [`ConnectionRegistry`] to the WS
/// front-end's submission and connection-lifecycle contracts.
pub struct WsHost {
    facade: Arc<ExecutionFacade>,
    connections: ConnectionRegistry,
}

impl WsHost {
    /// Wrap a façade and the registry tracking this process's live WS
    /// connections.
    #[must_use]
    pub fn new(facade: Arc<ExecutionFacade>, connections: ConnectionRegistry) -> Self {
        Self { facade, connections }
    }

    /// Run `request` to completion, cancellable via `cancellation`.
    pub async fn submit(&self, request: ExecutionRequest, cancellation: CancellationToken) -> ExecutionResult {
        self.facade.execute(request, cancellation).await
    }

    /// Register a newly accepted connection, per the `connect` lifecycle
    /// event — called from the WS accept loop only (C11's single-owner
    /// discipline).
    pub fn connect(&self, channel: &str, connection_id: &str) -> mpsc::UnboundedReceiver<WsMessage> {
        self.connections.register(channel, connection_id)
    }

    /// Remove a connection, per the `disconnect`/`error` lifecycle events.
    pub fn disconnect(&self, channel: &str, connection_id: &str) {
        self.connections.unregister(channel, connection_id);
    }

    /// Deliver `message` to exactly one connection.
    pub fn send(&self, channel: &str, connection_id: &str, message: WsMessage) -> Result<(), DeliveryError> {
        self.connections.send_to(channel, connection_id, message)
    }

    /// Deliver `message` to every connection on `channel`.
    pub fn broadcast(&self, channel: &str, message: WsMessage) -> usize {
        self.connections.broadcast(channel, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kb_core::descriptor::{HandlerRef, HostContext, PluginContextDescriptor};
    use kb_core::error::PluginError;
    use kb_core::permission::PermissionSpec;
    use kb_core::HostType;
    use kb_exec::{
        AlwaysActiveRegistry, BackendOutcome, ExecutionBackend, LocalWorkspaceManager, NoopDegradationAdvisor,
    };

    struct EchoBackend;

    #[async_trait]
    impl ExecutionBackend for EchoBackend {
        fn name(&self) -> &'static str {
            "in-process"
        }

        async fn execute(
            &self,
            request: ExecutionRequest,
            _cancellation: CancellationToken,
        ) -> Result<BackendOutcome, PluginError> {
            Ok(BackendOutcome {
                data: request.input,
                execution_meta: serde_json::json!({}),
            })
        }
    }

    fn sample_request() -> ExecutionRequest {
        ExecutionRequest {
            execution_id: "exec-1".into(),
            descriptor: PluginContextDescriptor {
                host_type: HostType::Ws,
                plugin_id: "demo".into(),
                plugin_version: "1.0.0".into(),
                request_id: "req-1".into(),
                trace_id: "trace-1".into(),
                span_id: "span-1".into(),
                invocation_id: "inv-1".into(),
                execution_id: "exec-1".into(),
                handler_id: "handlers/main.ts#run".into(),
                command_id: None,
                tenant_id: None,
                permissions: PermissionSpec::default(),
                host_context: HostContext::Ws {
                    channel: "room-1".into(),
                    connection_id: "conn-a".into(),
                },
            },
            plugin_root: "plugins/demo".into(),
            handler_ref: HandlerRef {
                file: "handlers/main.ts".into(),
                export: "run".into(),
            },
            input: serde_json::json!({"a": 1}),
            workspace: "/t/workspace".into(),
            timeout_ms: None,
            target: None,
            export_name: None,
            invoke_chain: None,
        }
    }

    fn host() -> WsHost {
        let facade = Arc::new(ExecutionFacade::new(
            Arc::new(EchoBackend),
            Arc::new(LocalWorkspaceManager),
            Arc::new(NoopDegradationAdvisor),
            Arc::new(AlwaysActiveRegistry),
        ));
        WsHost::new(facade, ConnectionRegistry::new())
    }

    #[tokio::test]
    async fn submit_delegates_to_the_facade() {
        let host = host();
        let result = host.submit(sample_request(), CancellationToken::new()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn connect_then_send_delivers_on_the_registered_receiver() {
        let host = host();
        let mut rx = host.connect("room-1", "conn-a");
        let message = WsMessage::new("message", None, 0);
        host.send("room-1", "conn-a", message.clone()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), message);
    }

    #[test]
    fn disconnect_removes_the_connection() {
        let host = host();
        let _rx = host.connect("room-1", "conn-a");
        host.disconnect("room-1", "conn-a");
        let err = host.send("room-1", "conn-a", WsMessage::new("message", None, 0)).unwrap_err();
        assert!(matches!(err, DeliveryError::ChannelNotFound(_)));
    }
}
