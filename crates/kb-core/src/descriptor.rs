//! The descriptor that crosses the IPC boundary on every execution.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::host::HostType;
use crate::permission::PermissionSpec;

/// Points at the exported function a handler manifest resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRef {
    /// Path to the handler module file, relative to the plugin root.
    pub file: String,
    /// Name of the exported function within that file.
    pub export: String,
}

/// The host-specific context a request arrived with, carried verbatim
/// through to the handler so it can branch on call origin without the
/// runtime having to model every front-end's quirks generically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hostType", rename_all = "camelCase")]
pub enum HostContext {
    /// Invoked from the command-line front-end.
    Cli {
        /// Raw argv tokens after the subcommand.
        argv: Vec<String>,
        /// Parsed `--flag=value` / `--flag value` pairs.
        #[serde(default)]
        flags: HashMap<String, String>,
    },
    /// Invoked over the REST front-end.
    Rest {
        /// HTTP method of the inbound request.
        method: String,
        /// Request path, including any path parameters already extracted.
        path: String,
        /// Inbound request headers, lower-cased keys.
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// Invoked over a WebSocket connection.
    Ws {
        /// The logical channel path the message arrived on.
        channel: String,
        /// The connection id in C11's registry.
        connection_id: String,
    },
    /// Invoked as a step of a platform workflow.
    Workflow {
        /// The workflow instance id.
        workflow_id: String,
        /// The step id within that workflow.
        step_id: String,
    },
    /// Invoked by an inbound webhook delivery.
    Webhook {
        /// The webhook source identifier (provider name or registered id).
        source: String,
        /// Request headers from the webhook delivery, lower-cased keys.
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// Invoked as a scheduled or queued platform job.
    Job {
        /// The job id.
        job_id: String,
    },
    /// Invoked on a cron schedule.
    Cron {
        /// The cron schedule expression that triggered this run.
        schedule: String,
    },
}

impl HostContext {
    /// The [`HostType`] this context corresponds to.
    #[must_use]
    pub fn host_type(&self) -> HostType {
        match self {
            HostContext::Cli { .. } => HostType::Cli,
            HostContext::Rest { .. } => HostType::Rest,
            HostContext::Ws { .. } => HostType::Ws,
            HostContext::Workflow { .. } => HostType::Workflow,
            HostContext::Webhook { .. } => HostType::Webhook,
            HostContext::Job { .. } => HostType::Job,
            HostContext::Cron { .. } => HostType::Cron,
        }
    }
}

/// Identity and tracing metadata for a single plugin execution, assembled
/// by C3 and carried unchanged across the IPC boundary to the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginContextDescriptor {
    /// Which front-end originated this execution.
    pub host_type: HostType,
    /// The plugin being invoked.
    pub plugin_id: String,
    /// The resolved plugin version.
    pub plugin_version: String,
    /// Request id, stable for the lifetime of the originating request.
    pub request_id: String,
    /// Trace id, stable across an entire cross-plugin call chain.
    pub trace_id: String,
    /// Span id, unique to this hop in the call chain.
    pub span_id: String,
    /// Invocation id, unique to this handler call.
    pub invocation_id: String,
    /// Execution id, unique to this façade call.
    pub execution_id: String,
    /// The handler being invoked within the plugin.
    pub handler_id: String,
    /// The CLI command id, when this execution originated from a CLI command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    /// The tenant this execution runs on behalf of, when multi-tenancy applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// The permission lattice resolved for this plugin.
    pub permissions: PermissionSpec,
    /// Host-specific context for this execution.
    pub host_context: HostContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_descriptor() -> PluginContextDescriptor {
        PluginContextDescriptor {
            host_type: HostType::Cli,
            plugin_id: "demo-plugin".into(),
            plugin_version: "1.0.0".into(),
            request_id: "req-1".into(),
            trace_id: "trace-1".into(),
            span_id: "span-1".into(),
            invocation_id: "inv-1".into(),
            execution_id: "exec-1".into(),
            handler_id: "handlers/main.ts#run".into(),
            command_id: Some("demo:run".into()),
            tenant_id: None,
            permissions: PermissionSpec::default(),
            host_context: HostContext::Cli {
                argv: vec!["--verbose".into()],
                flags: HashMap::new(),
            },
        }
    }

    #[test]
    fn host_context_host_type_matches_descriptor_tag() {
        let descriptor = sample_descriptor();
        assert_eq!(descriptor.host_context.host_type(), HostType::Cli);
    }

    #[test]
    fn round_trips_through_json() {
        let descriptor = sample_descriptor();
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: PluginContextDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor, back);
    }
}
