//! Shared no-op platform/UI doubles and context builders for unit tests
//! across the workspace.
//!
//! Grounded on the teacher's `AllowAllGate`/`DenyAllGate` no-op pattern
//! (`astrid-capsule/src/security.rs`), generalized here to a single
//! `sample_context` builder so every crate's test module can construct a
//! realistic [`PluginContext`] without re-deriving C3's assembly logic.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use std::collections::HashMap;
use std::path::PathBuf;

use kb_context::factory::{build, ContextInputs};
use kb_context::PluginContext;
use kb_core::descriptor::{HostContext, PluginContextDescriptor};
use kb_core::{HostType, PermissionSpec};
use kb_platform::NoopPlatformAdapter;

/// Build a [`PluginContext`] suitable for unit tests: CLI host, empty
/// permissions, `cwd`/`outdir` under `/t`, a [`NoopPlatformAdapter`], and
/// fresh trace identifiers.
#[must_use]
pub fn sample_context(plugin_id: &str, plugin_version: &str) -> PluginContext {
    sample_context_with_permissions(plugin_id, plugin_version, PermissionSpec::default())
}

/// Same as [`sample_context`] but with a caller-supplied permission lattice.
#[must_use]
pub fn sample_context_with_permissions(
    plugin_id: &str,
    plugin_version: &str,
    permissions: PermissionSpec,
) -> PluginContext {
    let descriptor = PluginContextDescriptor {
        host_type: HostType::Cli,
        plugin_id: plugin_id.to_string(),
        plugin_version: plugin_version.to_string(),
        request_id: String::new(),
        trace_id: String::new(),
        span_id: String::new(),
        invocation_id: String::new(),
        execution_id: String::new(),
        handler_id: "handlers/main.ts#run".to_string(),
        command_id: None,
        tenant_id: None,
        permissions,
        host_context: HostContext::Cli {
            argv: vec![],
            flags: HashMap::new(),
        },
    };

    let inputs = ContextInputs {
        platform_adapter: std::sync::Arc::new(NoopPlatformAdapter),
        cwd: PathBuf::from("/t"),
        outdir: None,
        signal: None,
        http: reqwest::Client::new(),
    };

    build(&descriptor, inputs).context
}
