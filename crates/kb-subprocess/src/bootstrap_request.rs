//! The payload handed to a bootstrap child via a request file rather than
//! argv, per spec §4.6 step 3 ("command-line carries no user input").

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kb_core::descriptor::PluginContextDescriptor;
use kb_core::HandlerRef;

/// Everything a bootstrap child needs to resolve a handler and run one
/// execution, serialized to a temp file whose path is the only thing
/// passed on the child's command line (besides the socket path).
///
/// `plugin_id` + `handler_ref` (+ optional `export_name` override) are kept
/// as the same triple [`kb_handler::HandlerRegistry::resolve`] takes, so a
/// bootstrap child resolves its one handler exactly the way the in-process
/// backend does — both sides of the process boundary share one resolution
/// path (per `SPEC_FULL.md`'s handler contract note).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapRequest {
    /// The invocation descriptor (IPC-safe form of the context).
    pub descriptor: PluginContextDescriptor,
    /// The plugin id the handler is registered under.
    pub plugin_id: String,
    /// Absolute path to the plugin's root directory.
    pub plugin_root: PathBuf,
    /// The manifest-declared handler reference.
    pub handler_ref: HandlerRef,
    /// Override for the exported function name, mirrors
    /// `ExecutionRequest::export_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
    /// The handler's input payload.
    pub input: Value,
    /// Working directory for the execution.
    pub cwd: PathBuf,
    /// Output directory for the execution.
    pub outdir: PathBuf,
    /// Per-execution token the child echoes back on its first `execute`
    /// reply, per spec §4.6 step 3's "optional auth token".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}
