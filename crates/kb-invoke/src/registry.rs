//! The manifest/route lookup seam C8 calls to resolve a parsed target into
//! something it can hand off to the execution façade.
//!
//! Concrete manifest parsing and plugin discovery live outside this crate's
//! scope (this workspace is the execution platform, not a plugin registry
//! implementation) — the same "define the seam, let the deployment wire a
//! concrete adapter in" shape `kb-exec::WorkspaceManager` and
//! `kb-platform::PlatformAdapter` use.

use async_trait::async_trait;
use kb_core::{HandlerRef, PermissionSpec};

/// What the registry knows about a resolved target plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlugin {
    /// Absolute path to the plugin's root directory.
    pub plugin_root: String,
    /// The concrete version resolved from the request (`"latest"` or a
    /// semver range resolves to one specific version here).
    pub resolved_version: String,
    /// The workspace identifier this plugin should execute against.
    pub workspace: String,
    /// The target plugin's own permission lattice — the callee's, not the
    /// caller's, since the handed-off execution runs under it.
    pub permissions: PermissionSpec,
}

/// Resolves invoke targets to manifests and routes.
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    /// Resolve `plugin_id`/`plugin_version` to a concrete, loadable plugin.
    /// `None` if no such plugin (or version) is registered.
    async fn resolve_plugin(&self, plugin_id: &str, plugin_version: &str) -> Option<ResolvedPlugin>;

    /// Resolve `method`/`path` on the given plugin to a handler. `None` if
    /// the plugin exposes no such route.
    async fn resolve_route(
        &self,
        plugin_id: &str,
        resolved_version: &str,
        method: &str,
        path: &str,
    ) -> Option<HandlerRef>;
}

/// A registry that knows no plugins. The broker's default when no concrete
/// registry has been wired in (every invoke then fails `PluginNotFound`,
/// same effect as an empty manifest set).
pub struct EmptyPluginRegistry;

#[async_trait]
impl PluginRegistry for EmptyPluginRegistry {
    async fn resolve_plugin(&self, _plugin_id: &str, _plugin_version: &str) -> Option<ResolvedPlugin> {
        None
    }

    async fn resolve_route(
        &self,
        _plugin_id: &str,
        _resolved_version: &str,
        _method: &str,
        _path: &str,
    ) -> Option<HandlerRef> {
        None
    }
}
