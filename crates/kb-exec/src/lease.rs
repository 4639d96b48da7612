//! `WorkspaceLease`: `{workspaceId, cwd, pluginRoot, release()}` (spec §3),
//! acquired before execution and released in a guaranteed-release scope
//! after completion (spec §4.10 step 7).
//!
//! Grounded on the teacher's `astrid-workspace` boundary/worktree model
//! (`WorkspaceBoundary`, `ActiveWorktree`): a lease is the same shape —
//! a scoped claim on a root path, with deterministic release — generalized
//! here to an injectable `WorkspaceManager` so a remote workspace backend
//! can be swapped in without touching C10.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use kb_core::error::{ErrorCode, PluginError};

/// A scoped claim on a workspace, live for the duration of one execution.
///
/// For the local workspace manager this is an identity mapping (spec §3);
/// for a remote workspace manager, acquiring or releasing one may fail or
/// stall, surfaced as `WorkspaceError`/`WorkspaceNotAvailable`.
#[derive(Debug, Clone)]
pub struct WorkspaceLease {
    /// The workspace identifier this lease was acquired for.
    pub workspace_id: String,
    /// The working directory the execution should run with.
    pub cwd: PathBuf,
    /// The plugin's root directory, scoped within `cwd`'s workspace.
    pub plugin_root: PathBuf,
}

/// Acquires and releases [`WorkspaceLease`]s. Implementations may be as
/// trivial as an identity mapping (`LocalWorkspaceManager`) or may proxy to
/// a remote workspace registry that can fail or stall.
#[async_trait]
pub trait WorkspaceManager: Send + Sync {
    /// Acquire a lease for `workspace_id`, locating `plugin_root` beneath it.
    async fn acquire(
        &self,
        workspace_id: &str,
        plugin_root: &str,
    ) -> Result<WorkspaceLease, PluginError>;

    /// Release a previously acquired lease. Best-effort: failures are
    /// logged, never surfaced as the execution's own result (spec §4.10
    /// step 7, "swallow cleanup errors but record them on the logger").
    async fn release(&self, lease: &WorkspaceLease);
}

/// The identity-mapping workspace manager: `cwd` is the workspace id taken
/// as a local filesystem path, `pluginRoot` is joined beneath it.
pub struct LocalWorkspaceManager;

#[async_trait]
impl WorkspaceManager for LocalWorkspaceManager {
    async fn acquire(
        &self,
        workspace_id: &str,
        plugin_root: &str,
    ) -> Result<WorkspaceLease, PluginError> {
        let cwd = PathBuf::from(workspace_id);
        if !cwd.is_absolute() {
            return Err(PluginError::new(
                ErrorCode::WorkspaceNotAvailable,
                format!("workspace id '{workspace_id}' is not an absolute local path"),
            ));
        }
        let plugin_root_path = resolve_under(&cwd, plugin_root);
        Ok(WorkspaceLease {
            workspace_id: workspace_id.to_string(),
            cwd,
            plugin_root: plugin_root_path,
        })
    }

    async fn release(&self, lease: &WorkspaceLease) {
        // Identity mapping: nothing to release. A remote manager would
        // return the lease here; this is logged at debug level so the
        // guaranteed-release scope is visible in traces even when trivial.
        tracing::debug!(workspace_id = %lease.workspace_id, "released local workspace lease");
    }
}

fn resolve_under(cwd: &Path, plugin_root: &str) -> PathBuf {
    let candidate = Path::new(plugin_root);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        cwd.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_manager_resolves_plugin_root_under_cwd() {
        let manager = LocalWorkspaceManager;
        let lease = manager.acquire("/t/workspace", "plugins/demo").await.unwrap();
        assert_eq!(lease.cwd, PathBuf::from("/t/workspace"));
        assert_eq!(lease.plugin_root, PathBuf::from("/t/workspace/plugins/demo"));
    }

    #[tokio::test]
    async fn local_manager_rejects_relative_workspace_id() {
        let manager = LocalWorkspaceManager;
        let err = manager.acquire("relative/path", "plugins/demo").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::WorkspaceNotAvailable);
    }

    #[tokio::test]
    async fn absolute_plugin_root_overrides_cwd_join() {
        let manager = LocalWorkspaceManager;
        let lease = manager.acquire("/t/workspace", "/elsewhere/plugin").await.unwrap();
        assert_eq!(lease.plugin_root, PathBuf::from("/elsewhere/plugin"));
    }
}
