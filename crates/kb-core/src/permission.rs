//! The permission lattice a plugin manifest declares and C1 evaluates against.

use serde::{Deserialize, Serialize};

/// Filesystem read/write glob allow-lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsPermissions {
    /// Glob patterns the plugin may read from, relative to its workspace lease.
    #[serde(default)]
    pub read: Vec<String>,
    /// Glob patterns the plugin may write to, relative to its workspace lease.
    #[serde(default)]
    pub write: Vec<String>,
}

/// Outbound network fetch allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPermissions {
    /// Host or host:port patterns the plugin may fetch from.
    #[serde(default)]
    pub fetch: Vec<String>,
}

/// Environment variable read allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvPermissions {
    /// Environment variable name patterns the plugin may read.
    #[serde(default)]
    pub read: Vec<String>,
}

/// Cross-plugin invoke allow/deny lists, consulted by C8 in deny-before-allow
/// order: `deny` patterns always win over `routes`/`plugins` matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokePermissions {
    /// Route patterns (`METHOD /path`) the plugin may invoke on itself or peers.
    #[serde(default)]
    pub routes: Vec<String>,
    /// Plugin id (optionally `@id@version`) patterns the plugin may target.
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Patterns that are always denied regardless of `routes`/`plugins` matches.
    #[serde(default)]
    pub deny: Vec<String>,
}

/// Platform-surface capability flags: these are plain booleans, not globs,
/// because the platform surface is a fixed small set of named operations
/// rather than an open namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformPermissions {
    /// May enqueue or inspect platform workflows.
    #[serde(default)]
    pub workflows: bool,
    /// May enqueue or inspect platform jobs.
    #[serde(default)]
    pub jobs: bool,
    /// May request or restore workspace snapshots.
    #[serde(default)]
    pub snapshot: bool,
    /// May inspect its own execution metadata (queue depth, worker stats).
    #[serde(default)]
    pub execution: bool,
}

/// The full permission lattice declared by a plugin manifest.
///
/// This is evaluated by C1 on every filesystem, network, environment, invoke,
/// and platform-surface access a handler attempts; nothing here is enforced
/// implicitly by possessing the struct. See [`crate::error::ErrorCode::PermissionDenied`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    /// Filesystem access permissions.
    #[serde(default)]
    pub fs: FsPermissions,
    /// Network access permissions.
    #[serde(default)]
    pub network: NetworkPermissions,
    /// Environment variable access permissions.
    #[serde(default)]
    pub env: EnvPermissions,
    /// Cross-plugin invoke permissions.
    #[serde(default)]
    pub invoke: InvokePermissions,
    /// Platform-surface permissions.
    #[serde(default)]
    pub platform: PlatformPermissions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spec_denies_everything() {
        let spec = PermissionSpec::default();
        assert!(spec.fs.read.is_empty());
        assert!(spec.fs.write.is_empty());
        assert!(spec.network.fetch.is_empty());
        assert!(spec.invoke.deny.is_empty());
        assert!(!spec.platform.workflows);
    }

    #[test]
    fn deserializes_partial_manifest_json() {
        let json = r#"{ "fs": { "read": ["./data/**"] } }"#;
        let spec: PermissionSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.fs.read, vec!["./data/**".to_string()]);
        assert!(spec.fs.write.is_empty());
        assert!(spec.network.fetch.is_empty());
    }
}
