//! C1: the permission evaluator.
//!
//! Consulted by every C2 shim call before it touches the filesystem, issues
//! a fetch, or reads an environment variable. Construction compiles every
//! glob pattern exactly once; subsequent calls only ever match against the
//! pre-compiled set.

use std::path::{Path, PathBuf};

use kb_core::PermissionSpec;

use crate::deny_list::is_hard_denied;
use crate::env::env_read_allowed;
use crate::pattern::PatternSet;

/// Why a filesystem or network access was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDenial {
    /// The normalized path matched the hard-coded deny list.
    HardDenied {
        /// The normalized path that was denied.
        path: String,
    },
    /// The normalized path escaped `cwd` and every granted prefix.
    Escape {
        /// The normalized path that escaped.
        path: String,
    },
    /// No `fs.read`/`fs.write` grant matched the normalized path.
    NotGranted {
        /// The normalized path that was denied.
        path: String,
    },
    /// No `network.fetch` pattern matched the target host/URL.
    NetworkNotGranted {
        /// The host or URL that was denied.
        target: String,
    },
}

impl PermissionDenial {
    /// A human-readable message suitable for `PluginError::message`.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            PermissionDenial::HardDenied { path } => {
                format!("access to '{path}' is denied by the hard-coded deny list")
            }
            PermissionDenial::Escape { path } => {
                format!("'{path}' resolves outside the workspace and no grant covers it")
            }
            PermissionDenial::NotGranted { path } => {
                format!("'{path}' is not covered by any fs permission grant")
            }
            PermissionDenial::NetworkNotGranted { target } => {
                format!("'{target}' is not covered by any network.fetch grant")
            }
        }
    }

    /// The path or target string for `details.path`/`details.target`.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            PermissionDenial::HardDenied { path }
            | PermissionDenial::Escape { path }
            | PermissionDenial::NotGranted { path } => path,
            PermissionDenial::NetworkNotGranted { target } => target,
        }
    }
}

/// C1: evaluates a [`PermissionSpec`] against concrete filesystem, network,
/// and environment accesses for a single plugin execution.
///
/// One evaluator is built per execution from the descriptor's permission
/// lattice, the plugin's workspace `cwd`, and its output directory; it holds
/// no mutable state once constructed.
pub struct PermissionEvaluator {
    cwd: PathBuf,
    outdir: PathBuf,
    permissions: PermissionSpec,
    read_patterns: PatternSet,
    write_patterns: PatternSet,
    network_patterns: PatternSet,
}

impl PermissionEvaluator {
    /// Build an evaluator for one execution.
    ///
    /// `cwd` is always an implicit read grant; `outdir` is always an
    /// implicit write grant, per spec §4.1.
    #[must_use]
    pub fn new(permissions: PermissionSpec, cwd: PathBuf, outdir: PathBuf) -> Self {
        let read_patterns = PatternSet::compile(&permissions.fs.read);
        let write_patterns = PatternSet::compile(&permissions.fs.write);
        let network_patterns = PatternSet::compile(&permissions.network.fetch);
        Self {
            cwd,
            outdir,
            permissions,
            read_patterns,
            write_patterns,
            network_patterns,
        }
    }

    /// The `cwd` this evaluator resolves relative paths against.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolve `path` against `cwd` and normalize it (collapse `.`/`..`
    /// without touching the filesystem — the target need not exist yet for
    /// a write check).
    #[must_use]
    pub fn normalize(&self, path: &Path) -> PathBuf {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };
        normalize_lexically(&absolute)
    }

    /// Check a read access. Deterministic order per spec §4.1: hard deny,
    /// then allow-list match (including the implicit `cwd` grant).
    pub fn check_read(&self, path: &Path) -> Result<(), PermissionDenial> {
        let normalized = self.normalize(path);
        self.check_against(&normalized, &self.read_patterns, &self.cwd)
    }

    /// Check a write access. Deterministic order per spec §4.1: hard deny,
    /// then allow-list match (including the implicit `outdir` grant).
    pub fn check_write(&self, path: &Path) -> Result<(), PermissionDenial> {
        let normalized = self.normalize(path);
        self.check_against(&normalized, &self.write_patterns, &self.outdir)
    }

    fn check_against(
        &self,
        normalized: &Path,
        patterns: &PatternSet,
        implicit_prefix: &Path,
    ) -> Result<(), PermissionDenial> {
        if is_hard_denied(normalized) {
            return Err(PermissionDenial::HardDenied {
                path: normalized.to_string_lossy().into_owned(),
            });
        }

        let normalized_str = normalized.to_string_lossy();
        if normalized.starts_with(implicit_prefix) || patterns.matches(&normalized_str) {
            return Ok(());
        }

        if !normalized.starts_with(&self.cwd) {
            return Err(PermissionDenial::Escape {
                path: normalized_str.into_owned(),
            });
        }

        Err(PermissionDenial::NotGranted {
            path: normalized_str.into_owned(),
        })
    }

    /// Check a network fetch target against `network.fetch`. Empty grant
    /// list denies everything, per spec §4.1.
    pub fn check_fetch(&self, host_or_url: &str) -> Result<(), PermissionDenial> {
        if self.network_patterns.is_empty() {
            return Err(PermissionDenial::NetworkNotGranted {
                target: host_or_url.to_string(),
            });
        }
        if self.network_patterns.matches(host_or_url) {
            Ok(())
        } else {
            Err(PermissionDenial::NetworkNotGranted {
                target: host_or_url.to_string(),
            })
        }
    }

    /// Check whether `name` may be read from the environment.
    #[must_use]
    pub fn check_env_read(&self, name: &str) -> bool {
        env_read_allowed(&self.permissions.env, name)
    }

    /// The full permission lattice this evaluator was built from, for
    /// consumers (C8) that need `invoke`/`platform` sections directly.
    #[must_use]
    pub fn permissions(&self) -> &PermissionSpec {
        &self.permissions
    }
}

/// Lexically collapse `.`/`..` components without touching the filesystem.
///
/// A leading `..` beyond the path root is dropped rather than allowed to
/// climb past it — this is what prevents a `../../../etc/passwd`-style
/// input from resolving outside `cwd` before the allow-list check even runs.
fn normalize_lexically(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().last(), None | Some(Component::RootDir)) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_core::{FsPermissions, NetworkPermissions};

    fn evaluator() -> PermissionEvaluator {
        let perms = PermissionSpec {
            fs: FsPermissions {
                read: vec!["/t/data/**".into()],
                write: vec![],
            },
            network: NetworkPermissions {
                fetch: vec!["*.example.com".into()],
            },
            ..Default::default()
        };
        PermissionEvaluator::new(perms, PathBuf::from("/t"), PathBuf::from("/t/out"))
    }

    #[test]
    fn cwd_is_always_readable() {
        let eval = evaluator();
        assert!(eval.check_read(Path::new("/t/input.txt")).is_ok());
    }

    #[test]
    fn outdir_is_always_writable() {
        let eval = evaluator();
        assert!(eval.check_write(Path::new("result.txt")).is_ok());
        assert!(eval.check_write(Path::new("/t/out/result.txt")).is_ok());
    }

    #[test]
    fn write_outside_outdir_and_grants_is_denied() {
        let eval = evaluator();
        let err = eval.check_write(Path::new("/t/other/result.txt")).unwrap_err();
        assert_eq!(
            err,
            PermissionDenial::NotGranted {
                path: "/t/other/result.txt".into()
            }
        );
    }

    #[test]
    fn dotenv_under_cwd_is_still_hard_denied() {
        let eval = evaluator();
        let err = eval.check_read(Path::new("/t/.env")).unwrap_err();
        assert_eq!(
            err,
            PermissionDenial::HardDenied {
                path: "/t/.env".into()
            }
        );
    }

    #[test]
    fn dot_dot_chains_cannot_escape_cwd() {
        let eval = evaluator();
        let err = eval
            .check_read(Path::new("../../../etc/passwd"))
            .unwrap_err();
        match err {
            PermissionDenial::HardDenied { path } => assert_eq!(path, "/etc/passwd"),
            other => panic!("expected hard deny for /etc/passwd, got {other:?}"),
        }
    }

    #[test]
    fn relative_escape_without_hard_deny_hit_is_rejected() {
        let eval = evaluator();
        let err = eval.check_read(Path::new("../outside/secret.txt")).unwrap_err();
        assert_eq!(
            err,
            PermissionDenial::Escape {
                path: "/outside/secret.txt".into()
            }
        );
    }

    #[test]
    fn granted_pattern_extends_read_set() {
        let eval = evaluator();
        assert!(eval.check_read(Path::new("/t/data/nested/file.json")).is_ok());
    }

    #[test]
    fn fetch_requires_matching_pattern() {
        let eval = evaluator();
        assert!(eval.check_fetch("api.example.com").is_ok());
        assert!(eval.check_fetch("evil.com").is_err());
    }

    #[test]
    fn empty_network_grant_denies_everything() {
        let perms = PermissionSpec::default();
        let eval = PermissionEvaluator::new(perms, PathBuf::from("/t"), PathBuf::from("/t/out"));
        assert!(eval.check_fetch("api.example.com").is_err());
    }
}
