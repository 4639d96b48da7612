//! C2: sandboxed fs, fetch, and env facades handed to plugin handler code.
//!
//! A single [`RuntimeShim`] bundles all three sub-facades bound to one
//! `{permissions, cwd, outdir}` triple, per spec §4.2. Every call passes
//! through C1 ([`kb_permissions::PermissionEvaluator`]) before it touches the
//! real filesystem, issues a fetch, or reads process environment state.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod env;
pub mod fetch;
pub mod fs;

use std::path::PathBuf;
use std::sync::Arc;

use kb_core::PermissionSpec;
use kb_permissions::PermissionEvaluator;

pub use env::EnvShim;
pub use fetch::{FetchResponse, FetchShim};
pub use fs::{DirEntryStat, FsShim};

/// The bundled C2 shim handed to a single plugin execution.
pub struct RuntimeShim {
    /// Sandboxed filesystem facade.
    pub fs: FsShim,
    /// Sandboxed outbound-fetch facade.
    pub fetch: FetchShim,
    /// Sandboxed environment-variable facade.
    pub env: EnvShim,
}

impl RuntimeShim {
    /// Build a shim bound to `permissions`, `cwd`, and `outdir`, sharing one
    /// [`PermissionEvaluator`] across all three sub-facades.
    #[must_use]
    pub fn new(permissions: PermissionSpec, cwd: PathBuf, outdir: PathBuf, http: reqwest::Client) -> Self {
        let evaluator = Arc::new(PermissionEvaluator::new(permissions, cwd, outdir));
        Self {
            fs: FsShim::new(evaluator.clone()),
            fetch: FetchShim::new(evaluator.clone(), http),
            env: EnvShim::new(evaluator),
        }
    }
}
