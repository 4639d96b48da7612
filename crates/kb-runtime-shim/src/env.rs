//! The sandboxed environment-variable facade handed to plugin handlers.

use std::sync::Arc;

use kb_permissions::PermissionEvaluator;

/// The sandboxed env facade.
///
/// `env(name)` never reveals, by timing or otherwise, whether a withheld
/// variable is actually set in the process environment — a denied read and
/// an unset variable both resolve to `None`, per spec §4.2.
pub struct EnvShim {
    evaluator: Arc<PermissionEvaluator>,
}

impl EnvShim {
    /// Build a facade bound to `evaluator`.
    #[must_use]
    pub fn new(evaluator: Arc<PermissionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Read `name` from the process environment if `env.read` (or the
    /// built-in always-allowed set) covers it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        if !self.evaluator.check_env_read(name) {
            return None;
        }
        std::env::var(name).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_core::{EnvPermissions, PermissionSpec};
    use std::path::PathBuf;

    #[test]
    fn withheld_var_and_unset_var_are_indistinguishable() {
        let perms = PermissionSpec {
            env: EnvPermissions { read: vec![] },
            ..Default::default()
        };
        let evaluator =
            PermissionEvaluator::new(perms, PathBuf::from("/t"), PathBuf::from("/t/out"));
        let shim = EnvShim::new(Arc::new(evaluator));
        assert_eq!(shim.get("THIS_VAR_DOES_NOT_EXIST_ANYWHERE"), None);
        assert_eq!(shim.get("PATH"), None);
    }

    #[test]
    fn granted_var_is_readable() {
        std::env::set_var("KB_SHIM_TEST_VAR", "value");
        let perms = PermissionSpec {
            env: EnvPermissions {
                read: vec!["KB_SHIM_TEST_VAR".into()],
            },
            ..Default::default()
        };
        let evaluator =
            PermissionEvaluator::new(perms, PathBuf::from("/t"), PathBuf::from("/t/out"));
        let shim = EnvShim::new(Arc::new(evaluator));
        assert_eq!(shim.get("KB_SHIM_TEST_VAR"), Some("value".to_string()));
        std::env::remove_var("KB_SHIM_TEST_VAR");
    }
}
