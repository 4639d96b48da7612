//! Environment variable read authorization.

use kb_core::EnvPermissions;

/// Variables safe to expose regardless of manifest grants.
const ALWAYS_ALLOWED: &[&str] = &["NODE_ENV", "DEBUG", "LANG", "TZ"];

/// Decide whether a plugin may read environment variable `name`.
///
/// Per spec §4.1: reading a variable that is neither manifest-granted nor in
/// the built-in always-allowed set returns `undefined` to the handler — it
/// is not an error the process surfaces, so this returns a plain `bool`
/// rather than a `Result`; the shim layer (C2) is responsible for turning
/// `false` into "value withheld" rather than a thrown error.
#[must_use]
pub fn env_read_allowed(perms: &EnvPermissions, name: &str) -> bool {
    if ALWAYS_ALLOWED.iter().any(|allowed| allowed.eq_ignore_ascii_case(name)) {
        return true;
    }
    perms.read.iter().any(|pattern| match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    })
}
