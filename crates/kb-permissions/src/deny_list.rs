//! The hard-coded filesystem deny list enforced by [`crate::evaluator`]
//! regardless of any `fs.read`/`fs.write` grant.
//!
//! Per spec §4.1, no per-plugin configuration can override these checks —
//! they run first, before any allow-list match is even consulted.

use std::path::Path;

const DENY_SEGMENTS: &[&str] = &["node_modules", ".git", ".ssh"];
const DENY_PREFIXES: &[&str] = &["/etc/", "/usr/", "/var/"];
const DENY_SUBSTRINGS: &[&str] = &["credentials", "password"];
const DENY_SUFFIXES: &[&str] = &[".pem", ".key", ".secret"];

/// True if `path` falls under the hard-coded deny list.
///
/// `path` should already be normalized (resolved against `cwd`, `.`/`..`
/// collapsed) before calling this — the deny list inspects path segments and
/// the file name, not the raw input string.
#[must_use]
pub fn is_hard_denied(path: &Path) -> bool {
    for component in path.components() {
        let segment = component.as_os_str().to_string_lossy();
        if DENY_SEGMENTS.iter().any(|s| segment.eq_ignore_ascii_case(s)) {
            return true;
        }
        if is_dotenv_segment(&segment) {
            return true;
        }
        let lower = segment.to_ascii_lowercase();
        if DENY_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
            return true;
        }
    }

    let path_str = path.to_string_lossy();
    if DENY_PREFIXES.iter().any(|p| path_str.starts_with(p)) {
        return true;
    }

    if let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_ascii_lowercase()) {
        if DENY_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            return true;
        }
    }

    false
}

fn is_dotenv_segment(segment: &str) -> bool {
    segment == ".env" || segment.starts_with(".env.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn denies_dotenv_files() {
        assert!(is_hard_denied(&PathBuf::from("/t/.env")));
        assert!(is_hard_denied(&PathBuf::from("/t/.env.local")));
    }

    #[test]
    fn denies_git_and_node_modules_segments() {
        assert!(is_hard_denied(&PathBuf::from("/t/.git/config")));
        assert!(is_hard_denied(&PathBuf::from("/t/node_modules/pkg/index.js")));
    }

    #[test]
    fn denies_system_prefixes() {
        assert!(is_hard_denied(&PathBuf::from("/etc/passwd")));
        assert!(is_hard_denied(&PathBuf::from("/usr/bin/sh")));
        assert!(is_hard_denied(&PathBuf::from("/var/log/syslog")));
    }

    #[test]
    fn denies_credential_like_names_case_insensitively() {
        assert!(is_hard_denied(&PathBuf::from("/t/Credentials.json")));
        assert!(is_hard_denied(&PathBuf::from("/t/db_password.txt")));
    }

    #[test]
    fn denies_key_pem_secret_suffixes() {
        assert!(is_hard_denied(&PathBuf::from("/t/id_rsa.pem")));
        assert!(is_hard_denied(&PathBuf::from("/t/server.key")));
        assert!(is_hard_denied(&PathBuf::from("/t/app.secret")));
    }

    #[test]
    fn allows_ordinary_paths() {
        assert!(!is_hard_denied(&PathBuf::from("/t/out/result.txt")));
        assert!(!is_hard_denied(&PathBuf::from("/t/data/input.json")));
    }
}
