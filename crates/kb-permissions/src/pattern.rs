//! Compiled pattern sets shared by the filesystem, network, and env checks.
//!
//! Patterns are compiled once, at evaluator construction, and cached keyed by
//! their raw source string so the same manifest never pays glob-compilation
//! cost twice — mirroring the pre-compiled `GlobMatcher` cache the teacher
//! crate builds at `WorkspaceBoundary::new`.

use globset::{Glob, GlobBuilder, GlobMatcher};
use tracing::warn;

/// One compiled pattern: either a plain prefix (no glob metacharacters in the
/// source) or a compiled glob, matching spec §4.1's rule that a pattern
/// without `*`/`?` acts as a prefix rather than an exact-match glob.
enum Compiled {
    Prefix(String),
    Glob(GlobMatcher),
}

/// A compiled, ready-to-match set of path/string patterns.
pub struct PatternSet {
    raw: Vec<String>,
    compiled: Vec<Compiled>,
}

impl PatternSet {
    /// Compile a pattern set from raw source strings.
    ///
    /// Patterns that fail to compile as globs are dropped with a warning
    /// rather than rejecting the whole manifest — a single malformed pattern
    /// should not take down an otherwise-valid permission grant.
    #[must_use]
    pub fn compile(patterns: &[String]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            if has_glob_metachars(pattern) {
                match compile_glob(pattern) {
                    Ok(matcher) => compiled.push(Compiled::Glob(matcher)),
                    Err(error) => {
                        warn!(pattern = %pattern, %error, "failed to compile permission pattern");
                    }
                }
            } else {
                compiled.push(Compiled::Prefix(pattern.clone()));
            }
        }
        Self {
            raw: patterns.to_vec(),
            compiled,
        }
    }

    /// True if the pattern set is empty (no patterns granted).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// The raw source patterns this set was compiled from.
    #[must_use]
    pub fn raw_patterns(&self) -> &[String] {
        &self.raw
    }

    /// True if `candidate` matches at least one compiled pattern.
    ///
    /// `candidate` should be the same textual form the patterns were written
    /// against: a normalized filesystem path string for fs patterns, a
    /// host/URL string for network patterns.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.compiled.iter().any(|pattern| match pattern {
            Compiled::Prefix(prefix) => candidate.starts_with(prefix.as_str()),
            Compiled::Glob(matcher) => matcher.is_match(candidate),
        })
    }
}

fn has_glob_metachars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    if pattern == "**" {
        return Glob::new("**").map(|g| g.compile_matcher());
    }
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> PatternSet {
        PatternSet::compile(&patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn plain_pattern_acts_as_prefix() {
        let patterns = set(&["/t/out"]);
        assert!(patterns.matches("/t/out/result.txt"));
        assert!(patterns.matches("/t/out"));
        assert!(!patterns.matches("/t/other/result.txt"));
    }

    #[test]
    fn single_star_does_not_cross_path_separator() {
        let patterns = set(&["/t/data/*.json"]);
        assert!(patterns.matches("/t/data/input.json"));
        assert!(!patterns.matches("/t/data/nested/input.json"));
    }

    #[test]
    fn double_star_crosses_path_separators() {
        let patterns = set(&["/t/data/**"]);
        assert!(patterns.matches("/t/data/nested/deep/input.json"));
    }

    #[test]
    fn bare_double_star_matches_everything() {
        let patterns = set(&["**"]);
        assert!(patterns.matches("/anything/at/all"));
    }

    #[test]
    fn question_mark_matches_single_character() {
        let patterns = set(&["/t/file?.txt"]);
        assert!(patterns.matches("/t/file1.txt"));
        assert!(!patterns.matches("/t/file12.txt"));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let patterns = set(&[]);
        assert!(patterns.is_empty());
        assert!(!patterns.matches("/t/out/result.txt"));
    }
}
