//! Parses the `@pluginId@(semver|"latest"):METHOD /path` target syntax of
//! spec §4.8, e.g. `@kb-labs/search@1.2.3:GET /v1/query`.

use thiserror::Error;

/// A parsed, not-yet-authorized invoke target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    /// The target plugin id.
    pub plugin_id: String,
    /// The requested plugin version, or the literal `"latest"`.
    pub plugin_version: String,
    /// HTTP-style method token.
    pub method: String,
    /// The route path.
    pub path: String,
}

/// Why a target string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetParseError {
    /// The string did not start with `@`.
    #[error("invoke target {0:?} must start with '@'")]
    MissingLeadingAt(String),
    /// No `@` separating the plugin id from its version.
    #[error("invoke target {0:?} is missing a '@version' segment")]
    MissingVersion(String),
    /// No `:` separating `pluginId@version` from `METHOD /path`.
    #[error("invoke target {0:?} is missing a ':' before the route")]
    MissingRouteSeparator(String),
    /// No space separating the method token from the path.
    #[error("invoke target {0:?} is missing a space between method and path")]
    MissingPathSeparator(String),
    /// One of the parsed segments was empty.
    #[error("invoke target {0:?} has an empty plugin id, version, method, or path")]
    EmptySegment(String),
}

/// Parse a raw target string into its four components.
///
/// Plugin ids in this system never contain `@`, so the first `@` after the
/// leading marker unambiguously separates `pluginId` from `version`.
pub fn parse_target(raw: &str) -> Result<ParsedTarget, TargetParseError> {
    let without_marker = raw
        .strip_prefix('@')
        .ok_or_else(|| TargetParseError::MissingLeadingAt(raw.to_string()))?;

    let (plugin_id, rest) = without_marker
        .split_once('@')
        .ok_or_else(|| TargetParseError::MissingVersion(raw.to_string()))?;

    let (plugin_version, route) = rest
        .split_once(':')
        .ok_or_else(|| TargetParseError::MissingRouteSeparator(raw.to_string()))?;

    let (method, path) = route
        .split_once(' ')
        .ok_or_else(|| TargetParseError::MissingPathSeparator(raw.to_string()))?;

    if plugin_id.is_empty() || plugin_version.is_empty() || method.is_empty() || path.is_empty() {
        return Err(TargetParseError::EmptySegment(raw.to_string()));
    }

    Ok(ParsedTarget {
        plugin_id: plugin_id.to_string(),
        plugin_version: plugin_version.to_string(),
        method: method.to_string(),
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_scoped_plugin_id_and_pinned_version() {
        let target = parse_target("@kb-labs/search@1.2.3:GET /v1/query").unwrap();
        assert_eq!(
            target,
            ParsedTarget {
                plugin_id: "kb-labs/search".into(),
                plugin_version: "1.2.3".into(),
                method: "GET".into(),
                path: "/v1/query".into(),
            }
        );
    }

    #[test]
    fn parses_latest_as_a_literal_version_token() {
        let target = parse_target("@kb-labs/search@latest:POST /v1/index").unwrap();
        assert_eq!(target.plugin_version, "latest");
        assert_eq!(target.method, "POST");
    }

    #[test]
    fn rejects_missing_leading_at() {
        assert_eq!(
            parse_target("kb-labs/search@1.0.0:GET /x"),
            Err(TargetParseError::MissingLeadingAt("kb-labs/search@1.0.0:GET /x".into()))
        );
    }

    #[test]
    fn rejects_missing_version_separator() {
        assert!(matches!(
            parse_target("@kb-labs/search:GET /x"),
            Err(TargetParseError::MissingVersion(_))
        ));
    }

    #[test]
    fn rejects_missing_route_separator() {
        assert!(matches!(
            parse_target("@kb-labs/search@1.0.0 GET /x"),
            Err(TargetParseError::MissingRouteSeparator(_))
        ));
    }

    #[test]
    fn rejects_missing_path_separator() {
        assert!(matches!(
            parse_target("@kb-labs/search@1.0.0:GET"),
            Err(TargetParseError::MissingPathSeparator(_))
        ));
    }
}
