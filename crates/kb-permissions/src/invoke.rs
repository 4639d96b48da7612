//! Cross-plugin invoke authorization: the allow/deny half of C8's gate.
//!
//! Chain-depth, fan-out, time-budget, and cycle-detection bookkeeping live in
//! `kb-invoke` since they need call-chain state this crate has no business
//! holding; this module only answers "is plugin A allowed to call this
//! target at all", per spec §4.8's decision order.

use kb_core::InvokePermissions;

/// A resolved cross-plugin invoke target, as parsed from `@pluginId@version:METHOD /path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeTargetRef<'a> {
    /// The target plugin id.
    pub plugin_id: &'a str,
    /// The target plugin version (`"latest"` or a resolved semver string).
    pub plugin_version: &'a str,
    /// HTTP-style method token (`GET`, `POST`, …).
    pub method: &'a str,
    /// The route path.
    pub path: &'a str,
}

impl<'a> InvokeTargetRef<'a> {
    /// The exact `"METHOD /path"` string routes and denies are matched against.
    #[must_use]
    pub fn route_string(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// The `"@pluginId:*"` wildcard form used for deny-list plugin-wide matches.
    #[must_use]
    pub fn plugin_wildcard(&self) -> String {
        format!("@{}:*", self.plugin_id)
    }

    /// The `"@pluginId@version:METHOD /path"` exact target string.
    #[must_use]
    pub fn exact_target(&self) -> String {
        format!(
            "@{}@{}:{}",
            self.plugin_id,
            self.plugin_version,
            self.route_string()
        )
    }
}

/// Why an invoke was denied, for `details.reason` on the resulting `PluginError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeDenyReason {
    /// Matched an explicit `invoke.deny` entry.
    ExplicitDeny,
    /// `invoke.routes` was non-empty but did not contain an exact match.
    RouteNotListed,
    /// `invoke.plugins` was non-empty but did not contain the target plugin.
    PluginNotListed,
    /// Neither `invoke.routes` nor `invoke.plugins` granted anything.
    DefaultDeny,
}

impl InvokeDenyReason {
    /// The wire string used in `details.reason`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InvokeDenyReason::ExplicitDeny => "explicit deny",
            InvokeDenyReason::RouteNotListed => "route not listed",
            InvokeDenyReason::PluginNotListed => "plugin not listed",
            InvokeDenyReason::DefaultDeny => "default deny",
        }
    }
}

/// Decide whether `perms` authorizes invoking `target`, per spec §4.8's
/// first-match-wins decision order: deny-list, then routes, then plugins,
/// then default deny.
pub fn invoke_decision(
    perms: &InvokePermissions,
    target: &InvokeTargetRef<'_>,
) -> Result<(), InvokeDenyReason> {
    let exact = target.exact_target();
    let plugin_wildcard = target.plugin_wildcard();
    if perms
        .deny
        .iter()
        .any(|pattern| pattern == &exact || pattern == &plugin_wildcard)
    {
        return Err(InvokeDenyReason::ExplicitDeny);
    }

    if !perms.routes.is_empty() {
        return if perms.routes.iter().any(|pattern| pattern == &exact) {
            Ok(())
        } else {
            Err(InvokeDenyReason::RouteNotListed)
        };
    }

    if !perms.plugins.is_empty() {
        return if perms.plugins.iter().any(|pattern| pattern == target.plugin_id) {
            Ok(())
        } else {
            Err(InvokeDenyReason::PluginNotListed)
        };
    }

    Err(InvokeDenyReason::DefaultDeny)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target<'a>() -> InvokeTargetRef<'a> {
        InvokeTargetRef {
            plugin_id: "kb-labs/search",
            plugin_version: "1.2.3",
            method: "GET",
            path: "/v1/query",
        }
    }

    #[test]
    fn default_deny_when_nothing_granted() {
        let perms = InvokePermissions::default();
        assert_eq!(
            invoke_decision(&perms, &target()),
            Err(InvokeDenyReason::DefaultDeny)
        );
    }

    #[test]
    fn explicit_deny_wins_even_with_matching_route() {
        let perms = InvokePermissions {
            routes: vec!["@kb-labs/search@1.2.3:GET /v1/query".into()],
            plugins: vec![],
            deny: vec!["@kb-labs/search:*".into()],
        };
        assert_eq!(
            invoke_decision(&perms, &target()),
            Err(InvokeDenyReason::ExplicitDeny)
        );
    }

    #[test]
    fn routes_require_exact_match() {
        let perms = InvokePermissions {
            routes: vec!["@kb-labs/search@1.2.3:GET /v1/query".into()],
            plugins: vec![],
            deny: vec![],
        };
        assert_eq!(invoke_decision(&perms, &target()), Ok(()));

        let other = InvokeTargetRef {
            method: "POST",
            ..target()
        };
        assert_eq!(
            invoke_decision(&perms, &other),
            Err(InvokeDenyReason::RouteNotListed)
        );
    }

    #[test]
    fn plugins_list_allows_any_route_on_that_plugin() {
        let perms = InvokePermissions {
            routes: vec![],
            plugins: vec!["kb-labs/search".into()],
            deny: vec![],
        };
        assert_eq!(invoke_decision(&perms, &target()), Ok(()));
    }

    #[test]
    fn routes_present_means_plugins_list_is_not_consulted() {
        let perms = InvokePermissions {
            routes: vec!["@other@1.0.0:GET /y".into()],
            plugins: vec!["kb-labs/search".into()],
            deny: vec![],
        };
        assert_eq!(
            invoke_decision(&perms, &target()),
            Err(InvokeDenyReason::RouteNotListed)
        );
    }
}
