//! The set of front-ends that can originate a plugin execution.

use serde::{Deserialize, Serialize};

/// Identifies which front-end originated an execution request.
///
/// Carried on [`crate::descriptor::PluginContextDescriptor`] so handlers and
/// the permission evaluator can branch on call origin without inspecting
/// [`crate::descriptor::HostContext`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    /// Invoked from the command-line front-end.
    Cli,
    /// Invoked over the REST front-end.
    Rest,
    /// Invoked over a WebSocket connection.
    Ws,
    /// Invoked as a step of a platform workflow.
    Workflow,
    /// Invoked by an inbound webhook delivery.
    Webhook,
    /// Invoked as a scheduled or queued platform job.
    Job,
    /// Invoked on a cron schedule.
    Cron,
}

impl HostType {
    /// The lowercase wire name, matching the `serde` representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HostType::Cli => "cli",
            HostType::Rest => "rest",
            HostType::Ws => "ws",
            HostType::Workflow => "workflow",
            HostType::Webhook => "webhook",
            HostType::Job => "job",
            HostType::Cron => "cron",
        }
    }
}

impl std::fmt::Display for HostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
