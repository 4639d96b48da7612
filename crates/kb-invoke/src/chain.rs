//! Cross-plugin call-chain limits: depth, fan-out, wall-clock budget, and
//! cycle detection, per spec §4.8's "Chain limits".

use kb_core::InvokeChain;

/// Configured chain limits. Defaults follow spec §4.8 where given
/// (`maxDepth`); `maxFanOut`/`maxChainTime` have no stated default in the
/// distilled spec, so these pick conservative values documented in
/// `DESIGN.md`'s Open Question decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvokeLimits {
    /// Maximum hop count from the root call.
    pub max_depth: u32,
    /// Maximum concurrent children a single frame may spawn.
    pub max_fan_out: usize,
    /// Maximum wall-clock milliseconds from the root call.
    pub max_chain_time_ms: u64,
}

impl Default for InvokeLimits {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_fan_out: 10,
            max_chain_time_ms: 60_000,
        }
    }
}

/// Why a chained invoke was refused before authorization was even
/// consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainDenyReason {
    /// `maxDepth` would be exceeded by this hop.
    DepthExceeded,
    /// `maxFanOut` concurrent children already in flight on this frame.
    FanOutExceeded,
    /// The remaining time budget from the root call is `<= 0`.
    TimeExceeded,
    /// The target plugin id already appears in `visited`.
    CycleDetected,
}

/// Build the chain state the next hop will carry, checking every limit
/// before doing so. `current` is `None` for the first invoke from a root
/// (non-chained) call.
pub fn advance_chain(
    current: Option<&InvokeChain>,
    caller_plugin_id: &str,
    target_plugin_id: &str,
    limits: &InvokeLimits,
    now_ms: i64,
) -> Result<InvokeChain, ChainDenyReason> {
    let (depth, mut visited, root_started_at_ms) = match current {
        Some(chain) => (chain.depth, chain.visited.clone(), chain.root_started_at_ms),
        None => (0, vec![caller_plugin_id.to_string()], now_ms),
    };

    let next_depth = depth + 1;
    if next_depth > limits.max_depth {
        return Err(ChainDenyReason::DepthExceeded);
    }

    if visited.iter().any(|id| id == target_plugin_id) {
        return Err(ChainDenyReason::CycleDetected);
    }

    let elapsed_ms = now_ms.saturating_sub(root_started_at_ms);
    let remaining_ms = (limits.max_chain_time_ms as i64).saturating_sub(elapsed_ms);
    if remaining_ms <= 0 {
        return Err(ChainDenyReason::TimeExceeded);
    }

    visited.push(target_plugin_id.to_string());
    Ok(InvokeChain {
        depth: next_depth,
        visited,
        root_started_at_ms,
    })
}
