//! Trace header propagation, per spec §4.8: "a small whitelist of trace
//! headers (`traceparent`, `tracestate`, `x-request-id`, `x-trace-id`) is
//! merged into the child call unless already set."

use std::collections::HashMap;

/// Header names propagated from a caller's REST context into a child
/// invoke's, lower-cased to match [`kb_core::HostContext::Rest::headers`]'s
/// convention.
pub const TRACE_HEADER_WHITELIST: [&str; 4] =
    ["traceparent", "tracestate", "x-request-id", "x-trace-id"];

/// Merge whitelisted trace headers from `caller_headers` into `child_headers`,
/// never overwriting a header the child call already set.
pub fn merge_trace_headers(child_headers: &mut HashMap<String, String>, caller_headers: &HashMap<String, String>) {
    for name in TRACE_HEADER_WHITELIST {
        if child_headers.contains_key(name) {
            continue;
        }
        if let Some(value) = caller_headers.get(name) {
            child_headers.insert(name.to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_whitelisted_headers_only() {
        let caller = HashMap::from([
            ("traceparent".to_string(), "00-abc".to_string()),
            ("authorization".to_string(), "secret".to_string()),
        ]);
        let mut child = HashMap::new();
        merge_trace_headers(&mut child, &caller);
        assert_eq!(child.get("traceparent"), Some(&"00-abc".to_string()));
        assert!(!child.contains_key("authorization"));
    }

    #[test]
    fn never_overwrites_a_header_already_set_on_the_child() {
        let caller = HashMap::from([("x-trace-id".to_string(), "from-caller".to_string())]);
        let mut child = HashMap::from([("x-trace-id".to_string(), "from-child".to_string())]);
        merge_trace_headers(&mut child, &caller);
        assert_eq!(child.get("x-trace-id"), Some(&"from-child".to_string()));
    }
}
