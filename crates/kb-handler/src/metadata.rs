//! Standard metadata injection, per spec §4.5.
//!
//! The runner appends `{executedAt, duration, pluginId, pluginVersion,
//! commandId?, host, tenantId?, requestId}` to whatever `meta` the handler
//! returned. These standard keys overwrite any conflicting user key — this
//! is documented behavior, not an oversight, and is covered by
//! [`crate::runner`]'s tests (spec §8 property 7).

use chrono::Utc;
use serde_json::{Map, Value};

use kb_context::PluginContext;

/// Merge the standard metadata fields into `user_meta`, overwriting any
/// colliding keys the handler supplied.
#[must_use]
pub fn inject_standard_metadata(
    context: &PluginContext,
    user_meta: Option<Value>,
    duration_ms: u64,
) -> Value {
    let mut map = match user_meta {
        Some(Value::Object(map)) => map,
        Some(_) | None => Map::new(),
    };

    map.insert(
        "executedAt".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    map.insert("duration".to_string(), Value::from(duration_ms));
    map.insert(
        "pluginId".to_string(),
        Value::String(context.plugin_id.clone()),
    );
    map.insert(
        "pluginVersion".to_string(),
        Value::String(context.plugin_version.clone()),
    );
    match &context.command_id {
        Some(command_id) => {
            map.insert("commandId".to_string(), Value::String(command_id.clone()));
        }
        None => {
            map.remove("commandId");
        }
    }
    map.insert(
        "host".to_string(),
        Value::String(context.host.as_str().to_string()),
    );
    match &context.tenant_id {
        Some(tenant_id) => {
            map.insert("tenantId".to_string(), Value::String(tenant_id.clone()));
        }
        None => {
            map.remove("tenantId");
        }
    }
    map.insert(
        "requestId".to_string(),
        Value::String(context.trace.request_id.clone()),
    );

    Value::Object(map)
}
