// SPDX-License-Identifier: MIT OR Apache-2.0
//! Standard node library.
//!
//! Each node type comes with a builder that produces a [`ScriptNode`] with the
//! pins the behavior expects, so graphs can be assembled in code.

pub mod flow_control;
pub mod functions;
pub mod math;
pub mod signals;
pub mod utilities;
pub mod variables;

use crate::registry::NodeRegistry;
use ordoplay_script_graph::ScriptNode;

/// Create a registry holding every standard node type
pub fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    functions::register(&mut registry);
    flow_control::register(&mut registry);
    math::register(&mut registry);
    variables::register(&mut registry);
    signals::register(&mut registry);
    utilities::register(&mut registry);
    registry
}

pub(crate) fn string_property(node: &ScriptNode, key: &str) -> Result<String, String> {
    match node.property(key) {
        Some(value) => value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("property '{key}' must be a string, got {}", value.value_type())),
        None => Err(format!("missing property '{key}'")),
    }
}

pub(crate) fn int_property(node: &ScriptNode, key: &str) -> Result<i64, String> {
    match node.property(key) {
        Some(value) => value
            .as_int()
            .ok_or_else(|| format!("property '{key}' must be an integer, got {}", value.value_type())),
        None => Err(format!("missing property '{key}'")),
    }
}
