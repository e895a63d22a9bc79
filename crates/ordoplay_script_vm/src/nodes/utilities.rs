// SPDX-License-Identifier: MIT OR Apache-2.0
//! Utility nodes.

use crate::context::ExecutionContext;
use crate::instance::{NodeStep, StepResult};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use ordoplay_script_graph::{NodeId, Pin, ScriptNode, ValueType};

/// Type tag of the print node
pub const PRINT: &str = "print";

/// Logs its input. Inputs: exec, text. Output: then.
pub fn print(id: NodeId, text: &str) -> ScriptNode {
    ScriptNode::new(id, PRINT)
        .with_name("Print")
        .with_pin(Pin::exec_input("exec"))
        .with_pin(Pin::input("text", ValueType::Any).with_default(text))
        .with_pin(Pin::exec_output("then"))
}

#[derive(Debug)]
struct Print;

impl NodeStep for Print {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        tracing::info!(target: "ordoplay_script", node = %context.current_node(), "{}", context.input(0));
        StepResult::Advance(0)
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        PRINT,
        "Print",
        NodeCategory::Utility,
        "Writes a value to the log",
        |_| Ok(Box::new(Print) as Box<dyn NodeStep>),
    ));
}
