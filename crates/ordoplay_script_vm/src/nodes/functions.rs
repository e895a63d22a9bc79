// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function entry and result nodes.

use crate::context::ExecutionContext;
use crate::instance::{NodeStep, StepResult};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use ordoplay_script_graph::{Argument, NodeId, Pin, ScriptNode, ValueType};

/// Type tag of the entry node
pub const FUNCTION_ENTRY: &str = "function_entry";
/// Type tag of the result node
pub const FUNCTION_RESULT: &str = "function_result";

/// Entry node: one execution output, then one data output per argument
pub fn function_entry(id: NodeId, arguments: &[Argument]) -> ScriptNode {
    arguments.iter().fold(
        ScriptNode::new(id, FUNCTION_ENTRY)
            .with_name("Function Entry")
            .with_pin(Pin::exec_output("then")),
        |node, argument| node.with_pin(Pin::output(argument.name.as_str(), argument.value_type)),
    )
}

/// Result node, with a `return_value` input when the function returns something
pub fn function_result(id: NodeId, return_type: Option<ValueType>) -> ScriptNode {
    let node = ScriptNode::new(id, FUNCTION_RESULT)
        .with_name("Return")
        .with_pin(Pin::exec_input("exec"));
    match return_type {
        Some(value_type) => node.with_pin(Pin::input("return_value", value_type)),
        None => node,
    }
}

/// Copies the call arguments to its outputs
#[derive(Debug)]
struct FunctionEntry;

impl NodeStep for FunctionEntry {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        for index in 0..context.input_count().min(context.output_count()) {
            context.copy_input_to_output(index, index);
        }
        StepResult::Advance(0)
    }
}

/// Ends the call, returning its input or nil
#[derive(Debug)]
struct FunctionResult;

impl NodeStep for FunctionResult {
    fn working_memory_size(&self) -> usize {
        1
    }

    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        let value = context.input(0).clone();
        context.set_working_memory(0, value);
        StepResult::End
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        FUNCTION_ENTRY,
        "Function Entry",
        NodeCategory::Function,
        "Where a call starts; outputs the call arguments",
        |_| Ok(Box::new(FunctionEntry) as Box<dyn NodeStep>),
    ));

    registry.register(NodeType::new(
        FUNCTION_RESULT,
        "Return",
        NodeCategory::Function,
        "Ends the call with an optional return value",
        |_| Ok(Box::new(FunctionResult) as Box<dyn NodeStep>),
    ));
}
