// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nodes that suspend the call.

use super::string_property;
use crate::context::ExecutionContext;
use crate::instance::{NodeStep, StepMode, StepResult};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use ordoplay_script_graph::{NodeId, Pin, ScriptNode, Value, ValueType};

/// Type tag of the await node
pub const AWAIT_EVENT: &str = "await_event";

/// Suspends until `event` is emitted. Outputs: then, result.
///
/// `result` is the single resume argument, an array of them when there are
/// several, or nil when there are none.
pub fn await_event(id: NodeId, event: &str) -> ScriptNode {
    ScriptNode::new(id, AWAIT_EVENT)
        .with_name(format!("Await {event}"))
        .with_property("event", event)
        .with_pin(Pin::exec_input("exec"))
        .with_pin(Pin::exec_output("then"))
        .with_pin(Pin::output("result", ValueType::Any))
}

#[derive(Debug)]
struct AwaitEvent {
    event: String,
}

impl NodeStep for AwaitEvent {
    fn working_memory_size(&self) -> usize {
        1
    }

    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        if context.step_mode() != StepMode::Resume {
            context.set_working_memory(0, Value::String(self.event.clone()));
            context.await_event(self.event.as_str());
            return StepResult::Yield;
        }

        let result = match context.resume_arguments() {
            [] => Value::Nil,
            [single] => single.clone(),
            many => Value::Array(many.to_vec()),
        };
        context.set_output(0, result);
        StepResult::Advance(0)
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        AWAIT_EVENT,
        "Await Event",
        NodeCategory::Signal,
        "Suspends the call until the event is emitted",
        |node| Ok(Box::new(AwaitEvent { event: string_property(node, "event")? }) as Box<dyn NodeStep>),
    ));
}
