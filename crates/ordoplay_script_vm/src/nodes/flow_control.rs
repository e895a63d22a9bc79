// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequencing, branching and loops.

use super::int_property;
use crate::context::ExecutionContext;
use crate::instance::{NodeStep, StepMode, StepResult};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use ordoplay_script_graph::{NodeId, Pin, ScriptNode, Value, ValueType};

/// Type tag of the sequence node
pub const SEQUENCE: &str = "sequence";
/// Type tag of the branch node
pub const BRANCH: &str = "branch";
/// Type tag of the for loop node
pub const FOR_LOOP: &str = "for_loop";
/// Type tag of the while loop node
pub const WHILE_LOOP: &str = "while_loop";

/// Sequence node running `steps` outputs in order
pub fn sequence(id: NodeId, steps: usize) -> ScriptNode {
    (0..steps).fold(
        ScriptNode::new(id, SEQUENCE)
            .with_name("Sequence")
            .with_property("steps", steps as i64)
            .with_pin(Pin::exec_input("exec")),
        |node, step| node.with_pin(Pin::exec_output(format!("then {step}"))),
    )
}

/// Branch node. Inputs: exec, condition. Outputs: true, false.
pub fn branch(id: NodeId) -> ScriptNode {
    ScriptNode::new(id, BRANCH)
        .with_name("Branch")
        .with_pin(Pin::exec_input("exec"))
        .with_pin(Pin::input("condition", ValueType::Bool).with_default(false))
        .with_pin(Pin::exec_output("true"))
        .with_pin(Pin::exec_output("false"))
}

/// For loop over `first..=last`.
///
/// Inputs: exec, break, first, last. Outputs: body, index, completed.
pub fn for_loop(id: NodeId, first: i64, last: i64) -> ScriptNode {
    ScriptNode::new(id, FOR_LOOP)
        .with_name("For Loop")
        .with_pin(Pin::exec_input("exec"))
        .with_pin(Pin::exec_input("break"))
        .with_pin(Pin::input("first", ValueType::Int).with_default(first))
        .with_pin(Pin::input("last", ValueType::Int).with_default(last))
        .with_pin(Pin::exec_output("body"))
        .with_pin(Pin::output("index", ValueType::Int))
        .with_pin(Pin::exec_output("completed"))
}

/// While loop. Inputs: exec, condition. Outputs: body, completed.
pub fn while_loop(id: NodeId) -> ScriptNode {
    ScriptNode::new(id, WHILE_LOOP)
        .with_name("While Loop")
        .with_pin(Pin::exec_input("exec"))
        .with_pin(Pin::input("condition", ValueType::Bool).with_default(false))
        .with_pin(Pin::exec_output("body"))
        .with_pin(Pin::exec_output("completed"))
}

#[derive(Debug)]
struct Sequence {
    steps: usize,
}

impl NodeStep for Sequence {
    fn working_memory_size(&self) -> usize {
        1
    }

    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        let current = match context.step_mode() {
            StepMode::Begin => 0,
            _ => context.working_memory(0).as_int().unwrap_or(0) as usize + 1,
        };
        context.set_working_memory(0, Value::Int(current as i64));

        if current + 1 < self.steps {
            StepResult::Push(current)
        } else {
            StepResult::Advance(current)
        }
    }
}

#[derive(Debug)]
struct Branch;

impl NodeStep for Branch {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        if context.input(0).is_truthy() {
            StepResult::Advance(0)
        } else {
            StepResult::Advance(1)
        }
    }
}

/// Working memory holds the current index
#[derive(Debug)]
struct ForLoop;

impl ForLoop {
    const BREAK_PORT: usize = 1;
    const COMPLETED: usize = 1;
}

impl NodeStep for ForLoop {
    fn working_memory_size(&self) -> usize {
        1
    }

    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        if context.current_node_port() == Self::BREAK_PORT {
            return StepResult::Advance(Self::COMPLETED);
        }

        let (Some(first), Some(last)) = (context.input(0).as_int(), context.input(1).as_int()) else {
            let (found, argument) = match context.input(0).as_int() {
                Some(_) => (context.input(1).value_type(), 1),
                None => (context.input(0).value_type(), 0),
            };
            context.set_invalid_argument(argument, ValueType::Int, found);
            return StepResult::NoAdvance;
        };

        let index = match context.step_mode() {
            StepMode::Begin => first,
            _ => context.working_memory(0).as_int().unwrap_or(first).saturating_add(1),
        };
        context.set_working_memory(0, Value::Int(index));

        if index > last {
            return StepResult::Advance(Self::COMPLETED);
        }

        let iterations = index.saturating_sub(first).unsigned_abs();
        if iterations >= context.max_loop_iterations() {
            context.set_error(format!(
                "Loop exceeded {} iterations",
                context.max_loop_iterations()
            ));
            return StepResult::NoAdvance;
        }

        context.set_output(0, Value::Int(index));
        StepResult::Push(0)
    }
}

/// Working memory counts iterations
#[derive(Debug)]
struct WhileLoop;

impl NodeStep for WhileLoop {
    fn working_memory_size(&self) -> usize {
        1
    }

    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        let iterations = match context.step_mode() {
            StepMode::Begin => 0,
            _ => context.working_memory(0).as_int().unwrap_or(0) + 1,
        };
        context.set_working_memory(0, Value::Int(iterations));

        if !context.input(0).is_truthy() {
            return StepResult::Advance(1);
        }

        if iterations.unsigned_abs() >= context.max_loop_iterations() {
            context.set_error(format!(
                "Loop exceeded {} iterations",
                context.max_loop_iterations()
            ));
            return StepResult::NoAdvance;
        }

        StepResult::Push(0)
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        SEQUENCE,
        "Sequence",
        NodeCategory::FlowControl,
        "Runs each output in order",
        |node| {
            let steps = int_property(node, "steps")?;
            if steps < 1 {
                return Err(format!("a sequence needs at least one step, got {steps}"));
            }
            Ok(Box::new(Sequence { steps: steps as usize }) as Box<dyn NodeStep>)
        },
    ));

    registry.register(NodeType::new(
        BRANCH,
        "Branch",
        NodeCategory::FlowControl,
        "Follows true or false depending on the condition",
        |_| Ok(Box::new(Branch) as Box<dyn NodeStep>),
    ));

    registry.register(NodeType::new(
        FOR_LOOP,
        "For Loop",
        NodeCategory::FlowControl,
        "Runs the body once per index from first to last",
        |_| Ok(Box::new(ForLoop) as Box<dyn NodeStep>),
    ));

    registry.register(NodeType::new(
        WHILE_LOOP,
        "While Loop",
        NodeCategory::FlowControl,
        "Runs the body while the condition holds",
        |_| Ok(Box::new(WhileLoop) as Box<dyn NodeStep>),
    ));
}
