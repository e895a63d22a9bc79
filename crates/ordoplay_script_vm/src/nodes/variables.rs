// SPDX-License-Identifier: MIT OR Apache-2.0
//! Local and script variable nodes.
//!
//! Local variable nodes bound to the same variable share one working memory
//! slot, so a read sees the last assignment made anywhere in the call.

use super::string_property;
use crate::context::ExecutionContext;
use crate::instance::{NodeStep, StepResult};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use ordoplay_script_graph::{LocalVariable, NodeId, Pin, ScriptNode, ValueType};
use uuid::Uuid;

/// Type tag of the local variable read node
pub const LOCAL_VARIABLE: &str = "local_variable";
/// Type tag of the local variable assign node
pub const ASSIGN_LOCAL_VARIABLE: &str = "assign_local_variable";
/// Type tag of the script variable read node
pub const VARIABLE_GET: &str = "variable_get";
/// Type tag of the script variable assign node
pub const VARIABLE_SET: &str = "variable_set";

/// Reads a local variable. Output: value.
pub fn local_variable(id: NodeId, variable: &LocalVariable) -> ScriptNode {
    ScriptNode::new(id, LOCAL_VARIABLE)
        .with_name(variable.name.as_str())
        .with_property("variable", variable.id.to_string())
        .with_pin(Pin::output("value", ValueType::Any))
}

/// Assigns a local variable. Inputs: exec, value. Output: then.
pub fn assign_local_variable(id: NodeId, variable: &LocalVariable) -> ScriptNode {
    ScriptNode::new(id, ASSIGN_LOCAL_VARIABLE)
        .with_name(format!("Set {}", variable.name))
        .with_property("variable", variable.id.to_string())
        .with_pin(Pin::exec_input("exec"))
        .with_pin(Pin::input("value", ValueType::Any))
        .with_pin(Pin::exec_output("then"))
}

/// Reads a script variable. Output: value.
pub fn variable_get(id: NodeId, name: &str, value_type: ValueType) -> ScriptNode {
    ScriptNode::new(id, VARIABLE_GET)
        .with_name(name)
        .with_property("variable", name)
        .with_pin(Pin::output("value", value_type))
}

/// Assigns a script variable. Inputs: exec, value. Outputs: then, value.
pub fn variable_set(id: NodeId, name: &str, value_type: ValueType) -> ScriptNode {
    ScriptNode::new(id, VARIABLE_SET)
        .with_name(format!("Set {name}"))
        .with_property("variable", name)
        .with_pin(Pin::exec_input("exec"))
        .with_pin(Pin::input("value", value_type))
        .with_pin(Pin::exec_output("then"))
        .with_pin(Pin::output("value", value_type))
}

fn variable_key(node: &ScriptNode) -> Result<Uuid, String> {
    let key = string_property(node, "variable")?;
    Uuid::parse_str(&key).map_err(|e| format!("invalid local variable id '{key}': {e}"))
}

#[derive(Debug)]
struct LocalVariableRead {
    key: Uuid,
}

impl NodeStep for LocalVariableRead {
    fn working_memory_size(&self) -> usize {
        1
    }

    fn shared_memory_key(&self) -> Option<Uuid> {
        Some(self.key)
    }

    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        let value = context.working_memory(0).clone();
        context.set_output(0, value);
        StepResult::Advance(0)
    }
}

#[derive(Debug)]
struct LocalVariableAssign {
    key: Uuid,
}

impl NodeStep for LocalVariableAssign {
    fn working_memory_size(&self) -> usize {
        1
    }

    fn shared_memory_key(&self) -> Option<Uuid> {
        Some(self.key)
    }

    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        let value = context.input(0).clone();
        context.set_working_memory(0, value);
        StepResult::Advance(0)
    }
}

#[derive(Debug)]
struct VariableGet {
    name: String,
}

impl NodeStep for VariableGet {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        match context.variables().get(&self.name) {
            Some(value) => context.set_output(0, value),
            None => context.set_error(format!("Variable '{}' not found", self.name)),
        }
        StepResult::Advance(0)
    }
}

#[derive(Debug)]
struct VariableSet {
    name: String,
}

impl NodeStep for VariableSet {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        let value = context.input(0).clone();
        match context.variables().set(&self.name, value.clone()) {
            Ok(()) => context.set_output(0, value),
            Err(e) => context.set_error(e.to_string()),
        }
        StepResult::Advance(0)
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        LOCAL_VARIABLE,
        "Get Local",
        NodeCategory::Variable,
        "Reads a function-local variable",
        |node| Ok(Box::new(LocalVariableRead { key: variable_key(node)? }) as Box<dyn NodeStep>),
    ));

    registry.register(NodeType::new(
        ASSIGN_LOCAL_VARIABLE,
        "Set Local",
        NodeCategory::Variable,
        "Assigns a function-local variable",
        |node| Ok(Box::new(LocalVariableAssign { key: variable_key(node)? }) as Box<dyn NodeStep>),
    ));

    registry.register(NodeType::new(
        VARIABLE_GET,
        "Get Variable",
        NodeCategory::Variable,
        "Reads a script variable",
        |node| Ok(Box::new(VariableGet { name: string_property(node, "variable")? }) as Box<dyn NodeStep>),
    ));

    registry.register(NodeType::new(
        VARIABLE_SET,
        "Set Variable",
        NodeCategory::Variable,
        "Assigns a script variable",
        |node| Ok(Box::new(VariableSet { name: string_property(node, "variable")? }) as Box<dyn NodeStep>),
    ));
}
