// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiled functions.

use crate::instance::NodeInstance;
use crate::stack::StackInfo;
use indexmap::IndexMap;
use ordoplay_script_graph::{Argument, NodeId, Value};

/// Layout of a compiled function
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Entry node
    pub node: NodeId,
    /// Value slots a call needs
    pub max_stack: usize,
    /// Slot that swallows unconnected outputs
    pub trash_pos: usize,
    /// Flow stack entries per call
    pub flow_stack_size: usize,
    /// Memoized data nodes
    pub pass_stack_size: usize,
    /// Nodes on the execution path and their data closure
    pub node_count: usize,
    /// Declared arguments
    pub argument_count: usize,
    /// Widest input list of any node
    pub max_inputs: usize,
    /// Widest output list of any node
    pub max_outputs: usize,
    /// Local variable defaults by name
    pub variables: IndexMap<String, Value>,
}

impl Function {
    /// Stack layout for one call
    pub fn stack_info(&self) -> StackInfo {
        StackInfo {
            max_stack_size: self.max_stack,
            node_count: self.node_count,
            max_inputs: self.max_inputs,
            max_outputs: self.max_outputs,
            flow_size: self.flow_stack_size,
            pass_size: self.pass_stack_size,
        }
    }
}

/// A slot shared by the nodes bound to one local variable
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSlot {
    /// Working memory slot
    pub slot: usize,
    /// Value the slot starts every call with
    pub default_value: Value,
}

/// A function ready to run. Immutable and shared by every call.
#[derive(Debug)]
pub struct CompiledFunction {
    pub(crate) name: String,
    pub(crate) function: Function,
    pub(crate) arguments: Vec<Argument>,
    pub(crate) instances: Vec<NodeInstance>,
    pub(crate) lookup: IndexMap<NodeId, usize>,
    pub(crate) default_values: Vec<Value>,
    pub(crate) local_slots: Vec<LocalSlot>,
    pub(crate) entry: usize,
}

impl CompiledFunction {
    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layout
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// Declared arguments
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// All node instances, in execution index order
    pub fn instances(&self) -> &[NodeInstance] {
        &self.instances
    }

    /// Instance index of a graph node
    pub fn instance_index(&self, node: NodeId) -> Option<usize> {
        self.lookup.get(&node).copied()
    }

    /// Instance built from a graph node
    pub fn instance(&self, node: NodeId) -> Option<&NodeInstance> {
        self.instance_index(node).and_then(|index| self.instances.get(index))
    }

    /// Deduplicated default values for unconnected inputs
    pub fn default_values(&self) -> &[Value] {
        &self.default_values
    }

    /// Shared local variable slots
    pub fn local_slots(&self) -> &[LocalSlot] {
        &self.local_slots
    }

    /// Instance index of the entry node
    pub fn entry_index(&self) -> usize {
        self.entry
    }
}
