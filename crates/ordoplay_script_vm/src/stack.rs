// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-call execution stack.
//!
//! One block per call, sized from the compiled function and never resized.
//! Regions:
//! - Value slots: arguments, node outputs, working memory, default copies, trash
//! - Executed flags, one per node
//! - Input and output scratch, holding the slot indices of the running node
//! - Flow stack
//! - Pass stack, one entry per memoized data node

use ordoplay_script_graph::{NodeId, Value};
use std::mem;

/// Sizes of every region of an execution stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackInfo {
    /// Value slots
    pub max_stack_size: usize,
    /// Nodes, one executed flag each
    pub node_count: usize,
    /// Input scratch entries
    pub max_inputs: usize,
    /// Output scratch entries
    pub max_outputs: usize,
    /// Flow stack entries
    pub flow_size: usize,
    /// Pass stack entries
    pub pass_size: usize,
}

impl StackInfo {
    /// Size of the whole block in bytes
    pub fn stack_size(&self) -> usize {
        self.max_stack_size * size_of::<Value>()
            + self.node_count * size_of::<bool>()
            + (self.max_inputs + self.max_outputs) * size_of::<usize>()
            + self.flow_size * size_of::<FlowEntry>()
            + self.pass_size * size_of::<u64>()
    }
}

/// A flow stack entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowEntry {
    /// Node at this position
    pub node: NodeId,
    /// Whether the node asked to be revisited
    pub pushed: bool,
}

impl FlowEntry {
    const EMPTY: FlowEntry = FlowEntry {
        node: NodeId(0),
        pushed: false,
    };
}

/// The memory block of one call
#[derive(Debug)]
pub struct ExecutionStack {
    info: StackInfo,
    slots: Box<[Value]>,
    executed: Box<[bool]>,
    inputs: Box<[usize]>,
    outputs: Box<[usize]>,
    flow: Box<[FlowEntry]>,
    passes: Box<[u64]>,
    released: bool,
}

impl ExecutionStack {
    /// Allocate and initialize a stack
    pub fn new(info: StackInfo) -> Self {
        Self {
            info,
            slots: vec![Value::Nil; info.max_stack_size].into_boxed_slice(),
            executed: vec![false; info.node_count].into_boxed_slice(),
            inputs: vec![0; info.max_inputs].into_boxed_slice(),
            outputs: vec![0; info.max_outputs].into_boxed_slice(),
            flow: vec![FlowEntry::EMPTY; info.flow_size].into_boxed_slice(),
            passes: vec![0; info.pass_size].into_boxed_slice(),
            released: false,
        }
    }

    /// Region sizes
    pub fn info(&self) -> StackInfo {
        self.info
    }

    /// Size of the block in bytes
    pub fn stack_size(&self) -> usize {
        self.info.stack_size()
    }

    /// Value slots
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    /// Read a slot
    pub fn slot(&self, index: usize) -> Option<&Value> {
        self.slots.get(index)
    }

    /// Write a slot, ignoring indices past the end
    pub fn set_slot(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = value;
        }
    }

    /// Copy call arguments into the leading slots
    pub fn push_arguments(&mut self, arguments: &[Value]) {
        for (slot, argument) in self.slots.iter_mut().zip(arguments) {
            *slot = argument.clone();
        }
    }

    pub(crate) fn input_slot(&self, index: usize) -> Option<usize> {
        self.inputs.get(index).copied()
    }

    pub(crate) fn set_input_slot(&mut self, index: usize, slot: usize) {
        if let Some(entry) = self.inputs.get_mut(index) {
            *entry = slot;
        }
    }

    pub(crate) fn output_slot(&self, index: usize) -> Option<usize> {
        self.outputs.get(index).copied()
    }

    pub(crate) fn set_output_slot(&mut self, index: usize, slot: usize) {
        if let Some(entry) = self.outputs.get_mut(index) {
            *entry = slot;
        }
    }

    pub(crate) fn is_executed(&self, execution_index: usize) -> bool {
        self.executed.get(execution_index).copied().unwrap_or(false)
    }

    pub(crate) fn set_executed(&mut self, execution_index: usize, executed: bool) {
        if let Some(flag) = self.executed.get_mut(execution_index) {
            *flag = executed;
        }
    }

    /// Number of flow stack entries
    pub fn flow_size(&self) -> usize {
        self.flow.len()
    }

    pub(crate) fn flow_entry(&self, position: usize) -> Option<FlowEntry> {
        self.flow.get(position).copied()
    }

    pub(crate) fn set_flow_entry(&mut self, position: usize, entry: FlowEntry) {
        if let Some(slot) = self.flow.get_mut(position) {
            *slot = entry;
        }
    }

    pub(crate) fn pass(&self, pass_index: usize) -> u64 {
        self.passes.get(pass_index).copied().unwrap_or(0)
    }

    pub(crate) fn set_pass(&mut self, pass_index: usize, pass: u64) {
        if let Some(entry) = self.passes.get_mut(pass_index) {
            *entry = pass;
        }
    }

    /// Release every slot. Returns the number of slots that held a value.
    fn teardown(&mut self) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;

        self.slots
            .iter_mut()
            .map(mem::take)
            .filter(|value| !value.is_nil())
            .count()
    }
}

impl Drop for ExecutionStack {
    fn drop(&mut self) {
        let released = self.teardown();
        tracing::trace!(released, bytes = self.info.stack_size(), "Execution stack released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_script_graph::ObjectRef;

    fn info() -> StackInfo {
        StackInfo {
            max_stack_size: 4,
            node_count: 3,
            max_inputs: 2,
            max_outputs: 2,
            flow_size: 8,
            pass_size: 1,
        }
    }

    #[test]
    fn test_stack_size() {
        let info = info();
        let expected = 4 * size_of::<Value>()
            + 3 * size_of::<bool>()
            + 4 * size_of::<usize>()
            + 8 * size_of::<FlowEntry>()
            + size_of::<u64>();
        assert_eq!(info.stack_size(), expected);
        assert_eq!(StackInfo::default().stack_size(), 0);
    }

    #[test]
    fn test_new_stack_is_initialized() {
        let stack = ExecutionStack::new(info());
        assert!(stack.slots().iter().all(Value::is_nil));
        assert!(!stack.is_executed(2));
        assert_eq!(stack.flow_size(), 8);
        assert_eq!(stack.pass(0), 0);
    }

    #[test]
    fn test_push_arguments() {
        let mut stack = ExecutionStack::new(info());
        stack.push_arguments(&[Value::Int(1), Value::Bool(true)]);
        assert_eq!(stack.slot(0), Some(&Value::Int(1)));
        assert_eq!(stack.slot(1), Some(&Value::Bool(true)));
        assert_eq!(stack.slot(2), Some(&Value::Nil));
    }

    #[test]
    fn test_out_of_range_writes_are_ignored() {
        let mut stack = ExecutionStack::new(info());
        stack.set_slot(99, Value::Int(1));
        stack.set_flow_entry(99, FlowEntry::EMPTY);
        assert_eq!(stack.slot(99), None);
        assert_eq!(stack.flow_entry(99), None);
    }

    #[test]
    fn test_drop_releases_objects() {
        let object = ObjectRef::new(5_u32);
        let mut stack = ExecutionStack::new(info());
        stack.set_slot(0, Value::Object(object.clone()));
        stack.set_slot(3, Value::Object(object.clone()));
        assert_eq!(object.handle_count(), 3);

        drop(stack);
        assert_eq!(object.handle_count(), 1);
    }

    #[test]
    fn test_teardown_runs_once() {
        let mut stack = ExecutionStack::new(info());
        stack.set_slot(1, Value::Int(3));
        assert_eq!(stack.teardown(), 1);
        assert_eq!(stack.teardown(), 0);
    }
}
