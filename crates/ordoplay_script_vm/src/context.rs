// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution context handed to node steps.
//!
//! Wraps the call's [`ExecutionStack`] together with the interpreter cursor.
//! Node behaviors only see the running node: its inputs, outputs and working
//! memory are exposed by index, already resolved to stack slots.

use crate::error::CallErrorKind;
use crate::instance::StepMode;
use crate::stack::{ExecutionStack, FlowEntry};
use crate::variables::VariableStore;
use ordoplay_script_graph::{NodeId, Value, ValueType};
use std::sync::Arc;

static NIL: Value = Value::Nil;

/// Failure reported by a node step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepError {
    /// Failure category
    pub kind: CallErrorKind,
    /// Message
    pub reason: String,
}

/// State of one call
#[derive(Debug)]
pub struct ExecutionContext {
    pub(crate) stack: ExecutionStack,
    pub(crate) variables: Arc<VariableStore>,
    pub(crate) max_loop_iterations: u64,
    /// Entry node, which takes its inputs from the call arguments
    pub(crate) initial_node: NodeId,
    pub(crate) current_node: NodeId,
    pub(crate) current_node_port: usize,
    pub(crate) step_mode: StepMode,
    /// Incremented once per visited node
    pub(crate) passes: u64,
    pub(crate) flow_position: usize,
    working_memory: Option<usize>,
    working_memory_size: usize,
    input_count: usize,
    output_count: usize,
    error: Option<StepError>,
    awaited_event: Option<String>,
    resume_arguments: Vec<Value>,
}

impl ExecutionContext {
    pub(crate) fn new(
        stack: ExecutionStack,
        variables: Arc<VariableStore>,
        max_loop_iterations: u64,
        initial_node: NodeId,
    ) -> Self {
        Self {
            stack,
            variables,
            max_loop_iterations,
            initial_node,
            current_node: initial_node,
            current_node_port: 0,
            step_mode: StepMode::Begin,
            passes: 0,
            flow_position: 0,
            working_memory: None,
            working_memory_size: 0,
            input_count: 0,
            output_count: 0,
            error: None,
            awaited_event: None,
            resume_arguments: Vec::new(),
        }
    }

    /// Value of a data input, `Nil` past the node's input count
    pub fn input(&self, index: usize) -> &Value {
        if index >= self.input_count {
            return &NIL;
        }
        self.stack
            .input_slot(index)
            .and_then(|slot| self.stack.slot(slot))
            .unwrap_or(&NIL)
    }

    /// Number of data inputs of the running node
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    /// Write a data output
    pub fn set_output(&mut self, index: usize, value: Value) {
        match self.output_slot(index) {
            Some(slot) => self.stack.set_slot(slot, value),
            None => self.fail(
                CallErrorKind::InvalidMethod,
                format!("Output {index} is out of range ({} outputs)", self.output_count),
            ),
        }
    }

    /// Number of data outputs of the running node
    pub fn output_count(&self) -> usize {
        self.output_count
    }

    /// Copy a data input to a data output
    pub fn copy_input_to_output(&mut self, input: usize, output: usize) {
        let value = self.input(input).clone();
        self.set_output(output, value);
    }

    /// Read a working memory slot, `Nil` past the declared size
    pub fn working_memory(&self, index: usize) -> &Value {
        self.working_memory_slot(index)
            .and_then(|slot| self.stack.slot(slot))
            .unwrap_or(&NIL)
    }

    /// Write a working memory slot
    pub fn set_working_memory(&mut self, index: usize, value: Value) {
        match self.working_memory_slot(index) {
            Some(slot) => self.stack.set_slot(slot, value),
            None => self.fail(
                CallErrorKind::InvalidMethod,
                format!("Working memory index {index} is out of range"),
            ),
        }
    }

    /// Whether the running node has working memory
    pub fn has_working_memory(&self) -> bool {
        self.working_memory.is_some() && self.working_memory_size > 0
    }

    /// How the running node is being entered
    pub fn step_mode(&self) -> StepMode {
        self.step_mode
    }

    /// Running node
    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    /// Execution input the running node was entered through
    pub fn current_node_port(&self) -> usize {
        self.current_node_port
    }

    /// Pass counter
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Report a node failure. The call aborts after the step returns.
    pub fn set_error(&mut self, reason: impl Into<String>) {
        self.fail(CallErrorKind::NodeFailure, reason.into());
    }

    /// Report an input of the wrong type
    pub fn set_invalid_argument(&mut self, argument: usize, expected: ValueType, found: ValueType) {
        self.fail(
            CallErrorKind::InvalidArgument { argument },
            format!("Input {argument} expects {expected}, got {found}"),
        );
    }

    /// Whether the running step has reported an error
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Name the event a yielding node waits for
    pub fn await_event(&mut self, event: impl Into<String>) {
        self.awaited_event = Some(event.into());
    }

    /// Arguments the continuation was resumed with
    pub fn resume_arguments(&self) -> &[Value] {
        &self.resume_arguments
    }

    /// Script variables
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Iterations a loop node may run
    pub fn max_loop_iterations(&self) -> u64 {
        self.max_loop_iterations
    }

    /// The call's stack
    pub fn stack(&self) -> &ExecutionStack {
        &self.stack
    }

    fn fail(&mut self, kind: CallErrorKind, reason: String) {
        // The first failure of a step wins
        if self.error.is_none() {
            self.error = Some(StepError { kind, reason });
        }
    }

    fn output_slot(&self, index: usize) -> Option<usize> {
        if index >= self.output_count {
            return None;
        }
        self.stack.output_slot(index)
    }

    fn working_memory_slot(&self, index: usize) -> Option<usize> {
        if index >= self.working_memory_size {
            return None;
        }
        self.working_memory.map(|base| base + index)
    }

    // Interpreter side

    pub(crate) fn bind_arguments(&mut self, count: usize) {
        for index in 0..count {
            self.stack.set_input_slot(index, index);
        }
        self.input_count = count;
    }

    pub(crate) fn bind_input(&mut self, index: usize, slot: usize) {
        self.stack.set_input_slot(index, slot);
    }

    pub(crate) fn set_input_count(&mut self, count: usize) {
        self.input_count = count;
    }

    pub(crate) fn bind_output(&mut self, index: usize, slot: usize) {
        self.stack.set_output_slot(index, slot);
    }

    pub(crate) fn set_output_count(&mut self, count: usize) {
        self.output_count = count;
    }

    pub(crate) fn prime_working_memory(&mut self, index: Option<usize>, size: usize) {
        self.working_memory = index;
        self.working_memory_size = if index.is_some() { size } else { 0 };
    }

    pub(crate) fn take_error(&mut self) -> Option<StepError> {
        self.error.take()
    }

    pub(crate) fn take_awaited_event(&mut self) -> Option<String> {
        self.awaited_event.take()
    }

    pub(crate) fn set_resume_arguments(&mut self, arguments: Vec<Value>) {
        self.resume_arguments = arguments;
    }

    pub(crate) fn flow_entry(&self, position: usize) -> Option<FlowEntry> {
        self.stack.flow_entry(position)
    }

    pub(crate) fn set_flow_entry(&mut self, position: usize, node: NodeId, pushed: bool) {
        self.stack.set_flow_entry(position, FlowEntry { node, pushed });
    }
}
