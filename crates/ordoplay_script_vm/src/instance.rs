// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiled node instances and the step protocol node behaviors implement.

use crate::context::ExecutionContext;
use ordoplay_script_graph::NodeId;
use std::fmt;
use uuid::Uuid;

/// Output slot placeholder used while a function is being compiled
pub(crate) const UNASSIGNED_SLOT: usize = usize::MAX;

/// How a node is being entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// First visit from the flow
    Begin,
    /// Re-entered after a branch it pushed has finished
    Continue,
    /// Re-entered from a continuation after it yielded
    Resume,
}

/// What a node step asks the interpreter to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Follow the given execution output
    Advance(usize),
    /// Follow the given execution output and come back here when that branch ends
    Push(usize),
    /// Return to the previous flow stack entry
    GoBack,
    /// Stay on the flow stack without following an output
    NoAdvance,
    /// Return from the function with working memory slot 0
    End,
    /// Suspend the call into a continuation
    Yield,
}

impl StepResult {
    /// Execution output selected by the step
    pub fn port(&self) -> Option<usize> {
        match self {
            Self::Advance(port) | Self::Push(port) => Some(*port),
            _ => None,
        }
    }

    /// Whether the node asked to be revisited
    pub fn pushes_stack(&self) -> bool {
        matches!(self, Self::Push(_))
    }
}

/// Behavior of a node type.
///
/// One behavior value is shared by every call of a compiled function, so all
/// per-call state lives in working memory.
pub trait NodeStep: fmt::Debug + Send + Sync {
    /// Number of persistent slots the node needs across visits
    fn working_memory_size(&self) -> usize {
        0
    }

    /// Identity of a local variable whose slot this node shares
    fn shared_memory_key(&self) -> Option<Uuid> {
        None
    }

    /// Run one visit of the node
    fn step(&self, context: &mut ExecutionContext) -> StepResult;
}

/// Where a data input reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputBinding {
    /// Not wired yet, only seen during compilation
    Unassigned,
    /// Reads the slot a connected output writes
    Stack(usize),
    /// Reads a private slot refreshed from the default table before each visit
    Default {
        /// Index in the function's default value table
        value: usize,
        /// Slot the default is copied into
        slot: usize,
    },
}

impl InputBinding {
    /// Slot the input reads from
    pub fn slot(&self) -> Option<usize> {
        match self {
            Self::Unassigned => None,
            Self::Stack(slot) | Self::Default { slot, .. } => Some(*slot),
        }
    }
}

/// Target of an execution output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecTarget {
    /// Instance index of the target node
    pub instance: usize,
    /// Execution-relative input port on the target
    pub port: usize,
}

/// A node laid out for execution
#[derive(Debug)]
pub struct NodeInstance {
    pub(crate) id: NodeId,
    pub(crate) node_type: String,
    pub(crate) execution_index: usize,
    pub(crate) pass_index: Option<usize>,
    pub(crate) working_memory_index: Option<usize>,
    pub(crate) execution_input_pin_count: usize,
    pub(crate) execution_output_pin_count: usize,
    pub(crate) input_pins: Vec<InputBinding>,
    pub(crate) output_pins: Vec<usize>,
    pub(crate) execution_outputs: Vec<Option<ExecTarget>>,
    pub(crate) dependencies: Vec<usize>,
    pub(crate) behavior: Box<dyn NodeStep>,
}

impl NodeInstance {
    pub(crate) fn new(
        id: NodeId,
        node_type: impl Into<String>,
        execution_index: usize,
        behavior: Box<dyn NodeStep>,
    ) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            execution_index,
            pass_index: None,
            working_memory_index: None,
            execution_input_pin_count: 0,
            execution_output_pin_count: 0,
            input_pins: Vec::new(),
            output_pins: Vec::new(),
            execution_outputs: Vec::new(),
            dependencies: Vec::new(),
            behavior,
        }
    }

    /// Graph node this instance was built from
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node type tag
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Dense index into the executed flags
    pub fn execution_index(&self) -> usize {
        self.execution_index
    }

    /// Pass stack entry, set for memoized data nodes
    pub fn pass_index(&self) -> Option<usize> {
        self.pass_index
    }

    /// First working memory slot
    pub fn working_memory_index(&self) -> Option<usize> {
        self.working_memory_index
    }

    /// Working memory slots the behavior declared
    pub fn working_memory_size(&self) -> usize {
        self.behavior.working_memory_size()
    }

    /// Visible execution inputs
    pub fn execution_input_pin_count(&self) -> usize {
        self.execution_input_pin_count
    }

    /// Visible execution outputs
    pub fn execution_output_pin_count(&self) -> usize {
        self.execution_output_pin_count
    }

    /// Data input bindings
    pub fn input_pins(&self) -> &[InputBinding] {
        &self.input_pins
    }

    /// Data output slots
    pub fn output_pins(&self) -> &[usize] {
        &self.output_pins
    }

    /// Execution output targets
    pub fn execution_outputs(&self) -> &[Option<ExecTarget>] {
        &self.execution_outputs
    }

    /// Instances that must run before this one in each pass
    pub fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }
}
