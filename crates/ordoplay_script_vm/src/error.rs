// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for compilation, calls and script variables.

use ordoplay_script_graph::{Connection, NodeId, ValueType};

/// Error raised while compiling a function graph
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The function's entry node is not in the graph
    #[error("Function '{function}': entry node {node} not found")]
    EntryNodeNotFound {
        /// Function being compiled
        function: String,
        /// Missing entry node
        node: NodeId,
    },

    /// A connection reaches a node that is not in the graph
    #[error("Function '{function}': node {node} not found")]
    NodeNotFound {
        /// Function being compiled
        function: String,
        /// Missing node
        node: NodeId,
    },

    /// The registry has no node type for a tag
    #[error("Function '{function}': node {node} has unknown type '{node_type}'")]
    UnknownNodeType {
        /// Function being compiled
        function: String,
        /// Offending node
        node: NodeId,
        /// Unresolved type tag
        node_type: String,
    },

    /// A node type rejected the node's configuration
    #[error("Function '{function}': node {node} is invalid: {reason}")]
    InvalidNode {
        /// Function being compiled
        function: String,
        /// Offending node
        node: NodeId,
        /// Constructor message
        reason: String,
    },

    /// A connection does not fit the pins it names
    #[error("Function '{function}': invalid connection {}: {reason}", describe(.connection))]
    InvalidWiring {
        /// Function being compiled
        function: String,
        /// Offending connection
        connection: Connection,
        /// What is wrong with it
        reason: String,
    },

    /// Pure data nodes feed each other in a loop
    #[error("Function '{function}': data dependency cycle through node {node}")]
    DataCycle {
        /// Function being compiled
        function: String,
        /// A node on the cycle
        node: NodeId,
    },

    /// A function with the same name is already registered
    #[error("Function '{0}' is already registered")]
    DuplicateFunction(String),
}

impl CompileError {
    /// Name of the function that failed to compile
    pub fn function(&self) -> &str {
        match self {
            Self::EntryNodeNotFound { function, .. }
            | Self::NodeNotFound { function, .. }
            | Self::UnknownNodeType { function, .. }
            | Self::InvalidNode { function, .. }
            | Self::InvalidWiring { function, .. }
            | Self::DataCycle { function, .. }
            | Self::DuplicateFunction(function) => function,
        }
    }
}

/// Category of a call failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallErrorKind {
    /// An argument or node input had the wrong type
    InvalidArgument {
        /// Argument or input index
        argument: usize,
    },
    /// Fewer arguments than the function declares
    TooFewArguments {
        /// Declared argument count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },
    /// More arguments than the function declares
    TooManyArguments {
        /// Declared argument count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },
    /// The call or a node step broke a runtime rule
    InvalidMethod,
    /// The flow stack or call stack limit was exceeded
    StackOverflow,
    /// A node step reported a failure
    NodeFailure,
}

/// A call that aborted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{function}{}: {reason}", node_suffix(.node))]
pub struct CallError {
    /// What went wrong
    pub kind: CallErrorKind,
    /// Function that was running
    pub function: String,
    /// Node that was running, if any
    pub node: Option<NodeId>,
    /// Human readable message
    pub reason: String,
}

fn describe(connection: &Connection) -> String {
    format!(
        "{}:{} -> {}:{}",
        connection.from_node, connection.from_port, connection.to_node, connection.to_port
    )
}

fn node_suffix(node: &Option<NodeId>) -> String {
    node.map(|node| format!(" (node {node})")).unwrap_or_default()
}

impl CallError {
    /// Create an error not tied to a node
    pub fn new(kind: CallErrorKind, function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            function: function.into(),
            node: None,
            reason: reason.into(),
        }
    }

    /// Attach the node that was running
    pub fn at_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }
}

/// Error raised by script variable operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// A variable with this name already exists
    #[error("Variable '{0}' is already registered")]
    DuplicateVariable(String),

    /// No variable with this name
    #[error("Variable '{0}' not found")]
    UnknownVariable(String),

    /// The value does not fit the variable's declared type
    #[error("Variable '{name}' is {expected}, got {found}")]
    TypeMismatch {
        /// Variable name
        name: String,
        /// Declared type
        expected: ValueType,
        /// Type of the rejected value
        found: ValueType,
    },
}
