// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function, variable and script definitions authored alongside the graph.

use crate::graph::ScriptGraph;
use crate::node::NodeId;
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A declared function argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Argument name
    pub name: String,
    /// Declared type, `Any` accepts everything
    pub value_type: ValueType,
}

impl Argument {
    /// Create a new argument
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// A function-local variable.
///
/// Read and assign nodes refer to it by `id`, so renaming never breaks the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVariable {
    /// Stable identity shared by every node bound to this variable
    pub id: Uuid,
    /// Variable name
    pub name: String,
    /// Value at the start of every call
    pub default_value: Value,
}

impl LocalVariable {
    /// Create a local variable with a fresh identity
    pub fn new(name: impl Into<String>, default_value: impl Into<Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            default_value: default_value.into(),
        }
    }
}

/// A function authored in a script graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Entry node
    pub entry: NodeId,
    /// Declared arguments
    pub arguments: Vec<Argument>,
    /// Local variables
    pub local_variables: Vec<LocalVariable>,
}

impl FunctionDefinition {
    /// Create a function starting at the given entry node
    pub fn new(name: impl Into<String>, entry: NodeId) -> Self {
        Self {
            name: name.into(),
            entry,
            arguments: Vec::new(),
            local_variables: Vec::new(),
        }
    }

    /// Append an argument
    pub fn with_argument(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.arguments.push(Argument::new(name, value_type));
        self
    }

    /// Append a local variable
    pub fn with_local(mut self, variable: LocalVariable) -> Self {
        self.local_variables.push(variable);
        self
    }

    /// Find a local variable by identity
    pub fn local_variable(&self, id: Uuid) -> Option<&LocalVariable> {
        self.local_variables.iter().find(|v| v.id == id)
    }
}

/// A script-level (member) variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    /// Variable name
    pub name: String,
    /// Declared type
    pub value_type: ValueType,
    /// Initial value
    pub default_value: Value,
    /// Whether the variable is visible to the host
    pub exported: bool,
}

impl VariableDefinition {
    /// Create a variable initialized to the type's zero value
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default_value: Value::default_for(value_type),
            exported: false,
        }
    }

    /// Set the initial value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Mark as exported
    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }
}

/// A script: one graph, its functions and its member variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// The graph every function is drawn in
    pub graph: ScriptGraph,
    /// Functions by name
    pub functions: IndexMap<String, FunctionDefinition>,
    /// Member variables
    pub variables: Vec<VariableDefinition>,
}

impl Script {
    /// Create a script around a graph
    pub fn new(graph: ScriptGraph) -> Self {
        Self {
            graph,
            functions: IndexMap::new(),
            variables: Vec::new(),
        }
    }

    /// Add a function, replacing one with the same name
    pub fn add_function(&mut self, function: FunctionDefinition) {
        self.functions.insert(function.name.clone(), function);
    }

    /// Add a member variable
    pub fn add_variable(&mut self, variable: VariableDefinition) {
        self.variables.push(variable);
    }
}
