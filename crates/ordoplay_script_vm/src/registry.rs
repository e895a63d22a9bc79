// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node type registry.
//!
//! Maps the type tag stored on a graph node to a constructor that builds the
//! node's runtime behavior from its pins and properties.

use crate::error::CompileError;
use crate::instance::NodeStep;
use ordoplay_script_graph::ScriptNode;
use std::fmt;
use std::sync::Arc;

/// Node category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Function entry and result
    Function,
    /// Sequencing, branches and loops
    FlowControl,
    /// Constants and operators
    Math,
    /// Local and script variables
    Variable,
    /// Nodes that suspend the call
    Signal,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Builds a node behavior, or explains why the node is misconfigured
pub type NodeConstructor =
    Arc<dyn Fn(&ScriptNode) -> Result<Box<dyn NodeStep>, String> + Send + Sync>;

/// Node type definition
#[derive(Clone)]
pub struct NodeType {
    /// Unique type identifier, matched against `ScriptNode::node_type`
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Behavior constructor
    pub constructor: NodeConstructor,
}

impl NodeType {
    /// Create a node type
    pub fn new<F>(
        id: impl Into<String>,
        name: impl Into<String>,
        category: NodeCategory,
        description: impl Into<String>,
        constructor: F,
    ) -> Self
    where
        F: Fn(&ScriptNode) -> Result<Box<dyn NodeStep>, String> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: description.into(),
            constructor: Arc::new(constructor),
        }
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Registry of available node types
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    /// Registered node types by ID
    types: indexmap::IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: indexmap::IndexMap::new(),
        }
    }

    /// Register a node type, replacing one with the same ID
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Check whether a type ID is registered
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Build the behavior for a graph node
    pub fn instantiate(
        &self,
        function: &str,
        node: &ScriptNode,
    ) -> Result<Box<dyn NodeStep>, CompileError> {
        let node_type = self.get(&node.node_type).ok_or_else(|| CompileError::UnknownNodeType {
            function: function.to_string(),
            node: node.id,
            node_type: node.node_type.clone(),
        })?;

        (node_type.constructor)(node).map_err(|reason| CompileError::InvalidNode {
            function: function.to_string(),
            node: node.id,
            reason,
        })
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::instance::StepResult;
    use ordoplay_script_graph::NodeId;

    #[derive(Debug)]
    struct Idle;

    impl NodeStep for Idle {
        fn step(&self, _context: &mut ExecutionContext) -> StepResult {
            StepResult::NoAdvance
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register(NodeType::new("idle", "Idle", NodeCategory::Utility, "Does nothing", |_| {
            Ok(Box::new(Idle) as Box<dyn NodeStep>)
        }));
        registry.register(NodeType::new("broken", "Broken", NodeCategory::Custom, "Always fails", |_| {
            Err("missing property".to_string())
        }));
        registry
    }

    #[test]
    fn test_lookup() {
        let registry = registry();
        assert!(registry.contains("idle"));
        assert_eq!(registry.types().count(), 2);
        assert_eq!(registry.types_in_category(NodeCategory::Utility).count(), 1);
    }

    #[test]
    fn test_instantiate_errors() {
        let registry = registry();
        assert!(registry.instantiate("main", &ScriptNode::new(NodeId(1), "idle")).is_ok());
        assert!(matches!(
            registry.instantiate("main", &ScriptNode::new(NodeId(1), "missing")),
            Err(CompileError::UnknownNodeType { .. })
        ));
        assert!(matches!(
            registry.instantiate("main", &ScriptNode::new(NodeId(2), "broken")),
            Err(CompileError::InvalidNode { reason, .. }) if reason == "missing property"
        ));
    }
}
