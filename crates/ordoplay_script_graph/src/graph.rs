// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.

use crate::connection::Connection;
use crate::node::{NodeId, ScriptNode};
use crate::pin::PinDirection;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// A script graph shared by all functions of a script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptGraph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, ScriptNode>,
    /// Connections between nodes
    connections: IndexSet<Connection>,
}

impl ScriptGraph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexSet::new(),
        }
    }

    /// Next unused node ID
    pub fn next_node_id(&self) -> NodeId {
        NodeId(self.nodes.keys().map(|id| id.0 + 1).max().unwrap_or(1))
    }

    /// Add a node to the graph, replacing any node with the same ID
    pub fn add_node(&mut self, node: ScriptNode) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<ScriptNode> {
        self.connections.retain(|c| !c.involves_node(node_id));
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&ScriptNode> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut ScriptNode> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &ScriptNode> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a connection between ports
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: usize,
        to_node: NodeId,
        to_port: usize,
    ) -> Result<Connection, ConnectionError> {
        let source_node = self.nodes.get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self.nodes.get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;

        let source_pin = source_node.find_pin(from_port, PinDirection::Output)
            .ok_or(ConnectionError::PortNotFound { node: from_node, port: from_port })?;
        let target_pin = target_node.find_pin(to_port, PinDirection::Input)
            .ok_or(ConnectionError::PortNotFound { node: to_node, port: to_port })?;

        if !source_pin.can_connect(target_pin) {
            return Err(ConnectionError::IncompatiblePins);
        }

        // Data inputs take a single value
        if !target_pin.is_execution()
            && self.connections.iter().any(|c| c.to_node == to_node && c.to_port == to_port)
        {
            return Err(ConnectionError::PortAlreadyConnected { node: to_node, port: to_port });
        }

        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        let connection = Connection::new(from_node, from_port, to_node, to_port);
        self.connections.insert(connection);
        Ok(connection)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection: &Connection) -> bool {
        self.connections.shift_remove(connection)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Get connections leaving a node
    pub fn connections_from(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.from_node == node_id)
    }

    /// Get connections entering a node
    pub fn connections_to(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.to_node == node_id)
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ScriptGraph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when creating a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port {port} not found on node {node}")]
    PortNotFound {
        /// Node that was searched
        node: NodeId,
        /// Missing port index
        port: usize,
    },

    /// Incompatible pin types or directions
    #[error("Incompatible pins")]
    IncompatiblePins,

    /// Data input already has a source
    #[error("Port {port} on node {node} is already connected")]
    PortAlreadyConnected {
        /// Target node
        node: NodeId,
        /// Target port
        port: usize,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}
