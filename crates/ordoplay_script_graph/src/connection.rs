// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// A directed connection between two ports.
///
/// Ports are indices into the pins of one direction on each node. Whether the
/// connection carries execution or data is decided by the pin at the source port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Source node ID
    pub from_node: NodeId,
    /// Source output port
    pub from_port: usize,
    /// Target node ID
    pub to_node: NodeId,
    /// Target input port
    pub to_port: usize,
}

impl Connection {
    /// Create a new connection
    pub fn new(from_node: NodeId, from_port: usize, to_node: NodeId, to_port: usize) -> Self {
        Self {
            from_node,
            from_port,
            to_node,
            to_port,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }
}
