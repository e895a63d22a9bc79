// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for script graphs.

use crate::pin::{Pin, PinDirection};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node within a script graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in a script graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptNode {
    /// Unique node ID
    pub id: NodeId,
    /// Node type tag, resolved by the runtime's node registry
    pub node_type: String,
    /// Display name
    pub name: String,
    /// Pins in authored order, inputs and outputs interleaved freely
    pub pins: Vec<Pin>,
    /// Type specific configuration
    pub properties: IndexMap<String, Value>,
    /// Position in the graph UI
    pub position: [f32; 2],
}

impl ScriptNode {
    /// Create a node of the given type with no pins
    pub fn new(id: NodeId, node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Self {
            id,
            name: node_type.clone(),
            node_type,
            pins: Vec::new(),
            properties: IndexMap::new(),
            position: [0.0, 0.0],
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a pin
    pub fn with_pin(mut self, pin: Pin) -> Self {
        self.pins.push(pin);
        self
    }

    /// Set a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Get a property
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Pins of one direction in port order
    pub fn find_pins(&self, direction: PinDirection) -> impl Iterator<Item = &Pin> {
        self.pins.iter().filter(move |p| p.direction == direction)
    }

    /// Get the pin at a port index
    pub fn find_pin(&self, port: usize, direction: PinDirection) -> Option<&Pin> {
        self.find_pins(direction).nth(port)
    }

    /// Execution-relative index of a port: how many visible execution pins precede it
    pub fn execution_index_of_port(&self, port: usize, direction: PinDirection) -> usize {
        self.find_pins(direction)
            .take(port)
            .filter(|p| p.is_execution() && !p.hidden)
            .count()
    }

    /// Data-relative index of a port: how many visible data pins precede it
    pub fn data_index_of_port(&self, port: usize, direction: PinDirection) -> usize {
        self.find_pins(direction)
            .take(port)
            .filter(|p| !p.is_execution() && !p.hidden)
            .count()
    }

    /// The visible data pin at a data-relative index
    pub fn data_pin_at(&self, index: usize, direction: PinDirection) -> Option<&Pin> {
        self.find_pins(direction)
            .filter(|p| !p.is_execution() && !p.hidden)
            .nth(index)
    }

    /// Number of visible execution pins in a direction
    pub fn execution_pin_count(&self, direction: PinDirection) -> usize {
        self.find_pins(direction)
            .filter(|p| p.is_execution() && !p.hidden)
            .count()
    }

    /// Number of visible data pins in a direction
    pub fn data_pin_count(&self, direction: PinDirection) -> usize {
        self.find_pins(direction)
            .filter(|p| !p.is_execution() && !p.hidden)
            .count()
    }
}
