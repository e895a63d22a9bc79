// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pin definitions for node inputs/outputs.

use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinDirection {
    /// Input pin
    Input,
    /// Output pin
    Output,
}

/// What a pin carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinType {
    /// Execution flow
    Execution,
    /// A value of the given type
    Data(ValueType),
}

impl PinType {
    /// Check if this pin type can connect to another pin type
    pub fn can_connect_to(&self, other: &PinType) -> bool {
        match (self, other) {
            (Self::Execution, Self::Execution) => true,
            (Self::Data(a), Self::Data(b)) => a.can_connect_to(b),
            _ => false,
        }
    }
}

/// A pin on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    /// Pin name
    pub name: String,
    /// Pin direction
    pub direction: PinDirection,
    /// Execution or data type
    pub pin_type: PinType,
    /// Default value (for data inputs)
    pub default_value: Option<Value>,
    /// Hidden pins carry no runtime slot
    pub hidden: bool,
}

impl Pin {
    /// Create a new pin
    pub fn new(name: impl Into<String>, pin_type: PinType, direction: PinDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            pin_type,
            default_value: None,
            hidden: false,
        }
    }

    /// Create an execution input pin
    pub fn exec_input(name: impl Into<String>) -> Self {
        Self::new(name, PinType::Execution, PinDirection::Input)
    }

    /// Create an execution output pin
    pub fn exec_output(name: impl Into<String>) -> Self {
        Self::new(name, PinType::Execution, PinDirection::Output)
    }

    /// Create a data input pin
    pub fn input(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, PinType::Data(value_type), PinDirection::Input)
    }

    /// Create a data output pin
    pub fn output(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, PinType::Data(value_type), PinDirection::Output)
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Mark as hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Whether this pin carries execution flow
    pub fn is_execution(&self) -> bool {
        matches!(self.pin_type, PinType::Execution)
    }

    /// Whether this is an input pin
    pub fn is_input(&self) -> bool {
        self.direction == PinDirection::Input
    }

    /// Data type of the pin, `None` for execution pins
    pub fn value_type(&self) -> Option<ValueType> {
        match self.pin_type {
            PinType::Execution => None,
            PinType::Data(value_type) => Some(value_type),
        }
    }

    /// The declared default, or the zero value of the pin's type
    pub fn effective_default_value(&self) -> Value {
        match (&self.default_value, self.pin_type) {
            (Some(value), _) => value.clone(),
            (None, PinType::Data(value_type)) => Value::default_for(value_type),
            (None, PinType::Execution) => Value::Nil,
        }
    }

    /// Check if a connection to another pin is valid
    pub fn can_connect(&self, other: &Pin) -> bool {
        if self.direction == other.direction {
            return false;
        }

        if self.hidden || other.hidden {
            return false;
        }

        self.pin_type.can_connect_to(&other.pin_type)
    }
}
