// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script graph model for `OrdoPlay` visual scripting.
//!
//! This crate holds the in-memory form of a gameplay script as the editor
//! hands it to the runtime:
//! - Typed values and pins
//! - Nodes with ordered pins and type specific properties
//! - Connections between ports
//! - Function and variable definitions
//!
//! ## Architecture
//!
//! Execution and data pins share one ordered list per direction. A connection
//! names ports by index, and the pin at the source port decides whether the
//! connection carries execution flow or a value.

pub mod value;
pub mod pin;
pub mod node;
pub mod connection;
pub mod graph;
pub mod function;

pub use value::{ObjectRef, Value, ValueType};
pub use pin::{Pin, PinDirection, PinType};
pub use node::{NodeId, ScriptNode};
pub use connection::Connection;
pub use graph::{ConnectionError, ScriptGraph};
pub use function::{Argument, FunctionDefinition, LocalVariable, Script, VariableDefinition};
