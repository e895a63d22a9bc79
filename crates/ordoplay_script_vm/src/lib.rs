// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime for `OrdoPlay` visual scripts.
//!
//! A function drawn in a [`ScriptGraph`](ordoplay_script_graph::ScriptGraph)
//! is compiled once into a flat layout: node instances addressed by index, and
//! a fixed-size stack of value slots. Every call gets its own stack and runs
//! the interpreter loop until the function returns, fails, or a node yields.
//!
//! ## Architecture
//!
//! - [`registry`]: node type tags to behavior constructors
//! - [`compiler`]: graph to [`CompiledFunction`]
//! - [`stack`] and [`context`]: per-call memory and the view node steps get
//! - [`interpreter`]: the execution loop
//! - [`continuation`] and [`events`]: suspended calls and event binding
//! - [`vm`]: the public entry point
//! - [`nodes`]: the standard node library

pub mod compiler;
pub mod context;
pub mod continuation;
pub mod error;
pub mod events;
pub mod function;
pub mod instance;
pub mod interpreter;
pub mod nodes;
pub mod registry;
pub mod settings;
pub mod stack;
pub mod variables;
pub mod vm;

#[cfg(test)]
mod test_support;

pub use compiler::GraphCompiler;
pub use context::{ExecutionContext, StepError};
pub use continuation::Continuation;
pub use error::{CallError, CallErrorKind, CompileError, VmError};
pub use events::EventHub;
pub use function::{CompiledFunction, Function, LocalSlot};
pub use instance::{ExecTarget, InputBinding, NodeInstance, NodeStep, StepMode, StepResult};
pub use interpreter::CallOutcome;
pub use registry::{NodeCategory, NodeConstructor, NodeRegistry, NodeType};
pub use settings::RuntimeSettings;
pub use stack::{ExecutionStack, FlowEntry, StackInfo};
pub use variables::{Variable, VariableStore};
pub use vm::{LoadReport, ScriptVm};
