// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script virtual machine: registered functions, script variables and calls.

use crate::compiler::GraphCompiler;
use crate::context::ExecutionContext;
use crate::error::{CallError, CallErrorKind, CompileError, VmError};
use crate::function::CompiledFunction;
use crate::interpreter::{self, CallOutcome};
use crate::nodes;
use crate::registry::NodeRegistry;
use crate::settings::RuntimeSettings;
use crate::stack::ExecutionStack;
use crate::variables::VariableStore;
use indexmap::IndexMap;
use ordoplay_script_graph::{FunctionDefinition, Script, ScriptGraph, Value, ValueType, VariableDefinition};
use std::sync::Arc;

/// Outcome of loading a whole script
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Functions that compiled and were registered
    pub registered: Vec<String>,
    /// Functions that failed to compile
    pub errors: Vec<CompileError>,
    /// Variables that failed to register
    pub variable_errors: Vec<VmError>,
}

impl LoadReport {
    /// Whether everything loaded
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.variable_errors.is_empty()
    }
}

/// The script runtime
#[derive(Debug)]
pub struct ScriptVm {
    settings: RuntimeSettings,
    registry: NodeRegistry,
    functions: IndexMap<String, Arc<CompiledFunction>>,
    variables: Arc<VariableStore>,
}

impl ScriptVm {
    /// Create a VM with the standard node library
    pub fn new(settings: RuntimeSettings) -> Self {
        Self::with_registry(settings, nodes::standard_registry())
    }

    /// Create a VM with a custom node registry
    pub fn with_registry(settings: RuntimeSettings, registry: NodeRegistry) -> Self {
        Self {
            settings,
            registry,
            functions: IndexMap::new(),
            variables: Arc::new(VariableStore::new()),
        }
    }

    /// Runtime settings
    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Node registry
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Mutable node registry, for registering custom node types
    pub fn registry_mut(&mut self) -> &mut NodeRegistry {
        &mut self.registry
    }

    /// Register a script variable
    pub fn register_variable(&mut self, definition: &VariableDefinition) -> Result<(), VmError> {
        self.variables.register(definition)
    }

    /// Current value of a script variable
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name)
    }

    /// Assign a script variable
    pub fn set_variable(&self, name: &str, value: Value) -> Result<(), VmError> {
        self.variables.set(name, value)
    }

    /// Script variables
    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.variables
    }

    /// Compile and register a function. On failure nothing is registered.
    pub fn register_function(
        &mut self,
        graph: &ScriptGraph,
        definition: &FunctionDefinition,
    ) -> Result<(), CompileError> {
        if self.functions.contains_key(&definition.name) {
            return Err(CompileError::DuplicateFunction(definition.name.clone()));
        }

        let compiled = GraphCompiler::new(&self.registry, &self.settings).compile(graph, definition)?;
        self.functions.insert(definition.name.clone(), Arc::new(compiled));
        tracing::debug!("Registered script function '{}'", definition.name);
        Ok(())
    }

    /// Register every variable and function of a script, collecting failures
    pub fn load_script(&mut self, script: &Script) -> LoadReport {
        let mut report = LoadReport::default();

        for variable in &script.variables {
            if let Err(e) = self.register_variable(variable) {
                tracing::warn!("Failed to register variable '{}': {}", variable.name, e);
                report.variable_errors.push(e);
            }
        }

        for definition in script.functions.values() {
            match self.register_function(&script.graph, definition) {
                Ok(()) => report.registered.push(definition.name.clone()),
                Err(e) => {
                    tracing::warn!("Failed to compile function '{}': {}", definition.name, e);
                    report.errors.push(e);
                }
            }
        }

        tracing::info!(
            "Loaded script '{}': {} functions, {} errors",
            script.graph.name,
            report.registered.len(),
            report.errors.len() + report.variable_errors.len()
        );
        report
    }

    /// Check whether a function is registered
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// A registered function
    pub fn function(&self, name: &str) -> Option<&Arc<CompiledFunction>> {
        self.functions.get(name)
    }

    /// Registered function names in registration order
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Call a function
    pub fn call(&self, name: &str, arguments: &[Value]) -> Result<CallOutcome, CallError> {
        let result = self.prepare(name, arguments);
        let (function, context) = match result {
            Ok(prepared) => prepared,
            Err(error) => {
                tracing::error!("Script call failed: {}", error);
                return Err(error);
            }
        };

        let entry = function.entry;
        interpreter::execute(function, context, entry, 0, false)
    }

    pub(crate) fn prepare(
        &self,
        name: &str,
        arguments: &[Value],
    ) -> Result<(Arc<CompiledFunction>, ExecutionContext), CallError> {
        let function = self.functions.get(name).ok_or_else(|| {
            CallError::new(CallErrorKind::InvalidMethod, name, format!("Function '{name}' not found"))
        })?;

        let expected = function.arguments.len();
        let found = arguments.len();
        if found < expected {
            return Err(CallError::new(
                CallErrorKind::TooFewArguments { expected, found },
                name,
                format!("Expected {expected} arguments, got {found}"),
            ));
        }
        if found > expected {
            return Err(CallError::new(
                CallErrorKind::TooManyArguments { expected, found },
                name,
                format!("Expected {expected} arguments, got {found}"),
            ));
        }

        for (index, (argument, declared)) in arguments.iter().zip(&function.arguments).enumerate() {
            let fits = argument.matches_type(declared.value_type)
                || (argument.is_nil() && declared.value_type == ValueType::Object);
            if !fits {
                return Err(CallError::new(
                    CallErrorKind::InvalidArgument { argument: index },
                    name,
                    format!(
                        "Argument '{}' expects {}, got {}",
                        declared.name,
                        declared.value_type,
                        argument.value_type()
                    ),
                ));
            }
        }

        let layout = &function.function;
        if layout.max_stack > self.settings.max_call_stack {
            return Err(CallError::new(
                CallErrorKind::StackOverflow,
                name,
                format!(
                    "Function needs {} stack slots, the limit is {}",
                    layout.max_stack, self.settings.max_call_stack
                ),
            ));
        }

        let mut stack = ExecutionStack::new(layout.stack_info());
        stack.push_arguments(arguments);
        for local in &function.local_slots {
            stack.set_slot(local.slot, local.default_value.clone());
        }

        let mut context = ExecutionContext::new(
            stack,
            Arc::clone(&self.variables),
            self.settings.max_loop_iterations,
            layout.node,
        );
        context.set_flow_entry(0, layout.node, false);

        Ok((Arc::clone(function), context))
    }
}

impl Default for ScriptVm {
    fn default() -> Self {
        Self::new(RuntimeSettings::default())
    }
}
