// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script-level variables shared by the VM and its running calls.

use crate::error::VmError;
use indexmap::IndexMap;
use ordoplay_script_graph::{Value, ValueType, VariableDefinition};
use parking_lot::RwLock;

/// A registered script variable
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Current value
    pub value: Value,
    /// Declared type
    pub value_type: ValueType,
    /// Whether the host may see it
    pub exported: bool,
}

/// Thread-safe script variable storage
#[derive(Debug, Default)]
pub struct VariableStore {
    variables: RwLock<IndexMap<String, Variable>>,
}

impl VariableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable with its default value
    pub fn register(&self, definition: &VariableDefinition) -> Result<(), VmError> {
        let mut variables = self.variables.write();
        if variables.contains_key(&definition.name) {
            return Err(VmError::DuplicateVariable(definition.name.clone()));
        }

        variables.insert(
            definition.name.clone(),
            Variable {
                value: definition.default_value.clone(),
                value_type: definition.value_type,
                exported: definition.exported,
            },
        );
        Ok(())
    }

    /// Current value of a variable
    pub fn get(&self, name: &str) -> Option<Value> {
        self.variables.read().get(name).map(|v| v.value.clone())
    }

    /// Assign a variable
    pub fn set(&self, name: &str, value: Value) -> Result<(), VmError> {
        let mut variables = self.variables.write();
        let variable = variables
            .get_mut(name)
            .ok_or_else(|| VmError::UnknownVariable(name.to_string()))?;

        let fits = value.matches_type(variable.value_type)
            || (value.is_nil() && variable.value_type == ValueType::Object);
        if !fits {
            return Err(VmError::TypeMismatch {
                name: name.to_string(),
                expected: variable.value_type,
                found: value.value_type(),
            });
        }

        variable.value = value;
        Ok(())
    }

    /// Check whether a variable exists
    pub fn contains(&self, name: &str) -> bool {
        self.variables.read().contains_key(name)
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.variables.read().keys().cloned().collect()
    }

    /// Names of exported variables
    pub fn exported_names(&self) -> Vec<String> {
        self.variables
            .read()
            .iter()
            .filter(|(_, v)| v.exported)
            .map(|(name, _)| name.clone())
            .collect()
    }
}
