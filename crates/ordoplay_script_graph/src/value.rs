// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values that flow through data pins and live in stack slots.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Data type that can flow through data pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// No value
    Nil,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// String value
    String,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// Array of values
    Array,
    /// Host object reference
    Object,
    /// Any type (for generic pins)
    Any,
}

impl ValueType {
    /// Human readable type name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nil => "Nil",
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Vector2 => "Vector2",
            Self::Vector3 => "Vector3",
            Self::Array => "Array",
            Self::Object => "Object",
            Self::Any => "Any",
        }
    }

    /// Check if a value of this type can flow into a pin of another type
    pub fn can_connect_to(&self, other: &ValueType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if self == other {
            return true;
        }

        match (self, other) {
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            (Self::Float, Self::Vector2 | Self::Vector3) => true,
            (Self::Vector2, Self::Vector3) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared handle to a host object.
///
/// Holding one keeps the object alive, so a slot that is never released leaks it.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    /// Wrap a host object
    pub fn new<T: Any + Send + Sync>(object: T) -> Self {
        Self(Arc::new(object))
    }

    /// Wrap an already shared host object
    pub fn from_arc(object: Arc<dyn Any + Send + Sync>) -> Self {
        Self(object)
    }

    /// Downcast to a concrete object type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Number of live handles to the object
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", Arc::as_ptr(&self.0))
    }
}

/// Value stored in a pin default or a stack slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// 2D vector
    Vector2([f64; 2]),
    /// 3D vector
    Vector3([f64; 3]),
    /// Array of values
    Array(Vec<Value>),
    /// Host object, never persisted
    #[serde(skip)]
    Object(ObjectRef),
}

impl Value {
    /// Get the value type for this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Nil => ValueType::Nil,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::Vector2(_) => ValueType::Vector2,
            Self::Vector3(_) => ValueType::Vector3,
            Self::Array(_) => ValueType::Array,
            Self::Object(_) => ValueType::Object,
        }
    }

    /// The zero value of a type
    pub fn default_for(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Nil | ValueType::Object | ValueType::Any => Self::Nil,
            ValueType::Bool => Self::Bool(false),
            ValueType::Int => Self::Int(0),
            ValueType::Float => Self::Float(0.0),
            ValueType::String => Self::String(String::new()),
            ValueType::Vector2 => Self::Vector2([0.0; 2]),
            ValueType::Vector3 => Self::Vector3([0.0; 3]),
            ValueType::Array => Self::Array(Vec::new()),
        }
    }

    /// Check whether this value is `Nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Integer view, converting floats by truncation
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            Self::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Float view, widening integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Strict boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Truthiness used by flow control nodes
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::Bool(v) => *v,
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::String(v) => !v.is_empty(),
            Self::Array(v) => !v.is_empty(),
            Self::Vector2(_) | Self::Vector3(_) | Self::Object(_) => true,
        }
    }

    /// Check whether this value can be bound to a pin of the given type
    pub fn matches_type(&self, value_type: ValueType) -> bool {
        self.value_type().can_connect_to(&value_type)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Vector2([x, y]) => write!(f, "({x}, {y})"),
            Self::Vector3([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(object) => write!(f, "{object:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(Value::default_for(ValueType::Int), Value::Int(0));
        assert_eq!(Value::default_for(ValueType::String), Value::String(String::new()));
        assert_eq!(Value::default_for(ValueType::Any), Value::Nil);
    }

    #[test]
    fn test_object_identity() {
        let a = ObjectRef::new(5_u32);
        let b = a.clone();
        let c = ObjectRef::new(5_u32);
        assert_eq!(Value::Object(a.clone()), Value::Object(b.clone()));
        assert_ne!(Value::Object(a.clone()), Value::Object(c));
        assert_eq!(a.handle_count(), 2);
        assert_eq!(a.downcast_ref::<u32>(), Some(&5));
    }

    #[test]
    fn test_type_compatibility() {
        assert!(ValueType::Int.can_connect_to(&ValueType::Float));
        assert!(ValueType::Any.can_connect_to(&ValueType::String));
        assert!(!ValueType::String.can_connect_to(&ValueType::Int));
        assert!(Value::Int(3).matches_type(ValueType::Float));
    }
}
