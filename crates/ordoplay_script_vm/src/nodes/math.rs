// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constants and binary operators. Both are data-only nodes.

use super::string_property;
use crate::context::ExecutionContext;
use crate::instance::{NodeStep, StepResult};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use ordoplay_script_graph::{NodeId, Pin, ScriptNode, Value, ValueType};
use std::fmt;
use std::str::FromStr;

/// Type tag of the constant node
pub const CONSTANT: &str = "constant";
/// Type tag of the operator node
pub const OPERATOR: &str = "operator";

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `a + b`, also concatenates strings and adds vectors
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`
    Divide,
    /// `a == b`
    Equal,
    /// `a < b`
    Less,
    /// `a > b`
    Greater,
}

impl Operator {
    /// Property value naming the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Equal => "equal",
            Self::Less => "less",
            Self::Greater => "greater",
        }
    }

    fn result_type(&self) -> ValueType {
        match self {
            Self::Equal | Self::Less | Self::Greater => ValueType::Bool,
            _ => ValueType::Any,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            "multiply" => Ok(Self::Multiply),
            "divide" => Ok(Self::Divide),
            "equal" => Ok(Self::Equal),
            "less" => Ok(Self::Less),
            "greater" => Ok(Self::Greater),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

/// Constant node outputting `value`
pub fn constant(id: NodeId, value: impl Into<Value>) -> ScriptNode {
    let value = value.into();
    let value_type = match value.value_type() {
        ValueType::Nil => ValueType::Any,
        other => other,
    };
    ScriptNode::new(id, CONSTANT)
        .with_name("Constant")
        .with_pin(Pin::output("value", value_type))
        .with_property("value", value)
}

/// Operator node. Inputs: a, b. Output: result.
pub fn operator(id: NodeId, op: Operator) -> ScriptNode {
    ScriptNode::new(id, OPERATOR)
        .with_name(op.as_str())
        .with_property("op", op.as_str())
        .with_pin(Pin::input("a", ValueType::Any))
        .with_pin(Pin::input("b", ValueType::Any))
        .with_pin(Pin::output("result", op.result_type()))
}

#[derive(Debug)]
struct Constant {
    value: Value,
}

impl NodeStep for Constant {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        context.set_output(0, self.value.clone());
        StepResult::Advance(0)
    }
}

#[derive(Debug)]
struct BinaryOperator {
    op: Operator,
}

enum Failure {
    Type(usize, ValueType, ValueType),
    Message(String),
}

impl BinaryOperator {
    fn apply(&self, a: &Value, b: &Value) -> Result<Value, Failure> {
        match self.op {
            Operator::Equal => return Ok(Value::Bool(a == b || numeric_eq(a, b))),
            Operator::Less | Operator::Greater => {
                let ordering = compare(a, b)?;
                let result = if self.op == Operator::Less {
                    ordering.is_lt()
                } else {
                    ordering.is_gt()
                };
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        match (a, b) {
            (Value::Int(x), Value::Int(y)) => self.integer(*x, *y),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (x, y) = (a.as_float().unwrap_or_default(), b.as_float().unwrap_or_default());
                Ok(Value::Float(self.float(x, y)))
            }
            (Value::String(x), Value::String(y)) if self.op == Operator::Add => {
                Ok(Value::String(format!("{x}{y}")))
            }
            (Value::Vector2(x), Value::Vector2(y)) => Ok(Value::Vector2([self.float(x[0], y[0]), self.float(x[1], y[1])])),
            (Value::Vector3(x), Value::Vector3(y)) => Ok(Value::Vector3([
                self.float(x[0], y[0]),
                self.float(x[1], y[1]),
                self.float(x[2], y[2]),
            ])),
            (Value::Int(_) | Value::Float(_) | Value::Vector2(_) | Value::Vector3(_) | Value::String(_), _) => {
                Err(Failure::Type(1, a.value_type(), b.value_type()))
            }
            _ => Err(Failure::Type(0, ValueType::Float, a.value_type())),
        }
    }

    fn integer(&self, x: i64, y: i64) -> Result<Value, Failure> {
        let result = match self.op {
            Operator::Add => x.checked_add(y),
            Operator::Subtract => x.checked_sub(y),
            Operator::Multiply => x.checked_mul(y),
            Operator::Divide => {
                if y == 0 {
                    return Err(Failure::Message("Division by zero".to_string()));
                }
                x.checked_div(y)
            }
            _ => None,
        };
        result
            .map(Value::Int)
            .ok_or_else(|| Failure::Message(format!("Integer overflow in {} {} {}", x, self.op, y)))
    }

    fn float(&self, x: f64, y: f64) -> f64 {
        match self.op {
            Operator::Add => x + y,
            Operator::Subtract => x - y,
            Operator::Multiply => x * y,
            Operator::Divide => x / y,
            _ => 0.0,
        }
    }
}

fn numeric_eq(a: &Value, b: &Value) -> bool {
    matches!((a, b), (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)))
        && a.as_float() == b.as_float()
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, Failure> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x
                .partial_cmp(&y)
                .ok_or_else(|| Failure::Message("Cannot compare NaN".to_string())),
            (None, _) => Err(Failure::Type(0, ValueType::Float, a.value_type())),
            (_, None) => Err(Failure::Type(1, ValueType::Float, b.value_type())),
        },
    }
}

impl NodeStep for BinaryOperator {
    fn step(&self, context: &mut ExecutionContext) -> StepResult {
        match self.apply(context.input(0), context.input(1)) {
            Ok(value) => context.set_output(0, value),
            Err(Failure::Type(argument, expected, found)) => {
                context.set_invalid_argument(argument, expected, found);
            }
            Err(Failure::Message(reason)) => context.set_error(reason),
        }
        StepResult::Advance(0)
    }
}

pub(crate) fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        CONSTANT,
        "Constant",
        NodeCategory::Math,
        "Outputs a fixed value",
        |node| {
            let value = node.property("value").cloned().unwrap_or_default();
            Ok(Box::new(Constant { value }) as Box<dyn NodeStep>)
        },
    ));

    registry.register(NodeType::new(
        OPERATOR,
        "Operator",
        NodeCategory::Math,
        "Applies a binary operator to two values",
        |node| {
            let op = string_property(node, "op")?.parse()?;
            Ok(Box::new(BinaryOperator { op }) as Box<dyn NodeStep>)
        },
    ));
}
