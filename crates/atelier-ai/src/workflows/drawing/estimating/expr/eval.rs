use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::parser::{Aggregate, BinaryOp, Expr, Path, UnaryOp};
use super::EvalError;

/// Runtime value of an expression or binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    fn as_number(&self) -> Result<f64, EvalError> {
        match self {
            Value::Number(value) => Ok(*value),
            other => Err(EvalError::TypeMismatch {
                expected: "number",
                found: other.kind(),
            }),
        }
    }

    fn truthy(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(value) => Ok(*value),
            Value::Number(value) => Ok(*value != 0.0),
            other => Err(EvalError::TypeMismatch {
                expected: "boolean",
                found: other.kind(),
            }),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Variable bindings an expression is evaluated against.
pub type Bindings = BTreeMap<String, Value>;

pub(crate) fn eval(expr: &Expr, bindings: &Bindings) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(value) => Ok(Value::Number(*value)),
        Expr::Text(value) => Ok(Value::Text(value.clone())),
        Expr::Path(path) => resolve_scalar(path, bindings),
        Expr::Unary { op, operand } => {
            let value = eval(operand, bindings)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.truthy()?)),
                UnaryOp::Neg => Ok(Value::Number(-value.as_number()?)),
            }
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, bindings),
        Expr::Call { function, argument } => eval_aggregate(*function, argument, bindings),
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    bindings: &Bindings,
) -> Result<Value, EvalError> {
    // Short-circuit the boolean operators before touching the right side.
    match op {
        BinaryOp::And => {
            if !eval(lhs, bindings)?.truthy()? {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(eval(rhs, bindings)?.truthy()?));
        }
        BinaryOp::Or => {
            if eval(lhs, bindings)?.truthy()? {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(eval(rhs, bindings)?.truthy()?));
        }
        _ => {}
    }

    let left = eval(lhs, bindings)?;
    let right = eval(rhs, bindings)?;

    match op {
        BinaryOp::Add => Ok(Value::Number(left.as_number()? + right.as_number()?)),
        BinaryOp::Sub => Ok(Value::Number(left.as_number()? - right.as_number()?)),
        BinaryOp::Mul => Ok(Value::Number(left.as_number()? * right.as_number()?)),
        BinaryOp::Div => {
            let divisor = right.as_number()?;
            if divisor == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(left.as_number()? / divisor))
        }
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt => Ok(Value::Bool(left.as_number()? < right.as_number()?)),
        BinaryOp::Le => Ok(Value::Bool(left.as_number()? <= right.as_number()?)),
        BinaryOp::Gt => Ok(Value::Bool(left.as_number()? > right.as_number()?)),
        BinaryOp::Ge => Ok(Value::Bool(left.as_number()? >= right.as_number()?)),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// Values of different kinds compare unequal rather than erroring, so
/// conditions like `type_piece == 'tube'` stay total over sloppy bindings.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l == r,
        (Value::Text(l), Value::Text(r)) => l == r,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        _ => false,
    }
}

fn resolve_scalar(path: &Path, bindings: &Bindings) -> Result<Value, EvalError> {
    let root = bindings
        .get(&path.root)
        .ok_or_else(|| EvalError::UnknownIdentifier(path.root.clone()))?;

    match &path.property {
        None => Ok(root.clone()),
        Some(property) => match root {
            Value::Record(record) => record.get(property).cloned().ok_or_else(|| {
                EvalError::MissingProperty {
                    path: path.root.clone(),
                    property: property.clone(),
                }
            }),
            other => Err(EvalError::TypeMismatch {
                expected: "record",
                found: other.kind(),
            }),
        },
    }
}

fn eval_aggregate(
    function: Aggregate,
    argument: &Path,
    bindings: &Bindings,
) -> Result<Value, EvalError> {
    let root = bindings
        .get(&argument.root)
        .ok_or_else(|| EvalError::UnknownIdentifier(argument.root.clone()))?;

    let items = match root {
        Value::List(items) => items,
        other => {
            return Err(EvalError::TypeMismatch {
                expected: "list",
                found: other.kind(),
            })
        }
    };

    if function == Aggregate::Count && argument.property.is_none() {
        return Ok(Value::Number(items.len() as f64));
    }

    // Project the addressed property (or the item itself) as numbers; every
    // item of the list must share it.
    let mut numbers = Vec::with_capacity(items.len());
    for item in items {
        let value = match &argument.property {
            None => item.clone(),
            Some(property) => match item {
                Value::Record(record) => record.get(property).cloned().ok_or_else(|| {
                    EvalError::MissingProperty {
                        path: argument.root.clone(),
                        property: property.clone(),
                    }
                })?,
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "record",
                        found: other.kind(),
                    })
                }
            },
        };
        if function == Aggregate::Count {
            numbers.push(0.0);
            continue;
        }
        numbers.push(value.as_number()?);
    }

    let result = match function {
        Aggregate::Count => numbers.len() as f64,
        Aggregate::Sum => numbers.iter().sum(),
        Aggregate::Avg => {
            if numbers.is_empty() {
                return Err(EvalError::EmptyAggregate);
            }
            numbers.iter().sum::<f64>() / numbers.len() as f64
        }
        Aggregate::Max => numbers
            .iter()
            .copied()
            .reduce(f64::max)
            .ok_or(EvalError::EmptyAggregate)?,
        Aggregate::Min => numbers
            .iter()
            .copied()
            .reduce(f64::min)
            .ok_or(EvalError::EmptyAggregate)?,
    };

    Ok(Value::Number(result))
}
