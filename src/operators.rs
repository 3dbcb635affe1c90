use crate::ast::{BinaryOp, StepDirection, UnaryOp};
use crate::error::RuntimeFault;
use crate::value::Value;
use std::cmp::Ordering;
use std::rc::Rc;

/// What division or modulo by zero evaluates to. A string, so it is
/// distinguishable from the `undefined` literal under `===`.
pub fn undefined_sentinel() -> Value {
    Value::Str("undefined".to_string())
}

/// Resolves fraction literal text such as `1/3` to its quotient.
pub fn fraction(text: &str) -> Value {
    let parts = text
        .split_once('/')
        .and_then(|(numerator, denominator)| {
            Some((numerator.parse::<f64>().ok()?, denominator.parse::<f64>().ok()?))
        });

    match parts {
        Some((_, denominator)) if denominator == 0.0 => undefined_sentinel(),
        Some((numerator, denominator)) => Value::Float(numerator / denominator),
        None => Value::Str(text.to_string()),
    }
}

fn mismatch(operator: BinaryOp, left: &Value, right: &Value) -> RuntimeFault {
    RuntimeFault::TypeMismatch {
        operator: operator.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// `+ - * / ^ %`
pub fn arithmetic(operator: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    match (operator, left, right) {
        (BinaryOp::Add, Value::Str(l), Value::Str(r)) => Ok(Value::Str(format!("{}{}", l, r))),
        (BinaryOp::Add, Value::Array(l), Value::Array(r)) => {
            let mut elements = l.borrow().clone();
            elements.extend(r.borrow().iter().cloned());
            Ok(Value::array(elements))
        }
        (BinaryOp::Multiply, Value::Str(s), other) | (BinaryOp::Multiply, other, Value::Str(s))
            if as_int(other).is_some() =>
        {
            let times = usize::try_from(as_int(other).unwrap_or_default()).unwrap_or(0);
            repeat(s, times)
        }
        _ => match (as_int(left), as_int(right)) {
            (Some(l), Some(r)) => Ok(int_arithmetic(operator, l, r)),
            _ => match (left.as_number(), right.as_number()) {
                (Some(l), Some(r)) => Ok(float_arithmetic(operator, l, r)),
                _ => Err(mismatch(operator, left, right)),
            },
        },
    }
}

/// `"ab" * 3`. Fails instead of aborting when the result cannot be allocated.
fn repeat(text: &str, times: usize) -> Result<Value, RuntimeFault> {
    if text.is_empty() || times == 0 {
        return Ok(Value::Str(String::new()));
    }

    let mut repeated = String::new();
    repeated
        .try_reserve(text.len().saturating_mul(times))
        .map_err(|_| RuntimeFault::OversizedRepeat {
            length: text.len(),
            times,
        })?;
    for _ in 0..times {
        repeated.push_str(text);
    }
    Ok(Value::Str(repeated))
}

fn int_arithmetic(operator: BinaryOp, l: i64, r: i64) -> Value {
    let checked = match operator {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Subtract => l.checked_sub(r),
        BinaryOp::Multiply => l.checked_mul(r),
        BinaryOp::Divide => {
            if r == 0 {
                return undefined_sentinel();
            }
            return Value::Float(l as f64 / r as f64);
        }
        BinaryOp::Power => u32::try_from(r).ok().and_then(|exponent| l.checked_pow(exponent)),
        BinaryOp::Modulo => {
            if r == 0 {
                return undefined_sentinel();
            }
            // Result takes the sign of the divisor
            l.checked_rem(r).map(|rem| {
                if rem != 0 && (rem < 0) != (r < 0) {
                    rem + r
                } else {
                    rem
                }
            })
        }
        _ => None,
    };

    match checked {
        Some(result) => Value::Int(result),
        None => float_arithmetic(operator, l as f64, r as f64),
    }
}

fn float_arithmetic(operator: BinaryOp, l: f64, r: f64) -> Value {
    match operator {
        BinaryOp::Add => Value::Float(l + r),
        BinaryOp::Subtract => Value::Float(l - r),
        BinaryOp::Multiply => Value::Float(l * r),
        BinaryOp::Divide if r == 0.0 => undefined_sentinel(),
        BinaryOp::Divide => Value::Float(l / r),
        BinaryOp::Power => Value::Float(l.powf(r)),
        BinaryOp::Modulo if r == 0.0 => undefined_sentinel(),
        BinaryOp::Modulo => Value::Float(l - r * (l / r).floor()),
        _ => Value::Undefined,
    }
}

/// Structural equality used by `===` and `!=`. Numbers compare across int and
/// float; composites compare element by element.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => l == r,
        (Value::Str(l), Value::Str(r)) => l == r,
        (Value::Null, Value::Null)
        | (Value::Undefined, Value::Undefined)
        | (Value::Maybe, Value::Maybe) => true,
        (Value::Array(l), Value::Array(r)) => {
            if Rc::ptr_eq(l, r) {
                return true;
            }
            let (l, r) = (l.borrow(), r.borrow());
            l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
        (Value::Signal(l), Value::Signal(r)) => Rc::ptr_eq(l, r),
        (Value::Instance(l), Value::Instance(r)) => Rc::ptr_eq(l, r),
        (Value::Builtin(l), Value::Builtin(r)) => l == r,
        (Value::Record(l), Value::Record(r)) => l == r,
        _ => match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        },
    }
}

/// `====`: scalars by value and category, everything with storage by identity.
pub fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(l), Value::Array(r)) => Rc::ptr_eq(l, r),
        (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
        (Value::Signal(l), Value::Signal(r)) => Rc::ptr_eq(l, r),
        (Value::Instance(l), Value::Instance(r)) => Rc::ptr_eq(l, r),
        _ => left.type_name() == right.type_name() && values_equal(left, right),
    }
}

/// The equality ladder and the relational operators.
pub fn compare(operator: BinaryOp, left: &Value, right: &Value) -> Result<bool, RuntimeFault> {
    match operator {
        BinaryOp::VeryLooseEqual => match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => Ok((l - r).abs() < 0.5),
            _ => Err(mismatch(operator, left, right)),
        },
        BinaryOp::LooseEqual => Ok(left.to_string() == right.to_string()),
        BinaryOp::StrictEqual => {
            Ok(left.type_name() == right.type_name() && values_equal(left, right))
        }
        BinaryOp::SuperStrictEqual => Ok(identical(left, right)),
        BinaryOp::NotEqual => Ok(!values_equal(left, right)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = match (left, right) {
                (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
                (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
                _ => match (left.as_number(), right.as_number()) {
                    (Some(l), Some(r)) => l.partial_cmp(&r),
                    _ => return Err(mismatch(operator, left, right)),
                },
            };

            Ok(ordering.is_some_and(|ordering| match operator {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        _ => Err(mismatch(operator, left, right)),
    }
}

/// Unary `-` and `+`. Logical not needs a coin and lives in the evaluator.
pub fn unary(operator: UnaryOp, operand: &Value) -> Result<Value, RuntimeFault> {
    let non_numeric = |operation| RuntimeFault::NonNumericStep {
        operation,
        type_name: operand.type_name(),
    };

    match (operator, operand) {
        (UnaryOp::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Negate, _) => match as_int(operand) {
            Some(n) => Ok(n.checked_neg().map(Value::Int).unwrap_or(Value::Float(-(n as f64)))),
            None => Err(non_numeric("negate")),
        },
        (UnaryOp::Plus, Value::Float(_)) => Ok(operand.clone()),
        (UnaryOp::Plus, _) => as_int(operand)
            .map(Value::Int)
            .ok_or_else(|| non_numeric("apply unary plus to")),
        (UnaryOp::Not, _) => operand
            .definite_truth()
            .map(|truth| Value::Bool(!truth))
            .ok_or_else(|| non_numeric("negate")),
    }
}

/// One step of `++` or `--`.
pub fn step(value: &Value, direction: StepDirection) -> Result<Value, RuntimeFault> {
    let delta: i64 = match direction {
        StepDirection::Increment => 1,
        StepDirection::Decrement => -1,
    };

    match value {
        Value::Float(n) => Ok(Value::Float(n + delta as f64)),
        _ => match as_int(value) {
            Some(n) => Ok(n
                .checked_add(delta)
                .map(Value::Int)
                .unwrap_or(Value::Float(n as f64 + delta as f64))),
            None => Err(RuntimeFault::NonNumericStep {
                operation: match direction {
                    StepDirection::Increment => "increment",
                    StepDirection::Decrement => "decrement",
                },
                type_name: value.type_name(),
            }),
        },
    }
}
