//! Generic operations on values
//!
//! These are what the evaluator and the libraries share: indexing and
//! assignment through metatables, calls, length, arithmetic and comparison
//! with Lua's coercions, and string rendering.

use super::deferred::Deferred;
use super::function::Frame;
use super::multi::MultiValue;
use super::value::{Value, format_number};
use crate::ast::{BinOp, UnOp};
use crate::error::{LuaError, LuaResult};
use std::rc::Rc;

/// `target[key]`. `description` names the target in messages, e.g.
/// `global 'cfg'`.
pub fn index(target: &Value, key: &Value, frame: &Frame, description: Option<&str>) -> Deferred<Value> {
    match target {
        Value::Table(t) => {
            if key.is_nil() {
                return Deferred::err(LuaError::nil_key().with_frame(frame));
            }
            t.get(key, frame)
        }
        other => Deferred::err(LuaError::index_value(other.type_name(), description).with_frame(frame)),
    }
}

/// `target[key] = value`
pub fn assign_index(
    target: &Value,
    key: Value,
    value: Value,
    frame: &Frame,
    description: Option<&str>,
) -> Deferred<()> {
    match target {
        Value::Table(t) => t.set(key, value, frame),
        other => Deferred::err(LuaError::index_value(other.type_name(), description).with_frame(frame)),
    }
}

/// Call any value. Tables are callable through a `__call` function in
/// their metatable, which receives the table first.
pub fn call_value(callee: &Value, args: Vec<Value>, frame: &Frame, description: Option<&str>) -> Deferred<MultiValue> {
    match callee {
        Value::Function(f) => f.call(frame, args),
        Value::Table(t) => {
            let handler = t.metatable().map(|mt| mt.raw_get_str("__call"));
            match handler {
                Some(Value::Function(f)) => {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(callee.clone());
                    full.extend(args);
                    f.call(frame, full)
                }
                _ => Deferred::err(LuaError::not_callable("table", description).with_frame(frame)),
            }
        }
        other => Deferred::err(LuaError::not_callable(other.type_name(), description).with_frame(frame)),
    }
}

/// `#value`: sequence length of a table, byte length of a string
pub fn length(value: &Value) -> LuaResult<Value> {
    match value {
        Value::Table(t) => Ok(Value::from(t.length())),
        Value::String(s) => Ok(Value::from(s.len())),
        other => Err(LuaError::arithmetic("get length of", other.type_name())),
    }
}

/// String rendering as `tostring` sees it; tables go through `__tostring`.
pub fn to_display_string(value: &Value, frame: Option<&Frame>) -> Deferred<String> {
    match value {
        Value::Table(t) => t.to_string_async(frame),
        other => Deferred::ok(other.to_string()),
    }
}

fn arith_operand(value: &Value) -> LuaResult<f64> {
    value
        .to_number()
        .ok_or_else(|| LuaError::arithmetic("perform arithmetic on", value.type_name()))
}

/// Floored modulo: the result takes the sign of the divisor.
pub fn floor_mod(a: f64, b: f64) -> f64 {
    let m = a % b;
    if m != 0.0 && (m < 0.0) != (b < 0.0) { m + b } else { m }
}

/// Arithmetic, concatenation, comparison and equality operators.
/// `and`/`or` short-circuit and are handled by the evaluator.
pub fn binary(op: BinOp, left: &Value, right: &Value) -> LuaResult<Value> {
    let number = |f: fn(f64, f64) -> f64| -> LuaResult<Value> {
        let a = arith_operand(left)?;
        let b = arith_operand(right)?;
        Ok(Value::Number(f(a, b)))
    };
    match op {
        BinOp::Add => number(|a, b| a + b),
        BinOp::Sub => number(|a, b| a - b),
        BinOp::Mul => number(|a, b| a * b),
        BinOp::Div => number(|a, b| a / b),
        BinOp::IDiv => number(|a, b| (a / b).floor()),
        BinOp::Mod => number(floor_mod),
        BinOp::Pow => number(f64::powf),
        BinOp::Concat => concat(left, right),
        BinOp::Eq => Ok(Value::Boolean(left.raw_equals(right))),
        BinOp::Ne => Ok(Value::Boolean(!left.raw_equals(right))),
        BinOp::Lt => less_than(left, right).map(Value::Boolean),
        BinOp::Le => less_equal(left, right).map(Value::Boolean),
        BinOp::Gt => less_than(right, left).map(Value::Boolean),
        BinOp::Ge => less_equal(right, left).map(Value::Boolean),
        BinOp::And | BinOp::Or => Err(LuaError::raised(format!(
            "operator '{op}' must be evaluated lazily"
        ))),
    }
}

pub fn unary(op: UnOp, operand: &Value) -> LuaResult<Value> {
    match op {
        UnOp::Neg => Ok(Value::Number(-arith_operand(operand)?)),
        UnOp::Not => Ok(Value::Boolean(!operand.is_truthy())),
        UnOp::Len => length(operand),
    }
}

fn concat_piece(value: &Value) -> LuaResult<Rc<str>> {
    match value {
        Value::String(s) => Ok(Rc::clone(s)),
        Value::Number(n) => Ok(Rc::from(format_number(*n))),
        other => Err(LuaError::arithmetic("concatenate", other.type_name())),
    }
}

pub fn concat(left: &Value, right: &Value) -> LuaResult<Value> {
    let a = concat_piece(left)?;
    let b = concat_piece(right)?;
    Ok(Value::from(format!("{a}{b}")))
}

pub fn less_than(left: &Value, right: &Value) -> LuaResult<bool> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(a < b),
        (Value::String(a), Value::String(b)) => Ok(a < b),
        (a, b) => Err(LuaError::compare(a.type_name(), b.type_name())),
    }
}

pub fn less_equal(left: &Value, right: &Value) -> LuaResult<bool> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(a <= b),
        (Value::String(a), Value::String(b)) => Ok(a <= b),
        (a, b) => Err(LuaError::compare(a.type_name(), b.type_name())),
    }
}
