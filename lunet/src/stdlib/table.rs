//! `table` library

use super::{arg, check_table, opt_integer, sync};
use crate::error::{LuaError, LuaResult};
use crate::interp::{Deferred, Frame, LuaFunction, MultiValue, TableRef, Value};

pub(super) fn library() -> TableRef {
    TableRef::from_pairs([
        ("insert", sync("insert", insert)),
        ("remove", sync("remove", remove)),
        ("concat", sync("concat", concat)),
        ("sort", LuaFunction::builtin("sort", sort)),
        ("unpack", LuaFunction::builtin("unpack", super::unpack)),
    ])
}

/// `insert(t, value)` appends; `insert(t, pos, value)` shifts up.
fn insert(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let table = check_table(&args, 0, "insert")?;
    match args.len() {
        2 => table.insert(arg(&args, 1), table.length() as i64 + 1)?,
        3 => {
            let pos = super::check_integer(&args, 1, "insert")?;
            table.insert(arg(&args, 2), pos)?;
        }
        _ => return Err(LuaError::argument("wrong number of arguments to 'insert'")),
    }
    Ok(MultiValue::empty())
}

/// Removes and returns element `pos` (the last one by default).
fn remove(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let table = check_table(&args, 0, "remove")?;
    let length = table.length() as i64;
    if length == 0 && arg(&args, 1).is_nil() {
        return Ok(MultiValue::one(Value::Nil));
    }
    let pos = opt_integer(&args, 1, "remove", length)?;
    Ok(MultiValue::one(table.remove(pos)?))
}

fn concat(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let table = check_table(&args, 0, "concat")?;
    let sep = match arg(&args, 1) {
        Value::Nil => "".into(),
        _ => super::check_string(&args, 1, "concat")?,
    };
    let first = opt_integer(&args, 2, "concat", 1)?;
    let last = opt_integer(&args, 3, "concat", table.length() as i64)?;
    Ok(MultiValue::one(table.concat(&sep, first, last)?))
}

fn sort(frame: &Frame, args: Vec<Value>) -> Deferred<MultiValue> {
    let table = match check_table(&args, 0, "sort") {
        Ok(table) => table,
        Err(e) => return Deferred::err(e.with_frame(frame)),
    };
    table.sort(args.get(1).cloned(), frame).map(|()| MultiValue::empty())
}
