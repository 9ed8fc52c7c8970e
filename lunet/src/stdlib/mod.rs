//! Standard environment
//!
//! Core builtins are installed as globals; grouped libraries are installed
//! as tables of functions under `string`, `table`, `os` and `host`.

mod host;
mod os;
mod string;
mod table;

use crate::config::RuntimeConfig;
use crate::error::{LuaError, LuaResult};
use crate::interp::{Deferred, EnvRef, Frame, LuaFunction, MultiValue, TableRef, Value, ops, try_fold};
use std::cell::Cell;
use std::rc::Rc;

/// Most values a single `unpack` call may produce
const MAX_UNPACK: i64 = 1_000_000;

/// Destination for `print` output, one call per line
pub type OutputSink = Rc<dyn Fn(&str)>;

/// `print` sink that emits a `tracing` event and, when configured, echoes
/// to stdout.
pub fn default_output(config: &RuntimeConfig) -> OutputSink {
    let echo = config.echo_stdout;
    Rc::new(move |line: &str| {
        tracing::info!(target: "lunet::print", "{line}");
        if echo {
            println!("{line}");
        }
    })
}

/// Populate `globals` with the builtins and libraries.
pub fn install(globals: &EnvRef, config: &RuntimeConfig, output: OutputSink) {
    let mut env = globals.borrow_mut();
    let prefix = config.print_prefix.clone();
    env.set_local(
        "print",
        LuaFunction::builtin("print", move |frame: &Frame, args: Vec<Value>| {
            print(frame, args, &prefix, Rc::clone(&output))
        }),
    );
    env.set_local("assert", sync("assert", assert));
    env.set_local("type", sync("type", type_of));
    env.set_local("tostring", LuaFunction::builtin("tostring", tostring));
    env.set_local("tonumber", sync("tonumber", tonumber));
    env.set_local("unpack", LuaFunction::builtin("unpack", unpack));
    env.set_local("pairs", sync("pairs", pairs));
    env.set_local("ipairs", sync("ipairs", ipairs));
    env.set_local("setmetatable", sync("setmetatable", setmetatable));
    env.set_local("getmetatable", sync("getmetatable", getmetatable));
    env.set_local("rawset", sync("rawset", rawset));
    env.set_local("rawget", sync("rawget", rawget));
    env.set_local("rawequal", sync("rawequal", rawequal));
    env.set_local("error", sync("error", error));
    env.set_local("pcall", LuaFunction::builtin("pcall", pcall));
    env.set_local("xpcall", LuaFunction::builtin("xpcall", xpcall));
    env.set_local("select", sync("select", select));

    env.set_local("string", Value::Table(string::library()));
    env.set_local("table", Value::Table(table::library()));
    env.set_local("os", Value::Table(os::library()));
    env.set_local("host", Value::Table(host::library()));
}

/// Builtin that never suspends. Its errors are attributed to the call
/// frame.
pub(crate) fn sync(name: &str, f: fn(&Frame, Vec<Value>) -> LuaResult<MultiValue>) -> Value {
    LuaFunction::builtin(name, move |frame: &Frame, args: Vec<Value>| {
        Deferred::from(f(frame, args).map_err(|e| e.with_frame(frame)))
    })
}

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn got(args: &[Value], index: usize) -> &'static str {
    args.get(index).map(Value::type_name).unwrap_or("no value")
}

pub(crate) fn check_table(args: &[Value], index: usize, function: &str) -> LuaResult<TableRef> {
    match args.get(index) {
        Some(Value::Table(t)) => Ok(t.clone()),
        _ => Err(LuaError::bad_argument(index + 1, function, "table", got(args, index))),
    }
}

/// String argument; numbers are accepted in their rendered form.
pub(crate) fn check_string(args: &[Value], index: usize, function: &str) -> LuaResult<Rc<str>> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(Rc::clone(s)),
        Some(Value::Number(n)) => Ok(Rc::from(crate::interp::format_number(*n))),
        _ => Err(LuaError::bad_argument(index + 1, function, "string", got(args, index))),
    }
}

pub(crate) fn check_number(args: &[Value], index: usize, function: &str) -> LuaResult<f64> {
    args.get(index)
        .and_then(Value::to_number)
        .ok_or_else(|| LuaError::bad_argument(index + 1, function, "number", got(args, index)))
}

pub(crate) fn check_integer(args: &[Value], index: usize, function: &str) -> LuaResult<i64> {
    let n = check_number(args, index, function)?;
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(LuaError::argument(format!(
            "bad argument #{} to '{function}' (number has no integer representation)",
            index + 1
        )));
    }
    Ok(n as i64)
}

pub(crate) fn opt_integer(args: &[Value], index: usize, function: &str, default: i64) -> LuaResult<i64> {
    match args.get(index) {
        None | Some(Value::Nil) => Ok(default),
        Some(_) => check_integer(args, index, function),
    }
}

/// Render every argument, in order, as `tostring` would.
pub(crate) fn display_all(args: Vec<Value>, frame: &Frame) -> Deferred<Vec<String>> {
    let frame = frame.clone();
    try_fold(args, Vec::new(), move |mut acc, value| {
        ops::to_display_string(&value, Some(&frame)).map(move |s| {
            acc.push(s);
            acc
        })
    })
}

fn print(frame: &Frame, args: Vec<Value>, prefix: &str, output: OutputSink) -> Deferred<MultiValue> {
    let prefix = prefix.to_string();
    display_all(args, frame).map(move |parts| {
        let text = parts.join(" ");
        let line = if prefix.is_empty() { text } else { format!("{prefix} {text}") };
        output(&line);
        MultiValue::empty()
    })
}

fn assert(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    if args.is_empty() {
        return Err(LuaError::bad_argument(1, "assert", "value", "no value"));
    }
    if arg(&args, 0).is_truthy() {
        return Ok(MultiValue::new(args));
    }
    let message = match arg(&args, 1) {
        Value::Nil => None,
        other => Some(other.to_string()),
    };
    Err(LuaError::assertion_failed(message.as_deref()))
}

fn type_of(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    match args.first() {
        Some(value) => Ok(MultiValue::one(value.type_name())),
        None => Err(LuaError::bad_argument(1, "type", "value", "no value")),
    }
}

fn tostring(frame: &Frame, args: Vec<Value>) -> Deferred<MultiValue> {
    ops::to_display_string(&arg(&args, 0), Some(frame)).map(MultiValue::one)
}

fn tonumber(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let value = arg(&args, 0);
    let base = match arg(&args, 1) {
        Value::Nil => None,
        _ => Some(check_integer(&args, 1, "tonumber")?),
    };
    let parsed = match (base, &value) {
        (None, _) => value.to_number(),
        (Some(base), Value::String(s)) if (2..=36).contains(&base) => {
            i64::from_str_radix(s.trim(), base as u32).ok().map(|n| n as f64)
        }
        (Some(base), _) if !(2..=36).contains(&base) => {
            return Err(LuaError::argument("bad argument #2 to 'tonumber' (base out of range)"));
        }
        (Some(_), _) => None,
    };
    Ok(MultiValue::one(parsed))
}

fn unpack(frame: &Frame, args: Vec<Value>) -> Deferred<MultiValue> {
    let bounds = (|| {
        let table = check_table(&args, 0, "unpack")?;
        let first = opt_integer(&args, 1, "unpack", 1)?;
        let last = opt_integer(&args, 2, "unpack", table.length() as i64)?;
        if first <= last && last.checked_sub(first).is_none_or(|span| span >= MAX_UNPACK) {
            return Err(LuaError::argument("too many results to unpack"));
        }
        Ok::<_, LuaError>((table, first, last))
    })();
    let (table, first, last) = match bounds {
        Ok(bounds) => bounds,
        Err(e) => return Deferred::err(e.with_frame(frame)),
    };
    let frame = frame.clone();
    try_fold(first..=last, MultiValue::empty(), move |mut acc, i| {
        table.get(&Value::from(i), &frame).map(move |v| {
            acc.push(v);
            acc
        })
    })
}

fn pairs(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let table = check_table(&args, 0, "pairs")?;
    let keys = table.keys();
    let next = Cell::new(0usize);
    let iterator = LuaFunction::builtin("pairs_iterator", move |_: &Frame, _| {
        while next.get() < keys.len() {
            let key = keys[next.get()].clone();
            next.set(next.get() + 1);
            let value = table.raw_get(&key);
            // entries removed since the snapshot are skipped
            if !value.is_nil() {
                return Deferred::ok(MultiValue::pair(key, value));
            }
        }
        Deferred::ok(MultiValue::empty())
    });
    Ok(MultiValue::one(iterator))
}

fn ipairs(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let table = check_table(&args, 0, "ipairs")?;
    let next = Cell::new(1usize);
    let iterator = LuaFunction::builtin("ipairs_iterator", move |_: &Frame, _| {
        let i = next.get();
        if i > table.length() {
            return Deferred::ok(MultiValue::empty());
        }
        next.set(i + 1);
        Deferred::ok(MultiValue::pair(i, table.raw_get(&Value::from(i))))
    });
    Ok(MultiValue::one(iterator))
}

fn setmetatable(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let table = check_table(&args, 0, "setmetatable")?;
    let metatable = match arg(&args, 1) {
        Value::Nil => None,
        Value::Table(mt) => Some(mt),
        other => return Err(LuaError::bad_argument(2, "setmetatable", "nil or table", other.type_name())),
    };
    table.set_metatable(metatable);
    Ok(MultiValue::one(table))
}

fn getmetatable(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let metatable = match arg(&args, 0) {
        Value::Table(t) => t.metatable(),
        _ => None,
    };
    Ok(MultiValue::one(metatable))
}

fn rawset(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let table = check_table(&args, 0, "rawset")?;
    table.raw_set(arg(&args, 1), arg(&args, 2))?;
    Ok(MultiValue::one(table))
}

fn rawget(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let table = check_table(&args, 0, "rawget")?;
    Ok(MultiValue::one(table.raw_get(&arg(&args, 1))))
}

fn rawequal(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    Ok(MultiValue::one(arg(&args, 0).raw_equals(&arg(&args, 1))))
}

fn error(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    Err(LuaError::raised(arg(&args, 0).to_string()))
}

/// Run `f(args...)`. Runtime errors become `(false, message)`; control
/// signals are not errors and pass through.
fn pcall(frame: &Frame, mut args: Vec<Value>) -> Deferred<MultiValue> {
    if args.is_empty() {
        return Deferred::err(LuaError::bad_argument(1, "pcall", "value", "no value").with_frame(frame));
    }
    let function = args.remove(0);
    ops::call_value(&function, args, frame, None).then(|result| match result {
        Ok(values) => Deferred::ok(MultiValue::flatten([MultiValue::one(true), values])),
        Err(e) if e.is_runtime() => {
            tracing::debug!(error = %e, kind = ?e.kind, "pcall caught error");
            Deferred::ok(MultiValue::pair(false, e.message))
        }
        Err(e) => Deferred::err(e),
    })
}

/// `pcall` with a handler that receives the error message; its first
/// result replaces the message.
fn xpcall(frame: &Frame, mut args: Vec<Value>) -> Deferred<MultiValue> {
    if args.len() < 2 {
        return Deferred::err(LuaError::bad_argument(2, "xpcall", "value", "no value").with_frame(frame));
    }
    let function = args.remove(0);
    let handler = args.remove(0);
    let frame = frame.clone();
    ops::call_value(&function, args, &frame, None).then(move |result| match result {
        Ok(values) => Deferred::ok(MultiValue::flatten([MultiValue::one(true), values])),
        Err(e) if e.is_runtime() => {
            tracing::debug!(error = %e, kind = ?e.kind, "xpcall caught error");
            ops::call_value(&handler, vec![Value::from(e.message)], &frame, None)
                .map(|handled| MultiValue::pair(false, handled.first()))
        }
        Err(e) => Deferred::err(e),
    })
}

fn select(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let rest = args.len().saturating_sub(1);
    if arg(&args, 0).as_str() == Some("#") {
        return Ok(MultiValue::one(rest));
    }
    let n = check_integer(&args, 0, "select")?;
    let start = if n < 0 { rest as i64 + n } else { n - 1 };
    if n == 0 || start < 0 {
        return Err(LuaError::argument("bad argument #1 to 'select' (index out of range)"));
    }
    Ok(args.into_iter().skip(1 + start as usize).collect())
}
