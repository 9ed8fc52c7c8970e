//! `host` library: JSON exchange and host logging
//!
//! `tojson` and `fromjson` are native host functions, so their arguments
//! and results cross the interop conversion like any embedder function.

use super::{check_string, display_all};
use crate::error::LuaError;
use crate::interop::{HostError, HostValue, host_fn};
use crate::interp::{Deferred, Frame, LuaFunction, MultiValue, TableRef, Value};

pub(super) fn library() -> TableRef {
    TableRef::from_pairs([
        ("tojson", LuaFunction::native("tojson", host_fn(tojson))),
        ("fromjson", LuaFunction::native("fromjson", host_fn(fromjson))),
        ("log", LuaFunction::builtin("log", log)),
    ])
}

/// `tojson(value [, pretty])`
fn tojson(args: Vec<HostValue>) -> Result<HostValue, HostError> {
    let mut args = args.into_iter();
    let value = args.next().unwrap_or(HostValue::Null);
    let pretty = matches!(args.next(), Some(HostValue::Bool(true)));
    let json = value.to_json()?;
    let text = if pretty { serde_json::to_string_pretty(&json)? } else { serde_json::to_string(&json)? };
    Ok(HostValue::String(text))
}

fn fromjson(args: Vec<HostValue>) -> Result<HostValue, HostError> {
    let text = args
        .first()
        .and_then(HostValue::as_str)
        .ok_or_else(|| HostError::new("bad argument #1 to 'fromjson' (string expected)"))?;
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(HostValue::from(json))
}

/// `log(level, ...)` forwards a line to the host's `tracing` subscriber.
fn log(frame: &Frame, mut args: Vec<Value>) -> Deferred<MultiValue> {
    let level = match check_string(&args, 0, "log") {
        Ok(level) => level,
        Err(e) => return Deferred::err(e.with_frame(frame)),
    };
    if !matches!(&*level, "trace" | "debug" | "info" | "warn" | "error") {
        let e = LuaError::argument(format!("bad argument #1 to 'log' (unknown level '{level}')"));
        return Deferred::err(e.with_frame(frame));
    }
    args.remove(0);
    let source = frame.source_ref().unwrap_or("?").to_string();
    display_all(args, frame).map(move |parts| {
        let line = parts.join(" ");
        match &*level {
            "trace" => tracing::trace!(target: "lunet::guest", source = %source, "{line}"),
            "debug" => tracing::debug!(target: "lunet::guest", source = %source, "{line}"),
            "info" => tracing::info!(target: "lunet::guest", source = %source, "{line}"),
            "warn" => tracing::warn!(target: "lunet::guest", source = %source, "{line}"),
            _ => tracing::error!(target: "lunet::guest", source = %source, "{line}"),
        }
        MultiValue::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn call(f: &Value, args: Vec<Value>) -> crate::error::LuaResult<MultiValue> {
        let Value::Function(f) = f else { panic!("not a function") };
        match f.call(&Frame::lost(), args).into_ready() {
            Ok(result) => result,
            Err(_) => panic!("call suspended"),
        }
    }

    #[test]
    fn test_tojson_sequence_and_record() {
        let lib = library();
        let record = TableRef::from_pairs([("name", Value::from("x")), ("n", Value::Number(2.0))]);
        let out = call(&lib.raw_get_str("tojson"), vec![Value::Table(record)]).unwrap();
        assert_eq!(out.first(), Value::from(r#"{"name":"x","n":2}"#));

        let seq = TableRef::from_values([Value::Number(1.5), Value::Boolean(true)]);
        let out = call(&lib.raw_get_str("tojson"), vec![Value::Table(seq)]).unwrap();
        assert_eq!(out.first(), Value::from("[1.5,true]"));
    }

    #[test]
    fn test_fromjson_builds_tables() {
        let lib = library();
        let out = call(&lib.raw_get_str("fromjson"), vec![Value::from(r#"{"a":[1,2],"b":null}"#)]).unwrap();
        let Value::Table(t) = out.first() else { panic!("expected a table") };
        let Value::Table(a) = t.raw_get_str("a") else { panic!("expected a nested table") };
        assert_eq!(a.length(), 2);
        assert_eq!(t.raw_get_str("b"), Value::Nil);
    }

    #[test]
    fn test_fromjson_reports_host_error() {
        let lib = library();
        let err = call(&lib.raw_get_str("fromjson"), vec![Value::from("{nope")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Host);
    }

    #[test]
    fn test_tojson_rejects_functions() {
        let lib = library();
        let log = lib.raw_get_str("log");
        let err = call(&lib.raw_get_str("tojson"), vec![log]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Host);
    }

    #[test]
    fn test_log_levels() {
        let lib = library();
        let log = lib.raw_get_str("log");
        assert!(call(&log, vec![Value::from("info"), Value::from("hello")]).is_ok());
        let err = call(&log, vec![Value::from("loud")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Argument);
    }
}
