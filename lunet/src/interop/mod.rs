//! Conversion between guest values and host values
//!
//! The host side is a plain data model (`HostValue`) that mirrors JSON plus
//! callables, opaque payloads and pending results. Sequence tables become
//! arrays, other tables become objects, and the reverse maps arrays back to
//! 1-based sequences.

use crate::error::LuaError;
use crate::interp::{Deferred, LocalBoxFuture, LuaFunction, TableRef, UserData, Value, try_fold};
use indexmap::IndexMap;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Host callable as seen by guest code
pub type HostFn = Rc<dyn Fn(Vec<HostValue>) -> Result<HostValue, HostError>>;

/// Pending host result
pub type HostFuture = LocalBoxFuture<'static, Result<HostValue, HostError>>;

/// Failure reported by host code
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        HostError {
            message: message.into(),
        }
    }
}

impl From<HostError> for LuaError {
    fn from(err: HostError) -> Self {
        LuaError::host(err.message)
    }
}

impl From<LuaError> for HostError {
    fn from(err: LuaError) -> Self {
        HostError::new(err.message)
    }
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::new(err.to_string())
    }
}

pub enum HostValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    Object(IndexMap<String, HostValue>),
    Function(HostFn),
    Opaque(Rc<dyn Any>),
    /// Guest value handed through untouched (closures, builtins)
    Guest(Value),
    Deferred(HostFuture),
}

/// Wrap a closure as a [`HostFn`].
pub fn host_fn(f: impl Fn(Vec<HostValue>) -> Result<HostValue, HostError> + 'static) -> HostFn {
    Rc::new(f)
}

impl HostValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Pending value resolved by `future`
    pub fn deferred(future: impl Future<Output = Result<HostValue, HostError>> + 'static) -> Self {
        HostValue::Deferred(Box::pin(future))
    }

    /// JSON rendering. Callables, opaque payloads and pending values have
    /// no JSON form.
    pub fn to_json(&self) -> Result<serde_json::Value, HostError> {
        use serde_json::Value as Json;
        Ok(match self {
            HostValue::Null => Json::Null,
            HostValue::Bool(b) => Json::Bool(*b),
            HostValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 => {
                Json::from(*n as i64)
            }
            HostValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .ok_or_else(|| HostError::new(format!("cannot encode {n} as JSON")))?,
            HostValue::String(s) => Json::String(s.clone()),
            HostValue::Array(items) => Json::Array(items.iter().map(HostValue::to_json).collect::<Result<_, _>>()?),
            HostValue::Object(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| -> Result<(String, Json), HostError> { Ok((k.clone(), v.to_json()?)) })
                    .collect::<Result<_, _>>()?,
            ),
            HostValue::Guest(v) => return Err(HostError::new(format!("cannot encode a {} as JSON", v.type_name()))),
            HostValue::Function(_) | HostValue::Opaque(_) | HostValue::Deferred(_) => {
                return Err(HostError::new(format!("cannot encode {self:?} as JSON")));
            }
        })
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => HostValue::Null,
            Json::Bool(b) => HostValue::Bool(b),
            Json::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => HostValue::String(s),
            Json::Array(items) => HostValue::Array(items.into_iter().map(HostValue::from).collect()),
            Json::Object(map) => HostValue::Object(map.into_iter().map(|(k, v)| (k, HostValue::from(v))).collect()),
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "Null"),
            HostValue::Bool(b) => write!(f, "Bool({b})"),
            HostValue::Number(n) => write!(f, "Number({n})"),
            HostValue::String(s) => write!(f, "String({s:?})"),
            HostValue::Array(items) => f.debug_list().entries(items).finish(),
            HostValue::Object(map) => f.debug_map().entries(map.iter()).finish(),
            HostValue::Function(_) => write!(f, "Function(..)"),
            HostValue::Opaque(_) => write!(f, "Opaque(..)"),
            HostValue::Guest(v) => write!(f, "Guest({v:?})"),
            HostValue::Deferred(_) => write!(f, "Deferred(..)"),
        }
    }
}

/// Guest to host. Tables reached again while already being converted are
/// handed through as guest values.
pub fn to_host(value: &Value) -> HostValue {
    to_host_guarded(value, &mut HashSet::new())
}

fn to_host_guarded(value: &Value, seen: &mut HashSet<usize>) -> HostValue {
    match value {
        Value::Nil => HostValue::Null,
        Value::Boolean(b) => HostValue::Bool(*b),
        Value::Number(n) => HostValue::Number(*n),
        Value::String(s) => HostValue::String(s.to_string()),
        Value::Table(t) => {
            if !seen.insert(t.addr()) {
                return HostValue::Guest(value.clone());
            }
            let converted = if t.length() > 0 {
                HostValue::Array(t.sequence().iter().map(|v| to_host_guarded(v, seen)).collect())
            } else {
                HostValue::Object(
                    t.entries()
                        .iter()
                        .map(|(k, v)| (k.to_string(), to_host_guarded(v, seen)))
                        .collect(),
                )
            };
            seen.remove(&t.addr());
            converted
        }
        Value::Function(f) => match f.as_ref() {
            // converting the wrapper back would only undo its own conversions
            LuaFunction::Native(native) => HostValue::Function(Rc::clone(&native.func)),
            _ => HostValue::Guest(value.clone()),
        },
        Value::UserData(u) => HostValue::Opaque(Rc::clone(&u.0)),
    }
}

/// Guest to host for a result that may still be pending
pub fn to_host_deferred(value: Deferred<Value>) -> HostValue {
    match value {
        Deferred::Ready(Ok(v)) => to_host(&v),
        other => HostValue::deferred(async move { other.await.map(|v| to_host(&v)).map_err(HostError::from) }),
    }
}

/// Host to guest. Only pending host values make the result pending.
pub fn to_guest(value: HostValue) -> Deferred<Value> {
    match value {
        HostValue::Null => Deferred::ok(Value::Nil),
        HostValue::Bool(b) => Deferred::ok(Value::Boolean(b)),
        HostValue::Number(n) => Deferred::ok(Value::Number(n)),
        HostValue::String(s) => Deferred::ok(Value::from(s)),
        HostValue::Array(items) => try_fold(items, Vec::new(), |mut acc, item| {
            to_guest(item).map(move |v| {
                acc.push(v);
                acc
            })
        })
        .map(|values| Value::Table(TableRef::from_values(values))),
        HostValue::Object(map) => try_fold(map, TableRef::new(), |table, (key, item)| {
            to_guest(item).map(move |v| {
                table.raw_set_str(&key, v);
                table
            })
        })
        .map(Value::Table),
        HostValue::Function(f) => Deferred::ok(LuaFunction::native("host", f)),
        HostValue::Opaque(payload) => Deferred::ok(Value::UserData(UserData(payload))),
        HostValue::Guest(v) => Deferred::ok(v),
        HostValue::Deferred(future) => Deferred::from_future(async move {
            let resolved = future.await.map_err(LuaError::from)?;
            to_guest(resolved).await
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::interp::{Frame, MultiValue};
    use pretty_assertions::assert_eq;

    fn guest(value: HostValue) -> Value {
        match to_guest(value).into_ready() {
            Ok(Ok(v)) => v,
            _ => panic!("expected a ready conversion"),
        }
    }

    #[test]
    fn test_sequence_table_to_array() {
        let t = TableRef::from_values([Value::Number(1.0), Value::from("two")]);
        t.raw_set_str("ignored", Value::Boolean(true));
        let host = to_host(&Value::Table(t));
        assert_eq!(format!("{host:?}"), r#"[Number(1), String("two")]"#);
    }

    #[test]
    fn test_map_table_to_object() {
        let t = TableRef::from_pairs([("a", Value::Number(1.0))]);
        t.raw_set(Value::Number(2.5), Value::from("x")).unwrap();
        let HostValue::Object(map) = to_host(&Value::Table(t)) else {
            panic!("expected object")
        };
        assert_eq!(map.keys().cloned().collect::<Vec<_>>(), vec!["a", "2.5"]);
    }

    #[test]
    fn test_cyclic_table_passes_through() {
        let t = TableRef::new();
        t.raw_set_str("me", Value::Table(t.clone()));
        let HostValue::Object(map) = to_host(&Value::Table(t.clone())) else {
            panic!("expected object")
        };
        assert!(matches!(map.get("me"), Some(HostValue::Guest(Value::Table(inner))) if inner.ptr_eq(&t)));
    }

    #[test]
    fn test_array_to_one_based_table() {
        let v = guest(HostValue::Array(vec![HostValue::from("a"), HostValue::from("b")]));
        let t = v.as_table().cloned().unwrap();
        assert_eq!(t.length(), 2);
        assert_eq!(t.raw_get(&Value::Number(1.0)), Value::from("a"));
        assert_eq!(t.raw_get(&Value::Number(2.0)), Value::from("b"));
    }

    #[test]
    fn test_object_keeps_keys() {
        let mut map = IndexMap::new();
        map.insert("name".to_string(), HostValue::from("x"));
        map.insert("n".to_string(), HostValue::from(3.0));
        let t = guest(HostValue::Object(map)).as_table().cloned().unwrap();
        assert_eq!(t.keys(), vec![Value::from("name"), Value::from("n")]);
    }

    #[test]
    fn test_native_function_round_trip_is_identity() {
        let f = host_fn(|_| Ok(HostValue::Null));
        let g = guest(HostValue::Function(Rc::clone(&f)));
        let HostValue::Function(back) = to_host(&g) else {
            panic!("expected a host function")
        };
        assert!(Rc::ptr_eq(&f, &back));
    }

    #[test]
    fn test_guest_closure_passes_through() {
        let b = LuaFunction::builtin("b", |_: &Frame, _| Deferred::ok(MultiValue::empty()));
        assert!(matches!(to_host(&b), HostValue::Guest(Value::Function(_))));
    }

    #[test]
    fn test_userdata_round_trip() {
        let u = Value::UserData(UserData::new(7u32));
        let back = guest(to_host(&u));
        assert_eq!(back, u);
    }

    #[tokio::test]
    async fn test_deferred_host_value_resolves_to_guest() {
        let pending = HostValue::deferred(async {
            tokio::task::yield_now().await;
            Ok(HostValue::Array(vec![HostValue::from(1.0)]))
        });
        let d = to_guest(pending);
        assert!(!d.is_ready());
        let t = d.await.ok().and_then(|v| v.as_table().cloned()).unwrap();
        assert_eq!(t.sequence(), vec![Value::Number(1.0)]);
    }

    #[tokio::test]
    async fn test_nested_deferred_inside_array() {
        let items = vec![
            HostValue::from(1.0),
            HostValue::deferred(async { Ok(HostValue::from(2.0)) }),
            HostValue::from(3.0),
        ];
        let t = to_guest(HostValue::Array(items)).await.ok().and_then(|v| v.as_table().cloned()).unwrap();
        assert_eq!(t.sequence(), vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
    }

    #[tokio::test]
    async fn test_deferred_host_error_becomes_host_kind() {
        let pending = HostValue::deferred(async { Err(HostError::new("offline")) });
        let err = to_guest(pending).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Host);
        assert_eq!(err.message, "offline");
    }

    #[tokio::test]
    async fn test_to_host_deferred_chains() {
        let d = Deferred::from_future(async { Ok(Value::from("later")) });
        let HostValue::Deferred(future) = to_host_deferred(d) else {
            panic!("expected a pending host value")
        };
        assert_eq!(future.await.ok().and_then(|h| h.as_str().map(String::from)), Some("later".to_string()));
    }

    #[test]
    fn test_json_round_trip() {
        let json: serde_json::Value = serde_json::from_str(r#"{"a":[1,2.5,"x"],"b":null,"c":true}"#).unwrap();
        let host = HostValue::from(json.clone());
        assert_eq!(host.to_json().unwrap(), json);
    }

    #[test]
    fn test_json_rejects_functions() {
        let err = HostValue::Function(host_fn(|_| Ok(HostValue::Null))).to_json().unwrap_err();
        assert!(err.message.contains("cannot encode"));
    }
}
