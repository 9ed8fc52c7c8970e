//! Tables: the one composite type
//!
//! Storage is split into a dense sequence for keys `1..=n`, a string-keyed
//! map and a fallback map for every other key. Externally the three behave
//! as a single association; the split only serves access patterns.

use super::deferred::{Deferred, try_fold};
use super::function::{Frame, FunctionRef};
use super::multi::MultiValue;
use super::value::{UserData, Value, format_number, quote_string};
use crate::error::{LuaError, LuaResult};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Largest integer that a double represents exactly
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Shared, mutable table handle. Clones alias the same table.
#[derive(Clone, Default)]
pub struct TableRef(Rc<RefCell<LuaTable>>);

#[derive(Default)]
pub struct LuaTable {
    /// Values for keys `1..=array.len()`
    array: Vec<Value>,
    strings: IndexMap<Rc<str>, Value>,
    others: IndexMap<RawKey, Value>,
    metatable: Option<TableRef>,
}

/// Non-string, non-sequence key. Primitives hash by value, references by
/// identity.
#[derive(Clone)]
enum RawKey {
    Number(f64),
    Boolean(bool),
    Table(TableRef),
    Function(FunctionRef),
    UserData(UserData),
}

impl RawKey {
    fn to_value(&self) -> Value {
        match self {
            RawKey::Number(n) => Value::Number(*n),
            RawKey::Boolean(b) => Value::Boolean(*b),
            RawKey::Table(t) => Value::Table(t.clone()),
            RawKey::Function(f) => Value::Function(Rc::clone(f)),
            RawKey::UserData(u) => Value::UserData(u.clone()),
        }
    }
}

impl PartialEq for RawKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RawKey::Number(a), RawKey::Number(b)) => a == b,
            (RawKey::Boolean(a), RawKey::Boolean(b)) => a == b,
            (RawKey::Table(a), RawKey::Table(b)) => a.ptr_eq(b),
            (RawKey::Function(a), RawKey::Function(b)) => Rc::ptr_eq(a, b),
            (RawKey::UserData(a), RawKey::UserData(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for RawKey {}

impl Hash for RawKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            RawKey::Number(n) => n.to_bits().hash(state),
            RawKey::Boolean(b) => b.hash(state),
            RawKey::Table(t) => t.addr().hash(state),
            RawKey::Function(f) => (Rc::as_ptr(f) as *const () as usize).hash(state),
            RawKey::UserData(u) => u.addr().hash(state),
        }
    }
}

/// A key classified into the segment that stores it
enum TableKey {
    Str(Rc<str>),
    /// 1-based positive integer
    Position(usize),
    Other(RawKey),
}

impl TableKey {
    /// `None` for keys that can never be stored (nil, NaN).
    fn classify(key: &Value) -> Option<TableKey> {
        Some(match key {
            Value::Nil => return None,
            Value::String(s) => TableKey::Str(Rc::clone(s)),
            Value::Number(n) if n.is_nan() => return None,
            Value::Number(n) if n.fract() == 0.0 && *n >= 1.0 && *n <= MAX_EXACT_INTEGER => {
                TableKey::Position(*n as usize)
            }
            // -0.0 and 0.0 are the same key
            Value::Number(n) => TableKey::Other(RawKey::Number(if *n == 0.0 { 0.0 } else { *n })),
            Value::Boolean(b) => TableKey::Other(RawKey::Boolean(*b)),
            Value::Table(t) => TableKey::Other(RawKey::Table(t.clone())),
            Value::Function(f) => TableKey::Other(RawKey::Function(Rc::clone(f))),
            Value::UserData(u) => TableKey::Other(RawKey::UserData(u.clone())),
        })
    }

    fn checked(key: &Value) -> LuaResult<TableKey> {
        match key {
            Value::Number(n) if n.is_nan() => Err(LuaError::nan_key()),
            _ => TableKey::classify(key).ok_or_else(LuaError::nil_key),
        }
    }
}

impl LuaTable {
    fn fetch(&self, key: &TableKey) -> Value {
        let found = match key {
            TableKey::Str(s) => self.strings.get(s),
            TableKey::Position(i) => self
                .array
                .get(i - 1)
                .or_else(|| self.others.get(&RawKey::Number(*i as f64))),
            TableKey::Other(k) => self.others.get(k),
        };
        found.cloned().unwrap_or_default()
    }

    fn store(&mut self, key: TableKey, value: Value) {
        match key {
            TableKey::Str(s) => {
                if value.is_nil() {
                    self.strings.shift_remove(&s);
                } else {
                    self.strings.insert(s, value);
                }
            }
            TableKey::Position(i) if i <= self.array.len() => {
                if value.is_nil() {
                    // keep the sequence dense: everything past the hole moves out
                    let tail = self.array.split_off(i - 1);
                    for (offset, v) in tail.into_iter().enumerate().skip(1) {
                        self.others.insert(RawKey::Number((i + offset) as f64), v);
                    }
                } else {
                    self.array[i - 1] = value;
                }
            }
            TableKey::Position(i) if i == self.array.len() + 1 && !value.is_nil() => {
                self.others.shift_remove(&RawKey::Number(i as f64));
                self.array.push(value);
                self.absorb_following();
            }
            TableKey::Position(i) => self.store_other(RawKey::Number(i as f64), value),
            TableKey::Other(k) => self.store_other(k, value),
        }
    }

    fn store_other(&mut self, key: RawKey, value: Value) {
        if value.is_nil() {
            self.others.shift_remove(&key);
        } else {
            self.others.insert(key, value);
        }
    }

    /// Move integer keys that now continue the sequence into it.
    fn absorb_following(&mut self) {
        while let Some(v) = self
            .others
            .shift_remove(&RawKey::Number((self.array.len() + 1) as f64))
        {
            self.array.push(v);
        }
    }

    fn contains(&self, key: &TableKey) -> bool {
        match key {
            TableKey::Str(s) => self.strings.contains_key(s),
            TableKey::Position(i) => {
                *i <= self.array.len() || self.others.contains_key(&RawKey::Number(*i as f64))
            }
            TableKey::Other(k) => self.others.contains_key(k),
        }
    }
}

impl TableRef {
    pub fn new() -> Self {
        TableRef::default()
    }

    /// Table whose sequence holds `values` at keys `1..`
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let table = TableRef::new();
        {
            let mut inner = table.0.borrow_mut();
            for (i, value) in values.into_iter().enumerate() {
                inner.store(TableKey::Position(i + 1), value);
            }
        }
        table
    }

    /// Table holding string-keyed entries in the given order
    pub fn from_pairs<K: Into<Rc<str>>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let table = TableRef::new();
        {
            let mut inner = table.0.borrow_mut();
            for (key, value) in pairs {
                inner.store(TableKey::Str(key.into()), value);
            }
        }
        table
    }

    pub fn ptr_eq(&self, other: &TableRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Size of the sequence segment
    pub fn length(&self) -> usize {
        self.0.borrow().array.len()
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.0.borrow().metatable.clone()
    }

    pub fn set_metatable(&self, metatable: Option<TableRef>) {
        self.0.borrow_mut().metatable = metatable;
    }

    /// Read without consulting the metatable. Invalid keys read as nil.
    pub fn raw_get(&self, key: &Value) -> Value {
        match TableKey::classify(key) {
            Some(key) => self.0.borrow().fetch(&key),
            None => Value::Nil,
        }
    }

    pub fn raw_get_str(&self, key: &str) -> Value {
        self.0
            .borrow()
            .strings
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Write without consulting the metatable. Writing nil removes the key.
    pub fn raw_set(&self, key: Value, value: Value) -> LuaResult<()> {
        let key = TableKey::checked(&key)?;
        self.0.borrow_mut().store(key, value);
        Ok(())
    }

    pub fn raw_set_str(&self, key: &str, value: Value) {
        self.0.borrow_mut().store(TableKey::Str(Rc::from(key)), value);
    }

    /// Raw membership test
    pub fn has(&self, key: &Value) -> bool {
        TableKey::classify(key).is_some_and(|key| self.0.borrow().contains(&key))
    }

    /// Append after the last sequence element.
    pub fn push(&self, value: Value) {
        let mut inner = self.0.borrow_mut();
        let next = inner.array.len() + 1;
        inner.store(TableKey::Position(next), value);
    }

    /// String-segment keys in insertion order, then sequence positions, then
    /// every other key in insertion order.
    pub fn keys(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    /// Snapshot of all entries in [`TableRef::keys`] order
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let inner = self.0.borrow();
        let strings = inner
            .strings
            .iter()
            .map(|(k, v)| (Value::String(Rc::clone(k)), v.clone()));
        let sequence = inner
            .array
            .iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i + 1), v.clone()));
        let others = inner.others.iter().map(|(k, v)| (k.to_value(), v.clone()));
        strings.chain(sequence).chain(others).collect()
    }

    /// Copy of the sequence segment
    pub fn sequence(&self) -> Vec<Value> {
        self.0.borrow().array.clone()
    }

    /// Insert at a 1-based position in `[1, length + 1]`, shifting later
    /// elements up.
    pub fn insert(&self, value: Value, pos: i64) -> LuaResult<()> {
        let mut inner = self.0.borrow_mut();
        let len = inner.array.len();
        if pos < 1 || pos as usize > len + 1 {
            return Err(LuaError::position(pos, len));
        }
        if value.is_nil() {
            return Err(LuaError::argument("cannot insert nil into a sequence"));
        }
        inner.array.insert(pos as usize - 1, value);
        inner.absorb_following();
        Ok(())
    }

    /// Remove at a 1-based position in `[1, length + 1]`, shifting later
    /// elements down. Removing at `length + 1` is a no-op returning nil.
    pub fn remove(&self, pos: i64) -> LuaResult<Value> {
        let mut inner = self.0.borrow_mut();
        let len = inner.array.len();
        if pos < 1 || pos as usize > len + 1 {
            return Err(LuaError::position(pos, len));
        }
        if pos as usize == len + 1 {
            return Ok(Value::Nil);
        }
        Ok(inner.array.remove(pos as usize - 1))
    }

    /// Join sequence elements `i..=j` with `sep`. Only strings and numbers
    /// are accepted.
    pub fn concat(&self, sep: &str, i: i64, j: i64) -> LuaResult<String> {
        let inner = self.0.borrow();
        let mut parts = Vec::new();
        for pos in i..=j {
            let value = match TableKey::classify(&Value::Number(pos as f64)) {
                Some(key) => inner.fetch(&key),
                None => Value::Nil,
            };
            match value {
                Value::String(s) => parts.push(s.to_string()),
                Value::Number(n) => parts.push(format_number(n)),
                other => {
                    return Err(LuaError::argument(format!(
                        "invalid value (at index {pos}) in table for 'concat': got {}",
                        other.type_name()
                    )));
                }
            }
        }
        Ok(parts.join(sep))
    }

    /// Read with `__index` fallback when the raw value is nil.
    ///
    /// The handler may be a function, called as `(table, key)`, or a table
    /// that is indexed in turn. Both the handler lookup and the call may
    /// suspend.
    pub fn get(&self, key: &Value, frame: &Frame) -> Deferred<Value> {
        let value = self.raw_get(key);
        if !value.is_nil() {
            return Deferred::ok(value);
        }
        let Some(metatable) = self.metatable().filter(|mt| mt.has_str("__index")) else {
            return Deferred::ok(Value::Nil);
        };
        let table = self.clone();
        let key = key.clone();
        let frame = frame.clone();
        metatable
            .get(&Value::from("__index"), &frame)
            .and_then(move |handler| {
                tracing::trace!(key = %key, handler = handler.type_name(), "__index");
                match handler {
                    Value::Function(f) => f
                        .call(&frame, vec![Value::Table(table), key])
                        .map(MultiValue::unwrap),
                    Value::Table(delegate) => delegate.get(&key, &frame),
                    other => Deferred::err(
                        LuaError::metatable(format!(
                            "metatable __index must be a function or table, got {}",
                            other.type_name()
                        ))
                        .with_frame(&frame),
                    ),
                }
            })
    }

    /// Write, routing through `__newindex` when the key is absent.
    pub fn set(&self, key: Value, value: Value, frame: &Frame) -> Deferred<()> {
        if let Err(e) = TableKey::checked(&key) {
            return Deferred::err(e.with_frame(frame));
        }
        let metatable = self
            .metatable()
            .filter(|mt| mt.has_str("__newindex") && !self.has(&key));
        let Some(metatable) = metatable else {
            return self.raw_set(key, value).map_err(|e| e.with_frame(frame)).into();
        };
        let table = self.clone();
        let frame = frame.clone();
        metatable
            .get(&Value::from("__newindex"), &frame)
            .and_then(move |handler| {
                tracing::trace!(key = %key, handler = handler.type_name(), "__newindex");
                match handler {
                    Value::Function(f) => f
                        .call(&frame, vec![Value::Table(table), key, value])
                        .map(|_| ()),
                    Value::Table(delegate) => delegate.set(key, value, &frame),
                    other => Deferred::err(
                        LuaError::metatable(format!(
                            "metatable __newindex must be a function or table, got {}",
                            other.type_name()
                        ))
                        .with_frame(&frame),
                    ),
                }
            })
    }

    fn has_str(&self, key: &str) -> bool {
        self.0.borrow().strings.contains_key(key)
    }

    /// Sort the sequence segment in place.
    ///
    /// With a comparator the sort is a stable merge sort and every
    /// comparison is awaited before the next one starts; `comparator(a, b)`
    /// returning a truthy value means `a < b`. Without one, the sequence
    /// must be all numbers or all strings.
    pub fn sort(&self, comparator: Option<Value>, frame: &Frame) -> Deferred<()> {
        let items = self.sequence();
        let comparator = match comparator {
            None | Some(Value::Nil) => {
                return match natural_sort(items) {
                    Ok(sorted) => {
                        self.0.borrow_mut().array = sorted;
                        Deferred::ok(())
                    }
                    Err(e) => Deferred::err(e.with_frame(frame)),
                };
            }
            Some(Value::Function(f)) => f,
            Some(other) => {
                return Deferred::err(
                    LuaError::bad_argument(2, "sort", "function", other.type_name())
                        .with_frame(frame),
                );
            }
        };
        let table = self.clone();
        let frame = frame.clone();
        Deferred::from_future(async move {
            let sorted = merge_sort(items, &comparator, &frame).await?;
            table.0.borrow_mut().array = sorted;
            Ok(())
        })
    }

    /// String rendering, honouring `__tostring`.
    ///
    /// Without a handler the table renders as `{v1, v2, name = v, [k] = v}`;
    /// tables already being rendered further up show as `{...}`.
    pub fn to_string_async(&self, frame: Option<&Frame>) -> Deferred<String> {
        let frame = frame.cloned().unwrap_or_else(Frame::lost);
        self.render(frame, Rc::new(RefCell::new(HashSet::new())))
    }

    fn render(&self, frame: Frame, seen: Rc<RefCell<HashSet<usize>>>) -> Deferred<String> {
        if let Some(metatable) = self.metatable().filter(|mt| mt.has_str("__tostring")) {
            let table = self.clone();
            return metatable
                .get(&Value::from("__tostring"), &frame)
                .and_then(move |handler| match handler {
                    Value::Function(f) => f
                        .call(&frame, vec![Value::Table(table)])
                        .map(|result| result.first().to_string()),
                    other => Deferred::err(
                        LuaError::metatable(format!(
                            "metatable __tostring must be a function, got {}",
                            other.type_name()
                        ))
                        .with_frame(&frame),
                    ),
                });
        }

        let addr = self.addr();
        if !seen.borrow_mut().insert(addr) {
            return Deferred::ok("{...}".to_string());
        }
        let (strings, sequence) = {
            let inner = self.0.borrow();
            (inner.strings.len(), inner.array.len())
        };
        let entries = self.entries().into_iter().enumerate();
        let step_seen = Rc::clone(&seen);
        try_fold(entries, String::from("{"), move |mut out, (i, (key, value))| {
            if i > 0 {
                out.push_str(", ");
            }
            if i < strings || i >= strings + sequence {
                out.push_str(&render_key(&key));
                out.push_str(" = ");
            }
            render_value(value, frame.clone(), Rc::clone(&step_seen)).map(move |s| {
                out.push_str(&s);
                out
            })
        })
        .map(move |mut out| {
            seen.borrow_mut().remove(&addr);
            out.push('}');
            out
        })
    }
}

fn render_value(value: Value, frame: Frame, seen: Rc<RefCell<HashSet<usize>>>) -> Deferred<String> {
    match value {
        Value::Table(t) => t.render(frame, seen),
        other => Deferred::ok(other.to_string()),
    }
}

fn render_key(key: &Value) -> String {
    match key {
        Value::String(s) if is_identifier(s) => s.to_string(),
        Value::String(s) => format!("[{}]", quote_string(s)),
        other => format!("[{other}]"),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_well && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !KEYWORDS.contains(&s)
}

fn natural_sort(mut items: Vec<Value>) -> LuaResult<Vec<Value>> {
    let mismatch = items.windows(2).find_map(|pair| match (&pair[0], &pair[1]) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => None,
        (a, b) => Some(LuaError::compare(a.type_name(), b.type_name())),
    });
    if let Some(err) = mismatch {
        return Err(err);
    }
    match items.first() {
        Some(Value::Number(_)) => items.sort_by(|a, b| {
            a.as_number()
                .partial_cmp(&b.as_number())
                .unwrap_or(Ordering::Equal)
        }),
        Some(Value::String(_)) => items.sort_by(|a, b| a.as_str().cmp(&b.as_str())),
        // a lone element of any type is already sorted
        _ => {}
    }
    Ok(items)
}

/// Bottom-up merge sort with one awaited comparison at a time
async fn merge_sort(mut items: Vec<Value>, less: &FunctionRef, frame: &Frame) -> LuaResult<Vec<Value>> {
    let n = items.len();
    let mut width = 1;
    while width < n {
        let mut merged = Vec::with_capacity(n);
        let mut start = 0;
        while start < n {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j) = (start, mid);
            while i < mid && j < end {
                let right_first = less
                    .call(frame, vec![items[j].clone(), items[i].clone()])
                    .await?
                    .first()
                    .is_truthy();
                if right_first {
                    merged.push(items[j].clone());
                    j += 1;
                } else {
                    merged.push(items[i].clone());
                    i += 1;
                }
            }
            merged.extend_from_slice(&items[i..mid]);
            merged.extend_from_slice(&items[j..end]);
            start = end;
        }
        items = merged;
        width *= 2;
    }
    Ok(items)
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table: {:#x}", self.addr())
    }
}
