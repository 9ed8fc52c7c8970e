//! Errors and control signals
//!
//! `break`, `return` and runtime errors travel on one channel. Each
//! boundary matches the kind it owns and hands everything else back
//! unchanged: loops take `Break`, calls take `Return`, protected calls take
//! runtime errors only.

mod report;

pub use report::report;

use crate::interp::{Frame, MultiValue};
use thiserror::Error;

/// Result type for runtime operations
pub type LuaResult<T> = std::result::Result<T, LuaError>;

/// Kinds of errors and signals
#[derive(Debug, Clone)]
pub enum ErrorKind {
    /// Control flow: leave the nearest enclosing loop
    Break,
    /// Control flow: leave the enclosing function with these results
    Return(MultiValue),

    /// Indexing nil or another value that is not a table
    IndexNil,
    /// Indexing or writing with a nil (or NaN) key
    NilKey,
    /// Calling something that is not a function
    NotCallable,
    /// `assert` on a falsy value
    AssertionFailed,
    /// Explicit `error(...)`
    Raised,
    /// Metatable handler of the wrong shape
    Metatable,
    /// Bad argument passed to a builtin
    Argument,
    /// Arithmetic or concatenation on unsupported operands
    Arithmetic,
    /// Ordering between incomparable values
    Compare,
    /// Sequence position outside `[1, length + 1]`
    Position,
    /// Too many nested calls
    StackOverflow,
    /// A host-native function failed
    Host,
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Error or control signal raised during evaluation
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LuaError {
    pub kind: ErrorKind,
    pub message: String,
    /// Frame active where the error was raised
    pub frame: Option<Frame>,
    /// Extra help line shown by the renderers, never part of `message`
    pub hint: Option<String>,
    #[source]
    pub cause: Option<Box<LuaError>>,
}

impl LuaError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        LuaError {
            kind,
            message: message.into(),
            frame: None,
            hint: None,
            cause: None,
        }
    }

    pub fn break_signal() -> Self {
        Self::new(ErrorKind::Break, "break")
    }

    pub fn return_signal(values: MultiValue) -> Self {
        Self::new(ErrorKind::Return(values), "return")
    }

    pub fn index_nil(description: Option<&str>) -> Self {
        Self::index_value("nil", description)
    }

    pub fn index_value(type_name: &str, description: Option<&str>) -> Self {
        let message = match description {
            Some(what) => format!("attempt to index a {type_name} value ({what})"),
            None => format!("attempt to index a {type_name} value"),
        };
        Self::new(ErrorKind::IndexNil, message)
    }

    pub fn nil_key() -> Self {
        Self::new(ErrorKind::NilKey, "attempt to index with a nil key")
    }

    pub fn nan_key() -> Self {
        Self::new(ErrorKind::NilKey, "attempt to index with a NaN key")
    }

    pub fn not_callable(type_name: &str, description: Option<&str>) -> Self {
        let message = match description {
            Some(what) => format!("attempt to call a {type_name} value ({what})"),
            None => format!("attempt to call a {type_name} value"),
        };
        Self::new(ErrorKind::NotCallable, message)
    }

    pub fn assertion_failed(message: Option<&str>) -> Self {
        Self::new(
            ErrorKind::AssertionFailed,
            match message {
                Some(m) => format!("Assertion failed: {m}"),
                None => "Assertion failed".to_string(),
            },
        )
    }

    pub fn raised(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Raised, message)
    }

    pub fn metatable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Metatable, message)
    }

    pub fn bad_argument(position: usize, function: &str, expected: &str, got: &str) -> Self {
        Self::new(
            ErrorKind::Argument,
            format!("bad argument #{position} to '{function}' ({expected} expected, got {got})"),
        )
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Argument, message)
    }

    pub fn arithmetic(action: &str, type_name: &str) -> Self {
        Self::new(
            ErrorKind::Arithmetic,
            format!("attempt to {action} a {type_name} value"),
        )
    }

    pub fn compare(left: &str, right: &str) -> Self {
        Self::new(
            ErrorKind::Compare,
            format!("attempt to compare {left} with {right}"),
        )
    }

    pub fn position(position: i64, length: usize) -> Self {
        Self::new(
            ErrorKind::Position,
            format!("position {position} out of bounds for sequence of length {length}"),
        )
    }

    pub fn stack_overflow() -> Self {
        Self::new(ErrorKind::StackOverflow, "stack overflow")
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Host, message)
    }

    /// Record the raise point. An already recorded frame is kept, so the
    /// innermost location wins as the error unwinds.
    pub fn with_frame(mut self, frame: &Frame) -> Self {
        if self.frame.is_none() && !self.is_control() {
            self.frame = Some(frame.clone());
        }
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_cause(mut self, cause: LuaError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// `break` and `return` are signals, not errors.
    pub fn is_control(&self) -> bool {
        matches!(self.kind, ErrorKind::Break | ErrorKind::Return(_))
    }

    pub fn is_runtime(&self) -> bool {
        !self.is_control()
    }

    /// Render with raw byte offsets, used when no source text is at hand.
    pub fn to_plain_string(&self) -> String {
        let span = self.frame.as_ref().and_then(|f| f.span());
        match span {
            Some(span) => format!(
                "LuaRuntimeError: {} at {}, {}",
                self.message, span.start, span.end
            ),
            None => format!("LuaRuntimeError: {} at ?, ?", self.message),
        }
    }
}
