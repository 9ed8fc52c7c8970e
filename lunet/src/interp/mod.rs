//! Runtime core: values, environments, tables, functions and the evaluator

mod deferred;
mod env;
pub mod eval;
mod function;
mod multi;
pub mod ops;
mod table;
mod value;

pub use deferred::{Deferred, LocalBoxFuture, try_fold};
pub use env::{CONTEXT_NAME, EnvRef, Environment, child_env};
pub use eval::Interpreter;
pub use function::{
    BuiltinFn, BuiltinFunction, Closure, DEFAULT_MAX_DEPTH, Frame, FunctionRef, LuaFunction, NativeFunction,
};
pub use multi::MultiValue;
pub use table::{LuaTable, TableRef};
pub use value::{LuaType, UserData, Value, format_number, parse_number, quote_string};
