//! Lunet: an embeddable interpreter for a Lua-family scripting language
//!
//! Programs arrive as syntax trees built by an external front end and are
//! evaluated against a shared global environment. Host code exchanges
//! values and functions with scripts through [`interop`].

pub mod ast;
pub mod config;
pub mod error;
pub mod interop;
pub mod interp;
pub mod stdlib;
pub mod util;

pub use ast::Span;
pub use config::RuntimeConfig;
pub use error::{ErrorKind, LuaError, LuaResult, report};
pub use interop::{HostError, HostFn, HostValue, host_fn};
pub use interp::{Deferred, Frame, Interpreter, LuaFunction, MultiValue, TableRef, Value};
