//! Callable values and call frames

use super::deferred::{Deferred, GrowStack};
use super::env::{CONTEXT_NAME, EnvRef, Environment, child_env};
use super::multi::MultiValue;
use super::value::{UserData, Value};
use crate::ast::{FunctionBody, Span};
use crate::error::{ErrorKind, LuaError};
use crate::interop::{self, HostFn};
use std::fmt;
use std::rc::Rc;

/// Shared reference to a function value
pub type FunctionRef = Rc<LuaFunction>;

/// Library function that sees the whole call frame
pub type BuiltinFn = Rc<dyn Fn(&Frame, Vec<Value>) -> Deferred<MultiValue>>;

/// Default recursion limit for frames built without a configuration
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// The three kinds of callable
pub enum LuaFunction {
    /// Guest function: AST body plus the environment it closed over
    Closure(Closure),
    /// Host callable with automatic value conversion
    Native(NativeFunction),
    /// Library function receiving raw guest values and the frame
    Builtin(BuiltinFunction),
}

pub struct Closure {
    pub body: Rc<FunctionBody>,
    /// Defining scope, shared with every other closure created there
    pub env: EnvRef,
}

pub struct NativeFunction {
    pub name: String,
    pub func: HostFn,
}

pub struct BuiltinFunction {
    pub name: String,
    pub func: BuiltinFn,
}

impl LuaFunction {
    pub fn closure(body: Rc<FunctionBody>, env: EnvRef) -> Value {
        Value::from(LuaFunction::Closure(Closure { body, env }))
    }

    pub fn native(name: impl Into<String>, func: HostFn) -> Value {
        Value::from(LuaFunction::Native(NativeFunction {
            name: name.into(),
            func,
        }))
    }

    pub fn builtin(
        name: impl Into<String>,
        func: impl Fn(&Frame, Vec<Value>) -> Deferred<MultiValue> + 'static,
    ) -> Value {
        Value::from(LuaFunction::Builtin(BuiltinFunction {
            name: name.into(),
            func: Rc::new(func),
        }))
    }

    /// Invoke with the caller's frame.
    pub fn call(&self, frame: &Frame, args: Vec<Value>) -> Deferred<MultiValue> {
        tracing::trace!(function = %self, args = args.len(), depth = frame.depth(), "call");
        match self {
            LuaFunction::Closure(closure) => closure.call(frame, args),
            LuaFunction::Native(native) => native.call(frame, args),
            LuaFunction::Builtin(builtin) => (builtin.func)(frame, args),
        }
    }
}

impl Closure {
    fn call(&self, frame: &Frame, args: Vec<Value>) -> Deferred<MultiValue> {
        if frame.depth() > frame.max_depth() {
            return Deferred::err(LuaError::stack_overflow().with_frame(frame));
        }

        let env = child_env(&self.env);
        {
            let mut scope = env.borrow_mut();
            scope.set_local(
                CONTEXT_NAME,
                Value::UserData(UserData::new(frame.thread_local().clone())),
            );
            let mut args = args.into_iter();
            for param in &self.body.parameters {
                scope.set_local(param.as_str(), args.next().unwrap_or_default());
            }
            let extra = if self.body.is_vararg {
                args.collect()
            } else {
                MultiValue::empty()
            };
            scope.set_varargs(extra);
        }

        let body = Rc::clone(&self.body);
        let frame = frame.clone();
        Deferred::from_future(GrowStack::new(async move {
            match crate::interp::eval::exec_block(&body.block, &env, &frame).await {
                Ok(()) => Ok(MultiValue::empty()),
                Err(e) => match e.kind {
                    ErrorKind::Return(values) => Ok(values),
                    ErrorKind::Break => {
                        Err(LuaError::raised("break outside a loop").with_frame(&frame))
                    }
                    _ => Err(e),
                },
            }
        }))
    }
}

impl NativeFunction {
    fn call(&self, frame: &Frame, args: Vec<Value>) -> Deferred<MultiValue> {
        let host_args = args.iter().map(interop::to_host).collect();
        let frame = frame.clone();
        match (self.func)(host_args) {
            Ok(result) => interop::to_guest(result)
                .map(MultiValue::one)
                .map_err(move |e| e.with_frame(&frame)),
            Err(err) => Deferred::err(LuaError::from(err).with_frame(&frame)),
        }
    }
}

impl fmt::Display for LuaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaFunction::Closure(c) => {
                write!(f, "<lua function({})>", c.body.parameters.join(", "))
            }
            LuaFunction::Native(n) => write!(f, "<native function: {}>", n.name),
            LuaFunction::Builtin(b) => write!(f, "<builtin function: {}>", b.name),
        }
    }
}

impl fmt::Debug for LuaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Record of one active invocation
///
/// Frames link to their parent only so diagnostics can walk the chain.
#[derive(Clone)]
pub struct Frame(Rc<FrameData>);

struct FrameData {
    thread_local: EnvRef,
    span: Option<Span>,
    source_ref: Option<Rc<str>>,
    parent: Option<Frame>,
    depth: usize,
    max_depth: usize,
}

impl Frame {
    /// Outermost frame of an execution
    pub fn root(thread_local: EnvRef, source_ref: Option<&str>, max_depth: usize) -> Self {
        Frame(Rc::new(FrameData {
            thread_local,
            span: None,
            source_ref: source_ref.map(Rc::from),
            parent: None,
            depth: 0,
            max_depth,
        }))
    }

    /// Frame for calls that arrive without any caller context
    pub fn lost() -> Self {
        Frame::root(Environment::new().into_ref(), None, DEFAULT_MAX_DEPTH)
    }

    /// Child frame for an operation at `span`
    pub fn with_span(&self, span: Span) -> Frame {
        Frame(Rc::new(FrameData {
            thread_local: Rc::clone(&self.0.thread_local),
            span: Some(span),
            source_ref: self.0.source_ref.clone(),
            parent: Some(self.clone()),
            depth: self.0.depth + 1,
            max_depth: self.0.max_depth,
        }))
    }

    /// Same position, attributed to another source chunk
    pub fn with_source_ref(&self, source_ref: &str) -> Frame {
        Frame(Rc::new(FrameData {
            thread_local: Rc::clone(&self.0.thread_local),
            span: self.0.span,
            source_ref: Some(Rc::from(source_ref)),
            parent: self.0.parent.clone(),
            depth: self.0.depth,
            max_depth: self.0.max_depth,
        }))
    }

    pub fn thread_local(&self) -> &EnvRef {
        &self.0.thread_local
    }

    pub fn span(&self) -> Option<Span> {
        self.0.span
    }

    pub fn source_ref(&self) -> Option<&str> {
        self.0.source_ref.as_deref()
    }

    pub fn parent(&self) -> Option<Frame> {
        self.0.parent.clone()
    }

    pub fn depth(&self) -> usize {
        self.0.depth
    }

    pub fn max_depth(&self) -> usize {
        self.0.max_depth
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("span", &self.0.span)
            .field("source_ref", &self.0.source_ref)
            .field("depth", &self.0.depth)
            .finish_non_exhaustive()
    }
}
