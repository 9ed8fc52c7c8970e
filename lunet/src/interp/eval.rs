//! Statement and expression evaluator
//!
//! Walks the AST asynchronously. Every sub-evaluation is awaited before the
//! next one starts, so evaluation order is strictly left to right even when
//! some step suspends on the host.

use super::deferred::{Deferred, GrowStack, LocalBoxFuture};
use super::env::{EnvRef, Environment, child_env};
use super::function::{Frame, LuaFunction};
use super::multi::MultiValue;
use super::ops;
use super::table::TableRef;
use super::value::Value;
use crate::ast::{BinOp, Block, Expr, FunctionBody, Span, Stmt, TableField};
use crate::config::RuntimeConfig;
use crate::error::{ErrorKind, LuaError, LuaResult};
use crate::interop::HostFn;
use crate::stdlib::{self, OutputSink};
use crate::util::{find_similar_name, suggestion_hint};
use std::rc::Rc;

/// Run `block` in a fresh scope nested in `env`.
pub fn exec_block<'a>(block: &'a Block, env: &'a EnvRef, frame: &'a Frame) -> LocalBoxFuture<'a, LuaResult<()>> {
    Box::pin(async move {
        let scope = child_env(env);
        exec_statements(&block.statements, &scope, frame).await
    })
}

/// Run statements directly in `env`.
pub fn exec_statements<'a>(
    statements: &'a [Stmt],
    env: &'a EnvRef,
    frame: &'a Frame,
) -> LocalBoxFuture<'a, LuaResult<()>> {
    Box::pin(async move {
        for stmt in statements {
            exec_stmt(stmt, env, frame).await?;
        }
        Ok(())
    })
}

/// Runs a loop body, turning `break` into `false` ("stop looping").
async fn loop_body(statements: &[Stmt], env: &EnvRef, frame: &Frame) -> LuaResult<bool> {
    match exec_statements(statements, env, frame).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind == ErrorKind::Break => Ok(false),
        Err(e) => Err(e),
    }
}

/// Assignment target resolved before the right-hand side runs
enum Place {
    Name(String),
    Index { target: Value, key: Value, span: Span },
}

pub fn exec_stmt<'a>(stmt: &'a Stmt, env: &'a EnvRef, frame: &'a Frame) -> LocalBoxFuture<'a, LuaResult<()>> {
    Box::pin(async move {
        match stmt {
            Stmt::Local { names, exprs } => {
                let values = eval_expr_list(exprs, env, frame).await?;
                let mut scope = env.borrow_mut();
                for (i, name) in names.iter().enumerate() {
                    scope.set_local(name.as_str(), values.get(i));
                }
                Ok(())
            }

            Stmt::Assign { targets, exprs } => {
                let mut places = Vec::with_capacity(targets.len());
                for target in targets {
                    places.push(resolve_place(target, env, frame).await?);
                }
                let values = eval_expr_list(exprs, env, frame).await?;
                for (i, place) in places.into_iter().enumerate() {
                    match place {
                        Place::Name(name) => env.borrow_mut().set(&name, values.get(i)),
                        Place::Index { target, key, span } => {
                            ops::assign_index(&target, key, values.get(i), &frame.with_span(span), None).await?
                        }
                    }
                }
                Ok(())
            }

            Stmt::Call(expr) => eval_expr(expr, env, frame).await.map(|_| ()),

            Stmt::If { branches, otherwise } => {
                for (condition, block) in branches {
                    if eval_single(condition, env, frame).await?.is_truthy() {
                        return exec_block(block, env, frame).await;
                    }
                }
                match otherwise {
                    Some(block) => exec_block(block, env, frame).await,
                    None => Ok(()),
                }
            }

            Stmt::While { condition, body } => {
                while eval_single(condition, env, frame).await?.is_truthy() {
                    let scope = child_env(env);
                    if !loop_body(&body.statements, &scope, frame).await? {
                        break;
                    }
                }
                Ok(())
            }

            Stmt::Repeat { body, condition } => {
                loop {
                    let scope = child_env(env);
                    if !loop_body(&body.statements, &scope, frame).await? {
                        break;
                    }
                    if eval_single(condition, &scope, frame).await?.is_truthy() {
                        break;
                    }
                }
                Ok(())
            }

            Stmt::NumericFor {
                var,
                start,
                limit,
                step,
                body,
            } => {
                let start = for_number(eval_single(start, env, frame).await?, "initial", frame)?;
                let limit = for_number(eval_single(limit, env, frame).await?, "limit", frame)?;
                let step = match step {
                    Some(step) => for_number(eval_single(step, env, frame).await?, "step", frame)?,
                    None => 1.0,
                };
                if step == 0.0 {
                    return Err(LuaError::argument("'for' step is zero").with_frame(frame));
                }
                let mut i = start;
                while (step > 0.0 && i <= limit) || (step < 0.0 && i >= limit) {
                    let scope = child_env(env);
                    scope.borrow_mut().set_local(var.as_str(), Value::Number(i));
                    if !loop_body(&body.statements, &scope, frame).await? {
                        break;
                    }
                    i += step;
                }
                Ok(())
            }

            Stmt::GenericFor { names, exprs, body } => {
                let init = eval_expr_list(exprs, env, frame).await?;
                let (iterator, state) = (init.get(0), init.get(1));
                let mut control = init.get(2);
                loop {
                    let results =
                        ops::call_value(&iterator, vec![state.clone(), control.clone()], frame, None).await?;
                    if results.first().is_nil() {
                        break;
                    }
                    control = results.first();
                    let scope = child_env(env);
                    {
                        let mut bindings = scope.borrow_mut();
                        for (i, name) in names.iter().enumerate() {
                            bindings.set_local(name.as_str(), results.get(i));
                        }
                    }
                    if !loop_body(&body.statements, &scope, frame).await? {
                        break;
                    }
                }
                Ok(())
            }

            Stmt::Function { path, method, body } => {
                let body = match method {
                    Some(_) => Rc::new(with_self_parameter(body)),
                    None => Rc::clone(body),
                };
                let function = LuaFunction::closure(body, Rc::clone(env));
                let (first, rest) = match path.split_first() {
                    Some(split) => split,
                    None => return Err(LuaError::argument("function declaration without a name")),
                };
                let key = match (method, rest.last()) {
                    (Some(method), _) => method.clone(),
                    (None, Some(last)) => last.clone(),
                    (None, None) => {
                        env.borrow_mut().set(first, function);
                        return Ok(());
                    }
                };
                let lookup = env.borrow().get(first).unwrap_or_default();
                let mut target = lookup;
                let walk = if method.is_some() { rest } else { &rest[..rest.len() - 1] };
                let mut description = format!("global '{first}'");
                for field in walk {
                    target = ops::index(&target, &Value::from(field.as_str()), frame, Some(&description)).await?;
                    description = format!("field '{field}'");
                }
                ops::assign_index(&target, Value::from(key), function, frame, Some(&description)).await
            }

            Stmt::LocalFunction { name, body } => {
                // bound before the closure exists so the body can recurse
                env.borrow_mut().set_local(name.as_str(), Value::Nil);
                let function = LuaFunction::closure(Rc::clone(body), Rc::clone(env));
                env.borrow_mut().set_local(name.as_str(), function);
                Ok(())
            }

            Stmt::Return(exprs) => {
                let values = eval_expr_list(exprs, env, frame).await?;
                Err(LuaError::return_signal(values))
            }

            Stmt::Break => Err(LuaError::break_signal()),

            Stmt::Do(block) => exec_block(block, env, frame).await,
        }
    })
}

fn with_self_parameter(body: &FunctionBody) -> FunctionBody {
    let mut parameters = Vec::with_capacity(body.parameters.len() + 1);
    parameters.push("self".to_string());
    parameters.extend(body.parameters.iter().cloned());
    FunctionBody {
        parameters,
        ..body.clone()
    }
}

fn for_number(value: Value, what: &str, frame: &Frame) -> LuaResult<f64> {
    value
        .to_number()
        .ok_or_else(|| LuaError::argument(format!("'for' {what} value must be a number")).with_frame(frame))
}

async fn resolve_place(target: &Expr, env: &EnvRef, frame: &Frame) -> LuaResult<Place> {
    match target {
        Expr::Name { name, .. } => Ok(Place::Name(name.clone())),
        Expr::Index { target, key, span } => {
            let target = eval_single(target, env, frame).await?;
            let key = eval_single(key, env, frame).await?;
            Ok(Place::Index {
                target,
                key,
                span: *span,
            })
        }
        _ => Err(LuaError::argument("cannot assign to this expression").with_frame(frame)),
    }
}

/// How a value was reached, for error messages
fn describe(expr: &Expr, env: &EnvRef) -> Option<String> {
    match expr {
        Expr::Name { name, .. } => Some(if env.borrow().is_global(name) {
            format!("global '{name}'")
        } else {
            format!("local '{name}'")
        }),
        Expr::Index { key, .. } => match key.as_ref() {
            Expr::String(s) => Some(format!("field '{s}'")),
            _ => None,
        },
        Expr::MethodCall { method, .. } => Some(format!("method '{method}'")),
        _ => None,
    }
}

/// Evaluate to the first result only.
pub fn eval_single<'a>(expr: &'a Expr, env: &'a EnvRef, frame: &'a Frame) -> LocalBoxFuture<'a, LuaResult<Value>> {
    Box::pin(async move { eval_expr(expr, env, frame).await.map(MultiValue::unwrap) })
}

/// Evaluate an expression list; only the last expression may expand to
/// several values.
pub fn eval_expr_list<'a>(
    exprs: &'a [Expr],
    env: &'a EnvRef,
    frame: &'a Frame,
) -> LocalBoxFuture<'a, LuaResult<MultiValue>> {
    Box::pin(async move {
        let mut values = MultiValue::empty();
        for (i, expr) in exprs.iter().enumerate() {
            if i + 1 == exprs.len() && expr.is_multi_valued() {
                values.extend(eval_expr(expr, env, frame).await?);
            } else {
                values.push(eval_single(expr, env, frame).await?);
            }
        }
        Ok(values)
    })
}

pub fn eval_expr<'a>(expr: &'a Expr, env: &'a EnvRef, frame: &'a Frame) -> LocalBoxFuture<'a, LuaResult<MultiValue>> {
    Box::pin(GrowStack::new(async move {
        match expr {
            Expr::Nil => Ok(MultiValue::one(Value::Nil)),
            Expr::Bool(b) => Ok(MultiValue::one(*b)),
            Expr::Number(n) => Ok(MultiValue::one(*n)),
            Expr::String(s) => Ok(MultiValue::one(Value::String(Rc::clone(s)))),
            Expr::Vararg => Ok(env.borrow().varargs()),

            Expr::Name { name, .. } => {
                let value = env.borrow().get(name).unwrap_or_default();
                Ok(MultiValue::one(value))
            }

            Expr::Index { target, key, span } => {
                let object = eval_single(target, env, frame).await?;
                let key = eval_single(key, env, frame).await?;
                let description = describe(target, env);
                let value = ops::index(&object, &key, &frame.with_span(*span), description.as_deref()).await?;
                Ok(MultiValue::one(value))
            }

            Expr::Call { callee, args, span } => {
                let function = eval_single(callee, env, frame).await?;
                let args = eval_expr_list(args, env, frame).await?;
                let description = describe(callee, env);
                let call_frame = frame.with_span(*span);
                ops::call_value(&function, args.into_vec(), &call_frame, description.as_deref())
                    .await
                    .map_err(|e| with_name_hint(e, &function, callee, env))
            }

            Expr::MethodCall {
                target,
                method,
                args,
                span,
            } => {
                let object = eval_single(target, env, frame).await?;
                let call_frame = frame.with_span(*span);
                let description = describe(target, env);
                let function = ops::index(
                    &object,
                    &Value::from(method.as_str()),
                    &call_frame,
                    description.as_deref(),
                )
                .await?;
                let mut argv = vec![object];
                argv.extend(eval_expr_list(args, env, frame).await?);
                let description = format!("method '{method}'");
                ops::call_value(&function, argv, &call_frame, Some(&description)).await
            }

            Expr::Function(body) => Ok(MultiValue::one(LuaFunction::closure(Rc::clone(body), Rc::clone(env)))),

            Expr::Table { fields, span } => {
                let table = TableRef::new();
                let mut position = 1usize;
                for (i, field) in fields.iter().enumerate() {
                    match field {
                        TableField::Positional(value) if i + 1 == fields.len() && value.is_multi_valued() => {
                            for v in eval_expr(value, env, frame).await? {
                                table.raw_set(Value::from(position), v)?;
                                position += 1;
                            }
                        }
                        TableField::Positional(value) => {
                            let v = eval_single(value, env, frame).await?;
                            table.raw_set(Value::from(position), v)?;
                            position += 1;
                        }
                        TableField::Named(name, value) => {
                            let v = eval_single(value, env, frame).await?;
                            table.raw_set_str(name, v);
                        }
                        TableField::Keyed(key, value) => {
                            let k = eval_single(key, env, frame).await?;
                            let v = eval_single(value, env, frame).await?;
                            table
                                .raw_set(k, v)
                                .map_err(|e| e.with_frame(&frame.with_span(*span)))?;
                        }
                    }
                }
                Ok(MultiValue::one(table))
            }

            Expr::Binary {
                op: BinOp::And,
                left,
                right,
                ..
            } => {
                let left = eval_single(left, env, frame).await?;
                if !left.is_truthy() {
                    return Ok(MultiValue::one(left));
                }
                eval_single(right, env, frame).await.map(MultiValue::one)
            }

            Expr::Binary {
                op: BinOp::Or,
                left,
                right,
                ..
            } => {
                let left = eval_single(left, env, frame).await?;
                if left.is_truthy() {
                    return Ok(MultiValue::one(left));
                }
                eval_single(right, env, frame).await.map(MultiValue::one)
            }

            Expr::Binary { op, left, right, span } => {
                let left = eval_single(left, env, frame).await?;
                let right = eval_single(right, env, frame).await?;
                ops::binary(*op, &left, &right)
                    .map(MultiValue::one)
                    .map_err(|e| e.with_frame(&frame.with_span(*span)))
            }

            Expr::Unary { op, operand, span } => {
                let operand = eval_single(operand, env, frame).await?;
                ops::unary(*op, &operand)
                    .map(MultiValue::one)
                    .map_err(|e| e.with_frame(&frame.with_span(*span)))
            }

            Expr::Paren(inner) => eval_single(inner, env, frame).await.map(MultiValue::one),
        }
    }))
}

/// Calling an unbound name: suggest a bound one that is spelled alike.
fn with_name_hint(error: LuaError, function: &Value, callee: &Expr, env: &EnvRef) -> LuaError {
    let Expr::Name { name, .. } = callee else {
        return error;
    };
    if error.kind != ErrorKind::NotCallable || !function.is_nil() || error.hint.is_some() {
        return error;
    }
    let names = env.borrow().keys();
    match suggestion_hint(find_similar_name(name, names.iter().map(String::as_str), 2)) {
        Some(hint) => error.with_hint(hint),
        None => error,
    }
}

/// An interpreter instance: configuration, global environment and the
/// root frame every execution starts from.
pub struct Interpreter {
    config: RuntimeConfig,
    globals: EnvRef,
    frame: Frame,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let output = stdlib::default_output(&config);
        Self::with_output(config, output)
    }

    /// Interpreter whose `print` writes through `output`
    pub fn with_output(config: RuntimeConfig, output: OutputSink) -> Self {
        let globals = Environment::global();
        stdlib::install(&globals, &config, output);
        let frame = Frame::root(Environment::global(), Some(&config.chunk_name), config.max_call_depth);
        tracing::debug!(chunk = %config.chunk_name, max_call_depth = config.max_call_depth, "interpreter created");
        Interpreter { config, globals, frame }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn get_global(&self, name: &str) -> Value {
        self.globals.borrow().get(name).unwrap_or_default()
    }

    pub fn set_global(&self, name: &str, value: impl Into<Value>) {
        self.globals.borrow_mut().set_local(name, value.into());
    }

    /// Expose a host function as a global.
    pub fn register_native(&self, name: &str, func: HostFn) {
        self.set_global(name, LuaFunction::native(name, func));
    }

    /// Expose a frame-aware library function as a global.
    pub fn register_builtin(
        &self,
        name: &str,
        func: impl Fn(&Frame, Vec<Value>) -> Deferred<MultiValue> + 'static,
    ) {
        self.set_global(name, LuaFunction::builtin(name, func));
    }

    /// Run a chunk. Its locals live in a scope of their own; a top-level
    /// `return` becomes the result.
    pub async fn exec(&self, block: &Block) -> LuaResult<MultiValue> {
        tracing::debug!(chunk = %self.config.chunk_name, statements = block.statements.len(), "exec");
        match exec_block(block, &self.globals, &self.frame).await {
            Ok(()) => Ok(MultiValue::empty()),
            Err(e) => match e.kind {
                ErrorKind::Return(values) => Ok(values),
                ErrorKind::Break => Err(LuaError::raised("break outside a loop").with_frame(&self.frame)),
                _ => Err(e),
            },
        }
    }

    /// Call a guest value from the host.
    pub async fn call(&self, function: &Value, args: Vec<Value>) -> LuaResult<MultiValue> {
        ops::call_value(function, args, &self.frame, None).await
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::UnOp;
    use pretty_assertions::assert_eq;

    fn quiet() -> Interpreter {
        Interpreter::with_output(RuntimeConfig::default(), Rc::new(|_: &str| {}))
    }

    fn num(n: f64) -> Expr {
        Expr::Number(n)
    }

    async fn run(statements: Vec<Stmt>) -> LuaResult<Vec<Value>> {
        quiet().exec(&Block::new(statements)).await.map(MultiValue::into_vec)
    }

    #[tokio::test]
    async fn test_return_values() {
        let out = run(vec![Stmt::Return(vec![num(1.0), Expr::string("a")])]).await;
        assert_eq!(out.ok(), Some(vec![Value::Number(1.0), Value::from("a")]));
    }

    #[tokio::test]
    async fn test_locals_do_not_leak_to_globals() {
        let interp = quiet();
        let block = Block::new(vec![Stmt::local("x", num(1.0)), Stmt::assign(Expr::name("y"), num(2.0))]);
        interp.exec(&block).await.unwrap();
        assert_eq!(interp.get_global("x"), Value::Nil);
        assert_eq!(interp.get_global("y"), Value::Number(2.0));
    }

    #[tokio::test]
    async fn test_multiple_assignment_evaluates_rhs_first() {
        let out = run(vec![
            Stmt::local("a", num(1.0)),
            Stmt::local("b", num(2.0)),
            Stmt::Assign {
                targets: vec![Expr::name("a"), Expr::name("b")],
                exprs: vec![Expr::name("b"), Expr::name("a")],
            },
            Stmt::Return(vec![Expr::name("a"), Expr::name("b")]),
        ])
        .await;
        assert_eq!(out.ok(), Some(vec![Value::Number(2.0), Value::Number(1.0)]));
    }

    #[tokio::test]
    async fn test_numeric_for_with_break() {
        // local sum = 0; for i = 1, 10 do if i > 4 then break end sum = sum + i end
        let out = run(vec![
            Stmt::local("sum", num(0.0)),
            Stmt::NumericFor {
                var: "i".into(),
                start: num(1.0),
                limit: num(10.0),
                step: None,
                body: Block::new(vec![
                    Stmt::If {
                        branches: vec![(
                            Expr::binary(BinOp::Gt, Expr::name("i"), num(4.0)),
                            Block::new(vec![Stmt::Break]),
                        )],
                        otherwise: None,
                    },
                    Stmt::assign(
                        Expr::name("sum"),
                        Expr::binary(BinOp::Add, Expr::name("sum"), Expr::name("i")),
                    ),
                ]),
            },
            Stmt::Return(vec![Expr::name("sum")]),
        ])
        .await;
        assert_eq!(out.ok(), Some(vec![Value::Number(10.0)]));
    }

    #[tokio::test]
    async fn test_numeric_for_negative_step() {
        let out = run(vec![
            Stmt::local("s", Expr::string("")),
            Stmt::NumericFor {
                var: "i".into(),
                start: num(3.0),
                limit: num(1.0),
                step: Some(Expr::unary(UnOp::Neg, num(1.0))),
                body: Block::new(vec![Stmt::assign(
                    Expr::name("s"),
                    Expr::binary(BinOp::Concat, Expr::name("s"), Expr::name("i")),
                )]),
            },
            Stmt::Return(vec![Expr::name("s")]),
        ])
        .await;
        assert_eq!(out.ok(), Some(vec![Value::from("321")]));
    }

    #[tokio::test]
    async fn test_while_and_repeat() {
        let out = run(vec![
            Stmt::local("n", num(0.0)),
            Stmt::While {
                condition: Expr::binary(BinOp::Lt, Expr::name("n"), num(3.0)),
                body: Block::new(vec![Stmt::assign(
                    Expr::name("n"),
                    Expr::binary(BinOp::Add, Expr::name("n"), num(1.0)),
                )]),
            },
            Stmt::Repeat {
                body: Block::new(vec![Stmt::local(
                    "done",
                    Expr::binary(BinOp::Ge, Expr::name("n"), num(3.0)),
                )]),
                // sees the body's local
                condition: Expr::name("done"),
            },
            Stmt::Return(vec![Expr::name("n")]),
        ])
        .await;
        assert_eq!(out.ok(), Some(vec![Value::Number(3.0)]));
    }

    #[tokio::test]
    async fn test_closures_share_captured_environment() {
        // local count = 0
        // local function inc() count = count + 1 end
        // local function get() return count end
        // inc(); inc(); return get()
        let out = run(vec![
            Stmt::local("count", num(0.0)),
            Stmt::local_function(
                "inc",
                FunctionBody::new(
                    &[],
                    Block::new(vec![Stmt::assign(
                        Expr::name("count"),
                        Expr::binary(BinOp::Add, Expr::name("count"), num(1.0)),
                    )]),
                ),
            ),
            Stmt::local_function(
                "get",
                FunctionBody::new(&[], Block::new(vec![Stmt::Return(vec![Expr::name("count")])])),
            ),
            Stmt::Call(Expr::call(Expr::name("inc"), vec![])),
            Stmt::Call(Expr::call(Expr::name("inc"), vec![])),
            Stmt::Return(vec![Expr::call(Expr::name("get"), vec![])]),
        ])
        .await;
        assert_eq!(out.ok(), Some(vec![Value::Number(2.0)]));
    }

    #[tokio::test]
    async fn test_recursive_local_function() {
        // local function fact(n) if n <= 1 then return 1 end return n * fact(n - 1) end
        let body = FunctionBody::new(
            &["n"],
            Block::new(vec![
                Stmt::If {
                    branches: vec![(
                        Expr::binary(BinOp::Le, Expr::name("n"), num(1.0)),
                        Block::new(vec![Stmt::Return(vec![num(1.0)])]),
                    )],
                    otherwise: None,
                },
                Stmt::Return(vec![Expr::binary(
                    BinOp::Mul,
                    Expr::name("n"),
                    Expr::call(
                        Expr::name("fact"),
                        vec![Expr::binary(BinOp::Sub, Expr::name("n"), num(1.0))],
                    ),
                )]),
            ]),
        );
        let out = run(vec![
            Stmt::local_function("fact", body),
            Stmt::Return(vec![Expr::call(Expr::name("fact"), vec![num(5.0)])]),
        ])
        .await;
        assert_eq!(out.ok(), Some(vec![Value::Number(120.0)]));
    }

    #[tokio::test]
    async fn test_unbounded_recursion_overflows() {
        let config = RuntimeConfig {
            max_call_depth: 20,
            ..RuntimeConfig::default()
        };
        let interp = Interpreter::with_output(config, Rc::new(|_: &str| {}));
        let block = Block::new(vec![
            Stmt::local_function(
                "f",
                FunctionBody::new(&[], Block::new(vec![Stmt::Return(vec![Expr::call(Expr::name("f"), vec![])])])),
            ),
            Stmt::Call(Expr::call(Expr::name("f"), vec![])),
        ]);
        let err = interp.exec(&block).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::StackOverflow);
    }

    #[tokio::test]
    async fn test_varargs_and_select_last_expansion() {
        // local function f(...) return ... end
        // return f(1, 2, 3), f(4, 5)
        let f = FunctionBody::variadic(&[], Block::new(vec![Stmt::Return(vec![Expr::Vararg])]));
        let out = run(vec![
            Stmt::local_function("f", f),
            Stmt::Return(vec![
                Expr::call(Expr::name("f"), vec![num(1.0), num(2.0), num(3.0)]),
                Expr::call(Expr::name("f"), vec![num(4.0), num(5.0)]),
            ]),
        ])
        .await;
        assert_eq!(
            out.ok(),
            Some(vec![Value::Number(1.0), Value::Number(4.0), Value::Number(5.0)])
        );
    }

    #[tokio::test]
    async fn test_paren_truncates() {
        let f = FunctionBody::variadic(&[], Block::new(vec![Stmt::Return(vec![Expr::Vararg])]));
        let out = run(vec![
            Stmt::local_function("f", f),
            Stmt::Return(vec![Expr::Paren(Box::new(Expr::call(
                Expr::name("f"),
                vec![num(1.0), num(2.0)],
            )))]),
        ])
        .await;
        assert_eq!(out.ok(), Some(vec![Value::Number(1.0)]));
    }

    #[tokio::test]
    async fn test_table_constructor_positions() {
        // local t = {10, nil, 30, x = 1, [true] = 2}; return #t, t[3], t.x, t[true]
        let t = Expr::table(vec![
            TableField::Positional(num(10.0)),
            TableField::Positional(Expr::Nil),
            TableField::Positional(num(30.0)),
            TableField::Named("x".into(), num(1.0)),
            TableField::Keyed(Expr::Bool(true), num(2.0)),
        ]);
        let out = run(vec![
            Stmt::local("t", t),
            Stmt::Return(vec![
                Expr::unary(UnOp::Len, Expr::name("t")),
                Expr::index(Expr::name("t"), num(3.0)),
                Expr::field(Expr::name("t"), "x"),
                Expr::index(Expr::name("t"), Expr::Bool(true)),
            ]),
        ])
        .await;
        assert_eq!(
            out.ok(),
            Some(vec![
                Value::Number(1.0),
                Value::Number(30.0),
                Value::Number(1.0),
                Value::Number(2.0)
            ])
        );
    }

    #[tokio::test]
    async fn test_method_declaration_and_call() {
        // obj = {n = 41}; function obj:inc(by) self.n = self.n + by end
        // obj:inc(1); return obj.n
        let out = run(vec![
            Stmt::assign(Expr::name("obj"), Expr::table(vec![TableField::Named("n".into(), num(41.0))])),
            Stmt::Function {
                path: vec!["obj".into()],
                method: Some("inc".into()),
                body: Rc::new(FunctionBody::new(
                    &["by"],
                    Block::new(vec![Stmt::assign(
                        Expr::field(Expr::name("self"), "n"),
                        Expr::binary(BinOp::Add, Expr::field(Expr::name("self"), "n"), Expr::name("by")),
                    )]),
                )),
            },
            Stmt::Call(Expr::method_call(Expr::name("obj"), "inc", vec![num(1.0)])),
            Stmt::Return(vec![Expr::field(Expr::name("obj"), "n")]),
        ])
        .await;
        assert_eq!(out.ok(), Some(vec![Value::Number(42.0)]));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_right_side() {
        // return false and undefined_fn(), 1 or undefined_fn()
        let boom = Expr::call(Expr::name("undefined_fn"), vec![]);
        let out = run(vec![Stmt::Return(vec![
            Expr::binary(BinOp::And, Expr::Bool(false), boom.clone()),
            Expr::binary(BinOp::Or, num(1.0), boom),
        ])])
        .await;
        assert_eq!(out.ok(), Some(vec![Value::Boolean(false), Value::Number(1.0)]));
    }

    #[tokio::test]
    async fn test_index_nil_local_message() {
        let err = run(vec![
            Stmt::local("t", Expr::Nil),
            Stmt::Return(vec![Expr::field(Expr::name("t"), "x")]),
        ])
        .await
        .unwrap_err();
        assert_eq!(err.message, "attempt to index a nil value (local 't')");
    }

    #[tokio::test]
    async fn test_call_nil_global_suggests_name() {
        let err = run(vec![Stmt::Call(Expr::call(Expr::name("prnt"), vec![]))])
            .await
            .unwrap_err();
        assert_eq!(err.message, "attempt to call a nil value (global 'prnt')");
        assert_eq!(err.hint.as_deref(), Some("did you mean `print`?"));
    }

    #[tokio::test]
    async fn test_break_outside_loop_is_error() {
        let err = run(vec![Stmt::Break]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Raised);
        assert_eq!(err.message, "break outside a loop");
    }

    #[tokio::test]
    async fn test_host_can_call_guest_function() {
        let interp = quiet();
        let block = Block::new(vec![Stmt::function(
            "add",
            FunctionBody::new(
                &["a", "b"],
                Block::new(vec![Stmt::Return(vec![Expr::binary(
                    BinOp::Add,
                    Expr::name("a"),
                    Expr::name("b"),
                )])]),
            ),
        )]);
        interp.exec(&block).await.unwrap();
        let add = interp.get_global("add");
        let out = interp.call(&add, vec![Value::Number(2.0), Value::Number(3.0)]).await;
        assert_eq!(out.map(MultiValue::unwrap).ok(), Some(Value::Number(5.0)));
    }
}
