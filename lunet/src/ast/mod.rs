//! Abstract Syntax Tree definitions
//!
//! The tree is produced by an external parser; the runtime only walks it.

mod expr;
mod span;

pub use expr::*;
pub use span::*;

use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A sequence of statements sharing one lexical scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// Function body: parameter names plus the block to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionBody {
    pub parameters: Vec<String>,
    pub is_vararg: bool,
    pub block: Block,
    pub span: Span,
}

impl FunctionBody {
    pub fn new(parameters: &[&str], block: Block) -> Self {
        Self {
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            is_vararg: false,
            block,
            span: Span::default(),
        }
    }

    pub fn variadic(parameters: &[&str], block: Block) -> Self {
        Self {
            is_vararg: true,
            ..Self::new(parameters, block)
        }
    }
}

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// `local a, b = e1, e2`
    Local { names: Vec<String>, exprs: Vec<Expr> },

    /// `t1, t2 = e1, e2`; targets are `Name` or `Index` expressions
    Assign { targets: Vec<Expr>, exprs: Vec<Expr> },

    /// A call evaluated for its side effects
    Call(Expr),

    /// `if c1 then b1 elseif c2 then b2 else b3 end`
    If {
        branches: Vec<(Expr, Block)>,
        otherwise: Option<Block>,
    },

    While { condition: Expr, body: Block },

    /// `repeat body until condition`; the condition sees the body's locals
    Repeat { body: Block, condition: Expr },

    NumericFor {
        var: String,
        start: Expr,
        limit: Expr,
        step: Option<Expr>,
        body: Block,
    },

    /// `for k, v in explist do body end`
    GenericFor {
        names: Vec<String>,
        exprs: Vec<Expr>,
        body: Block,
    },

    /// `function a.b.c:m(...) end`
    Function {
        path: Vec<String>,
        method: Option<String>,
        body: Rc<FunctionBody>,
    },

    LocalFunction { name: String, body: Rc<FunctionBody> },

    Return(Vec<Expr>),

    Break,

    Do(Block),
}

impl Stmt {
    pub fn local(name: &str, expr: Expr) -> Self {
        Stmt::Local {
            names: vec![name.to_string()],
            exprs: vec![expr],
        }
    }

    pub fn assign(target: Expr, expr: Expr) -> Self {
        Stmt::Assign {
            targets: vec![target],
            exprs: vec![expr],
        }
    }

    pub fn local_function(name: &str, body: FunctionBody) -> Self {
        Stmt::LocalFunction {
            name: name.to_string(),
            body: Rc::new(body),
        }
    }

    pub fn function(name: &str, body: FunctionBody) -> Self {
        Stmt::Function {
            path: vec![name.to_string()],
            method: None,
            body: Rc::new(body),
        }
    }
}
