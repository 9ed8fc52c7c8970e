//! Expression AST nodes

use super::{FunctionBody, Span};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// `...` inside a variadic function
    Vararg,

    /// Variable reference
    Name { name: String, span: Span },

    /// Indexing: `target[key]` or `target.name`
    Index {
        target: Box<Expr>,
        key: Box<Expr>,
        span: Span,
    },

    /// Function call: `callee(args)`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },

    /// Method call: `target:method(args)`
    MethodCall {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },

    /// Anonymous function literal
    Function(Rc<FunctionBody>),

    /// Table constructor: `{ a, b, k = v, [e] = v }`
    Table { fields: Vec<TableField>, span: Span },

    /// Binary operation (including the short-circuiting `and`/`or`)
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },

    /// Unary operation
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },

    /// Parenthesized expression; truncates multiple results to one
    Paren(Box<Expr>),
}

/// A single field in a table constructor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TableField {
    /// `value`, assigned to the next sequence position
    Positional(Expr),
    /// `name = value`
    Named(String, Expr),
    /// `[key] = value`
    Keyed(Expr, Expr),
}

impl Expr {
    pub fn string(s: &str) -> Self {
        Expr::String(Rc::from(s))
    }

    pub fn name(name: &str) -> Self {
        Expr::Name {
            name: name.to_string(),
            span: Span::default(),
        }
    }

    pub fn index(target: Expr, key: Expr) -> Self {
        Expr::Index {
            target: Box::new(target),
            key: Box::new(key),
            span: Span::default(),
        }
    }

    /// `target.field`
    pub fn field(target: Expr, field: &str) -> Self {
        Expr::index(target, Expr::string(field))
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
            span: Span::default(),
        }
    }

    pub fn method_call(target: Expr, method: &str, args: Vec<Expr>) -> Self {
        Expr::MethodCall {
            target: Box::new(target),
            method: method.to_string(),
            args,
            span: Span::default(),
        }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: Span::default(),
        }
    }

    pub fn unary(op: UnOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
            span: Span::default(),
        }
    }

    pub fn table(fields: Vec<TableField>) -> Self {
        Expr::Table {
            fields,
            span: Span::default(),
        }
    }

    /// Sequence constructor `{ e1, e2, ... }`
    pub fn list(items: Vec<Expr>) -> Self {
        Expr::table(items.into_iter().map(TableField::Positional).collect())
    }

    pub fn function(body: FunctionBody) -> Self {
        Expr::Function(Rc::new(body))
    }

    /// Attach a source span; a no-op for nodes that carry none.
    pub fn at(mut self, at: Span) -> Self {
        match &mut self {
            Expr::Name { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::Table { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. } => *span = at,
            _ => {}
        }
        self
    }

    /// Calls and `...` may produce more than one value.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Expr::Call { .. } | Expr::MethodCall { .. } | Expr::Vararg)
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,

    Concat,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical
    And,
    Or,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Div => write!(f, "/"),
            BinOp::IDiv => write!(f, "//"),
            BinOp::Mod => write!(f, "%"),
            BinOp::Pow => write!(f, "^"),
            BinOp::Concat => write!(f, ".."),
            BinOp::Eq => write!(f, "=="),
            BinOp::Ne => write!(f, "~="),
            BinOp::Lt => write!(f, "<"),
            BinOp::Gt => write!(f, ">"),
            BinOp::Le => write!(f, "<="),
            BinOp::Ge => write!(f, ">="),
            BinOp::And => write!(f, "and"),
            BinOp::Or => write!(f, "or"),
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Negation (-)
    Neg,
    /// Logical not
    Not,
    /// Length (#)
    Len,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "not"),
            UnOp::Len => write!(f, "#"),
        }
    }
}
