//! Minimal python syntax tree for the handful of constructs the class and
//! migration generators emit, with a deterministic printer.

mod format;
mod imports;
mod printer;

pub use format::{format_source, prettify, LINE_LENGTH};
pub use imports::{merge_imports, sort_imports, ImportBlock};
pub use printer::{quote, unparse, unparse_at};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Plain or dotted name (`self`, `fields.Char`, `record.amount`).
    Name(String),
    Str(String),
    Bool(bool),
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<(String, Expr)>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    BinOp {
        left: Box<Expr>,
        op: &'static str,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: Box::new(Expr::Name(func.into())),
            args,
            keywords: Vec::new(),
        }
    }

    pub fn push_arg(&mut self, value: Expr) {
        if let Expr::Call { args, .. } = self {
            args.push(value);
        }
    }

    pub fn push_keyword(&mut self, name: impl Into<String>, value: Expr) {
        if let Expr::Call { keywords, .. } = self {
            keywords.push((name.into(), value));
        }
    }

    pub fn binop(left: Expr, op: &'static str, right: Expr) -> Self {
        Expr::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        target: Expr,
        value: Expr,
    },
    Expr(Expr),
    ClassDef {
        name: String,
        bases: Vec<Expr>,
        body: Vec<Stmt>,
    },
    FunctionDef {
        name: String,
        args: Vec<String>,
        decorators: Vec<Expr>,
        body: Vec<Stmt>,
    },
    For {
        targets: Vec<String>,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Pass,
    /// User supplied code, re-indented to the enclosing block.
    Verbatim(String),
    /// Explicit empty line.
    Blank,
}

impl Stmt {
    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            target: Expr::Name(target.into()),
            value,
        }
    }

    pub fn method(name: impl Into<String>, body: Vec<Stmt>) -> Self {
        Stmt::FunctionDef {
            name: name.into(),
            args: vec!["self".to_string()],
            decorators: Vec::new(),
            body,
        }
    }

    /// `for <targets> in <iter>:` over `body`.
    pub fn for_each(targets: &[&str], iter: impl Into<String>, body: Vec<Stmt>) -> Self {
        Stmt::For {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            iter: Expr::Name(iter.into()),
            body,
        }
    }

    pub(crate) fn is_definition(&self) -> bool {
        matches!(self, Stmt::ClassDef { .. } | Stmt::FunctionDef { .. })
    }
}
