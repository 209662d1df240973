//! Syntax tree produced by the parser.

use std::rc::Rc;

/// A function literal or declaration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FunctionNode {
    pub(crate) name: Option<Rc<str>>,
    pub(crate) params: Vec<Rc<str>>,
    pub(crate) body: Vec<Stmt>,
    pub(crate) start_line: u32,
    pub(crate) end_line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Var {
        declarations: Vec<(Rc<str>, Option<Expr>)>,
        line: u32,
    },
    Function(Rc<FunctionNode>),
    Return {
        value: Option<Expr>,
        line: u32,
    },
    If {
        condition: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
        line: u32,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
        line: u32,
    },
    Throw {
        value: Expr,
        line: u32,
    },
    Debugger {
        line: u32,
    },
    Block(Vec<Stmt>),
    Expression {
        expr: Expr,
        line: u32,
    },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    String(Rc<str>),
    Boolean(bool),
    Null,
    Undefined,
    This,
    Identifier(Rc<str>),
    Object(Vec<(Rc<str>, Expr)>),
    Function(Rc<FunctionNode>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        name: Rc<str>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}
