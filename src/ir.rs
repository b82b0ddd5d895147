//! Source IR handed to the backend by the parser.
//!
//! Expressions arrive already ordered for evaluation, so the emitter never reorders operands.

use crate::symbol::Word;

/// Compilation unit: the body of the entry function.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Unit {
    pub body: Vec<Stmt>,
}

impl Unit {
    pub fn new(body: Vec<Stmt>) -> Self {
        Unit { body }
    }
}

/// Storage location named in source.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Place {
    Var(String),
    /// The reserved scratch mailbox.
    Temp,
}

/// Signed integer operators.
///
/// `Add` and `Sub` map onto single instructions. The rest lower to counted loops:
/// division truncates towards zero, the remainder takes the sign of the dividend, and a
/// zero divisor gives a quotient of 0 and leaves the dividend as the remainder.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Expr {
    Const(Word),
    Load(Place),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Comparison as a value: 1 when it holds, 0 otherwise.
    Cmp(Box<Cond>),
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Load(Place::Var(name.to_owned()))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Mul, lhs, rhs)
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Div, lhs, rhs)
    }

    pub fn rem(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Rem, lhs, rhs)
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Cmp(Box::new(Cond::new(op, lhs, rhs)))
    }

    /// Leaves already live in a mailbox and can be used as a direct operand.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Expr::Const(_) | Expr::Load(_))
    }
}

/// Signed comparison between two values.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Cond {
    pub op: CmpOp,
    pub lhs: Expr,
    pub rhs: Expr,
}

impl Cond {
    pub fn new(op: CmpOp, lhs: Expr, rhs: Expr) -> Self {
        Cond { op, lhs, rhs }
    }
}

/// Argument to a builtin call.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Arg {
    Expr(Expr),
    /// String literal, only meaningful as an option key.
    Str(String),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Stmt {
    Assign {
        dest: Place,
        value: Expr,
    },
    Call {
        callee: String,
        args: Vec<Arg>,
    },
    If {
        cond: Cond,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Cond,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    pub fn assign(name: &str, value: Expr) -> Self {
        Stmt::Assign {
            dest: Place::Var(name.to_owned()),
            value,
        }
    }

    pub fn call(callee: &str, args: Vec<Arg>) -> Self {
        Stmt::Call {
            callee: callee.to_owned(),
            args,
        }
    }

    /// `input(&name)`
    pub fn input(name: &str) -> Self {
        Self::call("input", vec![Arg::Expr(Expr::var(name))])
    }

    /// `output(value)`
    pub fn output(value: Expr) -> Self {
        Self::call("output", vec![Arg::Expr(value)])
    }

    /// `__lmc_option__(key, value)`
    pub fn option(key: &str, value: Word) -> Self {
        Self::call(
            "__lmc_option__",
            vec![Arg::Str(key.to_owned()), Arg::Expr(Expr::Const(value))],
        )
    }
}
