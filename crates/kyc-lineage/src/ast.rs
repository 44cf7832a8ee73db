//! Rule expression syntax tree.

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

/// A parsed rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Reference to an attribute in the environment.
    Ident(String),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::Unary(op, Box::new(operand))
    }

    /// Visit every node depth-first, stopping at the first error.
    pub fn try_walk<E>(&self, f: &mut impl FnMut(&Expr) -> Result<(), E>) -> Result<(), E> {
        f(self)?;
        match self {
            Self::Literal(_) | Self::Ident(_) => Ok(()),
            Self::List(items) | Self::Call(_, items) => {
                items.iter().try_for_each(|item| item.try_walk(f))
            }
            Self::Unary(_, operand) => operand.try_walk(f),
            Self::Binary(_, lhs, rhs) => {
                lhs.try_walk(f)?;
                rhs.try_walk(f)
            }
        }
    }

    /// Attribute names referenced anywhere in the expression.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Literal(_) => {}
            Self::Ident(name) => out.push(name),
            Self::List(items) | Self::Call(_, items) => {
                for item in items {
                    item.collect_identifiers(out);
                }
            }
            Self::Unary(_, operand) => operand.collect_identifiers(out),
            Self::Binary(_, lhs, rhs) => {
                lhs.collect_identifiers(out);
                rhs.collect_identifiers(out);
            }
        }
    }
}
