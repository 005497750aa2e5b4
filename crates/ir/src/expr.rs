//! IR expressions

use trellis_foundation::{NodeId, SocketType, Value};

/// A procedure-local variable, resolved to a frame slot at lowering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

/// Placeholder reference to a node socket, replaced by a bound variable
/// during code generation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub direction: Direction,
    pub index: usize,
}

impl PortRef {
    pub fn input(node: impl Into<NodeId>, index: usize) -> Self {
        Self {
            node: node.into(),
            direction: Direction::In,
            index,
        }
    }

    pub fn output(node: impl Into<NodeId>, index: usize) -> Self {
        Self {
            node: node.into(),
            direction: Direction::Out,
            index,
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
    /// Logical NOT
    Not,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// IR expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value embedded at generation time
    Literal(Value),
    /// A bound variable
    Var(VarId),
    /// A socket placeholder (invalid after binding rewrite)
    Port(PortRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Dispatch through the operation registry
    Call {
        op: String,
        args: Vec<Expr>,
    },
    /// A list built from element expressions
    ListOf(Vec<Expr>),
    /// Source-independent copy of the operand
    Copy(Box<Expr>),
    /// Length of a list operand
    Length(Box<Expr>),
    /// Largest length among list operands
    MaxLength(Vec<Expr>),
    /// Smallest length among list operands
    MinLength(Vec<Expr>),
    /// The registry default for a socket type
    DefaultOf(SocketType),
}

impl Expr {
    pub fn literal(value: Value) -> Self {
        Expr::Literal(value)
    }

    pub fn var(id: VarId) -> Self {
        Expr::Var(id)
    }

    pub fn call(op: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            op: op.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}
