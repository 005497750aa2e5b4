//! Trellis IR
//!
//! The typed intermediate representation generated procedures are made
//! of: expressions, statements, loop descriptors, fragments, and the
//! variable binding table. Node fragments reference sockets through
//! [`expr::PortRef`] placeholders; the code generator rewrites those to
//! bound variables before a procedure is lowered to closures.

pub mod binding;
pub mod expr;
pub mod rewrite;
pub mod stmt;

pub use binding::BindingTable;
pub use expr::{BinaryOp, Direction, Expr, PortRef, UnaryOp, VarId};
pub use stmt::{
    ErrorFilter, Fragment, GuardReport, IterSource, LoopBinding, LoopStmt, Procedure, Stmt,
    Target,
};

/// Fixed entry-point symbol of every compiled procedure
pub const ENTRY_SYMBOL: &str = "main";
