//! Trellis Script
//!
//! The small imperative language embedded in script nodes: assignments,
//! `if`/`else` blocks, imports of operation namespaces, and expression
//! statements. Logos provides fast token scans (the wildcard-import
//! check), Chumsky the real parser with line-accurate errors.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Literal, ScriptExpr, ScriptStmt, StmtKind, UnaryOp};
pub use lexer::contains_star_import;
pub use parser::{parse, SyntaxError};
