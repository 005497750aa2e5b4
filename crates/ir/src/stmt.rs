//! IR statements, fragments, and procedures

use trellis_foundation::{NodeId, SocketType};

use crate::expr::{Expr, PortRef, VarId};

/// Assignment target. Ports are rewritten to variables during code
/// generation; a remaining port at lowering time is a generator bug.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Var(VarId),
    Port(PortRef),
}

/// Which evaluation errors a guard absorbs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorFilter {
    /// Absorb every evaluation error
    Any,
    /// Absorb only errors of the named kind (e.g. "DivisionByZero")
    Kind(String),
}

impl ErrorFilter {
    pub fn matches(&self, kind: &str) -> bool {
        match self {
            ErrorFilter::Any => true,
            ErrorFilter::Kind(name) => name == kind,
        }
    }
}

/// Error-report directive attached to a debug guard: on a caught error,
/// the node's error message is set to
/// `"Line: {n} - {message} ({kind})"`, where `{n}` is the failing line
/// relative to `first_user_line`.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardReport {
    pub node: NodeId,
    pub first_user_line: u32,
}

/// How a loop binding draws its per-iteration element
#[derive(Debug, Clone, PartialEq)]
pub enum IterSource {
    /// Iterate the list as-is; its length bounds the loop
    Direct(Expr),
    /// Broadcast against the loop amount: a list at least amount long
    /// iterates directly, an empty list repeats the default element,
    /// and a shorter list cycles its own elements
    Broadcast { list: Expr, default: Expr },
}

/// One zipped element binding of a loop
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBinding {
    pub var: VarId,
    pub source: IterSource,
}

/// A counted or zipped loop. All element sources are paired; iteration
/// stops at the shortest source or at `amount`, whichever comes first
/// (pairing truncates, it never errors).
#[derive(Debug, Clone, PartialEq)]
pub struct LoopStmt {
    /// Variable bound to the iteration index, if consumed
    pub index: Option<VarId>,
    /// Explicit iteration bound; required when any binding broadcasts
    pub amount: Option<Expr>,
    pub bindings: Vec<LoopBinding>,
    pub body: Vec<Stmt>,
}

/// IR statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        target: Target,
        value: Expr,
        /// Source line for script-derived statements
        line: Option<u32>,
    },
    /// Assign only when the target slot is still undefined
    AssignIfUnset {
        target: Target,
        value: Expr,
    },
    /// Evaluate for effect/error, discard the result
    Eval {
        value: Expr,
        line: Option<u32>,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        line: Option<u32>,
    },
    Loop(LoopStmt),
    /// `if not cond { break }`
    BreakIfNot(Expr),
    /// Run `body`; on a matching evaluation error, optionally report it
    /// on a node and run `fallback` instead of propagating
    Guard {
        body: Vec<Stmt>,
        catch: ErrorFilter,
        report: Option<GuardReport>,
        fallback: Vec<Stmt>,
    },
    /// Push a value onto a list variable
    Append {
        list: Target,
        value: Expr,
    },
    Return(Vec<Expr>),
    /// Set a node's error message to a fixed string
    SetError {
        node: NodeId,
        message: String,
    },
    /// Clear a node's error message
    ClearError {
        node: NodeId,
    },
    /// Record whether an output variable was bound by user code
    MarkInitialized {
        node: NodeId,
        output: usize,
        var: Target,
    },
    /// Coerce a variable through a socket type's correction, recording
    /// whether the value changed
    CorrectType {
        var: Target,
        ty: SocketType,
        node: NodeId,
        output: usize,
    },
    /// Invoke a linked subprogram function from the namespace.
    /// `results` aligns with the callee's return tuple; `None` discards
    /// a position.
    CallSub {
        symbol: String,
        args: Vec<Expr>,
        results: Vec<Option<Target>>,
    },
    /// Append one display line to a viewer node's buffer
    ViewerRecord {
        node: NodeId,
        value: Expr,
    },
    /// Publish a viewer node's buffered lines
    ViewerFlush {
        node: NodeId,
    },
    /// Timing wrapper emitted in measured mode
    Measured {
        node: NodeId,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    pub fn assign(target: Target, value: Expr) -> Self {
        Stmt::Assign {
            target,
            value,
            line: None,
        }
    }

    pub fn assign_port(port: PortRef, value: Expr) -> Self {
        Stmt::assign(Target::Port(port), value)
    }

    pub fn assign_var(var: VarId, value: Expr) -> Self {
        Stmt::assign(Target::Var(var), value)
    }
}

/// An unassembled run of statements produced for one node, before and
/// during the effect pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub stmts: Vec<Stmt>,
}

impl Fragment {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

/// A complete generated procedure, ready for lowering
#[derive(Debug, Clone)]
pub struct Procedure {
    /// Human-readable diagnostic key (e.g. `script: "my script"`)
    pub name: String,
    /// Entry-point symbol bound into the namespace
    pub entry: String,
    pub params: Vec<VarId>,
    pub body: Vec<Stmt>,
    pub var_count: u32,
    /// Debug names indexed by variable id
    pub var_names: Vec<String>,
}
