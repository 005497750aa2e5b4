//! Runtime errors
//!
//! [`EvalError`] is the data-level error raised inside generated
//! procedures; debug guards and isolation effects catch it by kind.
//! [`Error`] is the unit-level surface, with execute-before-setup kept
//! as a distinct programmer-error variant.

use thiserror::Error;
use trellis_foundation::OpError;

/// Runtime result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while evaluating a compiled procedure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("unknown operation: {op}")]
    UnknownOp { op: String, line: Option<u32> },

    #[error("{op} expects {expected} arguments, got {got}")]
    WrongArity {
        op: String,
        expected: usize,
        got: usize,
        line: Option<u32>,
    },

    #[error("type mismatch in {context}: expected {expected}, got {got}")]
    TypeMismatch {
        context: String,
        expected: &'static str,
        got: &'static str,
        line: Option<u32>,
    },

    #[error("{op}: division by zero")]
    DivisionByZero { op: String, line: Option<u32> },

    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String, line: Option<u32> },

    #[error("unknown function: {symbol}")]
    UnknownFunction { symbol: String, line: Option<u32> },

    #[error("{symbol} returned {got} values, expected {expected}")]
    ResultShape {
        symbol: String,
        expected: usize,
        got: usize,
        line: Option<u32>,
    },

    #[error("{name} takes {expected} arguments, got {got}")]
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
}

impl EvalError {
    /// Exception-kind name used by guard filters and error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            EvalError::UnknownOp { .. } => "UnknownOp",
            EvalError::WrongArity { .. } => "WrongArity",
            EvalError::TypeMismatch { .. } => "TypeMismatch",
            EvalError::DivisionByZero { .. } => "DivisionByZero",
            EvalError::UndefinedVariable { .. } => "UndefinedVariable",
            EvalError::UnknownFunction { .. } => "UnknownFunction",
            EvalError::ResultShape { .. } => "ResultShape",
            EvalError::ArgumentCount { .. } => "ArgumentCount",
        }
    }

    /// Source line the error occurred on, when known
    pub fn line(&self) -> Option<u32> {
        match self {
            EvalError::UnknownOp { line, .. }
            | EvalError::WrongArity { line, .. }
            | EvalError::TypeMismatch { line, .. }
            | EvalError::DivisionByZero { line, .. }
            | EvalError::UndefinedVariable { line, .. }
            | EvalError::UnknownFunction { line, .. }
            | EvalError::ResultShape { line, .. } => *line,
            EvalError::ArgumentCount { .. } => None,
        }
    }

    /// Attach a source line unless one is already recorded
    pub fn with_line(mut self, new_line: Option<u32>) -> Self {
        if new_line.is_none() {
            return self;
        }
        match &mut self {
            EvalError::UnknownOp { line, .. }
            | EvalError::WrongArity { line, .. }
            | EvalError::TypeMismatch { line, .. }
            | EvalError::DivisionByZero { line, .. }
            | EvalError::UndefinedVariable { line, .. }
            | EvalError::UnknownFunction { line, .. }
            | EvalError::ResultShape { line, .. } => {
                if line.is_none() {
                    *line = new_line;
                }
            }
            EvalError::ArgumentCount { .. } => {}
        }
        self
    }

    /// Convert a registry dispatch error, attaching the statement line
    pub fn from_op(error: OpError, line: Option<u32>) -> Self {
        match error {
            OpError::Unknown(op) => EvalError::UnknownOp { op, line },
            OpError::WrongArity { op, expected, got } => EvalError::WrongArity {
                op,
                expected,
                got,
                line,
            },
            OpError::TypeMismatch { op, expected, got } => EvalError::TypeMismatch {
                context: op,
                expected,
                got,
                line,
            },
            OpError::DivisionByZero { op } => EvalError::DivisionByZero { op, line },
        }
    }
}

/// Unit-level errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// `execute()` was called outside the Ready state. A programmer
    /// error in the host driver, distinct from data errors.
    #[error("execution unit is not set up")]
    NotSetup,

    #[error(transparent)]
    Eval(#[from] EvalError),
}
