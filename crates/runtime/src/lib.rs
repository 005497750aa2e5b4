//! Trellis Runtime
//!
//! Turns generated IR procedures into callable closures and manages
//! their lifecycle. An execution unit owns one compiled procedure and a
//! transient namespace; the host driver runs setup/execute/finish once
//! per evaluation pass and links subprogram functions in between.
//!
//! The whole pipeline is single-threaded and caller-driven: no
//! operation suspends, and a unit's namespace is mutated only by
//! `setup`, `insert_subprogram_functions`, and `finish`. Concurrent
//! execution against one unit is a caller error; no internal locking is
//! provided.

pub mod error;
pub mod generator;
pub mod loop_unit;
pub mod lower;
pub mod namespace;
pub mod script_unit;
pub mod session;
pub mod units;

pub use error::{Error, EvalError};
pub use generator::{CompileOptions, ExecutionMode};
pub use lower::{CompiledProcedure, ExecEnv, Frame};
pub use namespace::{Namespace, NamespaceEntry, ProcedureFn};
pub use session::{EvalSession, NodeMeasurement, SocketInspection};
pub use units::{LoopExecutionUnit, NetworkExecutionUnit, ScriptExecutionUnit, UnitState};
