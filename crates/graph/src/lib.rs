//! Trellis Graph
//!
//! The node/socket/network model, the dependency resolver, and the
//! per-node code-effect pipeline. Networks are the unit of compilation:
//! one network becomes one executable procedure.

pub mod effects;
pub mod error;
pub mod network;
pub mod node;
pub mod resolver;

pub use error::{CompileError, StructuralError};
pub use network::{subprogram_symbol, Link, Network, NetworkKind, Program};
pub use node::{
    CallSpec, EffectSpec, GeneratorSpec, IsolateSpec, IteratorSocketSpec, LoopInputSpec,
    LoopMode, Node, NodeFlags, NodeKind, OrdinarySpec, OutputSpec, ParameterSocketSpec,
    ReassignSpec, ScriptSpec, Socket, VectorizeSpec, VectorizedInput, VectorizedOutput,
};
pub use resolver::sorted_nodes;
