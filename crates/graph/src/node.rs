//! Nodes and sockets
//!
//! Node behavior is a closed, tagged set of kind variants dispatched
//! explicitly; there is no capability probing. Each node produces an IR
//! fragment for the set of output indices actually required downstream.

use std::collections::BTreeSet;

use trellis_foundation::{NetworkId, NodeId, SocketId, SocketType, Value};
use trellis_ir::{ErrorFilter, Expr, Fragment, PortRef, Stmt, Target};

use crate::error::StructuralError;
use crate::network::subprogram_symbol;

/// A single typed input or output slot on a node
#[derive(Debug, Clone)]
pub struct Socket {
    pub identifier: SocketId,
    /// Display name; script units use it for parameter names
    pub name: String,
    pub ty: SocketType,
    /// Current value snapshot, used for unlinked inputs
    pub value: Value,
}

impl Socket {
    pub fn new(
        identifier: impl Into<SocketId>,
        name: impl Into<String>,
        ty: SocketType,
        value: Value,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            ty,
            value,
        }
    }
}

/// Capability flags
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeFlags {
    pub debug_mode: bool,
    pub initialize_missing_outputs: bool,
    pub correct_output_types: bool,
    pub is_refreshable: bool,
}

/// Expression computing one output socket
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub index: usize,
    pub value: Expr,
}

/// Declared broadcast policy for one vector input
#[derive(Debug, Clone)]
pub struct VectorizedInput {
    /// Input socket index carrying the list
    pub index: usize,
    /// Whether the list may be shorter than the iteration amount
    pub extensible: bool,
    /// Explicit default element; the socket's base-type default when
    /// absent. Must survive the representation round trip.
    pub default: Option<Value>,
}

/// Declared broadcast policy for one vector output
#[derive(Debug, Clone)]
pub struct VectorizedOutput {
    /// Output socket index carrying the list
    pub index: usize,
    /// Input whose list this output writes through in place, if any.
    /// Aliased outputs are neither pre-initialized nor appended to.
    pub aliased_to_input: Option<usize>,
}

/// Vectorized-broadcast effect declaration
#[derive(Debug, Clone, Default)]
pub struct VectorizeSpec {
    pub inputs: Vec<VectorizedInput>,
    pub outputs: Vec<VectorizedOutput>,
}

/// Exception-isolation effect declaration
#[derive(Debug, Clone)]
pub struct IsolateSpec {
    pub catch: ErrorFilter,
}

/// One transformer in a node's effect pipeline, applied in declared
/// order before assembly
#[derive(Debug, Clone)]
pub enum EffectSpec {
    Vectorize(VectorizeSpec),
    Isolate(IsolateSpec),
    Prepend(Vec<Stmt>),
}

/// An ordinary computing node
#[derive(Debug, Clone, Default)]
pub struct OrdinarySpec {
    /// Statements emitted whenever any output is required
    pub prelude: Vec<Stmt>,
    /// Per-output expressions, emitted only for required outputs
    pub outputs: Vec<OutputSpec>,
    pub effects: Vec<EffectSpec>,
}

/// A node carrying user-authored script source
#[derive(Debug, Clone)]
pub struct ScriptSpec {
    pub source: String,
}

/// Iteration mode of a loop network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Explicit iteration count
    Count,
    /// Driven by zipped iterator lists
    Iterator,
}

/// One iterator socket of a loop-input node
#[derive(Debug, Clone)]
pub struct IteratorSocketSpec {
    /// Output socket index on the loop-input node
    pub output: usize,
    pub use_as_output: bool,
}

/// One parameter socket of a loop-input node
#[derive(Debug, Clone)]
pub struct ParameterSocketSpec {
    /// Output socket index on the loop-input node
    pub output: usize,
    pub use_as_input: bool,
    pub use_as_output: bool,
}

/// The loop-input node of a loop network
#[derive(Debug, Clone)]
pub struct LoopInputSpec {
    pub mode: LoopMode,
    /// Output socket bound to the current iteration index
    pub index_output: usize,
    /// Output socket bound to the iteration count
    pub iterations_output: usize,
    pub iterators: Vec<IteratorSocketSpec>,
    pub parameters: Vec<ParameterSocketSpec>,
    /// Generator-output sub-nodes, in declared order
    pub generator_nodes: Vec<NodeId>,
    /// Break sub-nodes, in declared order
    pub break_nodes: Vec<NodeId>,
    /// Reassign-parameter sub-nodes, in declared order
    pub reassign_nodes: Vec<NodeId>,
}

/// A generator-output node accumulating a list across iterations.
/// Input 0 is the condition socket, input 1 the data socket.
#[derive(Debug, Clone)]
pub struct GeneratorSpec {
    pub condition_input: usize,
    pub data_input: usize,
    pub list_type: SocketType,
}

/// A reassign-parameter node rebinding a loop-carried parameter
#[derive(Debug, Clone)]
pub struct ReassignSpec {
    pub condition_input: Option<usize>,
    pub data_input: usize,
    /// Output socket index of the parameter on the loop-input node
    pub parameter_output: usize,
}

/// A call into a separately compiled subprogram network
#[derive(Debug, Clone)]
pub struct CallSpec {
    /// `None` after the stale-reference pre-pass reset a dangling id
    pub target: Option<NetworkId>,
}

/// Closed set of node kinds
#[derive(Debug, Clone)]
pub enum NodeKind {
    Ordinary(OrdinarySpec),
    Script(ScriptSpec),
    LoopInput(LoopInputSpec),
    GeneratorOutput(GeneratorSpec),
    ReassignParameter(ReassignSpec),
    /// Input 0 is the continue-condition socket
    Break,
    SubprogramCall(CallSpec),
    /// Input 0 is the displayed value
    LoopViewer,
}

impl NodeKind {
    /// Kinds handled by the loop unit itself rather than emitted in
    /// topological order
    pub fn is_loop_sentinel(&self) -> bool {
        matches!(
            self,
            NodeKind::LoopInput(_)
                | NodeKind::GeneratorOutput(_)
                | NodeKind::ReassignParameter(_)
                | NodeKind::Break
        )
    }
}

/// A unit of computation with typed sockets and a fragment generator
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub flags: NodeFlags,
    pub inputs: Vec<Socket>,
    pub outputs: Vec<Socket>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            flags: NodeFlags::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            kind,
        }
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_input(mut self, socket: Socket) -> Self {
        self.inputs.push(socket);
        self
    }

    pub fn with_output(mut self, socket: Socket) -> Self {
        self.outputs.push(socket);
        self
    }

    /// Declared effect pipeline (empty for non-ordinary kinds)
    pub fn effects(&self) -> &[EffectSpec] {
        match &self.kind {
            NodeKind::Ordinary(spec) => &spec.effects,
            _ => &[],
        }
    }

    /// Produce the execution fragment for the required output indices.
    /// Unused outputs are never computed. Loop sentinels and script
    /// nodes yield nothing here; their units emit them directly.
    pub fn code_for(&self, required: &BTreeSet<usize>) -> Result<Fragment, StructuralError> {
        match &self.kind {
            NodeKind::Ordinary(spec) => {
                let mut stmts = spec.prelude.clone();
                for output in &spec.outputs {
                    if required.contains(&output.index) {
                        stmts.push(Stmt::assign_port(
                            PortRef::output(self.id.clone(), output.index),
                            output.value.clone(),
                        ));
                    }
                }
                Ok(Fragment::new(stmts))
            }
            NodeKind::SubprogramCall(spec) => {
                let target = spec.target.as_ref().ok_or_else(|| {
                    StructuralError::MissingSubprogram {
                        node: self.id.clone(),
                    }
                })?;
                let args = (0..self.inputs.len())
                    .map(|index| Expr::Port(PortRef::input(self.id.clone(), index)))
                    .collect();
                let results = (0..self.outputs.len())
                    .map(|index| {
                        required
                            .contains(&index)
                            .then(|| Target::Port(PortRef::output(self.id.clone(), index)))
                    })
                    .collect();
                Ok(Fragment::new(vec![Stmt::CallSub {
                    symbol: subprogram_symbol(target),
                    args,
                    results,
                }]))
            }
            NodeKind::LoopViewer => Ok(Fragment::new(vec![Stmt::ViewerRecord {
                node: self.id.clone(),
                value: Expr::Port(PortRef::input(self.id.clone(), 0)),
            }])),
            NodeKind::Script(_)
            | NodeKind::LoopInput(_)
            | NodeKind::GeneratorOutput(_)
            | NodeKind::ReassignParameter(_)
            | NodeKind::Break => Ok(Fragment::default()),
        }
    }
}
