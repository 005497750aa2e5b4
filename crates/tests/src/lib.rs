//! Integration test harness for trellis.
//!
//! This crate provides utilities for end-to-end testing of the full
//! pipeline: build graph → resolve → generate → lower → setup →
//! execute → verify.

use trellis_foundation::{
    DataType, NetworkId, OpRegistry, SocketType, SocketTypeRegistry, Value,
};
use trellis_graph::{
    EffectSpec, Node, NodeKind, OrdinarySpec, OutputSpec, Program, Socket, VectorizeSpec,
    VectorizedInput, VectorizedOutput,
};
use trellis_ir::{BinaryOp, Expr, PortRef};
use trellis_runtime::{
    CompileOptions, EvalSession, LoopExecutionUnit, NetworkExecutionUnit, ScriptExecutionUnit,
};

/// Test harness carrying the registries and session every execution
/// needs.
pub struct TestHarness {
    pub program: Program,
    pub ops: OpRegistry,
    pub types: SocketTypeRegistry,
    pub session: EvalSession,
    pub options: CompileOptions,
}

impl TestHarness {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            ops: OpRegistry::builtin(),
            types: SocketTypeRegistry::builtin(),
            session: EvalSession::new(),
            options: CompileOptions::default(),
        }
    }

    /// Compile a main network.
    ///
    /// # Panics
    ///
    /// Panics if generation or lowering fails.
    pub fn network_unit(&self, id: &str) -> NetworkExecutionUnit {
        NetworkExecutionUnit::new(&self.program, &NetworkId::from(id), &self.types, &self.options)
            .expect("network unit compiles")
    }

    /// Compile a script network.
    pub fn script_unit(&self, id: &str) -> ScriptExecutionUnit {
        ScriptExecutionUnit::new(&self.program, &NetworkId::from(id), &self.ops)
            .expect("script unit compiles")
    }

    /// Compile a loop network.
    pub fn loop_unit(&self, id: &str) -> LoopExecutionUnit {
        LoopExecutionUnit::new(&self.program, &NetworkId::from(id), &self.types, &self.options)
            .expect("loop unit compiles")
    }

    /// Set up a main network, run it once, and tear it down.
    pub fn run_network(&mut self, id: &str) -> Vec<Value> {
        let mut unit = self.network_unit(id);
        unit.setup();
        let result = unit
            .execute(&[], &self.ops, &self.types, &mut self.session)
            .expect("network executes");
        unit.finish();
        result
    }
}

// =============================================================================
// Socket and node builders
// =============================================================================

pub fn float_socket(id: &str, name: &str) -> Socket {
    Socket::new(id, name, SocketType::Base(DataType::Float), Value::Float(0.0))
}

pub fn integer_socket(id: &str, name: &str) -> Socket {
    Socket::new(id, name, SocketType::Base(DataType::Integer), Value::Integer(0))
}

pub fn boolean_socket(id: &str, name: &str, value: bool) -> Socket {
    Socket::new(
        id,
        name,
        SocketType::Base(DataType::Boolean),
        Value::Boolean(value),
    )
}

pub fn list_socket(id: &str, name: &str, base: DataType) -> Socket {
    Socket::new(id, name, SocketType::List(base), Value::List(Vec::new()))
}

/// A node producing one fixed value
pub fn literal_node(id: &str, ty: SocketType, value: Value) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Ordinary(OrdinarySpec {
            prelude: Vec::new(),
            outputs: vec![OutputSpec {
                index: 0,
                value: Expr::Literal(value.clone()),
            }],
            effects: Vec::new(),
        }),
    )
    .with_output(Socket::new(format!("{id}.value"), "value", ty, value))
}

/// A node applying a registry operation to two float inputs
pub fn binary_op_node(id: &str, op: &str) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Ordinary(OrdinarySpec {
            prelude: Vec::new(),
            outputs: vec![OutputSpec {
                index: 0,
                value: Expr::call(
                    op,
                    vec![
                        Expr::Port(PortRef::input(id, 0)),
                        Expr::Port(PortRef::input(id, 1)),
                    ],
                ),
            }],
            effects: Vec::new(),
        }),
    )
    .with_input(float_socket(&format!("{id}.a"), "a"))
    .with_input(float_socket(&format!("{id}.b"), "b"))
    .with_output(float_socket(&format!("{id}.result"), "result"))
}

/// A node comparing its integer input against a fixed threshold
pub fn less_than_node(id: &str, threshold: i64) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Ordinary(OrdinarySpec {
            prelude: Vec::new(),
            outputs: vec![OutputSpec {
                index: 0,
                value: Expr::binary(
                    BinaryOp::Lt,
                    Expr::Port(PortRef::input(id, 0)),
                    Expr::Literal(Value::Integer(threshold)),
                ),
            }],
            effects: Vec::new(),
        }),
    )
    .with_input(integer_socket(&format!("{id}.value"), "value"))
    .with_output(boolean_socket(&format!("{id}.smaller"), "smaller", false))
}

/// A vectorized two-list addition node. Extensibility of each input is
/// configurable; the output is a float list.
pub fn vectorized_add_node(id: &str, a_extensible: bool, b_extensible: bool) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Ordinary(OrdinarySpec {
            prelude: Vec::new(),
            outputs: vec![OutputSpec {
                index: 0,
                value: Expr::call(
                    "math.add",
                    vec![
                        Expr::Port(PortRef::input(id, 0)),
                        Expr::Port(PortRef::input(id, 1)),
                    ],
                ),
            }],
            effects: vec![EffectSpec::Vectorize(VectorizeSpec {
                inputs: vec![
                    VectorizedInput {
                        index: 0,
                        extensible: a_extensible,
                        default: None,
                    },
                    VectorizedInput {
                        index: 1,
                        extensible: b_extensible,
                        default: None,
                    },
                ],
                outputs: vec![VectorizedOutput {
                    index: 0,
                    aliased_to_input: None,
                }],
            })],
        }),
    )
    .with_input(list_socket(&format!("{id}.a"), "a", DataType::Float))
    .with_input(list_socket(&format!("{id}.b"), "b", DataType::Float))
    .with_output(list_socket(&format!("{id}.result"), "result", DataType::Float))
}

/// Build a `Value::List` of floats
pub fn float_list(values: &[f64]) -> Value {
    Value::List(values.iter().map(|v| Value::Float(*v)).collect())
}

/// Build a `Value::List` of integers
pub fn integer_list(values: &[i64]) -> Value {
    Value::List(values.iter().map(|v| Value::Integer(*v)).collect())
}
