//! Vectorized broadcasting: amount selection, cycling, defaults.

use trellis_foundation::{DataType, SocketType, Value};
use trellis_graph::{
    CompileError, EffectSpec, Network, NetworkKind, Node, NodeKind, OrdinarySpec, OutputSpec,
    Program, VectorizeSpec, VectorizedInput, VectorizedOutput,
};
use trellis_ir::{Expr, PortRef};
use trellis_tests::*;

fn broadcast_harness(a: Value, b: Value, a_extensible: bool, b_extensible: bool) -> TestHarness {
    let mut network = Network::new("main", "main", NetworkKind::Main);
    network
        .add_node(literal_node("a", SocketType::List(DataType::Float), a))
        .unwrap();
    network
        .add_node(literal_node("b", SocketType::List(DataType::Float), b))
        .unwrap();
    network
        .add_node(vectorized_add_node("add", a_extensible, b_extensible))
        .unwrap();
    network.link(("a", 0), ("add", 0)).unwrap();
    network.link(("b", 0), ("add", 1)).unwrap();
    network.mark_external_output("add", 0).unwrap();
    let mut program = Program::new();
    program.add_network(network);
    TestHarness::new(program)
}

#[test]
fn two_fixed_inputs_use_the_shortest_length() {
    // lengths 4 and 7, both non-extensible: amount = 4
    let mut harness = broadcast_harness(
        float_list(&[1.0, 2.0, 3.0, 4.0]),
        float_list(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0]),
        false,
        false,
    );
    let result = harness.run_network("main");
    assert_eq!(result, vec![float_list(&[11.0, 22.0, 33.0, 44.0])]);
}

#[test]
fn all_extensible_inputs_use_the_longest_length() {
    // lengths 4 and 7, both extensible: amount = 7, the short list cycles
    let mut harness = broadcast_harness(
        float_list(&[1.0, 2.0, 3.0, 4.0]),
        float_list(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0]),
        true,
        true,
    );
    let result = harness.run_network("main");
    assert_eq!(
        result,
        vec![float_list(&[11.0, 22.0, 33.0, 44.0, 51.0, 62.0, 73.0])]
    );
}

#[test]
fn single_fixed_input_dictates_the_exact_length() {
    // one non-extensible input of length 5: amount = 5
    let mut harness = broadcast_harness(
        float_list(&[0.0, 0.0, 0.0, 0.0, 0.0]),
        float_list(&[1.0, 2.0, 3.0]),
        false,
        true,
    );
    let result = harness.run_network("main");
    // [1,2,3] cycles to the effective sequence [1,2,3,1,2]
    assert_eq!(result, vec![float_list(&[1.0, 2.0, 3.0, 1.0, 2.0])]);
}

#[test]
fn empty_extensible_input_repeats_the_type_default() {
    let mut harness = broadcast_harness(
        float_list(&[5.0, 6.0]),
        float_list(&[]),
        false,
        true,
    );
    let result = harness.run_network("main");
    assert_eq!(result, vec![float_list(&[5.0, 6.0])]);
}

#[test]
fn explicit_default_element_is_corrected_and_used() {
    // An Integer default on a Float socket is corrected to 7.0 before
    // it is embedded
    let node = Node::new(
        "add",
        "add",
        NodeKind::Ordinary(OrdinarySpec {
            prelude: Vec::new(),
            outputs: vec![OutputSpec {
                index: 0,
                value: Expr::call(
                    "math.add",
                    vec![
                        Expr::Port(PortRef::input("add", 0)),
                        Expr::Port(PortRef::input("add", 1)),
                    ],
                ),
            }],
            effects: vec![EffectSpec::Vectorize(VectorizeSpec {
                inputs: vec![
                    VectorizedInput {
                        index: 0,
                        extensible: false,
                        default: None,
                    },
                    VectorizedInput {
                        index: 1,
                        extensible: true,
                        default: Some(Value::Integer(7)),
                    },
                ],
                outputs: vec![VectorizedOutput {
                    index: 0,
                    aliased_to_input: None,
                }],
            })],
        }),
    )
    .with_input(list_socket("add.a", "a", DataType::Float))
    .with_input(list_socket("add.b", "b", DataType::Float))
    .with_output(list_socket("add.result", "result", DataType::Float));

    let mut network = Network::new("main", "main", NetworkKind::Main);
    network
        .add_node(literal_node(
            "a",
            SocketType::List(DataType::Float),
            float_list(&[1.0, 2.0]),
        ))
        .unwrap();
    network
        .add_node(literal_node(
            "b",
            SocketType::List(DataType::Float),
            float_list(&[]),
        ))
        .unwrap();
    network.add_node(node).unwrap();
    network.link(("a", 0), ("add", 0)).unwrap();
    network.link(("b", 0), ("add", 1)).unwrap();
    network.mark_external_output("add", 0).unwrap();
    let mut program = Program::new();
    program.add_network(network);

    let mut harness = TestHarness::new(program);
    let result = harness.run_network("main");
    assert_eq!(result, vec![float_list(&[8.0, 9.0])]);
}

#[test]
fn object_default_element_fails_compilation() {
    let node = Node::new(
        "pass",
        "pass",
        NodeKind::Ordinary(OrdinarySpec {
            prelude: Vec::new(),
            outputs: vec![OutputSpec {
                index: 0,
                value: Expr::Port(PortRef::input("pass", 0)),
            }],
            effects: vec![EffectSpec::Vectorize(VectorizeSpec {
                inputs: vec![
                    VectorizedInput {
                        index: 0,
                        extensible: true,
                        default: Some(Value::Object("Cube".to_string())),
                    },
                    VectorizedInput {
                        index: 1,
                        extensible: true,
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
    .with_input(list_socket("pass.a", "a", DataType::Object))
    .with_input(list_socket("pass.b", "b", DataType::Float))
    .with_output(list_socket("pass.out", "out", DataType::Object));

    let mut network = Network::new("main", "main", NetworkKind::Main);
    network.add_node(node).unwrap();
    network.mark_external_output("pass", 0).unwrap();
    let mut program = Program::new();
    program.add_network(network);

    let harness = TestHarness::new(program);
    let error = trellis_runtime::NetworkExecutionUnit::new(
        &harness.program,
        &"main".into(),
        &harness.types,
        &harness.options,
    )
    .unwrap_err();
    assert!(matches!(error, CompileError::InvalidVectorDefault { .. }));
}

#[test]
fn single_list_input_iterates_at_its_own_length() {
    let node = Node::new(
        "pass",
        "pass",
        NodeKind::Ordinary(OrdinarySpec {
            prelude: Vec::new(),
            outputs: vec![OutputSpec {
                index: 0,
                value: Expr::call(
                    "math.multiply",
                    vec![
                        Expr::Port(PortRef::input("pass", 0)),
                        Expr::Literal(Value::Float(2.0)),
                    ],
                ),
            }],
            effects: vec![EffectSpec::Vectorize(VectorizeSpec {
                inputs: vec![VectorizedInput {
                    index: 0,
                    extensible: true,
                    default: None,
                }],
                outputs: vec![VectorizedOutput {
                    index: 0,
                    aliased_to_input: None,
                }],
            })],
        }),
    )
    .with_input(list_socket("pass.values", "values", DataType::Float))
    .with_output(list_socket("pass.doubled", "doubled", DataType::Float));

    let mut network = Network::new("main", "main", NetworkKind::Main);
    network
        .add_node(literal_node(
            "values",
            SocketType::List(DataType::Float),
            float_list(&[1.0, 2.0, 3.0]),
        ))
        .unwrap();
    network.add_node(node).unwrap();
    network.link(("values", 0), ("pass", 0)).unwrap();
    network.mark_external_output("pass", 0).unwrap();
    let mut program = Program::new();
    program.add_network(network);

    let mut harness = TestHarness::new(program);
    let result = harness.run_network("main");
    assert_eq!(result, vec![float_list(&[2.0, 4.0, 6.0])]);
}
