//! Loop execution units: count and iterator modes, generators,
//! breaks, parameter reassignment, viewers.

use trellis_foundation::{DataType, SocketType, Value};
use trellis_graph::{
    GeneratorSpec, IteratorSocketSpec, LoopInputSpec, LoopMode, Network, NetworkKind, Node,
    NodeKind, ParameterSocketSpec, Program, ReassignSpec,
};
use trellis_tests::*;

fn loop_input(id: &str, spec: LoopInputSpec) -> Node {
    Node::new(id, "Loop Input", NodeKind::LoopInput(spec))
        .with_output(integer_socket(&format!("{id}.index"), "index"))
        .with_output(integer_socket(&format!("{id}.iterations"), "iterations"))
}

fn generator(id: &str, data_type: DataType) -> Node {
    let data = match data_type {
        DataType::Integer => integer_socket(&format!("{id}.value"), "value"),
        _ => float_socket(&format!("{id}.value"), "value"),
    };
    Node::new(
        id,
        "Generator Output",
        NodeKind::GeneratorOutput(GeneratorSpec {
            condition_input: 0,
            data_input: 1,
            list_type: SocketType::List(data_type),
        }),
    )
    .with_input(boolean_socket(&format!("{id}.condition"), "condition", true))
    .with_input(data)
}

#[test]
fn break_stops_generator_accumulation() {
    // Iteration count 10, break condition true while index < 3: the
    // accumulator reflects exactly 3 iterations.
    let mut network = Network::new("loop", "my loop", NetworkKind::Loop);
    network
        .add_node(loop_input(
            "input",
            LoopInputSpec {
                mode: LoopMode::Count,
                index_output: 0,
                iterations_output: 1,
                iterators: vec![],
                parameters: vec![],
                generator_nodes: vec!["gen".into()],
                break_nodes: vec!["brk".into()],
                reassign_nodes: vec![],
            },
        ))
        .unwrap();
    network.add_node(less_than_node("check", 3)).unwrap();
    network
        .add_node(
            Node::new("brk", "Break", NodeKind::Break).with_input(boolean_socket(
                "brk.continue",
                "continue",
                true,
            )),
        )
        .unwrap();
    network.add_node(generator("gen", DataType::Integer)).unwrap();
    network.link(("input", 0), ("check", 0)).unwrap();
    network.link(("check", 0), ("brk", 0)).unwrap();
    network.link(("input", 0), ("gen", 1)).unwrap();

    let mut program = Program::new();
    program.add_network(network);
    let mut harness = TestHarness::new(program);

    let mut unit = harness.loop_unit("loop");
    unit.setup();
    let result = unit
        .execute(
            &[Value::Integer(10)],
            &harness.ops,
            &harness.types,
            &mut harness.session,
        )
        .unwrap();
    assert_eq!(result, vec![integer_list(&[0, 1, 2])]);
}

#[test]
fn reassigned_parameter_carries_across_iterations() {
    // total starts at the caller's value and accumulates the index
    let mut network = Network::new("loop", "sum", NetworkKind::Loop);
    network
        .add_node(
            loop_input(
                "input",
                LoopInputSpec {
                    mode: LoopMode::Count,
                    index_output: 0,
                    iterations_output: 1,
                    iterators: vec![],
                    parameters: vec![ParameterSocketSpec {
                        output: 2,
                        use_as_input: true,
                        use_as_output: true,
                    }],
                    generator_nodes: vec![],
                    break_nodes: vec![],
                    reassign_nodes: vec!["re".into()],
                },
            )
            .with_output(float_socket("input.total", "total")),
        )
        .unwrap();
    network.add_node(binary_op_node("add", "math.add")).unwrap();
    network
        .add_node(
            Node::new(
                "re",
                "Reassign",
                NodeKind::ReassignParameter(ReassignSpec {
                    condition_input: None,
                    data_input: 0,
                    parameter_output: 2,
                }),
            )
            .with_input(float_socket("re.value", "value")),
        )
        .unwrap();
    network.link(("input", 2), ("add", 0)).unwrap();
    network.link(("input", 0), ("add", 1)).unwrap();
    network.link(("add", 0), ("re", 0)).unwrap();

    let mut program = Program::new();
    program.add_network(network);
    let mut harness = TestHarness::new(program);

    let mut unit = harness.loop_unit("loop");
    unit.setup();
    let result = unit
        .execute(
            &[Value::Integer(5), Value::Float(0.0)],
            &harness.ops,
            &harness.types,
            &mut harness.session,
        )
        .unwrap();
    // 0 + 0 + 1 + 2 + 3 + 4
    assert_eq!(result, vec![Value::Float(10.0)]);
}

fn iterator_loop() -> Program {
    let mut network = Network::new("loop", "doubler", NetworkKind::Loop);
    network
        .add_node(
            loop_input(
                "input",
                LoopInputSpec {
                    mode: LoopMode::Iterator,
                    index_output: 0,
                    iterations_output: 1,
                    iterators: vec![IteratorSocketSpec {
                        output: 2,
                        use_as_output: true,
                    }],
                    parameters: vec![],
                    generator_nodes: vec!["doubled".into(), "counts".into()],
                    break_nodes: vec![],
                    reassign_nodes: vec![],
                },
            )
            .with_output(float_socket("input.element", "element")),
        )
        .unwrap();
    let mut mul = binary_op_node("mul", "math.multiply");
    mul.inputs[1].value = Value::Float(2.0);
    network.add_node(mul).unwrap();
    network.add_node(generator("doubled", DataType::Float)).unwrap();
    network.add_node(generator("counts", DataType::Integer)).unwrap();
    network.link(("input", 2), ("mul", 0)).unwrap();
    network.link(("mul", 0), ("doubled", 1)).unwrap();
    network.link(("input", 1), ("counts", 1)).unwrap();

    let mut program = Program::new();
    program.add_network(network);
    program
}

#[test]
fn iterator_mode_zips_and_returns_in_fixed_order() {
    let mut harness = TestHarness::new(iterator_loop());
    let mut unit = harness.loop_unit("loop");
    unit.setup();
    let result = unit
        .execute(
            &[float_list(&[5.0, 6.0, 7.0])],
            &harness.ops,
            &harness.types,
            &mut harness.session,
        )
        .unwrap();
    // Iterator marked use-as-output, then generator accumulators in
    // declared order
    assert_eq!(
        result,
        vec![
            float_list(&[5.0, 6.0, 7.0]),
            float_list(&[10.0, 12.0, 14.0]),
            integer_list(&[3, 3, 3]),
        ]
    );
}

#[test]
fn empty_iterator_list_runs_zero_iterations() {
    let mut harness = TestHarness::new(iterator_loop());
    let mut unit = harness.loop_unit("loop");
    unit.setup();
    let result = unit
        .execute(
            &[float_list(&[])],
            &harness.ops,
            &harness.types,
            &mut harness.session,
        )
        .unwrap();
    assert_eq!(
        result,
        vec![float_list(&[]), float_list(&[]), integer_list(&[])]
    );
}

#[test]
fn loop_viewer_updates_once_after_the_loop() {
    let mut network = Network::new("loop", "viewed", NetworkKind::Loop);
    network
        .add_node(loop_input(
            "input",
            LoopInputSpec {
                mode: LoopMode::Count,
                index_output: 0,
                iterations_output: 1,
                iterators: vec![],
                parameters: vec![],
                generator_nodes: vec![],
                break_nodes: vec![],
                reassign_nodes: vec![],
            },
        ))
        .unwrap();
    network
        .add_node(
            Node::new("view", "Viewer", NodeKind::LoopViewer).with_input(integer_socket(
                "view.value",
                "value",
            )),
        )
        .unwrap();
    network.link(("input", 0), ("view", 0)).unwrap();

    let mut program = Program::new();
    program.add_network(network);
    let mut harness = TestHarness::new(program);

    let mut unit = harness.loop_unit("loop");
    unit.setup();
    unit.execute(
        &[Value::Integer(3)],
        &harness.ops,
        &harness.types,
        &mut harness.session,
    )
    .unwrap();

    let viewer: trellis_foundation::NodeId = "view".into();
    assert_eq!(harness.session.viewer_lines(&viewer), ["0", "1", "2"]);
    assert_eq!(harness.session.viewer_updates(&viewer), 1);
}

#[test]
fn lifecycle_cycles_reproduce_identical_loop_output() {
    let mut harness = TestHarness::new(iterator_loop());
    let mut unit = harness.loop_unit("loop");
    let input = float_list(&[1.0, 2.0]);
    let mut previous: Option<Vec<Value>> = None;
    for _ in 0..3 {
        unit.setup();
        let result = unit
            .execute(
                std::slice::from_ref(&input),
                &harness.ops,
                &harness.types,
                &mut harness.session,
            )
            .unwrap();
        if let Some(previous) = &previous {
            assert_eq!(&result, previous);
        }
        previous = Some(result);
        unit.finish();
    }
}
