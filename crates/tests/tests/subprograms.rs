//! Subprogram linking: nested calls across compiled units, stale
//! reference handling, and unlinked-call failures.

use trellis_foundation::{DataType, SocketType};
use trellis_graph::{
    subprogram_symbol, CallSpec, CompileError, GeneratorSpec, IteratorSocketSpec, LoopInputSpec,
    LoopMode, Network, NetworkKind, Node, NodeKind, Program, ScriptSpec, StructuralError,
};
use trellis_runtime::{Error, EvalError, NamespaceEntry, NetworkExecutionUnit};
use trellis_tests::*;

/// main → apply (loop) → double (script), linked flat into the main
/// unit's namespace
fn nested_program() -> Program {
    let mut program = Program::new();

    // script "double": y = x * 2
    let script_node = Node::new(
        "s",
        "Script",
        NodeKind::Script(ScriptSpec {
            source: "y = x * 2.0".to_string(),
        }),
    )
    .with_input(float_socket("s.x", "x"))
    .with_input(boolean_socket("s.ctrl_in", "ctrl", false))
    .with_output(float_socket("s.y", "y"))
    .with_output(boolean_socket("s.ctrl_out", "ctrl", false));
    let mut double = Network::new("double", "double", NetworkKind::Script);
    double.add_node(script_node).unwrap();
    program.add_network(double);

    // loop "apply": call "double" for each element, accumulate
    let mut apply = Network::new("apply", "apply", NetworkKind::Loop);
    apply
        .add_node(
            Node::new(
                "input",
                "Loop Input",
                NodeKind::LoopInput(LoopInputSpec {
                    mode: LoopMode::Iterator,
                    index_output: 0,
                    iterations_output: 1,
                    iterators: vec![IteratorSocketSpec {
                        output: 2,
                        use_as_output: false,
                    }],
                    parameters: vec![],
                    generator_nodes: vec!["gen".into()],
                    break_nodes: vec![],
                    reassign_nodes: vec![],
                }),
            )
            .with_output(integer_socket("input.index", "index"))
            .with_output(integer_socket("input.iterations", "iterations"))
            .with_output(float_socket("input.element", "element")),
        )
        .unwrap();
    apply
        .add_node(
            Node::new(
                "call",
                "Invoke double",
                NodeKind::SubprogramCall(CallSpec {
                    target: Some("double".into()),
                }),
            )
            .with_input(float_socket("call.x", "x"))
            .with_output(float_socket("call.y", "y")),
        )
        .unwrap();
    apply
        .add_node(
            Node::new(
                "gen",
                "Generator Output",
                NodeKind::GeneratorOutput(GeneratorSpec {
                    condition_input: 0,
                    data_input: 1,
                    list_type: SocketType::List(DataType::Float),
                }),
            )
            .with_input(boolean_socket("gen.condition", "condition", true))
            .with_input(float_socket("gen.value", "value")),
        )
        .unwrap();
    apply.link(("input", 2), ("call", 0)).unwrap();
    apply.link(("call", 0), ("gen", 1)).unwrap();
    program.add_network(apply);

    // main: one call into "apply"
    let mut main = Network::new("main", "main", NetworkKind::Main);
    main.add_node(literal_node(
        "values",
        SocketType::List(DataType::Float),
        float_list(&[1.0, 2.0, 3.0]),
    ))
    .unwrap();
    main.add_node(
        Node::new(
            "run",
            "Invoke apply",
            NodeKind::SubprogramCall(CallSpec {
                target: Some("apply".into()),
            }),
        )
        .with_input(list_socket("run.values", "values", DataType::Float))
        .with_output(list_socket("run.doubled", "doubled", DataType::Float)),
    )
    .unwrap();
    main.link(("values", 0), ("run", 0)).unwrap();
    main.mark_external_output("run", 0).unwrap();
    program.add_network(main);

    program
}

#[test]
fn nested_subprogram_calls_resolve_through_the_callers_namespace() {
    let mut harness = TestHarness::new(nested_program());
    let double_unit = harness.script_unit("double");
    let apply_unit = harness.loop_unit("apply");
    let mut main_unit = harness.network_unit("main");

    main_unit.setup();
    main_unit.insert_subprogram_functions([
        (
            subprogram_symbol(&"apply".into()),
            NamespaceEntry::Function(apply_unit.bound_entry()),
        ),
        (
            subprogram_symbol(&"double".into()),
            NamespaceEntry::Function(double_unit.bound_entry()),
        ),
    ]);

    let result = main_unit
        .execute(&[], &harness.ops, &harness.types, &mut harness.session)
        .unwrap();
    assert_eq!(result, vec![float_list(&[2.0, 4.0, 6.0])]);
}

#[test]
fn unlinked_subprogram_fails_at_execution() {
    let mut harness = TestHarness::new(nested_program());
    let mut main_unit = harness.network_unit("main");
    main_unit.setup();

    let error = main_unit
        .execute(&[], &harness.ops, &harness.types, &mut harness.session)
        .unwrap_err();
    assert!(matches!(
        error,
        Error::Eval(EvalError::UnknownFunction { .. })
    ));
}

#[test]
fn stale_references_are_reset_then_fail_structurally() {
    let mut program = Program::new();
    let mut main = Network::new("main", "main", NetworkKind::Main);
    main.add_node(
        Node::new(
            "run",
            "Invoke ghost",
            NodeKind::SubprogramCall(CallSpec {
                target: Some("ghost".into()),
            }),
        )
        .with_input(float_socket("run.x", "x"))
        .with_output(float_socket("run.y", "y")),
    )
    .unwrap();
    main.mark_external_output("run", 0).unwrap();
    program.add_network(main);

    // The pre-pass clears the dangling reference instead of failing
    assert_eq!(program.reset_stale_calls(), 1);

    // Compiling the reset call is the structural failure
    let harness = TestHarness::new(program);
    let error = NetworkExecutionUnit::new(
        &harness.program,
        &"main".into(),
        &harness.types,
        &harness.options,
    )
    .unwrap_err();
    assert!(matches!(
        error,
        CompileError::Structural(StructuralError::MissingSubprogram { .. })
    ));
}
