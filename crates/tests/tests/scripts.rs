//! Script execution units: the compilation policy ladder, output
//! epilogues, and debug-mode error capture.

use trellis_foundation::{CorrectionKind, NodeId, Value};
use trellis_graph::{Network, NetworkKind, Node, NodeFlags, NodeKind, Program, ScriptSpec};
use trellis_runtime::{Error, EvalError};
use trellis_tests::*;

fn script_program(source: &str, flags: NodeFlags) -> Program {
    let node = Node::new(
        "s",
        "Script",
        NodeKind::Script(ScriptSpec {
            source: source.to_string(),
        }),
    )
    .with_flags(flags)
    .with_input(float_socket("s.a", "a"))
    .with_input(float_socket("s.b", "b"))
    .with_input(boolean_socket("s.ctrl_in", "ctrl", false))
    .with_output(float_socket("s.result", "result"))
    .with_output(boolean_socket("s.ctrl_out", "ctrl", false));

    let mut network = Network::new("script", "my script", NetworkKind::Script);
    network.add_node(node).unwrap();
    let mut program = Program::new();
    program.add_network(network);
    program
}

fn run_script(
    harness: &mut TestHarness,
    args: &[Value],
) -> Result<Vec<Value>, Error> {
    let mut unit = harness.script_unit("script");
    unit.setup();
    let ops = harness.ops.clone();
    let types = harness.types.clone();
    unit.execute(args, &ops, &types, &mut harness.session)
}

fn node_id() -> NodeId {
    "s".into()
}

#[test]
fn user_code_computes_outputs() {
    let mut harness = TestHarness::new(script_program(
        "result = a + b",
        NodeFlags::default(),
    ));
    let result = run_script(&mut harness, &[Value::Float(2.0), Value::Float(3.0)]).unwrap();
    assert_eq!(result, vec![Value::Float(5.0)]);
    assert!(harness.session.error_message(&node_id()).is_none());
}

#[test]
fn imports_expose_registry_namespaces() {
    let mut harness = TestHarness::new(script_program(
        "import math\nresult = sin(0.0) + math.cos(0.0)",
        NodeFlags::default(),
    ));
    let result = run_script(&mut harness, &[Value::Float(0.0), Value::Float(0.0)]).unwrap();
    assert_eq!(result, vec![Value::Float(1.0)]);
}

#[test]
fn star_import_is_rejected_without_embedding_user_code() {
    let mut harness = TestHarness::new(script_program(
        "import *\nresult = a + b",
        NodeFlags::default(),
    ));
    // Compilation succeeded, the unit runs, and the declared default
    // comes back instead of the user's computation
    let result = run_script(&mut harness, &[Value::Float(2.0), Value::Float(3.0)]).unwrap();
    assert_eq!(result, vec![Value::Float(0.0)]);
    assert_eq!(
        harness.session.error_message(&node_id()),
        Some("Star import is not allowed")
    );
}

#[test]
fn syntax_errors_report_the_offending_line() {
    let mut harness = TestHarness::new(script_program(
        "x = 1\nresult = (",
        NodeFlags::default(),
    ));
    let result = run_script(&mut harness, &[Value::Float(0.0), Value::Float(0.0)]).unwrap();
    assert_eq!(result, vec![Value::Float(0.0)]);
    assert_eq!(
        harness.session.error_message(&node_id()),
        Some("Line: 2 - Invalid Syntax")
    );
}

#[test]
fn missing_outputs_are_initialized_and_marked() {
    let flags = NodeFlags {
        initialize_missing_outputs: true,
        ..NodeFlags::default()
    };
    let mut harness = TestHarness::new(script_program("unused = 1", flags));
    let result = run_script(&mut harness, &[Value::Float(0.0), Value::Float(0.0)]).unwrap();
    assert_eq!(result, vec![Value::Float(0.0)]);
    let inspection = harness.session.inspection(&node_id(), 0).unwrap();
    assert_eq!(inspection.initialized, Some(false));
}

#[test]
fn bound_outputs_are_marked_initialized() {
    let flags = NodeFlags {
        initialize_missing_outputs: true,
        ..NodeFlags::default()
    };
    let mut harness = TestHarness::new(script_program("result = 1.5", flags));
    let result = run_script(&mut harness, &[Value::Float(0.0), Value::Float(0.0)]).unwrap();
    assert_eq!(result, vec![Value::Float(1.5)]);
    let inspection = harness.session.inspection(&node_id(), 0).unwrap();
    assert_eq!(inspection.initialized, Some(true));
}

#[test]
fn output_types_are_corrected_and_recorded() {
    let flags = NodeFlags {
        correct_output_types: true,
        ..NodeFlags::default()
    };
    // An integer result on a Float socket is coerced
    let mut harness = TestHarness::new(script_program("result = 2", flags));
    let result = run_script(&mut harness, &[Value::Float(0.0), Value::Float(0.0)]).unwrap();
    assert_eq!(result, vec![Value::Float(2.0)]);
    let inspection = harness.session.inspection(&node_id(), 0).unwrap();
    assert_eq!(inspection.correction, Some(CorrectionKind::Coerced));
}

#[test]
fn debug_mode_captures_runtime_errors() {
    let flags = NodeFlags {
        debug_mode: true,
        ..NodeFlags::default()
    };
    let mut harness = TestHarness::new(script_program(
        "x = 1\nresult = a / 0.0",
        flags,
    ));
    let result = run_script(&mut harness, &[Value::Float(2.0), Value::Float(0.0)]).unwrap();
    // Defaults come back, never an unhandled raise
    assert_eq!(result, vec![Value::Float(0.0)]);
    let message = harness.session.error_message(&node_id()).unwrap();
    assert!(message.starts_with("Line: 2 - "), "message: {message}");
    assert!(message.ends_with("(DivisionByZero)"), "message: {message}");
}

#[test]
fn debug_mode_off_propagates_errors_unmodified() {
    let mut harness = TestHarness::new(script_program(
        "result = a / 0.0",
        NodeFlags::default(),
    ));
    let error = run_script(&mut harness, &[Value::Float(2.0), Value::Float(0.0)]).unwrap_err();
    assert!(matches!(
        error,
        Error::Eval(EvalError::DivisionByZero { .. })
    ));
}

#[test]
fn unknown_operations_fail_like_any_runtime_error() {
    let flags = NodeFlags {
        debug_mode: true,
        ..NodeFlags::default()
    };
    let mut harness = TestHarness::new(script_program("result = warble(a)", flags));
    let result = run_script(&mut harness, &[Value::Float(1.0), Value::Float(0.0)]).unwrap();
    assert_eq!(result, vec![Value::Float(0.0)]);
    let message = harness.session.error_message(&node_id()).unwrap();
    assert!(message.ends_with("(UnknownOp)"), "message: {message}");
}

#[test]
fn conditionals_follow_the_script() {
    let source = "if a > b {\n    result = a\n} else {\n    result = b\n}";
    let mut harness = TestHarness::new(script_program(source, NodeFlags::default()));
    let result = run_script(&mut harness, &[Value::Float(4.0), Value::Float(9.0)]).unwrap();
    assert_eq!(result, vec![Value::Float(9.0)]);
}
