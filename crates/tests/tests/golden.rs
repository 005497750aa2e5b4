//! Golden end-to-end checks: compiled evaluation equals manual
//! unrolling, producers precede consumers, measured mode accumulates
//! timings.

use std::collections::HashSet;

use trellis_foundation::{DataType, SocketType, Value};
use trellis_graph::{Network, NetworkKind, Program};
use trellis_ir::{Expr, Stmt, Target};
use trellis_runtime::ExecutionMode;
use trellis_tests::*;

/// value → plus 2 → times value (the literal fans out to both)
fn diamond_program(value: f64, addend: f64) -> Program {
    let mut network = Network::new("main", "main", NetworkKind::Main);
    network
        .add_node(literal_node(
            "v",
            SocketType::Base(DataType::Float),
            Value::Float(value),
        ))
        .unwrap();
    let mut plus = binary_op_node("plus", "math.add");
    plus.inputs[1].value = Value::Float(addend);
    network.add_node(plus).unwrap();
    network.add_node(binary_op_node("times", "math.multiply")).unwrap();
    network.link(("v", 0), ("plus", 0)).unwrap();
    network.link(("plus", 0), ("times", 0)).unwrap();
    network.link(("v", 0), ("times", 1)).unwrap();
    network.mark_external_output("times", 0).unwrap();
    let mut program = Program::new();
    program.add_network(network);
    program
}

#[test]
fn compiled_graph_matches_manual_unrolling() {
    let (value, addend) = (3.0, 2.0);
    let mut harness = TestHarness::new(diamond_program(value, addend));
    let result = harness.run_network("main");

    // Manually unrolled evaluation of the same graph
    let expected = (value + addend) * value;
    assert_eq!(result, vec![Value::Float(expected)]);
}

fn collect_uses(expr: &Expr, out: &mut Vec<u32>) {
    match expr {
        Expr::Var(var) => out.push(var.0),
        Expr::Unary { operand, .. } | Expr::Copy(operand) | Expr::Length(operand) => {
            collect_uses(operand, out)
        }
        Expr::Binary { left, right, .. } => {
            collect_uses(left, out);
            collect_uses(right, out);
        }
        Expr::Call { args, .. } => args.iter().for_each(|a| collect_uses(a, out)),
        Expr::ListOf(items) | Expr::MaxLength(items) | Expr::MinLength(items) => {
            items.iter().for_each(|i| collect_uses(i, out))
        }
        Expr::Literal(_) | Expr::Port(_) | Expr::DefaultOf(_) => {}
    }
}

#[test]
fn producers_are_emitted_before_their_consumers() {
    let harness = TestHarness::new(diamond_program(1.0, 1.0));
    let unit = harness.network_unit("main");

    // Every variable is assigned before its first use, statement by
    // statement
    let mut defined: HashSet<u32> = HashSet::new();
    for stmt in &unit.procedure().body {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                let mut uses = Vec::new();
                collect_uses(value, &mut uses);
                for var in uses {
                    assert!(defined.contains(&var), "variable {var} used before defined");
                }
                if let Target::Var(var) = target {
                    defined.insert(var.0);
                }
            }
            Stmt::Return(values) => {
                let mut uses = Vec::new();
                values.iter().for_each(|v| collect_uses(v, &mut uses));
                for var in uses {
                    assert!(defined.contains(&var), "variable {var} returned before defined");
                }
            }
            _ => {}
        }
    }
}

#[test]
fn measured_mode_accumulates_per_node_timings() {
    let mut harness = TestHarness::new(diamond_program(3.0, 2.0));
    harness.options.mode = ExecutionMode::Measured;

    let mut unit = harness.network_unit("main");
    unit.setup();
    unit.execute(&[], &harness.ops, &harness.types, &mut harness.session)
        .unwrap();

    for node in ["v", "plus", "times"] {
        let measurement = harness
            .session
            .measurement(&node.into())
            .unwrap_or_else(|| panic!("{node} was measured"));
        assert_eq!(measurement.calls, 1);
    }
}
