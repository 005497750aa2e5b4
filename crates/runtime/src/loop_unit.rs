//! Loop procedure generation
//!
//! Compiles an entire loop network into one procedure. The loop-input
//! node's iteration mode selects the header: an explicit count plus
//! input-marked parameters, or one list per iterator socket plus
//! input-marked parameters. Generator, break, and reassign sub-nodes
//! are sentinels: the unit emits their behavior at fixed points of the
//! body instead of their topological position.

use tracing::debug;
use trellis_foundation::{NodeId, SocketTypeRegistry};
use trellis_graph::{
    sorted_nodes, CompileError, LoopInputSpec, LoopMode, Network, Node, NodeKind,
};
use trellis_ir::{
    BindingTable, Expr, IterSource, LoopBinding, LoopStmt, PortRef, Procedure, Stmt, Target,
    VarId, ENTRY_SYMBOL,
};

use crate::generator::{emit_node, resolve_ports, CompileOptions};

fn output_hint<'a>(node: &'a Node, index: usize) -> Result<&'a str, CompileError> {
    node.outputs
        .get(index)
        .map(|socket| socket.name.as_str())
        .ok_or(CompileError::MalformedLoop(
            "loop input socket index out of range",
        ))
}

/// Generate the procedure for a loop network
pub fn generate_loop_procedure(
    network: &Network,
    types: &SocketTypeRegistry,
    options: &CompileOptions,
) -> Result<Procedure, CompileError> {
    let input_node = network.loop_input()?;
    let NodeKind::LoopInput(spec) = &input_node.kind else {
        // loop_input() only returns loop-input nodes
        return Err(CompileError::MalformedLoop("missing loop input"));
    };
    if spec.mode == LoopMode::Count && !spec.iterators.is_empty() {
        return Err(CompileError::MalformedLoop(
            "count-driven loops have no iterator sockets",
        ));
    }

    let order = sorted_nodes(network)?;
    let required = network.required_outputs();
    let input_id = input_node.id.clone();

    let mut vars = BindingTable::new();
    let mut params: Vec<VarId> = Vec::new();

    // Header: iteration count or iterator lists, then input-marked
    // parameters
    let mut iterator_lists: Vec<VarId> = Vec::new();
    match spec.mode {
        LoopMode::Count => {
            output_hint(input_node, spec.iterations_output)?;
            let iterations = vars.bind_port(
                PortRef::output(input_id.clone(), spec.iterations_output),
                "loop_iterations",
            );
            params.push(iterations);
        }
        LoopMode::Iterator => {
            for (index, _) in spec.iterators.iter().enumerate() {
                let list = vars.fresh(&format!("loop_iterator_{index}"));
                iterator_lists.push(list);
                params.push(list);
            }
        }
    }
    for (index, parameter) in spec.parameters.iter().enumerate() {
        if parameter.use_as_input {
            output_hint(input_node, parameter.output)?;
            let var = vars.bind_port(
                PortRef::output(input_id.clone(), parameter.output),
                &format!("loop_parameter_{index}"),
            );
            params.push(var);
        }
    }

    let mut body: Vec<Stmt> = Vec::new();

    // Generator accumulators, pre-initialized to their list defaults
    for (index, generator_id) in spec.generator_nodes.iter().enumerate() {
        let generator = network.node(generator_id)?;
        let NodeKind::GeneratorOutput(generator_spec) = &generator.kind else {
            return Err(CompileError::MalformedLoop(
                "generator list references a non-generator node",
            ));
        };
        let accumulator =
            vars.bind_node(generator_id.clone(), &format!("loop_generator_output_{index}"));
        body.push(Stmt::assign_var(
            accumulator,
            Expr::DefaultOf(generator_spec.list_type),
        ));
    }

    // Parameters not provided by the caller start from their socket
    // value snapshot
    for (index, parameter) in spec.parameters.iter().enumerate() {
        if !parameter.use_as_input {
            let socket = input_node.outputs.get(parameter.output).ok_or(
                CompileError::MalformedLoop("loop input socket index out of range"),
            )?;
            let var = vars.bind_port(
                PortRef::output(input_id.clone(), parameter.output),
                &format!("loop_parameter_{index}"),
            );
            body.push(Stmt::assign_var(var, Expr::Literal(socket.value.clone())));
        }
    }

    // Loop construction
    output_hint(input_node, spec.index_output)?;
    let index_var = vars.bind_port(
        PortRef::output(input_id.clone(), spec.index_output),
        "current_loop_index",
    );

    let (amount, bindings) = match spec.mode {
        LoopMode::Count => {
            let iterations = vars
                .port(&PortRef::output(input_id.clone(), spec.iterations_output))
                .ok_or(CompileError::MalformedLoop("iteration count unbound"))?;
            (Some(Expr::Var(iterations)), Vec::new())
        }
        LoopMode::Iterator => {
            let mut bindings = Vec::with_capacity(spec.iterators.len());
            for (index, iterator) in spec.iterators.iter().enumerate() {
                output_hint(input_node, iterator.output)?;
                let element = vars.bind_port(
                    PortRef::output(input_id.clone(), iterator.output),
                    &format!("loop_iterator_element_{index}"),
                );
                bindings.push(LoopBinding {
                    var: element,
                    source: IterSource::Direct(Expr::Var(iterator_lists[index])),
                });
            }
            // The count is only materialized when something consumes it
            let iterations_required = required
                .get(&input_id)
                .map(|set| set.contains(&spec.iterations_output))
                .unwrap_or(false);
            if iterations_required {
                let iterations = vars.bind_port(
                    PortRef::output(input_id.clone(), spec.iterations_output),
                    "loop_iterations",
                );
                body.push(Stmt::assign_var(
                    iterations,
                    Expr::MinLength(iterator_lists.iter().map(|list| Expr::Var(*list)).collect()),
                ));
            }
            (None, bindings)
        }
    };

    // Loop body: nodes in resolved order, sentinel kinds skipped
    let mut loop_body: Vec<Stmt> = Vec::new();
    for id in &order {
        let node = network.node(id)?;
        if node.kind.is_loop_sentinel() {
            continue;
        }
        if let NodeKind::Script(_) = node.kind {
            return Err(CompileError::MisplacedNode {
                node: id.clone(),
                context: "loop",
            });
        }
        let node_required = required.get(id).cloned().unwrap_or_default();
        emit_node(
            node,
            &node_required,
            network,
            &mut vars,
            types,
            options,
            &mut loop_body,
        )?;
    }

    // Break conditions, in declared order
    for break_id in &spec.break_nodes {
        let break_node = network.node(break_id)?;
        if !matches!(break_node.kind, NodeKind::Break) {
            return Err(CompileError::MalformedLoop(
                "break list references a non-break node",
            ));
        }
        loop_body.push(Stmt::BreakIfNot(Expr::Port(PortRef::input(
            break_id.clone(),
            0,
        ))));
    }

    // Generator accumulation, guarded by each generator's condition.
    // Unlinked copyable data sockets are copied so iterations cannot
    // alias each other's elements.
    for generator_id in &spec.generator_nodes {
        let generator = network.node(generator_id)?;
        let NodeKind::GeneratorOutput(generator_spec) = &generator.kind else {
            continue;
        };
        let accumulator = vars
            .node_var(generator_id)
            .ok_or(CompileError::MalformedLoop("generator accumulator unbound"))?;
        let data_socket = generator.inputs.get(generator_spec.data_input).ok_or(
            CompileError::MalformedLoop("generator data socket out of range"),
        )?;
        let data = Expr::Port(PortRef::input(
            generator_id.clone(),
            generator_spec.data_input,
        ));
        let value = if network
            .producer_of(generator_id, generator_spec.data_input)
            .is_none()
            && types.copyable(&data_socket.ty)
        {
            Expr::Copy(Box::new(data))
        } else {
            data
        };
        loop_body.push(Stmt::If {
            cond: Expr::Port(PortRef::input(
                generator_id.clone(),
                generator_spec.condition_input,
            )),
            then_body: vec![Stmt::Append {
                list: Target::Var(accumulator),
                value,
            }],
            else_body: Vec::new(),
            line: None,
        });
    }

    // Parameter reassignment, condition-guarded, copy-protected
    for reassign_id in &spec.reassign_nodes {
        let reassign = network.node(reassign_id)?;
        let NodeKind::ReassignParameter(reassign_spec) = &reassign.kind else {
            return Err(CompileError::MalformedLoop(
                "reassign list references a non-reassign node",
            ));
        };
        let parameter = vars
            .port(&PortRef::output(
                input_id.clone(),
                reassign_spec.parameter_output,
            ))
            .ok_or(CompileError::MalformedLoop(
                "reassign references an unbound parameter",
            ))?;
        let data_socket = reassign.inputs.get(reassign_spec.data_input).ok_or(
            CompileError::MalformedLoop("reassign data socket out of range"),
        )?;
        let data = Expr::Port(PortRef::input(
            reassign_id.clone(),
            reassign_spec.data_input,
        ));
        let value = if network
            .producer_of(reassign_id, reassign_spec.data_input)
            .is_none()
            && types.copyable(&data_socket.ty)
        {
            Expr::Copy(Box::new(data))
        } else {
            data
        };
        let assign = Stmt::Assign {
            target: Target::Var(parameter),
            value,
            line: None,
        };
        match reassign_spec.condition_input {
            Some(condition) => loop_body.push(Stmt::If {
                cond: Expr::Port(PortRef::input(reassign_id.clone(), condition)),
                then_body: vec![assign],
                else_body: Vec::new(),
                line: None,
            }),
            None => loop_body.push(assign),
        }
    }

    body.push(Stmt::Loop(LoopStmt {
        index: Some(index_var),
        amount,
        bindings,
        body: loop_body,
    }));

    // Viewer nodes publish once after the loop
    for viewer in network.viewer_nodes() {
        body.push(Stmt::ViewerFlush {
            node: viewer.id.clone(),
        });
    }

    body.push(Stmt::Return(return_values(
        spec,
        &input_id,
        &iterator_lists,
        &vars,
    )?));

    let mut prologue = Vec::new();
    resolve_ports(&mut body, network, &mut vars, &mut prologue)?;

    debug!(network = %network.id, mode = ?spec.mode, nodes = order.len(), "loop procedure generated");

    let var_count = vars.var_count();
    let mut full_body = prologue;
    full_body.extend(body);
    Ok(Procedure {
        name: format!("group: {:?}", network.name),
        entry: ENTRY_SYMBOL.to_string(),
        params,
        body: full_body,
        var_count,
        var_names: vars.into_names(),
    })
}

/// The returned tuple, in fixed order: iterator lists marked
/// use-as-output, generator accumulators, parameters marked
/// use-as-output.
fn return_values(
    spec: &LoopInputSpec,
    input_id: &NodeId,
    iterator_lists: &[VarId],
    vars: &BindingTable,
) -> Result<Vec<Expr>, CompileError> {
    let mut values = Vec::new();
    for (index, iterator) in spec.iterators.iter().enumerate() {
        if iterator.use_as_output {
            values.push(Expr::Var(iterator_lists[index]));
        }
    }
    for generator_id in &spec.generator_nodes {
        let accumulator = vars
            .node_var(generator_id)
            .ok_or(CompileError::MalformedLoop("generator accumulator unbound"))?;
        values.push(Expr::Var(accumulator));
    }
    for parameter in &spec.parameters {
        if parameter.use_as_output {
            let var = vars
                .port(&PortRef::output(input_id.clone(), parameter.output))
                .ok_or(CompileError::MalformedLoop("parameter unbound"))?;
            values.push(Expr::Var(var));
        }
    }
    Ok(values)
}
