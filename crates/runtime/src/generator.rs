//! Code generation for network procedures
//!
//! Walks a resolved network in topological order, collects per-node
//! fragments (with their effect pipelines applied), and resolves socket
//! placeholders through the binding table. Unlinked inputs become
//! prologue loads of their socket's value snapshot; linked inputs share
//! the producer's bound variable, so a producer's statements always
//! precede the first use of its variable.

use std::collections::BTreeSet;

use tracing::debug;
use trellis_foundation::SocketTypeRegistry;
use trellis_graph::effects::apply_effects;
use trellis_graph::{sorted_nodes, CompileError, Network, Node, NodeKind, StructuralError};
use trellis_ir::rewrite::map_ports;
use trellis_ir::{BindingTable, Direction, Expr, PortRef, Procedure, Stmt, ENTRY_SYMBOL};

/// How node statements are assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Default,
    /// Wrap each node's statements with timing probes feeding the
    /// session's measurement board
    Measured,
}

/// Options for one generation pass
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub mode: ExecutionMode,
}

/// Emit one node's statements: fragment, effect pipeline, optional
/// timing wrapper. Ports are resolved later in one network-wide pass.
pub(crate) fn emit_node(
    node: &Node,
    required: &BTreeSet<usize>,
    network: &Network,
    vars: &mut BindingTable,
    types: &SocketTypeRegistry,
    options: &CompileOptions,
    out: &mut Vec<Stmt>,
) -> Result<(), CompileError> {
    let fragment = node.code_for(required)?;
    // Required = linked downstream or externally consumed; effects use
    // the same notion of "consumed" for output-list creation
    let consumed = |index: usize| required.contains(&index);
    let fragment = apply_effects(node, &consumed, required, fragment, vars, types)?;
    if fragment.is_empty() {
        return Ok(());
    }
    match options.mode {
        ExecutionMode::Default => out.extend(fragment.stmts),
        ExecutionMode::Measured => out.push(Stmt::Measured {
            node: node.id.clone(),
            body: fragment.stmts,
        }),
    }
    Ok(())
}

/// Resolve every remaining socket placeholder to a bound variable.
/// Output ports bind on first touch; linked inputs share their
/// producer's variable; unlinked inputs bind fresh and load their
/// socket's value snapshot in the prologue.
pub(crate) fn resolve_ports(
    stmts: &mut [Stmt],
    network: &Network,
    vars: &mut BindingTable,
    prologue: &mut Vec<Stmt>,
) -> Result<(), CompileError> {
    map_ports(stmts, &mut |port: &PortRef| {
        if let Some(var) = vars.port(port) {
            return Ok(Some(var));
        }
        let owner = network.node(&port.node)?;
        match port.direction {
            Direction::Out => {
                let socket = owner.outputs.get(port.index).ok_or_else(|| {
                    StructuralError::InvalidSocketIndex {
                        node: port.node.clone(),
                        direction: "output",
                        index: port.index,
                    }
                })?;
                let hint = socket.name.clone();
                Ok(Some(vars.bind_port(port.clone(), &hint)))
            }
            Direction::In => {
                if let Some((producer, output)) = network.producer_of(&port.node, port.index) {
                    let socket = &network.node(producer)?.outputs[*output];
                    let hint = socket.name.clone();
                    Ok(Some(
                        vars.bind_port(PortRef::output(producer.clone(), *output), &hint),
                    ))
                } else {
                    let socket = owner.inputs.get(port.index).ok_or_else(|| {
                        StructuralError::InvalidSocketIndex {
                            node: port.node.clone(),
                            direction: "input",
                            index: port.index,
                        }
                    })?;
                    let value = socket.value.clone();
                    let hint = socket.name.clone();
                    let var = vars.bind_port(port.clone(), &hint);
                    prologue.push(Stmt::assign_var(var, Expr::Literal(value)));
                    Ok(Some(var))
                }
            }
        }
    })
}

/// Generate the procedure for a main network: every node in resolved
/// order, each computing only the outputs consumed downstream, with the
/// externally consumed outputs returned in declaration order.
pub fn generate_network_procedure(
    network: &Network,
    types: &SocketTypeRegistry,
    options: &CompileOptions,
) -> Result<Procedure, CompileError> {
    let order = sorted_nodes(network)?;
    let required = network.required_outputs();

    let mut vars = BindingTable::new();
    let mut body = Vec::new();

    for id in &order {
        let node = network.node(id)?;
        match &node.kind {
            NodeKind::LoopInput(_)
            | NodeKind::GeneratorOutput(_)
            | NodeKind::ReassignParameter(_)
            | NodeKind::Break => {
                return Err(CompileError::MisplacedNode {
                    node: id.clone(),
                    context: "main",
                });
            }
            NodeKind::Script(_) => {
                return Err(CompileError::MisplacedNode {
                    node: id.clone(),
                    context: "main",
                });
            }
            _ => {}
        }
        let empty = BTreeSet::new();
        let node_required = required.get(id).unwrap_or(&empty);
        emit_node(node, node_required, network, &mut vars, types, options, &mut body)?;
    }

    for viewer in network.viewer_nodes() {
        body.push(Stmt::ViewerFlush {
            node: viewer.id.clone(),
        });
    }

    let returns: Vec<Expr> = network
        .external_outputs()
        .iter()
        .map(|(node, output)| Expr::Port(PortRef::output(node.clone(), *output)))
        .collect();
    if !returns.is_empty() {
        body.push(Stmt::Return(returns));
    }

    let mut prologue = Vec::new();
    resolve_ports(&mut body, network, &mut vars, &mut prologue)?;

    debug!(network = %network.id, nodes = order.len(), "network procedure generated");

    let var_count = vars.var_count();
    let mut full_body = prologue;
    full_body.extend(body);
    Ok(Procedure {
        name: format!("network: {:?}", network.name),
        entry: ENTRY_SYMBOL.to_string(),
        params: Vec::new(),
        body: full_body,
        var_count,
        var_names: vars.into_names(),
    })
}
