//! Code effect pipeline
//!
//! Ordered, composable fragment transformers applied per node before
//! assembly. Every effect preserves the computed value of each socket
//! in the required set.

use std::collections::{BTreeSet, HashMap};

use trellis_foundation::{SocketType, SocketTypeRegistry};
use trellis_ir::rewrite::map_ports;
use trellis_ir::{
    BindingTable, Expr, Fragment, IterSource, LoopBinding, LoopStmt, PortRef, Stmt, Target, VarId,
};

use crate::error::{CompileError, StructuralError};
use crate::node::{EffectSpec, IsolateSpec, Node, VectorizeSpec};

/// Run a node's declared effect pipeline over its fragment, in order
pub fn apply_effects(
    node: &Node,
    output_consumed: &dyn Fn(usize) -> bool,
    required: &BTreeSet<usize>,
    fragment: Fragment,
    vars: &mut BindingTable,
    types: &SocketTypeRegistry,
) -> Result<Fragment, CompileError> {
    let effects = node.effects().to_vec();
    let mut fragment = fragment;
    for effect in effects {
        fragment = match effect {
            EffectSpec::Vectorize(spec) => {
                apply_vectorize(&spec, node, output_consumed, fragment, vars, types)?
            }
            EffectSpec::Isolate(spec) => apply_isolate(&spec, node, required, fragment),
            EffectSpec::Prepend(stmts) => {
                let mut combined = stmts;
                combined.extend(fragment.stmts);
                Fragment::new(combined)
            }
        };
    }
    Ok(fragment)
}

/// Vectorized broadcasting: wrap the scalar fragment in a loop over the
/// node's list inputs, with cycle/pad/truncate policy to a common
/// iteration amount.
fn apply_vectorize(
    spec: &VectorizeSpec,
    node: &Node,
    output_consumed: &dyn Fn(usize) -> bool,
    fragment: Fragment,
    vars: &mut BindingTable,
    types: &SocketTypeRegistry,
) -> Result<Fragment, CompileError> {
    if spec.inputs.is_empty() {
        return Ok(fragment);
    }

    // Fresh element variables replacing the vectorized ports inside the
    // scalar body
    let mut substitutions: HashMap<PortRef, VarId> = HashMap::new();
    let mut input_elements = Vec::with_capacity(spec.inputs.len());
    for input in &spec.inputs {
        let socket = node.inputs.get(input.index).ok_or_else(|| {
            StructuralError::InvalidSocketIndex {
                node: node.id.clone(),
                direction: "input",
                index: input.index,
            }
        })?;
        let port = PortRef::input(node.id.clone(), input.index);
        let element = vars.fresh(&format!("base_{}", socket.name));
        substitutions.insert(port, element);
        input_elements.push(element);
    }

    for output in &spec.outputs {
        let port = PortRef::output(node.id.clone(), output.index);
        match output.aliased_to_input {
            Some(input_index) => {
                // Output writes through the input list in place: the
                // outer list variable and the element variable are both
                // shared with the aliased input.
                let input_port = PortRef::input(node.id.clone(), input_index);
                let Some(element) = substitutions.get(&input_port).copied() else {
                    return Err(CompileError::InvalidVectorAlias {
                        node: node.id.clone(),
                        output: output.index,
                        input: input_index,
                    });
                };
                vars.bind_port(input_port.clone(), &node.inputs[input_index].name);
                vars.alias_port(port.clone(), &input_port);
                substitutions.insert(port, element);
            }
            None => {
                let socket = node.outputs.get(output.index).ok_or_else(|| {
                    StructuralError::InvalidSocketIndex {
                        node: node.id.clone(),
                        direction: "output",
                        index: output.index,
                    }
                })?;
                let element = vars.fresh(&format!("base_{}", socket.name));
                substitutions.insert(port, element);
            }
        }
    }

    let mut body = fragment.stmts;
    map_ports::<CompileError>(&mut body, &mut |port| {
        Ok(substitutions.get(port).copied())
    })?;

    let mut stmts = Vec::new();

    // Pre-initialize linked output lists that are not written in place
    for output in &spec.outputs {
        if output.aliased_to_input.is_none() && output_consumed(output.index) {
            stmts.push(Stmt::assign_port(
                PortRef::output(node.id.clone(), output.index),
                Expr::DefaultOf(node.outputs[output.index].ty),
            ));
        }
    }

    // Amount selection and per-input iterator construction. A single
    // list input is iterated directly at its own length; otherwise the
    // amount depends on how many inputs refuse extension.
    let (amount, bindings) = if spec.inputs.len() == 1 {
        let input = &spec.inputs[0];
        let list = Expr::Port(PortRef::input(node.id.clone(), input.index));
        (
            None,
            vec![LoopBinding {
                var: input_elements[0],
                source: IterSource::Direct(list),
            }],
        )
    } else {
        let fixed: Vec<&_> = spec.inputs.iter().filter(|input| !input.extensible).collect();
        let list_of = |index: usize| Expr::Port(PortRef::input(node.id.clone(), index));
        let amount = match fixed.len() {
            0 => Expr::MaxLength(spec.inputs.iter().map(|input| list_of(input.index)).collect()),
            1 => Expr::Length(Box::new(list_of(fixed[0].index))),
            _ => Expr::MinLength(fixed.iter().map(|input| list_of(input.index)).collect()),
        };
        let mut bindings = Vec::with_capacity(spec.inputs.len());
        for (input, element) in spec.inputs.iter().zip(&input_elements) {
            let source = if input.extensible {
                IterSource::Broadcast {
                    list: list_of(input.index),
                    default: default_element_expr(node, input.index, &input.default, types)?,
                }
            } else {
                IterSource::Direct(list_of(input.index))
            };
            bindings.push(LoopBinding {
                var: *element,
                source,
            });
        }
        (Some(amount), bindings)
    };

    // Append each computed element to the linked output lists
    for output in &spec.outputs {
        if output.aliased_to_input.is_none() && output_consumed(output.index) {
            let port = PortRef::output(node.id.clone(), output.index);
            body.push(Stmt::Append {
                list: Target::Port(port.clone()),
                value: Expr::Var(substitutions[&port]),
            });
        }
    }

    stmts.push(Stmt::Loop(LoopStmt {
        index: None,
        amount,
        bindings,
        body,
    }));

    Ok(Fragment::new(stmts))
}

/// Default element for an empty extensible list. Explicit defaults must
/// survive the representation round trip and are corrected through the
/// socket's base type, exactly like a value typed by the user.
fn default_element_expr(
    node: &Node,
    input: usize,
    default: &Option<trellis_foundation::Value>,
    types: &SocketTypeRegistry,
) -> Result<Expr, CompileError> {
    let base_ty = SocketType::Base(node.inputs[input].ty.base());
    match default {
        None => Ok(Expr::DefaultOf(base_ty)),
        Some(value) => {
            if !value.round_trips() {
                return Err(CompileError::InvalidVectorDefault {
                    node: node.id.clone(),
                    input,
                    reason: match value.to_repr() {
                        Ok(_) => "reconstructed value differs from the original".to_string(),
                        Err(e) => e.to_string(),
                    },
                });
            }
            let (corrected, _) = types.correct(&base_ty, value.clone());
            Ok(Expr::Literal(corrected))
        }
    }
}

/// Exception isolation: on a matching evaluation error, every required
/// output not already defined receives its declared default. The
/// guarded block never propagates the configured error class.
fn apply_isolate(
    spec: &IsolateSpec,
    node: &Node,
    required: &BTreeSet<usize>,
    fragment: Fragment,
) -> Fragment {
    let fallback = required
        .iter()
        .map(|index| Stmt::AssignIfUnset {
            target: Target::Port(PortRef::output(node.id.clone(), *index)),
            value: Expr::DefaultOf(node.outputs[*index].ty),
        })
        .collect();
    Fragment::new(vec![Stmt::Guard {
        body: fragment.stmts,
        catch: spec.catch.clone(),
        report: None,
        fallback,
    }])
}
