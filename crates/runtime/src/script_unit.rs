//! Script procedure generation
//!
//! Compiles one script node's user-authored source into a full
//! procedure. The header takes the node's input socket names (the
//! trailing control socket excluded). Disallowed or unparsable sources
//! still compile: the generated body reports the problem and returns
//! the declared defaults, and never raises at execution time.

use indexmap::IndexMap;
use tracing::debug;
use trellis_foundation::{OpRegistry, Value};
use trellis_graph::{CompileError, Network, NodeKind, Socket, StructuralError};
use trellis_ir::{
    BindingTable, ErrorFilter, Expr, GuardReport, Procedure, Stmt, Target, VarId, ENTRY_SYMBOL,
};
use trellis_script::{self as script, ScriptExpr, ScriptStmt, StmtKind};

/// Sockets participating in the header/return: everything but the
/// trailing control socket.
fn data_sockets(sockets: &[Socket]) -> &[Socket] {
    match sockets.split_last() {
        Some((_, rest)) => rest,
        None => &[],
    }
}

fn var_for(names: &mut IndexMap<String, VarId>, vars: &mut BindingTable, name: &str) -> VarId {
    if let Some(var) = names.get(name) {
        return *var;
    }
    let var = vars.fresh(name);
    names.insert(name.to_string(), var);
    var
}

/// Generate the procedure for a script network
pub fn generate_script_procedure(
    network: &Network,
    ops: &OpRegistry,
) -> Result<Procedure, CompileError> {
    let node = network.script_node()?;
    let NodeKind::Script(spec) = &node.kind else {
        return Err(StructuralError::MissingScriptNode(network.id.clone()).into());
    };

    let mut vars = BindingTable::new();
    let mut names: IndexMap<String, VarId> = IndexMap::new();
    let mut imports: Vec<String> = Vec::new();

    let inputs = data_sockets(&node.inputs);
    let outputs = data_sockets(&node.outputs);

    let mut params = Vec::with_capacity(inputs.len());
    for socket in inputs {
        let var = var_for(&mut names, &mut vars, &socket.name);
        params.push(var);
    }

    let default_return = Stmt::Return(
        outputs
            .iter()
            .map(|socket| Expr::DefaultOf(socket.ty))
            .collect(),
    );

    let body = if script::contains_star_import(&spec.source) {
        debug!(node = %node.id, "star import rejected");
        vec![
            Stmt::SetError {
                node: node.id.clone(),
                message: "Star import is not allowed".to_string(),
            },
            default_return,
        ]
    } else {
        match script::parse(&spec.source) {
            Err(errors) => {
                let line = errors.first().map(|error| error.line).unwrap_or(1);
                debug!(node = %node.id, line, "script does not parse");
                vec![
                    Stmt::SetError {
                        node: node.id.clone(),
                        message: format!("Line: {line} - Invalid Syntax"),
                    },
                    default_return,
                ]
            }
            Ok(stmts) => {
                let mut inner =
                    lower_script_stmts(&stmts, &mut names, &mut imports, &mut vars, ops);

                if node.flags.initialize_missing_outputs {
                    for (index, socket) in outputs.iter().enumerate() {
                        let var = var_for(&mut names, &mut vars, &socket.name);
                        inner.push(Stmt::MarkInitialized {
                            node: node.id.clone(),
                            output: index,
                            var: Target::Var(var),
                        });
                        inner.push(Stmt::AssignIfUnset {
                            target: Target::Var(var),
                            value: Expr::DefaultOf(socket.ty),
                        });
                    }
                }
                if node.flags.correct_output_types {
                    for (index, socket) in outputs.iter().enumerate() {
                        let var = var_for(&mut names, &mut vars, &socket.name);
                        inner.push(Stmt::CorrectType {
                            var: Target::Var(var),
                            ty: socket.ty,
                            node: node.id.clone(),
                            output: index,
                        });
                    }
                }
                inner.push(Stmt::Return(
                    outputs
                        .iter()
                        .map(|socket| Expr::Var(var_for(&mut names, &mut vars, &socket.name)))
                        .collect(),
                ));

                if node.flags.debug_mode {
                    vec![
                        Stmt::ClearError {
                            node: node.id.clone(),
                        },
                        Stmt::Guard {
                            body: inner,
                            catch: ErrorFilter::Any,
                            report: Some(GuardReport {
                                node: node.id.clone(),
                                first_user_line: 1,
                            }),
                            fallback: vec![default_return],
                        },
                    ]
                } else {
                    inner
                }
            }
        }
    };

    Ok(Procedure {
        name: format!("script: {:?}", network.name),
        entry: ENTRY_SYMBOL.to_string(),
        params,
        body,
        var_count: vars.var_count(),
        var_names: vars.into_names(),
    })
}

fn lower_script_stmts(
    stmts: &[ScriptStmt],
    names: &mut IndexMap<String, VarId>,
    imports: &mut Vec<String>,
    vars: &mut BindingTable,
    ops: &OpRegistry,
) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Import { module } => {
                imports.push(module.clone());
            }
            StmtKind::Assign { name, value } => {
                let value = lower_script_expr(value, names, imports, vars, ops);
                let var = var_for(names, vars, name);
                out.push(Stmt::Assign {
                    target: Target::Var(var),
                    value,
                    line: Some(stmt.line),
                });
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let cond = lower_script_expr(cond, names, imports, vars, ops);
                let then_body = lower_script_stmts(then_body, names, imports, vars, ops);
                let else_body = lower_script_stmts(else_body, names, imports, vars, ops);
                out.push(Stmt::If {
                    cond,
                    then_body,
                    else_body,
                    line: Some(stmt.line),
                });
            }
            StmtKind::Expr { value } => {
                let value = lower_script_expr(value, names, imports, vars, ops);
                out.push(Stmt::Eval {
                    value,
                    line: Some(stmt.line),
                });
            }
        }
    }
    out
}

fn lower_script_expr(
    expr: &ScriptExpr,
    names: &mut IndexMap<String, VarId>,
    imports: &[String],
    vars: &mut BindingTable,
    ops: &OpRegistry,
) -> Expr {
    match expr {
        ScriptExpr::Literal(literal) => Expr::Literal(match literal {
            script::Literal::Float(v) => Value::Float(*v),
            script::Literal::Integer(v) => Value::Integer(*v),
            script::Literal::Boolean(v) => Value::Boolean(*v),
            script::Literal::Text(v) => Value::Text(v.clone()),
        }),
        ScriptExpr::Name(path) => {
            let joined = path.join(".");
            Expr::Var(var_for(names, vars, &joined))
        }
        ScriptExpr::List(items) => Expr::ListOf(
            items
                .iter()
                .map(|item| lower_script_expr(item, names, imports, vars, ops))
                .collect(),
        ),
        ScriptExpr::Call { path, args } => Expr::Call {
            op: resolve_call(path, imports, ops),
            args: args
                .iter()
                .map(|arg| lower_script_expr(arg, names, imports, vars, ops))
                .collect(),
        },
        ScriptExpr::Unary { op, operand } => Expr::unary(
            unary_op(*op),
            lower_script_expr(operand, names, imports, vars, ops),
        ),
        ScriptExpr::Binary { op, left, right } => Expr::binary(
            binary_op(*op),
            lower_script_expr(left, names, imports, vars, ops),
            lower_script_expr(right, names, imports, vars, ops),
        ),
    }
}

/// Resolve a callee: fully qualified names win; unqualified names try
/// each imported namespace in order. Unresolved names stay as written
/// and fail at evaluation time like any other unknown operation.
fn resolve_call(path: &[String], imports: &[String], ops: &OpRegistry) -> String {
    let full = path.join(".");
    if ops.contains(&full) {
        return full;
    }
    if let [name] = path {
        for namespace in imports {
            let qualified = format!("{namespace}.{name}");
            if ops.contains(&qualified) {
                return qualified;
            }
        }
    }
    full
}

fn unary_op(op: script::UnaryOp) -> trellis_ir::UnaryOp {
    match op {
        script::UnaryOp::Neg => trellis_ir::UnaryOp::Neg,
        script::UnaryOp::Not => trellis_ir::UnaryOp::Not,
    }
}

fn binary_op(op: script::BinaryOp) -> trellis_ir::BinaryOp {
    use trellis_ir::BinaryOp as Ir;
    match op {
        script::BinaryOp::Add => Ir::Add,
        script::BinaryOp::Sub => Ir::Sub,
        script::BinaryOp::Mul => Ir::Mul,
        script::BinaryOp::Div => Ir::Div,
        script::BinaryOp::Pow => Ir::Pow,
        script::BinaryOp::Eq => Ir::Eq,
        script::BinaryOp::Ne => Ir::Ne,
        script::BinaryOp::Lt => Ir::Lt,
        script::BinaryOp::Le => Ir::Le,
        script::BinaryOp::Gt => Ir::Gt,
        script::BinaryOp::Ge => Ir::Ge,
        script::BinaryOp::And => Ir::And,
        script::BinaryOp::Or => Ir::Or,
    }
}
