//! Port rewriting
//!
//! Walks fragments and replaces socket placeholders with bound
//! variables. The effect pipeline uses the partial form (unmapped ports
//! stay in place for the final pass); the code generator uses the total
//! form, where an unmapped port is an error.

use crate::expr::{Expr, PortRef, VarId};
use crate::stmt::{IterSource, Stmt, Target};

/// Rewrite every port the mapper resolves. `Ok(None)` leaves a port
/// untouched; `Err` aborts the walk.
pub fn map_ports<E>(
    stmts: &mut [Stmt],
    mapper: &mut impl FnMut(&PortRef) -> Result<Option<VarId>, E>,
) -> Result<(), E> {
    for stmt in stmts {
        map_stmt(stmt, mapper)?;
    }
    Ok(())
}

fn map_stmt<E>(
    stmt: &mut Stmt,
    mapper: &mut impl FnMut(&PortRef) -> Result<Option<VarId>, E>,
) -> Result<(), E> {
    match stmt {
        Stmt::Assign { target, value, .. } | Stmt::AssignIfUnset { target, value } => {
            map_target(target, mapper)?;
            map_expr(value, mapper)?;
        }
        Stmt::Eval { value, .. } => map_expr(value, mapper)?,
        Stmt::If {
            cond,
            then_body,
            else_body,
            ..
        } => {
            map_expr(cond, mapper)?;
            map_ports(then_body, mapper)?;
            map_ports(else_body, mapper)?;
        }
        Stmt::Loop(loop_stmt) => {
            if let Some(amount) = &mut loop_stmt.amount {
                map_expr(amount, mapper)?;
            }
            for binding in &mut loop_stmt.bindings {
                match &mut binding.source {
                    IterSource::Direct(list) => map_expr(list, mapper)?,
                    IterSource::Broadcast { list, default } => {
                        map_expr(list, mapper)?;
                        map_expr(default, mapper)?;
                    }
                }
            }
            map_ports(&mut loop_stmt.body, mapper)?;
        }
        Stmt::BreakIfNot(cond) => map_expr(cond, mapper)?,
        Stmt::Guard { body, fallback, .. } => {
            map_ports(body, mapper)?;
            map_ports(fallback, mapper)?;
        }
        Stmt::Append { list, value } => {
            map_target(list, mapper)?;
            map_expr(value, mapper)?;
        }
        Stmt::Return(values) => {
            for value in values {
                map_expr(value, mapper)?;
            }
        }
        Stmt::MarkInitialized { var, .. } => map_target(var, mapper)?,
        Stmt::CorrectType { var, .. } => map_target(var, mapper)?,
        Stmt::CallSub { args, results, .. } => {
            for arg in args {
                map_expr(arg, mapper)?;
            }
            for result in results.iter_mut().flatten() {
                map_target(result, mapper)?;
            }
        }
        Stmt::ViewerRecord { value, .. } => map_expr(value, mapper)?,
        Stmt::Measured { body, .. } => map_ports(body, mapper)?,
        Stmt::SetError { .. } | Stmt::ClearError { .. } | Stmt::ViewerFlush { .. } => {}
    }
    Ok(())
}

fn map_target<E>(
    target: &mut Target,
    mapper: &mut impl FnMut(&PortRef) -> Result<Option<VarId>, E>,
) -> Result<(), E> {
    if let Target::Port(port) = target
        && let Some(var) = mapper(port)?
    {
        *target = Target::Var(var);
    }
    Ok(())
}

fn map_expr<E>(
    expr: &mut Expr,
    mapper: &mut impl FnMut(&PortRef) -> Result<Option<VarId>, E>,
) -> Result<(), E> {
    match expr {
        Expr::Port(port) => {
            if let Some(var) = mapper(port)? {
                *expr = Expr::Var(var);
            }
        }
        Expr::Unary { operand, .. } => map_expr(operand, mapper)?,
        Expr::Binary { left, right, .. } => {
            map_expr(left, mapper)?;
            map_expr(right, mapper)?;
        }
        Expr::Call { args, .. } => {
            for arg in args {
                map_expr(arg, mapper)?;
            }
        }
        Expr::ListOf(items) | Expr::MaxLength(items) | Expr::MinLength(items) => {
            for item in items {
                map_expr(item, mapper)?;
            }
        }
        Expr::Copy(operand) | Expr::Length(operand) => map_expr(operand, mapper)?,
        Expr::Literal(_) | Expr::Var(_) | Expr::DefaultOf(_) => {}
    }
    Ok(())
}
