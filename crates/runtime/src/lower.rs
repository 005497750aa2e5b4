//! Lowering procedures to closures
//!
//! Converts the typed statement IR into a tree of boxed closures over a
//! slot-indexed frame, preserving the compile-once/invoke-many
//! contract without any textual code generation. Undefined slots stay
//! observable: `AssignIfUnset` and isolation fallbacks rely on them.

use std::sync::Arc;
use std::time::Instant;

use trellis_foundation::{OpRegistry, SocketTypeRegistry, Value};
use trellis_graph::CompileError;
use trellis_ir::{
    BinaryOp, Direction, Expr, IterSource, LoopStmt, PortRef, Procedure, Stmt, Target, UnaryOp,
};

use crate::error::EvalError;
use crate::namespace::{Namespace, ProcedureFn};
use crate::session::EvalSession;

/// Everything a running procedure can reach: the registries, the
/// owning unit's namespace (read-only), and the session boards.
pub struct ExecEnv<'a> {
    pub ops: &'a OpRegistry,
    pub types: &'a SocketTypeRegistry,
    pub namespace: &'a Namespace,
    pub session: &'a mut EvalSession,
}

/// Variable slots of one procedure invocation. A `None` slot is an
/// undefined variable.
pub struct Frame {
    slots: Vec<Option<Value>>,
    names: Arc<Vec<String>>,
}

impl Frame {
    fn new(var_count: usize, names: Arc<Vec<String>>) -> Self {
        Self {
            slots: vec![None; var_count],
            names,
        }
    }

    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, slot: usize) -> Option<&mut Value> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn set(&mut self, slot: usize, value: Value) {
        if slot < self.slots.len() {
            self.slots[slot] = Some(value);
        }
    }

    fn name(&self, slot: usize) -> String {
        self.names
            .get(slot)
            .cloned()
            .unwrap_or_else(|| format!("slot{slot}"))
    }
}

/// Control flow out of a statement
pub(crate) enum Flow {
    Normal,
    Break,
    Return(Vec<Value>),
}

type ExprFn = Box<dyn Fn(&Frame, &ExecEnv<'_>) -> Result<Value, EvalError> + Send + Sync>;
type StmtFn = Box<dyn Fn(&mut Frame, &mut ExecEnv<'_>) -> Result<Flow, EvalError> + Send + Sync>;

/// A lowered procedure, shared by every bound entry point
struct LoweredProcedure {
    name: String,
    params: Vec<usize>,
    var_count: usize,
    names: Arc<Vec<String>>,
    body: Vec<StmtFn>,
}

impl LoweredProcedure {
    fn invoke(&self, env: &mut ExecEnv<'_>, args: &[Value]) -> Result<Vec<Value>, EvalError> {
        if args.len() != self.params.len() {
            return Err(EvalError::ArgumentCount {
                name: self.name.clone(),
                expected: self.params.len(),
                got: args.len(),
            });
        }
        let mut frame = Frame::new(self.var_count, Arc::clone(&self.names));
        for (slot, arg) in self.params.iter().zip(args) {
            frame.set(*slot, arg.clone());
        }
        match run_body(&self.body, &mut frame, env)? {
            Flow::Return(values) => Ok(values),
            _ => Ok(Vec::new()),
        }
    }
}

/// The compiled form of a generated procedure
#[derive(Clone)]
pub struct CompiledProcedure {
    inner: Arc<LoweredProcedure>,
}

impl std::fmt::Debug for CompiledProcedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProcedure")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl CompiledProcedure {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Bind an entry point suitable for a namespace
    pub fn bind(&self) -> ProcedureFn {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |env, args| inner.invoke(env, args))
    }
}

/// Lower a generated procedure. Ports surviving to this point are
/// generator bugs and fail loudly.
pub fn lower(procedure: &Procedure) -> Result<CompiledProcedure, CompileError> {
    let names = Arc::new(procedure.var_names.clone());
    let body = lower_stmts(&procedure.body, &names)?;
    Ok(CompiledProcedure {
        inner: Arc::new(LoweredProcedure {
            name: procedure.name.clone(),
            params: procedure.params.iter().map(|var| var.0 as usize).collect(),
            var_count: procedure.var_count as usize,
            names,
            body,
        }),
    })
}

fn run_body(
    body: &[StmtFn],
    frame: &mut Frame,
    env: &mut ExecEnv<'_>,
) -> Result<Flow, EvalError> {
    for stmt in body {
        match stmt(frame, env)? {
            Flow::Normal => {}
            other => return Ok(other),
        }
    }
    Ok(Flow::Normal)
}

fn unbound(port: &PortRef) -> CompileError {
    CompileError::UnboundPort {
        node: port.node.clone(),
        direction: match port.direction {
            Direction::In => "input",
            Direction::Out => "output",
        },
        index: port.index,
    }
}

fn slot_of(target: &Target) -> Result<usize, CompileError> {
    match target {
        Target::Var(var) => Ok(var.0 as usize),
        Target::Port(port) => Err(unbound(port)),
    }
}

fn condition(value: Value, line: Option<u32>) -> Result<bool, EvalError> {
    value.as_condition().ok_or_else(|| EvalError::TypeMismatch {
        context: "condition".to_string(),
        expected: "Boolean",
        got: value.type_name(),
        line,
    })
}

fn as_items(value: Value, context: &str) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(EvalError::TypeMismatch {
            context: context.to_string(),
            expected: "List",
            got: other.type_name(),
            line: None,
        }),
    }
}

fn iteration_count(value: Value) -> Result<usize, EvalError> {
    match value {
        Value::Integer(count) => Ok(count.max(0) as usize),
        other => Err(EvalError::TypeMismatch {
            context: "iteration amount".to_string(),
            expected: "Integer",
            got: other.type_name(),
            line: None,
        }),
    }
}

// =============================================================================
// Expressions
// =============================================================================

fn lower_exprs(exprs: &[Expr], names: &Arc<Vec<String>>) -> Result<Vec<ExprFn>, CompileError> {
    exprs.iter().map(|expr| lower_expr(expr, names)).collect()
}

fn eval_all(
    exprs: &[ExprFn],
    frame: &Frame,
    env: &ExecEnv<'_>,
) -> Result<Vec<Value>, EvalError> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        values.push(expr(frame, env)?);
    }
    Ok(values)
}

fn lower_expr(expr: &Expr, names: &Arc<Vec<String>>) -> Result<ExprFn, CompileError> {
    Ok(match expr {
        Expr::Literal(value) => {
            let value = value.clone();
            Box::new(move |_, _| Ok(value.clone()))
        }
        Expr::Var(var) => {
            let slot = var.0 as usize;
            Box::new(move |frame, _| {
                frame
                    .get(slot)
                    .cloned()
                    .ok_or_else(|| EvalError::UndefinedVariable {
                        name: frame.name(slot),
                        line: None,
                    })
            })
        }
        Expr::Port(port) => return Err(unbound(port)),
        Expr::Unary { op, operand } => {
            let operand = lower_expr(operand, names)?;
            let op = *op;
            Box::new(move |frame, env| eval_unary(op, operand(frame, env)?))
        }
        Expr::Binary { op, left, right } => {
            let left = lower_expr(left, names)?;
            let right = lower_expr(right, names)?;
            let op = *op;
            match op {
                // Short-circuit logic: the right operand is not
                // evaluated when the left decides the result
                BinaryOp::And => Box::new(move |frame, env| {
                    if !condition(left(frame, env)?, None)? {
                        return Ok(Value::Boolean(false));
                    }
                    Ok(Value::Boolean(condition(right(frame, env)?, None)?))
                }),
                BinaryOp::Or => Box::new(move |frame, env| {
                    if condition(left(frame, env)?, None)? {
                        return Ok(Value::Boolean(true));
                    }
                    Ok(Value::Boolean(condition(right(frame, env)?, None)?))
                }),
                _ => Box::new(move |frame, env| {
                    eval_binary(op, left(frame, env)?, right(frame, env)?)
                }),
            }
        }
        Expr::Call { op, args } => {
            let args = lower_exprs(args, names)?;
            let op = op.clone();
            Box::new(move |frame, env| {
                let values = eval_all(&args, frame, env)?;
                env.ops
                    .eval(&op, &values)
                    .map_err(|error| EvalError::from_op(error, None))
            })
        }
        Expr::ListOf(items) => {
            let items = lower_exprs(items, names)?;
            Box::new(move |frame, env| Ok(Value::List(eval_all(&items, frame, env)?)))
        }
        Expr::Copy(operand) => {
            let operand = lower_expr(operand, names)?;
            Box::new(move |frame, env| Ok(operand(frame, env)?.copied()))
        }
        Expr::Length(operand) => {
            let operand = lower_expr(operand, names)?;
            Box::new(move |frame, env| {
                let items = as_items(operand(frame, env)?, "length")?;
                Ok(Value::Integer(items.len() as i64))
            })
        }
        Expr::MaxLength(lists) => {
            let lists = lower_exprs(lists, names)?;
            Box::new(move |frame, env| {
                let mut longest = 0usize;
                for list in &lists {
                    longest = longest.max(as_items(list(frame, env)?, "max length")?.len());
                }
                Ok(Value::Integer(longest as i64))
            })
        }
        Expr::MinLength(lists) => {
            let lists = lower_exprs(lists, names)?;
            Box::new(move |frame, env| {
                let mut shortest: Option<usize> = None;
                for list in &lists {
                    let len = as_items(list(frame, env)?, "min length")?.len();
                    shortest = Some(shortest.map_or(len, |s| s.min(len)));
                }
                Ok(Value::Integer(shortest.unwrap_or(0) as i64))
            })
        }
        Expr::DefaultOf(ty) => {
            let ty = *ty;
            Box::new(move |_, env| Ok(env.types.default_value(&ty)))
        }
    })
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Neg => match value {
            Value::Integer(v) => Ok(Value::Integer(-v)),
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Vector([x, y, z]) => Ok(Value::Vector([-x, -y, -z])),
            other => Err(EvalError::TypeMismatch {
                context: "negation".to_string(),
                expected: "number",
                got: other.type_name(),
                line: None,
            }),
        },
        UnaryOp::Not => Ok(Value::Boolean(!condition(value, None)?)),
    }
}

fn numeric_pair(
    op: &'static str,
    left: &Value,
    right: &Value,
) -> Result<(f64, f64), EvalError> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::TypeMismatch {
            context: op.to_string(),
            expected: "number",
            got: if left.as_number().is_none() {
                left.type_name()
            } else {
                right.type_name()
            },
            line: None,
        }),
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a + b)),
            (Value::Text(a), Value::Text(b)) => Ok(Value::Text(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut joined = a.clone();
                joined.extend(b.iter().cloned());
                Ok(Value::List(joined))
            }
            (Value::Vector(a), Value::Vector(b)) => {
                Ok(Value::Vector([a[0] + b[0], a[1] + b[1], a[2] + b[2]]))
            }
            _ => {
                let (a, b) = numeric_pair("addition", &left, &right)?;
                Ok(Value::Float(a + b))
            }
        },
        BinaryOp::Sub => match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a - b)),
            (Value::Vector(a), Value::Vector(b)) => {
                Ok(Value::Vector([a[0] - b[0], a[1] - b[1], a[2] - b[2]]))
            }
            _ => {
                let (a, b) = numeric_pair("subtraction", &left, &right)?;
                Ok(Value::Float(a - b))
            }
        },
        BinaryOp::Mul => match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a * b)),
            (Value::Vector(v), scale) | (scale, Value::Vector(v)) => {
                let (factor, _) = numeric_pair("scaling", scale, &Value::Float(0.0))?;
                Ok(Value::Vector([v[0] * factor, v[1] * factor, v[2] * factor]))
            }
            _ => {
                let (a, b) = numeric_pair("multiplication", &left, &right)?;
                Ok(Value::Float(a * b))
            }
        },
        BinaryOp::Div => {
            let (a, b) = numeric_pair("division", &left, &right)?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero {
                    op: "division".to_string(),
                    line: None,
                });
            }
            Ok(Value::Float(a / b))
        }
        BinaryOp::Pow => {
            let (a, b) = numeric_pair("power", &left, &right)?;
            Ok(Value::Float(a.powf(b)))
        }
        BinaryOp::Eq => Ok(Value::Boolean(left == right)),
        BinaryOp::Ne => Ok(Value::Boolean(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
                _ => {
                    let (a, b) = numeric_pair("comparison", &left, &right)?;
                    a.partial_cmp(&b)
                }
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Boolean(false));
            };
            Ok(Value::Boolean(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::And | BinaryOp::Or => {
            // Handled with short-circuiting in lower_expr
            let a = condition(left, None)?;
            let b = condition(right, None)?;
            Ok(Value::Boolean(match op {
                BinaryOp::And => a && b,
                _ => a || b,
            }))
        }
    }
}

// =============================================================================
// Statements
// =============================================================================

fn lower_stmts(stmts: &[Stmt], names: &Arc<Vec<String>>) -> Result<Vec<StmtFn>, CompileError> {
    stmts.iter().map(|stmt| lower_stmt(stmt, names)).collect()
}

fn lower_stmt(stmt: &Stmt, names: &Arc<Vec<String>>) -> Result<StmtFn, CompileError> {
    Ok(match stmt {
        Stmt::Assign { target, value, line } => {
            let slot = slot_of(target)?;
            let value = lower_expr(value, names)?;
            let line = *line;
            Box::new(move |frame, env| {
                let result = value(frame, env).map_err(|e| e.with_line(line))?;
                frame.set(slot, result);
                Ok(Flow::Normal)
            })
        }
        Stmt::AssignIfUnset { target, value } => {
            let slot = slot_of(target)?;
            let value = lower_expr(value, names)?;
            Box::new(move |frame, env| {
                if frame.get(slot).is_none() {
                    let result = value(frame, env)?;
                    frame.set(slot, result);
                }
                Ok(Flow::Normal)
            })
        }
        Stmt::Eval { value, line } => {
            let value = lower_expr(value, names)?;
            let line = *line;
            Box::new(move |frame, env| {
                value(frame, env).map_err(|e| e.with_line(line))?;
                Ok(Flow::Normal)
            })
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
            line,
        } => {
            let cond = lower_expr(cond, names)?;
            let then_body = lower_stmts(then_body, names)?;
            let else_body = lower_stmts(else_body, names)?;
            let line = *line;
            Box::new(move |frame, env| {
                let taken = condition(cond(frame, env)?, line).map_err(|e| e.with_line(line))?;
                if taken {
                    run_body(&then_body, frame, env)
                } else {
                    run_body(&else_body, frame, env)
                }
            })
        }
        Stmt::Loop(loop_stmt) => lower_loop(loop_stmt, names)?,
        Stmt::BreakIfNot(cond) => {
            let cond = lower_expr(cond, names)?;
            Box::new(move |frame, env| {
                if condition(cond(frame, env)?, None)? {
                    Ok(Flow::Normal)
                } else {
                    Ok(Flow::Break)
                }
            })
        }
        Stmt::Guard {
            body,
            catch,
            report,
            fallback,
        } => {
            let body = lower_stmts(body, names)?;
            let fallback = lower_stmts(fallback, names)?;
            let catch = catch.clone();
            let report = report.clone();
            Box::new(move |frame, env| match run_body(&body, frame, env) {
                Ok(flow) => Ok(flow),
                Err(error) if catch.matches(error.kind_name()) => {
                    if let Some(report) = &report {
                        let relative = error
                            .line()
                            .map(|l| (l + 1).saturating_sub(report.first_user_line))
                            .unwrap_or(0);
                        env.session.set_error(
                            &report.node,
                            format!("Line: {relative} - {error} ({})", error.kind_name()),
                        );
                    }
                    run_body(&fallback, frame, env)
                }
                Err(error) => Err(error),
            })
        }
        Stmt::Append { list, value } => {
            let slot = slot_of(list)?;
            let value = lower_expr(value, names)?;
            Box::new(move |frame, env| {
                let item = value(frame, env)?;
                match frame.get_mut(slot) {
                    Some(Value::List(items)) => {
                        items.push(item);
                        Ok(Flow::Normal)
                    }
                    Some(other) => Err(EvalError::TypeMismatch {
                        context: "append".to_string(),
                        expected: "List",
                        got: other.type_name(),
                        line: None,
                    }),
                    None => Err(EvalError::UndefinedVariable {
                        name: frame.name(slot),
                        line: None,
                    }),
                }
            })
        }
        Stmt::Return(values) => {
            let values = lower_exprs(values, names)?;
            Box::new(move |frame, env| Ok(Flow::Return(eval_all(&values, frame, env)?)))
        }
        Stmt::SetError { node, message } => {
            let node = node.clone();
            let message = message.clone();
            Box::new(move |_, env| {
                env.session.set_error(&node, message.clone());
                Ok(Flow::Normal)
            })
        }
        Stmt::ClearError { node } => {
            let node = node.clone();
            Box::new(move |_, env| {
                env.session.clear_error(&node);
                Ok(Flow::Normal)
            })
        }
        Stmt::MarkInitialized { node, output, var } => {
            let node = node.clone();
            let output = *output;
            let slot = slot_of(var)?;
            Box::new(move |frame, env| {
                env.session
                    .record_initialized(&node, output, frame.get(slot).is_some());
                Ok(Flow::Normal)
            })
        }
        Stmt::CorrectType {
            var,
            ty,
            node,
            output,
        } => {
            let slot = slot_of(var)?;
            let ty = *ty;
            let node = node.clone();
            let output = *output;
            Box::new(move |frame, env| {
                let value = frame
                    .get(slot)
                    .cloned()
                    .ok_or_else(|| EvalError::UndefinedVariable {
                        name: frame.name(slot),
                        line: None,
                    })?;
                let (corrected, kind) = env.types.correct(&ty, value);
                frame.set(slot, corrected);
                env.session.record_correction(&node, output, kind);
                Ok(Flow::Normal)
            })
        }
        Stmt::CallSub {
            symbol,
            args,
            results,
        } => {
            let symbol = symbol.clone();
            let args = lower_exprs(args, names)?;
            let result_slots: Vec<Option<usize>> = results
                .iter()
                .map(|result| result.as_ref().map(slot_of).transpose())
                .collect::<Result<_, _>>()?;
            Box::new(move |frame, env| {
                let function =
                    env.namespace
                        .function(&symbol)
                        .ok_or_else(|| EvalError::UnknownFunction {
                            symbol: symbol.clone(),
                            line: None,
                        })?;
                let values = eval_all(&args, frame, env)?;
                let outputs = function(env, &values)?;
                if outputs.len() != result_slots.len() {
                    return Err(EvalError::ResultShape {
                        symbol: symbol.clone(),
                        expected: result_slots.len(),
                        got: outputs.len(),
                        line: None,
                    });
                }
                for (slot, value) in result_slots.iter().zip(outputs) {
                    if let Some(slot) = slot {
                        frame.set(*slot, value);
                    }
                }
                Ok(Flow::Normal)
            })
        }
        Stmt::ViewerRecord { node, value } => {
            let node = node.clone();
            let value = lower_expr(value, names)?;
            Box::new(move |frame, env| {
                let line = value(frame, env)?.to_string();
                env.session.record_viewer_line(&node, line);
                Ok(Flow::Normal)
            })
        }
        Stmt::ViewerFlush { node } => {
            let node = node.clone();
            Box::new(move |_, env| {
                env.session.flush_viewer(&node);
                Ok(Flow::Normal)
            })
        }
        Stmt::Measured { node, body } => {
            let node = node.clone();
            let body = lower_stmts(body, names)?;
            Box::new(move |frame, env| {
                let start = Instant::now();
                let flow = run_body(&body, frame, env);
                env.session.add_measurement(&node, start.elapsed());
                flow
            })
        }
    })
}

enum LoweredSource {
    Direct(ExprFn),
    Broadcast { list: ExprFn, default: ExprFn },
}

enum Prepared {
    Direct(Vec<Value>),
    Repeat(Value),
    Cycle(Vec<Value>),
}

fn lower_loop(loop_stmt: &LoopStmt, names: &Arc<Vec<String>>) -> Result<StmtFn, CompileError> {
    let has_broadcast = loop_stmt
        .bindings
        .iter()
        .any(|binding| matches!(binding.source, IterSource::Broadcast { .. }));
    if has_broadcast && loop_stmt.amount.is_none() {
        return Err(CompileError::MalformedLoop(
            "broadcast source requires an explicit amount",
        ));
    }

    let amount = loop_stmt
        .amount
        .as_ref()
        .map(|amount| lower_expr(amount, names))
        .transpose()?;
    let index_slot = loop_stmt.index.map(|var| var.0 as usize);
    let bindings: Vec<(usize, LoweredSource)> = loop_stmt
        .bindings
        .iter()
        .map(|binding| {
            let source = match &binding.source {
                IterSource::Direct(list) => LoweredSource::Direct(lower_expr(list, names)?),
                IterSource::Broadcast { list, default } => LoweredSource::Broadcast {
                    list: lower_expr(list, names)?,
                    default: lower_expr(default, names)?,
                },
            };
            Ok((binding.var.0 as usize, source))
        })
        .collect::<Result<_, CompileError>>()?;
    let body = lower_stmts(&loop_stmt.body, names)?;

    Ok(Box::new(move |frame, env| {
        let amount_bound = match &amount {
            Some(amount) => Some(iteration_count(amount(frame, env)?)?),
            None => None,
        };

        // Build per-binding iterators; every direct list tightens the
        // shared bound, exactly like zip truncating at the shortest
        // sequence.
        let mut bound = amount_bound;
        let mut prepared = Vec::with_capacity(bindings.len());
        for (slot, source) in &bindings {
            let iterated = match source {
                LoweredSource::Direct(list) => {
                    let items = as_items(list(frame, env)?, "loop input")?;
                    bound = Some(bound.map_or(items.len(), |b| b.min(items.len())));
                    Prepared::Direct(items)
                }
                LoweredSource::Broadcast { list, default } => {
                    let items = as_items(list(frame, env)?, "loop input")?;
                    let Some(amount) = amount_bound else {
                        // Checked at lowering time
                        return Err(EvalError::TypeMismatch {
                            context: "broadcast loop".to_string(),
                            expected: "amount",
                            got: "none",
                            line: None,
                        });
                    };
                    if items.len() >= amount {
                        bound = Some(bound.map_or(items.len(), |b| b.min(items.len())));
                        Prepared::Direct(items)
                    } else if items.is_empty() {
                        Prepared::Repeat(default(frame, env)?)
                    } else {
                        Prepared::Cycle(items)
                    }
                }
            };
            prepared.push((*slot, iterated));
        }

        let total = bound.unwrap_or(0);
        for index in 0..total {
            if let Some(slot) = index_slot {
                frame.set(slot, Value::Integer(index as i64));
            }
            for (slot, iterated) in &prepared {
                let element = match iterated {
                    Prepared::Direct(items) => items[index].clone(),
                    Prepared::Repeat(value) => value.clone(),
                    Prepared::Cycle(items) => items[index % items.len()].clone(),
                };
                frame.set(*slot, element);
            }
            match run_body(&body, frame, env)? {
                Flow::Normal => {}
                Flow::Break => break,
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }))
}
