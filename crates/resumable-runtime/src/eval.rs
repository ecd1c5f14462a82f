//! Expression evaluation over a machine's slot record.
//!
//! The evaluator runs the bodies of lowered state nodes. Everything it sees
//! there is ordinary code: verbatim blocks (with their own locals), loops,
//! switches, try regions and labels. Control that leaves the expression is
//! reported as a `Signal`:
//! - `Throw`: an uncaught user exception, unwound by the machine
//! - `Jump`: a `Goto` to a label the expression does not define, normally a
//!   state node label
//! - `Fault`: a runtime error
//!
//! In direct mode the evaluator also runs suspension points in place, which
//! gives a reference semantics for whole, unlowered trees.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use tracing::trace;

use resumable_ast::limits::{MAX_EVAL_DEPTH, MAX_TRANSITIONS_PER_ADVANCE};
use resumable_ast::{
    CatchHandler, Expr, GotoKind, LabelId, LabelTarget, Operator, SuspendKind, SwitchCase,
    VarId, Variable,
};

use crate::completion::Awaitable;
use crate::error::RuntimeError;
use crate::host::Host;
use crate::value::{Exception, Value};

/// The persistent variable record of a machine.
pub type Slots = FxHashMap<VarId, Value>;

/// Non-local control leaving an evaluated expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Throw(Exception),
    Jump { label: LabelId, value: Value },
    /// `Goto` of kind `Return`; only unlowered trees still contain one.
    Return(Value),
    Fault(RuntimeError),
}

impl From<RuntimeError> for Signal {
    fn from(error: RuntimeError) -> Self {
        Self::Fault(error)
    }
}

pub type Flow<T> = std::result::Result<T, Signal>;

pub struct Evaluator<'a> {
    slots: &'a mut Slots,
    host: &'a Host,
    /// Locals of verbatim blocks and catch bindings, innermost last.
    locals: Vec<FxHashMap<VarId, Value>>,
    /// Exceptions being handled, for bare rethrows.
    handling: Vec<Exception>,
    depth: u32,
    steps: u32,
    direct: bool,
    yields: Vec<Value>,
}

impl<'a> Evaluator<'a> {
    pub fn new(slots: &'a mut Slots, host: &'a Host) -> Self {
        Self {
            slots,
            host,
            locals: Vec::new(),
            handling: Vec::new(),
            depth: 0,
            steps: 0,
            direct: false,
            yields: Vec::new(),
        }
    }

    /// Evaluator that runs suspension points in place: an awaited operand
    /// must already be complete, and yielded values are collected.
    pub fn direct(slots: &'a mut Slots, host: &'a Host) -> Self {
        Self {
            direct: true,
            ..Self::new(slots, host)
        }
    }

    pub fn take_yields(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.yields)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Flow<Value> {
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(RuntimeError::DepthExceeded {
                limit: MAX_EVAL_DEPTH,
            }
            .into());
        }
        self.depth += 1;
        let value = self.eval_expr(expr);
        self.depth -= 1;
        value
    }

    fn eval_expr(&mut self, expr: &Expr) -> Flow<Value> {
        match expr {
            Expr::Literal(constant) => Ok(Value::from(constant)),
            Expr::Variable(variable) => self.read(variable),
            Expr::Assign { target, value } => {
                let value = self.evaluate(value)?;
                self.write(target, value.clone());
                Ok(value)
            }
            Expr::Op { operator, operands } => {
                let mut args = Vec::with_capacity(operands.len());
                for operand in operands {
                    args.push(self.evaluate(operand)?);
                }
                self.apply(operator, args)
            }
            Expr::Block { vars, body } => self.eval_block(vars, body),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let test = self.evaluate(test)?;
                if test.truthy().map_err(Signal::Throw)? {
                    self.evaluate(if_true)
                } else if let Some(if_false) = if_false {
                    self.evaluate(if_false)
                } else {
                    Ok(Value::Unit)
                }
            }
            Expr::Switch {
                value,
                cases,
                default,
            } => self.eval_switch(value, cases, default.as_deref()),
            Expr::Try {
                body,
                handlers,
                finally,
            } => self.eval_try(body, handlers, finally.as_deref()),
            Expr::Loop {
                body,
                break_label,
                continue_label,
            } => self.eval_loop(body, break_label.as_ref(), continue_label.as_ref()),
            Expr::Goto {
                target,
                kind,
                value,
            } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Unit,
                };
                match kind {
                    GotoKind::Return => Err(Signal::Return(value)),
                    _ => Err(Signal::Jump {
                        label: target.id,
                        value,
                    }),
                }
            }
            Expr::Label { default, .. } => match default {
                Some(default) => self.evaluate(default),
                None => Ok(Value::Unit),
            },
            Expr::Throw(Some(operand)) => {
                let exception = self.evaluate(operand)?.into_exception();
                Err(Signal::Throw(exception))
            }
            Expr::Throw(None) => match self.handling.last() {
                Some(exception) => Err(Signal::Throw(exception.clone())),
                None => Err(RuntimeError::RethrowOutsideHandler.into()),
            },
            Expr::Suspend { operand, kind, .. } => self.eval_suspend(operand, *kind),
            Expr::Resumable { kind, .. } => Err(RuntimeError::NestedRegion {
                kind: kind.as_str(),
            }
            .into()),
        }
    }

    // =========================================================================
    // Variables
    // =========================================================================

    fn read(&self, variable: &Variable) -> Flow<Value> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(&variable.id))
            .or_else(|| self.slots.get(&variable.id))
            .cloned()
            .ok_or_else(|| {
                RuntimeError::UnboundVariable {
                    name: variable.name.clone(),
                }
                .into()
            })
    }

    fn write(&mut self, variable: &Variable, value: Value) {
        for scope in self.locals.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(&variable.id) {
                *slot = value;
                return;
            }
        }
        self.slots.insert(variable.id, value);
    }

    /// Count a loop iteration or a backward label jump.
    fn tick(&mut self) -> Flow<()> {
        self.steps += 1;
        if self.steps > MAX_TRANSITIONS_PER_ADVANCE {
            return Err(RuntimeError::Runaway {
                limit: MAX_TRANSITIONS_PER_ADVANCE,
            }
            .into());
        }
        Ok(())
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Run a block. A jump to a label among its direct children continues
    /// after that label, with the jump's value as the label's value.
    fn eval_block(&mut self, vars: &[Variable], body: &[Expr]) -> Flow<Value> {
        self.locals
            .push(vars.iter().map(|var| (var.id, Value::Unit)).collect());
        let mut value = Value::Unit;
        let mut index = 0;
        let outcome = loop {
            let Some(child) = body.get(index) else {
                break Ok(value);
            };
            match self.evaluate(child) {
                Ok(result) => {
                    value = result;
                    index += 1;
                }
                Err(Signal::Jump {
                    label,
                    value: carried,
                }) => match label_position(body, label) {
                    Some(position) => {
                        if let Err(signal) = self.tick() {
                            break Err(signal);
                        }
                        trace!(label = label.0, "local jump");
                        value = carried;
                        index = position + 1;
                    }
                    None => {
                        break Err(Signal::Jump {
                            label,
                            value: carried,
                        });
                    }
                },
                Err(signal) => break Err(signal),
            }
        };
        self.locals.pop();
        outcome
    }

    fn eval_switch(
        &mut self,
        value: &Expr,
        cases: &[SwitchCase],
        default: Option<&Expr>,
    ) -> Flow<Value> {
        let value = self.evaluate(value)?;
        for case in cases {
            for test in &case.test_values {
                if self.evaluate(test)? == value {
                    return self.evaluate(&case.body);
                }
            }
        }
        match default {
            Some(default) => self.evaluate(default),
            None => Ok(Value::Unit),
        }
    }

    fn eval_try(
        &mut self,
        body: &Expr,
        handlers: &[CatchHandler],
        finally: Option<&Expr>,
    ) -> Flow<Value> {
        let mut outcome = self.evaluate(body);
        if let Err(Signal::Throw(exception)) = &outcome
            && let Some(handler) = handlers
                .iter()
                .find(|handler| exception.matches(handler.exception_type.as_deref()))
        {
            let exception = exception.clone();
            outcome = self.eval_handler(handler, exception);
        }
        if let Some(finally) = finally {
            if matches!(outcome, Err(Signal::Fault(_))) {
                return outcome;
            }
            // A signal from the finally block replaces the pending outcome.
            self.evaluate(finally)?;
        }
        outcome
    }

    fn eval_handler(&mut self, handler: &CatchHandler, exception: Exception) -> Flow<Value> {
        let mut scope = FxHashMap::default();
        if let Some(variable) = &handler.variable {
            scope.insert(variable.id, Value::Exception(exception.clone()));
        }
        self.locals.push(scope);
        self.handling.push(exception);
        let outcome = self.evaluate(&handler.body);
        self.handling.pop();
        self.locals.pop();
        outcome
    }

    fn eval_loop(
        &mut self,
        body: &Expr,
        break_label: Option<&LabelTarget>,
        continue_label: Option<&LabelTarget>,
    ) -> Flow<Value> {
        let is = |target: Option<&LabelTarget>, label: LabelId| {
            target.is_some_and(|target| target.id == label)
        };
        loop {
            self.tick()?;
            match self.evaluate(body) {
                Ok(_) => {}
                Err(Signal::Jump { label, value }) if is(break_label, label) => return Ok(value),
                Err(Signal::Jump { label, .. }) if is(continue_label, label) => {}
                Err(signal) => return Err(signal),
            }
        }
    }

    fn eval_suspend(&mut self, operand: &Expr, kind: SuspendKind) -> Flow<Value> {
        if !self.direct {
            return Err(RuntimeError::UnexpectedSuspend.into());
        }
        let value = self.evaluate(operand)?;
        match kind {
            SuspendKind::Await => await_in_place(value),
            SuspendKind::Yield => {
                self.yields.push(value);
                Ok(Value::Unit)
            }
        }
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn apply(&mut self, operator: &Operator, args: Vec<Value>) -> Flow<Value> {
        use Value::{Bool, Int, Str};

        let overflow = || Exception::new("Overflow", format!("`{}` overflowed", operator.symbol()));
        let result = match (operator, args.as_slice()) {
            (Operator::Call(name), _) => return self.host.call(name, &args)?.map_err(Signal::Throw),
            (Operator::Add, [Int(a), Int(b)]) => a.checked_add(*b).map(Int).ok_or_else(overflow),
            (Operator::Add, [Str(a), b]) => Ok(Str(format!("{a}{b}"))),
            (Operator::Add, [a, Str(b)]) => Ok(Str(format!("{a}{b}"))),
            (Operator::Sub, [Int(a), Int(b)]) => a.checked_sub(*b).map(Int).ok_or_else(overflow),
            (Operator::Mul, [Int(a), Int(b)]) => a.checked_mul(*b).map(Int).ok_or_else(overflow),
            (Operator::Div | Operator::Rem, [Int(_), Int(0)]) => {
                Err(Exception::new("DivideByZero", "division by zero"))
            }
            (Operator::Div, [Int(a), Int(b)]) => a.checked_div(*b).map(Int).ok_or_else(overflow),
            (Operator::Rem, [Int(a), Int(b)]) => a.checked_rem(*b).map(Int).ok_or_else(overflow),
            (Operator::Neg, [Int(a)]) => a.checked_neg().map(Int).ok_or_else(overflow),
            (Operator::Not, [Bool(a)]) => Ok(Bool(!a)),
            (Operator::Eq, [a, b]) => Ok(Bool(a == b)),
            (Operator::Ne, [a, b]) => Ok(Bool(a != b)),
            (Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge, [a, b])
                if compare(a, b).is_some() =>
            {
                let ordering = compare(a, b).unwrap_or(Ordering::Equal);
                Ok(Bool(match operator {
                    Operator::Lt => ordering.is_lt(),
                    Operator::Le => ordering.is_le(),
                    Operator::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            (Operator::And, [Bool(a), Bool(b)]) => Ok(Bool(*a && *b)),
            (Operator::Or, [Bool(a), Bool(b)]) => Ok(Bool(*a || *b)),
            (operator, args) => {
                let types: Vec<&str> = args.iter().map(Value::type_name).collect();
                Err(Exception::type_error(format!(
                    "`{}` does not apply to ({})",
                    operator.symbol(),
                    types.join(", ")
                )))
            }
        };
        result.map_err(Signal::Throw)
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn label_position(body: &[Expr], label: LabelId) -> Option<usize> {
    body.iter()
        .position(|child| matches!(child, Expr::Label { target, .. } if target.id == label))
}

/// `await value` without suspending: a completed awaitable yields its
/// result, any other value is its own result.
fn await_in_place(value: Value) -> Flow<Value> {
    match value {
        Value::Awaitable(completion) => match completion.result() {
            Some(Ok(value)) => Ok(value),
            Some(Err(exception)) => Err(Signal::Throw(exception)),
            None => Err(RuntimeError::Stalled.into()),
        },
        other => Ok(other),
    }
}

#[cfg(test)]
#[path = "../tests/eval.rs"]
mod tests;
