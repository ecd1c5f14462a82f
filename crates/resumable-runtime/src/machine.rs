//! The machine record and its `advance` operation.
//!
//! A `StateMachine` is what a backend would generate for one lowered region:
//! one slot per hoisted variable, a persisted state discriminator, and a
//! re-entrant `advance` that runs node bodies and follows transitions until
//! the region suspends, completes or faults.
//!
//! On resumption the persisted state id is looked up in the dispatch
//! routes, which name the resume node directly. Exceptions unwind scope
//! by scope: each try scope's owner carries the `TryCatchFinally`
//! transition whose discriminator slot says whether the region is still in
//! its protected body (catchable), in a handler, or already unwinding.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use resumable_ast::limits::MAX_TRANSITIONS_PER_ADVANCE;
use resumable_ast::{Expr, LabelId, SuspendKind};
use resumable_lowering::graph::{
    PENDING_RETHROW, ScopeId, StateGraph, StateId, StateNode, SuspendTransition, Transition,
};
use resumable_lowering::{LoweredMachine, LoweringOptions};

use crate::completion::{Awaitable, Completion};
use crate::error::{Result, RuntimeError};
use crate::eval::{Evaluator, Signal, Slots};
use crate::host::Host;
use crate::value::{Exception, Value};

/// Why `advance` returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Suspended on an awaitable that has not completed yet.
    Awaiting(Completion),
    /// Suspended after producing a value.
    Yielded(Value),
    Complete(Value),
    /// An exception escaped the region.
    Faulted(Exception),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Created,
    /// `node` ended in a suspend transition; `resume` is the persisted id.
    Suspended { node: StateId, resume: StateId },
    Finished,
}

/// Where `advance` goes next.
enum Cursor {
    Run(StateId),
    Throw(ScopeId, Exception),
    Stop(Step),
}

/// How a node body ended.
enum Exit {
    Next(StateId),
    Suspend(Value),
    Final,
}

pub struct StateMachine {
    machine: Arc<LoweredMachine>,
    host: Arc<Host>,
    labels: FxHashMap<LabelId, StateId>,
    slots: Slots,
    status: Status,
    trace: Vec<StateId>,
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("kind", &self.machine.kind)
            .field("status", &self.status)
            .field("slots", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl StateMachine {
    pub fn new(machine: Arc<LoweredMachine>, host: Arc<Host>) -> Self {
        let labels = machine.graph.label_index();
        let slots = machine
            .variables
            .iter()
            .map(|variable| (variable.id, Value::Unit))
            .collect();
        Self {
            machine,
            host,
            labels,
            slots,
            status: Status::Created,
            trace: Vec::new(),
        }
    }

    /// Lower `region` and wrap the result.
    pub fn from_expr(region: &Expr, options: &LoweringOptions, host: Arc<Host>) -> Result<Self> {
        let machine = resumable_lowering::lower(region, options)?;
        Ok(Self::new(Arc::new(machine), host))
    }

    pub fn kind(&self) -> SuspendKind {
        self.machine.kind
    }

    pub fn lowered(&self) -> &LoweredMachine {
        &self.machine
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// The persisted discriminator: the state to resume at, while suspended.
    pub fn state(&self) -> Option<StateId> {
        match self.status {
            Status::Suspended { resume, .. } => Some(resume),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == Status::Finished
    }

    /// Every state entered so far, in order.
    pub fn trace(&self) -> &[StateId] {
        &self.trace
    }

    pub fn slot(&self, name: &str) -> Option<&Value> {
        self.machine
            .variables
            .iter()
            .find(|variable| variable.name == name)
            .and_then(|variable| self.slots.get(&variable.id))
    }

    /// Run until the next suspension, completion or fault. `sent` is the
    /// value a yield resumes with; awaits ignore it.
    #[tracing::instrument(level = "debug", skip_all, fields(kind = self.machine.kind.as_str()))]
    pub fn advance(&mut self, sent: Value) -> Result<Step> {
        let machine = Arc::clone(&self.machine);
        let outcome = self.run(&machine.graph, sent);
        if outcome.is_err() {
            self.status = Status::Finished;
        }
        outcome
    }

    fn run(&mut self, graph: &StateGraph, sent: Value) -> Result<Step> {
        let mut cursor = match self.status {
            Status::Finished => return Err(RuntimeError::Finished),
            Status::Created => Cursor::Run(graph.entry()),
            Status::Suspended { node, resume } => self.resume(graph, node, resume, sent)?,
        };

        let mut steps = 0u32;
        loop {
            steps += 1;
            if steps > MAX_TRANSITIONS_PER_ADVANCE {
                return Err(RuntimeError::Runaway {
                    limit: MAX_TRANSITIONS_PER_ADVANCE,
                });
            }
            cursor = match cursor {
                Cursor::Run(id) => self.run_node(graph, id)?,
                Cursor::Throw(scope, exception) => self.unwind(graph, scope, exception),
                Cursor::Stop(step) => return Ok(step),
            };
        }
    }

    // =========================================================================
    // Suspension and resumption
    // =========================================================================

    fn resume(
        &mut self,
        graph: &StateGraph,
        node: StateId,
        resume: StateId,
        sent: Value,
    ) -> Result<Cursor> {
        let target = self
            .machine
            .dispatch
            .route(resume)
            .map(|route| route.node)
            .ok_or(RuntimeError::UnknownState { state: resume })?;
        let suspend = suspend_transition(graph, node)?;
        debug!(%resume, %target, "resuming");

        match suspend.kind {
            SuspendKind::Await => {
                let outcome = match self.slots.get(&suspend.handle_var.id) {
                    Some(Value::Awaitable(completion)) => completion.result(),
                    other => Some(Ok(other.cloned().unwrap_or_default())),
                };
                let outcome = outcome.ok_or(RuntimeError::NotCompleted { state: resume })?;
                Ok(self.deliver(graph, suspend, target, outcome))
            }
            SuspendKind::Yield => Ok(self.deliver(graph, suspend, target, Ok(sent))),
        }
    }

    /// Store a suspension's result and continue at `target`, or throw its
    /// exception from there.
    fn deliver(
        &mut self,
        graph: &StateGraph,
        suspend: &SuspendTransition,
        target: StateId,
        outcome: std::result::Result<Value, Exception>,
    ) -> Cursor {
        match outcome {
            Ok(value) => {
                if let Some(result) = &suspend.result_var {
                    self.slots.insert(result.id, value);
                }
                Cursor::Run(target)
            }
            Err(exception) => {
                let scope = graph.get(target).map_or(ScopeId::ROOT, |node| node.scope);
                Cursor::Throw(scope, exception)
            }
        }
    }

    fn suspend(&mut self, graph: &StateGraph, node: &StateNode, operand: Value) -> Result<Cursor> {
        let suspend = suspend_transition(graph, node.id)?;
        self.slots.insert(suspend.handle_var.id, operand.clone());
        let resume = suspend.join_node;
        match (suspend.kind, operand) {
            (SuspendKind::Await, Value::Awaitable(completion)) => match completion.result() {
                Some(outcome) => Ok(self.deliver(graph, suspend, resume, outcome)),
                None => {
                    trace!(node = %node.id, %resume, "awaiting");
                    self.status = Status::Suspended {
                        node: node.id,
                        resume,
                    };
                    Ok(Cursor::Stop(Step::Awaiting(completion)))
                }
            },
            // Anything else is its own result, without suspending.
            (SuspendKind::Await, value) => Ok(self.deliver(graph, suspend, resume, Ok(value))),
            (SuspendKind::Yield, value) => {
                trace!(node = %node.id, %resume, "yielding");
                self.status = Status::Suspended {
                    node: node.id,
                    resume,
                };
                Ok(Cursor::Stop(Step::Yielded(value)))
            }
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    fn run_node(&mut self, graph: &StateGraph, id: StateId) -> Result<Cursor> {
        let node = graph
            .get(id)
            .ok_or(RuntimeError::UnknownState { state: id })?;
        self.trace.push(id);
        trace!(%id, "enter state");

        match self.execute(node) {
            Ok(Exit::Next(next)) => Ok(Cursor::Run(next)),
            Ok(Exit::Suspend(operand)) => self.suspend(graph, node, operand),
            Ok(Exit::Final) => {
                let value = node
                    .result
                    .as_ref()
                    .and_then(|result| result.variable.as_ref())
                    .and_then(|variable| self.slots.get(&variable.id))
                    .cloned()
                    .unwrap_or_default();
                self.status = Status::Finished;
                debug!(%value, "completed");
                Ok(Cursor::Stop(Step::Complete(value)))
            }
            Err(Signal::Throw(exception)) => Ok(Cursor::Throw(node.scope, exception)),
            Err(Signal::Jump { label, .. }) => self
                .labels
                .get(&label)
                .copied()
                .map(Cursor::Run)
                .ok_or_else(|| RuntimeError::UnknownLabel {
                    label: format!("L{}", label.0),
                }),
            Err(Signal::Return(_)) => Err(RuntimeError::StrayReturn),
            Err(Signal::Fault(error)) => Err(error),
        }
    }

    /// Run a node's body, then evaluate whatever its transition needs.
    fn execute(&mut self, node: &StateNode) -> std::result::Result<Exit, Signal> {
        let mut eval = Evaluator::new(&mut self.slots, &self.host);
        for expr in &node.expressions {
            eval.evaluate(expr)?;
        }
        let transition = node
            .transition
            .as_ref()
            .ok_or(RuntimeError::MissingTransition { state: node.id })?;
        Ok(match transition {
            Transition::Goto { target } => Exit::Next(*target),
            Transition::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let test = eval.evaluate(test)?;
                if test.truthy().map_err(Signal::Throw)? {
                    Exit::Next(*if_true)
                } else {
                    Exit::Next(*if_false)
                }
            }
            Transition::Switch {
                value,
                cases,
                default,
            } => {
                let value = eval.evaluate(value)?;
                let mut next = *default;
                'cases: for case in cases {
                    for test in &case.test_values {
                        if eval.evaluate(test)? == value {
                            next = case.target;
                            break 'cases;
                        }
                    }
                }
                Exit::Next(next)
            }
            Transition::TryCatchFinally(region) => Exit::Next(region.try_node),
            Transition::Loop { body, .. } => Exit::Next(*body),
            Transition::Suspend(suspend) => Exit::Suspend(eval.evaluate(&suspend.operand)?),
            Transition::Final => Exit::Final,
        })
    }

    // =========================================================================
    // Exceptions
    // =========================================================================

    /// Find the handler for an exception raised in `scope`.
    ///
    /// A region still in its protected body (discriminator 0) tries its
    /// catches. Otherwise, or without a match, a finally node runs with the
    /// exception pending. Regions already unwinding pass it outward.
    fn unwind(&mut self, graph: &StateGraph, mut scope: ScopeId, exception: Exception) -> Cursor {
        loop {
            let current = graph.scope(scope);
            let Some(parent) = current.parent else {
                debug!(%exception, "unhandled exception");
                self.status = Status::Finished;
                return Cursor::Stop(Step::Faulted(exception));
            };
            let region = current
                .owner
                .and_then(|owner| graph.get(owner))
                .and_then(|owner| match &owner.transition {
                    Some(Transition::TryCatchFinally(region)) => Some(region),
                    _ => None,
                });
            if let Some(region) = region {
                let discriminator = self
                    .slots
                    .get(&region.discriminator_var.id)
                    .and_then(Value::as_int)
                    .unwrap_or(0);
                if discriminator == 0
                    && let Some(catch) = region
                        .catches
                        .iter()
                        .find(|catch| exception.matches(catch.exception_type.as_deref()))
                {
                    trace!(%exception, target = %catch.target, "caught");
                    self.slots
                        .insert(region.discriminator_var.id, Value::Int(catch.discriminator));
                    self.slots
                        .insert(region.exception_var.id, Value::Exception(exception));
                    return Cursor::Run(catch.target);
                }
                if let Some(finally) = region.finally_node
                    && discriminator != PENDING_RETHROW
                {
                    trace!(%exception, target = %finally, "unwinding through finally");
                    self.slots
                        .insert(region.discriminator_var.id, Value::Int(PENDING_RETHROW));
                    self.slots
                        .insert(region.exception_var.id, Value::Exception(exception));
                    return Cursor::Run(finally);
                }
            }
            scope = parent;
        }
    }
}

fn suspend_transition(graph: &StateGraph, node: StateId) -> Result<&SuspendTransition> {
    match graph.get(node).and_then(|node| node.transition.as_ref()) {
        Some(Transition::Suspend(suspend)) => Ok(suspend),
        _ => Err(RuntimeError::MissingTransition { state: node }),
    }
}

#[cfg(test)]
#[path = "../tests/machine.rs"]
mod tests;
