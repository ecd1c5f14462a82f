//! Drivers for state machines, plus direct evaluation of unlowered trees.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use resumable_ast::{Expr, SuspendKind};
use resumable_lowering::LoweringError;

use crate::completion::{Awaitable, Completion, Registration};
use crate::error::{Result, RuntimeError};
use crate::eval::{Evaluator, Signal, Slots};
use crate::host::Host;
use crate::machine::{StateMachine, Step};
use crate::value::{Exception, Value};

/// Observable result of running a region.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The final value, or the exception that escaped the region.
    pub result: std::result::Result<Value, Exception>,
    pub yields: Vec<Value>,
    /// Times control returned to the driver.
    pub suspensions: usize,
}

/// Run a machine on the calling thread.
///
/// When it awaits something still pending, the host's `delay` awaitables
/// are completed; an await nothing can complete is reported as `Stalled`.
/// Yields are collected and resumed with unit.
pub fn run_to_completion(machine: &mut StateMachine) -> Result<Outcome> {
    let mut yields = Vec::new();
    let mut suspensions = 0;
    loop {
        match machine.advance(Value::Unit)? {
            Step::Awaiting(completion) => {
                suspensions += 1;
                if !completion.is_completed() {
                    machine.host().complete_pending();
                }
                if !completion.is_completed() {
                    return Err(RuntimeError::Stalled);
                }
            }
            Step::Yielded(value) => {
                suspensions += 1;
                yields.push(value);
            }
            Step::Complete(value) => {
                return Ok(Outcome {
                    result: Ok(value),
                    yields,
                    suspensions,
                });
            }
            Step::Faulted(exception) => {
                return Ok(Outcome {
                    result: Err(exception),
                    yields,
                    suspensions,
                });
            }
        }
    }
}

/// Run a generator, resuming each yield with the next value of `sends`
/// (unit once they run out).
pub fn collect_yields(
    machine: &mut StateMachine,
    sends: impl IntoIterator<Item = Value>,
) -> Result<Outcome> {
    if machine.kind() != SuspendKind::Yield {
        return Err(RuntimeError::WrongKind {
            kind: machine.kind().as_str(),
        });
    }
    let mut sends = sends.into_iter();
    let mut yields = Vec::new();
    let mut sent = Value::Unit;
    loop {
        let result = match machine.advance(sent)? {
            Step::Yielded(value) => {
                yields.push(value);
                sent = sends.next().unwrap_or_default();
                continue;
            }
            Step::Complete(value) => Ok(value),
            Step::Faulted(exception) => Err(exception),
            Step::Awaiting(_) => {
                return Err(RuntimeError::WrongKind {
                    kind: SuspendKind::Await.as_str(),
                });
            }
        };
        let suspensions = yields.len();
        return Ok(Outcome {
            result,
            yields,
            suspensions,
        });
    }
}

/// Start an await machine and keep resuming it from completion callbacks,
/// on whichever thread completes what it awaits.
///
/// The returned completion settles with the region's result.
pub fn drive(machine: StateMachine) -> Result<Completion> {
    if machine.kind() != SuspendKind::Await {
        return Err(RuntimeError::WrongKind {
            kind: machine.kind().as_str(),
        });
    }
    let result = Completion::new();
    step_driven(Arc::new(Mutex::new(machine)), result.clone());
    Ok(result)
}

fn step_driven(machine: Arc<Mutex<StateMachine>>, result: Completion) {
    loop {
        let step = machine.lock().advance(Value::Unit);
        let settled = match step {
            Ok(Step::Awaiting(completion)) => {
                let continuation = {
                    let machine = Arc::clone(&machine);
                    let result = result.clone();
                    Box::new(move || step_driven(machine, result))
                };
                match completion.on_completed(continuation) {
                    Registration::Registered => return,
                    // Completed between the check and the registration.
                    Registration::AlreadyCompleted(_) => continue,
                }
            }
            Ok(Step::Complete(value)) => result.complete(value),
            Ok(Step::Faulted(exception)) => result.fail(exception),
            Ok(Step::Yielded(_)) => result.fail(Exception::new(
                "RuntimeError",
                "an await region cannot yield",
            )),
            Err(error) => {
                warn!(%error, "driven machine failed");
                result.fail(Exception::new("RuntimeError", error.to_string()))
            }
        };
        if let Err(error) = settled {
            debug!(%error, "result already settled");
        }
        return;
    }
}

/// Evaluate a region without lowering it, running every suspension point
/// in place. Awaited operands must already be complete.
///
/// This is the reference semantics a lowered machine is compared against.
pub fn run_direct(region: &Expr, host: &Host) -> Result<Outcome> {
    let Expr::Resumable { kind, body } = region else {
        return Err(LoweringError::NotARegion.into());
    };
    let mut slots = Slots::default();
    let mut eval = Evaluator::direct(&mut slots, host);
    let result = match eval.evaluate(body) {
        Ok(value) | Err(Signal::Return(value)) => Ok(value),
        Err(Signal::Throw(exception)) => Err(exception),
        Err(Signal::Jump { label, .. }) => {
            return Err(RuntimeError::UnknownLabel {
                label: format!("L{}", label.0),
            });
        }
        Err(Signal::Fault(error)) => return Err(error),
    };
    // Generators complete without a value.
    let result = match kind {
        SuspendKind::Await => result,
        SuspendKind::Yield => result.map(|_| Value::Unit),
    };
    Ok(Outcome {
        result,
        yields: eval.take_yields(),
        suspensions: 0,
    })
}

#[cfg(test)]
#[path = "../tests/driver.rs"]
mod tests;
