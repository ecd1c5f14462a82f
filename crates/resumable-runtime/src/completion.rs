//! Completion source and the `Awaitable` contract.
//!
//! A `Completion` is shared between the producer that completes it and the
//! machine that awaits it, possibly on different threads. Checking for
//! completion and registering the continuation happen under one lock: a
//! continuation is either stored before completion can fire it, or handed
//! back as `AlreadyCompleted` for the caller to run. Continuations always
//! run outside the lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{Result, RuntimeError};
use crate::value::{Exception, Value};

/// Callback fired once when an awaitable completes.
pub type Continuation = Box<dyn FnOnce() + Send>;

/// Outcome of `Awaitable::on_completed`.
pub enum Registration {
    /// Stored; it fires when the awaitable completes.
    Registered,
    /// The awaitable was complete already; the caller owns the continuation.
    AlreadyCompleted(Continuation),
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => f.write_str("Registered"),
            Self::AlreadyCompleted(_) => f.write_str("AlreadyCompleted"),
        }
    }
}

/// Operations the generated code performs on an awaited operand.
pub trait Awaitable {
    fn is_completed(&self) -> bool;

    /// The produced result, once complete. Never blocks.
    fn result(&self) -> Option<std::result::Result<Value, Exception>>;

    /// Register the single continuation to fire on completion.
    fn on_completed(&self, continuation: Continuation) -> Registration;
}

enum State {
    Pending(Option<Continuation>),
    Done(std::result::Result<Value, Exception>),
}

struct Shared {
    state: Mutex<State>,
    done: Condvar,
}

#[derive(Clone)]
pub struct Completion {
    shared: Arc<Shared>,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    pub fn new() -> Self {
        Self::with_state(State::Pending(None))
    }

    /// Completion that already holds `value`.
    pub fn completed(value: Value) -> Self {
        Self::with_state(State::Done(Ok(value)))
    }

    /// Completion that already failed with `exception`.
    pub fn failed(exception: Exception) -> Self {
        Self::with_state(State::Done(Err(exception)))
    }

    fn with_state(state: State) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                done: Condvar::new(),
            }),
        }
    }

    pub fn complete(&self, value: Value) -> Result<()> {
        self.settle(Ok(value))
    }

    pub fn fail(&self, exception: Exception) -> Result<()> {
        self.settle(Err(exception))
    }

    fn settle(&self, outcome: std::result::Result<Value, Exception>) -> Result<()> {
        let continuation = {
            let mut state = self.shared.state.lock();
            let State::Pending(continuation) = &mut *state else {
                return Err(RuntimeError::AlreadyCompleted);
            };
            let continuation = continuation.take();
            *state = State::Done(outcome);
            continuation
        };
        self.shared.done.notify_all();
        if let Some(continuation) = continuation {
            trace!("firing continuation");
            continuation();
        }
        Ok(())
    }

    /// Block the calling thread until the completion settles.
    pub fn wait(&self) -> std::result::Result<Value, Exception> {
        let mut state = self.shared.state.lock();
        loop {
            if let State::Done(outcome) = &*state {
                return outcome.clone();
            }
            self.shared.done.wait(&mut state);
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Awaitable for Completion {
    fn is_completed(&self) -> bool {
        matches!(&*self.shared.state.lock(), State::Done(_))
    }

    fn result(&self) -> Option<std::result::Result<Value, Exception>> {
        match &*self.shared.state.lock() {
            State::Done(outcome) => Some(outcome.clone()),
            State::Pending(_) => None,
        }
    }

    fn on_completed(&self, continuation: Continuation) -> Registration {
        let mut state = self.shared.state.lock();
        match &mut *state {
            State::Pending(slot) => {
                debug_assert!(slot.is_none(), "a completion takes one continuation");
                *slot = Some(continuation);
                Registration::Registered
            }
            State::Done(_) => Registration::AlreadyCompleted(continuation),
        }
    }
}

impl PartialEq for Completion {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.shared.state.lock() {
            State::Pending(_) => f.write_str("Completion(pending)"),
            State::Done(Ok(value)) => write!(f, "Completion({value:?})"),
            State::Done(Err(exception)) => write!(f, "Completion(failed: {exception})"),
        }
    }
}

#[cfg(test)]
#[path = "../tests/completion.rs"]
mod tests;
