//! Runtime failures.
//!
//! These are faults of the machine or its host, not user exceptions: a
//! `throw` in the program is a `Value`, unwound through the machine's try
//! regions, and only reported as `Step::Faulted` when nothing catches it.

use thiserror::Error;

use resumable_lowering::{LoweringError, StateId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Lowering(#[from] LoweringError),

    #[error("the machine has already finished")]
    Finished,

    #[error("resumed at {state} before the awaited operation completed")]
    NotCompleted { state: StateId },

    #[error("no dispatch route for persisted state {state}")]
    UnknownState { state: StateId },

    #[error("state {state} has no transition")]
    MissingTransition { state: StateId },

    #[error("jump to unknown label `{label}`")]
    UnknownLabel { label: String },

    #[error("read of unbound variable `{name}`")]
    UnboundVariable { name: String },

    #[error("call to unknown host function `{name}`")]
    UnknownFunction { name: String },

    #[error("return outside of the region that owns it")]
    StrayReturn,

    #[error("rethrow outside of a catch handler")]
    RethrowOutsideHandler,

    #[error("a suspension point cannot be evaluated here")]
    UnexpectedSuspend,

    #[error("nested {kind} regions are not evaluated by the reference runtime")]
    NestedRegion { kind: &'static str },

    #[error("evaluation nesting exceeds the limit of {limit}")]
    DepthExceeded { limit: u32 },

    #[error("more than {limit} steps without suspending")]
    Runaway { limit: u32 },

    #[error("awaiting an operation nothing will complete")]
    Stalled,

    #[error("the completion has already been completed")]
    AlreadyCompleted,

    #[error("a {kind} region cannot be driven this way")]
    WrongKind { kind: &'static str },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
