//! Lowering of await/yield regions into resumable state machines.
//!
//! This crate turns the body of a `Resumable` expression into:
//! - A state graph: flat nodes ending in one transition each, grouped into
//!   exception-handling scopes
//! - A set of hoisted slots for everything that must survive a suspension
//! - A per-scope dispatch table mapping persisted state ids to resume labels
//!
//! The pipeline is `visitor` (build) -> `optimizer` (merge, thread, order)
//! -> `jump_table` (dispatch). `lower` runs all three.

// Failure reporting
pub mod error;
pub use error::{LoweringError, LoweringErrorKind};

// Options
pub mod options;
pub use options::LoweringOptions;

// State graph model
pub mod graph;
pub use graph::{Scope, ScopeId, StateGraph, StateId, StateNode, Transition};

// Slot hoisting and jump redirection
pub mod resolver;

// Graph construction
pub mod visitor;

// Graph optimization
pub mod optimizer;

// Resumption dispatch
pub mod jump_table;
pub use jump_table::{DispatchTable, DispatchTarget, Route};

// Text rendering
pub mod printer;
pub use printer::GraphPrinter;

// Pipeline entry points
mod lowered;
pub use lowered::{LoweredMachine, lower, lower_body};
