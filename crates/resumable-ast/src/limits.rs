//! Centralized limits shared by the lowering engine and the reference runtime.

/// Maximum expression nesting depth the lowering visitor descends into.
///
/// Each nested construct adds a frame to the visitor's call stack. Deeper
/// inputs fail with a lowering error instead of overflowing the stack.
pub const MAX_LOWERING_DEPTH: u32 = 500;

/// Maximum expression nesting depth the reference evaluator descends into.
pub const MAX_EVAL_DEPTH: u32 = 1000;

/// Maximum number of state transitions a single `advance` call may take
/// before the reference runtime reports a runaway machine.
pub const MAX_TRANSITIONS_PER_ADVANCE: u32 = 1_000_000;
