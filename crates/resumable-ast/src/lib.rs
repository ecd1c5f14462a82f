//! Input expression tree for the resumable lowering engine.
//!
//! This crate defines the closed set of node kinds the lowering engine accepts:
//! - Identities (`VarId`, `LabelId`) and their carriers (`Variable`, `LabelTarget`)
//! - The expression tree itself (`Expr`) with builder helpers
//! - `AstBuilder` for allocating fresh variables and labels
//! - Structural analysis (`SuspendFacts`, suspend counting, id scans)
//! - A compact `Display` rendering used by graph printers and diagnostics
//! - Recursion limits shared by the lowering engine and the reference runtime

// Identities for variables and labels
pub mod ids;
pub use ids::{LabelId, LabelTarget, VarId, Variable};

// Expression tree
pub mod expr;
pub use expr::{
    CatchHandler, Constant, Expr, GotoKind, Operator, SuspendKind, SwitchCase, ValueType,
};

// Child traversal
pub mod visit;

// Fresh id allocation for hand-built trees
pub mod builder;
pub use builder::AstBuilder;

// Structural analysis used by the lowering pre-check
pub mod analysis;
pub use analysis::SuspendFacts;

// Compact textual rendering
mod display;

// Centralized limits
pub mod limits;
