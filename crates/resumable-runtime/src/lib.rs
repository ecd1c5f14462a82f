//! Reference runtime for lowered resumable regions.
//!
//! A backend turns a `LoweredMachine` into native code; this crate instead
//! interprets it directly, which makes the lowering observable in tests:
//! - `Value` and `Exception`: the runtime's dynamic values
//! - `Completion`: a thread-safe completion source implementing `Awaitable`
//! - `Host`: named host functions reachable through `Op::Call`
//! - `Evaluator`: evaluates node bodies (and whole trees, for comparison)
//! - `StateMachine`: the slot record, its discriminator and `advance()`
//! - Drivers that run a machine to completion, collect yields, or resume it
//!   from completion callbacks

// Failure reporting
pub mod error;
pub use error::RuntimeError;

// Dynamic values
pub mod value;
pub use value::{Exception, Value};

// Awaitable primitive
pub mod completion;
pub use completion::{Awaitable, Completion, Continuation, Registration};

// Host functions
pub mod host;
pub use host::Host;

// Expression evaluation
pub mod eval;
pub use eval::{Evaluator, Signal};

// Machine record and advance
pub mod machine;
pub use machine::{StateMachine, Step};

// Drivers
pub mod driver;
pub use driver::{Outcome, collect_yields, drive, run_direct, run_to_completion};
