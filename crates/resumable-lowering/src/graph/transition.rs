//! The closed set of control transitions that end a state node.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use resumable_ast::{Expr, LabelTarget, SuspendKind, Variable};

use super::scope::ScopeId;
use super::state::StateId;

/// Successor list of a single transition.
pub type Successors = SmallVec<[StateId; 4]>;

/// A `switch` arm: any matching test value selects `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchTarget {
    pub test_values: Vec<Expr>,
    pub target: StateId,
}

/// A catch arm of a lowered try region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchTarget {
    /// `None` catches every exception.
    pub exception_type: Option<String>,
    pub target: StateId,
    /// Value written to the try discriminator while this handler runs.
    pub discriminator: i64,
}

/// Entry of a lowered try region.
///
/// The discriminator slot protocol: `0` while the protected body runs, the
/// catch's `discriminator` (1-based) while a handler runs, and `-1` when the
/// finally node is entered with an exception that must be rethrown after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryTransition {
    pub try_node: StateId,
    pub catches: Vec<CatchTarget>,
    pub finally_node: Option<StateId>,
    pub discriminator_var: Variable,
    pub exception_var: Variable,
    /// Scope holding the protected body and the catch handlers.
    pub nested_scope: ScopeId,
}

/// Discriminator value marking a pending rethrow after the finally node.
pub const PENDING_RETHROW: i64 = -1;

/// A suspension point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendTransition {
    pub operand: Expr,
    /// Label of the resume node; the dispatch table routes to it.
    pub resume_label: LabelTarget,
    /// Slot holding the awaitable (await) or the produced value (yield).
    pub handle_var: Variable,
    /// Slot receiving the resumption value, absent for unit results.
    pub result_var: Option<Variable>,
    pub join_node: StateId,
    pub kind: SuspendKind,
}

/// How control leaves a state node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Goto {
        target: StateId,
    },
    Conditional {
        test: Expr,
        if_true: StateId,
        if_false: StateId,
    },
    Switch {
        value: Expr,
        cases: Vec<SwitchTarget>,
        default: StateId,
    },
    TryCatchFinally(Box<TryTransition>),
    Loop {
        body: StateId,
        break_target: StateId,
        continue_target: StateId,
    },
    Suspend(Box<SuspendTransition>),
    Final,
}

impl Transition {
    pub const fn goto(target: StateId) -> Self {
        Self::Goto { target }
    }

    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Goto { .. } => "goto",
            Self::Conditional { .. } => "conditional",
            Self::Switch { .. } => "switch",
            Self::TryCatchFinally(_) => "try",
            Self::Loop { .. } => "loop",
            Self::Suspend(_) => "suspend",
            Self::Final => "final",
        }
    }

    /// Nodes control may reach directly from this transition.
    ///
    /// A loop's break target is listed even though the loop transition never
    /// jumps there itself; the body's break edges do, and keeping it here
    /// holds the join in place while the body is being optimized.
    pub fn successors(&self) -> Successors {
        let mut out = Successors::new();
        match self {
            Self::Goto { target } => out.push(*target),
            Self::Conditional {
                if_true, if_false, ..
            } => {
                out.push(*if_true);
                out.push(*if_false);
            }
            Self::Switch { cases, default, .. } => {
                out.extend(cases.iter().map(|case| case.target));
                out.push(*default);
            }
            Self::TryCatchFinally(region) => {
                out.push(region.try_node);
                out.extend(region.catches.iter().map(|catch| catch.target));
                out.extend(region.finally_node);
            }
            Self::Loop {
                body,
                break_target,
                continue_target,
            } => {
                out.push(*body);
                out.push(*break_target);
                out.push(*continue_target);
            }
            Self::Suspend(suspend) => out.push(suspend.join_node),
            Self::Final => {}
        }
        out
    }

    /// Rewrite every successor through `map`.
    pub fn retarget(&mut self, mut map: impl FnMut(StateId) -> StateId) {
        match self {
            Self::Goto { target } => *target = map(*target),
            Self::Conditional {
                if_true, if_false, ..
            } => {
                *if_true = map(*if_true);
                *if_false = map(*if_false);
            }
            Self::Switch { cases, default, .. } => {
                for case in cases {
                    case.target = map(case.target);
                }
                *default = map(*default);
            }
            Self::TryCatchFinally(region) => {
                region.try_node = map(region.try_node);
                for catch in &mut region.catches {
                    catch.target = map(catch.target);
                }
                region.finally_node = region.finally_node.map(&mut map);
            }
            Self::Loop {
                body,
                break_target,
                continue_target,
            } => {
                *body = map(*body);
                *break_target = map(*break_target);
                *continue_target = map(*continue_target);
            }
            Self::Suspend(suspend) => suspend.join_node = map(suspend.join_node),
            Self::Final => {}
        }
    }

    /// Expressions the transition evaluates itself.
    pub fn expressions(&self) -> SmallVec<[&Expr; 2]> {
        let mut out = SmallVec::new();
        match self {
            Self::Conditional { test, .. } => out.push(test),
            Self::Switch { value, cases, .. } => {
                out.push(value);
                out.extend(cases.iter().flat_map(|case| case.test_values.iter()));
            }
            Self::Suspend(suspend) => out.push(&suspend.operand),
            Self::Goto { .. } | Self::TryCatchFinally(_) | Self::Loop { .. } | Self::Final => {}
        }
        out
    }
}
