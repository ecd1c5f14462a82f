//! State nodes: the flattened basic blocks of a lowered region.

use serde::{Deserialize, Serialize};

use resumable_ast::{Expr, LabelTarget, Variable};

use super::scope::ScopeId;
use super::transition::Transition;

/// Stable identity of a state node. Assigned at creation and never reused;
/// it is also the value persisted in the state discriminator on suspension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StateId(pub u32);

impl StateId {
    /// Discriminator value stored while suspended at this state.
    pub const fn discriminator(self) -> i64 {
        self.0 as i64
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Value carried into a join point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateResult {
    /// Slot every incoming branch writes before reaching this node.
    pub variable: Option<Variable>,
    /// Value the node produces when it has no slot of its own.
    pub value: Option<Expr>,
}

impl StateResult {
    pub const fn slot(variable: Variable) -> Self {
        Self {
            variable: Some(variable),
            value: None,
        }
    }
}

/// One flattened basic block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateNode {
    pub id: StateId,
    /// Output position; assigned by the optimizer (creation order otherwise).
    pub order: u32,
    pub label: LabelTarget,
    pub scope: ScopeId,
    /// Lowered body. No expression here contains a suspension point.
    pub expressions: Vec<Expr>,
    pub transition: Option<Transition>,
    pub result: Option<StateResult>,
}

impl StateNode {
    pub(crate) const fn new(id: StateId, label: LabelTarget, scope: ScopeId) -> Self {
        Self {
            id,
            order: id.0,
            label,
            scope,
            expressions: Vec::new(),
            transition: None,
            result: None,
        }
    }

    pub const fn is_final(&self) -> bool {
        matches!(self.transition, Some(Transition::Final))
    }

    /// Target of a plain `Goto`, the edge the optimizer treats as fallthrough.
    pub fn fallthrough(&self) -> Option<StateId> {
        match self.transition {
            Some(Transition::Goto { target }) => Some(target),
            _ => None,
        }
    }
}
