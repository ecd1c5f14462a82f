//! Exception-handling scopes.
//!
//! The root scope holds the region's top level. Each lowered try region opens
//! a nested scope containing its protected body and catch handlers; the
//! finally node and the join stay in the parent. Resuming into a suspension
//! point inside a nested scope must first re-enter the scope's try region,
//! which is why every scope records the jump cases of its own suspension
//! points.

use serde::{Deserialize, Serialize};

use resumable_ast::LabelTarget;

use super::state::StateId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const ROOT: Self = Self(0);

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A resumption entry registered by a suspension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpCase {
    pub resume_label: LabelTarget,
    /// Resume node; its id is the persisted discriminator value.
    pub state_id: StateId,
    /// Node whose transition suspends.
    pub suspend_node: StateId,
    /// Try entry owning the scope, absent at the root.
    pub enclosing: Option<StateId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub id: ScopeId,
    pub name: String,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// First node of the scope; nested scopes enter here from their try
    /// transition.
    pub entry: Option<StateId>,
    /// Node carrying the `TryCatchFinally` transition that opened the scope.
    pub owner: Option<StateId>,
    /// Member nodes, in output order once optimized.
    pub nodes: Vec<StateId>,
    pub jump_cases: Vec<JumpCase>,
}

impl Scope {
    pub(crate) fn new(id: ScopeId, name: impl Into<String>, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            children: Vec::new(),
            entry: None,
            owner: None,
            nodes: Vec::new(),
            jump_cases: Vec::new(),
        }
    }

    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
