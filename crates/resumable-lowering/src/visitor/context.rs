//! Traversal cursor threaded through the lowering descent.

use resumable_ast::SuspendKind;

use crate::error::{LoweringError, Result};
use crate::graph::{ScopeId, StateId};

/// Whether the caller consumes the value of the expression being lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueUse {
    Needed,
    Discard,
}

impl ValueUse {
    pub const fn needed(self) -> bool {
        matches!(self, Self::Needed)
    }
}

/// Mutable cursor of the recursive descent: the node currently receiving
/// expressions, the scope stack, and the nesting depth.
#[derive(Debug)]
pub struct LoweringContext {
    pub kind: SuspendKind,
    tail: StateId,
    scopes: Vec<ScopeId>,
    depth: u32,
    max_depth: u32,
}

impl LoweringContext {
    pub fn new(kind: SuspendKind, entry: StateId, max_depth: u32) -> Self {
        Self {
            kind,
            tail: entry,
            scopes: vec![ScopeId::ROOT],
            depth: 0,
            max_depth,
        }
    }

    /// The node currently receiving lowered expressions.
    pub const fn tail(&self) -> StateId {
        self.tail
    }

    pub fn set_tail(&mut self, tail: StateId) {
        self.tail = tail;
    }

    pub fn scope(&self) -> ScopeId {
        self.scopes.last().copied().unwrap_or(ScopeId::ROOT)
    }

    pub fn push_scope(&mut self, scope: ScopeId) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(LoweringError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
