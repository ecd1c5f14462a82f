//! Structural analysis of expression trees.
//!
//! The lowering visitor only flattens subtrees that contain a suspension
//! point of the region's flavor. These queries answer that question, and
//! report nested regions, without descending into nested `Resumable`
//! bodies (each region owns its own suspension points).

use bitflags::bitflags;

use crate::expr::{Expr, GotoKind, SuspendKind};
use crate::ids::{LabelId, VarId};

bitflags! {
    /// Facts about a subtree, accumulated bottom-up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SuspendFacts: u8 {
        /// An `await` outside any nested region.
        const AWAIT = 1 << 0;
        /// A `yield` outside any nested region.
        const YIELD = 1 << 1;
        /// A nested await region that itself suspends.
        const NESTED_AWAIT_REGION = 1 << 2;
        /// A nested yield region that itself suspends.
        const NESTED_YIELD_REGION = 1 << 3;
        /// A `Goto` of kind `Return`.
        const RETURN = 1 << 4;
        /// A `Label` node.
        const LABEL = 1 << 5;
    }
}

impl SuspendFacts {
    pub const fn suspend(kind: SuspendKind) -> Self {
        match kind {
            SuspendKind::Await => Self::AWAIT,
            SuspendKind::Yield => Self::YIELD,
        }
    }

    pub const fn nested_region(kind: SuspendKind) -> Self {
        match kind {
            SuspendKind::Await => Self::NESTED_AWAIT_REGION,
            SuspendKind::Yield => Self::NESTED_YIELD_REGION,
        }
    }
}

impl Expr {
    /// Facts about this subtree.
    pub fn suspend_facts(&self) -> SuspendFacts {
        let mut facts = SuspendFacts::empty();
        self.walk(&mut |node| match node {
            Self::Suspend { kind, .. } => {
                facts |= SuspendFacts::suspend(*kind);
                true
            }
            Self::Goto {
                kind: GotoKind::Return,
                ..
            } => {
                facts |= SuspendFacts::RETURN;
                true
            }
            Self::Label { .. } => {
                facts |= SuspendFacts::LABEL;
                true
            }
            Self::Resumable { kind, body } => {
                if body.contains_suspend(*kind) {
                    facts |= SuspendFacts::nested_region(*kind);
                }
                false
            }
            _ => true,
        });
        facts
    }

    /// Whether this subtree contains a suspension point of `kind` that
    /// belongs to the enclosing region.
    pub fn contains_suspend(&self, kind: SuspendKind) -> bool {
        match self {
            Self::Suspend { kind: own, .. } if *own == kind => true,
            Self::Resumable { .. } => false,
            _ => self
                .children()
                .into_iter()
                .any(|child| child.contains_suspend(kind)),
        }
    }

    /// Number of suspension points of `kind` that belong to the enclosing
    /// region.
    pub fn count_suspends(&self, kind: SuspendKind) -> usize {
        let mut count = 0;
        self.walk(&mut |node| match node {
            Self::Suspend { kind: own, .. } => {
                if *own == kind {
                    count += 1;
                }
                true
            }
            Self::Resumable { .. } => false,
            _ => true,
        });
        count
    }

    /// Largest variable id mentioned anywhere in the tree, nested regions
    /// included.
    pub fn max_var_id(&self) -> Option<VarId> {
        let mut max: Option<VarId> = None;
        let mut note = |id: VarId| {
            if max.is_none_or(|current| id > current) {
                max = Some(id);
            }
        };
        self.walk(&mut |node| {
            match node {
                Self::Variable(variable) => note(variable.id),
                Self::Assign { target, .. } => note(target.id),
                Self::Block { vars, .. } => vars.iter().for_each(|var| note(var.id)),
                Self::Try { handlers, .. } => handlers
                    .iter()
                    .filter_map(|handler| handler.variable.as_ref())
                    .for_each(|var| note(var.id)),
                _ => {}
            }
            true
        });
        max
    }

    /// Largest label id mentioned anywhere in the tree, nested regions
    /// included.
    pub fn max_label_id(&self) -> Option<LabelId> {
        let mut max: Option<LabelId> = None;
        let mut note = |id: LabelId| {
            if max.is_none_or(|current| id > current) {
                max = Some(id);
            }
        };
        self.walk(&mut |node| {
            match node {
                Self::Goto { target, .. } | Self::Label { target, .. } => note(target.id),
                Self::Loop {
                    break_label,
                    continue_label,
                    ..
                } => {
                    for label in [break_label, continue_label].into_iter().flatten() {
                        note(label.id);
                    }
                }
                _ => {}
            }
            true
        });
        max
    }
}

#[cfg(test)]
#[path = "../tests/analysis.rs"]
mod tests;
