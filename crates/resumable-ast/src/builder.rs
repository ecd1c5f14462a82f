//! Fresh identity allocation for hand-built trees.
//!
//! Front ends that already own variable and label identities can build
//! `Expr` directly. Tests and tools use `AstBuilder` so that every variable
//! and label gets a distinct id.

use crate::expr::ValueType;
use crate::ids::{LabelId, LabelTarget, VarId, Variable};

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_var: u32,
    next_label: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a variable with a fresh id.
    pub fn variable(&mut self, name: impl Into<String>, ty: ValueType) -> Variable {
        let id = VarId(self.next_var);
        self.next_var += 1;
        Variable::new(id, name, ty)
    }

    /// Allocate an `Int` variable.
    pub fn int_var(&mut self, name: impl Into<String>) -> Variable {
        self.variable(name, ValueType::Int)
    }

    /// Allocate a named label with a fresh id.
    pub fn label(&mut self, name: impl Into<String>) -> LabelTarget {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        LabelTarget::named(id, name)
    }
}
