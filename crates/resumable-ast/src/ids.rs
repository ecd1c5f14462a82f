//! Variable and label identities.
//!
//! Identity is carried by the numeric id; names are for display only. Two
//! `Variable`s with the same name but different ids are different variables,
//! and the same `Variable` may be declared by more than one block.

use serde::{Deserialize, Serialize};

use crate::expr::ValueType;

/// Identity of a variable (source local or hoisted slot).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VarId(pub u32);

/// Identity of a jump label (source label or synthesized state label).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LabelId(pub u32);

/// A variable reference or declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    #[serde(default)]
    pub ty: ValueType,
}

impl Variable {
    pub fn new(id: VarId, name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            id,
            name: name.into(),
            ty,
        }
    }
}

/// A jump target. `Goto` and `Label` nodes refer to it by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelTarget {
    pub id: LabelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LabelTarget {
    pub const fn new(id: LabelId) -> Self {
        Self { id, name: None }
    }

    pub fn named(id: LabelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }
}

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl std::fmt::Display for LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}
