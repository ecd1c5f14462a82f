//! Child traversal over `Expr`.
//!
//! Children are listed in evaluation order, which is also the order the
//! lowering visitor descends in.

use smallvec::SmallVec;

use crate::expr::Expr;

/// Inline capacity covers every fixed-arity node kind.
pub type Children<'a> = SmallVec<[&'a Expr; 4]>;

impl Expr {
    /// Direct children in evaluation order.
    pub fn children(&self) -> Children<'_> {
        let mut out = Children::new();
        match self {
            Self::Literal(_) | Self::Variable(_) => {}
            Self::Assign { value, .. } => out.push(value),
            Self::Op { operands, .. } => out.extend(operands.iter()),
            Self::Block { body, .. } => out.extend(body.iter()),
            Self::Conditional {
                test,
                if_true,
                if_false,
            } => {
                out.push(test);
                out.push(if_true);
                if let Some(if_false) = if_false {
                    out.push(if_false);
                }
            }
            Self::Switch {
                value,
                cases,
                default,
            } => {
                out.push(value);
                for case in cases {
                    out.extend(case.test_values.iter());
                    out.push(&case.body);
                }
                if let Some(default) = default {
                    out.push(default);
                }
            }
            Self::Try {
                body,
                handlers,
                finally,
            } => {
                out.push(body);
                out.extend(handlers.iter().map(|handler| &handler.body));
                if let Some(finally) = finally {
                    out.push(finally);
                }
            }
            Self::Loop { body, .. } => out.push(body),
            Self::Goto { value, .. } => {
                if let Some(value) = value {
                    out.push(value);
                }
            }
            Self::Label { default, .. } => {
                if let Some(default) = default {
                    out.push(default);
                }
            }
            Self::Throw(operand) => {
                if let Some(operand) = operand {
                    out.push(operand);
                }
            }
            Self::Suspend { operand, .. } => out.push(operand),
            Self::Resumable { body, .. } => out.push(body),
        }
        out
    }

    /// Pre-order walk. `visit` returns `false` to skip a node's children.
    pub fn walk(&self, visit: &mut impl FnMut(&Expr) -> bool) {
        if visit(self) {
            for child in self.children() {
                child.walk(visit);
            }
        }
    }
}
