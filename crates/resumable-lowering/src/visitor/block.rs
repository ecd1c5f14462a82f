//! Blocks: hoisted locals and sequential children.

use resumable_ast::{Expr, Variable};

use super::{LoweringContext, LoweringVisitor, ValueUse};
use crate::error::Result;

impl LoweringVisitor {
    /// Lower a block that contains a suspension point.
    ///
    /// Its locals become machine slots, reset to unit on entry. Labels among
    /// its direct children get their nodes up front so that earlier siblings
    /// can jump forward to them. Only the last child's value is kept.
    pub(super) fn lower_block(
        &mut self,
        vars: &[Variable],
        body: &[Expr],
        use_: ValueUse,
        ctx: &mut LoweringContext,
    ) -> Result<Expr> {
        self.resolver.push_scope();
        for var in vars {
            let slot = self.resolver.hoist(var);
            self.emit_assign(ctx, &slot, Expr::unit());
        }
        for child in body {
            if let Expr::Label { target, .. } = child {
                self.label_node(target, ctx);
            }
        }

        let mut value = Expr::unit();
        let last = body.len().saturating_sub(1);
        for (index, child) in body.iter().enumerate() {
            let child_use = if index == last {
                use_
            } else {
                ValueUse::Discard
            };
            let lowered = self.lower(child, child_use, ctx)?;
            if index == last {
                value = lowered;
            } else {
                self.emit(ctx, lowered);
            }
        }

        self.resolver.pop_scope();
        Ok(value)
    }
}
