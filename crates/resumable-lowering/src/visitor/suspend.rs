//! Suspension points and operand spilling.

use resumable_ast::{Expr, SuspendKind, ValueType};

use super::{LoweringContext, LoweringVisitor, ValueUse};
use crate::error::Result;
use crate::graph::{JumpCase, StateResult, SuspendTransition, Transition};

impl LoweringVisitor {
    /// Split the tail at a suspension point.
    ///
    /// The tail ends with a `Suspend` transition; the resume node becomes the
    /// new tail and is registered as a jump case of the current scope, so a
    /// resumption can find its way back into nested try regions.
    pub(super) fn lower_suspend(
        &mut self,
        operand: &Expr,
        result_type: ValueType,
        ctx: &mut LoweringContext,
    ) -> Result<Expr> {
        let operand = self.lower(operand, ValueUse::Needed, ctx)?;
        let from = ctx.tail();
        let scope = ctx.scope();
        let join = self.graph.add_node(scope);

        let handle_prefix = match self.kind {
            SuspendKind::Await => "__awaiter",
            SuspendKind::Yield => "__yielded",
        };
        let handle_var = self.resolver.synthesize(handle_prefix, from, ValueType::Any);
        let result_var = (result_type != ValueType::Unit)
            .then(|| self.resolver.synthesize("__result", from, result_type));
        if let Some(result) = &result_var {
            self.graph.set_result(join, StateResult::slot(result.clone()));
        }

        let resume_label = self.graph.node(join).label.clone();
        let enclosing = self.graph.scope(scope).owner;
        self.graph.register_jump_case(
            scope,
            JumpCase {
                resume_label: resume_label.clone(),
                state_id: join,
                suspend_node: from,
                enclosing,
            },
        );
        self.graph.set_transition(
            from,
            Transition::Suspend(Box::new(SuspendTransition {
                operand,
                resume_label,
                handle_var,
                result_var: result_var.clone(),
                join_node: join,
                kind: self.kind,
            })),
        );

        ctx.set_tail(join);
        Ok(result_var.map_or_else(Expr::unit, Expr::Variable))
    }

    /// Lower operands left to right.
    ///
    /// Values computed before the last suspending operand would be lost (or
    /// re-read after a later side effect) across the suspension, so each one
    /// that is not a constant is parked in an `__operand` slot first.
    pub(super) fn lower_operands(
        &mut self,
        operands: &[&Expr],
        ctx: &mut LoweringContext,
    ) -> Result<Vec<Expr>> {
        let last_suspending = operands
            .iter()
            .rposition(|operand| operand.contains_suspend(self.kind));
        let mut lowered = Vec::with_capacity(operands.len());
        for (index, operand) in operands.iter().enumerate() {
            let value = self.lower(operand, ValueUse::Needed, ctx)?;
            let spill = last_suspending.is_some_and(|last| index < last)
                && !matches!(value, Expr::Literal(_));
            if spill {
                let slot = self
                    .resolver
                    .synthesize("__operand", ctx.tail(), ValueType::Any);
                self.emit_assign(ctx, &slot, value);
                lowered.push(Expr::Variable(slot));
            } else {
                lowered.push(value);
            }
        }
        Ok(lowered)
    }
}
