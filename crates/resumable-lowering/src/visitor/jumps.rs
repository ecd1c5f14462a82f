//! Loops, labels and jumps.

use resumable_ast::{Expr, GotoKind, LabelTarget, ValueType};

use super::{LoweringContext, LoweringVisitor, ValueUse};
use crate::error::{LoweringError, Result};
use crate::graph::{StateResult, Transition};
use crate::resolver::JumpTarget;

impl LoweringVisitor {
    /// A loop becomes a body-start node with a back edge and a join node
    /// reached through the break label.
    pub(super) fn lower_loop(
        &mut self,
        body: &Expr,
        break_label: Option<&LabelTarget>,
        continue_label: Option<&LabelTarget>,
        use_: ValueUse,
        ctx: &mut LoweringContext,
    ) -> Result<Expr> {
        let scope = ctx.scope();
        let join = self.graph.add_node(scope);
        let start = self.graph.add_node(scope);
        let slot = self.join_slot(join, use_);
        if let Some(slot) = &slot {
            self.emit_assign(ctx, slot, Expr::unit());
        }

        if let Some(label) = break_label {
            self.resolver.redirect(
                label.id,
                JumpTarget {
                    state: join,
                    result: slot.clone(),
                },
            );
            self.labels.placed.insert(label.id);
        }
        if let Some(label) = continue_label {
            self.resolver.redirect(
                label.id,
                JumpTarget {
                    state: start,
                    result: None,
                },
            );
            self.labels.placed.insert(label.id);
        }

        self.graph.set_transition(
            ctx.tail(),
            Transition::Loop {
                body: start,
                break_target: join,
                continue_target: start,
            },
        );
        ctx.set_tail(start);
        let value = self.lower(body, ValueUse::Discard, ctx)?;
        self.emit(ctx, value);
        self.close(ctx, start);

        ctx.set_tail(join);
        Ok(Self::join_value(slot))
    }

    /// A jump ends the tail. Whatever follows it in the source is lowered
    /// into a fresh, unreachable node.
    pub(super) fn lower_goto(
        &mut self,
        target: &LabelTarget,
        kind: GotoKind,
        value: Option<&Expr>,
        ctx: &mut LoweringContext,
    ) -> Result<Expr> {
        let value = value
            .map(|value| self.lower(value, ValueUse::Needed, ctx))
            .transpose()?;

        let (destination, slot) = if kind == GotoKind::Return {
            (
                self.resolver.final_node(),
                self.resolver.final_result().cloned(),
            )
        } else {
            let state = self.label_node(target, ctx);
            let existing = self
                .resolver
                .jump_target(target.id)
                .and_then(|jump| jump.result.clone());
            let slot = match existing {
                Some(slot) => Some(slot),
                None if value.is_some() => {
                    let slot = self.resolver.synthesize("__join", state, ValueType::Any);
                    self.resolver.set_jump_result(target.id, slot.clone());
                    self.graph.set_result(state, StateResult::slot(slot.clone()));
                    Some(slot)
                }
                None => None,
            };
            (state, slot)
        };

        match (slot, value) {
            (Some(slot), Some(value)) => self.emit_assign(ctx, &slot, value),
            (Some(slot), None) if kind == GotoKind::Return => {
                self.emit_assign(ctx, &slot, Expr::unit());
            }
            (_, Some(value)) => self.emit(ctx, value),
            _ => {}
        }
        self.jump(ctx, destination);
        self.open_unreachable(ctx);
        Ok(Expr::unit())
    }

    /// A label placed in a lowered block starts a new node. The fallthrough
    /// path evaluates `default` and writes it to the label's result slot, so
    /// jumps carrying a value and fallthrough agree on where the value lives.
    pub(super) fn lower_label(
        &mut self,
        target: &LabelTarget,
        default: Option<&Expr>,
        use_: ValueUse,
        ctx: &mut LoweringContext,
    ) -> Result<Expr> {
        let node = self.label_node(target, ctx);
        let scope = ctx.scope();
        if self.graph.node(node).scope != scope {
            if self.resolver.routed_under_finally(node) {
                return Err(LoweringError::UnsupportedJump {
                    label: target.to_string(),
                    reason: "a forward jump to it leaves a finally region",
                });
            }
            self.graph.move_node(node, scope);
        }
        self.labels.pending.shift_remove(&target.id);
        self.labels.placed.insert(target.id);

        let fallthrough = match default {
            Some(default) => self.lower(default, use_, ctx)?,
            None => Expr::unit(),
        };
        let existing = self
            .resolver
            .jump_target(target.id)
            .and_then(|jump| jump.result.clone());
        let slot = match existing {
            Some(slot) => Some(slot),
            None if use_.needed() => {
                let slot = self.resolver.synthesize("__join", node, ValueType::Any);
                self.resolver.set_jump_result(target.id, slot.clone());
                Some(slot)
            }
            None => None,
        };
        match &slot {
            Some(slot) => {
                self.graph.set_result(node, StateResult::slot(slot.clone()));
                self.emit_assign(ctx, slot, fallthrough);
            }
            None => self.emit(ctx, fallthrough),
        }

        self.close(ctx, node);
        ctx.set_tail(node);
        Ok(Self::join_value(slot))
    }
}
