//! Try regions.
//!
//! A try that contains a suspension point opens a nested scope holding the
//! protected body and every catch handler. The node before the try carries
//! the `TryCatchFinally` transition and resets the region's discriminator.
//! Control leaves the nested scope through the finally node (when present)
//! and meets at a join node in the parent scope.
//!
//! Jumps out of the region while a finally block is pending are routed
//! through the finally node, which dispatches on the region's leave slot
//! once it completes.

use resumable_ast::{CatchHandler, Expr, ValueType, Variable};

use super::{LoweringContext, LoweringVisitor, ValueUse};
use crate::error::Result;
use crate::graph::{
    CatchTarget, PENDING_RETHROW, StateId, SwitchTarget, Transition, TryTransition,
};
use crate::resolver::{FinallyFrame, leave_code};

impl LoweringVisitor {
    pub(super) fn lower_try(
        &mut self,
        body: &Expr,
        handlers: &[CatchHandler],
        finally: Option<&Expr>,
        use_: ValueUse,
        ctx: &mut LoweringContext,
    ) -> Result<Expr> {
        let parent = ctx.scope();
        let owner = ctx.tail();
        let join = self.graph.add_node(parent);
        let slot = self.join_slot(join, use_);

        let nested = self
            .graph
            .add_scope(parent, format!("try@{}", owner.0));
        let discriminator_var = self
            .resolver
            .synthesize("__try", owner, ValueType::Int);
        let exception_var = self.resolver.synthesize("__ex", owner, ValueType::Any);
        self.emit_assign(ctx, &discriminator_var, Expr::int(0));

        let finally_node = finally.map(|_| self.graph.add_node(parent));
        let exit = finally_node.unwrap_or(join);
        if let Some(finally_node) = finally_node {
            self.resolver
                .push_finally(FinallyFrame::new(nested, owner, finally_node));
        }

        ctx.push_scope(nested);
        let try_node = self.graph.add_node(nested);
        let scope = self.graph.scope_mut(nested);
        scope.entry = Some(try_node);
        scope.owner = Some(owner);

        ctx.set_tail(try_node);
        self.lower_protected(body, slot.as_ref(), use_, ctx)?;
        self.close(ctx, exit);

        let mut catches = Vec::with_capacity(handlers.len());
        for (index, handler) in handlers.iter().enumerate() {
            let node = self.graph.add_node(nested);
            ctx.set_tail(node);
            self.resolver.push_scope();
            if let Some(variable) = &handler.variable {
                let bound = self.resolver.hoist(variable);
                self.emit_assign(ctx, &bound, Expr::var(&exception_var));
            }
            self.resolver.push_rethrow(Some(exception_var.clone()));
            self.lower_protected(&handler.body, slot.as_ref(), use_, ctx)?;
            self.resolver.pop_rethrow();
            self.resolver.pop_scope();
            self.close(ctx, exit);

            catches.push(CatchTarget {
                exception_type: handler.exception_type.clone(),
                target: node,
                discriminator: index as i64 + 1,
            });
        }
        ctx.pop_scope();

        let frame = finally_node.and_then(|_| self.resolver.pop_finally());
        self.graph.set_transition(
            owner,
            Transition::TryCatchFinally(Box::new(TryTransition {
                try_node,
                catches,
                finally_node,
                discriminator_var: discriminator_var.clone(),
                exception_var: exception_var.clone(),
                nested_scope: nested,
            })),
        );

        if let (Some(finally), Some(finally_node)) = (finally, finally_node) {
            ctx.set_tail(finally_node);
            let value = self.lower(finally, ValueUse::Discard, ctx)?;
            self.emit(ctx, value);
            self.emit(
                ctx,
                Expr::if_then(
                    Expr::eq(Expr::var(&discriminator_var), Expr::int(PENDING_RETHROW)),
                    Expr::throw(Expr::var(&exception_var)),
                ),
            );
            match frame {
                Some(FinallyFrame {
                    leave_var: Some(leave_var),
                    targets,
                    ..
                }) => {
                    // Reset before the region runs; the owner's body is
                    // closed but still executes ahead of its transition.
                    self.graph
                        .push_expression(owner, Expr::assign(&leave_var, Expr::int(0)));
                    let from = ctx.tail();
                    let mut cases = Vec::with_capacity(targets.len());
                    for target in targets {
                        let landing = self.leave_landing(target, ctx);
                        cases.push(SwitchTarget {
                            test_values: vec![Expr::int(leave_code(target))],
                            target: landing,
                        });
                    }
                    self.graph.set_transition(
                        from,
                        Transition::Switch {
                            value: Expr::var(&leave_var),
                            cases,
                            default: join,
                        },
                    );
                }
                _ => self.close(ctx, join),
            }
        }

        ctx.set_tail(join);
        Ok(Self::join_value(slot))
    }

    /// Lower a protected body or handler, writing its value to the join slot.
    fn lower_protected(
        &mut self,
        body: &Expr,
        slot: Option<&Variable>,
        use_: ValueUse,
        ctx: &mut LoweringContext,
    ) -> Result<()> {
        let value = self.lower(body, use_, ctx)?;
        match slot {
            Some(slot) => self.emit_assign(ctx, slot, value),
            None => self.emit(ctx, value),
        }
        Ok(())
    }

    /// Where a finally node continues a pending jump to `target`: the target
    /// itself, or a trampoline that keeps routing through outer finally
    /// nodes.
    fn leave_landing(&mut self, target: StateId, ctx: &LoweringContext) -> StateId {
        let route = self.resolver.route_jump(&self.graph, target);
        if route.prelude.is_empty() {
            return route.target;
        }
        let trampoline = self.graph.add_node(ctx.scope());
        for expr in route.prelude {
            self.graph.push_expression(trampoline, expr);
        }
        self.graph
            .set_transition(trampoline, Transition::goto(route.target));
        trampoline
    }
}
