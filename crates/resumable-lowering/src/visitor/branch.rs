//! Conditionals and switches.
//!
//! When only the test (or switched value) suspends, the branch is rebuilt
//! verbatim around the lowered test. When a branch body suspends, each arm
//! gets its own node and all arms meet at a join node whose result slot
//! carries the chosen arm's value.

use resumable_ast::{Expr, SwitchCase, Variable};

use super::{LoweringContext, LoweringVisitor, ValueUse};
use crate::error::Result;
use crate::graph::{StateId, SwitchTarget, Transition};

impl LoweringVisitor {
    pub(super) fn lower_conditional(
        &mut self,
        test: &Expr,
        if_true: &Expr,
        if_false: Option<&Expr>,
        use_: ValueUse,
        ctx: &mut LoweringContext,
    ) -> Result<Expr> {
        let test = self.lower(test, ValueUse::Needed, ctx)?;
        let arms_suspend = if_true.contains_suspend(self.kind)
            || if_false.is_some_and(|arm| arm.contains_suspend(self.kind));
        if !arms_suspend {
            return Ok(Expr::Conditional {
                test: Box::new(test),
                if_true: Box::new(self.resolve(if_true)),
                if_false: if_false.map(|arm| Box::new(self.resolve(arm))),
            });
        }

        let from = ctx.tail();
        let join = self.graph.add_node(ctx.scope());
        let slot = self.join_slot(join, use_);

        let on_true = self.lower_arm(if_true, join, slot.as_ref(), ctx)?;
        let on_false = match if_false {
            Some(arm) => self.lower_arm(arm, join, slot.as_ref(), ctx)?,
            None if slot.is_none() => join,
            None => self.lower_arm(&Expr::unit(), join, slot.as_ref(), ctx)?,
        };

        self.graph.set_transition(
            from,
            Transition::Conditional {
                test,
                if_true: on_true,
                if_false: on_false,
            },
        );
        ctx.set_tail(join);
        Ok(Self::join_value(slot))
    }

    pub(super) fn lower_switch(
        &mut self,
        value: &Expr,
        cases: &[SwitchCase],
        default: Option<&Expr>,
        use_: ValueUse,
        ctx: &mut LoweringContext,
    ) -> Result<Expr> {
        let mut operands = vec![value];
        operands.extend(cases.iter().flat_map(|case| case.test_values.iter()));
        let mut lowered = self.lower_operands(&operands, ctx)?.into_iter();
        let value = lowered.next().unwrap_or_else(Expr::unit);
        let tests: Vec<Vec<Expr>> = cases
            .iter()
            .map(|case| lowered.by_ref().take(case.test_values.len()).collect())
            .collect();

        let arms_suspend = cases
            .iter()
            .any(|case| case.body.contains_suspend(self.kind))
            || default.is_some_and(|arm| arm.contains_suspend(self.kind));
        if !arms_suspend {
            let cases = cases
                .iter()
                .zip(tests)
                .map(|(case, tests)| SwitchCase::new(tests, self.resolve(&case.body)))
                .collect();
            return Ok(Expr::Switch {
                value: Box::new(value),
                cases,
                default: default.map(|arm| Box::new(self.resolve(arm))),
            });
        }

        let from = ctx.tail();
        let join = self.graph.add_node(ctx.scope());
        let slot = self.join_slot(join, use_);

        let mut targets = Vec::with_capacity(cases.len());
        for (case, test_values) in cases.iter().zip(tests) {
            let target = self.lower_arm(&case.body, join, slot.as_ref(), ctx)?;
            targets.push(SwitchTarget {
                test_values,
                target,
            });
        }
        let default = match default {
            Some(arm) => self.lower_arm(arm, join, slot.as_ref(), ctx)?,
            None if slot.is_none() => join,
            None => self.lower_arm(&Expr::unit(), join, slot.as_ref(), ctx)?,
        };

        self.graph.set_transition(
            from,
            Transition::Switch {
                value,
                cases: targets,
                default,
            },
        );
        ctx.set_tail(join);
        Ok(Self::join_value(slot))
    }

    /// Lower one arm into a fresh node that ends at `join`.
    fn lower_arm(
        &mut self,
        arm: &Expr,
        join: StateId,
        slot: Option<&Variable>,
        ctx: &mut LoweringContext,
    ) -> Result<StateId> {
        let start = self.graph.add_node(ctx.scope());
        ctx.set_tail(start);
        let use_ = if slot.is_some() {
            ValueUse::Needed
        } else {
            ValueUse::Discard
        };
        let value = self.lower(arm, use_, ctx)?;
        match slot {
            Some(slot) => self.emit_assign(ctx, slot, value),
            None => self.emit(ctx, value),
        }
        self.close(ctx, join);
        Ok(start)
    }
}
