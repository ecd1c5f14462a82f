//! Lowering visitor: flattens a region body into a state graph.
//!
//! The descent walks the body once. Subtrees without a suspension point of
//! the region's flavor are copied verbatim (after variable and jump
//! resolution) into the current tail node; every construct that does
//! suspend is split into state nodes joined by explicit transitions.
//!
//! Each `lower_*` method returns the expression producing the construct's
//! value, evaluated in whatever node is the tail when it returns. Values
//! that must survive a suspension are parked in slots: join results,
//! suspend results and spilled operands.
//!
//! The cursor (tail node, scope stack, depth) lives in an explicit
//! `LoweringContext` passed down the recursion; the visitor itself only owns
//! the graph under construction and the resolver.

mod block;
mod branch;
mod context;
mod jumps;
mod suspend;
mod try_catch;

pub use context::{LoweringContext, ValueUse};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use resumable_ast::{Expr, LabelId, LabelTarget, SuspendFacts, SuspendKind, ValueType, Variable};

use crate::error::{LoweringError, Result};
use crate::graph::{ScopeId, StateGraph, StateId, StateResult, Transition};
use crate::options::LoweringOptions;
use crate::resolver::{JumpTarget, VariableResolver};

/// Output of the visitor, before optimization and dispatch construction.
#[derive(Debug)]
pub struct LoweredRegion {
    pub graph: StateGraph,
    pub variables: Vec<Variable>,
    pub final_result: Option<Variable>,
    pub suspend_points: usize,
}

/// Source labels that became state nodes.
#[derive(Debug, Default)]
struct LabelBook {
    /// Created by a jump before the `Label` itself was visited.
    pending: IndexMap<LabelId, LabelTarget>,
    placed: FxHashSet<LabelId>,
}

pub struct LoweringVisitor {
    graph: StateGraph,
    resolver: VariableResolver,
    kind: SuspendKind,
    labels: LabelBook,
}

/// Lower the body of a `kind` region.
#[tracing::instrument(level = "debug", skip_all, fields(kind = kind.as_str()))]
pub fn lower_region(
    kind: SuspendKind,
    body: &Expr,
    options: &LoweringOptions,
) -> Result<LoweredRegion> {
    let suspend_points = precheck(kind, body, options)?;

    let first_var = body.max_var_id().map_or(0, |id| id.0 + 1);
    let label_base = body.max_label_id().map_or(0, |id| id.0 + 1);
    let mut graph = StateGraph::new(label_base);
    let entry = graph.entry();
    let final_node = graph.add_node(ScopeId::ROOT);
    graph.set_transition(final_node, Transition::Final);

    let mut resolver = VariableResolver::new(first_var, final_node);
    let final_result = (kind == SuspendKind::Await && options.result_type != ValueType::Unit)
        .then(|| resolver.final_result_slot(options.result_type));
    if let Some(slot) = &final_result {
        graph.set_result(final_node, StateResult::slot(slot.clone()));
    }

    let mut visitor = LoweringVisitor {
        graph,
        resolver,
        kind,
        labels: LabelBook::default(),
    };
    let mut ctx = LoweringContext::new(kind, entry, options.max_depth);
    let use_ = if final_result.is_some() {
        ValueUse::Needed
    } else {
        ValueUse::Discard
    };

    let value = visitor.lower(body, use_, &mut ctx)?;
    match &final_result {
        Some(slot) => visitor.emit_assign(&ctx, slot, value),
        None => visitor.emit(&ctx, value),
    }
    visitor.jump(&ctx, final_node);

    let region = visitor.finish(final_result, suspend_points, final_node)?;
    debug!(
        states = region.graph.len(),
        scopes = region.graph.scopes().len(),
        variables = region.variables.len(),
        suspend_points,
        "lowered region"
    );
    Ok(region)
}

/// Reject malformed input before building anything; returns the number of
/// suspension points.
fn precheck(kind: SuspendKind, body: &Expr, options: &LoweringOptions) -> Result<usize> {
    if is_empty(body) {
        return Err(LoweringError::EmptyInput);
    }
    let facts = body.suspend_facts();
    if facts.contains(SuspendFacts::nested_region(kind)) {
        return Err(LoweringError::NestedRegion {
            kind: kind.as_str(),
        });
    }
    if facts.contains(SuspendFacts::suspend(kind.other())) {
        return Err(LoweringError::MismatchedSuspend {
            found: kind.other().as_str(),
            region: kind.as_str(),
        });
    }
    let count = body.count_suspends(kind);
    if count == 0 && options.require_suspend_point {
        return Err(LoweringError::NoSuspendPoints {
            kind: kind.as_str(),
        });
    }
    Ok(count)
}

fn is_empty(expr: &Expr) -> bool {
    match expr {
        Expr::Block { body, .. } => body.iter().all(is_empty),
        _ => false,
    }
}

impl LoweringVisitor {
    pub(crate) fn lower(
        &mut self,
        expr: &Expr,
        use_: ValueUse,
        ctx: &mut LoweringContext,
    ) -> Result<Expr> {
        ctx.enter()?;
        let lowered = self.lower_expr(expr, use_, ctx);
        ctx.leave();
        lowered
    }

    fn lower_expr(&mut self, expr: &Expr, use_: ValueUse, ctx: &mut LoweringContext) -> Result<Expr> {
        // Jumps and labels reached by the descent are always structural.
        match expr {
            Expr::Goto {
                target,
                kind,
                value,
            } => return self.lower_goto(target, *kind, value.as_deref(), ctx),
            Expr::Label { target, default } => {
                return self.lower_label(target, default.as_deref(), use_, ctx);
            }
            _ if !expr.contains_suspend(self.kind) => return Ok(self.resolve(expr)),
            _ => {}
        }

        match expr {
            Expr::Suspend {
                operand,
                result_type,
                ..
            } => self.lower_suspend(operand, *result_type, ctx),
            Expr::Block { vars, body } => self.lower_block(vars, body, use_, ctx),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => self.lower_conditional(test, if_true, if_false.as_deref(), use_, ctx),
            Expr::Switch {
                value,
                cases,
                default,
            } => self.lower_switch(value, cases, default.as_deref(), use_, ctx),
            Expr::Try {
                body,
                handlers,
                finally,
            } => self.lower_try(body, handlers, finally.as_deref(), use_, ctx),
            Expr::Loop {
                body,
                break_label,
                continue_label,
            } => self.lower_loop(body, break_label.as_ref(), continue_label.as_ref(), use_, ctx),
            Expr::Assign { target, value } => {
                let value = self.lower(value, ValueUse::Needed, ctx)?;
                Ok(Expr::Assign {
                    target: self.resolver.lookup(target),
                    value: Box::new(value),
                })
            }
            Expr::Op { operator, operands } => {
                let operands: Vec<&Expr> = operands.iter().collect();
                let operands = self.lower_operands(&operands, ctx)?;
                Ok(Expr::op(operator.clone(), operands))
            }
            Expr::Throw(Some(operand)) => {
                let operand = self.lower(operand, ValueUse::Needed, ctx)?;
                Ok(Expr::throw(operand))
            }
            // No suspension point can sit below these.
            Expr::Literal(_)
            | Expr::Variable(_)
            | Expr::Throw(None)
            | Expr::Resumable { .. }
            | Expr::Goto { .. }
            | Expr::Label { .. } => Ok(self.resolve(expr)),
        }
    }

    // =========================================================================
    // Emission helpers
    // =========================================================================

    fn resolve(&mut self, expr: &Expr) -> Expr {
        self.resolver.resolve(expr, &self.graph)
    }

    /// Append `expr` to the tail unless evaluating it has no effect.
    fn emit(&mut self, ctx: &LoweringContext, expr: Expr) {
        if !expr.is_trivial() {
            self.graph.push_expression(ctx.tail(), expr);
        }
    }

    fn emit_assign(&mut self, ctx: &LoweringContext, slot: &Variable, value: Expr) {
        if matches!(&value, Expr::Variable(var) if var.id == slot.id) {
            return;
        }
        self.graph
            .push_expression(ctx.tail(), Expr::assign(slot, value));
    }

    /// End the tail with `Goto target` unless it already has a transition.
    fn close(&mut self, ctx: &LoweringContext, target: StateId) {
        if !self.graph.has_transition(ctx.tail()) {
            self.graph
                .set_transition(ctx.tail(), Transition::goto(target));
        }
    }

    /// Jump from the tail to `target`, through any finally node in between.
    fn jump(&mut self, ctx: &LoweringContext, target: StateId) {
        let route = self.resolver.route_jump(&self.graph, target);
        for expr in route.prelude {
            self.emit(ctx, expr);
        }
        self.close(ctx, route.target);
    }

    /// Continue in a fresh node after an unconditional jump. Anything lowered
    /// into it is unreachable and pruned by the optimizer.
    fn open_unreachable(&mut self, ctx: &mut LoweringContext) {
        let node = self.graph.add_node(ctx.scope());
        ctx.set_tail(node);
    }

    /// Allocate the result slot of a join node when its value is used.
    fn join_slot(&mut self, join: StateId, use_: ValueUse) -> Option<Variable> {
        use_.needed().then(|| {
            let slot = self.resolver.synthesize("__join", join, ValueType::Any);
            self.graph.set_result(join, StateResult::slot(slot.clone()));
            slot
        })
    }

    fn join_value(slot: Option<Variable>) -> Expr {
        slot.map_or_else(Expr::unit, Expr::Variable)
    }

    /// State node standing for a source label, created on first use.
    fn label_node(&mut self, target: &LabelTarget, ctx: &LoweringContext) -> StateId {
        if let Some(existing) = self.resolver.jump_target(target.id) {
            return existing.state;
        }
        let node = self.graph.add_node(ctx.scope());
        self.resolver.redirect(
            target.id,
            JumpTarget {
                state: node,
                result: None,
            },
        );
        if !self.labels.placed.contains(&target.id) {
            self.labels.pending.insert(target.id, target.clone());
        }
        node
    }

    // =========================================================================
    // Completion
    // =========================================================================

    fn finish(
        mut self,
        final_result: Option<Variable>,
        suspend_points: usize,
        final_node: StateId,
    ) -> Result<LoweredRegion> {
        if let Some(label) = self.labels.pending.values().next() {
            return Err(LoweringError::UnsupportedJump {
                label: label.to_string(),
                reason: "the label is not placed in a lowered block",
            });
        }

        // Tails opened after a jump at the very end of a construct.
        let open: Vec<StateId> = self
            .graph
            .nodes()
            .filter(|node| node.transition.is_none())
            .map(|node| node.id)
            .collect();
        for id in open {
            trace!(%id, "closing unreachable tail");
            self.graph.set_transition(id, Transition::goto(final_node));
        }

        self.check_dangling_jumps()?;
        if self.graph.root_scope().nodes.is_empty() {
            return Err(LoweringError::EmptyEntryScope);
        }

        Ok(LoweredRegion {
            variables: self.resolver.variables(),
            graph: self.graph,
            final_result,
            suspend_points,
        })
    }

    /// Every `Goto` left in a body must target a node label or a label
    /// defined within the same expression.
    fn check_dangling_jumps(&self) -> Result<()> {
        let node_labels = self.graph.label_index();
        for node in self.graph.nodes() {
            let transition_exprs = node
                .transition
                .iter()
                .flat_map(|transition| transition.expressions());
            for expr in node.expressions.iter().chain(transition_exprs) {
                let mut local = FxHashSet::default();
                expr.walk(&mut |inner| {
                    match inner {
                        Expr::Label { target, .. } => {
                            local.insert(target.id);
                        }
                        Expr::Loop {
                            break_label,
                            continue_label,
                            ..
                        } => {
                            local.extend(break_label.iter().map(|label| label.id));
                            local.extend(continue_label.iter().map(|label| label.id));
                        }
                        _ => {}
                    }
                    !matches!(inner, Expr::Resumable { .. })
                });

                let mut dangling = None;
                expr.walk(&mut |inner| {
                    if let Expr::Goto { target, .. } = inner
                        && !node_labels.contains_key(&target.id)
                        && !local.contains(&target.id)
                    {
                        dangling.get_or_insert_with(|| target.clone());
                    }
                    !matches!(inner, Expr::Resumable { .. })
                });
                if let Some(label) = dangling {
                    return Err(LoweringError::UnsupportedJump {
                        label: label.to_string(),
                        reason: "the target is not visible from the state that jumps",
                    });
                }
            }
        }
        Ok(())
    }
}
