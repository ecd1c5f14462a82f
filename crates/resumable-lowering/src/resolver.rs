//! Variable hoisting and jump redirection.
//!
//! Locals of lowered blocks outlive a suspension, so they are hoisted into
//! machine-wide slots with unique, deterministic names (`name<n>`). Slots the
//! lowering itself needs are synthesized with a `__` prefix and the id of the
//! state that introduced them (`__awaiter<s_n>`).
//!
//! The resolver also owns label redirection. A loop's break and continue
//! labels, and source labels placed in lowered blocks, become state nodes;
//! any `Goto` that names them is rewritten to jump to the node's label, with
//! the carried value written to the node's result slot first. Jumps leaving a
//! try region that has a finally block are routed through the finally node.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use resumable_ast::{CatchHandler, Expr, GotoKind, LabelId, SwitchCase, ValueType, VarId, Variable};

use crate::graph::{ScopeId, StateGraph, StateId};

/// Where a redirected label now points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTarget {
    pub state: StateId,
    /// Slot receiving a value carried by the jump.
    pub result: Option<Variable>,
}

/// A lowered jump: assignments to run before transferring to `target`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JumpRoute {
    pub prelude: Vec<Expr>,
    pub target: StateId,
}

impl JumpRoute {
    pub const fn direct(target: StateId) -> Self {
        Self {
            prelude: Vec::new(),
            target,
        }
    }
}

/// A try region with a finally block whose body is being lowered.
#[derive(Debug, Clone)]
pub struct FinallyFrame {
    pub scope: ScopeId,
    pub owner: StateId,
    pub finally_node: StateId,
    /// Slot naming the state to continue at once the finally node completes.
    pub leave_var: Option<Variable>,
    /// Destinations of jumps that left the region, in first-seen order.
    pub targets: Vec<StateId>,
}

impl FinallyFrame {
    pub const fn new(scope: ScopeId, owner: StateId, finally_node: StateId) -> Self {
        Self {
            scope,
            owner,
            finally_node,
            leave_var: None,
            targets: Vec::new(),
        }
    }
}

/// Value stored in a leave slot for `target`; zero means "no pending jump".
pub fn leave_code(target: StateId) -> i64 {
    target.discriminator() + 1
}

#[derive(Debug)]
pub struct VariableResolver {
    scopes: Vec<FxHashMap<VarId, Variable>>,
    hoisted: IndexMap<VarId, Variable>,
    next_var: u32,
    counter: u32,
    redirects: FxHashMap<LabelId, JumpTarget>,
    rethrow: Vec<Option<Variable>>,
    frames: Vec<FinallyFrame>,
    routed_under_finally: FxHashSet<StateId>,
    final_result: Option<Variable>,
    final_node: StateId,
    /// Depth inside nested regions while resolving verbatim code.
    region_depth: u32,
}

impl VariableResolver {
    /// `first_var` must exceed every variable id in the input tree.
    pub fn new(first_var: u32, final_node: StateId) -> Self {
        Self {
            scopes: vec![FxHashMap::default()],
            hoisted: IndexMap::new(),
            next_var: first_var,
            counter: 0,
            redirects: FxHashMap::default(),
            rethrow: Vec::new(),
            frames: Vec::new(),
            routed_under_finally: FxHashSet::default(),
            final_result: None,
            final_node,
            region_depth: 0,
        }
    }

    // =========================================================================
    // Slots
    // =========================================================================

    fn allocate(&mut self, name: String, ty: ValueType) -> Variable {
        let variable = Variable::new(VarId(self.next_var), name, ty);
        self.next_var += 1;
        self.counter += 1;
        self.hoisted.insert(variable.id, variable.clone());
        variable
    }

    /// Hoist a source local into the innermost scope.
    pub fn hoist(&mut self, local: &Variable) -> Variable {
        let slot = self.allocate(format!("{}<{}>", local.name, self.counter), local.ty);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(local.id, slot.clone());
        }
        slot
    }

    /// Allocate a lowering slot owned by `owner`.
    pub fn synthesize(&mut self, prefix: &str, owner: StateId, ty: ValueType) -> Variable {
        let name = format!("{prefix}<{}_{}>", owner.0, self.counter);
        self.allocate(name, ty)
    }

    pub fn final_result_slot(&mut self, ty: ValueType) -> Variable {
        let slot = self.allocate("__final".to_string(), ty);
        self.final_result = Some(slot.clone());
        slot
    }

    pub const fn final_result(&self) -> Option<&Variable> {
        self.final_result.as_ref()
    }

    pub const fn final_node(&self) -> StateId {
        self.final_node
    }

    /// Every slot in creation order.
    pub fn variables(&self) -> Vec<Variable> {
        self.hoisted.values().cloned().collect()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Shadow `vars` with themselves: a verbatim block's locals stay locals.
    fn push_verbatim_scope<'a>(&mut self, vars: impl Iterator<Item = &'a Variable>) {
        self.scopes
            .push(vars.map(|var| (var.id, var.clone())).collect());
    }

    pub fn lookup(&self, variable: &Variable) -> Variable {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&variable.id))
            .unwrap_or(variable)
            .clone()
    }

    // =========================================================================
    // Labels and jumps
    // =========================================================================

    pub fn redirect(&mut self, label: LabelId, target: JumpTarget) {
        self.redirects.insert(label, target);
    }

    pub fn jump_target(&self, label: LabelId) -> Option<&JumpTarget> {
        self.redirects.get(&label)
    }

    pub fn set_jump_result(&mut self, label: LabelId, slot: Variable) {
        if let Some(target) = self.redirects.get_mut(&label) {
            target.result = Some(slot);
        }
    }

    pub fn push_rethrow(&mut self, exception: Option<Variable>) {
        self.rethrow.push(exception);
    }

    pub fn pop_rethrow(&mut self) {
        self.rethrow.pop();
    }

    pub fn push_finally(&mut self, frame: FinallyFrame) {
        self.frames.push(frame);
    }

    pub fn pop_finally(&mut self) -> Option<FinallyFrame> {
        self.frames.pop()
    }

    /// Whether a jump to `target` was routed while a finally frame was open.
    pub fn routed_under_finally(&self, target: StateId) -> bool {
        self.routed_under_finally.contains(&target)
    }

    /// Route a jump from the current position to `target`.
    ///
    /// Leaving the innermost try-with-finally goes through its finally node,
    /// recording the destination in the region's leave slot. The finally
    /// node's exit continues the route outward once it is lowered.
    pub fn route_jump(&mut self, graph: &StateGraph, target: StateId) -> JumpRoute {
        let Some(frame) = self.frames.last() else {
            return JumpRoute::direct(target);
        };
        self.routed_under_finally.insert(target);
        if graph.scope_within(graph.node(target).scope, frame.scope) {
            return JumpRoute::direct(target);
        }

        let (owner, finally_node, leave) = (frame.owner, frame.finally_node, frame.leave_var.clone());
        let leave = match leave {
            Some(leave) => leave,
            None => self.synthesize("__leave", owner, ValueType::Int),
        };
        if let Some(frame) = self.frames.last_mut() {
            frame.leave_var = Some(leave.clone());
            if !frame.targets.contains(&target) {
                frame.targets.push(target);
            }
        }
        JumpRoute {
            prelude: vec![Expr::assign(&leave, Expr::int(leave_code(target)))],
            target: finally_node,
        }
    }

    // =========================================================================
    // Verbatim rewriting
    // =========================================================================

    /// Rewrite a subtree that contains no suspension point of the region:
    /// hoisted locals become their slots, redirected jumps target node
    /// labels, and a bare rethrow inside a lowered catch names the caught
    /// exception.
    pub fn resolve(&mut self, expr: &Expr, graph: &StateGraph) -> Expr {
        match expr {
            Expr::Literal(_) => expr.clone(),
            Expr::Variable(variable) => Expr::Variable(self.lookup(variable)),
            Expr::Assign { target, value } => Expr::Assign {
                target: self.lookup(target),
                value: Box::new(self.resolve(value, graph)),
            },
            Expr::Op { operator, operands } => Expr::Op {
                operator: operator.clone(),
                operands: self.resolve_all(operands, graph),
            },
            Expr::Block { vars, body } => {
                self.push_verbatim_scope(vars.iter());
                let body = self.resolve_all(body, graph);
                self.pop_scope();
                Expr::Block {
                    vars: vars.clone(),
                    body,
                }
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => Expr::Conditional {
                test: Box::new(self.resolve(test, graph)),
                if_true: Box::new(self.resolve(if_true, graph)),
                if_false: self.resolve_opt(if_false.as_deref(), graph),
            },
            Expr::Switch {
                value,
                cases,
                default,
            } => Expr::Switch {
                value: Box::new(self.resolve(value, graph)),
                cases: cases
                    .iter()
                    .map(|case| SwitchCase {
                        test_values: self.resolve_all(&case.test_values, graph),
                        body: self.resolve(&case.body, graph),
                    })
                    .collect(),
                default: self.resolve_opt(default.as_deref(), graph),
            },
            Expr::Try {
                body,
                handlers,
                finally,
            } => {
                let body = Box::new(self.resolve(body, graph));
                let handlers = handlers
                    .iter()
                    .map(|handler| {
                        self.push_verbatim_scope(handler.variable.iter());
                        self.rethrow.push(None);
                        let body = self.resolve(&handler.body, graph);
                        self.rethrow.pop();
                        self.pop_scope();
                        CatchHandler {
                            exception_type: handler.exception_type.clone(),
                            variable: handler.variable.clone(),
                            body,
                        }
                    })
                    .collect();
                Expr::Try {
                    body,
                    handlers,
                    finally: self.resolve_opt(finally.as_deref(), graph),
                }
            }
            Expr::Loop {
                body,
                break_label,
                continue_label,
            } => Expr::Loop {
                body: Box::new(self.resolve(body, graph)),
                break_label: break_label.clone(),
                continue_label: continue_label.clone(),
            },
            Expr::Goto {
                target,
                kind,
                value,
            } => {
                let value = value.as_deref().map(|value| self.resolve(value, graph));
                self.resolve_goto(target, *kind, value, graph)
            }
            Expr::Label { target, default } => Expr::Label {
                target: target.clone(),
                default: self.resolve_opt(default.as_deref(), graph),
            },
            Expr::Throw(Some(operand)) => Expr::throw(self.resolve(operand, graph)),
            Expr::Throw(None) => match self.rethrow.last() {
                Some(Some(exception)) if self.region_depth == 0 => Expr::throw(Expr::var(exception)),
                _ => Expr::rethrow(),
            },
            Expr::Suspend {
                operand,
                result_type,
                kind,
            } => Expr::suspend(self.resolve(operand, graph), *result_type, *kind),
            Expr::Resumable { kind, body } => {
                self.region_depth += 1;
                let body = self.resolve(body, graph);
                self.region_depth -= 1;
                Expr::resumable(*kind, body)
            }
        }
    }

    fn resolve_all(&mut self, exprs: &[Expr], graph: &StateGraph) -> Vec<Expr> {
        exprs.iter().map(|expr| self.resolve(expr, graph)).collect()
    }

    fn resolve_opt(&mut self, expr: Option<&Expr>, graph: &StateGraph) -> Option<Box<Expr>> {
        expr.map(|expr| Box::new(self.resolve(expr, graph)))
    }

    /// Rewrite a jump whose value (if any) is already resolved.
    fn resolve_goto(
        &mut self,
        target: &resumable_ast::LabelTarget,
        kind: GotoKind,
        value: Option<Expr>,
        graph: &StateGraph,
    ) -> Expr {
        let unchanged = |value: Option<Expr>| Expr::Goto {
            target: target.clone(),
            kind,
            value: value.map(Box::new),
        };
        if self.region_depth > 0 {
            return unchanged(value);
        }
        let (destination, slot) = if kind == GotoKind::Return {
            (self.final_node, self.final_result.clone())
        } else if let Some(redirect) = self.redirects.get(&target.id) {
            let (state, result) = (redirect.state, redirect.result.clone());
            match result {
                // A forward jump reaches the label before it is placed; the
                // slot allocated here is the one the label reads.
                None if value.is_some() => {
                    let slot = self.synthesize("__join", state, ValueType::Any);
                    self.set_jump_result(target.id, slot.clone());
                    (state, Some(slot))
                }
                result => (state, result),
            }
        } else {
            return unchanged(value);
        };

        let mut body = Vec::new();
        match (slot, value) {
            (Some(slot), Some(value)) => body.push(Expr::assign(&slot, value)),
            (Some(slot), None) if kind == GotoKind::Return => {
                body.push(Expr::assign(&slot, Expr::unit()));
            }
            (None, Some(value)) if !value.is_trivial() => body.push(value),
            _ => {}
        }
        let route = self.route_jump(graph, destination);
        body.extend(route.prelude);
        body.push(Expr::Goto {
            target: graph.node(route.target).label.clone(),
            kind: if kind == GotoKind::Return {
                GotoKind::Goto
            } else {
                kind
            },
            value: None,
        });
        if body.len() == 1 {
            body.remove(0)
        } else {
            Expr::seq(body)
        }
    }
}

#[cfg(test)]
#[path = "../tests/resolver.rs"]
mod tests;
