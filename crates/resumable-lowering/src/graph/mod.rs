//! State graph: nodes, transitions and scopes of one lowered region.
//!
//! Nodes live in an `IndexMap` keyed by their stable id, so iteration follows
//! creation order until the optimizer sorts them by output order. Scopes are
//! an arena indexed by `ScopeId`; scope 0 is the root.

mod scope;
mod state;
mod transition;

pub use scope::{JumpCase, Scope, ScopeId};
pub use state::{StateId, StateNode, StateResult};
pub use transition::{
    CatchTarget, PENDING_RETHROW, SuspendTransition, SwitchTarget, Transition, TryTransition,
};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use resumable_ast::{Expr, LabelId, LabelTarget};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateGraph {
    nodes: IndexMap<StateId, StateNode>,
    scopes: Vec<Scope>,
    entry: StateId,
    next_state: u32,
    /// Node labels are `label_base + id`, disjoint from every source label.
    label_base: u32,
}

impl StateGraph {
    /// Create a graph with a root scope and its entry node.
    pub fn new(label_base: u32) -> Self {
        let mut graph = Self {
            nodes: IndexMap::new(),
            scopes: vec![Scope::new(ScopeId::ROOT, "root", None)],
            entry: StateId(0),
            next_state: 0,
            label_base,
        };
        let entry = graph.add_node(ScopeId::ROOT);
        graph.entry = entry;
        graph.scopes[0].entry = Some(entry);
        graph
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub const fn entry(&self) -> StateId {
        self.entry
    }

    pub fn add_node(&mut self, scope: ScopeId) -> StateId {
        let id = StateId(self.next_state);
        self.next_state += 1;
        let label = LabelTarget::named(LabelId(self.label_base + id.0), id.to_string());
        self.nodes.insert(id, StateNode::new(id, label, scope));
        self.scopes[scope.index()].nodes.push(id);
        id
    }

    /// # Panics
    /// If `id` was removed by the optimizer.
    pub fn node(&self, id: StateId) -> &StateNode {
        &self.nodes[&id]
    }

    pub fn get(&self, id: StateId) -> Option<&StateNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: StateId) -> &mut StateNode {
        &mut self.nodes[&id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &StateNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub(crate) fn push_expression(&mut self, id: StateId, expr: Expr) {
        self.node_mut(id).expressions.push(expr);
    }

    pub fn has_transition(&self, id: StateId) -> bool {
        self.node(id).transition.is_some()
    }

    pub(crate) fn set_transition(&mut self, id: StateId, transition: Transition) {
        let node = self.node_mut(id);
        debug_assert!(
            node.transition.is_none(),
            "{id} already has a {} transition",
            node.transition.as_ref().map_or("", Transition::kind_name)
        );
        node.transition = Some(transition);
    }

    pub(crate) fn set_result(&mut self, id: StateId, result: StateResult) {
        self.node_mut(id).result = Some(result);
    }

    /// Move a node into another scope (labels placed after a forward jump).
    pub(crate) fn move_node(&mut self, id: StateId, scope: ScopeId) {
        let from = self.node(id).scope;
        if from == scope {
            return;
        }
        self.scopes[from.index()].nodes.retain(|node| *node != id);
        self.scopes[scope.index()].nodes.push(id);
        self.node_mut(id).scope = scope;
    }

    pub(crate) fn remove_node(&mut self, id: StateId) -> Option<StateNode> {
        let node = self.nodes.shift_remove(&id)?;
        let scope = &mut self.scopes[node.scope.index()];
        scope.nodes.retain(|member| *member != id);
        if scope.entry == Some(id) {
            scope.entry = None;
        }
        scope.jump_cases.retain(|case| case.suspend_node != id);
        Some(node)
    }

    /// Nodes that must keep their label: scope entries, resume nodes, and
    /// targets of `Goto` expressions left inside bodies.
    pub fn referenced_labels(&self) -> FxHashSet<StateId> {
        let mut referenced: FxHashSet<StateId> = self.addressable_states().into_iter().collect();
        referenced.extend(self.body_jump_targets().into_iter().map(|(_, to)| to));
        referenced
    }

    /// States a resumption or a scope entry can land on.
    pub fn addressable_states(&self) -> Vec<StateId> {
        let mut states: Vec<StateId> = self
            .scopes
            .iter()
            .filter_map(|scope| scope.entry)
            .collect();
        states.extend(
            self.scopes
                .iter()
                .flat_map(|scope| scope.jump_cases.iter().map(|case| case.state_id)),
        );
        states.retain(|id| self.contains(*id));
        states.sort_unstable();
        states.dedup();
        states
    }

    /// `(from, to)` pairs for `Goto` expressions inside node bodies and
    /// transition expressions that target node labels.
    pub fn body_jump_targets(&self) -> Vec<(StateId, StateId)> {
        let labels = self.label_index();
        let mut edges = Vec::new();
        for node in self.nodes.values() {
            let transition_exprs = node
                .transition
                .iter()
                .flat_map(|transition| transition.expressions());
            for expr in node.expressions.iter().chain(transition_exprs) {
                expr.walk(&mut |inner| {
                    if let Expr::Goto { target, .. } = inner
                        && let Some(to) = labels.get(&target.id)
                    {
                        edges.push((node.id, *to));
                    }
                    !matches!(inner, Expr::Resumable { .. })
                });
            }
        }
        edges
    }

    pub fn label_index(&self) -> FxHashMap<LabelId, StateId> {
        self.nodes
            .values()
            .map(|node| (node.label.id, node.id))
            .collect()
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    /// There is one nested scope per lowered try expression, each holding at
    /// least its own try node, so the scope count stays within the `u32`
    /// state id space and the id conversion below cannot truncate.
    pub fn add_scope(&mut self, parent: ScopeId, name: impl Into<String>) -> ScopeId {
        #[allow(clippy::cast_possible_truncation)]
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(id, name, Some(parent)));
        self.scopes[parent.index()].children.push(id);
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn root_scope(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Whether `inner` is `outer` or nested somewhere below it.
    pub fn scope_within(&self, inner: ScopeId, outer: ScopeId) -> bool {
        let mut current = Some(inner);
        while let Some(scope) = current {
            if scope == outer {
                return true;
            }
            current = self.scope(scope).parent;
        }
        false
    }

    /// Scopes from the root's first child down to `scope`.
    pub fn scope_path(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut path = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let entry = self.scope(id);
            if entry.is_root() {
                break;
            }
            path.push(id);
            current = entry.parent;
        }
        path.reverse();
        path
    }

    pub(crate) fn register_jump_case(&mut self, scope: ScopeId, case: JumpCase) {
        self.scope_mut(scope).jump_cases.push(case);
    }

    pub fn jump_case_count(&self) -> usize {
        self.scopes.iter().map(|scope| scope.jump_cases.len()).sum()
    }

    /// The try transition that opened `scope`, if any.
    pub fn try_owner(&self, scope: ScopeId) -> Option<&TryTransition> {
        let owner = self.scope(scope).owner?;
        match &self.get(owner)?.transition {
            Some(Transition::TryCatchFinally(region)) => Some(region),
            _ => None,
        }
    }

    /// A node merged away keeps no identity; whatever pointed at it as the
    /// holder of a transition now points at `into`.
    pub(crate) fn rename_holder(&mut self, from: StateId, into: StateId) {
        for scope in &mut self.scopes {
            if scope.owner == Some(from) {
                scope.owner = Some(into);
            }
            for case in &mut scope.jump_cases {
                if case.suspend_node == from {
                    case.suspend_node = into;
                }
                if case.enclosing == Some(from) {
                    case.enclosing = Some(into);
                }
            }
        }
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    /// Sort nodes, and each scope's member list, by assigned order.
    pub(crate) fn sort_by_order(&mut self) {
        self.nodes.sort_by(|_, a, _, b| a.order.cmp(&b.order));
        let orders: FxHashMap<StateId, u32> = self
            .nodes
            .values()
            .map(|node| (node.id, node.order))
            .collect();
        for scope in &mut self.scopes {
            scope
                .nodes
                .sort_by_key(|id| orders.get(id).copied().unwrap_or(u32::MAX));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/graph.rs"]
mod tests;
