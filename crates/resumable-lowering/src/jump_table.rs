//! Resumption dispatch.
//!
//! On resumption the persisted state id selects where to continue.
//! `routes` answers that in one step: the resume label of the innermost
//! scope plus the path of scopes a backend re-enters on the way. The
//! per-scope `JumpTable`s are the same dispatch split into fragments: each
//! maps the ids of its own jump cases to their resume labels, and every id
//! nested below a child scope to that child's entry label, for a backend
//! that dispatches scope by scope.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use resumable_ast::LabelTarget;

use crate::graph::{ScopeId, StateGraph, StateId};

/// Where a dispatch entry sends control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchTarget {
    /// Continue at a resume node of this scope.
    Resume { label: LabelTarget, node: StateId },
    /// Enter a child scope, whose own table continues the dispatch.
    EnterScope {
        scope: ScopeId,
        label: LabelTarget,
        node: StateId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpEntry {
    pub state_id: StateId,
    pub target: DispatchTarget,
}

/// Dispatch fragment of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpTable {
    pub scope: ScopeId,
    pub entries: Vec<JumpEntry>,
}

impl JumpTable {
    pub fn lookup(&self, state_id: StateId) -> Option<&DispatchTarget> {
        self.entries
            .iter()
            .find(|entry| entry.state_id == state_id)
            .map(|entry| &entry.target)
    }
}

/// Full resumption path for one persisted state id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Nested scopes re-entered on the way, outermost first.
    pub scopes: SmallVec<[ScopeId; 4]>,
    pub label: LabelTarget,
    pub node: StateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DispatchTable {
    /// Indexed by `ScopeId`.
    pub tables: Vec<JumpTable>,
    pub routes: IndexMap<StateId, Route>,
}

impl DispatchTable {
    pub fn build(graph: &StateGraph) -> Self {
        let scopes = graph.scopes();
        let mut descendants: Vec<Vec<StateId>> = vec![Vec::new(); scopes.len()];
        // Children always have larger ids than their parent.
        for scope in scopes.iter().rev() {
            let mut ids: Vec<StateId> = scope.jump_cases.iter().map(|case| case.state_id).collect();
            for child in &scope.children {
                ids.extend(descendants[child.index()].iter().copied());
            }
            descendants[scope.id.index()] = ids;
        }

        let mut tables = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let mut entries: Vec<JumpEntry> = scope
                .jump_cases
                .iter()
                .map(|case| JumpEntry {
                    state_id: case.state_id,
                    target: DispatchTarget::Resume {
                        label: case.resume_label.clone(),
                        node: case.state_id,
                    },
                })
                .collect();
            for child in &scope.children {
                let Some(entry) = graph.scope(*child).entry else {
                    continue;
                };
                let label = graph.node(entry).label.clone();
                entries.extend(descendants[child.index()].iter().map(|state_id| JumpEntry {
                    state_id: *state_id,
                    target: DispatchTarget::EnterScope {
                        scope: *child,
                        label: label.clone(),
                        node: entry,
                    },
                }));
            }
            tables.push(JumpTable {
                scope: scope.id,
                entries,
            });
        }

        let mut routes = IndexMap::new();
        for scope in scopes {
            let path: SmallVec<[ScopeId; 4]> = graph.scope_path(scope.id).into_iter().collect();
            for case in &scope.jump_cases {
                routes.insert(
                    case.state_id,
                    Route {
                        scopes: path.clone(),
                        label: case.resume_label.clone(),
                        node: case.state_id,
                    },
                );
            }
        }
        routes.sort_keys();

        Self { tables, routes }
    }

    pub fn table(&self, scope: ScopeId) -> Option<&JumpTable> {
        self.tables.get(scope.index())
    }

    pub fn route(&self, state_id: StateId) -> Option<&Route> {
        self.routes.get(&state_id)
    }

    /// Follow the per-scope tables from the root. Agrees with `route`.
    pub fn resolve(&self, state_id: StateId) -> Option<StateId> {
        let mut scope = ScopeId::ROOT;
        for _ in 0..=self.tables.len() {
            match self.table(scope)?.lookup(state_id)? {
                DispatchTarget::Resume { node, .. } => return Some(*node),
                DispatchTarget::EnterScope { scope: child, .. } => scope = *child,
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
#[path = "../tests/jump_table.rs"]
mod tests;
