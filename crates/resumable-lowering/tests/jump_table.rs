use super::*;
use crate::graph::{JumpCase, ScopeId, StateGraph, StateId};

fn register(graph: &mut StateGraph, scope: ScopeId, suspend: StateId, resume: StateId) {
    let resume_label = graph.node(resume).label.clone();
    let enclosing = graph.scope(scope).owner;
    graph.register_jump_case(
        scope,
        JumpCase {
            resume_label,
            state_id: resume,
            suspend_node: suspend,
            enclosing,
        },
    );
}

/// Root with one suspension, a try scope with one, and a try nested in it
/// with one more.
fn nested_graph() -> (StateGraph, [StateId; 3], [ScopeId; 2]) {
    let mut graph = StateGraph::new(0);
    let root_resume = graph.add_node(ScopeId::ROOT);
    let entry = graph.entry();
    register(&mut graph, ScopeId::ROOT, entry, root_resume);

    let outer = graph.add_scope(ScopeId::ROOT, "outer");
    let outer_entry = graph.add_node(outer);
    graph.scope_mut(outer).entry = Some(outer_entry);
    let outer_resume = graph.add_node(outer);
    register(&mut graph, outer, outer_entry, outer_resume);

    let inner = graph.add_scope(outer, "inner");
    let inner_entry = graph.add_node(inner);
    graph.scope_mut(inner).entry = Some(inner_entry);
    let inner_resume = graph.add_node(inner);
    register(&mut graph, inner, inner_entry, inner_resume);

    (graph, [root_resume, outer_resume, inner_resume], [outer, inner])
}

#[test]
fn test_root_table_enters_child_scopes() {
    let (graph, [root_resume, outer_resume, inner_resume], [outer, _]) = nested_graph();
    let dispatch = DispatchTable::build(&graph);
    let root = dispatch.table(ScopeId::ROOT).expect("root table");

    assert!(matches!(
        root.lookup(root_resume),
        Some(DispatchTarget::Resume { node, .. }) if *node == root_resume
    ));
    for nested in [outer_resume, inner_resume] {
        assert!(matches!(
            root.lookup(nested),
            Some(DispatchTarget::EnterScope { scope, .. }) if *scope == outer
        ));
    }
    assert_eq!(root.entries.len(), 3);
}

#[test]
fn test_routes_list_every_reentered_scope() {
    let (graph, [root_resume, outer_resume, inner_resume], [outer, inner]) = nested_graph();
    let dispatch = DispatchTable::build(&graph);

    assert!(dispatch.route(root_resume).expect("route").scopes.is_empty());
    assert_eq!(
        dispatch.route(outer_resume).expect("route").scopes.as_slice(),
        &[outer]
    );
    assert_eq!(
        dispatch.route(inner_resume).expect("route").scopes.as_slice(),
        &[outer, inner]
    );
    for state in [root_resume, outer_resume, inner_resume] {
        assert_eq!(dispatch.resolve(state), Some(state));
    }
    assert_eq!(dispatch.len(), 3);
}

#[test]
fn test_scope_without_cases_has_empty_fragment() {
    let mut graph = StateGraph::new(0);
    graph.add_scope(ScopeId::ROOT, "quiet");
    let dispatch = DispatchTable::build(&graph);
    assert_eq!(dispatch.tables.len(), 2);
    assert!(dispatch.tables.iter().all(|table| table.entries.is_empty()));
    assert!(dispatch.is_empty());
    assert_eq!(dispatch.resolve(StateId(0)), None);
}
