use super::*;
use crate::graph::{JumpCase, ScopeId, Transition};
use resumable_ast::Expr;

fn call(name: &str) -> Expr {
    Expr::call(name, vec![])
}

/// `S0 -> S1 -> S2 (final)`, each with one call.
fn straight_line() -> StateGraph {
    let mut graph = StateGraph::new(0);
    let s0 = graph.entry();
    let s1 = graph.add_node(ScopeId::ROOT);
    let s2 = graph.add_node(ScopeId::ROOT);
    graph.push_expression(s0, call("a"));
    graph.push_expression(s1, call("b"));
    graph.push_expression(s2, call("c"));
    graph.set_transition(s0, Transition::goto(s1));
    graph.set_transition(s1, Transition::goto(s2));
    graph.set_transition(s2, Transition::Final);
    graph
}

#[test]
fn test_straight_line_collapses_into_entry() {
    let mut graph = straight_line();
    let stats = optimize(&mut graph);

    assert_eq!(graph.len(), 1);
    assert_eq!(stats.merged, 2);
    let entry = graph.node(graph.entry());
    assert_eq!(entry.expressions, vec![call("a"), call("b"), call("c")]);
    assert!(entry.is_final());
}

#[test]
fn test_empty_jump_is_threaded_and_removed() {
    let mut graph = StateGraph::new(0);
    let s0 = graph.entry();
    let empty = graph.add_node(ScopeId::ROOT);
    let other = graph.add_node(ScopeId::ROOT);
    let join = graph.add_node(ScopeId::ROOT);
    graph.set_transition(
        s0,
        Transition::Conditional {
            test: Expr::var(&resumable_ast::Variable::new(
                resumable_ast::VarId(0),
                "c",
                resumable_ast::ValueType::Bool,
            )),
            if_true: empty,
            if_false: other,
        },
    );
    graph.set_transition(empty, Transition::goto(join));
    graph.push_expression(other, call("x"));
    graph.set_transition(other, Transition::goto(join));
    graph.push_expression(join, call("y"));
    graph.set_transition(join, Transition::Final);

    let stats = optimize(&mut graph);
    assert!(stats.threaded >= 1);
    assert!(!graph.contains(empty));
    assert!(graph.contains(join), "two predecessors keep the join separate");
    assert!(matches!(
        graph.node(s0).transition,
        Some(Transition::Conditional { if_true, .. }) if if_true == join
    ));
}

#[test]
fn test_unreachable_states_are_removed() {
    let mut graph = StateGraph::new(0);
    let dead = graph.add_node(ScopeId::ROOT);
    graph.push_expression(dead, call("dead"));
    graph.set_transition(dead, Transition::Final);
    graph.set_transition(graph.entry(), Transition::Final);

    let stats = optimize(&mut graph);
    assert_eq!(stats.removed, 1);
    assert!(!graph.contains(dead));
}

#[test]
fn test_resume_states_are_never_merged() {
    let mut graph = straight_line();
    let resume = StateId(1);
    let resume_label = graph.node(resume).label.clone();
    graph.register_jump_case(
        ScopeId::ROOT,
        JumpCase {
            resume_label,
            state_id: resume,
            suspend_node: graph.entry(),
            enclosing: None,
        },
    );

    optimize(&mut graph);
    assert!(graph.contains(resume));
    assert_eq!(graph.len(), 2, "the tail after the resume state still merges");
}

#[test]
fn test_body_goto_targets_survive() {
    let mut graph = StateGraph::new(0);
    let s0 = graph.entry();
    let s1 = graph.add_node(ScopeId::ROOT);
    let target = graph.add_node(ScopeId::ROOT);
    let label = graph.node(target).label.clone();
    graph.push_expression(
        s0,
        Expr::if_then(Expr::bool(true), Expr::goto(&label)),
    );
    graph.set_transition(s0, Transition::goto(s1));
    graph.set_transition(s1, Transition::Final);
    graph.push_expression(target, call("z"));
    graph.set_transition(target, Transition::Final);

    optimize(&mut graph);
    assert!(graph.contains(target));
    assert!(!graph.contains(s1), "plain fallthrough still merges");
}

#[test]
fn test_order_follows_fallthrough_runs() {
    let mut graph = StateGraph::new(0);
    let s0 = graph.entry();
    let left = graph.add_node(ScopeId::ROOT);
    let right = graph.add_node(ScopeId::ROOT);
    let join = graph.add_node(ScopeId::ROOT);
    graph.set_transition(
        s0,
        Transition::Conditional {
            test: Expr::bool(true),
            if_true: left,
            if_false: right,
        },
    );
    graph.push_expression(left, call("a"));
    graph.set_transition(left, Transition::goto(join));
    graph.push_expression(right, call("b"));
    graph.set_transition(right, Transition::goto(join));
    graph.push_expression(join, call("c"));
    graph.set_transition(join, Transition::Final);

    optimize(&mut graph);
    let ids: Vec<StateId> = graph.nodes().map(|node| node.id).collect();
    assert_eq!(ids, vec![s0, left, join, right]);
    let orders: Vec<u32> = graph.nodes().map(|node| node.order).collect();
    assert_eq!(orders, vec![0, 1, 2, 3]);
    assert_eq!(graph.root_scope().nodes, ids);
}
