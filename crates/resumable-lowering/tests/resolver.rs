use super::*;
use resumable_ast::{AstBuilder, LabelTarget};

fn fixture() -> (StateGraph, VariableResolver) {
    let mut graph = StateGraph::new(100);
    let final_node = graph.add_node(ScopeId::ROOT);
    (graph, VariableResolver::new(50, final_node))
}

#[test]
fn test_hoisted_slots_get_unique_names() {
    let (_, mut resolver) = fixture();
    let mut b = AstBuilder::new();
    let x = b.int_var("x");

    let first = resolver.hoist(&x);
    resolver.push_scope();
    let second = resolver.hoist(&x);

    assert_eq!(first.name, "x<0>");
    assert_eq!(second.name, "x<1>");
    assert_eq!(first.id, VarId(50));
    assert_eq!(resolver.lookup(&x), second, "inner scope shadows");
    resolver.pop_scope();
    assert_eq!(resolver.lookup(&x), first);
    assert_eq!(resolver.variables(), vec![first, second]);
}

#[test]
fn test_synthesized_slots_name_their_owner() {
    let (_, mut resolver) = fixture();
    let slot = resolver.synthesize("__awaiter", StateId(4), ValueType::Any);
    assert_eq!(slot.name, "__awaiter<4_0>");
}

#[test]
fn test_verbatim_block_locals_stay_local() {
    let (graph, mut resolver) = fixture();
    let mut b = AstBuilder::new();
    let x = b.int_var("x");
    let slot = resolver.hoist(&x);

    let outer = resolver.resolve(&Expr::var(&x), &graph);
    assert_eq!(outer, Expr::var(&slot));

    let shadowing = Expr::block(vec![x.clone()], vec![Expr::var(&x)]);
    assert_eq!(resolver.resolve(&shadowing, &graph), shadowing);
}

#[test]
fn test_redirected_goto_carries_value_into_slot() {
    let (mut graph, mut resolver) = fixture();
    let mut b = AstBuilder::new();
    let brk = b.label("brk");
    let join = graph.add_node(ScopeId::ROOT);
    let slot = resolver.synthesize("__join", join, ValueType::Any);
    resolver.redirect(
        brk.id,
        JumpTarget {
            state: join,
            result: Some(slot.clone()),
        },
    );

    let resolved = resolver.resolve(&Expr::break_to(&brk, Some(Expr::int(7))), &graph);
    let Expr::Block { body, .. } = resolved else {
        panic!("expected a sequence, got {resolved}");
    };
    assert_eq!(body[0], Expr::assign(&slot, Expr::int(7)));
    assert!(matches!(
        &body[1],
        Expr::Goto { target, value: None, .. } if *target == graph.node(join).label
    ));
}

#[test]
fn test_forward_goto_value_allocates_label_slot() {
    let (mut graph, mut resolver) = fixture();
    let mut b = AstBuilder::new();
    let later = b.label("later");
    let node = graph.add_node(ScopeId::ROOT);
    resolver.redirect(
        later.id,
        JumpTarget {
            state: node,
            result: None,
        },
    );

    let jump = Expr::Goto {
        target: later.clone(),
        kind: GotoKind::Goto,
        value: Some(Box::new(Expr::int(5))),
    };
    let resolved = resolver.resolve(&jump, &graph);
    let slot = resolver
        .jump_target(later.id)
        .and_then(|target| target.result.clone())
        .expect("the jump allocates the label's slot");
    let Expr::Block { body, .. } = resolved else {
        panic!("expected a sequence, got {resolved}");
    };
    assert_eq!(body[0], Expr::assign(&slot, Expr::int(5)));

    // A second jump writes the same slot.
    resolver.resolve(&jump, &graph);
    assert_eq!(
        resolver.jump_target(later.id).and_then(|target| target.result.clone()),
        Some(slot)
    );
}

#[test]
fn test_return_writes_final_result() {
    let (graph, mut resolver) = fixture();
    let final_slot = resolver.final_result_slot(ValueType::Any);
    let ret = LabelTarget::new(LabelId(0));

    let resolved = resolver.resolve(&Expr::ret(&ret, Some(Expr::int(1))), &graph);
    let final_label = graph.node(resolver.final_node()).label.clone();
    assert_eq!(
        resolved,
        Expr::seq(vec![
            Expr::assign(&final_slot, Expr::int(1)),
            Expr::goto(&final_label),
        ])
    );
}

#[test]
fn test_returns_inside_nested_regions_are_untouched() {
    let (graph, mut resolver) = fixture();
    resolver.final_result_slot(ValueType::Any);
    let ret = LabelTarget::new(LabelId(0));
    let nested = Expr::resumable(
        resumable_ast::SuspendKind::Yield,
        Expr::ret(&ret, None),
    );
    assert_eq!(resolver.resolve(&nested, &graph), nested);
}

#[test]
fn test_rethrow_names_the_caught_exception() {
    let (graph, mut resolver) = fixture();
    let exception = resolver.synthesize("__ex", StateId(0), ValueType::Any);
    resolver.push_rethrow(Some(exception.clone()));

    assert_eq!(
        resolver.resolve(&Expr::rethrow(), &graph),
        Expr::throw(Expr::var(&exception))
    );

    // A verbatim handler rethrows its own exception.
    let local = Expr::try_catch(
        Expr::int(1),
        vec![CatchHandler::catch_all(Expr::rethrow())],
    );
    assert_eq!(resolver.resolve(&local, &graph), local);
}

#[test]
fn test_route_leaving_finally_region_goes_through_finally() {
    let (mut graph, mut resolver) = fixture();
    let nested = graph.add_scope(ScopeId::ROOT, "try");
    let inside = graph.add_node(nested);
    let finally_node = graph.add_node(ScopeId::ROOT);
    let outside = graph.add_node(ScopeId::ROOT);
    resolver.push_finally(FinallyFrame::new(nested, graph.entry(), finally_node));

    assert_eq!(resolver.route_jump(&graph, inside), JumpRoute::direct(inside));

    let route = resolver.route_jump(&graph, outside);
    assert_eq!(route.target, finally_node);
    assert_eq!(route.prelude.len(), 1);

    let frame = resolver.pop_finally().expect("frame");
    assert_eq!(frame.targets, vec![outside]);
    let leave = frame.leave_var.expect("leave slot");
    assert_eq!(
        route.prelude[0],
        Expr::assign(&leave, Expr::int(leave_code(outside)))
    );
    assert!(resolver.routed_under_finally(outside));
}
