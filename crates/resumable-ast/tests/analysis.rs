use super::*;
use crate::builder::AstBuilder;
use crate::expr::{CatchHandler, ValueType};

#[test]
fn test_plain_tree_has_no_facts() {
    let tree = Expr::seq(vec![Expr::int(1), Expr::add(Expr::int(2), Expr::int(3))]);
    assert_eq!(tree.suspend_facts(), SuspendFacts::empty());
    assert!(!tree.contains_suspend(SuspendKind::Await));
    assert_eq!(tree.count_suspends(SuspendKind::Await), 0);
}

#[test]
fn test_suspend_found_in_operand_positions() {
    let tree = Expr::call("f", vec![Expr::int(1), Expr::awaiting(Expr::int(2))]);
    assert!(tree.contains_suspend(SuspendKind::Await));
    assert!(!tree.contains_suspend(SuspendKind::Yield));
    assert_eq!(tree.count_suspends(SuspendKind::Await), 1);
}

#[test]
fn test_suspend_found_in_catch_and_finally() {
    let tree = Expr::try_catch_finally(
        Expr::int(1),
        vec![CatchHandler::catch_all(Expr::awaiting(Expr::int(2)))],
        Expr::yielding(Expr::int(3)),
    );
    let facts = tree.suspend_facts();
    assert!(facts.contains(SuspendFacts::AWAIT));
    assert!(facts.contains(SuspendFacts::YIELD));
}

#[test]
fn test_nested_region_is_a_boundary() {
    let inner = Expr::resumable(SuspendKind::Await, Expr::awaiting(Expr::int(1)));
    let tree = Expr::seq(vec![inner, Expr::int(2)]);

    assert!(
        !tree.contains_suspend(SuspendKind::Await),
        "suspends of a nested region belong to that region"
    );
    assert_eq!(tree.count_suspends(SuspendKind::Await), 0);
    assert!(
        tree.suspend_facts()
            .contains(SuspendFacts::NESTED_AWAIT_REGION)
    );
}

#[test]
fn test_nested_region_without_suspends_is_not_flagged() {
    let inner = Expr::resumable(SuspendKind::Yield, Expr::int(1));
    assert_eq!(inner.suspend_facts(), SuspendFacts::empty());
}

#[test]
fn test_return_and_label_facts() {
    let mut b = AstBuilder::new();
    let ret = b.label("return");
    let tree = Expr::seq(vec![Expr::label(&ret), Expr::ret(&ret, Some(Expr::int(1)))]);
    let facts = tree.suspend_facts();
    assert!(facts.contains(SuspendFacts::RETURN | SuspendFacts::LABEL));
}

#[test]
fn test_max_ids_cover_declarations_and_labels() {
    let mut b = AstBuilder::new();
    let x = b.int_var("x");
    let e = b.variable("e", ValueType::Any);
    let brk = b.label("brk");
    let cont = b.label("cont");

    let tree = Expr::block(
        vec![x.clone()],
        vec![
            Expr::try_catch(
                Expr::int(1),
                vec![CatchHandler::catch_all(Expr::int(2)).binding(&e)],
            ),
            Expr::looping(Expr::break_to(&brk, None), Some(brk.clone()), Some(cont)),
        ],
    );

    assert_eq!(tree.max_var_id(), Some(e.id));
    assert_eq!(tree.max_label_id().map(|id| id.0), Some(1));
    assert_eq!(Expr::int(1).max_var_id(), None);
}

#[test]
fn test_display_is_compact() {
    let mut b = AstBuilder::new();
    let x = b.int_var("x");
    let tree = Expr::seq(vec![
        Expr::assign(&x, Expr::awaiting(Expr::call("fetch", vec![]))),
        Expr::add(Expr::var(&x), Expr::int(1)),
    ]);
    assert_eq!(tree.to_string(), "{ x = await fetch(); (x + 1) }");
}

#[test]
fn test_serde_round_trip_preserves_tree() {
    let mut b = AstBuilder::new();
    let x = b.int_var("x");
    let tree = Expr::resumable(
        SuspendKind::Await,
        Expr::block(
            vec![x.clone()],
            vec![Expr::assign(&x, Expr::awaiting(Expr::int(2)))],
        ),
    );
    let json = serde_json::to_string(&tree).expect("serialize");
    let back: Expr = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(tree, back);
}
