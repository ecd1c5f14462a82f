use super::*;
use resumable_ast::{AstBuilder, ValueType};

fn eval(expr: &Expr) -> Flow<Value> {
    let host = Host::with_defaults();
    let mut slots = Slots::default();
    Evaluator::new(&mut slots, &host).evaluate(expr)
}

fn thrown_kind(result: Flow<Value>) -> String {
    match result {
        Err(Signal::Throw(exception)) => exception.kind,
        other => panic!("expected an exception, got {other:?}"),
    }
}

#[test]
fn test_arithmetic_and_concatenation() {
    let sum = Expr::add(Expr::int(2), Expr::op(Operator::Mul, vec![Expr::int(3), Expr::int(4)]));
    assert_eq!(eval(&sum), Ok(Value::Int(14)));
    let text = Expr::add(Expr::str("n="), Expr::int(5));
    assert_eq!(eval(&text), Ok(Value::str("n=5")));
    assert_eq!(
        eval(&Expr::op(Operator::Lt, vec![Expr::str("a"), Expr::str("b")])),
        Ok(Value::Bool(true))
    );
}

#[test]
fn test_operator_errors_are_exceptions() {
    let divide = Expr::op(Operator::Div, vec![Expr::int(1), Expr::int(0)]);
    assert_eq!(thrown_kind(eval(&divide)), "DivideByZero");
    let mismatch = Expr::op(Operator::Not, vec![Expr::int(1)]);
    assert_eq!(thrown_kind(eval(&mismatch)), "TypeError");
    let overflow = Expr::add(Expr::int(i64::MAX), Expr::int(1));
    assert_eq!(thrown_kind(eval(&overflow)), "Overflow");
}

#[test]
fn test_block_locals_do_not_reach_slots() {
    let mut b = AstBuilder::new();
    let x = b.int_var("x");
    let host = Host::with_defaults();
    let mut slots = Slots::default();
    let block = Expr::block(
        vec![x.clone()],
        vec![Expr::assign(&x, Expr::int(3)), Expr::add(Expr::var(&x), Expr::int(1))],
    );
    let value = Evaluator::new(&mut slots, &host).evaluate(&block);
    assert_eq!(value, Ok(Value::Int(4)));
    assert!(slots.is_empty(), "locals stay in the block: {slots:?}");
}

#[test]
fn test_free_variables_live_in_slots() {
    let mut b = AstBuilder::new();
    let x = b.int_var("x");
    let host = Host::with_defaults();
    let mut slots = Slots::default();
    let mut eval = Evaluator::new(&mut slots, &host);
    assert!(matches!(
        eval.evaluate(&Expr::var(&x)),
        Err(Signal::Fault(RuntimeError::UnboundVariable { .. }))
    ));
    eval.evaluate(&Expr::assign(&x, Expr::int(7)))
        .expect("assignment");
    assert_eq!(slots.get(&x.id), Some(&Value::Int(7)));
}

#[test]
fn test_forward_jump_within_block() {
    let mut b = AstBuilder::new();
    let skip = b.label("skip");
    let block = Expr::seq(vec![
        Expr::goto(&skip),
        Expr::call("log", vec![Expr::str("skipped")]),
        Expr::label(&skip),
        Expr::int(9),
    ]);
    let host = Host::with_defaults();
    let mut slots = Slots::default();
    let value = Evaluator::new(&mut slots, &host).evaluate(&block);
    assert_eq!(value, Ok(Value::Int(9)));
    assert!(host.log().is_empty());
}

#[test]
fn test_jump_to_foreign_label_escapes() {
    let mut b = AstBuilder::new();
    let elsewhere = b.label("elsewhere");
    let result = eval(&Expr::seq(vec![Expr::break_to(&elsewhere, Some(Expr::int(2)))]));
    assert_eq!(
        result,
        Err(Signal::Jump {
            label: elsewhere.id,
            value: Value::Int(2),
        })
    );
}

#[test]
fn test_loop_breaks_with_value() {
    let mut b = AstBuilder::new();
    let i = b.int_var("i");
    let done = b.label("done");
    let next = b.label("next");
    let body = Expr::seq(vec![
        Expr::assign(&i, Expr::add(Expr::var(&i), Expr::int(1))),
        Expr::if_then(Expr::eq(Expr::var(&i), Expr::int(2)), Expr::continue_to(&next)),
        Expr::if_then(
            Expr::ge(Expr::var(&i), Expr::int(4)),
            Expr::break_to(&done, Some(Expr::op(Operator::Mul, vec![Expr::var(&i), Expr::int(10)]))),
        ),
    ]);
    let program = Expr::block(
        vec![i.clone()],
        vec![
            Expr::assign(&i, Expr::int(0)),
            Expr::looping(body, Some(done), Some(next)),
        ],
    );
    assert_eq!(eval(&program), Ok(Value::Int(40)));
}

#[test]
fn test_catch_binds_and_finally_runs() {
    let mut b = AstBuilder::new();
    let e = b.variable("e", ValueType::Any);
    let program = Expr::try_catch_finally(
        Expr::throw(Expr::call("error", vec![Expr::str("Boom"), Expr::str("bad")])),
        vec![
            CatchHandler::of("Other", None, Expr::int(1)),
            CatchHandler::of("Boom", Some(e.clone()), Expr::var(&e)),
        ],
        Expr::call("log", vec![Expr::str("finally")]),
    );
    let host = Host::with_defaults();
    let mut slots = Slots::default();
    let value = Evaluator::new(&mut slots, &host).evaluate(&program);
    assert_eq!(value, Ok(Value::Exception(Exception::new("Boom", "bad"))));
    assert_eq!(host.log(), vec![Value::str("finally")]);
}

#[test]
fn test_rethrow_and_finally_override() {
    let rethrown = Expr::try_catch(
        Expr::throw(Expr::str("first")),
        vec![CatchHandler::catch_all(Expr::rethrow())],
    );
    assert_eq!(thrown_kind(eval(&rethrown)), "Error");
    assert!(matches!(
        eval(&Expr::rethrow()),
        Err(Signal::Fault(RuntimeError::RethrowOutsideHandler))
    ));

    let replaced = Expr::try_finally(
        Expr::throw(Expr::str("first")),
        Expr::throw(Expr::call("error", vec![Expr::str("Second")])),
    );
    assert_eq!(thrown_kind(eval(&replaced)), "Second");
}

#[test]
fn test_switch_picks_first_matching_case() {
    let program = Expr::switch(
        Expr::int(2),
        vec![
            SwitchCase::new(vec![Expr::int(1)], Expr::str("one")),
            SwitchCase::new(vec![Expr::int(3), Expr::int(2)], Expr::str("two or three")),
        ],
        Some(Expr::str("other")),
    );
    assert_eq!(eval(&program), Ok(Value::str("two or three")));
}

#[test]
fn test_suspend_requires_direct_mode() {
    let awaited = Expr::awaiting(Expr::call("ready", vec![Expr::int(5)]));
    assert!(matches!(
        eval(&awaited),
        Err(Signal::Fault(RuntimeError::UnexpectedSuspend))
    ));

    let host = Host::with_defaults();
    let mut slots = Slots::default();
    let mut direct = Evaluator::direct(&mut slots, &host);
    assert_eq!(direct.evaluate(&awaited), Ok(Value::Int(5)));
    assert_eq!(direct.evaluate(&Expr::awaiting(Expr::int(6))), Ok(Value::Int(6)));
    assert!(matches!(
        direct.evaluate(&Expr::awaiting(Expr::call("delay", vec![Expr::int(1)]))),
        Err(Signal::Fault(RuntimeError::Stalled))
    ));
    direct
        .evaluate(&Expr::yielding(Expr::int(8)))
        .expect("yield in place");
    assert_eq!(direct.take_yields(), vec![Value::Int(8)]);
}

#[test]
fn test_unknown_host_function_faults() {
    assert!(matches!(
        eval(&Expr::call("missing", vec![])),
        Err(Signal::Fault(RuntimeError::UnknownFunction { name })) if name == "missing"
    ));
}
