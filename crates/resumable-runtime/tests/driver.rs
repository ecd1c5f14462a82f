use super::*;
use resumable_ast::{AstBuilder, CatchHandler, GotoKind, Operator, SwitchCase, ValueType};
use resumable_lowering::LoweringOptions;

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(name, args)
}

fn ready(value: Expr) -> Expr {
    Expr::awaiting(call("ready", vec![value]))
}

fn log(value: Expr) -> Expr {
    call("log", vec![value])
}

fn error(kind: &str) -> Expr {
    call("error", vec![Expr::str(kind), Expr::str("raised")])
}

fn await_region(body: Expr) -> Expr {
    Expr::resumable(SuspendKind::Await, body)
}

/// Result, yields and host log of one run.
type Observed = (std::result::Result<Value, Exception>, Vec<Value>, Vec<Value>);

fn run_lowered(region: &Expr, options: &LoweringOptions) -> Observed {
    let host = Arc::new(Host::with_defaults());
    let mut machine =
        StateMachine::from_expr(region, options, Arc::clone(&host)).expect("region should lower");
    let outcome = match machine.kind() {
        SuspendKind::Await => run_to_completion(&mut machine),
        SuspendKind::Yield => collect_yields(&mut machine, []),
    }
    .expect("machine runs");
    (outcome.result, outcome.yields, host.log())
}

fn run_reference(region: &Expr) -> Observed {
    let host = Host::with_defaults();
    let outcome = run_direct(region, &host).expect("direct evaluation runs");
    (outcome.result, outcome.yields, host.log())
}

/// The lowered machine, optimized or not, behaves like the tree itself.
fn assert_equivalent(name: &str, region: &Expr) {
    let reference = run_reference(region);
    let optimized = run_lowered(region, &LoweringOptions::default());
    let unoptimized = run_lowered(region, &LoweringOptions::unoptimized());
    assert_eq!(optimized, reference, "{name}: optimized machine diverges");
    assert_eq!(unoptimized, reference, "{name}: unoptimized machine diverges");
}

// =============================================================================
// Equivalence with direct evaluation
// =============================================================================

#[test]
fn test_operands_across_awaits() {
    let region = await_region(Expr::add(
        ready(Expr::int(2)),
        Expr::op(Operator::Mul, vec![ready(Expr::int(3)), Expr::int(4)]),
    ));
    assert_equivalent("operands", &region);
    assert_eq!(run_reference(&region).0, Ok(Value::Int(14)));
}

#[test]
fn test_switch_with_suspending_arms() {
    let region = await_region(Expr::switch(
        ready(Expr::int(2)),
        vec![
            SwitchCase::new(vec![Expr::int(1)], ready(Expr::int(10))),
            SwitchCase::new(
                vec![Expr::int(2)],
                Expr::add(ready(Expr::int(20)), Expr::int(1)),
            ),
        ],
        Some(Expr::int(0)),
    ));
    assert_equivalent("switch", &region);
    assert_eq!(run_reference(&region).0, Ok(Value::Int(21)));
}

#[test]
fn test_break_out_of_try_finally_in_loop() {
    let mut b = AstBuilder::new();
    let i = b.int_var("i");
    let acc = b.int_var("acc");
    let done = b.label("done");
    let body = Expr::try_finally(
        Expr::seq(vec![
            Expr::if_then(Expr::ge(Expr::var(&i), Expr::int(3)), Expr::break_to(&done, None)),
            Expr::assign(&acc, Expr::add(Expr::var(&acc), ready(Expr::var(&i)))),
        ]),
        Expr::seq(vec![
            log(Expr::var(&i)),
            Expr::assign(&i, Expr::add(Expr::var(&i), Expr::int(1))),
        ]),
    );
    let region = await_region(Expr::block(
        vec![i.clone(), acc.clone()],
        vec![
            Expr::assign(&i, Expr::int(0)),
            Expr::assign(&acc, Expr::int(0)),
            Expr::looping(body, Some(done), None),
            Expr::var(&acc),
        ],
    ));
    assert_equivalent("loop with finally", &region);
    let (result, _, logged) = run_reference(&region);
    assert_eq!(result, Ok(Value::Int(3)));
    assert_eq!(logged.len(), 4);
}

#[test]
fn test_exception_through_inner_finally_to_outer_catch() {
    let region = await_region(Expr::try_catch(
        Expr::try_finally(
            Expr::seq(vec![ready(Expr::int(1)), Expr::throw(error("E"))]),
            log(Expr::str("inner finally")),
        ),
        vec![CatchHandler::of("E", None, ready(Expr::int(5)))],
    ));
    assert_equivalent("nested try", &region);
    assert_eq!(run_reference(&region).0, Ok(Value::Int(5)));
}

#[test]
fn test_uncaught_exception() {
    let region = await_region(Expr::seq(vec![ready(Expr::int(1)), Expr::throw(error("Fatal"))]));
    assert_equivalent("uncaught", &region);
    assert_eq!(
        run_reference(&region).0,
        Err(Exception::new("Fatal", "raised"))
    );
}

#[test]
fn test_rethrow_from_suspending_catch() {
    let mut b = AstBuilder::new();
    let e = b.variable("e", ValueType::Any);
    let region = await_region(Expr::try_catch(
        Expr::try_catch(
            Expr::throw(error("A")),
            vec![CatchHandler::of(
                "A",
                None,
                Expr::seq(vec![ready(Expr::int(0)), Expr::rethrow()]),
            )],
        ),
        vec![CatchHandler::of("A", Some(e.clone()), Expr::add(Expr::str("caught "), Expr::var(&e)))],
    ));
    assert_equivalent("rethrow", &region);
    assert_eq!(
        run_reference(&region).0,
        Ok(Value::str("caught A: raised"))
    );
}

#[test]
fn test_suspending_finally_after_catch() {
    let region = await_region(Expr::try_catch_finally(
        Expr::seq(vec![ready(Expr::int(1)), Expr::throw(error("E"))]),
        vec![CatchHandler::catch_all(Expr::int(5))],
        log(ready(Expr::str("fin"))),
    ));
    assert_equivalent("suspending finally", &region);
    let (result, _, logged) = run_reference(&region);
    assert_eq!(result, Ok(Value::Int(5)));
    assert_eq!(logged, vec![Value::str("fin")]);
}

#[test]
fn test_early_return() {
    let mut b = AstBuilder::new();
    let exit = b.label("return");
    let region = await_region(Expr::seq(vec![
        ready(Expr::int(1)),
        Expr::if_then(Expr::bool(true), Expr::ret(&exit, Some(Expr::int(42)))),
        log(Expr::str("after return")),
        Expr::int(0),
    ]));
    assert_equivalent("return", &region);
    assert_eq!(run_reference(&region).0, Ok(Value::Int(42)));
}

#[test]
fn test_forward_goto_over_code() {
    let mut b = AstBuilder::new();
    let skip = b.label("skip");
    let region = await_region(Expr::seq(vec![
        ready(Expr::int(1)),
        Expr::goto(&skip),
        log(Expr::str("skipped")),
        Expr::label(&skip),
        Expr::int(9),
    ]));
    assert_equivalent("goto", &region);
    let (result, _, logged) = run_reference(&region);
    assert_eq!(result, Ok(Value::Int(9)));
    assert!(logged.is_empty());
}

#[test]
fn test_forward_goto_carries_value_to_label() {
    let mut b = AstBuilder::new();
    let done = b.label("done");
    let region = await_region(Expr::seq(vec![
        ready(Expr::int(1)),
        Expr::if_then(
            Expr::bool(true),
            Expr::Goto {
                target: done.clone(),
                kind: GotoKind::Goto,
                value: Some(Box::new(Expr::int(5))),
            },
        ),
        log(Expr::str("skipped")),
        Expr::Label {
            target: done,
            default: Some(Box::new(Expr::int(6))),
        },
    ]));
    assert_equivalent("goto with value", &region);
    let (result, _, logged) = run_lowered(&region, &LoweringOptions::default());
    assert_eq!(result, Ok(Value::Int(5)));
    assert!(logged.is_empty());
}

#[test]
fn test_label_default_on_fallthrough() {
    let mut b = AstBuilder::new();
    let done = b.label("done");
    let region = await_region(Expr::seq(vec![
        ready(Expr::int(1)),
        Expr::if_then(
            Expr::bool(false),
            Expr::Goto {
                target: done.clone(),
                kind: GotoKind::Goto,
                value: Some(Box::new(Expr::int(5))),
            },
        ),
        Expr::Label {
            target: done,
            default: Some(Box::new(Expr::int(6))),
        },
    ]));
    assert_equivalent("label fallthrough", &region);
    assert_eq!(run_reference(&region).0, Ok(Value::Int(6)));
}

#[test]
fn test_break_value_from_plain_code() {
    let mut b = AstBuilder::new();
    let brk = b.label("brk");
    let region = await_region(Expr::looping(
        Expr::seq(vec![
            ready(Expr::int(1)),
            Expr::if_then(Expr::bool(true), Expr::break_to(&brk, Some(Expr::int(7)))),
        ]),
        Some(brk),
        None,
    ));
    assert_equivalent("break with value", &region);
    assert_eq!(run_reference(&region).0, Ok(Value::Int(7)));
}

#[test]
fn test_counting_generator() {
    let mut b = AstBuilder::new();
    let i = b.int_var("i");
    let done = b.label("done");
    let body = Expr::seq(vec![
        Expr::if_then(Expr::ge(Expr::var(&i), Expr::int(3)), Expr::break_to(&done, None)),
        Expr::yielding(Expr::var(&i)),
        Expr::assign(&i, Expr::add(Expr::var(&i), Expr::int(1))),
    ]);
    let region = Expr::resumable(
        SuspendKind::Yield,
        Expr::block(
            vec![i.clone()],
            vec![
                Expr::assign(&i, Expr::int(0)),
                Expr::looping(body, Some(done), None),
            ],
        ),
    );
    assert_equivalent("generator", &region);
    assert_eq!(
        run_reference(&region).1,
        vec![Value::Int(0), Value::Int(1), Value::Int(2)]
    );
}

// =============================================================================
// Drivers
// =============================================================================

#[test]
fn test_direct_evaluation_requires_a_region() {
    let host = Host::with_defaults();
    assert_eq!(
        run_direct(&Expr::int(1), &host),
        Err(RuntimeError::Lowering(LoweringError::NotARegion))
    );
}

#[test]
fn test_stalled_await_is_reported() {
    // A completion nobody holds a handle to complete.
    let mut stuck = Host::with_defaults();
    stuck.register("never", |_, _| Ok(Value::Awaitable(Completion::new())));
    let region = await_region(Expr::awaiting(call("never", vec![])));
    let mut machine = StateMachine::from_expr(&region, &LoweringOptions::default(), Arc::new(stuck))
        .expect("lowers");
    assert_eq!(run_to_completion(&mut machine), Err(RuntimeError::Stalled));
    assert!(machine.state().is_some(), "the machine stays suspended");
}

#[test]
fn test_drive_resumes_on_the_completing_thread() {
    let host = Arc::new(Host::with_defaults());
    let region = await_region(Expr::add(
        Expr::awaiting(call("delay", vec![Expr::int(1)])),
        Expr::awaiting(call("delay", vec![Expr::int(2)])),
    ));
    let machine = StateMachine::from_expr(&region, &LoweringOptions::default(), Arc::clone(&host))
        .expect("lowers");
    let result = drive(machine).expect("await machines can be driven");

    let worker = {
        let host = Arc::clone(&host);
        let result = result.clone();
        std::thread::spawn(move || {
            let mut completed = 0;
            while !result.is_completed() {
                completed += host.complete_pending();
                std::thread::yield_now();
            }
            completed
        })
    };
    assert_eq!(result.wait(), Ok(Value::Int(3)));
    assert_eq!(worker.join().expect("worker thread"), 2);
}

#[test]
fn test_drive_reports_faults_through_the_completion() {
    let host = Arc::new(Host::with_defaults());
    let region = await_region(Expr::seq(vec![
        Expr::awaiting(call("delay", vec![Expr::int(1)])),
        Expr::throw(error("Late")),
    ]));
    let machine = StateMachine::from_expr(&region, &LoweringOptions::default(), Arc::clone(&host))
        .expect("lowers");
    let result = drive(machine).expect("driven");
    assert!(!result.is_completed());
    host.complete_pending();
    assert_eq!(result.wait(), Err(Exception::new("Late", "raised")));
}
