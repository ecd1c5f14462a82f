//! Lowering benchmarks.
//!
//! Measures visitor, optimizer and dispatch construction over synthetic
//! regions of growing size.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use resumable_ast::{AstBuilder, CatchHandler, Expr, SuspendKind};
use resumable_lowering::options::LoweringOptions;
use resumable_lowering::{lower, lower_body};

// =============================================================================
// Region Generators
// =============================================================================

/// `await { x = 0; x = x + await f(0); ...; x }`
fn straight_awaits(count: usize) -> Expr {
    let mut ast = AstBuilder::new();
    let x = ast.int_var("x");
    let mut body = vec![Expr::assign(&x, Expr::int(0))];
    for i in 0..count {
        body.push(Expr::assign(
            &x,
            Expr::add(
                Expr::var(&x),
                Expr::awaiting(Expr::call("ready", vec![Expr::int(i as i64)])),
            ),
        ));
    }
    body.push(Expr::var(&x));
    Expr::resumable(SuspendKind::Await, Expr::block(vec![x], body))
}

/// Nested try regions with an await in every body, handler and finally.
fn nested_tries(depth: usize) -> Expr {
    let mut inner = Expr::awaiting(Expr::call("ready", vec![Expr::int(0)]));
    for level in 0..depth {
        let await_at = |tag: i64| Expr::awaiting(Expr::call("ready", vec![Expr::int(tag)]));
        inner = Expr::try_catch_finally(
            Expr::seq(vec![inner, await_at(level as i64)]),
            vec![CatchHandler::catch_all(await_at(-1))],
            await_at(-2),
        );
    }
    Expr::resumable(SuspendKind::Await, inner)
}

/// Counting generator with branches in the loop body.
fn branching_generator(arms: usize) -> Expr {
    let mut ast = AstBuilder::new();
    let i = ast.int_var("i");
    let done = ast.label("done");
    let mut step = Expr::yielding(Expr::var(&i));
    for arm in 0..arms {
        step = Expr::cond(
            Expr::eq(Expr::var(&i), Expr::int(arm as i64)),
            Expr::yielding(Expr::int(arm as i64 * 10)),
            step,
        );
    }
    let body = Expr::seq(vec![
        Expr::if_then(Expr::ge(Expr::var(&i), Expr::int(100)), Expr::break_to(&done, None)),
        step,
        Expr::assign(&i, Expr::add(Expr::var(&i), Expr::int(1))),
    ]);
    Expr::resumable(
        SuspendKind::Yield,
        Expr::block(
            vec![i.clone()],
            vec![
                Expr::assign(&i, Expr::int(0)),
                Expr::looping(body, Some(done), None),
            ],
        ),
    )
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_lowering(c: &mut Criterion) {
    let mut group = c.benchmark_group("lowering");
    for size in [4usize, 32, 128] {
        let cases = [
            ("straight_awaits", straight_awaits(size)),
            ("nested_tries", nested_tries(size.min(16))),
            ("branching_generator", branching_generator(size)),
        ];
        for (name, region) in cases {
            group.bench_with_input(BenchmarkId::new(name, size), &region, |b, region| {
                let options = LoweringOptions::default();
                b.iter(|| lower(black_box(region), &options));
            });
        }
    }
    group.finish();
}

fn bench_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimizer");
    let region = straight_awaits(64);
    let Expr::Resumable { kind, body } = &region else {
        return;
    };
    for (name, options) in [
        ("unoptimized", LoweringOptions::unoptimized()),
        ("optimized", LoweringOptions::default()),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| lower_body(*kind, black_box(body), &options));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lowering, bench_optimizer);
criterion_main!(benches);
