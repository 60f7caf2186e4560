use criterion::{black_box, criterion_group, criterion_main, Criterion};

use weft::{execute, Chain, Completion, Context, Interceptor, StepReturn, Value};

fn increment(input: Value) -> Value {
    Value::Int(input.as_int().unwrap_or(0) + 1)
}

fn passthrough_chain(depth: usize) -> Chain {
    let mut chain = Chain::new();
    for i in 0..depth {
        chain = chain.then(
            Interceptor::named(format!("i{i}"))
                .on_enter(|ctx: Context| ctx)
                .on_leave(|ctx: Context| ctx),
        );
    }
    chain.then(increment as fn(Value) -> Value)
}

fn resolved_handle_chain(depth: usize) -> Chain {
    let mut chain = Chain::new();
    for i in 0..depth {
        chain = chain.then(
            Interceptor::named(format!("r{i}"))
                .on_enter(|ctx: Context| StepReturn::suspended(Completion::resolved(ctx))),
        );
    }
    chain.then(increment as fn(Value) -> Value)
}

fn bench_sync_chain(c: &mut Criterion) {
    let chain = passthrough_chain(32);
    c.bench_function("sync_chain_depth_32", |b| {
        b.iter(|| execute(black_box(&chain), black_box(7i64)))
    });
}

fn bench_resolved_suspensions(c: &mut Criterion) {
    let chain = resolved_handle_chain(32);
    c.bench_function("resolved_suspensions_depth_32", |b| {
        b.iter(|| execute(black_box(&chain), black_box(7i64)))
    });
}

fn bench_dynamic_insertion(c: &mut Criterion) {
    let chain = Chain::new()
        .then(Interceptor::named("inserter").on_enter(|ctx: Context| {
            ctx.push_next(Interceptor::named("inserted").on_leave(|ctx: Context| ctx))
        }))
        .then(increment as fn(Value) -> Value);
    c.bench_function("dynamic_insertion", |b| {
        b.iter(|| execute(black_box(&chain), black_box(7i64)))
    });
}

criterion_group!(
    benches,
    bench_sync_chain,
    bench_resolved_suspensions,
    bench_dynamic_insertion
);
criterion_main!(benches);
