use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use prvm::vm::{self, Builder, Builtins, Config, EdictStore, Op};

/// A function that counts from zero to its argument and returns the result.
fn counting_loop() -> (vm::Program, vm::FunctionId) {
    let mut builder = Builder::new("bench");
    let one = builder.constant(1.0);

    let count = builder.function("count", &[1], 6);
    let (n, i, t) = (count.local(0), count.local(1), count.local(2));
    builder.emit(Op::StoreF, 0, i, 0);
    let top = builder.emit(Op::Lt, i, n, t);
    let exit = builder.emit(Op::IfNot, t, 0, 0);
    builder.emit(Op::AddF, i, one, i);
    builder.emit(Op::Goto, top as i32, 0, 0);
    let done = builder.emit(Op::Return, i, 0, 0);
    builder.patch(exit, done);

    let program = builder.finish().unwrap_or_else(|error| panic!("{}", error));
    (program, count.id)
}

/// A function that calls an empty function its argument times.
fn calls() -> (vm::Program, vm::FunctionId) {
    let mut builder = Builder::new("bench");
    let one = builder.constant(1.0);

    let empty = builder.function("empty", &[], 0);
    builder.emit(Op::Done, 0, 0, 0);

    let call = builder.function("call", &[1], 6);
    let (n, i, t) = (call.local(0), call.local(1), call.local(2));
    builder.emit(Op::StoreF, 0, i, 0);
    let top = builder.emit(Op::Lt, i, n, t);
    let exit = builder.emit(Op::IfNot, t, 0, 0);
    builder.emit(Op::Call0, empty.global, 0, 0);
    builder.emit(Op::AddF, i, one, i);
    builder.emit(Op::Goto, top as i32, 0, 0);
    let done = builder.emit(Op::Return, i, 0, 0);
    builder.patch(exit, done);

    let program = builder.finish().unwrap_or_else(|error| panic!("{}", error));
    (program, call.id)
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let builtins = Builtins::new();

    for iterations in [1_000u32, 100_000] {
        group.throughput(Throughput::Elements(iterations as u64));

        let (mut program, count) = counting_loop();
        let mut world = EdictStore::new(0);
        let mut thread = vm::Thread::new(Config { profile: false, ..Config::default() });
        group.bench_with_input(BenchmarkId::new("loop", iterations), &iterations, |b, &iterations| {
            b.iter(|| {
                program.set_parm(0, iterations as f32);
                thread.execute_program(&mut program, &mut world, &builtins, count)
                    .unwrap_or_else(|error| panic!("{}", error));
                black_box(program.return_value())
            })
        });

        let (mut program, call) = calls();
        group.bench_with_input(BenchmarkId::new("calls", iterations), &iterations, |b, &iterations| {
            b.iter(|| {
                program.set_parm(0, iterations as f32);
                thread.execute_program(&mut program, &mut world, &builtins, call)
                    .unwrap_or_else(|error| panic!("{}", error));
                black_box(program.return_value())
            })
        });
    }

    group.finish();
}

fn bench_profiled(c: &mut Criterion) {
    let builtins = Builtins::new();
    let (mut program, count) = counting_loop();
    let mut world = EdictStore::new(0);
    let config = Config {
        statement_profile: true,
        coverage: vm::Coverage { functions: true, statements: true },
        ..Config::default()
    };
    let mut thread = vm::Thread::new(config);

    c.bench_function("dispatch/profiled", |b| {
        b.iter(|| {
            program.set_parm(0, 10_000.0);
            thread.execute_program(&mut program, &mut world, &builtins, count)
                .unwrap_or_else(|error| panic!("{}", error));
            black_box(program.return_value())
        })
    });
}

criterion_group!(benches, bench_dispatch, bench_profiled);
criterion_main!(benches);
