use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use multiquad_env::{Action, BatchEnv, EnvConfig, EnvRegistry, RngKey, DEFAULT_ENV};

fn bench_single(c: &mut Criterion) {
    let env = EnvRegistry::with_defaults()
        .make(DEFAULT_ENV, &EnvConfig::default())
        .unwrap();
    let key = RngKey::new(0);

    c.bench_function("reset", |b| b.iter(|| env.reset(black_box(&key)).unwrap()));

    let state = env.reset(&key).unwrap();
    let action = Action([-0.2; 8]);
    c.bench_function("step", |b| {
        b.iter(|| env.step(black_box(&state), black_box(&action)).unwrap())
    });
}

fn bench_batch(c: &mut Criterion) {
    let env = EnvRegistry::with_defaults()
        .make(DEFAULT_ENV, &EnvConfig::default())
        .unwrap();
    let batch = BatchEnv::new(env);
    let keys = RngKey::new(1).split_many(64);
    let actions = vec![Action([-0.2; 8]); keys.len()];

    c.bench_function("step_all_64", |b| {
        b.iter_batched(
            || batch.reset_all(&keys).unwrap(),
            |states| batch.step_all(&states, &actions).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_single, bench_batch);
criterion_main!(benches);
