use chd_table::{Builder, Config};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

fn build(c: &mut Criterion) {
    let mut group = c.benchmark_group("chd build");
    group.sample_size(10);

    for item_count in [1_000, 10_000, 100_000] {
        group.bench_function(format!("{item_count} items"), |b| {
            b.iter_batched(
                || {
                    let mut builder = Builder::with_config(Config::default().rng_seed(7));
                    builder.extend((0..item_count).map(|i| (format!("key-{i}"), format!("value-{i}"))));
                    builder
                },
                |builder| builder.build().unwrap(),
                BatchSize::LargeInput,
            );
        });
    }
}

criterion_group!(benches, build);
criterion_main!(benches);
