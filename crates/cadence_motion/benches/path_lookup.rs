//! Benchmarks for path sampling, direct walk versus lookup table.

use cadence_motion::{Path, PathBuilder, PathState};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn wavy_path(segments: usize) -> Path {
    let mut builder = PathBuilder::new().move_to(0.0, 0.0);
    for i in 0..segments {
        let x = i as f64 * 100.0;
        builder = builder.cubic_to(x + 25.0, 80.0, x + 75.0, -80.0, x + 100.0, 0.0);
    }
    builder.build()
}

fn bench_sampling(c: &mut Criterion) {
    let direct = PathState::new(wavy_path(32));
    let mut lookup = PathState::new(wavy_path(32));
    lookup.setup_performance_mode(None);

    c.bench_function("point_direct_32", |b| {
        b.iter(|| direct.point(black_box(0.73)))
    });

    c.bench_function("point_lookup_32", |b| {
        b.iter(|| lookup.lookup_point(black_box(0.73)))
    });

    c.bench_function("move_point_lookup_32", |b| {
        b.iter(|| lookup.move_point(black_box(1.12), 0.0, 1.0))
    });
}

fn bench_table_generation(c: &mut Criterion) {
    c.bench_function("setup_performance_mode_32", |b| {
        b.iter(|| {
            let mut state = PathState::new(wavy_path(32));
            state.setup_performance_mode(None);
            black_box(state.lookup_table_len())
        })
    });
}

criterion_group!(benches, bench_sampling, bench_table_generation);
criterion_main!(benches);
