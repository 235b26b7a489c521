//! Criterion benchmarks for cut matrix and index matrix construction.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use quantile_hist::prelude::*;

fn make_features(num_rows: usize, num_features: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((num_rows, num_features), |_| {
        if rng.gen_bool(0.1) {
            f32::NAN
        } else {
            rng.gen_range(-10.0..10.0)
        }
    })
}

fn config(max_bin: usize) -> HistConfig {
    HistConfigBuilder::new()
        .max_bin(max_bin)
        .verbosity(-1)
        .build()
        .unwrap()
}

fn bench_cut_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("cut_matrix");
    group.sample_size(10);
    for &rows in &[10_000usize, 100_000] {
        let dmat = SparsePageDMatrix::from_dense(&make_features(rows, 20, 42), None).unwrap();
        let builder = CutMatrixBuilder::new(config(256));
        group.bench_with_input(BenchmarkId::new("rows_x20", rows), &dmat, |b, dmat| {
            b.iter(|| builder.build(black_box(dmat)).unwrap());
        });
    }
    group.finish();
}

fn bench_index_matrix(c: &mut Criterion) {
    let dmat = SparsePageDMatrix::from_dense(&make_features(100_000, 20, 43), None).unwrap();
    let cut = Arc::new(CutMatrixBuilder::new(config(256)).build(&dmat).unwrap());
    let binner = IndexBinner::new(config(256)).with_cut_matrix(cut);

    c.bench_function("index_matrix_100000x20", |b| {
        b.iter(|| binner.build(black_box(&dmat)).unwrap());
    });
}

fn bench_build_hist(c: &mut Criterion) {
    let dmat = SparsePageDMatrix::from_dense(&make_features(100_000, 20, 44), None).unwrap();
    let cut = Arc::new(CutMatrixBuilder::new(config(256)).build(&dmat).unwrap());
    let gmat = GHistIndexMatrix::init(&dmat, cut).unwrap();
    let builder = GHistBuilder::for_matrix(&gmat);

    let mut rng = StdRng::seed_from_u64(45);
    let gpair: Vec<GradientPair> = (0..gmat.num_rows())
        .map(|_| GradientPair::new(rng.gen_range(-1.0..1.0), 1.0))
        .collect();
    let rows: Vec<usize> = (0..gmat.num_rows()).collect();

    c.bench_function("build_hist_100000x20", |b| {
        b.iter(|| builder.build_hist(&gpair, black_box(&rows), &gmat).unwrap());
    });
}

criterion_group!(benches, bench_cut_matrix, bench_index_matrix, bench_build_hist);
criterion_main!(benches);
