//! Shared data generators for the integration tests.

#![allow(dead_code)]

use ndarray::{Array1, Array2};
use quantile_hist::*;
use rand::prelude::*;

/// Uniform dense features in `[-5, 5)`
pub fn create_dense_features(num_rows: usize, num_features: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((num_rows, num_features), |_| rng.gen_range(-5.0..5.0))
}

/// Dense features where roughly `missing_rate` of the cells are NaN
pub fn create_sparse_features(
    num_rows: usize,
    num_features: usize,
    missing_rate: f64,
    seed: u64,
) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((num_rows, num_features), |_| {
        if rng.gen_bool(missing_rate) {
            f32::NAN
        } else {
            rng.gen_range(-100.0..100.0)
        }
    })
}

/// Features with few distinct values, rounded to integers in `[0, levels)`
pub fn create_discrete_features(
    num_rows: usize,
    num_features: usize,
    levels: u32,
    seed: u64,
) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((num_rows, num_features), |_| rng.gen_range(0..levels) as f32)
}

/// Positive row weights in `[0.1, 2.0)`
pub fn create_weights(num_rows: usize, seed: u64) -> Array1<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array1::from_shape_fn(num_rows, |_| rng.gen_range(0.1..2.0))
}

pub fn dmatrix(features: &Array2<f32>) -> SparsePageDMatrix {
    SparsePageDMatrix::from_dense(features, None).unwrap()
}

/// Configuration for tests with a fixed thread count
pub fn test_config(max_bin: usize, num_threads: usize) -> HistConfig {
    HistConfigBuilder::new()
        .max_bin(max_bin)
        .num_threads(num_threads)
        .verbosity(-1)
        .build()
        .unwrap()
}

/// Present values of feature `fid`, in row order
pub fn feature_values(features: &Array2<f32>, fid: usize) -> Vec<f32> {
    features
        .column(fid)
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .collect()
}

/// Check the structural cut matrix invariants against the source data
pub fn assert_cut_invariants(cut: &HistCutMatrix, features: &Array2<f32>) {
    let row_ptr = cut.row_ptr();
    assert_eq!(row_ptr[0], 0);
    assert!(row_ptr.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(cut.num_features(), features.ncols());

    for fid in 0..cut.num_features() {
        let cuts = cut.feature_cuts(fid);
        assert!(!cuts.is_empty(), "feature {} has no sentinel", fid);
        assert!(
            cuts.windows(2).all(|w| w[0] < w[1]),
            "feature {} cuts not strictly increasing: {:?}",
            fid,
            cuts
        );
        let sentinel = cuts[cuts.len() - 1];
        for v in feature_values(features, fid) {
            assert!(v < sentinel, "feature {} value {} >= sentinel {}", fid, v, sentinel);
        }
    }
}

/// Check the structural index matrix invariants against the source data
pub fn assert_index_invariants(gmat: &GHistIndexMatrix, features: &Array2<f32>) {
    assert_eq!(gmat.num_rows(), features.nrows());
    for (r, row) in features.rows().into_iter().enumerate() {
        let present = row.iter().filter(|v| !v.is_nan()).count();
        assert_eq!(gmat.row_ptr()[r + 1] - gmat.row_ptr()[r], present);
        assert!(gmat.row(r).windows(2).all(|w| w[0] <= w[1]));
    }
    assert_eq!(
        gmat.hit_count().iter().sum::<usize>(),
        features.iter().filter(|v| !v.is_nan()).count()
    );
}
