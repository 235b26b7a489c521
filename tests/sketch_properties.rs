//! Property tests for summaries, the reducer and the two builders.

mod common;

use common::*;
use ndarray::Array2;
use proptest::prelude::*;
use quantile_hist::*;
use std::sync::Arc;

fn summary_of(values: &[f32]) -> WQSummary {
    let mut sketch = WeightedQuantileSketch::new(values.len().max(1), 0.01).unwrap();
    for &v in values {
        sketch.push(v, 1.0).unwrap();
    }
    sketch.get_summary()
}

/// Error a prune to `capacity` entries may add on top of twice the input error
fn prune_slack(total: f64, capacity: usize) -> f64 {
    2.0 * total / (capacity.max(2) - 1) as f64 + 1e-9 * total.max(1.0)
}

fn values_strategy() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1000i32..1000, 1..400)
        .prop_map(|v| v.into_iter().map(|x| x as f32 * 0.25).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_summary_rank_bounds(values in values_strategy()) {
        let summary = summary_of(&values);
        prop_assert!(summary.check_valid(1e-6).is_ok());
        for e in summary.entries() {
            let below = values.iter().filter(|&&v| v < e.value).count() as f64;
            let at_or_below = values.iter().filter(|&&v| v <= e.value).count() as f64;
            let equal = at_or_below - below;
            prop_assert!(e.rmin <= below + 1e-9);
            prop_assert!(e.rmax >= at_or_below - 1e-9);
            prop_assert!(e.wmin <= equal + 1e-9);
        }
    }

    #[test]
    fn prop_merge_then_prune_sizes(
        a in values_strategy(),
        b in values_strategy(),
        target in 2usize..64,
    ) {
        let sa = summary_of(&a);
        let sb = summary_of(&b);
        let merged = WQSummary::combine(&sa, &sb);
        prop_assert!(merged.len() <= sa.len() + sb.len());
        prop_assert_eq!(merged.max_rank(), (a.len() + b.len()) as f64);

        let pruned = WQSummary::set_prune(&merged, target);
        prop_assert_eq!(pruned.len(), target.min(merged.len()));
        prop_assert_eq!(pruned.entries()[0], merged.entries()[0]);
        prop_assert_eq!(pruned.entries().last(), merged.entries().last());
    }

    #[test]
    fn prop_prune_error_stays_bounded(
        values in values_strategy(),
        capacity in 2usize..64,
    ) {
        let summary = summary_of(&values);
        let total = summary.max_rank();
        let pruned = WQSummary::set_prune(&summary, capacity);
        prop_assert!(pruned.check_valid(1e-9).is_ok());
        let bound = 2.0 * summary.max_error() + prune_slack(total, capacity);
        prop_assert!(
            pruned.max_error() <= bound,
            "pruned error {} above {}",
            pruned.max_error(),
            bound
        );
    }

    #[test]
    fn prop_reducer_merge_error_stays_bounded(
        a in values_strategy(),
        b in values_strategy(),
        capacity in 2usize..64,
    ) {
        let reducer = SketchReducer::new(capacity);
        let sa = WQSummary::set_prune(&summary_of(&a), capacity);
        let sb = WQSummary::set_prune(&summary_of(&b), capacity);

        let combined = WQSummary::combine(&sa, &sb);
        prop_assert!(combined.max_error() <= sa.max_error() + sb.max_error() + 1e-9);

        let merged = reducer.merge(&sa, &sb);
        prop_assert!(merged.len() <= capacity.max(2));
        let bound = 2.0 * (sa.max_error() + sb.max_error())
            + prune_slack(merged.max_rank(), capacity);
        prop_assert!(
            merged.max_error() <= bound,
            "merged error {} above {}",
            merged.max_error(),
            bound
        );
    }

    #[test]
    fn prop_reducer_merge_is_symmetric(a in values_strategy(), b in values_strategy()) {
        let reducer = SketchReducer::new(32);
        let sa = WQSummary::set_prune(&summary_of(&a), 32);
        let sb = WQSummary::set_prune(&summary_of(&b), 32);
        prop_assert_eq!(reducer.merge(&sa, &sb), reducer.merge(&sb, &sa));
    }

    #[test]
    fn prop_cut_and_index_invariants(
        rows in 1usize..120,
        cols in 1usize..5,
        max_bin in 2usize..20,
        seed in any::<u64>(),
    ) {
        let features: Array2<f32> = create_sparse_features(rows, cols, 0.3, seed);
        let config = test_config(max_bin, 2);
        let dmat = dmatrix(&features).with_batch_size(17);

        let cut = Arc::new(CutMatrixBuilder::new(config.clone()).build(&dmat).unwrap());
        assert_cut_invariants(&cut, &features);
        for fid in 0..cols {
            prop_assert!(cut.num_bins(fid) <= max_bin);
        }

        let gmat = IndexBinner::new(config)
            .with_cut_matrix(cut)
            .build(&dmat)
            .unwrap();
        assert_index_invariants(&gmat, &features);
    }
}
