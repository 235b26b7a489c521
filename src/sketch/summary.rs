//! Weighted quantile summaries.
//!
//! A [`WQSummary`] is an ordered list of [`SummaryEntry`] values, each
//! carrying the minimum and maximum rank (cumulative weight) it can occupy
//! in the stream it summarizes, plus the minimum weight known to sit exactly
//! at that value. Summaries support the two operations the sketch and the
//! cross-worker reduction are built from:
//!
//! - [`WQSummary::combine`]: exact merge of two summaries; the error of the
//!   result is bounded by the sum of the input errors.
//! - [`WQSummary::set_prune`]: reduce to a fixed number of entries picked at
//!   evenly spaced rank targets.
//!
//! A third, internal operation [`WQSummary::compress`] is used by the
//! streaming sketch for its level compaction.

use crate::core::error::{HistError, Result};
use crate::core::types::{FeatureValue, Rank};
use serde::{Deserialize, Serialize};

/// One data point of a weighted quantile summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Summarized value
    pub value: FeatureValue,
    /// Lower bound on the weight strictly below `value`
    pub rmin: Rank,
    /// Upper bound on the weight at or below `value`
    pub rmax: Rank,
    /// Lower bound on the weight exactly at `value`
    pub wmin: Rank,
}

impl SummaryEntry {
    pub fn new(rmin: Rank, rmax: Rank, wmin: Rank, value: FeatureValue) -> Self {
        SummaryEntry {
            value,
            rmin,
            rmax,
            wmin,
        }
    }

    /// Minimum rank the next larger value can have
    #[inline]
    pub fn rmin_next(&self) -> Rank {
        self.rmin + self.wmin
    }

    /// Maximum rank the previous smaller value can have
    #[inline]
    pub fn rmax_prev(&self) -> Rank {
        self.rmax - self.wmin
    }
}

/// Ordered weighted quantile summary.
///
/// Invariants after every public operation: values strictly increasing,
/// `rmin` and `rmax` non-decreasing, the first entry has `rmin == 0` and
/// the last entry has `rmax` equal to the total weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WQSummary {
    data: Vec<SummaryEntry>,
}

impl WQSummary {
    /// Empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary over entries that already satisfy the ordering invariants
    pub fn from_entries(data: Vec<SummaryEntry>) -> Self {
        WQSummary { data }
    }

    /// Exact summary of a sorted list of `(value, weight)` pairs. Equal
    /// consecutive values are folded into one entry.
    pub(crate) fn from_sorted_weighted(pairs: &[(FeatureValue, Rank)]) -> Self {
        let mut data = Vec::with_capacity(pairs.len());
        let mut wsum: Rank = 0.0;
        let mut i = 0;
        while i < pairs.len() {
            let value = pairs[i].0;
            let mut w = pairs[i].1;
            let mut j = i + 1;
            while j < pairs.len() && pairs[j].0 == value {
                w += pairs[j].1;
                j += 1;
            }
            data.push(SummaryEntry::new(wsum, wsum + w, w, value));
            wsum += w;
            i = j;
        }
        WQSummary { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn entries(&self) -> &[SummaryEntry] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Total weight summarized (rank of the last entry)
    pub fn max_rank(&self) -> Rank {
        self.data.last().map_or(0.0, |e| e.rmax)
    }

    /// Maximum rank uncertainty across entries and across the gaps between
    /// adjacent entries.
    pub fn max_error(&self) -> Rank {
        let Some(first) = self.data.first() else {
            return 0.0;
        };
        let mut res = first.rmax - first.rmin - first.wmin;
        for pair in self.data.windows(2) {
            res = res.max(pair[1].rmax_prev() - pair[0].rmin_next());
            res = res.max(pair[1].rmax - pair[1].rmin - pair[1].wmin);
        }
        res
    }

    /// Value whose rank band best matches `qrank`.
    ///
    /// Returns `None` for an empty summary.
    pub fn query(&self, qrank: Rank) -> Option<FeatureValue> {
        let last = self.data.last()?;
        let istart = self.data.partition_point(|e| qrank > e.rmax);
        if istart == self.data.len() {
            return Some(last.value);
        }
        let cur = &self.data[istart];
        if qrank <= cur.rmin || istart == 0 {
            return Some(cur.value);
        }
        let prev = &self.data[istart - 1];
        if 2.0 * qrank < prev.rmin_next() + cur.rmax_prev() {
            Some(prev.value)
        } else {
            Some(cur.value)
        }
    }

    /// Validate ordering and rank invariants within tolerance `eps`.
    pub fn check_valid(&self, eps: Rank) -> Result<()> {
        for (i, e) in self.data.iter().enumerate() {
            if e.rmin < 0.0 || e.wmin < 0.0 {
                return Err(HistError::internal(format!(
                    "summary entry {} has negative rank: {:?}",
                    i, e
                )));
            }
            if e.rmin + e.wmin > e.rmax + eps {
                return Err(HistError::internal(format!(
                    "summary entry {} violates rmin + wmin <= rmax: {:?}",
                    i, e
                )));
            }
            if i > 0 {
                let prev = &self.data[i - 1];
                if e.value <= prev.value {
                    return Err(HistError::internal(format!(
                        "summary values not strictly increasing at {}: {} after {}",
                        i, e.value, prev.value
                    )));
                }
                if e.rmin + eps < prev.rmin_next() {
                    return Err(HistError::internal(format!(
                        "summary entry {} starts before the previous entry ends: {:?} after {:?}",
                        i, e, prev
                    )));
                }
            }
        }
        Ok(())
    }

    /// Repair rank monotonicity lost to floating point rounding in
    /// [`combine`](Self::combine). Returns the largest correction applied.
    pub fn fix_error(&mut self) -> Rank {
        let mut max_fix: Rank = 0.0;
        let mut prev_rmin: Rank = 0.0;
        let mut prev_rmax: Rank = 0.0;
        for e in &mut self.data {
            if e.rmin < prev_rmin {
                max_fix = max_fix.max(prev_rmin - e.rmin);
                e.rmin = prev_rmin;
            } else {
                prev_rmin = e.rmin;
            }
            if e.rmax < prev_rmin {
                max_fix = max_fix.max(prev_rmin - e.rmax);
                e.rmax = prev_rmin;
            }
            let rmin_next = e.rmin_next();
            if e.rmax < rmin_next {
                max_fix = max_fix.max(rmin_next - e.rmax);
                e.rmax = rmin_next;
            }
            if e.rmax < prev_rmax {
                max_fix = max_fix.max(prev_rmax - e.rmax);
                e.rmax = prev_rmax;
            }
            prev_rmax = e.rmax;
        }
        max_fix
    }

    /// Merge two summaries of the same feature.
    ///
    /// The output holds every distinct value of both inputs, so its size
    /// never exceeds `sa.len() + sb.len()`. The operation is symmetric:
    /// `combine(a, b) == combine(b, a)`.
    pub fn combine(sa: &WQSummary, sb: &WQSummary) -> WQSummary {
        if sa.is_empty() {
            return sb.clone();
        }
        if sb.is_empty() {
            return sa.clone();
        }

        let a = &sa.data;
        let b = &sb.data;
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        let mut aprev_rmin: Rank = 0.0;
        let mut bprev_rmin: Rank = 0.0;

        while i < a.len() && j < b.len() {
            let (ea, eb) = (a[i], b[j]);
            if ea.value == eb.value {
                out.push(SummaryEntry::new(
                    ea.rmin + eb.rmin,
                    ea.rmax + eb.rmax,
                    ea.wmin + eb.wmin,
                    ea.value,
                ));
                aprev_rmin = ea.rmin_next();
                bprev_rmin = eb.rmin_next();
                i += 1;
                j += 1;
            } else if ea.value < eb.value {
                out.push(SummaryEntry::new(
                    ea.rmin + bprev_rmin,
                    ea.rmax + eb.rmax_prev(),
                    ea.wmin,
                    ea.value,
                ));
                aprev_rmin = ea.rmin_next();
                i += 1;
            } else {
                out.push(SummaryEntry::new(
                    eb.rmin + aprev_rmin,
                    eb.rmax + ea.rmax_prev(),
                    eb.wmin,
                    eb.value,
                ));
                bprev_rmin = eb.rmin_next();
                j += 1;
            }
        }

        let brmax = sb.max_rank();
        for ea in &a[i..] {
            out.push(SummaryEntry::new(
                ea.rmin + bprev_rmin,
                ea.rmax + brmax,
                ea.wmin,
                ea.value,
            ));
        }
        let armax = sa.max_rank();
        for eb in &b[j..] {
            out.push(SummaryEntry::new(
                eb.rmin + aprev_rmin,
                eb.rmax + armax,
                eb.wmin,
                eb.value,
            ));
        }

        let mut merged = WQSummary { data: out };
        let fixed = merged.fix_error();
        if fixed > 0.0 {
            log::trace!("combine repaired rank bounds by {}", fixed);
        }
        merged
    }

    /// Reduce `src` to exactly `min(maxsize, src.len())` entries.
    ///
    /// Targets are `t_k = k * W / (maxsize - 1)` for `k = 0..maxsize`. The
    /// first and last entries are always kept; every interior target takes
    /// the entry whose `rmax` is nearest to it, searched only among entries
    /// after the previous pick that still leave room for the remaining
    /// picks. Ties go to the lower entry. A `maxsize` below 2 is treated as
    /// 2.
    pub fn set_prune(src: &WQSummary, maxsize: usize) -> WQSummary {
        let maxsize = maxsize.max(2);
        let n = src.len();
        if n <= maxsize {
            return src.clone();
        }

        let data = &src.data;
        let last = n - 1;
        let total = src.max_rank();
        let steps = (maxsize - 1) as Rank;
        let mut out = Vec::with_capacity(maxsize);
        out.push(data[0]);

        let mut prev = 0;
        for k in 1..maxsize - 1 {
            let target = total * k as Rank / steps;
            let lo = prev + 1;
            let hi = last - (maxsize - 1 - k);
            let pos = lo + data[lo..=hi].partition_point(|e| e.rmax < target);
            let pick = if pos > hi {
                hi
            } else if pos == lo {
                lo
            } else {
                let below = target - data[pos - 1].rmax;
                let above = data[pos].rmax - target;
                if above < below {
                    pos
                } else {
                    pos - 1
                }
            };
            out.push(data[pick]);
            prev = pick;
        }
        out.push(data[last]);

        WQSummary { data: out }
    }

    /// Level compaction used inside the streaming sketch.
    ///
    /// For each of `maxsize - 2` evenly spaced ranks, keeps the entry whose
    /// rank band midpoint brackets it. Adds at most `range / (maxsize - 1)`
    /// to the error, and may return fewer than `maxsize` entries when
    /// several targets land on the same entry.
    pub(crate) fn compress(src: &WQSummary, maxsize: usize) -> WQSummary {
        let n = src.len();
        if n <= maxsize || maxsize < 2 {
            return src.clone();
        }

        let data = &src.data;
        let begin = data[0].rmax;
        let range = data[n - 1].rmin - begin;
        let steps = maxsize - 1;
        let mut out = Vec::with_capacity(maxsize);
        out.push(data[0]);

        let mut i = 1;
        let mut lastidx = 0;
        for k in 1..steps {
            let dx2 = 2.0 * ((k as Rank * range) / steps as Rank + begin);
            while i < n - 1 && dx2 >= data[i + 1].rmax + data[i + 1].rmin {
                i += 1;
            }
            if i == n - 1 {
                break;
            }
            if dx2 < data[i].rmin_next() + data[i + 1].rmax_prev() {
                if i != lastidx {
                    out.push(data[i]);
                    lastidx = i;
                }
            } else if i + 1 != lastidx {
                out.push(data[i + 1]);
                lastidx = i + 1;
            }
        }
        if lastidx != n - 1 {
            out.push(data[n - 1]);
        }

        WQSummary { data: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exact(values: &[f32]) -> WQSummary {
        let pairs: Vec<(f32, f64)> = values.iter().map(|&v| (v, 1.0)).collect();
        WQSummary::from_sorted_weighted(&pairs)
    }

    #[test]
    fn test_exact_summary_ranks() {
        let s = exact(&[1.0, 2.0, 2.0, 3.0]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.entries()[1], SummaryEntry::new(1.0, 3.0, 2.0, 2.0));
        assert_eq!(s.entries()[0].rmin, 0.0);
        assert_eq!(s.max_rank(), 4.0);
        assert_eq!(s.max_error(), 0.0);
        assert!(s.check_valid(1e-9).is_ok());
    }

    #[test]
    fn test_combine_is_exact_for_exact_inputs() {
        let a = exact(&[1.0, 3.0, 5.0]);
        let b = exact(&[2.0, 3.0, 6.0]);
        let merged = WQSummary::combine(&a, &b);

        let values: Vec<f32> = merged.entries().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 5.0, 6.0]);
        assert_eq!(merged.max_rank(), 6.0);
        assert!(merged.check_valid(1e-9).is_ok());

        // 3.0 appears once in each input: exact rank band [2, 4]
        let three = merged.entries()[2];
        assert_relative_eq!(three.rmin, 2.0);
        assert_relative_eq!(three.rmax, 4.0);
        assert_relative_eq!(three.wmin, 2.0);
    }

    #[test]
    fn test_combine_is_symmetric() {
        let a = exact(&[0.5, 1.5, 2.5, 9.0]);
        let b = exact(&[1.5, 4.0]);
        assert_eq!(WQSummary::combine(&a, &b), WQSummary::combine(&b, &a));
        assert_eq!(WQSummary::combine(&a, &WQSummary::new()), a);
    }

    #[test]
    fn test_set_prune_exact_count_and_endpoints() {
        let values: Vec<f32> = (0..100).map(|v| v as f32).collect();
        let s = exact(&values);
        let pruned = WQSummary::set_prune(&s, 10);
        assert_eq!(pruned.len(), 10);
        assert_eq!(pruned.entries()[0], s.entries()[0]);
        assert_eq!(pruned.entries()[9], s.entries()[99]);
        assert!(pruned.check_valid(1e-9).is_ok());
        assert_eq!(pruned.max_rank(), 100.0);
    }

    #[test]
    fn test_set_prune_picks_nearest_rmax() {
        // rmax = 1..=8, W = 8, maxsize = 3 -> interior target 4.0
        let values: Vec<f32> = (0..8).map(|v| v as f32).collect();
        let pruned = WQSummary::set_prune(&exact(&values), 3);
        let picked: Vec<f32> = pruned.entries().iter().map(|e| e.value).collect();
        assert_eq!(picked, vec![0.0, 3.0, 7.0]);
    }

    #[test]
    fn test_set_prune_tie_prefers_lower_entry() {
        // rmax = 2, 4, 6, 8, 10 and maxsize = 3: target 5.0 is equidistant
        // from rmax 4 and rmax 6
        let pairs = vec![(0.0f32, 2.0), (1.0, 2.0), (2.0, 2.0), (3.0, 2.0), (4.0, 2.0)];
        let s = WQSummary::from_sorted_weighted(&pairs);
        let pruned = WQSummary::set_prune(&s, 3);
        assert_eq!(pruned.entries()[1].value, 1.0);
    }

    #[test]
    fn test_set_prune_small_input_unchanged() {
        let s = exact(&[1.0, 2.0, 3.0]);
        assert_eq!(WQSummary::set_prune(&s, 3), s);
        assert_eq!(WQSummary::set_prune(&s, 8), s);
        assert_eq!(WQSummary::set_prune(&s, 0).len(), 2);
    }

    #[test]
    fn test_set_prune_zero_weight_interior() {
        let pairs = vec![(0.0f32, 1.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 1.0)];
        let s = WQSummary::from_sorted_weighted(&pairs);
        let pruned = WQSummary::set_prune(&s, 3);
        assert_eq!(pruned.len(), 3);
        assert!(pruned.check_valid(1e-9).is_ok());
    }

    #[test]
    fn test_compress_bounds_size_and_error() {
        let values: Vec<f32> = (0..1000).map(|v| v as f32).collect();
        let s = exact(&values);
        let compressed = WQSummary::compress(&s, 50);
        assert!(compressed.len() <= 50);
        assert_eq!(compressed.entries()[0].value, 0.0);
        assert_eq!(compressed.entries().last().unwrap().value, 999.0);
        assert!(compressed.check_valid(1e-9).is_ok());
        assert!(compressed.max_error() <= 1000.0 / 49.0 + 1.0);
    }

    #[test]
    fn test_query() {
        let values: Vec<f32> = (0..10).map(|v| v as f32).collect();
        let s = exact(&values);
        assert_eq!(s.query(0.0), Some(0.0));
        assert_eq!(s.query(5.0), Some(4.0));
        assert_eq!(s.query(100.0), Some(9.0));
        assert_eq!(WQSummary::new().query(1.0), None);
    }

    #[test]
    fn test_fix_error_restores_monotone_ranks() {
        let mut s = WQSummary::from_entries(vec![
            SummaryEntry::new(0.0, 1.0, 1.0, 1.0),
            SummaryEntry::new(0.5, 0.8, 0.5, 2.0),
        ]);
        let fixed = s.fix_error();
        assert!(fixed > 0.0);
        assert!(s.entries()[1].rmin >= s.entries()[0].rmin);
        assert!(s.entries()[1].rmax >= s.entries()[1].rmin_next());
        assert!(s.entries()[1].rmax >= s.entries()[0].rmax);
    }
}
