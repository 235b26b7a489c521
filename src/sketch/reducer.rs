//! Cross-worker reduction of per-feature summaries.
//!
//! Each summary travels as a fixed-size block: a bincode encoding of the
//! entry count followed by exactly `capacity` entries, unused slots zero
//! filled. Fixed-size blocks let the collective address feature `f` of any
//! worker at `f * element_size`.

use super::summary::{SummaryEntry, WQSummary};
use crate::core::error::{HistError, Result};
use crate::core::network::Network;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Bytes of the bincode header: entry count plus vector length, both `u64`
const WIRE_HEADER_BYTES: usize = 16;
/// Bytes of one bincode encoded entry: `f32` value and three `f64` ranks
const WIRE_ENTRY_BYTES: usize = 28;

#[derive(Debug, Serialize, Deserialize)]
struct WireSummary {
    size: u64,
    entries: Vec<SummaryEntry>,
}

/// Merges summaries with a fixed entry capacity.
#[derive(Debug, Clone, Copy)]
pub struct SketchReducer {
    capacity: usize,
}

impl SketchReducer {
    pub fn new(capacity: usize) -> Self {
        SketchReducer {
            capacity: capacity.max(2),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Encoded size of one summary with room for `capacity` entries
    pub fn calc_mem_cost(capacity: usize) -> usize {
        WIRE_HEADER_BYTES + capacity * WIRE_ENTRY_BYTES
    }

    /// Size of one wire block for this reducer
    pub fn element_size(&self) -> usize {
        Self::calc_mem_cost(self.capacity)
    }

    /// Combine then prune back to capacity
    pub fn merge(&self, a: &WQSummary, b: &WQSummary) -> WQSummary {
        WQSummary::set_prune(&WQSummary::combine(a, b), self.capacity)
    }

    /// Encode `summary` into a block of exactly [`element_size`](Self::element_size) bytes
    pub fn encode(&self, summary: &WQSummary, out: &mut [u8]) -> Result<()> {
        if summary.len() > self.capacity {
            return Err(HistError::serialization(format!(
                "summary of {} entries exceeds wire capacity {}",
                summary.len(),
                self.capacity
            )));
        }
        if out.len() != self.element_size() {
            return Err(HistError::serialization(format!(
                "wire block is {} bytes, expected {}",
                out.len(),
                self.element_size()
            )));
        }

        let mut entries = summary.entries().to_vec();
        entries.resize(self.capacity, SummaryEntry::default());
        let wire = WireSummary {
            size: summary.len() as u64,
            entries,
        };
        bincode::serialize_into(Cursor::new(out), &wire)?;
        Ok(())
    }

    /// Decode one block produced by [`encode`](Self::encode)
    pub fn decode(&self, block: &[u8]) -> Result<WQSummary> {
        let wire: WireSummary = bincode::deserialize(block)?;
        let size = wire.size as usize;
        if wire.entries.len() != self.capacity || size > self.capacity {
            return Err(HistError::serialization(format!(
                "malformed summary block: size {} with {} slots, capacity {}",
                size,
                wire.entries.len(),
                self.capacity
            )));
        }
        let mut entries = wire.entries;
        entries.truncate(size);
        Ok(WQSummary::from_entries(entries))
    }

    /// Reduce function over packed blocks: `dst[i] = merge(dst[i], src[i])`
    pub fn reduce_blocks(&self, src: &[u8], dst: &mut [u8], type_size: usize) -> Result<()> {
        if type_size != self.element_size() || src.len() != dst.len() {
            return Err(HistError::internal(format!(
                "reduce called with block size {} ({} / {} bytes), expected {}",
                type_size,
                src.len(),
                dst.len(),
                self.element_size()
            )));
        }
        dst.par_chunks_exact_mut(type_size)
            .zip(src.par_chunks_exact(type_size))
            .try_for_each(|(acc, incoming)| {
                let merged = self.merge(&self.decode(acc)?, &self.decode(incoming)?);
                self.encode(&merged, acc)
            })
    }

    /// All-reduce `summaries` in place across the workers of `network`.
    ///
    /// Every worker must pass the same number of summaries; afterwards all
    /// workers hold identical summaries of at most `capacity` entries.
    pub fn allreduce(&self, network: &Network, summaries: &mut [WQSummary]) -> Result<()> {
        let elem = self.element_size();
        let mut input = vec![0u8; elem * summaries.len()];
        for (summary, block) in summaries.iter().zip(input.chunks_exact_mut(elem)) {
            self.encode(summary, block)?;
        }

        let mut output = vec![0u8; input.len()];
        let reduce = |src: &[u8], dst: &mut [u8], type_size: usize| {
            self.reduce_blocks(src, dst, type_size)
        };
        network.allreduce(&input, elem, &mut output, &reduce)?;

        for (summary, block) in summaries.iter_mut().zip(output.chunks_exact(elem)) {
            *summary = self.decode(block)?;
        }
        log::debug!(
            "all-reduced {} summaries over {} workers ({} bytes each)",
            summaries.len(),
            network.num_machines(),
            elem
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::network::InProcessGroup;
    use std::thread;

    fn exact(values: &[f32]) -> WQSummary {
        let pairs: Vec<(f32, f64)> = values.iter().map(|&v| (v, 1.0)).collect();
        WQSummary::from_sorted_weighted(&pairs)
    }

    #[test]
    fn test_mem_cost_matches_bincode() {
        for capacity in [2usize, 16, 2048] {
            let wire = WireSummary {
                size: 0,
                entries: vec![SummaryEntry::default(); capacity],
            };
            let encoded = bincode::serialized_size(&wire).unwrap() as usize;
            assert_eq!(encoded, SketchReducer::calc_mem_cost(capacity));
        }
    }

    #[test]
    fn test_encode_decode_block() {
        let reducer = SketchReducer::new(8);
        let summary = exact(&[1.0, 2.5, 4.0]);
        let mut block = vec![0u8; reducer.element_size()];
        reducer.encode(&summary, &mut block).unwrap();
        assert_eq!(reducer.decode(&block).unwrap(), summary);
    }

    #[test]
    fn test_encode_rejects_oversized_summary() {
        let reducer = SketchReducer::new(2);
        let mut block = vec![0u8; reducer.element_size()];
        assert!(reducer.encode(&exact(&[1.0, 2.0, 3.0]), &mut block).is_err());
        let mut short = vec![0u8; 4];
        assert!(reducer.encode(&exact(&[1.0]), &mut short).is_err());
    }

    #[test]
    fn test_merge_sizes() {
        let reducer = SketchReducer::new(4);
        let a = exact(&[1.0, 2.0, 3.0]);
        let b = exact(&[4.0, 5.0]);
        let merged = reducer.merge(&a, &b);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.max_rank(), 5.0);

        let wide = SketchReducer::new(10);
        assert_eq!(wide.merge(&a, &b).len(), 5);
    }

    #[test]
    fn test_local_allreduce_prunes_to_capacity() {
        let reducer = SketchReducer::new(4);
        let values: Vec<f32> = (0..4).map(|v| v as f32).collect();
        let mut summaries = vec![exact(&values), WQSummary::new()];
        reducer
            .allreduce(&Network::local(), &mut summaries)
            .unwrap();
        assert_eq!(summaries[0], exact(&values));
        assert!(summaries[1].is_empty());
    }

    #[test]
    fn test_group_allreduce_is_identical_across_workers() {
        let reducer = SketchReducer::new(16);
        let handles: Vec<_> = InProcessGroup::new(3)
            .into_iter()
            .enumerate()
            .map(|(rank, comm)| {
                thread::spawn(move || {
                    let network = Network::new(comm);
                    let values: Vec<f32> = (0..20).map(|v| (v * 3 + rank) as f32).collect();
                    let mut summaries = vec![exact(&values)];
                    reducer.allreduce(&network, &mut summaries).unwrap();
                    summaries
                })
            })
            .collect();

        let results: Vec<Vec<WQSummary>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
        assert_eq!(results[0][0].max_rank(), 60.0);
        assert!(results[0][0].len() <= 16);
    }
}
