//! # Collective Communication
//!
//! This module provides the all-reduce primitive the cut matrix builder
//! uses to agree on one global summary per feature across workers. The
//! transport itself sits behind the [`Collective`] trait: this crate only
//! needs an equal-block all-gather, and performs the reduction locally in
//! rank order so every worker ends with a byte-identical result.
//!
//! Two transports ship with the crate:
//! - [`LocalCollective`] for single-worker training
//! - [`InProcessGroup`] which runs several workers as threads of one process

use crate::core::error::{HistError, Result};
use std::fmt;
use std::sync::{Arc, Barrier, Mutex};

/// Reduce function applied element-wise: `(src, dst, type_size)` folds the
/// elements of `src` into `dst`. Both slices hold the same number of
/// `type_size`-byte elements.
pub type ReduceFunction<'a> = dyn Fn(&[u8], &mut [u8], usize) -> Result<()> + Sync + 'a;

/// Transport primitive supplied by the training driver.
pub trait Collective: Send + Sync + fmt::Debug {
    /// Rank of this worker
    fn rank(&self) -> usize;

    /// Total number of workers
    fn num_machines(&self) -> usize;

    /// Gather one equal-sized block from every worker.
    ///
    /// `output` has length `input.len() * num_machines()` and receives the
    /// blocks in rank order. Blocking: returns once every worker has
    /// contributed.
    fn allgather(&self, input: &[u8], output: &mut [u8]) -> Result<()>;
}

/// Single worker transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCollective;

impl Collective for LocalCollective {
    fn rank(&self) -> usize {
        0
    }

    fn num_machines(&self) -> usize {
        1
    }

    fn allgather(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        if output.len() != input.len() {
            return Err(HistError::worker_mismatch(
                format!("output of {} bytes", input.len()),
                format!("output of {} bytes", output.len()),
            ));
        }
        output.copy_from_slice(input);
        Ok(())
    }
}

/// Exchange area shared by the workers of one [`InProcessGroup`]
#[derive(Debug)]
struct GatherArea {
    slots: Mutex<Vec<Option<Vec<u8>>>>,
    barrier: Barrier,
}

/// Factory for workers that communicate through shared memory.
///
/// Each returned [`InProcessCollective`] is meant to be moved onto its own
/// thread. Collective calls block until all workers of the group reach
/// them.
#[derive(Debug)]
pub struct InProcessGroup;

impl InProcessGroup {
    /// Create `num_machines` connected workers, ranks `0..num_machines`.
    pub fn new(num_machines: usize) -> Vec<InProcessCollective> {
        let num_machines = num_machines.max(1);
        let area = Arc::new(GatherArea {
            slots: Mutex::new(vec![None; num_machines]),
            barrier: Barrier::new(num_machines),
        });
        (0..num_machines)
            .map(|rank| InProcessCollective {
                rank,
                num_machines,
                area: Arc::clone(&area),
            })
            .collect()
    }
}

/// One worker of an [`InProcessGroup`].
#[derive(Debug, Clone)]
pub struct InProcessCollective {
    rank: usize,
    num_machines: usize,
    area: Arc<GatherArea>,
}

impl InProcessCollective {
    fn lock_slots(&self) -> Result<std::sync::MutexGuard<'_, Vec<Option<Vec<u8>>>>> {
        self.area
            .slots
            .lock()
            .map_err(|_| HistError::network("gather area poisoned by a failed worker"))
    }

    fn collect_blocks(&self, input_len: usize, output: &mut [u8]) -> Result<()> {
        let slots = self.lock_slots()?;
        for (rank, slot) in slots.iter().enumerate() {
            let block = slot
                .as_ref()
                .ok_or_else(|| HistError::network(format!("worker {} sent no block", rank)))?;
            if block.len() != input_len {
                return Err(HistError::worker_mismatch(
                    format!("block of {} bytes", input_len),
                    format!("block of {} bytes from worker {}", block.len(), rank),
                ));
            }
            output[rank * input_len..(rank + 1) * input_len].copy_from_slice(block);
        }
        Ok(())
    }
}

impl Collective for InProcessCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_machines(&self) -> usize {
        self.num_machines
    }

    fn allgather(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        let expected = input.len() * self.num_machines;
        let shape_ok = output.len() == expected;

        // Every worker must pass both barriers, even when its own call is
        // malformed, otherwise the others block forever.
        let published = self.lock_slots().map(|mut slots| {
            slots[self.rank] = Some(input.to_vec());
        });
        self.area.barrier.wait();

        let result = match (published, shape_ok) {
            (Err(e), _) => Err(e),
            (Ok(()), false) => Err(HistError::worker_mismatch(
                format!("output of {} bytes", expected),
                format!("output of {} bytes", output.len()),
            )),
            (Ok(()), true) => self.collect_blocks(input.len(), output),
        };

        self.area.barrier.wait();
        result
    }
}

/// Handle to the collective transport used by one worker.
#[derive(Clone)]
pub struct Network {
    comm: Arc<dyn Collective>,
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("rank", &self.rank())
            .field("num_machines", &self.num_machines())
            .finish()
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::local()
    }
}

impl Network {
    /// Single worker network
    pub fn local() -> Self {
        Self::new(LocalCollective)
    }

    /// Wrap a transport
    pub fn new<C: Collective + 'static>(comm: C) -> Self {
        Network {
            comm: Arc::new(comm),
        }
    }

    /// Wrap an already shared transport
    pub fn from_arc(comm: Arc<dyn Collective>) -> Self {
        Network { comm }
    }

    /// Get rank of this machine
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Get total number of machines
    pub fn num_machines(&self) -> usize {
        self.comm.num_machines()
    }

    /// Perform all_reduce over `input.len() / type_size` elements.
    ///
    /// Blocks until every worker has contributed. Every worker receives the
    /// identical reduced array in `output`.
    pub fn allreduce(
        &self,
        input: &[u8],
        type_size: usize,
        output: &mut [u8],
        reducer: &ReduceFunction<'_>,
    ) -> Result<()> {
        if type_size == 0 || input.len() % type_size != 0 {
            return Err(HistError::network(format!(
                "payload of {} bytes is not a multiple of element size {}",
                input.len(),
                type_size
            )));
        }
        if output.len() != input.len() {
            return Err(HistError::worker_mismatch(
                format!("output of {} bytes", input.len()),
                format!("output of {} bytes", output.len()),
            ));
        }

        if self.num_machines() <= 1 {
            output.copy_from_slice(input);
            return Ok(());
        }

        self.allreduce_by_allgather(input, type_size, output, reducer)
    }

    /// Perform all_reduce by gathering every block and folding them in rank
    /// order. Folding in a fixed order is what keeps the results identical
    /// across workers.
    fn allreduce_by_allgather(
        &self,
        input: &[u8],
        type_size: usize,
        output: &mut [u8],
        reducer: &ReduceFunction<'_>,
    ) -> Result<()> {
        let num_machines = self.num_machines();
        let input_size = input.len();
        let mut buffer = vec![0u8; input_size * num_machines];

        self.comm.allgather(input, &mut buffer)?;
        if input_size == 0 {
            return Ok(());
        }

        output.copy_from_slice(&buffer[..input_size]);
        for block in buffer.chunks_exact(input_size).skip(1) {
            reducer(block, output, type_size)?;
        }
        Ok(())
    }

    /// Gather one equal-sized block from every worker, in rank order
    pub fn allgather(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        self.comm.allgather(input, output)
    }

    /// Global sum of one counter across all workers
    pub fn global_sum_u64(&self, local: u64) -> Result<u64> {
        let input = local.to_le_bytes();
        let mut output = [0u8; 8];
        let reducer = |src: &[u8], dst: &mut [u8], _type_size: usize| -> Result<()> {
            let a = u64::from_le_bytes(read_u64_bytes(src)?);
            let b = u64::from_le_bytes(read_u64_bytes(dst)?);
            dst.copy_from_slice(&a.wrapping_add(b).to_le_bytes());
            Ok(())
        };
        self.allreduce(&input, 8, &mut output, &reducer)?;
        Ok(u64::from_le_bytes(output))
    }
}

fn read_u64_bytes(bytes: &[u8]) -> Result<[u8; 8]> {
    bytes
        .try_into()
        .map_err(|_| HistError::network(format!("expected 8 bytes, got {}", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn byte_sum(src: &[u8], dst: &mut [u8], _type_size: usize) -> Result<()> {
        for (d, s) in dst.iter_mut().zip(src) {
            *d = d.wrapping_add(*s);
        }
        Ok(())
    }

    #[test]
    fn test_single_machine_allreduce() {
        let network = Network::local();
        assert_eq!(network.rank(), 0);
        assert_eq!(network.num_machines(), 1);

        let input = vec![1u8, 2, 3, 4];
        let mut output = vec![0u8; 4];
        network.allreduce(&input, 1, &mut output, &byte_sum).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_allreduce_rejects_ragged_payload() {
        let network = Network::local();
        let mut output = vec![0u8; 5];
        assert!(network.allreduce(&[0u8; 5], 2, &mut output, &byte_sum).is_err());
        let mut short = vec![0u8; 3];
        assert!(network.allreduce(&[0u8; 4], 2, &mut short, &byte_sum).is_err());
    }

    #[test]
    fn test_in_process_allreduce_is_identical_on_all_workers() {
        let workers = InProcessGroup::new(3);
        let handles: Vec<_> = workers
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let network = Network::new(comm);
                    let rank = network.rank() as u8;
                    let input = vec![rank, rank * 2, 1];
                    let mut output = vec![0u8; 3];
                    network.allreduce(&input, 1, &mut output, &byte_sum).unwrap();
                    output
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![3, 6, 3]);
        }
    }

    #[test]
    fn test_in_process_allgather_rank_order() {
        let workers = InProcessGroup::new(2);
        let handles: Vec<_> = workers
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let rank = comm.rank() as u8;
                    let mut output = vec![0u8; 4];
                    comm.allgather(&[rank, rank + 10], &mut output).unwrap();
                    output
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![0, 10, 1, 11]);
        }
    }

    #[test]
    fn test_block_size_mismatch_fails_every_worker() {
        let workers = InProcessGroup::new(2);
        let handles: Vec<_> = workers
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let len = if comm.rank() == 0 { 4 } else { 2 };
                    let input = vec![1u8; len];
                    let mut output = vec![0u8; len * 2];
                    comm.allgather(&input, &mut output)
                })
            })
            .collect();

        for handle in handles {
            let result = handle.join().unwrap();
            assert!(matches!(result, Err(HistError::WorkerMismatch { .. })));
        }
    }

    #[test]
    fn test_global_sum() {
        let workers = InProcessGroup::new(4);
        let handles: Vec<_> = workers
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let network = Network::new(comm);
                    network.global_sum_u64(network.rank() as u64 + 1).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 10);
        }
        assert_eq!(Network::local().global_sum_u64(7).unwrap(), 7);
    }
}
