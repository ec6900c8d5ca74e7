//! Message passing between the ranks that share a distributed space.
//!
//! The transform pipeline only needs a handful of collectives, captured by [`Communicator`].
//! [`SerialCommunicator`] is the trivial single-rank implementation, and
//! [`ThreadCommunicator`] runs a group of ranks as threads of a single process, which is
//! mostly useful for exercising the distributed code paths in tests. With the `mpi` feature
//! enabled, `mpi::topology::SimpleCommunicator` implements the trait as well.
use crate::error::{Error, Result};
use num::complex::Complex64;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};

#[cfg(feature = "mpi")]
mod mpi_comm;

/// Collective operations over a fixed group of ranks.
///
/// All operations are collective: every rank of the group must call them in the same order,
/// otherwise the group deadlocks. No timeouts are imposed.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Exchanges variable-length buffers between all pairs of ranks.
    ///
    /// `send[r]` is delivered to rank `r`, and entry `r` of the result holds what rank `r`
    /// sent to this rank.
    fn all_to_all_varcount(&self, send: &[Vec<Complex64>]) -> Result<Vec<Vec<Complex64>>>;

    /// Sums a value over all ranks. Every rank receives the total.
    fn all_reduce_sum(&self, value: f64) -> Result<f64>;
}

/// A communicator consisting of a single rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_to_all_varcount(&self, send: &[Vec<Complex64>]) -> Result<Vec<Vec<Complex64>>> {
        check_send_count(send, 1)?;
        Ok(send.to_vec())
    }

    fn all_reduce_sum(&self, value: f64) -> Result<f64> {
        Ok(value)
    }
}

#[derive(Debug)]
struct ThreadGroup {
    size: usize,
    // mailbox[source][destination]
    mailbox: Mutex<Vec<Vec<Option<Vec<Complex64>>>>>,
    reduction: Mutex<Vec<f64>>,
    barrier: Barrier,
}

/// One rank of a group of ranks living in the same process.
///
/// Each rank is meant to be moved into its own thread. Collectives synchronize through a shared
/// barrier, so all ranks of the group must be running concurrently.
#[derive(Debug, Clone)]
pub struct ThreadCommunicator {
    rank: usize,
    group: Arc<ThreadGroup>,
}

impl ThreadCommunicator {
    /// Creates the communicators of all ranks of a new group with `size` ranks.
    pub fn group(size: usize) -> Vec<ThreadCommunicator> {
        assert!(size > 0, "a communicator group needs at least one rank");
        let group = Arc::new(ThreadGroup {
            size,
            mailbox: Mutex::new(vec![vec![None; size]; size]),
            reduction: Mutex::new(vec![0.0; size]),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| ThreadCommunicator {
                rank,
                group: Arc::clone(&group),
            })
            .collect()
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size
    }

    fn all_to_all_varcount(&self, send: &[Vec<Complex64>]) -> Result<Vec<Vec<Complex64>>> {
        let size = self.group.size;
        check_send_count(send, size)?;
        {
            let mut mailbox = self.group.mailbox.lock();
            for (destination, buffer) in send.iter().enumerate() {
                mailbox[self.rank][destination] = Some(buffer.clone());
            }
        }
        self.group.barrier.wait();
        let received: Vec<_> = {
            let mut mailbox = self.group.mailbox.lock();
            (0..size)
                .map(|source| mailbox[source][self.rank].take())
                .collect()
        };
        // Nobody may post the next round before everyone has collected this one
        self.group.barrier.wait();
        received
            .into_iter()
            .enumerate()
            .map(|(source, buffer)| {
                buffer.ok_or_else(|| Error::Communication(format!("no message from rank {source}")))
            })
            .collect()
    }

    fn all_reduce_sum(&self, value: f64) -> Result<f64> {
        self.group.reduction.lock()[self.rank] = value;
        self.group.barrier.wait();
        // Summing in rank order gives the same result on every rank
        let total = self.group.reduction.lock().iter().sum();
        self.group.barrier.wait();
        Ok(total)
    }
}

fn check_send_count(send: &[Vec<Complex64>], size: usize) -> Result<()> {
    if send.len() != size {
        return Err(Error::Communication(format!(
            "expected one send buffer per rank ({size}), got {}",
            send.len()
        )));
    }
    Ok(())
}
