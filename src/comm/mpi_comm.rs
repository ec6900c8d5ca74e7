use super::Communicator;
use crate::error::{Error, Result};
use ::mpi::collective::SystemOperation;
use ::mpi::datatype::{Partition, PartitionMut};
use ::mpi::topology::SimpleCommunicator;
use ::mpi::traits::CommunicatorCollectives;
use ::mpi::Count;
use num::complex::Complex64;

fn displacements(counts: &[Count]) -> Vec<Count> {
    counts
        .iter()
        .scan(0, |offset, &count| {
            let current = *offset;
            *offset += count;
            Some(current)
        })
        .collect()
}

impl Communicator for SimpleCommunicator {
    fn rank(&self) -> usize {
        ::mpi::traits::Communicator::rank(self) as usize
    }

    fn size(&self) -> usize {
        ::mpi::traits::Communicator::size(self) as usize
    }

    fn all_to_all_varcount(&self, send: &[Vec<Complex64>]) -> Result<Vec<Vec<Complex64>>> {
        let size = Communicator::size(self);
        if send.len() != size {
            return Err(Error::Communication(format!(
                "expected one send buffer per rank ({size}), got {}",
                send.len()
            )));
        }

        // Complex numbers travel as interleaved (re, im) pairs
        let send_counts: Vec<Count> = send.iter().map(|buffer| 2 * buffer.len() as Count).collect();
        let mut recv_counts = vec![0 as Count; size];
        self.all_to_all_into(&send_counts[..], &mut recv_counts[..]);

        let send_buffer: Vec<f64> = send
            .iter()
            .flat_map(|buffer| buffer.iter().flat_map(|z| [z.re, z.im]))
            .collect();
        let send_displs = displacements(&send_counts);
        let recv_displs = displacements(&recv_counts);
        let total: Count = recv_counts.iter().sum();
        let mut recv_buffer = vec![0.0f64; total as usize];
        {
            let send_partition = Partition::new(&send_buffer[..], &send_counts[..], &send_displs[..]);
            let mut recv_partition = PartitionMut::new(&mut recv_buffer[..], &recv_counts[..], &recv_displs[..]);
            self.all_to_all_varcount_into(&send_partition, &mut recv_partition);
        }

        Ok(recv_counts
            .iter()
            .zip(&recv_displs)
            .map(|(&count, &displ)| {
                let start = displ as usize;
                recv_buffer[start..start + count as usize]
                    .chunks_exact(2)
                    .map(|pair| Complex64::new(pair[0], pair[1]))
                    .collect()
            })
            .collect())
    }

    fn all_reduce_sum(&self, value: f64) -> Result<f64> {
        let mut total = 0.0;
        self.all_reduce_into(&value, &mut total, SystemOperation::sum());
        Ok(total)
    }
}
