//! Block decomposition of global tensors over a process grid.
//!
//! Every stage of a transform works on data that is complete (local) along one axis, the
//! *aligned* axis, and split in balanced blocks along one (slab) or two (pencil) other axes.
//! Moving between alignments is a global transpose, implemented as an exchange of the
//! intersections of the local boxes of the two layouts.
use crate::comm::Communicator;
use crate::error::{Error, Result};
use log::trace;
use ndarray::{ArrayD, IxDyn, Slice};
use num::complex::Complex64;
use num::Zero;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The shape of the process grid of a distributed space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecompositionKind {
    /// Distribute along a single axis.
    #[default]
    Slab,
    /// Distribute along two axes. Requires at least three dimensions.
    Pencil,
}

/// A Cartesian arrangement of the ranks of a communicator, in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGrid {
    dims: Vec<usize>,
}

impl ProcessGrid {
    pub fn new(kind: DecompositionKind, num_processes: usize, dim: usize) -> Result<Self> {
        if num_processes == 0 {
            return Err(Error::configuration("a process grid needs at least one process"));
        }
        let dims = match kind {
            DecompositionKind::Slab => {
                if dim < 2 && num_processes > 1 {
                    return Err(Error::configuration("a one-dimensional space cannot be distributed"));
                }
                vec![num_processes]
            }
            DecompositionKind::Pencil => {
                if dim < 3 {
                    return Err(Error::configuration(format!(
                        "pencil decomposition needs at least three dimensions, got {dim}"
                    )));
                }
                let p1 = (1..=num_processes)
                    .take_while(|p| p * p <= num_processes)
                    .filter(|p| num_processes % p == 0)
                    .last()
                    .unwrap_or(1);
                vec![num_processes / p1, p1]
            }
        };
        Ok(Self { dims })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn num_processes(&self) -> usize {
        self.dims.iter().product()
    }

    /// The grid coordinates of a rank.
    pub fn coordinates(&self, rank: usize) -> Vec<usize> {
        let mut coords = vec![0; self.dims.len()];
        let mut remainder = rank;
        for (c, &p) in coords.iter_mut().zip(&self.dims).rev() {
            *c = remainder % p;
            remainder /= p;
        }
        coords
    }
}

/// The balanced block of `n` items owned by part `c` of `p`.
pub fn block_range(n: usize, p: usize, c: usize) -> Range<usize> {
    let (base, extra) = (n / p, n % p);
    let start = c * base + c.min(extra);
    let len = base + usize::from(c < extra);
    start..start + len
}

/// A box of a global tensor, given by one index range per axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBox {
    ranges: Vec<Range<usize>>,
}

impl LocalBox {
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn start(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.start).collect()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.len()).collect()
    }

    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn intersection(&self, other: &LocalBox) -> Option<LocalBox> {
        let ranges: Vec<_> = self
            .ranges
            .iter()
            .zip(&other.ranges)
            .map(|(a, b)| a.start.max(b.start)..a.end.min(b.end))
            .collect();
        ranges
            .iter()
            .all(|r| r.start < r.end)
            .then_some(LocalBox { ranges })
    }

    /// The intersection `region` relative to this box.
    fn relative(&self, region: &LocalBox) -> Vec<Range<usize>> {
        self.ranges
            .iter()
            .zip(&region.ranges)
            .map(|(own, r)| r.start - own.start..r.end - own.start)
            .collect()
    }
}

/// The distribution of a global tensor that is complete along one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    global_shape: Vec<usize>,
    aligned_axis: usize,
    /// The axis split by each dimension of the process grid.
    distributed_axes: Vec<usize>,
    grid: ProcessGrid,
}

impl Layout {
    pub fn new(global_shape: Vec<usize>, aligned_axis: usize, grid: &ProcessGrid) -> Self {
        let distributed_axes = (0..global_shape.len())
            .filter(|&axis| axis != aligned_axis)
            .take(grid.dims().len())
            .collect();
        Self {
            global_shape,
            aligned_axis,
            distributed_axes,
            grid: grid.clone(),
        }
    }

    pub fn global_shape(&self) -> &[usize] {
        &self.global_shape
    }

    pub fn aligned_axis(&self) -> usize {
        self.aligned_axis
    }

    pub fn distributed_axes(&self) -> &[usize] {
        &self.distributed_axes
    }

    /// The box owned by `rank`.
    pub fn local_box(&self, rank: usize) -> LocalBox {
        let mut ranges: Vec<_> = self.global_shape.iter().map(|&n| 0..n).collect();
        let coords = self.grid.coordinates(rank);
        for ((&axis, &p), &c) in self.distributed_axes.iter().zip(self.grid.dims()).zip(&coords) {
            ranges[axis] = block_range(self.global_shape[axis], p, c);
        }
        LocalBox { ranges }
    }

    pub fn local_shape(&self, rank: usize) -> Vec<usize> {
        self.local_box(rank).shape()
    }
}

/// Redistributes the local part of a tensor from layout `from` to layout `to`.
///
/// Both layouts must describe the same global shape. This is a collective operation.
pub fn transpose(
    comm: &dyn Communicator,
    from: &Layout,
    to: &Layout,
    data: ArrayD<Complex64>,
) -> Result<ArrayD<Complex64>> {
    if from.global_shape() != to.global_shape() {
        return Err(Error::shape(to.global_shape(), from.global_shape()));
    }
    let rank = comm.rank();
    let source = from.local_box(rank);
    if data.shape() != source.shape().as_slice() {
        return Err(Error::shape(&source.shape(), data.shape()));
    }
    if comm.size() == 1 {
        return Ok(data);
    }
    trace!(
        "Transposing {:?} from axis {} to axis {} on rank {rank}",
        from.global_shape(),
        from.aligned_axis(),
        to.aligned_axis()
    );

    let send: Vec<Vec<Complex64>> = (0..comm.size())
        .map(|peer| match source.intersection(&to.local_box(peer)) {
            Some(region) => {
                let ranges = source.relative(&region);
                data.slice_each_axis(|ax| Slice::from(ranges[ax.axis.index()].clone()))
                    .iter()
                    .copied()
                    .collect()
            }
            None => Vec::new(),
        })
        .collect();
    let received = comm.all_to_all_varcount(&send)?;

    let target = to.local_box(rank);
    let mut result = ArrayD::from_elem(IxDyn(&target.shape()), Complex64::zero());
    for (peer, buffer) in received.into_iter().enumerate() {
        let Some(region) = from.local_box(peer).intersection(&target) else {
            if buffer.is_empty() {
                continue;
            }
            return Err(Error::Communication(format!(
                "rank {peer} sent {} values to rank {rank}, which shares no data with it",
                buffer.len()
            )));
        };
        if buffer.len() != region.len() {
            return Err(Error::Communication(format!(
                "rank {rank} expected {} values from rank {peer}, received {}",
                region.len(),
                buffer.len()
            )));
        }
        let ranges = target.relative(&region);
        result
            .slice_each_axis_mut(|ax| Slice::from(ranges[ax.axis.index()].clone()))
            .iter_mut()
            .zip(buffer)
            .for_each(|(r, b)| *r = b);
    }
    Ok(result)
}
