//! Distributed tensor-product function spaces.
use crate::array::{Array, Function};
use crate::assembly::MatrixCache;
use crate::basis::{Basis, Dtype};
use crate::comm::{Communicator, SerialCommunicator};
use crate::error::{Error, Result};
use crate::lifting::BoundaryLifting;
use crate::transform::{AxisTransform, Direction};
use itertools::Itertools;
use log::debug;
use ndarray::{ArrayD, Axis, Dimension, IxDyn, Zip};
use num::complex::Complex64;
use num::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::ops::Range;
use std::sync::Arc;

pub mod composite;
pub mod decomposition;

pub use composite::{CompositeArray, CompositeFunction, CompositeSpace};
pub use decomposition::{DecompositionKind, Layout, LocalBox, ProcessGrid};
use decomposition::transpose;

/// The points a mesh is made of.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshKind {
    /// The quadrature points of every axis.
    #[default]
    Quadrature,
    /// Equispaced points covering the domain of every axis.
    Uniform,
}

/// One step of the forward transform: a one-dimensional transform along `axis`, applied to
/// data in the `input` layout and producing data in the `output` layout.
#[derive(Debug, Clone)]
struct Stage {
    axis: usize,
    input: Layout,
    output: Layout,
}

/// A tensor product of one-dimensional bases, distributed over the ranks of a communicator.
///
/// Physical data is complete along the first axis transformed by [`forward`](Self::forward),
/// which is the last entry of `axes`. Spectral data is complete along `axes[0]`.
pub struct TensorProductSpace {
    bases: Vec<Basis>,
    axes: Vec<usize>,
    decomposition: DecompositionKind,
    comm: Arc<dyn Communicator>,
    grid: ProcessGrid,
    stages: Vec<Stage>,
    transforms: Vec<AxisTransform>,
    liftings: Vec<BoundaryLifting>,
    matrices: MatrixCache,
}

impl Debug for TensorProductSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorProductSpace")
            .field("bases", &self.bases)
            .field("axes", &self.axes)
            .field("decomposition", &self.decomposition)
            .field("grid", &self.grid)
            .field("rank", &self.comm.rank())
            .finish()
    }
}

impl TensorProductSpace {
    /// Creates a slab-decomposed space that transforms the axes in their natural order.
    pub fn new(comm: Arc<dyn Communicator>, bases: Vec<Basis>) -> Result<Arc<Self>> {
        let axes = (0..bases.len()).collect();
        Self::with_axes(comm, bases, axes, DecompositionKind::Slab)
    }

    /// Creates a space on a single rank.
    pub fn serial(bases: Vec<Basis>) -> Result<Arc<Self>> {
        Self::new(Arc::new(SerialCommunicator), bases)
    }

    /// Creates a space with an explicit axis order and decomposition.
    ///
    /// `forward` transforms the axes in the order `axes[d - 1], ..., axes[0]`. A real-to-complex
    /// Fourier axis, of which there may be at most one, must therefore be `axes[d - 1]`.
    pub fn with_axes(
        comm: Arc<dyn Communicator>,
        bases: Vec<Basis>,
        axes: Vec<usize>,
        decomposition: DecompositionKind,
    ) -> Result<Arc<Self>> {
        let dim = bases.len();
        if dim == 0 {
            return Err(Error::configuration("a tensor-product space needs at least one basis"));
        }
        if axes.len() != dim || axes.iter().copied().sorted().ne(0..dim) {
            return Err(Error::configuration(format!(
                "axes {axes:?} are not a permutation of 0..{dim}"
            )));
        }
        let r2c_axes: Vec<_> = (0..dim).filter(|&axis| bases[axis].is_r2c()).collect();
        match r2c_axes.as_slice() {
            [] => {}
            [axis] if *axis == axes[dim - 1] => {}
            [axis] => {
                return Err(Error::configuration(format!(
                    "the real-to-complex axis {axis} must be transformed first, i.e. be the last entry of {axes:?}"
                )))
            }
            _ => {
                return Err(Error::configuration(format!(
                    "at most one real-to-complex axis is allowed, got {r2c_axes:?}; use Dtype::{:?} for the others",
                    Dtype::Complex
                )))
            }
        }

        let grid = ProcessGrid::new(decomposition, comm.size(), dim)?;
        let forward_order: Vec<usize> = axes.iter().rev().copied().collect();
        let mut shape: Vec<usize> = bases.iter().map(Basis::num_points).collect();
        let mut stages = Vec::with_capacity(dim);
        for &axis in &forward_order {
            let input = Layout::new(shape.clone(), axis, &grid);
            shape[axis] = bases[axis].num_dofs();
            let output = Layout::new(shape.clone(), axis, &grid);
            stages.push(Stage { axis, input, output });
        }

        let transforms = bases.iter().map(AxisTransform::new).collect::<Result<Vec<_>>>()?;
        let mut liftings = Vec::new();
        for axis in 0..dim {
            liftings.extend(BoundaryLifting::new(&bases, axis)?);
        }

        let space = Self {
            bases,
            axes,
            decomposition,
            comm,
            grid,
            stages,
            transforms,
            liftings,
            matrices: MatrixCache::new(),
        };
        debug!(
            "Built {}-dimensional space with global shape {:?} on {} rank(s) ({:?})",
            dim,
            space.global_shape(false),
            space.comm.size(),
            space.decomposition
        );
        Ok(Arc::new(space))
    }

    /// The same space with every Fourier axis padded by `factor`, e.g. `1.5` for the 3/2-rule.
    ///
    /// The spectral layout is unchanged, so the data of a [`Function`] of this space can be
    /// moved to the dealiased space with [`Function::from_buffer`] and evaluated on the finer
    /// grid, and a forward transform on the finer grid truncates back to the modes of this space.
    pub fn dealiased(&self, factor: f64) -> Result<Arc<Self>> {
        let bases = self
            .bases
            .iter()
            .map(|basis| if basis.is_periodic() { basis.padded(factor) } else { Ok(basis.clone()) })
            .collect::<Result<Vec<_>>>()?;
        Self::with_axes(Arc::clone(&self.comm), bases, self.axes.clone(), self.decomposition)
    }

    pub fn dim(&self) -> usize {
        self.bases.len()
    }

    pub fn bases(&self) -> &[Basis] {
        &self.bases
    }

    pub fn basis(&self, axis: usize) -> &Basis {
        &self.bases[axis]
    }

    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    pub fn decomposition(&self) -> DecompositionKind {
        self.decomposition
    }

    pub fn process_grid(&self) -> &ProcessGrid {
        &self.grid
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// The coupling matrices assembled so far for this space.
    pub fn matrices(&self) -> &MatrixCache {
        &self.matrices
    }

    /// Boundary liftings of all axes with boundary functions, in axis order.
    pub fn liftings(&self) -> &[BoundaryLifting] {
        &self.liftings
    }

    pub fn lifting(&self, axis: usize) -> Option<&BoundaryLifting> {
        self.liftings.iter().find(|lifting| lifting.axis() == axis)
    }

    pub fn physical_layout(&self) -> &Layout {
        &self.stages[0].input
    }

    pub fn spectral_layout(&self) -> &Layout {
        &self.stages[self.stages.len() - 1].output
    }

    fn layout(&self, spectral: bool) -> &Layout {
        if spectral {
            self.spectral_layout()
        } else {
            self.physical_layout()
        }
    }

    pub fn global_shape(&self, spectral: bool) -> Vec<usize> {
        self.layout(spectral).global_shape().to_vec()
    }

    pub fn local_shape(&self, spectral: bool) -> Vec<usize> {
        self.layout(spectral).local_shape(self.comm.rank())
    }

    /// The global index ranges of the local part of physical or spectral data.
    pub fn local_slice(&self, spectral: bool) -> Vec<Range<usize>> {
        self.layout(spectral).local_box(self.comm.rank()).ranges().to_vec()
    }

    /// Physical coordinates of the local quadrature points.
    ///
    /// With `broadcast`, every array has the full local shape. Otherwise the array of axis `i`
    /// has extent one along every other axis, ready for broadcasting arithmetic.
    pub fn local_mesh(&self, broadcast: bool) -> Vec<ArrayD<f64>> {
        let local = self.local_slice(false);
        let full_shape = self.local_shape(false);
        self.bases
            .iter()
            .enumerate()
            .map(|(axis, basis)| {
                let points = basis.points();
                let start = local[axis].start;
                let shape = if broadcast {
                    full_shape.clone()
                } else {
                    let mut shape = vec![1; self.dim()];
                    shape[axis] = full_shape[axis];
                    shape
                };
                ArrayD::from_shape_fn(IxDyn(&shape), |index| points[start + index[axis]])
            })
            .collect()
    }

    /// The global one-dimensional coordinates of every axis.
    pub fn mesh(&self, kind: MeshKind) -> Vec<Vec<f64>> {
        self.bases
            .iter()
            .map(|basis| match kind {
                MeshKind::Quadrature => basis.points(),
                MeshKind::Uniform => basis.uniform_points(),
            })
            .collect()
    }

    /// The wavenumbers of the local spectral data along every axis.
    ///
    /// Fourier axes give integer wavenumbers, unscaled by the domain length. Other axes give the
    /// index of the basis function.
    pub fn local_wavenumbers(&self) -> Vec<Vec<f64>> {
        let local = self.local_slice(true);
        self.bases
            .iter()
            .zip(local)
            .map(|(basis, range)| {
                if basis.is_periodic() {
                    basis.wavenumbers()[range].to_vec()
                } else {
                    range.map(|k| k as f64).collect()
                }
            })
            .collect()
    }

    /// Transforms physical values to expansion coefficients.
    ///
    /// Boundary degrees of freedom are set to the values of the boundary conditions.
    pub fn forward(&self, input: &Array, output: &mut Function) -> Result<()> {
        self.check_shape(false, input.data().shape())?;
        self.check_shape(true, output.data().shape())?;
        let data = input.data().mapv(|x| Complex64::new(x, 0.0));
        *output.data_mut() = self.forward_stages(Direction::Forward, data)?;
        Ok(())
    }

    /// Computes the weighted inner products `(f, φ_k)_w` with all test functions.
    ///
    /// Entries that belong to boundary functions are zero.
    pub fn scalar_product(&self, input: &Array, output: &mut Function) -> Result<()> {
        self.check_shape(false, input.data().shape())?;
        self.check_shape(true, output.data().shape())?;
        let data = input.data().mapv(|x| Complex64::new(x, 0.0));
        *output.data_mut() = self.forward_stages(Direction::ScalarProduct, data)?;
        Ok(())
    }

    /// Evaluates an expansion at the quadrature points.
    pub fn backward(&self, input: &Function, output: &mut Array) -> Result<()> {
        self.check_shape(true, input.data().shape())?;
        self.check_shape(false, output.data().shape())?;
        let data = self.backward_stages(input.data().clone())?;
        *output.data_mut() = data.mapv(|z| z.re);
        Ok(())
    }

    /// The value of the boundary degree of freedom at a global spectral index, if it is one.
    pub(crate) fn boundary_dof_value(&self, global_index: &[usize]) -> Option<f64> {
        self.liftings
            .iter()
            .find_map(|lifting| lifting.spectral_value(global_index))
    }

    pub(crate) fn check_shape(&self, spectral: bool, shape: &[usize]) -> Result<()> {
        let expected = self.local_shape(spectral);
        if expected != shape {
            return Err(Error::shape(&expected, shape));
        }
        Ok(())
    }

    fn forward_stages(&self, direction: Direction, mut data: ArrayD<Complex64>) -> Result<ArrayD<Complex64>> {
        for (s, stage) in self.stages.iter().enumerate() {
            data = self.transform_stage(s, direction, &stage.input, &data);
            if let Some(next) = self.stages.get(s + 1) {
                data = transpose(self.comm(), &stage.output, &next.input, data)?;
            }
        }
        Ok(data)
    }

    fn backward_stages(&self, mut data: ArrayD<Complex64>) -> Result<ArrayD<Complex64>> {
        for s in (0..self.stages.len()).rev() {
            let stage = &self.stages[s];
            data = self.transform_stage(s, Direction::Backward, &stage.output, &data);
            if s > 0 {
                data = transpose(self.comm(), &stage.input, &self.stages[s - 1].output, data)?;
            }
        }
        Ok(data)
    }

    /// Applies the one-dimensional transform of stage `s` to every lane of `data`, which is
    /// distributed according to `layout`.
    fn transform_stage(
        &self,
        s: usize,
        direction: Direction,
        layout: &Layout,
        data: &ArrayD<Complex64>,
    ) -> ArrayD<Complex64> {
        let axis = self.stages[s].axis;
        let basis = &self.bases[axis];
        let transform = &self.transforms[axis];
        let mut shape = data.shape().to_vec();
        shape[axis] = match direction {
            Direction::Backward => basis.num_points(),
            Direction::Forward | Direction::ScalarProduct => basis.num_dofs(),
        };
        let mut output = ArrayD::zeros(IxDyn(&shape));

        // Axes transformed by earlier forward stages hold spectral data
        let spectral: Vec<bool> = (0..self.dim())
            .map(|a| self.stages[..s].iter().any(|stage| stage.axis == a))
            .collect();
        let offset = layout.local_box(self.comm.rank()).start();
        let lifting = self
            .lifting(axis)
            .filter(|lifting| direction == Direction::Forward && !lifting.is_homogeneous());
        let zeros = match direction {
            Direction::Backward => Vec::new(),
            _ => vec![Complex64::zero(); basis.num_boundary_dofs()],
        };

        Zip::indexed(data.lanes(Axis(axis)))
            .and(output.lanes_mut(Axis(axis)))
            .for_each(|index, input, mut result| {
                let input: Vec<Complex64> = input.iter().copied().collect();
                let boundary = match lifting {
                    Some(lifting) => {
                        let global = lane_index(index.slice(), axis, &offset);
                        lifting.lane_values(&global, &spectral)
                    }
                    None => zeros.clone(),
                };
                let values = transform.apply(direction, &input, &boundary);
                result.iter_mut().zip(values).for_each(|(r, v)| *r = v);
            });
        output
    }
}

/// The global index of a lane, with a zero in place of the lane axis.
fn lane_index(local: &[usize], axis: usize, offset: &[usize]) -> Vec<usize> {
    let mut global = local.to_vec();
    global.insert(axis, 0);
    global.iter_mut().zip(offset).for_each(|(g, o)| *g += o);
    global
}
