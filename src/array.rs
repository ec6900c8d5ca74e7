//! Physical and spectral data attached to a space.
use crate::error::{Error, Result};
use crate::space::TensorProductSpace;
use ndarray::{ArrayD, IxDyn, Zip};
use num::complex::Complex64;
use num::Zero;
use std::sync::Arc;

/// Values at the local quadrature points of a space.
#[derive(Debug, Clone)]
pub struct Array {
    space: Arc<TensorProductSpace>,
    data: ArrayD<f64>,
}

impl Array {
    pub fn zeros(space: &Arc<TensorProductSpace>) -> Self {
        Self::filled(space, 0.0)
    }

    pub fn filled(space: &Arc<TensorProductSpace>, value: f64) -> Self {
        let shape = space.local_shape(false);
        Self {
            space: Arc::clone(space),
            data: ArrayD::from_elem(IxDyn(&shape), value),
        }
    }

    /// Wraps an existing buffer, which must have the local physical shape of the space.
    pub fn from_buffer(space: &Arc<TensorProductSpace>, data: ArrayD<f64>) -> Result<Self> {
        space.check_shape(false, data.shape())?;
        Ok(Self {
            space: Arc::clone(space),
            data,
        })
    }

    /// Evaluates `f` at the physical coordinates of every local quadrature point.
    pub fn from_fn(space: &Arc<TensorProductSpace>, f: impl Fn(&[f64]) -> f64) -> Self {
        let mesh = space.mesh(crate::space::MeshKind::Quadrature);
        let start: Vec<usize> = space.local_slice(false).iter().map(|r| r.start).collect();
        let shape = space.local_shape(false);
        let mut x = vec![0.0; shape.len()];
        let data = ArrayD::from_shape_fn(IxDyn(&shape), |index| {
            for (axis, xi) in x.iter_mut().enumerate() {
                *xi = mesh[axis][start[axis] + index[axis]];
            }
            f(&x)
        });
        Self {
            space: Arc::clone(space),
            data,
        }
    }

    pub fn space(&self) -> &Arc<TensorProductSpace> {
        &self.space
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    /// The expansion coefficients of these values.
    pub fn forward(&self) -> Result<Function> {
        let mut output = Function::zeros(&self.space);
        self.space.forward(self, &mut output)?;
        Ok(output)
    }

    /// The weighted integral over the reference domain of every axis, summed over all ranks.
    ///
    /// Each axis contributes its quadrature weights, so Chebyshev axes integrate with the
    /// Chebyshev weight while Laguerre axes, whose weights are scaled by `e^x`, integrate `f` itself.
    pub fn integrate(&self) -> Result<f64> {
        let local = self.space.local_slice(false);
        let weights: Vec<&[f64]> = self.space.bases().iter().map(|b| b.weights()).collect();
        let mut sum = 0.0;
        Zip::indexed(&self.data).for_each(|index, &value| {
            let w: f64 = (0..weights.len())
                .map(|axis| weights[axis][local[axis].start + index[axis]])
                .product();
            sum += w * value;
        });
        self.space.comm().all_reduce_sum(sum)
    }

    /// The unweighted integral over the physical domain, summed over all ranks.
    pub fn dx(&self) -> Result<f64> {
        let local = self.space.local_slice(false);
        let weights = self
            .space
            .bases()
            .iter()
            .map(|b| b.integration_weights())
            .collect::<Result<Vec<_>>>()?;
        let mut sum = 0.0;
        Zip::indexed(&self.data).for_each(|index, &value| {
            let w: f64 = (0..weights.len())
                .map(|axis| weights[axis][local[axis].start + index[axis]])
                .product();
            sum += w * value;
        });
        self.space.comm().all_reduce_sum(sum)
    }
}

/// Expansion coefficients of the local spectral data of a space.
#[derive(Debug, Clone)]
pub struct Function {
    space: Arc<TensorProductSpace>,
    data: ArrayD<Complex64>,
}

impl Function {
    pub fn zeros(space: &Arc<TensorProductSpace>) -> Self {
        let shape = space.local_shape(true);
        Self {
            space: Arc::clone(space),
            data: ArrayD::zeros(IxDyn(&shape)),
        }
    }

    /// Wraps an existing buffer, which must have the local spectral shape of the space.
    pub fn from_buffer(space: &Arc<TensorProductSpace>, data: ArrayD<Complex64>) -> Result<Self> {
        space.check_shape(true, data.shape())?;
        Ok(Self {
            space: Arc::clone(space),
            data,
        })
    }

    pub fn space(&self) -> &Arc<TensorProductSpace> {
        &self.space
    }

    pub fn data(&self) -> &ArrayD<Complex64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<Complex64> {
        &mut self.data
    }

    pub fn into_data(self) -> ArrayD<Complex64> {
        self.data
    }

    /// Evaluates the expansion at the local quadrature points.
    pub fn backward(&self) -> Result<Array> {
        let mut output = Array::zeros(&self.space);
        self.space.backward(self, &mut output)?;
        Ok(output)
    }

    /// Writes the boundary values of the space into the boundary degrees of freedom.
    pub fn set_boundary_dofs(&mut self) {
        if self.space.liftings().is_empty() {
            return;
        }
        let start: Vec<usize> = self.space.local_slice(true).iter().map(|r| r.start).collect();
        let space = &self.space;
        let mut global = vec![0; start.len()];
        Zip::indexed(&mut self.data).for_each(|index, value| {
            for (axis, g) in global.iter_mut().enumerate() {
                *g = start[axis] + index[axis];
            }
            if let Some(v) = space.boundary_dof_value(&global) {
                *value = Complex64::new(v, 0.0);
            }
        });
    }

    /// Evaluates the expansion at arbitrary physical points, one coordinate per axis.
    ///
    /// Every rank sums its own coefficients and the partial sums are reduced, so all ranks must
    /// pass the same points. The missing half of a real-to-complex axis is accounted for by
    /// Hermitian symmetry.
    pub fn eval(&self, points: &[Vec<f64>]) -> Result<Vec<f64>> {
        let space = &self.space;
        let dim = space.dim();
        let start: Vec<usize> = space.local_slice(true).iter().map(|r| r.start).collect();
        let shape = self.data.shape().to_vec();
        let r2c_axis = (0..dim).find(|&axis| space.basis(axis).is_r2c());

        let mut values = Vec::with_capacity(points.len());
        for point in points {
            if point.len() != dim {
                return Err(Error::shape(&[dim], &[point.len()]));
            }
            // Local rows of the basis functions of every axis at this point
            let rows = (0..dim)
                .map(|axis| {
                    let basis = space.basis(axis);
                    let x = basis.map_to_reference(point[axis]);
                    let row = basis.evaluate_complex(&[x], 0)?;
                    let mut local: Vec<Complex64> = (0..shape[axis]).map(|i| row[(0, start[axis] + i)]).collect();
                    if r2c_axis == Some(axis) {
                        let nyquist = basis.nyquist_index();
                        for (i, v) in local.iter_mut().enumerate() {
                            let k = start[axis] + i;
                            if k > 0 && Some(k) != nyquist {
                                *v *= 2.0;
                            }
                        }
                    }
                    Ok(local)
                })
                .collect::<Result<Vec<_>>>()?;

            let mut sum = Complex64::zero();
            Zip::indexed(&self.data).for_each(|index, &c| {
                let phi: Complex64 = (0..dim).map(|axis| rows[axis][index[axis]]).product();
                sum += c * phi;
            });
            values.push(space.comm().all_reduce_sum(sum.re)?);
        }
        Ok(values)
    }
}
