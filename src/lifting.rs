//! Lifting of inhomogeneous boundary values.
//!
//! The coefficients of the boundary functions of a composite axis are the boundary values.
//! In a tensor-product space the boundary values are constant along all other axes, so the
//! boundary degrees of freedom of a lane are the boundary values times the coefficient of the
//! constant function on every other axis: one on axes that are still in physical space, and
//! `[index == 0]` on axes that are already in spectral space. This requires every other axis
//! to represent constants exactly through its first basis function.
use crate::basis::Basis;
use crate::error::{Error, Result};
use nalgebra::DMatrix;
use num::complex::Complex64;
use num::Zero;

/// Boundary data of one composite axis of a space.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLifting {
    axis: usize,
    num_homogeneous: usize,
    values: Vec<f64>,
}

impl BoundaryLifting {
    /// Creates the lifting for `axis`, or `None` if that axis has no boundary functions.
    pub fn new(bases: &[Basis], axis: usize) -> Result<Option<Self>> {
        let basis = &bases[axis];
        if !basis.is_composite() {
            return Ok(None);
        }
        let lifting = Self {
            axis,
            num_homogeneous: basis.num_homogeneous(),
            values: basis.boundary_values(),
        };
        if !lifting.is_homogeneous() {
            for (other, other_basis) in bases.iter().enumerate() {
                if other != axis && !other_basis.represents_constants() {
                    return Err(Error::configuration(format!(
                        "inhomogeneous boundary values on axis {axis} require axis {other} to represent \
                         constants, but it is a {:?} basis with {} boundary conditions",
                        other_basis.family(),
                        other_basis.num_boundary_dofs()
                    )));
                }
            }
        }
        Ok(Some(lifting))
    }

    pub fn axis(&self) -> usize {
        self.axis
    }

    /// The index of the first boundary degree of freedom along the axis.
    pub fn num_homogeneous(&self) -> usize {
        self.num_homogeneous
    }

    /// Boundary values in reference scaling, left before right.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_homogeneous(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// The coefficient of the constant function over all other axes.
    ///
    /// `global_index` holds the global index of the lane on every axis (the entry for the
    /// lifting axis is ignored), and `spectral` tells which axes are in spectral space.
    pub fn constant_factor(&self, global_index: &[usize], spectral: &[bool]) -> f64 {
        let on_constant_mode = global_index
            .iter()
            .zip(spectral)
            .enumerate()
            .filter(|(ax, _)| *ax != self.axis)
            .all(|(_, (&index, &is_spectral))| !is_spectral || index == 0);
        if on_constant_mode {
            1.0
        } else {
            0.0
        }
    }

    /// The boundary degrees of freedom of the lane through `global_index`.
    pub fn lane_values(&self, global_index: &[usize], spectral: &[bool]) -> Vec<Complex64> {
        let factor = self.constant_factor(global_index, spectral);
        self.values
            .iter()
            .map(|v| Complex64::new(v * factor, 0.0))
            .collect()
    }

    /// The value of the boundary degree of freedom at `index` along the axis, where all other
    /// axes are spectral. Returns `None` for homogeneous degrees of freedom.
    pub fn spectral_value(&self, global_index: &[usize]) -> Option<f64> {
        let index = global_index[self.axis];
        if index < self.num_homogeneous {
            return None;
        }
        let spectral = vec![true; global_index.len()];
        Some(self.values[index - self.num_homogeneous] * self.constant_factor(global_index, &spectral))
    }
}

/// Subtracts `Σ_t c_t B_t û_b` from a right-hand side, where the `B_t` are boundary-column
/// blocks of coupling matrices and `û_b` are the boundary degrees of freedom.
pub fn subtract_lifting(rhs: &mut [Complex64], terms: &[(Complex64, &DMatrix<f64>)], boundary_dofs: &[Complex64]) {
    if boundary_dofs.iter().all(Complex64::is_zero) {
        return;
    }
    for (coefficient, block) in terms {
        for (i, r) in rhs.iter_mut().enumerate().take(block.nrows()) {
            let correction: Complex64 = boundary_dofs
                .iter()
                .enumerate()
                .map(|(c, b)| b * block[(i, c)])
                .sum();
            *r -= coefficient * correction;
        }
    }
}
