//! Exact assembly of per-axis coupling matrices.
//!
//! The entry in row `i` and column `j` of a coupling matrix is
//!
//! ```text
//!   M[i, j] = (∂^q φ_j, ∂^p ψ_i)_w,
//! ```
//!
//! where `ψ_i` ranges over the homogeneous test functions and `φ_j` over all trial functions.
//! For the polynomial families the entries are stencil combinations of closed-form kernels,
//! evaluated in exact rational arithmetic and rounded to `f64` once, so that every entry which
//! is zero in exact arithmetic is exactly `0.0`. Far above the diagonal, upper-triangular
//! kernels are stored as a low-rank tail derived from a separable form of the kernel.
use crate::basis::stencil::{to_f64, Rational, Stencil};
use crate::basis::{Basis, BasisKey, Family};
use crate::error::{Error, Result};
use crate::matrix::{diagonal_len, AxisMatrix, CouplingMatrix, LowRankTail, SpectralMatrix};
use kernels::{ExactKernel, KernelShape};
use log::debug;
use nalgebra::{DMatrix, DVector};
use num::complex::Complex64;
use num::Zero;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

pub(crate) mod kernels;

/// Assembles the coupling matrix `(∂^q φ_j, ∂^p ψ_i)_w` between a test and a trial basis.
///
/// Test and trial bases must belong to the same family and have the same size. They may
/// differ in their boundary conditions.
pub fn assemble(test: &Basis, trial: &Basis, p: usize, q: usize) -> Result<CouplingMatrix> {
    if test.family() != trial.family() || test.size() != trial.size() || test.quadrature() != trial.quadrature() {
        return Err(Error::unsupported(format!(
            "coupling between {:?} (N = {}) and {:?} (N = {})",
            test.family(),
            test.size(),
            trial.family(),
            trial.size()
        )));
    }

    let matrix = match test.family() {
        Family::Fourier => AxisMatrix::Fourier(assemble_fourier(test, trial, p, q)?),
        Family::Jacobi { .. } => AxisMatrix::Spectral(assemble_jacobi(test, trial, p, q)?),
        _ => AxisMatrix::Spectral(assemble_polynomial(test, trial, p, q)?),
    };
    debug!(
        "Assembled {:?} coupling matrix with derivative orders (test {p}, trial {q}), N = {}",
        test.family(),
        test.size()
    );
    Ok(CouplingMatrix::new(test.key(), trial.key(), p, q, matrix))
}

/// The diagonal `2π (i k s)^q (-i k s)^p` of a Fourier coupling.
///
/// The Nyquist mode has no well-defined odd derivative and is set to zero for odd total order.
fn assemble_fourier(test: &Basis, trial: &Basis, p: usize, q: usize) -> Result<DVector<Complex64>> {
    if test.key() != trial.key() {
        return Err(Error::unsupported("coupling between different Fourier bases"));
    }
    let s = test.domain_factor();
    let nyquist = test.nyquist_index();
    let odd = (p + q) % 2 == 1;
    let values = test
        .wavenumbers()
        .into_iter()
        .enumerate()
        .map(|(index, k)| {
            if odd && nyquist == Some(index) {
                return Complex64::zero();
            }
            let ik = Complex64::new(0.0, k * s);
            (-ik).powu(p as u32) * ik.powu(q as u32) * (2.0 * PI)
        });
    Ok(DVector::from_iterator(test.num_dofs(), values))
}

/// Jacobi bases only provide the (diagonal) mass matrix, with norms from the quadrature rule.
fn assemble_jacobi(test: &Basis, trial: &Basis, p: usize, q: usize) -> Result<SpectralMatrix> {
    if (p, q) != (0, 0) || test.key() != trial.key() {
        return Err(Error::unsupported(format!(
            "Jacobi bases only support the mass matrix, got derivative orders ({p}, {q})"
        )));
    }
    let n = test.size();
    let mut matrix = SpectralMatrix::zeros(n, n, 0);
    matrix.insert_diagonal(0, DVector::from_vec(test.discrete_norms()));
    Ok(matrix)
}

fn stencil_entry(kernel: &ExactKernel, test: &Stencil, trial: &Stencil, i: usize, j: usize) -> Rational {
    let mut sum = Rational::zero();
    for (n, test_coefficient) in test.row(i) {
        for (m, trial_coefficient) in trial.row(j) {
            let k = kernel.value(*m, *n);
            if !k.is_zero() {
                sum += *test_coefficient * *trial_coefficient * k;
            }
        }
    }
    sum
}

fn assemble_polynomial(test: &Basis, trial: &Basis, p: usize, q: usize) -> Result<SpectralMatrix> {
    let kernel = ExactKernel::new(test.family(), test.quadrature(), test.size(), p, q)?;
    let test_stencil = test.stencil();
    let trial_stencil = trial.stencil();
    let nrows = test_stencil.num_homogeneous();
    let ncols = trial_stencil.num_homogeneous();
    let nboundary = trial_stencil.len() - ncols;
    let scale = kernel.factor() * test.domain_factor().powi(p as i32) * trial.domain_factor().powi(q as i32);
    let entry = |i: usize, j: usize| to_f64(&stencil_entry(&kernel, test_stencil, trial_stencil, i, j)) * scale;

    let test_width = test_stencil.homogeneous_width() as isize;
    let trial_width = trial_stencil.homogeneous_width() as isize;
    // Past `tail_start`, every test index is strictly smaller than every trial index
    let tail_start = test_width + 1;
    let offsets = match kernel.shape() {
        KernelShape::Diagonal => -trial_width..test_width + 1,
        KernelShape::Upper if kernel.separable_upper().is_some() => -trial_width..tail_start,
        KernelShape::Upper => -trial_width..ncols as isize,
        KernelShape::Full => -(nrows as isize) + 1..ncols as isize,
    };

    let mut matrix = SpectralMatrix::zeros(nrows, ncols, nboundary);
    for offset in offsets {
        let first_row = (-offset).max(0) as usize;
        let len = diagonal_len(nrows, ncols, offset);
        let values = DVector::from_fn(len, |k, _| {
            let i = first_row + k;
            entry(i, (i as isize + offset) as usize)
        });
        matrix.insert_diagonal(offset, values);
    }

    for i in 0..nrows {
        for c in 0..nboundary {
            matrix.boundary_mut()[(i, c)] = entry(i, ncols + c);
        }
    }

    if kernel.shape() == KernelShape::Upper && (tail_start as usize) < ncols {
        if let Some(tail) = separable_tail(&kernel, test_stencil, trial_stencil, tail_start as usize, scale) {
            matrix.set_tail(tail);
        }
    }
    Ok(matrix)
}

/// Builds the low-rank tail from the separable form of an upper kernel.
///
/// Ranks whose row or column factors vanish identically are dropped. Returns `None` if no
/// rank survives, in which case the tail region is exactly zero.
fn separable_tail(
    kernel: &ExactKernel,
    test: &Stencil,
    trial: &Stencil,
    start: usize,
    scale: f64,
) -> Option<LowRankTail> {
    let terms = kernel.separable_upper()?;
    let nrows = test.num_homogeneous();
    let ncols = trial.num_homogeneous();

    let mut u_columns = Vec::new();
    let mut v_columns = Vec::new();
    for term in &terms {
        let u: Vec<Rational> = (0..nrows)
            .map(|i| {
                test.row(i)
                    .iter()
                    .fold(Rational::zero(), |sum, (n, c)| sum + *c * (term.test)(*n as i128))
                    * term.coefficient
            })
            .collect();
        let v: Vec<Rational> = (0..ncols)
            .map(|j| {
                trial
                    .row(j)
                    .iter()
                    .fold(Rational::zero(), |sum, (m, c)| sum + *c * (term.trial)(*m as i128))
            })
            .collect();
        if u.iter().any(|x| !x.is_zero()) && v.iter().any(|x| !x.is_zero()) {
            u_columns.push(u);
            v_columns.push(v);
        }
    }

    if u_columns.is_empty() {
        return None;
    }
    let rank = u_columns.len();
    let u = DMatrix::from_fn(nrows, rank, |i, r| to_f64(&u_columns[r][i]) * scale);
    let v = DMatrix::from_fn(ncols, rank, |j, r| to_f64(&v_columns[r][j]));
    Some(LowRankTail::new(start, u, v))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatrixKey {
    test: BasisKey,
    trial: BasisKey,
    p: usize,
    q: usize,
}

/// Cache of assembled coupling matrices, owned by a function space.
#[derive(Debug, Default)]
pub struct MatrixCache {
    matrices: Mutex<HashMap<MatrixKey, Arc<CouplingMatrix>>>,
}

impl MatrixCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached matrix for the given pairing, assembling it on first use.
    pub fn get_or_assemble(&self, test: &Basis, trial: &Basis, p: usize, q: usize) -> Result<Arc<CouplingMatrix>> {
        let key = MatrixKey {
            test: test.key(),
            trial: trial.key(),
            p,
            q,
        };
        if let Some(matrix) = self.matrices.lock().get(&key) {
            debug!("Fetched {:?} coupling matrix ({p}, {q}) from cache", test.family());
            return Ok(Arc::clone(matrix));
        }
        // The lock is not held during assembly
        let matrix = Arc::new(assemble(test, trial, p, q)?);
        Ok(Arc::clone(self.matrices.lock().entry(key).or_insert(matrix)))
    }

    pub fn len(&self) -> usize {
        self.matrices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
