//! One-dimensional transforms along a single axis.
//!
//! Fourier axes use FFTs. Polynomial axes project onto the basis with the quadrature rule and
//! solve with the discrete mass matrix, which makes `backward(forward(f)) == f` for every `f`
//! in the span of the basis.
use crate::assembly::assemble;
use crate::basis::Basis;
use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector};
use num::complex::Complex64;
use num::Zero;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

/// The direction of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Physical values to expansion coefficients.
    Forward,
    /// Expansion coefficients to physical values.
    Backward,
    /// Physical values to weighted inner products with the test functions.
    ScalarProduct,
}

/// FFT-based transform of a Fourier axis with `size` modes on `points >= size` grid points.
///
/// A padded grid (`points > size`) evaluates the modes on a finer grid and truncates on the way
/// back. The Nyquist mode of an even `size` is split evenly between `±size/2` on a padded grid.
pub(crate) struct FourierTransform {
    size: usize,
    points: usize,
    r2c: bool,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl Debug for FourierTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FourierTransform")
            .field("size", &self.size)
            .field("points", &self.points)
            .field("r2c", &self.r2c)
            .finish()
    }
}

impl FourierTransform {
    fn new(basis: &Basis) -> Self {
        let points = basis.num_points();
        let mut planner = FftPlanner::new();
        Self {
            size: basis.size(),
            points,
            r2c: basis.is_r2c(),
            forward: planner.plan_fft_forward(points),
            inverse: planner.plan_fft_inverse(points),
        }
    }

    fn num_modes(&self) -> usize {
        if self.r2c {
            self.size / 2 + 1
        } else {
            self.size
        }
    }

    fn is_padded(&self) -> bool {
        self.points > self.size
    }

    /// The Nyquist index of an even number of modes.
    fn nyquist(&self) -> Option<usize> {
        (self.size % 2 == 0).then_some(self.size / 2)
    }

    /// Position of spectral index `k` in the full spectrum of the grid.
    fn position(&self, k: usize) -> usize {
        if self.r2c || k < self.size / 2 {
            k
        } else {
            self.points + k - self.size
        }
    }

    /// `û_k = scale * Σ_j f_j exp(-i k x_j)`.
    fn forward(&self, input: &[Complex64], scale: f64) -> Vec<Complex64> {
        let mut buffer = input.to_vec();
        self.forward.process(&mut buffer);
        let mut output: Vec<Complex64> = (0..self.num_modes()).map(|k| buffer[self.position(k)]).collect();
        if let Some(nyquist) = self.nyquist().filter(|_| self.is_padded()) {
            output[nyquist] = buffer[nyquist] + buffer[self.points - nyquist];
        }
        output.iter_mut().for_each(|z| *z *= scale);
        output
    }

    fn backward(&self, input: &[Complex64]) -> Vec<Complex64> {
        let m = self.points;
        let mut full = vec![Complex64::zero(); m];
        for (k, z) in input.iter().enumerate() {
            full[self.position(k)] = *z;
        }
        if let Some(nyquist) = self.nyquist().filter(|_| self.is_padded()) {
            let z = input[nyquist] * 0.5;
            full[nyquist] = z;
            full[m - nyquist] = if self.r2c { z.conj() } else { z };
        }
        if self.r2c {
            // Rebuild the Hermitian half of the spectrum
            for k in 1..=(m - 1) / 2 {
                if full[m - k].is_zero() {
                    full[m - k] = full[k].conj();
                }
            }
        }
        self.inverse.process(&mut full);
        if self.r2c {
            full.iter_mut().for_each(|z| z.im = 0.0);
        }
        full
    }
}

#[derive(Debug)]
pub(crate) struct PolynomialTransform {
    /// `φ_k(x_j)`, one row per point and one column per degree of freedom.
    vandermonde: DMatrix<f64>,
    /// `W φ_i(x_j)` for the homogeneous test functions, one row per function.
    projection: DMatrix<f64>,
    /// `B_hh^{-1} P`, the homogeneous coefficients of a function with zero boundary dofs.
    solve_projection: DMatrix<f64>,
    /// `B_hh^{-1} B_hb`, the homogeneous coefficients induced by unit boundary dofs.
    solve_lifting: DMatrix<f64>,
}

impl PolynomialTransform {
    fn new(basis: &Basis) -> Result<Self> {
        let vandermonde = basis.vandermonde()?;
        let nhom = basis.num_homogeneous();
        let weights = DVector::from_column_slice(basis.weights());
        let projection = DMatrix::from_fn(nhom, basis.size(), |i, j| weights[j] * vandermonde[(j, i)]);

        let mass = assemble(basis, basis, 0, 0)?;
        let mass = mass
            .as_spectral()
            .ok_or_else(|| Error::configuration("polynomial basis produced a Fourier mass matrix"))?;
        let lu = mass.homogeneous_to_dense().lu();
        let singular = || Error::Numerical("the discrete mass matrix is singular".to_string());
        let solve_projection = lu.solve(&projection).ok_or_else(singular)?;
        let solve_lifting = lu.solve(mass.boundary()).ok_or_else(singular)?;

        Ok(Self {
            vandermonde,
            projection,
            solve_projection,
            solve_lifting,
        })
    }

    fn forward(&self, input: &[Complex64], boundary: &[Complex64]) -> Vec<Complex64> {
        let mut homogeneous = apply_real(&self.solve_projection, input);
        if !boundary.iter().all(Complex64::is_zero) {
            let lift = apply_real(&self.solve_lifting, boundary);
            homogeneous.iter_mut().zip(lift).for_each(|(u, l)| *u -= l);
        }
        homogeneous.extend_from_slice(boundary);
        homogeneous
    }

    fn scalar_product(&self, input: &[Complex64], nboundary: usize) -> Vec<Complex64> {
        let mut result = apply_real(&self.projection, input);
        result.resize(result.len() + nboundary, Complex64::zero());
        result
    }

    fn backward(&self, input: &[Complex64]) -> Vec<Complex64> {
        apply_real(&self.vandermonde, input)
    }
}

/// Applies a real matrix to a complex vector.
pub(crate) fn apply_real(matrix: &DMatrix<f64>, x: &[Complex64]) -> Vec<Complex64> {
    let re = DVector::from_iterator(x.len(), x.iter().map(|z| z.re));
    let im = DVector::from_iterator(x.len(), x.iter().map(|z| z.im));
    let re = matrix * re;
    let im = matrix * im;
    re.iter()
        .zip(im.iter())
        .map(|(&re, &im)| Complex64::new(re, im))
        .collect()
}

/// The transform of one axis of a space.
#[derive(Debug)]
pub(crate) enum AxisTransform {
    Fourier(FourierTransform),
    Polynomial(PolynomialTransform),
}

impl AxisTransform {
    pub fn new(basis: &Basis) -> Result<Self> {
        if basis.is_periodic() {
            Ok(Self::Fourier(FourierTransform::new(basis)))
        } else {
            Ok(Self::Polynomial(PolynomialTransform::new(basis)?))
        }
    }

    /// Transforms one lane.
    ///
    /// `boundary` holds the values of the boundary degrees of freedom and is only used by
    /// forward transforms of composite bases.
    pub fn apply(&self, direction: Direction, input: &[Complex64], boundary: &[Complex64]) -> Vec<Complex64> {
        match (self, direction) {
            (Self::Fourier(fft), Direction::Forward) => fft.forward(input, 1.0 / fft.points as f64),
            (Self::Fourier(fft), Direction::ScalarProduct) => fft.forward(input, 2.0 * PI / fft.points as f64),
            (Self::Fourier(fft), Direction::Backward) => fft.backward(input),
            (Self::Polynomial(poly), Direction::Forward) => poly.forward(input, boundary),
            (Self::Polynomial(poly), Direction::ScalarProduct) => poly.scalar_product(input, boundary.len()),
            (Self::Polynomial(poly), Direction::Backward) => poly.backward(input),
        }
    }
}
