//! Storage of per-axis coupling matrices.
//!
//! A [`SpectralMatrix`] stores the homogeneous block of a coupling matrix (rows: test
//! functions, columns: homogeneous trial functions) as a map from diagonal offset to diagonal
//! values, plus an optional low-rank *tail* covering the far upper triangle:
//!
//! ```text
//!   A[i, j] = Σ_r U[i, r] V[j, r]    for j - i >= start.
//! ```
//!
//! Diagonals at or beyond `start` are never stored explicitly when a tail is present.
//! The columns belonging to boundary (lifting) functions are stored separately as a dense
//! block since they only ever enter right-hand sides.
use crate::basis::BasisKey;
use crate::error::{Error, Result};
use crate::space::TensorProductSpace;
use nalgebra::{DMatrix, DVector};
use ndarray::{ArrayD, IxDyn};
use num::complex::Complex64;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Upper-triangular region of a matrix given by a low-rank product.
#[derive(Debug, Clone, PartialEq)]
pub struct LowRankTail {
    start: usize,
    u: DMatrix<f64>,
    v: DMatrix<f64>,
}

impl LowRankTail {
    /// Creates a tail covering all entries with `j - i >= start`.
    ///
    /// # Panics
    ///
    /// Panics if `start` is zero or if `u` and `v` have different numbers of columns.
    pub fn new(start: usize, u: DMatrix<f64>, v: DMatrix<f64>) -> Self {
        assert!(start > 0, "The tail must lie strictly above the diagonal.");
        assert_eq!(u.ncols(), v.ncols(), "U and V must have the same rank.");
        Self { start, u, v }
    }

    /// The smallest offset `j - i` covered by the tail.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn rank(&self) -> usize {
        self.u.ncols()
    }

    /// Row factors, one row per matrix row.
    pub fn u(&self) -> &DMatrix<f64> {
        &self.u
    }

    /// Column factors, one row per matrix column.
    pub fn v(&self) -> &DMatrix<f64> {
        &self.v
    }

    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.u.row(i).dot(&self.v.row(j))
    }
}

/// Structure of the homogeneous block of a [`SpectralMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixStructure {
    /// No nonzero entries at all.
    Zero,
    Diagonal,
    Banded { lower: usize, upper: usize },
    /// Banded up to `start - 1` above the diagonal, low rank beyond.
    BandedWithTail {
        lower: usize,
        start: usize,
        rank: usize,
    },
    Dense,
}

/// A per-axis matrix with exact diagonal/banded structure.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralMatrix {
    nrows: usize,
    ncols: usize,
    diagonals: BTreeMap<isize, DVector<f64>>,
    tail: Option<LowRankTail>,
    boundary: DMatrix<f64>,
}

/// The number of entries on the diagonal with the given offset.
pub fn diagonal_len(nrows: usize, ncols: usize, offset: isize) -> usize {
    let first_row = (-offset).max(0) as usize;
    let first_col = offset.max(0) as usize;
    if first_row >= nrows || first_col >= ncols {
        0
    } else {
        (nrows - first_row).min(ncols - first_col)
    }
}

impl SpectralMatrix {
    /// An all-zero matrix with `nrows` rows, `ncols` homogeneous columns and
    /// `nboundary` boundary columns.
    pub fn zeros(nrows: usize, ncols: usize, nboundary: usize) -> Self {
        Self {
            nrows,
            ncols,
            diagonals: BTreeMap::new(),
            tail: None,
            boundary: DMatrix::zeros(nrows, nboundary),
        }
    }

    /// Stores a diagonal unless all of its entries are exactly zero.
    ///
    /// # Panics
    ///
    /// Panics if the length does not match the offset, or if the diagonal lies in the tail.
    pub fn insert_diagonal(&mut self, offset: isize, values: DVector<f64>) {
        assert_eq!(
            values.len(),
            diagonal_len(self.nrows, self.ncols, offset),
            "Diagonal length does not match offset."
        );
        if let Some(tail) = &self.tail {
            assert!(offset < tail.start as isize, "Diagonal overlaps the tail.");
        }
        if values.iter().any(|v| *v != 0.0) {
            self.diagonals.insert(offset, values);
        }
    }

    /// # Panics
    ///
    /// Panics if the tail dimensions do not match or explicit diagonals overlap it.
    pub fn set_tail(&mut self, tail: LowRankTail) {
        assert_eq!(tail.u.nrows(), self.nrows);
        assert_eq!(tail.v.nrows(), self.ncols);
        assert!(
            self.diagonals
                .keys()
                .all(|&offset| offset < tail.start as isize),
            "Explicit diagonals overlap the tail."
        );
        self.tail = Some(tail);
    }

    pub(crate) fn boundary_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.boundary
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// The number of homogeneous columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn num_boundary_columns(&self) -> usize {
        self.boundary.ncols()
    }

    pub fn diagonals(&self) -> &BTreeMap<isize, DVector<f64>> {
        &self.diagonals
    }

    pub fn diagonal(&self, offset: isize) -> Option<&DVector<f64>> {
        self.diagonals.get(&offset)
    }

    pub fn tail(&self) -> Option<&LowRankTail> {
        self.tail.as_ref()
    }

    /// The columns belonging to boundary functions.
    pub fn boundary(&self) -> &DMatrix<f64> {
        &self.boundary
    }

    /// The entry in row `i` and column `j`, where columns past the homogeneous ones refer to
    /// boundary functions.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.nrows && j < self.ncols + self.boundary.ncols(), "Index out of bounds.");
        if j >= self.ncols {
            return self.boundary[(i, j - self.ncols)];
        }
        let offset = j as isize - i as isize;
        match &self.tail {
            Some(tail) if offset >= tail.start as isize => tail.value(i, j),
            _ => self
                .diagonals
                .get(&offset)
                .map(|d| d[i - (-offset).max(0) as usize])
                .unwrap_or(0.0),
        }
    }

    /// The homogeneous block as a dense matrix.
    pub fn homogeneous_to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for (&offset, values) in &self.diagonals {
            let first_row = (-offset).max(0) as usize;
            for (k, v) in values.iter().enumerate() {
                let i = first_row + k;
                dense[(i, (i as isize + offset) as usize)] = *v;
            }
        }
        if let Some(tail) = &self.tail {
            for i in 0..self.nrows {
                for j in i + tail.start..self.ncols {
                    dense[(i, j)] = tail.value(i, j);
                }
            }
        }
        dense
    }

    /// The full matrix, homogeneous columns followed by boundary columns.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let nb = self.boundary.ncols();
        let mut dense = DMatrix::zeros(self.nrows, self.ncols + nb);
        dense
            .columns_mut(0, self.ncols)
            .copy_from(&self.homogeneous_to_dense());
        dense.columns_mut(self.ncols, nb).copy_from(&self.boundary);
        dense
    }

    /// The largest `i - j` of a stored entry below the diagonal.
    pub fn lower_bandwidth(&self) -> usize {
        self.diagonals
            .keys()
            .next()
            .map(|&offset| (-offset).max(0) as usize)
            .unwrap_or(0)
    }

    /// The largest `j - i` of an explicitly stored entry above the diagonal.
    pub fn explicit_upper_bandwidth(&self) -> usize {
        self.diagonals
            .keys()
            .next_back()
            .map(|&offset| offset.max(0) as usize)
            .unwrap_or(0)
    }

    pub fn structure(&self) -> MatrixStructure {
        let lower = self.lower_bandwidth();
        let upper = self.explicit_upper_bandwidth();
        if let Some(tail) = &self.tail {
            return MatrixStructure::BandedWithTail {
                lower,
                start: tail.start,
                rank: tail.rank(),
            };
        }
        if self.diagonals.is_empty() {
            MatrixStructure::Zero
        } else if lower == 0 && upper == 0 {
            MatrixStructure::Diagonal
        } else if lower + 1 >= self.nrows && upper + 1 >= self.ncols {
            MatrixStructure::Dense
        } else {
            MatrixStructure::Banded { lower, upper }
        }
    }

    /// Multiplies every entry, including boundary columns, by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for values in self.diagonals.values_mut() {
            *values *= factor;
        }
        if let Some(tail) = &mut self.tail {
            tail.u *= factor;
        }
        self.boundary *= factor;
    }
}

/// The per-axis operator of one separable term.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisMatrix {
    /// Diagonal in the Fourier modes, one (complex) value per spectral degree of freedom.
    Fourier(DVector<Complex64>),
    Spectral(SpectralMatrix),
}

/// A per-axis matrix tagged with the bases and derivative orders it couples.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingMatrix {
    test: BasisKey,
    trial: BasisKey,
    test_derivative: usize,
    trial_derivative: usize,
    matrix: AxisMatrix,
}

impl CouplingMatrix {
    pub(crate) fn new(
        test: BasisKey,
        trial: BasisKey,
        test_derivative: usize,
        trial_derivative: usize,
        matrix: AxisMatrix,
    ) -> Self {
        Self {
            test,
            trial,
            test_derivative,
            trial_derivative,
            matrix,
        }
    }

    pub fn test_basis(&self) -> &BasisKey {
        &self.test
    }

    pub fn trial_basis(&self) -> &BasisKey {
        &self.trial
    }

    /// Derivative order `p` on the test function.
    pub fn test_derivative(&self) -> usize {
        self.test_derivative
    }

    /// Derivative order `q` on the trial function.
    pub fn trial_derivative(&self) -> usize {
        self.trial_derivative
    }

    pub fn matrix(&self) -> &AxisMatrix {
        &self.matrix
    }

    pub fn as_spectral(&self) -> Option<&SpectralMatrix> {
        match &self.matrix {
            AxisMatrix::Spectral(matrix) => Some(matrix),
            AxisMatrix::Fourier(_) => None,
        }
    }

    pub fn as_fourier(&self) -> Option<&DVector<Complex64>> {
        match &self.matrix {
            AxisMatrix::Fourier(diagonal) => Some(diagonal),
            AxisMatrix::Spectral(_) => None,
        }
    }

    /// The number of trial degrees of freedom, boundary functions included.
    pub fn num_trial_dofs(&self) -> usize {
        match &self.matrix {
            AxisMatrix::Fourier(diagonal) => diagonal.len(),
            AxisMatrix::Spectral(matrix) => matrix.ncols() + matrix.num_boundary_columns(),
        }
    }

    /// The diagonal of a square matrix without off-diagonal entries, if it is one.
    pub fn diagonal_values(&self) -> Option<Vec<Complex64>> {
        match &self.matrix {
            AxisMatrix::Fourier(diagonal) => Some(diagonal.iter().copied().collect()),
            AxisMatrix::Spectral(matrix) => {
                let square = matrix.nrows() == matrix.ncols() && matrix.num_boundary_columns() == 0;
                let diagonal = matches!(matrix.structure(), MatrixStructure::Zero | MatrixStructure::Diagonal);
                (square && diagonal).then(|| {
                    (0..matrix.nrows())
                        .map(|i| Complex64::new(matrix.get(i, i), 0.0))
                        .collect()
                })
            }
        }
    }
}

/// One separable term of a bilinear form: a scale times a tensor product of per-axis matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct TPMatrix {
    scale: f64,
    matrices: Vec<Arc<CouplingMatrix>>,
}

impl TPMatrix {
    pub fn new(scale: f64, matrices: Vec<Arc<CouplingMatrix>>) -> Self {
        Self { scale, matrices }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn matrices(&self) -> &[Arc<CouplingMatrix>] {
        &self.matrices
    }

    pub fn axis(&self, axis: usize) -> &CouplingMatrix {
        &self.matrices[axis]
    }

    pub fn dim(&self) -> usize {
        self.matrices.len()
    }

    /// `(p, q)` per axis.
    pub fn derivative_orders(&self) -> Vec<(usize, usize)> {
        self.matrices
            .iter()
            .map(|m| (m.test_derivative, m.trial_derivative))
            .collect()
    }

    /// The term as an array over the local spectral degrees of freedom of `space`.
    ///
    /// Only available when every axis is diagonal, e.g. for forms on purely periodic spaces.
    /// Multiplying coefficients entrywise by the array applies the term.
    pub fn diagonal_array(&self, space: &TensorProductSpace) -> Result<ArrayD<Complex64>> {
        let dim = space.dim();
        if self.dim() != dim {
            return Err(Error::shape(&[dim], &[self.dim()]));
        }
        let global = space.global_shape(true);
        let mut diagonals = Vec::with_capacity(dim);
        for (axis, matrix) in self.matrices.iter().enumerate() {
            let diagonal = matrix.diagonal_values().ok_or_else(|| {
                Error::unsupported(format!("the matrix of axis {axis} couples different modes"))
            })?;
            if diagonal.len() != global[axis] {
                return Err(Error::shape(&[global[axis]], &[diagonal.len()]));
            }
            diagonals.push(diagonal);
        }

        let start: Vec<usize> = space.local_slice(true).iter().map(|r| r.start).collect();
        let shape = space.local_shape(true);
        Ok(ArrayD::from_shape_fn(IxDyn(&shape), |index| {
            let product: Complex64 = (0..dim)
                .map(|axis| diagonals[axis][start[axis] + index[axis]])
                .product();
            product * self.scale
        }))
    }
}

/// The sum of [`TPMatrix::diagonal_array`] over the terms of a form.
pub fn diagonal_array(terms: &[TPMatrix], space: &TensorProductSpace) -> Result<ArrayD<Complex64>> {
    let mut sum = ArrayD::zeros(IxDyn(&space.local_shape(true)));
    for term in terms {
        sum += &term.diagonal_array(space)?;
    }
    Ok(sum)
}
