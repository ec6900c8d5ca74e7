//! Gaussian elimination for banded matrices with a low-rank upper tail.
//!
//! Row `i` of a [`BandedTailMatrix`] stores the columns `i - lower .. i + window` explicitly,
//! and every column `j >= i + window` through the tail `Σ_r U[i, r] V[j, r]`. Eliminating below
//! the diagonal without pivoting never widens the explicit window: the part of a pivot row that
//! lies in its tail but inside the window of a lower row is expanded explicitly, and the rest is
//! accounted for by updating the row factors `U`. The cost is `O(n lower (window + lower rank))`
//! for the factorization and `O(n (lower + window + rank))` per solve.
use crate::error::{Error, Result};
use nalgebra::DMatrix;
use num::complex::Complex64;
use num::Zero;

#[derive(Debug, Clone, PartialEq)]
pub struct BandedTailMatrix {
    size: usize,
    lower: usize,
    window: usize,
    rows: Vec<Vec<Complex64>>,
    u: Vec<Vec<Complex64>>,
    v: Vec<Vec<Complex64>>,
}

impl BandedTailMatrix {
    /// A zero matrix of the given dimension, storing `lower` subdiagonals and `window - 1`
    /// superdiagonals explicitly.
    pub fn zeros(size: usize, lower: usize, window: usize) -> Self {
        let window = window.max(1);
        Self {
            size,
            lower,
            window,
            rows: vec![vec![Complex64::zero(); lower + window]; size],
            u: vec![Vec::new(); size],
            v: vec![Vec::new(); size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn lower(&self) -> usize {
        self.lower
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn rank(&self) -> usize {
        self.u.first().map(Vec::len).unwrap_or(0)
    }

    fn explicit_index(&self, i: usize, j: usize) -> Option<usize> {
        (j + self.lower >= i && j < i + self.window).then(|| j + self.lower - i)
    }

    /// Adds `value` to an explicitly stored entry.
    ///
    /// # Panics
    ///
    /// Panics if the entry lies outside the explicit band.
    pub fn add(&mut self, i: usize, j: usize, value: Complex64) {
        match self.explicit_index(i, j) {
            Some(index) => self.rows[i][index] += value,
            None => panic!("Entry ({i}, {j}) lies outside the explicit band."),
        }
    }

    /// Appends rank-one terms to the tail. Column `r` of `u` and `v` forms one term, and `u` is
    /// scaled by `coefficient`.
    pub fn add_tail(&mut self, coefficient: Complex64, u: &DMatrix<f64>, v: &DMatrix<f64>) {
        assert_eq!(u.nrows(), self.size);
        assert_eq!(v.nrows(), self.size);
        for (i, row) in self.u.iter_mut().enumerate() {
            row.extend(u.row(i).iter().map(|x| coefficient * x));
        }
        for (j, row) in self.v.iter_mut().enumerate() {
            row.extend(v.row(j).iter().map(|x| Complex64::new(*x, 0.0)));
        }
    }

    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        match self.explicit_index(i, j) {
            Some(index) => self.rows[i][index],
            None if j >= i + self.window => self.tail_value(i, j),
            None => Complex64::zero(),
        }
    }

    fn tail_value(&self, i: usize, j: usize) -> Complex64 {
        self.u[i].iter().zip(&self.v[j]).map(|(u, v)| u * v).sum()
    }

    /// Replaces row `i` by the corresponding row of the identity.
    pub fn set_unit_row(&mut self, i: usize) {
        self.rows[i].fill(Complex64::zero());
        self.rows[i][self.lower] = Complex64::new(1.0, 0.0);
        self.u[i].fill(Complex64::zero());
    }

    /// Returns the first column whose entries are all exactly zero.
    pub fn find_zero_column(&self) -> Option<usize> {
        (0..self.size).find(|&j| (0..self.size).all(|i| self.get(i, j).is_zero()))
    }

    pub fn to_dense(&self) -> DMatrix<Complex64> {
        DMatrix::from_fn(self.size, self.size, |i, j| self.get(i, j))
    }

    /// Computes an LU factorization without pivoting.
    pub fn factorize(mut self) -> Result<BandedTailLu> {
        let (n, lower, window, rank) = (self.size, self.lower, self.window, self.rank());
        for k in 0..n {
            let pivot = self.rows[k][lower];
            if pivot.is_zero() {
                return Err(Error::Numerical(format!("zero pivot in row {k} of a banded factorization")));
            }
            for i in k + 1..(k + lower + 1).min(n) {
                let position = k + lower - i;
                let a = self.rows[i][position];
                if a.is_zero() {
                    continue;
                }
                let m = a / pivot;
                // The eliminated entry holds the multiplier from now on
                let (head, tail) = self.rows.split_at_mut(i);
                let (pivot_row, row) = (&head[k], &mut tail[0]);
                row[position] = m;
                for j in k + 1..(k + window).min(n) {
                    row[j + lower - i] -= m * pivot_row[j + lower - k];
                }
                if rank > 0 {
                    let (head, tail) = self.u.split_at_mut(i);
                    let (pivot_u, row_u) = (&head[k], &mut tail[0]);
                    for j in k + window..(i + window).min(n) {
                        let value: Complex64 = pivot_u.iter().zip(&self.v[j]).map(|(u, v)| u * v).sum();
                        row[j + lower - i] -= m * value;
                    }
                    row_u.iter_mut().zip(pivot_u).for_each(|(u, p)| *u -= m * p);
                }
            }
        }
        Ok(BandedTailLu { factors: self })
    }
}

/// The factors of a [`BandedTailMatrix`], stored in place.
#[derive(Debug, Clone, PartialEq)]
pub struct BandedTailLu {
    factors: BandedTailMatrix,
}

impl BandedTailLu {
    pub fn size(&self) -> usize {
        self.factors.size
    }

    /// Overwrites `b` with the solution of `A x = b`.
    pub fn solve_in_place(&self, b: &mut [Complex64]) {
        let BandedTailMatrix {
            size: n,
            lower,
            window,
            rows,
            u,
            v,
        } = &self.factors;
        let (n, lower, window) = (*n, *lower, *window);
        assert_eq!(b.len(), n, "Right-hand side has the wrong length.");

        for k in 0..n {
            let bk = b[k];
            for i in k + 1..(k + lower + 1).min(n) {
                b[i] -= rows[i][k + lower - i] * bk;
            }
        }

        let rank = self.factors.rank();
        // Σ_{j >= i + window} V[j, r] x_j
        let mut suffix = vec![Complex64::zero(); rank];
        for i in (0..n).rev() {
            if rank > 0 && i + window < n {
                let j = i + window;
                suffix.iter_mut().zip(&v[j]).for_each(|(s, v)| *s += v * b[j]);
            }
            let mut sum = b[i];
            for j in i + 1..(i + window).min(n) {
                sum -= rows[i][j + lower - i] * b[j];
            }
            sum -= u[i].iter().zip(&suffix).map(|(u, s)| u * s).sum::<Complex64>();
            b[i] = sum / rows[i][lower];
        }
    }
}
