//! Direct solvers for systems with a single non-periodic axis.
//!
//! Along every periodic axis the coupling matrices are diagonal, so the system decouples into
//! one small system per lane of the non-periodic axis. For the lane with periodic global indices
//! `g`, the lane matrix is
//!
//! ```text
//!   M(g) = Σ_t c_t(g) A_t,    c_t(g) = scale_t Π_{periodic a} d_{t,a}[g_a],
//! ```
//!
//! where `A_t` is the non-periodic coupling matrix of term `t` and `d_{t,a}` its Fourier
//! diagonals. Factorizations are cached per lane, so solving again with a new right-hand side
//! only costs the substitution.
use crate::array::Function;
use crate::error::{Error, Result};
use crate::lifting::subtract_lifting;
use crate::matrix::{CouplingMatrix, SpectralMatrix, TPMatrix};
use crate::space::TensorProductSpace;
use log::{debug, warn};
use nalgebra::{DVector, Dyn, LU};
use ndarray::{Axis, Dimension, Zip};
use num::complex::Complex64;
use num::Zero;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub mod banded;

use banded::{BandedTailLu, BandedTailMatrix};

/// Pins the coefficient of the homogeneous function with the given index, on the lane whose
/// periodic indices are all zero, to a value.
pub type Constraint = (usize, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Banded elimination when the lane matrix is banded, dense LU otherwise.
    Auto,
    /// Always use banded elimination.
    Banded,
}

/// Terms sharing the same non-periodic coupling matrix.
#[derive(Debug)]
struct Group {
    matrix: Arc<CouplingMatrix>,
    terms: Vec<usize>,
}

enum Factorization {
    Banded(BandedTailLu),
    Dense(LU<Complex64, Dyn, Dyn>),
}

impl Factorization {
    fn solve_in_place(&self, b: &mut [Complex64]) -> Result<()> {
        match self {
            Self::Banded(lu) => {
                lu.solve_in_place(b);
                Ok(())
            }
            Self::Dense(lu) => {
                let x = lu
                    .solve(&DVector::from_column_slice(b))
                    .ok_or_else(|| Error::Numerical("dense lane matrix is singular".to_string()))?;
                b.copy_from_slice(x.as_slice());
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LaneKey {
    periodic_index: Vec<usize>,
    constrained: Vec<usize>,
}

/// Shared implementation of the lane-wise solvers.
struct LaneSolver {
    terms: Vec<TPMatrix>,
    axis: usize,
    groups: Vec<Group>,
    strategy: Strategy,
    factorizations: Mutex<HashMap<LaneKey, Arc<Factorization>>>,
}

impl LaneSolver {
    fn new(terms: Vec<TPMatrix>, strategy: Strategy) -> Result<Self> {
        let first = terms
            .first()
            .ok_or_else(|| Error::configuration("a solver needs at least one term"))?;
        let dim = first.dim();
        let non_periodic: Vec<usize> = (0..dim).filter(|&a| first.axis(a).as_spectral().is_some()).collect();
        let axis = match non_periodic.as_slice() {
            [axis] => *axis,
            _ => {
                return Err(Error::configuration(format!(
                    "lane solvers need exactly one non-periodic axis, got {non_periodic:?}"
                )))
            }
        };

        let mut groups: Vec<Group> = Vec::new();
        for (index, term) in terms.iter().enumerate() {
            if term.dim() != dim {
                return Err(Error::configuration("all terms must have the same dimension"));
            }
            for a in 0..dim {
                let periodic = term.axis(a).as_fourier().is_some();
                if periodic == (a == axis) {
                    return Err(Error::configuration(format!(
                        "term {index} does not have its only non-periodic matrix on axis {axis}"
                    )));
                }
            }
            let matrix = &term.matrices()[axis];
            let spectral = matrix
                .as_spectral()
                .ok_or_else(|| Error::configuration("missing non-periodic matrix"))?;
            if spectral.nrows() != spectral.ncols() {
                return Err(Error::configuration(format!(
                    "lane matrices must be square, got {} x {}",
                    spectral.nrows(),
                    spectral.ncols()
                )));
            }
            match groups.iter_mut().find(|g| Arc::ptr_eq(&g.matrix, matrix)) {
                Some(group) => group.terms.push(index),
                None => groups.push(Group {
                    matrix: Arc::clone(matrix),
                    terms: vec![index],
                }),
            }
        }
        Ok(Self {
            terms,
            axis,
            groups,
            strategy,
            factorizations: Mutex::new(HashMap::new()),
        })
    }

    fn check_space(&self, space: &TensorProductSpace) -> Result<()> {
        let expected: Vec<usize> = self.terms[0]
            .matrices()
            .iter()
            .map(|matrix| matrix.num_trial_dofs())
            .collect();
        let actual = space.global_shape(true);
        if actual != expected {
            return Err(Error::shape(&expected, &actual));
        }
        for term in &self.terms {
            for (a, matrix) in term.matrices().iter().enumerate() {
                if *matrix.trial_basis() != space.basis(a).key() {
                    return Err(Error::configuration(format!(
                        "the matrix on axis {a} was assembled for a different trial basis"
                    )));
                }
            }
        }
        let (local, global) = (space.local_shape(true), space.global_shape(true));
        if local[self.axis] != global[self.axis] {
            return Err(Error::configuration(format!(
                "axis {} is distributed in spectral space; make it the first entry of the space axes",
                self.axis
            )));
        }
        Ok(())
    }

    /// The lane coefficient of every group.
    fn coefficients(&self, global: &[usize]) -> Vec<Complex64> {
        self.groups
            .iter()
            .map(|group| {
                group
                    .terms
                    .iter()
                    .map(|&t| {
                        let term = &self.terms[t];
                        (0..term.dim())
                            .filter(|&a| a != self.axis)
                            .filter_map(|a| term.axis(a).as_fourier().map(|d| d[global[a]]))
                            .fold(Complex64::new(term.scale(), 0.0), |c, d| c * d)
                    })
                    .sum()
            })
            .collect()
    }

    fn lane_matrix(&self, coefficients: &[Complex64]) -> BandedTailMatrix {
        let weighted: Vec<(Complex64, &SpectralMatrix)> = self
            .groups
            .iter()
            .zip(coefficients)
            .filter(|(_, c)| !c.is_zero())
            .filter_map(|(group, c)| group.matrix.as_spectral().map(|m| (*c, m)))
            .collect();
        let size = self.groups[0]
            .matrix
            .as_spectral()
            .map(SpectralMatrix::nrows)
            .unwrap_or(0);

        let lower = weighted.iter().map(|(_, m)| m.lower_bandwidth()).max().unwrap_or(0);
        let window = weighted
            .iter()
            .map(|(_, m)| match m.tail() {
                Some(tail) => tail.start(),
                None => m.explicit_upper_bandwidth() + 1,
            })
            .max()
            .unwrap_or(1)
            .min(size.max(1));

        let mut matrix = BandedTailMatrix::zeros(size, lower, window);
        for (c, m) in &weighted {
            for (&offset, values) in m.diagonals() {
                let first_row = (-offset).max(0) as usize;
                for (k, value) in values.iter().enumerate() {
                    let i = first_row + k;
                    matrix.add(i, (i as isize + offset) as usize, c * value);
                }
            }
            if let Some(tail) = m.tail() {
                // Tail entries inside the explicit window of the combined matrix
                for i in 0..size {
                    for j in i + tail.start()..(i + window).min(size) {
                        matrix.add(i, j, c * tail.value(i, j));
                    }
                }
                matrix.add_tail(*c, tail.u(), tail.v());
            }
        }
        matrix
    }

    fn factorize(&self, key: &LaneKey, coefficients: &[Complex64]) -> Result<Arc<Factorization>> {
        if let Some(factorization) = self.factorizations.lock().get(key) {
            return Ok(Arc::clone(factorization));
        }
        let mut matrix = self.lane_matrix(coefficients);
        for &index in &key.constrained {
            matrix.set_unit_row(index);
        }
        if let Some(column) = matrix.find_zero_column() {
            return Err(Error::SingularSystem(format!(
                "column {column} of the lane with periodic indices {:?} is zero; \
                 the system needs a constraint on that coefficient",
                key.periodic_index
            )));
        }
        let banded = matrix.lower() + matrix.window() < matrix.size();
        let factorization = match self.strategy {
            Strategy::Banded => Factorization::Banded(matrix.factorize()?),
            Strategy::Auto if banded => Factorization::Banded(matrix.factorize()?),
            Strategy::Auto => Factorization::Dense(matrix.to_dense().lu()),
        };
        let factorization = Arc::new(factorization);
        self.factorizations
            .lock()
            .insert(key.clone(), Arc::clone(&factorization));
        Ok(factorization)
    }

    fn solve(&self, rhs: &Function, solution: &mut Function, constraints: &[Constraint]) -> Result<()> {
        let space = Arc::clone(rhs.space());
        self.check_space(&space)?;
        space.check_shape(true, rhs.data().shape())?;
        space.check_shape(true, solution.data().shape())?;
        let size = self.groups[0]
            .matrix
            .as_spectral()
            .map(SpectralMatrix::nrows)
            .unwrap_or(0);
        if let Some((index, _)) = constraints.iter().find(|(index, _)| *index >= size) {
            return Err(Error::configuration(format!(
                "constraint on coefficient {index}, but the lane has {size} homogeneous coefficients"
            )));
        }

        // `solution` is only written once every lane has been solved
        let mut scratch = solution.clone();
        scratch.set_boundary_dofs();
        let start: Vec<usize> = space.local_slice(true).iter().map(|r| r.start).collect();
        let axis = self.axis;
        let mut status = Ok(());
        Zip::indexed(rhs.data().lanes(Axis(axis)))
            .and(scratch.data_mut().lanes_mut(Axis(axis)))
            .for_each(|index, f, mut u| {
                if status.is_err() {
                    return;
                }
                let mut global = index.slice().to_vec();
                global.insert(axis, 0);
                global.iter_mut().zip(&start).for_each(|(g, s)| *g += s);

                let coefficients = self.coefficients(&global);
                let zero_lane = global.iter().enumerate().all(|(a, &g)| a == axis || g == 0);
                let mut constrained: Vec<usize> = Vec::new();
                if zero_lane {
                    constrained.extend(constraints.iter().map(|(index, _)| *index));
                }
                let mut periodic_index = global.clone();
                periodic_index.remove(axis);
                let key = LaneKey {
                    periodic_index,
                    constrained,
                };

                let lane: Vec<Complex64> = u.iter().copied().collect();
                let mut b: Vec<Complex64> = f.iter().take(size).copied().collect();
                let boundary_terms: Vec<(Complex64, &nalgebra::DMatrix<f64>)> = self
                    .groups
                    .iter()
                    .zip(&coefficients)
                    .filter_map(|(group, c)| group.matrix.as_spectral().map(|m| (*c, m.boundary())))
                    .collect();
                subtract_lifting(&mut b, &boundary_terms, &lane[size..]);
                if zero_lane {
                    for &(index, value) in constraints {
                        b[index] = Complex64::new(value, 0.0);
                    }
                }

                let solved = self
                    .factorize(&key, &coefficients)
                    .and_then(|factorization| factorization.solve_in_place(&mut b));
                match solved {
                    Ok(()) => u.iter_mut().zip(b).for_each(|(u, x)| *u = x),
                    Err(err) => status = Err(err),
                }
            });
        status?;
        *solution = scratch;
        Ok(())
    }
}

/// Solver for any sum of terms with a single non-periodic axis.
///
/// Every lane is factorized with banded elimination when the combined matrix is banded, and
/// with a dense LU factorization otherwise.
pub struct SolverGeneric1ND {
    solver: LaneSolver,
}

impl SolverGeneric1ND {
    pub fn new(terms: Vec<TPMatrix>) -> Result<Self> {
        let solver = LaneSolver::new(terms, Strategy::Auto)?;
        debug!(
            "Created generic solver with {} terms along axis {}",
            solver.terms.len(),
            solver.axis
        );
        Ok(Self { solver })
    }

    /// The non-periodic axis.
    pub fn axis(&self) -> usize {
        self.solver.axis
    }

    /// Solves for the homogeneous coefficients of `solution`.
    ///
    /// The boundary degrees of freedom of `solution` are set from the boundary conditions of
    /// its space. Lanes are factorized on first use.
    pub fn solve(&self, rhs: &Function, solution: &mut Function, constraints: &[Constraint]) -> Result<()> {
        self.solver.solve(rhs, solution, constraints)
    }

    /// The number of cached lane factorizations.
    pub fn num_factorizations(&self) -> usize {
        self.solver.factorizations.lock().len()
    }
}

/// Solver for Helmholtz-type problems `α (u, v) + (∇²u, v) = (f, v)` with a single
/// non-periodic axis.
///
/// The terms may involve at most two distinct non-periodic matrices, typically the stiffness
/// and the mass matrix. Other combinations are handed to [`SolverGeneric1ND`].
pub struct Helmholtz {
    solver: LaneSolver,
}

impl Helmholtz {
    pub fn new(terms: Vec<TPMatrix>) -> Result<Self> {
        let mut solver = LaneSolver::new(terms, Strategy::Banded)?;
        if solver.groups.len() > 2 {
            warn!(
                "Helmholtz solver got {} distinct matrices along axis {}; falling back to the generic solver",
                solver.groups.len(),
                solver.axis
            );
            solver.strategy = Strategy::Auto;
        }
        debug!("Created Helmholtz solver along axis {}", solver.axis);
        Ok(Self { solver })
    }

    /// Returns `true` if the terms did not fit the Helmholtz structure.
    pub fn is_generic(&self) -> bool {
        self.solver.strategy == Strategy::Auto
    }

    pub fn axis(&self) -> usize {
        self.solver.axis
    }

    /// See [`SolverGeneric1ND::solve`].
    pub fn solve(&self, rhs: &Function, solution: &mut Function, constraints: &[Constraint]) -> Result<()> {
        self.solver.solve(rhs, solution, constraints)
    }
}
