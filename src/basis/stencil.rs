//! Exact construction of boundary-adapted (composite) bases.
//!
//! A composite basis function is a short combination `φ_k = P_k + Σ_j c_j P_{k+j}` of
//! orthogonal functions whose coefficients are chosen such that `φ_k` satisfies the
//! homogeneous boundary conditions. The boundary (lifting) functions are combinations of the
//! lowest orthogonal functions which are dual to the boundary conditions. All coefficients are
//! computed in exact rational arithmetic.
use super::{BoundaryValue, Family, Side};
use crate::error::{Error, Result};
use num::rational::Ratio;
use num::{One, Zero};

pub type Rational = Ratio<i128>;

/// The kind of a boundary functional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BoundaryKind {
    Dirichlet,
    Neumann,
}

/// A boundary functional `u -> u(x_side)` or `u -> u'(x_side)` in reference coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Functional {
    pub side: Side,
    pub kind: BoundaryKind,
}

impl Functional {
    pub fn from_value(side: Side, value: &BoundaryValue) -> Option<Self> {
        match value {
            BoundaryValue::None => None,
            BoundaryValue::Dirichlet(_) => Some(Self {
                side,
                kind: BoundaryKind::Dirichlet,
            }),
            BoundaryValue::Neumann(_) => Some(Self {
                side,
                kind: BoundaryKind::Neumann,
            }),
        }
    }

    /// The functional applied to the orthogonal function `P_k`, if known in closed form.
    pub fn apply(&self, family: Family, k: usize) -> Option<Rational> {
        let kk = k as i128;
        let sign = |power: usize| if power % 2 == 0 { 1 } else { -1 };
        let value = match (family, self.kind, self.side) {
            (Family::Chebyshev | Family::Legendre, BoundaryKind::Dirichlet, Side::Left) => Rational::from(sign(k)),
            (Family::Chebyshev | Family::Legendre, BoundaryKind::Dirichlet, Side::Right) => Rational::one(),
            (Family::Chebyshev, BoundaryKind::Neumann, Side::Left) => Rational::from(sign(k + 1) * kk * kk),
            (Family::Chebyshev, BoundaryKind::Neumann, Side::Right) => Rational::from(kk * kk),
            (Family::Legendre, BoundaryKind::Neumann, Side::Left) => Rational::new(sign(k + 1) * kk * (kk + 1), 2),
            (Family::Legendre, BoundaryKind::Neumann, Side::Right) => Rational::new(kk * (kk + 1), 2),
            // ψ_k(0) = L_k(0) = 1
            (Family::Laguerre, BoundaryKind::Dirichlet, Side::Left) => Rational::one(),
            _ => return None,
        };
        Some(value)
    }
}

/// One composite function as a sparse combination of orthogonal functions.
pub(crate) type StencilRow = Vec<(usize, Rational)>;

/// Expansion of every degree of freedom of a basis in terms of orthogonal functions.
///
/// Rows `0..num_homogeneous` are the homogeneous (test) functions, the remaining rows are the
/// boundary functions, in the order of the boundary functionals (left before right).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stencil {
    rows: Vec<StencilRow>,
    num_homogeneous: usize,
}

impl Stencil {
    pub fn identity(n: usize) -> Self {
        Self {
            rows: (0..n).map(|k| vec![(k, Rational::one())]).collect(),
            num_homogeneous: n,
        }
    }

    pub fn new(family: Family, n: usize, functionals: &[Functional]) -> Result<Self> {
        let nbc = functionals.len();
        if nbc == 0 {
            return Ok(Self::identity(n));
        }
        if n < nbc + 1 {
            return Err(Error::configuration(format!(
                "{nbc} boundary conditions require at least {} modes, got {n}",
                nbc + 1
            )));
        }
        let evaluate = |functional: &Functional, k: usize| {
            functional.apply(family, k).ok_or_else(|| {
                Error::configuration(format!(
                    "{:?} condition on the {:?} side is not supported for {family:?}",
                    functional.kind, functional.side
                ))
            })
        };

        let num_homogeneous = n - nbc;
        let mut rows = Vec::with_capacity(n);
        for k in 0..num_homogeneous {
            // Unknowns c_1..c_nbc multiply P_{k+1}..P_{k+nbc}
            let mut matrix = Vec::with_capacity(nbc);
            let mut rhs = Vec::with_capacity(nbc);
            for functional in functionals {
                let row = (1..=nbc)
                    .map(|j| evaluate(functional, k + j))
                    .collect::<Result<Vec<_>>>()?;
                matrix.push(row);
                rhs.push(-evaluate(functional, k)?);
            }
            let c = solve_exact(matrix, rhs).ok_or_else(|| {
                Error::configuration(format!(
                    "boundary conditions do not determine a composite function of degree {k}"
                ))
            })?;
            let mut row = vec![(k, Rational::one())];
            row.extend(
                c.into_iter()
                    .enumerate()
                    .filter(|(_, c)| !c.is_zero())
                    .map(|(j, c)| (k + j + 1, c)),
            );
            rows.push(row);
        }

        rows.extend(boundary_functions(family, n, functionals, &evaluate)?);
        Ok(Self { rows, num_homogeneous })
    }

    pub fn num_homogeneous(&self) -> usize {
        self.num_homogeneous
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, dof: usize) -> &StencilRow {
        &self.rows[dof]
    }

    pub fn rows(&self) -> &[StencilRow] {
        &self.rows
    }

    /// The largest distance `m - k` between a homogeneous function `φ_k` and the orthogonal
    /// functions `P_m` it consists of.
    pub fn homogeneous_width(&self) -> usize {
        self.rows[..self.num_homogeneous]
            .iter()
            .enumerate()
            .flat_map(|(k, row)| row.iter().map(move |(m, _)| m - k))
            .max()
            .unwrap_or(0)
    }
}

/// Finds the boundary functions dual to the functionals.
///
/// The span of `P_0..P_{nbc-1}` is tried first. It is singular e.g. for two Neumann conditions,
/// in which case `P_1..P_nbc` is used.
fn boundary_functions(
    family: Family,
    n: usize,
    functionals: &[Functional],
    evaluate: &dyn Fn(&Functional, usize) -> Result<Rational>,
) -> Result<Vec<StencilRow>> {
    let nbc = functionals.len();
    for offset in 0..=1 {
        if offset + nbc > n {
            break;
        }
        let gram = functionals
            .iter()
            .map(|functional| {
                (0..nbc)
                    .map(|i| evaluate(functional, offset + i))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        // Column j of the inverse holds the coefficients of the j-th boundary function
        let mut columns = Vec::with_capacity(nbc);
        for j in 0..nbc {
            let unit = (0..nbc)
                .map(|f| if f == j { Rational::one() } else { Rational::zero() })
                .collect();
            match solve_exact(gram.clone(), unit) {
                Some(column) => columns.push(column),
                None => break,
            }
        }
        if columns.len() == nbc {
            return Ok(columns
                .into_iter()
                .map(|column| {
                    column
                        .into_iter()
                        .enumerate()
                        .filter(|(_, c)| !c.is_zero())
                        .map(|(i, c)| (offset + i, c))
                        .collect()
                })
                .collect());
        }
    }
    Err(Error::configuration(format!(
        "no lifting functions exist for the boundary conditions of {family:?}"
    )))
}

/// Solves a small dense system exactly. Returns `None` if the system is singular.
pub(crate) fn solve_exact(mut a: Vec<Vec<Rational>>, mut b: Vec<Rational>) -> Option<Vec<Rational>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).find(|&r| !a[r][col].is_zero())?;
        a.swap(col, pivot);
        b.swap(col, pivot);
        for r in col + 1..n {
            if a[r][col].is_zero() {
                continue;
            }
            let factor = a[r][col] / a[col][col];
            for c in col..n {
                let delta = factor * a[col][c];
                a[r][c] -= delta;
            }
            let delta = factor * b[col];
            b[r] -= delta;
        }
    }
    let mut x = vec![Rational::zero(); n];
    for r in (0..n).rev() {
        let mut sum = b[r];
        for c in r + 1..n {
            sum -= a[r][c] * x[c];
        }
        x[r] = sum / a[r][r];
    }
    Some(x)
}

/// Converts a rational to `f64`. Exact zeros stay exact, as do integers below `2^53`.
pub(crate) fn to_f64(r: &Rational) -> f64 {
    *r.numer() as f64 / *r.denom() as f64
}
