//! Closed-form inner products of orthogonal functions and their derivatives.
//!
//! Each kernel gives `K(m, n) = (∂^q P_m, ∂^p P_n)_w` in the reference domain, where `m` is
//! the trial index and `n` the test index. Values are `factor * rational`, with the
//! irrational part of the family collected in `factor` so that the rational part is exact.
use crate::basis::stencil::Rational;
use crate::basis::{Family, Quadrature};
use crate::error::{Error, Result};
use num::{One, Zero};
use std::f64::consts::PI;

/// Where nonzero values of a kernel may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KernelShape {
    /// Only `m == n`.
    Diagonal,
    /// Only `n <= m`.
    Upper,
    Full,
}

/// A factor of a separable kernel term, evaluated at an index.
type IndexFunction = fn(i128) -> Rational;

/// A term `coefficient * f(m) * g(n)` of a separable kernel.
pub(crate) struct SeparableTerm {
    pub coefficient: Rational,
    pub trial: IndexFunction,
    pub test: IndexFunction,
}

fn one(_: i128) -> Rational {
    Rational::one()
}

fn alternating(k: i128) -> Rational {
    Rational::from(parity_sign(k))
}

fn linear(k: i128) -> Rational {
    Rational::from(k)
}

fn linear_alternating(k: i128) -> Rational {
    Rational::from(k * parity_sign(k))
}

fn square(k: i128) -> Rational {
    Rational::from(k * k)
}

fn square_alternating(k: i128) -> Rational {
    Rational::from(k * k * parity_sign(k))
}

fn cube(k: i128) -> Rational {
    Rational::from(k * k * k)
}

fn cube_alternating(k: i128) -> Rational {
    Rational::from(k * k * k * parity_sign(k))
}

fn pronic(k: i128) -> Rational {
    Rational::from(k * (k + 1))
}

fn pronic_alternating(k: i128) -> Rational {
    Rational::from(k * (k + 1) * parity_sign(k))
}

fn parity_sign(k: i128) -> i128 {
    if k % 2 == 0 {
        1
    } else {
        -1
    }
}

fn term(coefficient: Rational, trial: IndexFunction, test: IndexFunction) -> SeparableTerm {
    SeparableTerm {
        coefficient,
        trial,
        test,
    }
}

/// Exact kernel of one polynomial family for a pair of derivative orders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ExactKernel {
    family: Family,
    quadrature: Quadrature,
    size: usize,
    /// Derivative on the test function.
    p: usize,
    /// Derivative on the trial function.
    q: usize,
}

impl ExactKernel {
    pub fn new(family: Family, quadrature: Quadrature, size: usize, p: usize, q: usize) -> Result<Self> {
        match family {
            Family::Chebyshev | Family::Legendre | Family::Laguerre => {}
            _ => {
                return Err(Error::unsupported(format!(
                    "no exact kernels for {family:?} with derivative orders ({p}, {q})"
                )))
            }
        }
        if p > 1 || p + q > 2 {
            return Err(Error::unsupported(format!(
                "derivative orders (test {p}, trial {q}) exceed the supported total order of 2 \
                 with at most one derivative on the test function"
            )));
        }
        Ok(Self {
            family,
            quadrature,
            size,
            p,
            q,
        })
    }

    /// The irrational factor shared by all entries.
    pub fn factor(&self) -> f64 {
        match self.family {
            Family::Chebyshev => PI / 2.0,
            _ => 1.0,
        }
    }

    pub fn shape(&self) -> KernelShape {
        match (self.p, self.q) {
            (0, 0) => KernelShape::Diagonal,
            (0, _) => KernelShape::Upper,
            _ => KernelShape::Full,
        }
    }

    /// `K(m, n) / factor` for trial index `m` and test index `n`.
    pub fn value(&self, m: usize, n: usize) -> Rational {
        let last = self.size - 1;
        let lobatto = self.quadrature == Quadrature::GaussLobatto;
        let (mi, ni) = (m as i128, n as i128);
        let even = (m + n) % 2 == 0;
        let zero = Rational::zero();

        match (self.family, self.p, self.q) {
            (Family::Chebyshev, 0, 0) => match m == n {
                // Discrete norm of T_{N-1} on Gauss-Lobatto points is π instead of π/2
                true if n == 0 || (lobatto && n == last) => Rational::from(2),
                true => Rational::one(),
                false => zero,
            },
            (Family::Chebyshev, 0, 1) if n < m && !even => Rational::from(2 * mi),
            (Family::Chebyshev, 0, 2) if n < m && even => Rational::from(mi * (mi * mi - ni * ni)),
            (Family::Chebyshev, 1, 1) if even => Rational::from(2 * mi * ni * mi.min(ni)),

            (Family::Legendre, 0, 0) => match m == n {
                true if lobatto && n == last => Rational::new(2, last as i128),
                true => Rational::new(2, 2 * ni + 1),
                false => zero,
            },
            (Family::Legendre, 0, 1) if n < m && !even => Rational::from(2),
            (Family::Legendre, 0, 2) if n < m && even => Rational::from(mi * (mi + 1) - ni * (ni + 1)),
            (Family::Legendre, 1, 1) if even => {
                let k = mi.min(ni);
                Rational::from(k * (k + 1))
            }

            (Family::Laguerre, 0, 0) if m == n => Rational::one(),
            (Family::Laguerre, 0, 1) if n < m => -Rational::one(),
            (Family::Laguerre, 0, 1) if n == m => Rational::new(-1, 2),
            (Family::Laguerre, 0, 2) if n < m => Rational::from(mi - ni),
            (Family::Laguerre, 0, 2) if n == m => Rational::new(1, 4),
            (Family::Laguerre, 1, 1) if n == m => Rational::from(mi) + Rational::new(1, 4),
            (Family::Laguerre, 1, 1) => Rational::from(mi.min(ni)) + Rational::new(1, 2),

            // A derivative on the test side only is the transpose of (0, 1)
            (_, 1, 0) => Self { p: 0, q: 1, ..*self }.value(n, m),
            _ => zero,
        }
    }

    /// A separable form `Σ_r c_r f_r(m) g_r(n)` of the kernel, valid for all `n < m`.
    pub fn separable_upper(&self) -> Option<Vec<SeparableTerm>> {
        let half = Rational::new(1, 2);
        let terms = match (self.family, self.p, self.q) {
            // 2m [n + m odd] = m (1 - (-1)^m (-1)^n)
            (Family::Chebyshev, 0, 1) => vec![
                term(Rational::one(), linear, one),
                term(-Rational::one(), linear_alternating, alternating),
            ],
            // m (m^2 - n^2) [n + m even] = (m^3 - m n^2) (1 + (-1)^m (-1)^n) / 2
            (Family::Chebyshev, 0, 2) => vec![
                term(half, cube, one),
                term(half, cube_alternating, alternating),
                term(-half, linear, square),
                term(-half, linear_alternating, square_alternating),
            ],
            (Family::Legendre, 0, 1) => vec![
                term(Rational::one(), one, one),
                term(-Rational::one(), alternating, alternating),
            ],
            (Family::Legendre, 0, 2) => vec![
                term(half, pronic, one),
                term(half, pronic_alternating, alternating),
                term(-half, one, pronic),
                term(-half, alternating, pronic_alternating),
            ],
            (Family::Laguerre, 0, 1) => vec![term(-Rational::one(), one, one)],
            (Family::Laguerre, 0, 2) => vec![term(Rational::one(), linear, one), term(-Rational::one(), one, linear)],
            _ => return None,
        };
        Some(terms)
    }
}
