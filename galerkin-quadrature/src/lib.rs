//! Quadrature rules for the reference intervals used by spectral bases.
//!
//! The main purpose of this crate is to support the `galerkin` spectral library. However, the
//! rules available here may be used completely independently of `galerkin`.
//!
//! All rules are returned with their points sorted in ascending order. Rules for
//! `[-1, 1]` are provided for the Legendre and Chebyshev weights (Gauss and Gauss-Lobatto
//! variants) and for the Jacobi weight `(1 - x)^α (1 + x)^β`. Rules for `[0, ∞)` are
//! provided for the Laguerre weight `exp(-x)`.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod special;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable,
    /// Newton's method did not converge while computing the nodes of a rule.
    NoConvergence { num_points: usize },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(
                    f,
                    "There is no quadrature rule satisfying the requirements available"
                )
            }
            Self::NoConvergence { num_points } => {
                write!(f, "Node computation did not converge for a {num_points}-point rule")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A one-dimensional rule, stored as `(weights, points)`.
pub type Rule = (Vec<f64>, Vec<f64>);

/// Approximates the integral of `f` with the given rule.
pub fn integrate(rule: &Rule, f: impl Fn(f64) -> f64) -> f64 {
    let (weights, points) = rule;
    weights
        .iter()
        .zip(points)
        .map(|(w, x)| w * f(*x))
        .sum()
}
