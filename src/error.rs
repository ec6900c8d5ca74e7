//! Error types.
use thiserror::Error;

/// The error type for all fallible operations in this crate.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum Error {
    /// An invalid combination of family, boundary condition, size or layout.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An array, matrix or right-hand side does not have the expected shape.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    Shape { expected: Vec<usize>, actual: Vec<usize> },
    /// A solvability-constrained system was solved without the constraint that makes it unique.
    #[error("singular system: {0}")]
    SingularSystem(String),
    /// No closed-form matrix is available for the requested operator.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// A factorization broke down, e.g. on an exactly zero pivot.
    #[error("numerical failure: {0}")]
    Numerical(String),
    /// Ranks exchanged inconsistent data, or the transport failed.
    #[error("communication failure: {0}")]
    Communication(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperator(msg.into())
    }

    pub(crate) fn shape(expected: &[usize], actual: &[usize]) -> Self {
        Self::Shape {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

impl From<galerkin_quadrature::Error> for Error {
    fn from(err: galerkin_quadrature::Error) -> Self {
        match err {
            galerkin_quadrature::Error::NoConvergence { .. } => Self::Numerical(err.to_string()),
            _ => Self::Configuration(err.to_string()),
        }
    }
}
