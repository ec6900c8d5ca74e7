//! Spectral-Galerkin discretizations on tensor-product domains.
//!
//! Spaces are built from one-dimensional [`Basis`](basis::Basis) objects, weak forms from
//! [`TrialFunction`](form::TrialFunction) and [`TestFunction`](form::TestFunction) handles, and
//! [`inner`](form::inner) assembles them into per-axis coupling matrices with exact structure.
//! The [`solvers`] exploit that structure lane by lane.
pub mod array;
pub mod assembly;
pub mod basis;
pub mod comm;
pub mod config;
pub mod error;
pub mod form;
pub mod lifting;
pub mod matrix;
pub mod solvers;
pub mod space;

pub(crate) mod transform;

pub use transform::Direction;

pub extern crate nalgebra;
pub extern crate ndarray;

pub mod quadrature {
    pub use galerkin_quadrature::*;
}
