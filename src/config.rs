//! Serializable descriptions of bases and spaces.
use crate::basis::{Basis, BoundaryCondition, Dtype, Family, Quadrature};
use crate::comm::Communicator;
use crate::error::Result;
use crate::space::{DecompositionKind, TensorProductSpace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A basis, as it appears in configuration files.
///
/// All fields except `family` and `size` are optional and take the defaults of
/// [`BasisBuilder`](crate::basis::BasisBuilder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisConfig {
    pub family: Family,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<(f64, f64)>,
    #[serde(default)]
    pub bc: BoundaryCondition,
    #[serde(default)]
    pub quadrature: Quadrature,
    #[serde(default)]
    pub dtype: Dtype,
    /// Padding factor of a Fourier basis, e.g. `1.5` for the 3/2-rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,
}

impl BasisConfig {
    pub fn new(family: Family, size: usize) -> Self {
        Self {
            family,
            size,
            domain: None,
            bc: BoundaryCondition::none(),
            quadrature: Quadrature::default(),
            dtype: Dtype::default(),
            padding: None,
        }
    }

    pub fn build(&self) -> Result<Basis> {
        let mut builder = Basis::builder(self.size, self.family)
            .with_bc(self.bc)
            .with_quadrature(self.quadrature)
            .with_dtype(self.dtype);
        if let Some((a, b)) = self.domain {
            builder = builder.with_domain(a, b);
        }
        if let Some(factor) = self.padding {
            builder = builder.with_padding(factor);
        }
        builder.build()
    }
}

impl From<&Basis> for BasisConfig {
    fn from(basis: &Basis) -> Self {
        Self {
            family: basis.family(),
            size: basis.size(),
            // The semi-infinite Laguerre domain is implied
            domain: (basis.family() != Family::Laguerre).then(|| basis.domain()),
            bc: *basis.boundary_condition(),
            quadrature: basis.quadrature(),
            dtype: basis.dtype(),
            padding: (basis.padding_factor() != 1.0).then(|| basis.padding_factor()),
        }
    }
}

/// A tensor-product space, as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceConfig {
    pub bases: Vec<BasisConfig>,
    /// Transform order, defaults to the natural order of the axes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<Vec<usize>>,
    #[serde(default)]
    pub decomposition: DecompositionKind,
}

impl SpaceConfig {
    pub fn new(bases: Vec<BasisConfig>) -> Self {
        Self {
            bases,
            axes: None,
            decomposition: DecompositionKind::default(),
        }
    }

    pub fn build(&self, comm: Arc<dyn Communicator>) -> Result<Arc<TensorProductSpace>> {
        let bases = self.bases.iter().map(BasisConfig::build).collect::<Result<Vec<_>>>()?;
        let axes = self.axes.clone().unwrap_or_else(|| (0..bases.len()).collect());
        TensorProductSpace::with_axes(comm, bases, axes, self.decomposition)
    }
}

impl From<&TensorProductSpace> for SpaceConfig {
    fn from(space: &TensorProductSpace) -> Self {
        Self {
            bases: space.bases().iter().map(BasisConfig::from).collect(),
            axes: Some(space.axes().to_vec()),
            decomposition: space.decomposition(),
        }
    }
}
