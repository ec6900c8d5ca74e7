//! Single-axis spectral bases.
//!
//! A [`Basis`] is an immutable value object: it owns its quadrature rule, the expansion of its
//! degrees of freedom in terms of orthogonal functions and all tables derived from them.
//! Bases with boundary conditions are *composite*: their first `N - nbc` functions satisfy the
//! homogeneous conditions, and the last `nbc` functions are boundary (lifting) functions whose
//! coefficients are the boundary values.
use crate::error::{Error, Result};
use galerkin_quadrature::univariate::{
    gauss_chebyshev, gauss_jacobi, gauss_laguerre, gauss_legendre, gauss_lobatto_chebyshev, gauss_lobatto_legendre,
};
use log::debug;
use nalgebra::DMatrix;
use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

mod recurrence;
pub(crate) mod stencil;

pub(crate) use recurrence::orthogonal_derivatives;
use stencil::{to_f64, Functional, Stencil};

/// The family of orthogonal functions a basis is built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Family {
    /// Complex exponentials `exp(i k x)` on a periodic interval.
    Fourier,
    /// Chebyshev polynomials of the first kind, weight `(1 - x^2)^(-1/2)`.
    Chebyshev,
    /// Legendre polynomials, unit weight.
    Legendre,
    /// Laguerre functions `L_k(x) exp(-x/2)` on `[0, ∞)`.
    Laguerre,
    /// Jacobi polynomials with weight `(1 - x)^α (1 + x)^β`.
    Jacobi { alpha: f64, beta: f64 },
}

impl Family {
    pub fn is_periodic(&self) -> bool {
        matches!(self, Family::Fourier)
    }
}

/// Which Gauss rule provides the quadrature points of a polynomial basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Quadrature {
    #[default]
    Gauss,
    GaussLobatto,
}

/// Whether physical data along a Fourier axis is real (real-to-complex transform, `N/2 + 1`
/// modes) or complex (complex-to-complex transform, `N` modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dtype {
    #[default]
    Real,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// The condition imposed at one end of the domain.
///
/// Neumann values are derivatives with respect to the physical coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum BoundaryValue {
    #[default]
    None,
    Dirichlet(f64),
    Neumann(f64),
}

impl BoundaryValue {
    pub fn is_none(&self) -> bool {
        matches!(self, BoundaryValue::None)
    }

    pub fn value(&self) -> f64 {
        match *self {
            BoundaryValue::None => 0.0,
            BoundaryValue::Dirichlet(v) | BoundaryValue::Neumann(v) => v,
        }
    }
}

/// Boundary conditions at both ends of a non-periodic domain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundaryCondition {
    pub left: BoundaryValue,
    pub right: BoundaryValue,
}

impl BoundaryCondition {
    pub fn new(left: BoundaryValue, right: BoundaryValue) -> Self {
        Self { left, right }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn dirichlet(left: f64, right: f64) -> Self {
        Self::new(BoundaryValue::Dirichlet(left), BoundaryValue::Dirichlet(right))
    }

    pub fn neumann(left: f64, right: f64) -> Self {
        Self::new(BoundaryValue::Neumann(left), BoundaryValue::Neumann(right))
    }

    /// The number of imposed conditions.
    pub fn count(&self) -> usize {
        [self.left, self.right].iter().filter(|v| !v.is_none()).count()
    }

    /// Returns `true` if all imposed values are zero.
    pub fn is_homogeneous(&self) -> bool {
        self.left.value() == 0.0 && self.right.value() == 0.0
    }

    /// The imposed values, left before right.
    fn imposed(&self) -> impl Iterator<Item = (Side, BoundaryValue)> {
        [(Side::Left, self.left), (Side::Right, self.right)]
            .into_iter()
            .filter(|(_, v)| !v.is_none())
    }

    fn functionals(&self) -> Vec<Functional> {
        self.imposed()
            .filter_map(|(side, value)| Functional::from_value(side, &value))
            .collect()
    }

    /// The same kinds of conditions with all values set to zero.
    pub fn homogeneous(&self) -> Self {
        let zero = |v: BoundaryValue| match v {
            BoundaryValue::None => BoundaryValue::None,
            BoundaryValue::Dirichlet(_) => BoundaryValue::Dirichlet(0.0),
            BoundaryValue::Neumann(_) => BoundaryValue::Neumann(0.0),
        };
        Self::new(zero(self.left), zero(self.right))
    }
}

/// Hashable identity of everything that determines the matrices of a basis.
///
/// Boundary *values* are not part of the key since they only enter right-hand sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BasisKey {
    family: (u8, u64, u64),
    size: usize,
    quadrature: Quadrature,
    dtype: Dtype,
    conditions: [u8; 2],
    domain: (u64, u64),
}

/// A single-axis spectral basis.
#[derive(Debug, Clone)]
pub struct Basis {
    family: Family,
    size: usize,
    domain: (f64, f64),
    bc: BoundaryCondition,
    quadrature: Quadrature,
    dtype: Dtype,
    padding: f64,
    reference_points: Vec<f64>,
    weights: Vec<f64>,
    stencil: Stencil,
}

impl Basis {
    pub fn builder(size: usize, family: Family) -> BasisBuilder {
        BasisBuilder::new(size, family)
    }

    pub fn fourier(size: usize) -> Result<Self> {
        Self::builder(size, Family::Fourier).build()
    }

    pub fn chebyshev(size: usize) -> Result<Self> {
        Self::builder(size, Family::Chebyshev).build()
    }

    pub fn legendre(size: usize) -> Result<Self> {
        Self::builder(size, Family::Legendre).build()
    }

    pub fn laguerre(size: usize) -> Result<Self> {
        Self::builder(size, Family::Laguerre).build()
    }

    pub fn jacobi(size: usize, alpha: f64, beta: f64) -> Result<Self> {
        Self::builder(size, Family::Jacobi { alpha, beta }).build()
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// The number of modes `N`, which is also the number of quadrature points unless the basis
    /// is padded.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The number of points of the physical grid.
    ///
    /// Padded Fourier bases evaluate their `N` modes on `floor(N * padding)` points.
    pub fn num_points(&self) -> usize {
        self.reference_points.len()
    }

    pub fn padding_factor(&self) -> f64 {
        self.padding
    }

    /// A copy of this basis whose physical grid is padded by `factor`, e.g. `1.5` for the
    /// 3/2-rule.
    ///
    /// Only Fourier bases can be padded. A factor of one returns an unpadded copy.
    pub fn padded(&self, factor: f64) -> Result<Basis> {
        BasisBuilder {
            family: self.family,
            size: self.size,
            domain: Some(self.domain),
            bc: self.bc,
            quadrature: self.quadrature,
            dtype: self.dtype,
            padding: factor,
        }
        .build()
    }

    /// The number of spectral degrees of freedom, i.e. the spectral extent of this axis.
    pub fn num_dofs(&self) -> usize {
        if self.is_r2c() {
            self.size / 2 + 1
        } else {
            self.size
        }
    }

    /// The number of functions satisfying the homogeneous boundary conditions.
    pub fn num_homogeneous(&self) -> usize {
        self.num_dofs() - self.num_boundary_dofs()
    }

    pub fn num_boundary_dofs(&self) -> usize {
        self.bc.count()
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn boundary_condition(&self) -> &BoundaryCondition {
        &self.bc
    }

    pub fn quadrature(&self) -> Quadrature {
        self.quadrature
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn is_periodic(&self) -> bool {
        self.family.is_periodic()
    }

    /// Returns `true` for a Fourier basis on real data.
    pub fn is_r2c(&self) -> bool {
        self.is_periodic() && self.dtype == Dtype::Real
    }

    /// Returns `true` if the basis has boundary functions.
    pub fn is_composite(&self) -> bool {
        self.num_boundary_dofs() > 0
    }

    /// Returns `true` if the constant function is the first basis function, with coefficient
    /// equal to the constant.
    pub fn represents_constants(&self) -> bool {
        matches!(self.family, Family::Fourier | Family::Chebyshev | Family::Legendre) && !self.is_composite()
    }

    /// Quadrature points in the reference domain.
    pub fn reference_points(&self) -> &[f64] {
        &self.reference_points
    }

    /// Quadrature weights of the reference-domain inner product.
    ///
    /// For Laguerre bases these are the weights for products of Laguerre functions.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weights that integrate values at the quadrature points over the physical domain, without
    /// the weight function of the family.
    ///
    /// Chebyshev weights integrate the interpolating polynomial exactly. Jacobi bases only
    /// support the unit weight `α = β = 0`.
    pub fn integration_weights(&self) -> Result<Vec<f64>> {
        let (a, b) = self.domain;
        match self.family {
            Family::Fourier => Ok(self.weights.iter().map(|w| w * (b - a) / (2.0 * PI)).collect()),
            Family::Laguerre => Ok(self.weights.clone()),
            Family::Legendre => Ok(self.weights.iter().map(|w| w * (b - a) / 2.0).collect()),
            Family::Jacobi { alpha, beta } if alpha == 0.0 && beta == 0.0 => {
                Ok(self.weights.iter().map(|w| w * (b - a) / 2.0).collect())
            }
            Family::Jacobi { .. } => Err(Error::unsupported(
                "unweighted integration with a non-trivial Jacobi weight",
            )),
            Family::Chebyshev => {
                let n = self.size;
                let lobatto = self.quadrature == Quadrature::GaussLobatto;
                let weights = self
                    .reference_points
                    .iter()
                    .zip(&self.weights)
                    .map(|(&x, &w)| {
                        let theta = x.clamp(-1.0, 1.0).acos();
                        // Sum of (∫ T_k) T_k(x) / ||T_k||^2 over even k
                        let sum: f64 = (0..n)
                            .step_by(2)
                            .map(|k| {
                                let norm = if k == 0 || (lobatto && k == n - 1) { PI } else { PI / 2.0 };
                                let integral = 2.0 / (1.0 - (k * k) as f64);
                                integral * (k as f64 * theta).cos() / norm
                            })
                            .sum();
                        w * sum * (b - a) / 2.0
                    })
                    .collect();
                Ok(weights)
            }
        }
    }

    /// Quadrature points mapped to the physical domain.
    pub fn points(&self) -> Vec<f64> {
        self.reference_points
            .iter()
            .map(|&x| self.map_to_physical(x))
            .collect()
    }

    /// `N` equispaced points covering the physical domain.
    ///
    /// For the semi-infinite Laguerre domain the points cover the span of the quadrature
    /// points instead.
    pub fn uniform_points(&self) -> Vec<f64> {
        let n = self.size;
        match self.family {
            Family::Fourier => (0..self.num_points())
                .map(|j| self.domain.0 + j as f64 * (self.domain.1 - self.domain.0) / self.num_points() as f64)
                .collect(),
            Family::Laguerre => {
                let end = self.reference_points.last().copied().unwrap_or(0.0);
                (0..n).map(|j| j as f64 * end / (n - 1).max(1) as f64).collect()
            }
            _ => {
                let (a, b) = self.domain;
                (0..n)
                    .map(|j| a + j as f64 * (b - a) / (n - 1).max(1) as f64)
                    .collect()
            }
        }
    }

    pub fn map_to_physical(&self, x: f64) -> f64 {
        let (a, b) = self.domain;
        match self.family {
            Family::Fourier => a + x * (b - a) / (2.0 * PI),
            Family::Laguerre => x,
            _ => a + (x + 1.0) * (b - a) / 2.0,
        }
    }

    pub fn map_to_reference(&self, x: f64) -> f64 {
        let (a, b) = self.domain;
        match self.family {
            Family::Fourier => 2.0 * PI * (x - a) / (b - a),
            Family::Laguerre => x,
            _ => (2.0 * x - (a + b)) / (b - a),
        }
    }

    /// The factor `dX/dx` every derivative contributes when moving from the reference
    /// coordinate `X` to the physical coordinate `x`.
    pub fn domain_factor(&self) -> f64 {
        let (a, b) = self.domain;
        match self.family {
            Family::Fourier => 2.0 * PI / (b - a),
            Family::Laguerre => 1.0,
            _ => 2.0 / (b - a),
        }
    }

    /// Integer wavenumbers of the spectral degrees of freedom of a Fourier basis.
    ///
    /// Complex-to-complex bases use the FFT ordering `0, 1, ..., -2, -1`. Returns an empty
    /// vector for other families.
    pub fn wavenumbers(&self) -> Vec<f64> {
        if !self.is_periodic() {
            return Vec::new();
        }
        let n = self.size as i64;
        (0..self.num_dofs() as i64)
            .map(|k| if self.is_r2c() || k < n / 2 { k as f64 } else { (k - n) as f64 })
            .collect()
    }

    /// The Nyquist mode of an even-sized Fourier basis.
    pub fn nyquist_index(&self) -> Option<usize> {
        (self.is_periodic() && self.size % 2 == 0).then_some(self.size / 2)
    }

    /// Values of the boundary degrees of freedom, left before right.
    ///
    /// Neumann values are converted to derivatives with respect to the reference coordinate.
    pub fn boundary_values(&self) -> Vec<f64> {
        self.bc
            .imposed()
            .map(|(_, value)| match value {
                BoundaryValue::Neumann(v) => v / self.domain_factor(),
                other => other.value(),
            })
            .collect()
    }

    pub fn key(&self) -> BasisKey {
        let family = match self.family {
            Family::Fourier => (0, 0, 0),
            Family::Chebyshev => (1, 0, 0),
            Family::Legendre => (2, 0, 0),
            Family::Laguerre => (3, 0, 0),
            Family::Jacobi { alpha, beta } => (4, alpha.to_bits(), beta.to_bits()),
        };
        let kind = |v: BoundaryValue| match v {
            BoundaryValue::None => 0,
            BoundaryValue::Dirichlet(_) => 1,
            BoundaryValue::Neumann(_) => 2,
        };
        BasisKey {
            family,
            size: self.size,
            quadrature: self.quadrature,
            dtype: self.dtype,
            conditions: [kind(self.bc.left), kind(self.bc.right)],
            domain: (self.domain.0.to_bits(), self.domain.1.to_bits()),
        }
    }

    pub(crate) fn stencil(&self) -> &Stencil {
        &self.stencil
    }

    /// Evaluates the `derivative`-th derivative of every basis function at the given reference
    /// points.
    ///
    /// Returns a matrix with one row per point and one column per degree of freedom.
    /// Derivatives are with respect to the reference coordinate. Fourier basis functions are
    /// complex valued; use [`evaluate_complex`](Self::evaluate_complex) for them.
    pub fn evaluate(&self, reference_points: &[f64], derivative: usize) -> Result<DMatrix<f64>> {
        if self.is_periodic() {
            return Err(Error::unsupported(
                "Fourier basis functions are complex valued, use evaluate_complex",
            ));
        }
        let ndofs = self.num_dofs();
        let mut result = DMatrix::zeros(reference_points.len(), ndofs);
        for (j, &x) in reference_points.iter().enumerate() {
            let table = orthogonal_derivatives(self.family, self.size, x, derivative);
            let values = &table[derivative];
            for (dof, row) in self.stencil.rows().iter().enumerate() {
                result[(j, dof)] = row.iter().map(|(m, c)| to_f64(c) * values[*m]).sum();
            }
        }
        Ok(result)
    }

    /// Like [`evaluate`](Self::evaluate), for every family.
    ///
    /// Column `k` of a Fourier basis holds `(i k)^d exp(i k X)` for the wavenumber `k` of
    /// spectral index `k`. Real-to-complex bases only hold the non-negative wavenumbers; the
    /// negative ones are the complex conjugates.
    pub fn evaluate_complex(&self, reference_points: &[f64], derivative: usize) -> Result<DMatrix<Complex64>> {
        if !self.is_periodic() {
            return Ok(self
                .evaluate(reference_points, derivative)?
                .map(|x| Complex64::new(x, 0.0)));
        }
        let wavenumbers = self.wavenumbers();
        Ok(DMatrix::from_fn(reference_points.len(), wavenumbers.len(), |j, k| {
            let ik = Complex64::new(0.0, wavenumbers[k]);
            ik.powu(derivative as u32) * (ik * reference_points[j]).exp()
        }))
    }

    /// Basis functions evaluated at the quadrature points.
    pub fn vandermonde(&self) -> Result<DMatrix<f64>> {
        self.evaluate(&self.reference_points, 0)
    }

    /// The discrete norms `Σ_j w_j P_k(x_j)^2` of the orthogonal functions.
    pub(crate) fn discrete_norms(&self) -> Vec<f64> {
        let mut norms = vec![0.0; self.size];
        for (&x, &w) in self.reference_points.iter().zip(&self.weights) {
            let table = orthogonal_derivatives(self.family, self.size, x, 0);
            for (norm, p) in norms.iter_mut().zip(&table[0]) {
                *norm += w * p * p;
            }
        }
        norms
    }
}

/// Builder for [`Basis`].
#[derive(Debug, Clone)]
pub struct BasisBuilder {
    family: Family,
    size: usize,
    domain: Option<(f64, f64)>,
    bc: BoundaryCondition,
    quadrature: Quadrature,
    dtype: Dtype,
    padding: f64,
}

impl BasisBuilder {
    pub fn new(size: usize, family: Family) -> Self {
        Self {
            family,
            size,
            domain: None,
            bc: BoundaryCondition::none(),
            quadrature: Quadrature::Gauss,
            dtype: Dtype::Real,
            padding: 1.0,
        }
    }

    pub fn with_domain(self, a: f64, b: f64) -> Self {
        Self {
            domain: Some((a, b)),
            ..self
        }
    }

    pub fn with_bc(self, bc: BoundaryCondition) -> Self {
        Self { bc, ..self }
    }

    pub fn with_quadrature(self, quadrature: Quadrature) -> Self {
        Self { quadrature, ..self }
    }

    pub fn with_dtype(self, dtype: Dtype) -> Self {
        Self { dtype, ..self }
    }

    /// Pads the physical grid of a Fourier basis by `factor`, e.g. `1.5` for the 3/2-rule.
    pub fn with_padding(self, factor: f64) -> Self {
        Self { padding: factor, ..self }
    }

    pub fn build(self) -> Result<Basis> {
        let Self {
            family,
            size,
            domain,
            bc,
            quadrature,
            dtype,
            padding,
        } = self;

        let default_domain = match family {
            Family::Fourier => (0.0, 2.0 * PI),
            Family::Laguerre => (0.0, f64::INFINITY),
            _ => (-1.0, 1.0),
        };
        let domain = domain.unwrap_or(default_domain);
        let nbc = bc.count();

        match family {
            Family::Fourier if nbc > 0 => {
                return Err(Error::configuration("Fourier bases are periodic and take no boundary conditions"))
            }
            Family::Laguerre if !bc.right.is_none() => {
                return Err(Error::configuration("Laguerre bases only take a condition on the left"))
            }
            Family::Laguerre if domain != default_domain => {
                return Err(Error::configuration("Laguerre bases are defined on [0, ∞) only"))
            }
            Family::Jacobi { .. } if nbc > 0 => {
                return Err(Error::configuration("boundary conditions are not supported for Jacobi bases"))
            }
            Family::Jacobi { alpha, beta } if alpha <= -1.0 || beta <= -1.0 => {
                return Err(Error::configuration("Jacobi exponents must be greater than -1"))
            }
            _ => {}
        }
        if quadrature == Quadrature::GaussLobatto && !matches!(family, Family::Chebyshev | Family::Legendre) {
            return Err(Error::configuration(format!(
                "Gauss-Lobatto quadrature is not available for {family:?}"
            )));
        }
        if size < 2 || size < nbc + 1 {
            return Err(Error::configuration(format!(
                "a {family:?} basis with {nbc} boundary conditions needs at least {} points, got {size}",
                (nbc + 1).max(2)
            )));
        }
        if !(domain.0 < domain.1) {
            return Err(Error::configuration(format!("invalid domain {domain:?}")));
        }
        if !(padding >= 1.0) || (padding != 1.0 && family != Family::Fourier) {
            return Err(Error::configuration(format!(
                "padding factor {padding} is not available for {family:?}; only Fourier bases can be padded by at least 1"
            )));
        }

        let (weights, reference_points) = match (family, quadrature) {
            (Family::Fourier, _) => {
                let points = (size as f64 * padding).floor() as usize;
                let h = 2.0 * PI / points as f64;
                (vec![h; points], (0..points).map(|j| j as f64 * h).collect())
            }
            (Family::Chebyshev, Quadrature::Gauss) => gauss_chebyshev(size),
            (Family::Chebyshev, Quadrature::GaussLobatto) => gauss_lobatto_chebyshev(size)?,
            (Family::Legendre, Quadrature::Gauss) => gauss_legendre(size)?,
            (Family::Legendre, Quadrature::GaussLobatto) => gauss_lobatto_legendre(size)?,
            (Family::Laguerre, _) => {
                let rule = gauss_laguerre(size)?;
                (rule.scaled_weights, rule.points)
            }
            (Family::Jacobi { alpha, beta }, _) => gauss_jacobi(size, alpha, beta)?,
        };

        let stencil = if family.is_periodic() {
            Stencil::identity(size)
        } else {
            Stencil::new(family, size, &bc.functionals())?
        };

        debug!(
            "Built {family:?} basis with N = {size}, {nbc} boundary conditions on [{}, {}]",
            domain.0, domain.1
        );
        Ok(Basis {
            family,
            size,
            domain,
            bc,
            quadrature,
            dtype,
            padding,
            reference_points,
            weights,
            stencil,
        })
    }
}
