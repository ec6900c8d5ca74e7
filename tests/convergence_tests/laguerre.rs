//! A Poisson problem on a semi-infinite strip, in weak form.
//!
//! The problem is:
//!   (grad u, grad v) = -(f, v)  on [0, ∞) x [0, 2π),   u(0, y) = 0,
//! where f = nabla^2 u. The exact solution lies in the span of the Laguerre basis.
use crate::max_error;
use galerkin::array::{Array, Function};
use galerkin::basis::{Basis, BoundaryCondition, BoundaryValue, Family};
use galerkin::form::{grad, inner, inner_array, TestFunction, TrialFunction};
use galerkin::solvers::Helmholtz;
use galerkin::space::TensorProductSpace;

fn u_exact(p: &[f64]) -> f64 {
    let (x, y) = (p[0], p[1]);
    x * (-0.5 * x).exp() * (1.0 + y.cos())
}

fn minus_f(p: &[f64]) -> f64 {
    let (x, y) = (p[0], p[1]);
    let decay = (-0.5 * x).exp();
    -(decay * (0.25 * x - 1.0) * (1.0 + y.cos()) - x * decay * y.cos())
}

#[test]
fn laguerre_fourier_poisson() -> eyre::Result<()> {
    let x = Basis::builder(24, Family::Laguerre)
        .with_bc(BoundaryCondition::new(BoundaryValue::Dirichlet(0.0), BoundaryValue::None))
        .build()?;
    let space = TensorProductSpace::serial(vec![x, Basis::fourier(8)?])?;
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);

    let solver = Helmholtz::new(inner(grad(&v), grad(&u))?)?;
    assert!(!solver.is_generic());
    let rhs = inner_array(&v, &Array::from_fn(&space, minus_f))?;
    let mut u_hat = Function::zeros(&space);
    solver.solve(&rhs, &mut u_hat, &[])?;

    let error = max_error(&u_hat.backward()?, u_exact);
    assert!(error < 1e-10, "error {error:e}");
    Ok(())
}
