//! Pure Neumann problems, whose solutions are only unique up to a constant.
//!
//! The problems are:
//!   nabla^2 u = f  on [-1, 1] x [0, 2π),
//!   du/dx = g      at x = ±1,
//! with homogeneous and inhomogeneous values `g`.
use crate::max_error;
use galerkin::array::{Array, Function};
use galerkin::basis::{Basis, BoundaryCondition, Family};
use galerkin::error::Error;
use galerkin::form::{div, grad, inner, inner_array, TestFunction, TrialFunction};
use galerkin::solvers::{Helmholtz, SolverGeneric1ND};
use galerkin::space::TensorProductSpace;
use std::f64::consts::PI;

fn u_exact(p: &[f64]) -> f64 {
    (PI * p[0]).cos() * (1.0 + p[1].sin())
}

fn f(p: &[f64]) -> f64 {
    let (x, y) = (p[0], p[1]);
    -PI * PI * (PI * x).cos() * (1.0 + y.sin()) - (PI * x).cos() * y.sin()
}

#[test]
fn neumann_problem_needs_a_constraint() -> eyre::Result<()> {
    let x = Basis::builder(32, Family::Chebyshev)
        .with_bc(BoundaryCondition::neumann(0.0, 0.0))
        .build()?;
    let space = TensorProductSpace::serial(vec![x, Basis::fourier(16)?])?;
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);
    let solver = Helmholtz::new(inner(&v, div(grad(&u)))?)?;
    let rhs = inner_array(&v, &Array::from_fn(&space, f))?;

    let mut u_hat = Function::zeros(&space);
    let result = solver.solve(&rhs, &mut u_hat, &[]);
    assert!(matches!(result, Err(Error::SingularSystem(_))));

    // The mean of u with respect to the Chebyshev weight fixes the constant
    let mean = Array::from_fn(&space, u_exact).integrate()? / (2.0 * PI * PI);
    solver.solve(&rhs, &mut u_hat, &[(0, mean)])?;
    let error = max_error(&u_hat.backward()?, u_exact);
    assert!(error < 1e-8, "error {error:e}");
    Ok(())
}

#[test]
fn legendre_neumann_problem_with_the_generic_solver() -> eyre::Result<()> {
    let x = Basis::builder(32, Family::Legendre)
        .with_bc(BoundaryCondition::neumann(0.0, 0.0))
        .build()?;
    let space = TensorProductSpace::serial(vec![x, Basis::fourier(16)?])?;
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);
    let solver = SolverGeneric1ND::new(inner(&v, div(grad(&u)))?)?;
    let rhs = inner_array(&v, &Array::from_fn(&space, f))?;

    let mut u_hat = Function::zeros(&space);
    assert!(matches!(solver.solve(&rhs, &mut u_hat, &[]), Err(Error::SingularSystem(_))));

    // The first function is the constant, so its coefficient is the mean
    let mean = Array::from_fn(&space, u_exact).forward()?.data()[[0, 0]].re;
    solver.solve(&rhs, &mut u_hat, &[(0, mean)])?;
    let error = max_error(&u_hat.backward()?, u_exact);
    assert!(error < 1e-8, "error {error:e}");
    Ok(())
}

#[test]
fn inhomogeneous_neumann_values() -> eyre::Result<()> {
    // u' = 1 + 2x - π sin(πx) sin(y), so u'(-1) = -1 and u'(1) = 3
    let u_exact = |p: &[f64]| p[0] + p[0] * p[0] + (PI * p[0]).cos() * p[1].sin();
    let f = |p: &[f64]| 2.0 - (PI * PI + 1.0) * (PI * p[0]).cos() * p[1].sin();

    let x = Basis::builder(32, Family::Chebyshev)
        .with_bc(BoundaryCondition::neumann(-1.0, 3.0))
        .build()?;
    let space = TensorProductSpace::serial(vec![x, Basis::fourier(16)?])?;
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);
    let solver = Helmholtz::new(inner(&v, div(grad(&u)))?)?;
    let rhs = inner_array(&v, &Array::from_fn(&space, f))?;

    let mut u_hat = Function::zeros(&space);
    let mean = Array::from_fn(&space, u_exact).forward()?.data()[[0, 0]].re;
    solver.solve(&rhs, &mut u_hat, &[(0, mean)])?;
    let error = max_error(&u_hat.backward()?, u_exact);
    assert!(error < 1e-8, "error {error:e}");
    Ok(())
}
