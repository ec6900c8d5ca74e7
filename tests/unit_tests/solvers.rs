use crate::run_on_ranks;
use galerkin::array::{Array, Function};
use galerkin::basis::{Basis, BoundaryCondition, Dtype, Family};
use galerkin::error::Error;
use galerkin::form::{div, grad, inner, inner_array, inner_array_into, Dx, Expr, TestFunction, TrialFunction};
use galerkin::solvers::{Helmholtz, SolverGeneric1ND};
use galerkin::space::{DecompositionKind, TensorProductSpace};
use std::sync::Arc;

fn chebyshev_dirichlet(n: usize) -> Basis {
    Basis::builder(n, Family::Chebyshev)
        .with_bc(BoundaryCondition::dirichlet(0.0, 0.0))
        .build()
        .unwrap()
}

fn max_error(computed: &Array, expected: &Array) -> f64 {
    (computed.data() - expected.data())
        .iter()
        .fold(0.0, |m: f64, e| m.max(e.abs()))
}

#[test]
fn helmholtz_falls_back_to_the_generic_solver() {
    let space = TensorProductSpace::serial(vec![chebyshev_dirichlet(32)]).unwrap();
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);
    let operator = || div(grad(&u)) + Dx(&u, 0, 1) + Expr::from(&u);

    let helmholtz = Helmholtz::new(inner(&v, operator()).unwrap()).unwrap();
    assert!(helmholtz.is_generic());
    assert_eq!(helmholtz.axis(), 0);

    // u'' + u' + u = f for u = (1 - x^2) e^x
    let exact = Array::from_fn(&space, |x| (1.0 - x[0] * x[0]) * x[0].exp());
    let f = Array::from_fn(&space, |x| (1.0 - 6.0 * x[0] - 3.0 * x[0] * x[0]) * x[0].exp());
    let rhs = inner_array(&v, &f).unwrap();

    let mut solution = Function::zeros(&space);
    helmholtz.solve(&rhs, &mut solution, &[]).unwrap();
    let error = max_error(&solution.backward().unwrap(), &exact);
    assert!(error < 1e-10, "error {error:e}");

    let generic = SolverGeneric1ND::new(inner(&v, operator()).unwrap()).unwrap();
    let mut other = Function::zeros(&space);
    generic.solve(&rhs, &mut other, &[]).unwrap();
    let difference = (other.data() - solution.data())
        .iter()
        .fold(0.0f64, |m, z| m.max(z.norm()));
    assert!(difference < 1e-12);
}

#[test]
fn lane_factorizations_are_cached() {
    let y = Basis::builder(8, Family::Fourier)
        .with_dtype(Dtype::Complex)
        .build()
        .unwrap();
    let space = TensorProductSpace::serial(vec![chebyshev_dirichlet(16), y]).unwrap();
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);
    let solver = SolverGeneric1ND::new(inner(&v, div(grad(&u))).unwrap()).unwrap();
    assert_eq!(solver.axis(), 0);
    assert_eq!(solver.num_factorizations(), 0);

    let rhs = inner_array(&v, &Array::from_fn(&space, |x| x[0] * x[1].cos())).unwrap();
    let mut solution = Function::zeros(&space);
    solver.solve(&rhs, &mut solution, &[]).unwrap();
    assert_eq!(solver.num_factorizations(), 8);
    solver.solve(&rhs, &mut solution, &[]).unwrap();
    assert_eq!(solver.num_factorizations(), 8);
    // Pinning a coefficient changes the matrix of the zero lane only
    solver.solve(&rhs, &mut solution, &[(0, 1.0)]).unwrap();
    assert_eq!(solver.num_factorizations(), 9);
    assert_eq!(solution.data()[[0, 0]].re, 1.0);
}

#[test]
fn solvers_check_their_terms() {
    let space = TensorProductSpace::serial(vec![chebyshev_dirichlet(8), chebyshev_dirichlet(8)]).unwrap();
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);
    let terms = inner(&v, div(grad(&u))).unwrap();
    assert!(matches!(SolverGeneric1ND::new(terms), Err(Error::Configuration(_))));
    assert!(matches!(SolverGeneric1ND::new(Vec::new()), Err(Error::Configuration(_))));
}

#[test]
fn solve_checks_constraints_and_spaces() {
    let space = TensorProductSpace::serial(vec![chebyshev_dirichlet(12), Basis::fourier(8).unwrap()]).unwrap();
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);
    let solver = Helmholtz::new(inner(&v, div(grad(&u))).unwrap()).unwrap();
    assert!(!solver.is_generic());

    let rhs = Function::zeros(&space);
    let mut solution = Function::zeros(&space);
    let result = solver.solve(&rhs, &mut solution, &[(10, 0.0)]);
    assert!(matches!(result, Err(Error::Configuration(_))));

    let other = TensorProductSpace::serial(vec![chebyshev_dirichlet(10), Basis::fourier(8).unwrap()]).unwrap();
    let rhs = Function::zeros(&other);
    let mut solution = Function::zeros(&other);
    match solver.solve(&rhs, &mut solution, &[]) {
        Err(Error::Shape { expected, actual }) => {
            assert_eq!(expected, vec![12, 5]);
            assert_eq!(actual, vec![10, 5]);
        }
        other => panic!("expected a shape error, got {other:?}"),
    }

    let three = TensorProductSpace::serial(vec![
        chebyshev_dirichlet(12),
        Basis::builder(4, Family::Fourier).with_dtype(Dtype::Complex).build().unwrap(),
        Basis::fourier(8).unwrap(),
    ])
    .unwrap();
    let rhs = Function::zeros(&three);
    let mut solution = Function::zeros(&three);
    assert!(matches!(solver.solve(&rhs, &mut solution, &[]), Err(Error::Shape { .. })));

    // Same sizes, different boundary conditions
    let neumann = Basis::builder(12, Family::Chebyshev)
        .with_bc(BoundaryCondition::neumann(0.0, 0.0))
        .build()
        .unwrap();
    let other = TensorProductSpace::serial(vec![neumann, Basis::fourier(8).unwrap()]).unwrap();
    let rhs = Function::zeros(&other);
    let mut solution = Function::zeros(&other);
    assert!(matches!(solver.solve(&rhs, &mut solution, &[]), Err(Error::Configuration(_))));
}

#[test]
fn failed_solves_leave_the_solution_untouched() {
    let x = Basis::builder(12, Family::Chebyshev)
        .with_bc(BoundaryCondition::neumann(0.0, 0.0))
        .build()
        .unwrap();
    let space = TensorProductSpace::serial(vec![x, Basis::fourier(8).unwrap()]).unwrap();
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);
    // 4u + ∇²u annihilates the constant in x on the lane with wavenumber 2
    let solver = SolverGeneric1ND::new(inner(&v, 4.0 * Expr::from(&u) + div(grad(&u))).unwrap()).unwrap();
    let rhs = inner_array(&v, &Array::from_fn(&space, |x| x[0] + (2.0 * x[1]).cos())).unwrap();

    let mut solution = Function::zeros(&space);
    solution.data_mut().fill(num::complex::Complex64::new(7.0, -1.0));
    let before = solution.data().clone();
    let result = solver.solve(&rhs, &mut solution, &[]);
    assert!(matches!(result, Err(Error::SingularSystem(_))));
    assert_eq!(solution.data(), &before);
}

#[test]
fn solver_axis_must_be_local_in_spectral_space() {
    run_on_ranks(2, |comm| {
        let y = Basis::builder(8, Family::Fourier)
            .with_dtype(Dtype::Complex)
            .build()
            .unwrap();
        let bases = vec![chebyshev_dirichlet(12), y];
        // Spectral data is complete along axis 1 only
        let space = TensorProductSpace::with_axes(comm, bases, vec![1, 0], DecompositionKind::Slab).unwrap();
        let u = TrialFunction::new(&space);
        let v = TestFunction::new(&space);
        let solver = Helmholtz::new(inner(&v, div(grad(&u))).unwrap()).unwrap();
        let rhs = Function::zeros(&space);
        let mut solution = Function::zeros(&space);
        let result = solver.solve(&rhs, &mut solution, &[]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    });
}

#[test]
fn solvers_are_shared_between_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Arc<Helmholtz>>();
    assert_send_sync::<SolverGeneric1ND>();
}

#[test]
fn right_hand_sides_reuse_their_output() {
    let space = TensorProductSpace::serial(vec![chebyshev_dirichlet(12), Basis::fourier(8).unwrap()]).unwrap();
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);
    let solver = Helmholtz::new(inner(&v, div(grad(&u))).unwrap()).unwrap();

    let mut rhs = Function::zeros(&space);
    let mut solution = Function::zeros(&space);
    for n in 1..=3 {
        let f = Array::from_fn(&space, |x| (n as f64 * x[0]).sin() * x[1].cos());
        inner_array_into(2.0 * Expr::from(&v), &f, &mut rhs).unwrap();
        let expected = inner_array(&v, &f).unwrap();
        let difference = (rhs.data() - &(expected.data() * num::complex::Complex64::new(2.0, 0.0)))
            .iter()
            .fold(0.0f64, |m, z| m.max(z.norm()));
        assert!(difference < 1e-14);
        solver.solve(&rhs, &mut solution, &[]).unwrap();
    }

    let other = TensorProductSpace::serial(vec![chebyshev_dirichlet(10), Basis::fourier(8).unwrap()]).unwrap();
    let mut wrong = Function::zeros(&other);
    let f = Array::zeros(&space);
    assert!(matches!(inner_array_into(&v, &f, &mut wrong), Err(Error::Shape { .. })));
    assert!(matches!(
        inner_array_into(Dx(&v, 0, 1), &f, &mut rhs),
        Err(Error::UnsupportedOperator(_))
    ));
}
