use galerkin::assembly::{assemble, MatrixCache};
use galerkin::basis::{Basis, BoundaryCondition, BoundaryValue, Dtype, Family, Quadrature};
use galerkin::error::Error;
use galerkin::form::{div, grad, inner, Dx, TestFunction, TrialFunction};
use galerkin::matrix::{diagonal_array, MatrixStructure, SpectralMatrix};
use galerkin::quadrature::univariate::{gauss_chebyshev, gauss_laguerre, gauss_legendre};
use galerkin::space::TensorProductSpace;
use nalgebra::DMatrix;
use num::complex::Complex64;
use std::f64::consts::PI;
use std::sync::Arc;

fn dirichlet(family: Family, n: usize) -> Basis {
    let bc = match family {
        Family::Laguerre => BoundaryCondition::new(BoundaryValue::Dirichlet(0.0), BoundaryValue::None),
        _ => BoundaryCondition::dirichlet(0.0, 0.0),
    };
    Basis::builder(n, family).with_bc(bc).build().unwrap()
}

fn spectral(test: &Basis, trial: &Basis, p: usize, q: usize) -> SpectralMatrix {
    assemble(test, trial, p, q)
        .unwrap()
        .as_spectral()
        .unwrap()
        .clone()
}

/// `(∂^q φ_j, ∂^p ψ_i)` by brute-force quadrature with `weights` and `points` in the reference
/// domain, including the chain-rule factors of the domain mapping.
fn quadrature_matrix(test: &Basis, trial: &Basis, p: usize, q: usize, rule: (Vec<f64>, Vec<f64>)) -> DMatrix<f64> {
    let (weights, points) = rule;
    let test_values = test.evaluate(&points, p).unwrap();
    let trial_values = trial.evaluate(&points, q).unwrap();
    let nrows = test.num_homogeneous();
    let scale = test.domain_factor().powi(p as i32) * trial.domain_factor().powi(q as i32);
    DMatrix::from_fn(nrows, trial.num_dofs(), |i, j| {
        let sum: f64 = (0..points.len())
            .map(|k| weights[k] * test_values[(k, i)] * trial_values[(k, j)])
            .sum();
        sum * scale
    })
}

/// A rule that integrates products of two basis functions exactly.
fn fine_rule(family: Family, n: usize) -> (Vec<f64>, Vec<f64>) {
    match family {
        Family::Chebyshev => gauss_chebyshev(2 * n + 4),
        Family::Legendre => gauss_legendre(2 * n + 4).unwrap(),
        Family::Laguerre => {
            let rule = gauss_laguerre(n + 2).unwrap();
            (rule.scaled_weights, rule.points)
        }
        _ => unreachable!(),
    }
}

fn assert_relative_close(computed: &DMatrix<f64>, expected: &DMatrix<f64>, tol: f64) {
    assert_eq!(computed.shape(), expected.shape());
    let scale = expected.amax().max(1.0);
    let diff = (computed - expected).amax();
    assert!(
        diff <= tol * scale,
        "max abs diff {diff:e} exceeds {:e} (max entry {scale:e})",
        tol * scale
    );
}

fn offsets(matrix: &SpectralMatrix) -> Vec<isize> {
    matrix.diagonals().keys().copied().collect()
}

#[test]
fn mass_matrices_have_exact_diagonal_structure() {
    for n in [8, 16, 32, 64] {
        for family in [Family::Chebyshev, Family::Legendre] {
            let basis = dirichlet(family, n);
            let mass = spectral(&basis, &basis, 0, 0);
            assert_eq!(offsets(&mass), vec![-2, 0, 2], "{family:?}, N = {n}");
            assert_eq!(mass.structure(), MatrixStructure::Banded { lower: 2, upper: 2 });
            assert!(mass.tail().is_none());

            let dense = mass.homogeneous_to_dense();
            for i in 0..dense.nrows() {
                for j in 0..dense.ncols() {
                    let offset = j as isize - i as isize;
                    if ![-2, 0, 2].contains(&offset) {
                        assert_eq!(dense[(i, j)], 0.0, "{family:?}, N = {n}, ({i}, {j})");
                    }
                }
            }
        }
    }
}

#[test]
fn legendre_dirichlet_stiffness_is_diagonal() {
    for n in [8, 16, 32, 64] {
        let basis = dirichlet(Family::Legendre, n);
        for (p, q) in [(0, 2), (1, 1)] {
            let matrix = spectral(&basis, &basis, p, q);
            assert_eq!(matrix.structure(), MatrixStructure::Diagonal, "({p}, {q}), N = {n}");
            let sign = if p == 1 { 1.0 } else { -1.0 };
            // (ψ_k', ψ_k') = 4k + 6 for ψ_k = P_k - P_{k+2}
            for (k, value) in matrix.diagonal(0).unwrap().iter().enumerate() {
                let expected = sign * (4.0 * k as f64 + 6.0);
                assert!((value - expected).abs() <= 1e-12 * expected.abs(), "k = {k}");
            }
        }
    }
}

#[test]
fn chebyshev_dirichlet_second_derivative_is_upper_with_tail() {
    for n in [8, 16, 32, 64] {
        let basis = dirichlet(Family::Chebyshev, n);
        let matrix = spectral(&basis, &basis, 0, 2);
        assert_eq!(matrix.lower_bandwidth(), 0, "N = {n}");
        assert!(matrix.diagonals().keys().all(|offset| offset % 2 == 0));
        if n > 8 {
            assert!(matches!(
                matrix.structure(),
                MatrixStructure::BandedWithTail { lower: 0, .. }
            ));
        }
        // Explicit entries vanish exactly, tail entries up to rounding
        let tail_start = matrix.tail().map_or(usize::MAX, |tail| tail.start());
        let dense = matrix.homogeneous_to_dense();
        let tol = 1e-12 * dense.amax();
        for i in 0..dense.nrows() {
            for j in 0..dense.ncols() {
                if j < i || (j - i < tail_start && (j - i) % 2 == 1) {
                    assert_eq!(dense[(i, j)], 0.0, "N = {n}, ({i}, {j})");
                } else if (j - i) % 2 == 1 {
                    assert!(dense[(i, j)].abs() <= tol, "N = {n}, ({i}, {j})");
                }
            }
        }
    }
}

#[test]
fn laguerre_dirichlet_matrices_are_tridiagonal() {
    for n in [8, 16, 32, 64] {
        let basis = dirichlet(Family::Laguerre, n);
        for (p, q) in [(0, 0), (1, 1)] {
            let matrix = spectral(&basis, &basis, p, q);
            assert_eq!(offsets(&matrix), vec![-1, 0, 1], "({p}, {q}), N = {n}");
            assert!(matrix.tail().is_none());
        }
    }
}

#[test]
fn matrices_match_fine_quadrature() {
    let neumann = |family, n| {
        Basis::builder(n, family)
            .with_bc(BoundaryCondition::neumann(0.0, 0.0))
            .build()
            .unwrap()
    };
    let inhomogeneous = |family, n| {
        Basis::builder(n, family)
            .with_domain(-0.5, 2.0)
            .with_bc(BoundaryCondition::dirichlet(1.0, -1.0))
            .build()
            .unwrap()
    };
    for n in [8, 16, 32] {
        for family in [Family::Chebyshev, Family::Legendre] {
            let bases = [dirichlet(family, n), neumann(family, n), inhomogeneous(family, n)];
            for basis in &bases {
                for (p, q) in [(0, 0), (0, 1), (1, 0), (0, 2), (1, 1)] {
                    let computed = spectral(basis, basis, p, q).to_dense();
                    let expected = quadrature_matrix(basis, basis, p, q, fine_rule(family, n));
                    assert_relative_close(&computed, &expected, 1e-9);
                }
            }
            // Test and trial bases with different boundary conditions
            let computed = spectral(&bases[0], &bases[2], 0, 2).to_dense();
            let expected = quadrature_matrix(&bases[0], &bases[2], 0, 2, fine_rule(family, n));
            assert_relative_close(&computed, &expected, 1e-9);
        }

        let basis = dirichlet(Family::Laguerre, n);
        for (p, q) in [(0, 0), (0, 1), (0, 2), (1, 1)] {
            let computed = spectral(&basis, &basis, p, q).to_dense();
            let expected = quadrature_matrix(&basis, &basis, p, q, fine_rule(Family::Laguerre, n));
            assert_relative_close(&computed, &expected, 1e-9);
        }
    }
}

#[test]
fn gauss_lobatto_mass_uses_the_discrete_norm() {
    let basis = Basis::builder(9, Family::Chebyshev)
        .with_quadrature(Quadrature::GaussLobatto)
        .build()
        .unwrap();
    let mass = spectral(&basis, &basis, 0, 0);
    assert_eq!(mass.structure(), MatrixStructure::Diagonal);
    let diagonal = mass.diagonal(0).unwrap();
    assert!((diagonal[0] - PI).abs() < 1e-14);
    assert!((diagonal[4] - PI / 2.0).abs() < 1e-14);
    assert!((diagonal[8] - PI).abs() < 1e-14);
}

#[test]
fn fourier_matrices_are_diagonal() {
    let basis = Basis::builder(8, Family::Fourier)
        .with_domain(0.0, PI)
        .build()
        .unwrap();
    let matrix = assemble(&basis, &basis, 0, 2).unwrap();
    let diagonal = matrix.as_fourier().unwrap();
    assert_eq!(diagonal.len(), 5);
    for (k, value) in diagonal.iter().enumerate() {
        // Wavenumbers double on a domain of length π
        let expected = -2.0 * PI * (2.0 * k as f64).powi(2);
        assert!((value - Complex64::new(expected, 0.0)).norm() < 1e-12);
    }

    let first = assemble(&basis, &basis, 0, 1).unwrap();
    let first = first.as_fourier().unwrap();
    assert!((first[1] - Complex64::new(0.0, 4.0 * PI)).norm() < 1e-12);
    // No odd derivative of the Nyquist mode
    assert_eq!(first[4], Complex64::new(0.0, 0.0));
}

#[test]
fn jacobi_bases_only_provide_the_mass_matrix() {
    let basis = Basis::jacobi(10, 0.5, -0.5).unwrap();
    let mass = spectral(&basis, &basis, 0, 0);
    assert_eq!(mass.structure(), MatrixStructure::Diagonal);
    assert!(mass.diagonal(0).unwrap().iter().all(|v| *v > 0.0));
    assert!(matches!(assemble(&basis, &basis, 0, 1), Err(Error::UnsupportedOperator(_))));
}

#[test]
fn unsupported_couplings_are_rejected() {
    let basis = dirichlet(Family::Legendre, 8);
    assert!(matches!(assemble(&basis, &basis, 2, 0), Err(Error::UnsupportedOperator(_))));
    assert!(matches!(assemble(&basis, &basis, 0, 3), Err(Error::UnsupportedOperator(_))));
    let other = dirichlet(Family::Chebyshev, 8);
    assert!(matches!(assemble(&basis, &other, 0, 0), Err(Error::UnsupportedOperator(_))));
    let larger = dirichlet(Family::Legendre, 10);
    assert!(matches!(assemble(&basis, &larger, 0, 0), Err(Error::UnsupportedOperator(_))));
}

#[test]
fn cache_returns_shared_matrices() {
    let basis = dirichlet(Family::Chebyshev, 16);
    let cache = MatrixCache::new();
    let first = cache.get_or_assemble(&basis, &basis, 0, 2).unwrap();
    let second = cache.get_or_assemble(&basis, &basis, 0, 2).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    cache.get_or_assemble(&basis, &basis, 0, 0).unwrap();
    assert_eq!(cache.len(), 2);
}

#[test]
fn repeated_inner_products_reuse_matrices() {
    let space = TensorProductSpace::serial(vec![dirichlet(Family::Legendre, 12), Basis::fourier(8).unwrap()]).unwrap();
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);

    let first = inner(&v, Dx(&u, 0, 2) + Dx(&u, 1, 2)).unwrap();
    let cached = space.matrices().len();
    let second = inner(&v, Dx(&u, 0, 2) + Dx(&u, 1, 2)).unwrap();
    assert_eq!(space.matrices().len(), cached);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.scale(), b.scale());
        for (x, y) in a.matrices().iter().zip(b.matrices()) {
            assert!(Arc::ptr_eq(x, y));
        }
    }

    let weak = inner(grad(&v), grad(&u)).unwrap();
    assert_eq!(weak.len(), 2);
    assert!(weak.iter().all(|term| term.scale() == 1.0));
}

#[test]
fn periodic_forms_have_diagonal_arrays() {
    let x = Basis::builder(6, Family::Fourier)
        .with_dtype(Dtype::Complex)
        .build()
        .unwrap();
    let space = TensorProductSpace::serial(vec![x, Basis::fourier(8).unwrap()]).unwrap();
    let u = TrialFunction::new(&space);
    let v = TestFunction::new(&space);

    let laplacian = diagonal_array(&inner(&v, div(grad(&u))).unwrap(), &space).unwrap();
    assert_eq!(laplacian.shape(), &[6, 5]);
    let kx = space.basis(0).wavenumbers();
    let ky = space.basis(1).wavenumbers();
    for i in 0..6 {
        for j in 0..5 {
            let expected = -4.0 * PI * PI * (kx[i] * kx[i] + ky[j] * ky[j]);
            assert!((laplacian[[i, j]] - Complex64::new(expected, 0.0)).norm() < 1e-10);
        }
    }

    let mass = inner(&v, &u).unwrap();
    assert_eq!(mass.len(), 1);
    let mass = mass[0].diagonal_array(&space).unwrap();
    assert!(mass.iter().all(|z| (z - Complex64::new(4.0 * PI * PI, 0.0)).norm() < 1e-12));
}

#[test]
fn diagonal_arrays_need_diagonal_matrices() {
    let jacobi = Basis::jacobi(6, 0.5, -0.5).unwrap();
    let norms = spectral(&jacobi, &jacobi, 0, 0);
    let space = TensorProductSpace::serial(vec![jacobi, Basis::fourier(8).unwrap()]).unwrap();
    let mass = inner(&TestFunction::new(&space), &TrialFunction::new(&space)).unwrap();
    let array = mass[0].diagonal_array(&space).unwrap();
    for (index, value) in array.indexed_iter() {
        let expected = 2.0 * PI * norms.diagonal(0).unwrap()[index[0]];
        assert!((value - Complex64::new(expected, 0.0)).norm() < 1e-12);
    }

    // Diagonal, but with boundary columns
    let legendre = TensorProductSpace::serial(vec![dirichlet(Family::Legendre, 10), Basis::fourier(8).unwrap()]).unwrap();
    let terms = inner(&TestFunction::new(&legendre), Dx(&TrialFunction::new(&legendre), 0, 2)).unwrap();
    assert!(matches!(terms[0].diagonal_array(&legendre), Err(Error::UnsupportedOperator(_))));

    let chebyshev = TensorProductSpace::serial(vec![Basis::chebyshev(10).unwrap(), Basis::fourier(8).unwrap()]).unwrap();
    let terms = inner(&TestFunction::new(&chebyshev), Dx(&TrialFunction::new(&chebyshev), 0, 2)).unwrap();
    assert!(matches!(terms[0].diagonal_array(&chebyshev), Err(Error::UnsupportedOperator(_))));
}
