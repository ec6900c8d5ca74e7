use galerkin_quadrature::integrate;
use galerkin_quadrature::special::ln_gamma;
use galerkin_quadrature::univariate::{
    gauss_chebyshev, gauss_jacobi, gauss_laguerre, gauss_legendre, gauss_lobatto_chebyshev, gauss_lobatto_legendre,
};
use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;

fn monomial_integral(alpha: i32) -> f64 {
    (1.0 - (-1.0f64).powi(alpha + 1)) / (alpha as f64 + 1.0)
}

/// Integral of x^k over [-1, 1] with weight 1 / sqrt(1 - x^2).
fn chebyshev_weighted_monomial_integral(k: i32) -> f64 {
    if k % 2 == 1 {
        0.0
    } else {
        // pi * (k - 1)!! / k!!
        let mut result = std::f64::consts::PI;
        let mut j = k;
        while j > 0 {
            result *= (j - 1) as f64 / j as f64;
            j -= 2;
        }
        result
    }
}

#[test]
fn gauss_legendre_rules_satisfy_expected_accuracy() {
    assert_eq!(gauss_legendre(0), Err(galerkin_quadrature::Error::NoRuleAvailable));

    for n in 1..=100 {
        let expected_polynomial_degree = 2 * n - 1;
        let rule = gauss_legendre(n).unwrap();

        // Also test that weights are positive and points ascending
        assert!(rule.0.iter().all(|&w| w > 0.0));
        assert!(rule.1.windows(2).all(|w| w[0] < w[1]));

        for alpha in 0..=expected_polynomial_degree as i32 {
            let estimated_integral = integrate(&rule, |x| x.powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral(alpha), comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn gauss_lobatto_legendre_rules_satisfy_expected_accuracy() {
    assert!(gauss_lobatto_legendre(0).is_err());
    assert!(gauss_lobatto_legendre(1).is_err());

    for n in (2..=32).chain([64, 128]) {
        let expected_polynomial_degree = 2 * n - 3;
        let rule = gauss_lobatto_legendre(n).unwrap();

        // Check that rule contains endpoints, like Gauss-Lobatto should
        assert_scalar_eq!(*rule.1.first().unwrap(), -1.0, comp = abs, tol = 1e-15);
        assert_scalar_eq!(*rule.1.last().unwrap(), 1.0, comp = abs, tol = 1e-15);
        assert!(rule.0.iter().all(|&w| w > 0.0));

        for alpha in 0..=expected_polynomial_degree as i32 {
            let estimated_integral = integrate(&rule, |x| x.powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral(alpha), comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn chebyshev_rules_satisfy_expected_accuracy() {
    for n in 2..=40 {
        let gauss = gauss_chebyshev(n);
        for k in 0..=(2 * n - 1) as i32 {
            let estimated_integral = integrate(&gauss, |x| x.powi(k));
            assert_scalar_eq!(
                estimated_integral,
                chebyshev_weighted_monomial_integral(k),
                comp = abs,
                tol = 1e-13
            );
        }

        let lobatto = gauss_lobatto_chebyshev(n).unwrap();
        for k in 0..=(2 * n - 3) as i32 {
            let estimated_integral = integrate(&lobatto, |x| x.powi(k));
            assert_scalar_eq!(
                estimated_integral,
                chebyshev_weighted_monomial_integral(k),
                comp = abs,
                tol = 1e-13
            );
        }
    }
}

#[test]
fn gauss_laguerre_integrates_moments() {
    for n in 1..=30 {
        let rule = gauss_laguerre(n).unwrap();
        assert!(rule.points.windows(2).all(|w| w[0] < w[1]));
        // int_0^inf x^k exp(-x) dx = k!
        let mut factorial = 1.0;
        for k in 0..(2 * n) as i32 {
            if k > 0 {
                factorial *= k as f64;
            }
            let estimated: f64 = rule
                .weights
                .iter()
                .zip(&rule.points)
                .map(|(w, x)| w * x.powi(k))
                .sum();
            assert_scalar_eq!(estimated / factorial, 1.0, comp = abs, tol = 1e-10);
        }
    }
}

#[test]
fn gauss_laguerre_scaled_weights_integrate_laguerre_functions() {
    // int_0^inf exp(-x) dx = 1 evaluated through the scaled weights
    let rule = gauss_laguerre(40).unwrap();
    let estimated: f64 = rule
        .scaled_weights
        .iter()
        .zip(&rule.points)
        .map(|(w, x)| w * (-x).exp())
        .sum();
    assert_scalar_eq!(estimated, 1.0, comp = abs, tol = 1e-12);
}

proptest! {
    #[test]
    fn gauss_jacobi_integrates_weight(alpha in -0.9..3.0f64, beta in -0.9..3.0f64, n in 1usize..20) {
        let rule = gauss_jacobi(n, alpha, beta).unwrap();
        let total: f64 = rule.0.iter().sum();
        // int (1 - x)^a (1 + x)^b dx = 2^(a + b + 1) B(a + 1, b + 1)
        let expected = ((alpha + beta + 1.0) * 2f64.ln() + ln_gamma(alpha + 1.0) + ln_gamma(beta + 1.0)
            - ln_gamma(alpha + beta + 2.0))
        .exp();
        prop_assert!((total - expected).abs() <= 1e-11 * expected);
        prop_assert!(rule.1.iter().all(|x| x.abs() < 1.0));
    }
}

#[test]
fn gauss_jacobi_with_zero_exponents_is_gauss_legendre() {
    let jacobi = gauss_jacobi(12, 0.0, 0.0).unwrap();
    let legendre = gauss_legendre(12).unwrap();
    for (a, b) in jacobi.1.iter().zip(&legendre.1) {
        assert_scalar_eq!(*a, *b, comp = abs, tol = 1e-13);
    }
    for (a, b) in jacobi.0.iter().zip(&legendre.0) {
        assert_scalar_eq!(*a, *b, comp = abs, tol = 1e-13);
    }
}
