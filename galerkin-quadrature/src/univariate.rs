//! Quadrature rules for one-dimensional reference domains.
//!
//! Polynomial rules live on `[-1, 1]` and Laguerre rules on `[0, ∞)`.
use crate::special::ln_gamma;
use crate::{Error, Rule};
use std::f64::consts::PI;

const NEWTON_TOLERANCE: f64 = 1e-14;
const MAX_NEWTON_ITERATIONS: usize = 100;

/// `P_n`, `P_n'` and `P_n''` at a single point of [-1, 1], endpoints included.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Legendre {
    value: f64,
    slope: f64,
    curvature: f64,
}

impl Legendre {
    fn at(n: usize, x: f64) -> Self {
        // m P_m = (2m - 1) x P_{m-1} - (m - 1) P_{m-2}
        // P_m' = P_{m-2}' + (2m - 1) P_{m-1}, differentiated once more for P_m''
        let (mut p_prev, mut p) = (0.0, 1.0);
        let (mut d_prev, mut d) = (0.0, 0.0);
        let (mut c_prev, mut c) = (0.0, 0.0);
        for m in 1..=n {
            let m = m as f64;
            let p_next = ((2.0 * m - 1.0) * x * p - (m - 1.0) * p_prev) / m;
            let d_next = d_prev + (2.0 * m - 1.0) * p;
            let c_next = c_prev + (2.0 * m - 1.0) * d;
            (p_prev, p) = (p, p_next);
            (d_prev, d) = (d, d_next);
            (c_prev, c) = (c, c_next);
        }
        Self {
            value: p,
            slope: d,
            curvature: c,
        }
    }
}

/// Newton's method for a root of the function whose value and derivative `f` returns.
///
/// Returns `None` unless a step drops below [`NEWTON_TOLERANCE`] within
/// [`MAX_NEWTON_ITERATIONS`] steps.
fn newton(mut x: f64, f: impl Fn(f64) -> (f64, f64)) -> Option<f64> {
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (value, slope) = f(x);
        let dx = -value / slope;
        x += dx;
        if dx.abs() <= NEWTON_TOLERANCE {
            return Some(x);
        }
    }
    None
}

fn sorted(mut weights: Vec<f64>, mut points: Vec<f64>) -> Rule {
    let mut pairs: Vec<_> = points.drain(..).zip(weights.drain(..)).collect();
    pairs.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    let (points, weights) = pairs.into_iter().unzip();
    (weights, points)
}

/// Gauss-Legendre quadrature for the reference interval [-1, 1].
///
/// Returns the [Gauss quadrature rule] with the given number of points. Given `n` points,
/// the rule integrates polynomials of order up to `2 n - 1` exactly. Fails if no points are
/// requested, or if Newton's method does not converge for one of the nodes.
///
/// [Gauss quadrature rule]: https://en.wikipedia.org/wiki/Gaussian_quadrature
pub fn gauss_legendre(num_points: usize) -> Result<Rule, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }

    // Nodes in (0, 1) from Newton's method, the rest by symmetry
    let half = (n + 1) / 2;
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for i in 0..half {
        let guess = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let x = newton(guess, |x| {
            let p = Legendre::at(n, x);
            (p.value, p.slope)
        })
        .ok_or(Error::NoConvergence { num_points })?;
        let slope = Legendre::at(n, x).slope;
        points.push(x);
        weights.push(2.0 / ((1.0 - x * x) * slope * slope));
    }
    for i in half..n {
        let mirror = n - 1 - i;
        points.push(-points[mirror]);
        weights.push(weights[mirror]);
    }

    Ok(sorted(weights, points))
}

/// Gauss-Lobatto-Legendre quadrature for the reference interval [-1, 1].
///
/// The rule contains both endpoints and integrates polynomials of order up to `2 n - 3`
/// exactly. At least two points are required.
pub fn gauss_lobatto_legendre(num_points: usize) -> Result<Rule, Error> {
    if num_points < 2 {
        return Err(Error::NoRuleAvailable);
    }
    // Interior points are the roots of P'_{n - 1}
    let n = num_points - 1;
    let nf = n as f64;
    let mut points = vec![0.0; num_points];
    let mut weights = vec![0.0; num_points];

    for j in 0..=n {
        let mut x = -(PI * j as f64 / nf).cos();
        if j != 0 && j != n {
            x = newton(x, |x| {
                let p = Legendre::at(n, x);
                (p.slope, p.curvature)
            })
            .ok_or(Error::NoConvergence { num_points })?;
        }
        let p = Legendre::at(n, x).value;
        points[j] = x;
        weights[j] = 2.0 / (nf * (nf + 1.0) * p * p);
    }

    Ok(sorted(weights, points))
}

/// Gauss-Chebyshev quadrature for the weight `1 / sqrt(1 - x^2)` on [-1, 1].
///
/// All weights are equal to `π / n`.
pub fn gauss_chebyshev(num_points: usize) -> Rule {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");
    let points = (0..n)
        .map(|j| -(PI * (2 * j + 1) as f64 / (2 * n) as f64).cos())
        .collect();
    (vec![PI / n as f64; n], points)
}

/// Gauss-Lobatto-Chebyshev quadrature for the weight `1 / sqrt(1 - x^2)` on [-1, 1].
pub fn gauss_lobatto_chebyshev(num_points: usize) -> Result<Rule, Error> {
    if num_points < 2 {
        return Err(Error::NoRuleAvailable);
    }
    let n = num_points - 1;
    let points = (0..=n).map(|j| -(PI * j as f64 / n as f64).cos()).collect();
    let mut weights = vec![PI / n as f64; num_points];
    weights[0] *= 0.5;
    weights[n] *= 0.5;
    Ok((weights, points))
}

/// A Gauss-Laguerre rule together with weights scaled for Laguerre *functions*.
#[derive(Debug, Clone, PartialEq)]
pub struct LaguerreRule {
    pub points: Vec<f64>,
    /// Weights for the weight function `exp(-x)`.
    pub weights: Vec<f64>,
    /// Weights multiplied by `exp(x_j)`, i.e. weights for the unweighted integral of
    /// products of Laguerre functions `L_k(x) exp(-x / 2)`.
    pub scaled_weights: Vec<f64>,
}

/// Gauss-Laguerre quadrature for the weight `exp(-x)` on [0, ∞).
///
/// Based on the procedure used in Numerical Recipes. The Laguerre recurrence is run on the
/// functions `L_k(x) exp(-x / 2)`, which stay bounded, so that the scaled weights are
/// accurate even where the plain weights are tiny.
pub fn gauss_laguerre(num_points: usize) -> Result<LaguerreRule, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }
    let nf = n as f64;
    let mut points: Vec<f64> = Vec::with_capacity(n);
    let mut scaled_weights = Vec::with_capacity(n);
    let mut z = 0.0;

    for i in 0..n {
        z = match i {
            0 => 3.0 / (1.0 + 2.4 * nf),
            1 => z + 15.0 / (1.0 + 2.5 * nf),
            _ => {
                let ai = (i - 1) as f64;
                z + ((1.0 + 2.55 * ai) / (1.9 * ai)) * (z - points[i - 2])
            }
        };

        let mut converged = false;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let (p1, p2) = laguerre_function_pair(n, z);
            // d/dx L_n = n (L_n - L_{n-1}) / x; the exp(-x/2) factor cancels in the ratio
            let dp = nf * (p1 - p2) / z;
            let dz = p1 / dp;
            z -= dz;
            if dz.abs() <= 1e-14 * z.abs() {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(Error::NoConvergence { num_points });
        }
        let (_, q2) = laguerre_function_pair(n, z);
        points.push(z);
        // w_j exp(x_j) = x_j / (n^2 [L_{n-1}(x_j) exp(-x_j/2)]^2)
        scaled_weights.push(z / (nf * nf * q2 * q2));
    }

    let weights = points
        .iter()
        .zip(&scaled_weights)
        .map(|(x, w)| w * (-x).exp())
        .collect();

    Ok(LaguerreRule {
        points,
        weights,
        scaled_weights,
    })
}

/// Returns `(L_n(x) exp(-x/2), L_{n-1}(x) exp(-x/2))`.
fn laguerre_function_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p1 = (-0.5 * x).exp();
    let mut p2 = 0.0;
    for j in 0..n {
        let p3 = p2;
        p2 = p1;
        let j = j as f64;
        p1 = ((2.0 * j + 1.0 - x) * p2 - j * p3) / (j + 1.0);
    }
    (p1, p2)
}

/// Gauss-Jacobi quadrature for the weight `(1 - x)^α (1 + x)^β` on [-1, 1].
///
/// Requires `α, β > -1`. Based on the procedure used in Numerical Recipes.
pub fn gauss_jacobi(num_points: usize, alpha: f64, beta: f64) -> Result<Rule, Error> {
    let n = num_points;
    if n == 0 || alpha <= -1.0 || beta <= -1.0 {
        return Err(Error::NoRuleAvailable);
    }
    let nf = n as f64;
    let alfbet = alpha + beta;
    let mut points: Vec<f64> = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    let mut z = 0.0;

    // The heuristic initial guesses refer to previously computed roots, which are stored
    // in descending order
    for i in 1..=n {
        if i == 1 {
            let an = alpha / nf;
            let bn = beta / nf;
            let r1 = (1.0 + alpha) * (2.78 / (4.0 + nf * nf) + 0.768 * an / nf);
            let r2 = 1.0 + 1.48 * an + 0.96 * bn + 0.452 * an * an + 0.83 * an * bn;
            z = 1.0 - r1 / r2;
        } else if i == 2 {
            let r1 = (4.1 + alpha) / ((1.0 + alpha) * (1.0 + 0.156 * alpha));
            let r2 = 1.0 + 0.06 * (nf - 8.0) * (1.0 + 0.12 * alpha) / nf;
            let r3 = 1.0 + 0.012 * beta * (1.0 + 0.25 * alpha.abs()) / nf;
            z -= (1.0 - z) * r1 * r2 * r3;
        } else if i == 3 {
            let r1 = (1.67 + 0.28 * alpha) / (1.0 + 0.37 * alpha);
            let r2 = 1.0 + 0.22 * (nf - 8.0) / nf;
            let r3 = 1.0 + 8.0 * beta / ((6.28 + beta) * nf * nf);
            z -= (points[0] - z) * r1 * r2 * r3;
        } else if i == n - 1 {
            let r1 = (1.0 + 0.235 * beta) / (0.766 + 0.119 * beta);
            let r2 = 1.0 / (1.0 + 0.639 * (nf - 4.0) / (1.0 + 0.71 * (nf - 4.0)));
            let r3 = 1.0 / (1.0 + 20.0 * alpha / ((7.5 + alpha) * nf * nf));
            z += (z - points[n - 4]) * r1 * r2 * r3;
        } else if i == n {
            let r1 = (1.0 + 0.37 * beta) / (1.67 + 0.28 * beta);
            let r2 = 1.0 / (1.0 + 0.22 * (nf - 8.0) / nf);
            let r3 = 1.0 / (1.0 + 8.0 * alpha / ((6.28 + alpha) * nf * nf));
            z += (z - points[n - 3]) * r1 * r2 * r3;
        } else {
            z = 3.0 * points[i - 2] - 3.0 * points[i - 3] + points[i - 4];
        }

        let mut converged = false;
        let mut pp = 0.0;
        let mut p2 = 0.0;
        let mut temp = 0.0;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let eval = JacobiRecurrence::evaluate(n, alpha, beta, z);
            pp = eval.derivative;
            p2 = eval.previous;
            temp = eval.temp;
            let z1 = z;
            z = z1 - eval.value / pp;
            if (z - z1).abs() <= 3e-15 {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(Error::NoConvergence { num_points });
        }
        points.push(z);
        let log_factor = ln_gamma(alpha + nf) + ln_gamma(beta + nf) - ln_gamma(nf + 1.0) - ln_gamma(nf + alfbet + 1.0);
        weights.push(log_factor.exp() * temp * 2f64.powf(alfbet) / (pp * p2));
    }

    Ok(sorted(weights, points))
}

struct JacobiRecurrence {
    value: f64,
    previous: f64,
    derivative: f64,
    temp: f64,
}

impl JacobiRecurrence {
    fn evaluate(n: usize, alpha: f64, beta: f64, z: f64) -> Self {
        let alfbet = alpha + beta;
        let mut temp = 2.0 + alfbet;
        let mut p1 = (alpha - beta + temp * z) / 2.0;
        let mut p2 = 1.0;
        for j in 2..=n {
            let p3 = p2;
            p2 = p1;
            let j = j as f64;
            temp = 2.0 * j + alfbet;
            let a = 2.0 * j * (j + alfbet) * (temp - 2.0);
            let b = (temp - 1.0) * (alpha * alpha - beta * beta + temp * (temp - 2.0) * z);
            let c = 2.0 * (j - 1.0 + alpha) * (j - 1.0 + beta) * temp;
            p1 = (b * p2 - c * p3) / a;
        }
        let nf = n as f64;
        let derivative =
            (nf * (alpha - beta - temp * z) * p1 + 2.0 * (nf + alpha) * (nf + beta) * p2) / (temp * (1.0 - z * z));
        Self {
            value: p1,
            previous: p2,
            derivative,
            temp,
        }
    }
}
