//! Three-term recurrences of the orthogonal families.
//!
//! Every polynomial family satisfies
//!
//! ```text
//!   a_k P_{k+1}(x) = (b_k x + c_k) P_k(x) - e_k P_{k-1}(x),
//! ```
//!
//! and differentiating `d` times gives
//!
//! ```text
//!   a_k P_{k+1}^(d) = (b_k x + c_k) P_k^(d) + d b_k P_k^(d-1) - e_k P_{k-1}^(d),
//! ```
//!
//! which is what [`orthogonal_derivatives`] evaluates. The Laguerre *functions*
//! `ψ_k = L_k(x) exp(-x/2)` satisfy the Laguerre recurrence as well, only their starting value
//! differs.
use super::Family;

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    a: f64,
    b: f64,
    c: f64,
    e: f64,
}

fn coefficients(family: Family, k: usize) -> Coefficients {
    let kf = k as f64;
    match family {
        Family::Chebyshev if k == 0 => Coefficients {
            a: 1.0,
            b: 1.0,
            c: 0.0,
            e: 0.0,
        },
        Family::Chebyshev => Coefficients {
            a: 1.0,
            b: 2.0,
            c: 0.0,
            e: 1.0,
        },
        Family::Legendre => Coefficients {
            a: kf + 1.0,
            b: 2.0 * kf + 1.0,
            c: 0.0,
            e: kf,
        },
        Family::Laguerre => Coefficients {
            a: kf + 1.0,
            b: -1.0,
            c: 2.0 * kf + 1.0,
            e: kf,
        },
        Family::Jacobi { alpha, beta } if k == 0 => Coefficients {
            a: 2.0,
            b: alpha + beta + 2.0,
            c: alpha - beta,
            e: 0.0,
        },
        Family::Jacobi { alpha, beta } => {
            let s = 2.0 * kf + alpha + beta;
            Coefficients {
                a: 2.0 * (kf + 1.0) * (kf + alpha + beta + 1.0) * s,
                b: (s + 1.0) * (s + 2.0) * s,
                c: (s + 1.0) * (alpha * alpha - beta * beta),
                e: 2.0 * (kf + alpha) * (kf + beta) * (s + 2.0),
            }
        }
        Family::Fourier => unreachable!("Fourier modes are not generated by a recurrence"),
    }
}

/// Evaluates `P_k^(d)(x)` for all `k < n` and `d <= max_derivative`.
///
/// The result is indexed as `table[d][k]`. Derivatives are with respect to the reference
/// coordinate.
///
/// # Panics
///
/// Panics for the Fourier family.
pub(crate) fn orthogonal_derivatives(family: Family, n: usize, x: f64, max_derivative: usize) -> Vec<Vec<f64>> {
    let mut table = vec![vec![0.0; n]; max_derivative + 1];
    if n == 0 {
        return table;
    }

    match family {
        Family::Laguerre => {
            let psi0 = (-0.5 * x).exp();
            for (d, row) in table.iter_mut().enumerate() {
                row[0] = (-0.5f64).powi(d as i32) * psi0;
            }
        }
        _ => table[0][0] = 1.0,
    }

    for k in 0..n.saturating_sub(1) {
        let Coefficients { a, b, c, e } = coefficients(family, k);
        for d in 0..=max_derivative {
            let previous = if k > 0 { table[d][k - 1] } else { 0.0 };
            let lower_order = if d > 0 { d as f64 * b * table[d - 1][k] } else { 0.0 };
            table[d][k + 1] = ((b * x + c) * table[d][k] + lower_order - e * previous) / a;
        }
    }
    table
}
