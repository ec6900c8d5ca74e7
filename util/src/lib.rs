use num::complex::Complex64;

/// Asserts that two sequences of values agree entry by entry up to a tolerance.
///
/// Works for anything accepted by [`max_abs_diff`], e.g. iterators over `f64` or `Complex64`.
#[macro_export]
macro_rules! assert_values_close {
    ($x:expr, $y:expr, tol = $tol:expr) => {{
        let max_absdiff = $crate::max_abs_diff($x, $y);
        if !(max_absdiff <= $tol) {
            panic!(
                "assert_values_close!({}, {}) failed: max abs diff {:e} > tol {:e}",
                std::stringify!($x),
                std::stringify!($y),
                max_absdiff,
                $tol
            );
        }
    }};
}

/// Values whose distance can be measured by an absolute difference.
pub trait AbsDiff: Copy {
    fn abs_diff(self, other: Self) -> f64;
}

impl AbsDiff for f64 {
    fn abs_diff(self, other: Self) -> f64 {
        (self - other).abs()
    }
}

impl AbsDiff for Complex64 {
    fn abs_diff(self, other: Self) -> f64 {
        (self - other).norm()
    }
}

impl<'a, T: AbsDiff> AbsDiff for &'a T {
    fn abs_diff(self, other: Self) -> f64 {
        (*self).abs_diff(*other)
    }
}

/// Maximum absolute difference between two equally long sequences.
///
/// # Panics
///
/// Panics if the sequences have different lengths.
pub fn max_abs_diff<T: AbsDiff>(a: impl IntoIterator<Item = T>, b: impl IntoIterator<Item = T>) -> f64 {
    let a: Vec<T> = a.into_iter().collect();
    let b: Vec<T> = b.into_iter().collect();
    assert_eq!(a.len(), b.len(), "Sequences must have the same length.");
    a.into_iter()
        .zip(b)
        .map(|(x, y)| x.abs_diff(y))
        // NaN must not be swallowed by the maximum
        .fold(0.0, |max, d| if d.is_nan() || d > max { d } else { max })
}
