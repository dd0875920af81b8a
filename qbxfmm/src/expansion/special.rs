//! Cylindrical Bessel and Hankel functions of integer order.
use num_complex::Complex;
use spec_math::Bessel;

use crate::traits::general::RealScalar;

/// Bessel functions of the first kind `J_n(x)` for `n = 0..=nmax`.
pub fn bessel_j_table<T: RealScalar>(x: T, nmax: usize) -> Vec<T> {
    let x = x.as_f64();
    (0..=nmax)
        .map(|n| {
            if x == 0.0 {
                if n == 0 {
                    T::one()
                } else {
                    T::zero()
                }
            } else {
                T::real(x.bessel_jv(n as f64))
            }
        })
        .collect()
}

/// Bessel functions of the second kind `Y_n(x)` for `n = 0..=nmax`, by forward recurrence from the
/// two lowest orders. Forward recurrence is stable for `Y_n`.
pub fn bessel_y_table<T: RealScalar>(x: T, nmax: usize) -> Vec<T> {
    let x = x.as_f64();
    let mut result = Vec::with_capacity(nmax + 1);
    let mut previous = x.bessel_yv(0.0);
    result.push(previous);

    if nmax > 0 {
        let mut current = x.bessel_yv(1.0);
        result.push(current);

        for n in 1..nmax {
            let next = 2.0 * n as f64 / x * current - previous;
            result.push(next);
            previous = current;
            current = next;
        }
    }

    result.into_iter().map(T::real).collect()
}

/// Hankel functions of the first kind `H_n(x) = J_n(x) + i Y_n(x)` for `n = 0..=nmax`.
pub fn hankel_table<T: RealScalar>(x: T, nmax: usize) -> Vec<Complex<T>> {
    bessel_j_table(x, nmax)
        .into_iter()
        .zip(bessel_y_table(x, nmax))
        .map(|(j, y)| Complex::new(j, y))
        .collect()
}

/// Values `f_n` for `n = -nmax..=nmax`, stored at `n + nmax`, from the non negative orders of a
/// cylinder function using `f_{-n} = (-1)^n f_n`.
pub fn signed_orders<T: RealScalar>(positive: &[Complex<T>]) -> Vec<Complex<T>> {
    let nmax = positive.len() - 1;
    (0..=2 * nmax)
        .map(|i| {
            if i >= nmax {
                positive[i - nmax]
            } else {
                let n = nmax - i;
                if n % 2 == 0 {
                    positive[n]
                } else {
                    -positive[n]
                }
            }
        })
        .collect()
}
