//! Expansions of the two dimensional Laplace kernel.
//!
//! Potentials are real parts of complex analytic functions of `z = x + iy`. A complex strength is
//! split into its real and imaginary parts, each carried by its own channel of `order + 1`
//! coefficients, so that an expansion of order `p` holds `2(p + 1)` coefficients. The value of the
//! first channel gives the real part of the potential, the second channel the imaginary part.
//!
//! With `c` the expansion centre, a multipole expansion represents
//! `a_0 log(z - c) + sum_k a_k (z - c)^{-k}` and a local expansion `sum_l b_l (z - c)^l`.
use num_complex::Complex;

use crate::{
    expansion::{ExpansionKernel, PointSource},
    qbx::instruction::TargetDerivative,
    traits::general::RealScalar,
};

/// Laplace kernel `G(x, y) = -1/(2 pi) log |x - y|`.
#[derive(Clone, Debug)]
pub struct Laplace2d<T>
where
    T: RealScalar,
{
    /// Rows of Pascal's triangle.
    binomials: Vec<Vec<T>>,
}

fn as_complex<T: RealScalar>(point: &[T; 2]) -> Complex<T> {
    Complex::new(point[0], point[1])
}

/// Select the requested quantity from an analytic function's value and derivative.
fn component<T: RealScalar>(f: Complex<T>, df: Complex<T>, derivative: TargetDerivative) -> T {
    match derivative {
        TargetDerivative::Value => f.re,
        TargetDerivative::Axis(0) => df.re,
        TargetDerivative::Axis(_) => -df.im,
    }
}

impl<T> Laplace2d<T>
where
    T: RealScalar,
{
    /// Constructor, precomputes the binomial coefficients needed by translations up to `max_order`.
    pub fn new(max_order: usize) -> Self {
        let nmax = 2 * max_order + 1;
        let mut binomials: Vec<Vec<T>> = Vec::with_capacity(nmax + 1);

        for n in 0..=nmax {
            let mut row = vec![T::one(); n + 1];
            for k in 1..n {
                row[k] = binomials[n - 1][k - 1] + binomials[n - 1][k];
            }
            binomials.push(row);
        }

        Self { binomials }
    }

    fn binomial(&self, n: usize, k: usize) -> T {
        if let Some(row) = self.binomials.get(n) {
            return row[k];
        }
        let value = (0..k).fold(1.0f64, |acc, i| acc * (n - i) as f64 / (i + 1) as f64);
        T::real(value)
    }

    fn channels(strength: Complex<T>) -> [T; 2] {
        [strength.re, strength.im]
    }
}

impl<T> ExpansionKernel<T> for Laplace2d<T>
where
    T: RealScalar,
{
    fn ncoeffs(&self, order: usize) -> usize {
        2 * (order + 1)
    }

    fn scale(&self) -> Complex<T> {
        Complex::new(-T::one() / (T::real(2.0) * T::PI()), T::zero())
    }

    fn is_laplace(&self) -> bool {
        true
    }

    fn p2m(&self, order: usize, centre: &[T; 2], source: &PointSource<T>, coeffs: &mut [Complex<T>]) {
        let d = as_complex(&source.position) - as_complex(centre);

        for (a, w) in coeffs
            .chunks_exact_mut(order + 1)
            .zip(Self::channels(source.strength))
        {
            if w == T::zero() {
                continue;
            }

            match source.dipole {
                None => {
                    a[0] += w;
                    let mut power = Complex::new(T::one(), T::zero());
                    for (k, ak) in a.iter_mut().enumerate().skip(1) {
                        power *= d;
                        *ak -= power * (w / T::real(k as f64));
                    }
                }
                Some(normal) => {
                    let nu = as_complex(&normal) * w;
                    let mut power = Complex::new(T::one(), T::zero());
                    for ak in a.iter_mut().skip(1) {
                        *ak -= nu * power;
                        power *= d;
                    }
                }
            }
        }
    }

    fn p2l(&self, order: usize, centre: &[T; 2], source: &PointSource<T>, coeffs: &mut [Complex<T>]) {
        let d = as_complex(&source.position) - as_complex(centre);
        let inv = d.inv();

        for (b, w) in coeffs
            .chunks_exact_mut(order + 1)
            .zip(Self::channels(source.strength))
        {
            if w == T::zero() {
                continue;
            }

            match source.dipole {
                None => {
                    b[0] += (-d).ln() * w;
                    let mut power = Complex::new(T::one(), T::zero());
                    for (l, bl) in b.iter_mut().enumerate().skip(1) {
                        power *= inv;
                        *bl -= power * (w / T::real(l as f64));
                    }
                }
                Some(normal) => {
                    let nu = as_complex(&normal) * w;
                    let mut power = inv;
                    for bl in b.iter_mut() {
                        *bl += nu * power;
                        power *= inv;
                    }
                }
            }
        }
    }

    fn m2m(
        &self,
        source_order: usize,
        source_centre: &[T; 2],
        source: &[Complex<T>],
        target_order: usize,
        target_centre: &[T; 2],
        target: &mut [Complex<T>],
    ) {
        let z0 = as_complex(source_centre) - as_complex(target_centre);
        let mut powers = vec![Complex::new(T::one(), T::zero()); target_order + 1];
        for l in 1..=target_order {
            powers[l] = powers[l - 1] * z0;
        }

        for (a, b) in source
            .chunks_exact(source_order + 1)
            .zip(target.chunks_exact_mut(target_order + 1))
        {
            b[0] += a[0];
            for l in 1..=target_order {
                let mut term = -a[0] * powers[l] / T::real(l as f64);
                for k in 1..=l.min(source_order) {
                    term += a[k] * powers[l - k] * self.binomial(l - 1, k - 1);
                }
                b[l] += term;
            }
        }
    }

    fn m2l(
        &self,
        source_order: usize,
        source_centre: &[T; 2],
        source: &[Complex<T>],
        target_order: usize,
        target_centre: &[T; 2],
        target: &mut [Complex<T>],
    ) {
        let z0 = as_complex(source_centre) - as_complex(target_centre);
        let inv = z0.inv();
        let nmax = source_order.max(target_order);
        let mut inv_powers = vec![Complex::new(T::one(), T::zero()); nmax + 1];
        for k in 1..=nmax {
            inv_powers[k] = inv_powers[k - 1] * inv;
        }
        let log_term = (-z0).ln();

        for (a, b) in source
            .chunks_exact(source_order + 1)
            .zip(target.chunks_exact_mut(target_order + 1))
        {
            // a_k (-1)^k z0^{-k}, shared by every output coefficient
            let alternating = (0..=source_order)
                .map(|k| {
                    let term = a[k] * inv_powers[k];
                    if k % 2 == 0 {
                        term
                    } else {
                        -term
                    }
                })
                .collect::<Vec<_>>();

            b[0] += a[0] * log_term + alternating.iter().skip(1).copied().sum::<Complex<T>>();

            for l in 1..=target_order {
                let mut term = -a[0] / T::real(l as f64);
                for (k, alt) in alternating.iter().enumerate().skip(1) {
                    term += *alt * self.binomial(l + k - 1, k - 1);
                }
                b[l] += term * inv_powers[l];
            }
        }
    }

    fn l2l(
        &self,
        source_order: usize,
        source_centre: &[T; 2],
        source: &[Complex<T>],
        target_order: usize,
        target_centre: &[T; 2],
        target: &mut [Complex<T>],
    ) {
        let d = as_complex(target_centre) - as_complex(source_centre);
        let mut powers = vec![Complex::new(T::one(), T::zero()); source_order + 1];
        for k in 1..=source_order {
            powers[k] = powers[k - 1] * d;
        }

        for (a, b) in source
            .chunks_exact(source_order + 1)
            .zip(target.chunks_exact_mut(target_order + 1))
        {
            for (l, bl) in b.iter_mut().enumerate().take(source_order + 1) {
                let mut term = Complex::new(T::zero(), T::zero());
                for k in l..=source_order {
                    term += a[k] * powers[k - l] * self.binomial(k, l);
                }
                *bl += term;
            }
        }
    }

    fn m2p(
        &self,
        order: usize,
        centre: &[T; 2],
        coeffs: &[Complex<T>],
        target: &[T; 2],
        derivative: TargetDerivative,
    ) -> Complex<T> {
        let w = as_complex(target) - as_complex(centre);
        let inv = w.inv();

        let mut result = [T::zero(); 2];
        for (channel, a) in coeffs.chunks_exact(order + 1).enumerate() {
            let mut f = a[0] * w.ln();
            let mut df = a[0] * inv;
            let mut power = Complex::new(T::one(), T::zero());
            for (k, ak) in a.iter().enumerate().skip(1) {
                power *= inv;
                f += *ak * power;
                df -= *ak * power * inv * T::real(k as f64);
            }
            result[channel] = component(f, df, derivative);
        }

        Complex::new(result[0], result[1])
    }

    fn l2p(
        &self,
        order: usize,
        centre: &[T; 2],
        coeffs: &[Complex<T>],
        target: &[T; 2],
        derivative: TargetDerivative,
    ) -> Complex<T> {
        let w = as_complex(target) - as_complex(centre);

        let mut result = [T::zero(); 2];
        for (channel, b) in coeffs.chunks_exact(order + 1).enumerate() {
            let mut f = Complex::new(T::zero(), T::zero());
            let mut df = Complex::new(T::zero(), T::zero());
            for (l, bl) in b.iter().enumerate().rev() {
                f = f * w + *bl;
                if l > 0 {
                    df = df * w + *bl * T::real(l as f64);
                }
            }
            result[channel] = component(f, df, derivative);
        }

        Complex::new(result[0], result[1])
    }

    fn p2p(
        &self,
        source: &PointSource<T>,
        target: &[T; 2],
        derivative: TargetDerivative,
    ) -> Complex<T> {
        let d = as_complex(target) - as_complex(&source.position);
        if d.norm_sqr() == T::zero() {
            return Complex::new(T::zero(), T::zero());
        }
        let inv = d.inv();

        let (f, df) = match source.dipole {
            None => (d.ln(), inv),
            Some(normal) => {
                let nu = as_complex(&normal);
                (-nu * inv, nu * inv * inv)
            }
        };

        source.strength * component(f, df, derivative)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::helpers::points_fixture;

    fn sources_fixture(
        n: usize,
        centre: [f64; 2],
        half_width: f64,
        dipoles: bool,
    ) -> Vec<PointSource<f64>> {
        let positions = points_fixture::<f64>(n, Some(-half_width), Some(half_width), Some(0));
        let strengths = points_fixture::<f64>(n, Some(-1.0), Some(1.0), Some(1));
        positions
            .iter()
            .zip(strengths.iter())
            .enumerate()
            .map(|(i, (p, s))| {
                let angle = i as f64;
                PointSource {
                    position: [centre[0] + p[0], centre[1] + p[1]],
                    strength: Complex::new(s[0], s[1]),
                    dipole: dipoles.then(|| [angle.cos(), angle.sin()]),
                }
            })
            .collect()
    }

    fn direct(
        kernel: &Laplace2d<f64>,
        sources: &[PointSource<f64>],
        target: &[f64; 2],
        derivative: TargetDerivative,
    ) -> Complex<f64> {
        sources.iter().map(|s| kernel.p2p(s, target, derivative)).sum()
    }

    fn rel_error(found: Complex<f64>, expected: Complex<f64>) -> f64 {
        (found - expected).norm() / expected.norm()
    }

    const DERIVATIVES: [TargetDerivative; 3] = [
        TargetDerivative::Value,
        TargetDerivative::Axis(0),
        TargetDerivative::Axis(1),
    ];

    #[test]
    fn test_p2p_gradient() {
        let kernel = Laplace2d::<f64>::new(4);
        let sources = sources_fixture(5, [0.0, 0.0], 0.5, true);
        let target = [1.3, 0.7];
        let h = 1e-6;

        for axis in 0..2 {
            let mut plus = target;
            let mut minus = target;
            plus[axis] += h;
            minus[axis] -= h;
            let fd = (direct(&kernel, &sources, &plus, TargetDerivative::Value)
                - direct(&kernel, &sources, &minus, TargetDerivative::Value))
                / (2.0 * h);
            let found = direct(&kernel, &sources, &target, TargetDerivative::Axis(axis));
            assert!(rel_error(found, fd) < 1e-6);
        }
    }

    #[test]
    fn test_multipole_and_local() {
        let order = 24;
        let kernel = Laplace2d::<f64>::new(order);
        let ncoeffs = kernel.ncoeffs(order);

        for dipoles in [false, true] {
            let centre = [0.1, -0.2];
            let sources = sources_fixture(20, centre, 0.1, dipoles);

            let mut multipole = vec![Complex::new(0.0, 0.0); ncoeffs];
            sources
                .iter()
                .for_each(|s| kernel.p2m(order, &centre, s, &mut multipole));

            let far = [2.1, 1.3];
            for derivative in DERIVATIVES {
                let found = kernel.m2p(order, &centre, &multipole, &far, derivative);
                let expected = direct(&kernel, &sources, &far, derivative);
                assert!(rel_error(found, expected) < 1e-10);
            }

            let local_centre = [2.0, 1.5];
            let mut local = vec![Complex::new(0.0, 0.0); ncoeffs];
            sources
                .iter()
                .for_each(|s| kernel.p2l(order, &local_centre, s, &mut local));

            let near = [2.05, 1.42];
            for derivative in DERIVATIVES {
                let found = kernel.l2p(order, &local_centre, &local, &near, derivative);
                let expected = direct(&kernel, &sources, &near, derivative);
                assert!(rel_error(found, expected) < 1e-10);
            }
        }
    }

    #[test]
    fn test_translation_chain() {
        let order = 24;
        let kernel = Laplace2d::<f64>::new(order);
        let ncoeffs = kernel.ncoeffs(order);
        let zeros = || vec![Complex::new(0.0, 0.0); ncoeffs];

        let child = [0.125, 0.125];
        let parent = [0.25, 0.25];
        let sources = sources_fixture(30, child, 0.1, true);

        let mut child_multipole = zeros();
        sources
            .iter()
            .for_each(|s| kernel.p2m(order, &child, s, &mut child_multipole));

        let mut parent_multipole = zeros();
        kernel.m2m(order, &child, &child_multipole, order, &parent, &mut parent_multipole);

        let far_parent = [2.25, 0.25];
        let mut far_local = zeros();
        kernel.m2l(order, &parent, &parent_multipole, order, &far_parent, &mut far_local);

        let far_child = [2.125, 0.375];
        let mut child_local = zeros();
        kernel.l2l(order, &far_parent, &far_local, order, &far_child, &mut child_local);

        let target = [2.15, 0.33];
        for derivative in DERIVATIVES {
            let expected = direct(&kernel, &sources, &target, derivative);
            let found = kernel.l2p(order, &far_child, &child_local, &target, derivative);
            assert!(rel_error(found, expected) < 1e-9);

            let found = kernel.m2p(order, &parent, &parent_multipole, &target, derivative);
            assert!(rel_error(found, expected) < 1e-10);
        }
    }

    #[test]
    fn test_mixed_orders() {
        let kernel = Laplace2d::<f64>::new(30);
        let sources = sources_fixture(10, [0.0, 0.0], 0.05, false);

        let mut multipole = vec![Complex::new(0.0, 0.0); kernel.ncoeffs(30)];
        sources
            .iter()
            .for_each(|s| kernel.p2m(30, &[0.0, 0.0], s, &mut multipole));

        let mut local = vec![Complex::new(0.0, 0.0); kernel.ncoeffs(12)];
        kernel.m2l(30, &[0.0, 0.0], &multipole, 12, &[3.0, 0.0], &mut local);

        let target = [3.01, 0.02];
        let expected = direct(&kernel, &sources, &target, TargetDerivative::Value);
        let found = kernel.l2p(12, &[3.0, 0.0], &local, &target, TargetDerivative::Value);
        assert!(rel_error(found, expected) < 1e-10);
    }
}
