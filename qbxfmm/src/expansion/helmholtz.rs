//! Expansions of the two dimensional Helmholtz kernel based on Graf's addition theorem.
//!
//! With `R_n(w) = J_n(k|w|) e^{in arg w}` and `S_n(w) = H_n(k|w|) e^{in arg w}`, a multipole
//! expansion about `c` represents `sum_m M_m S_m(x - c)` and a local expansion
//! `sum_j L_j R_j(x - c)`, for `m, j` in `-p..=p`. Coefficient `n` is stored at index `n + p`.
//!
//! Every translation takes the form `target_j += sum_m source_m W_{m - j}`, where `W` is `R` (M2M and
//! L2L) or `S` (M2L) evaluated at the displacement from the source centre to the target centre.
use num_complex::Complex;

use crate::{
    expansion::{
        special::{bessel_j_table, hankel_table, signed_orders},
        ExpansionKernel, PointSource,
    },
    qbx::instruction::TargetDerivative,
    traits::{general::RealScalar, types::QbxError},
};

/// Helmholtz kernel `G(x, y) = (i/4) H_0(k |x - y|)`.
#[derive(Clone, Copy, Debug)]
pub struct Helmholtz2d<T>
where
    T: RealScalar,
{
    wavenumber: T,
}

/// Kind of an expansion translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Translation {
    /// Multipole to multipole.
    MultipoleToMultipole,
    /// Multipole to local.
    MultipoleToLocal,
    /// Local to local.
    LocalToLocal,
}

#[derive(Clone, Copy)]
enum Cylinder {
    Regular,
    Singular,
}

impl<T> Helmholtz2d<T>
where
    T: RealScalar,
{
    /// Constructor.
    ///
    /// # Arguments
    /// * `wavenumber` - A positive, finite wave number.
    pub fn new(wavenumber: T) -> Result<Self, QbxError> {
        if !(wavenumber.is_finite() && wavenumber > T::zero()) {
            return Err(QbxError::InvalidInput(format!(
                "Helmholtz wave number must be positive and finite, found {wavenumber:?}"
            )));
        }
        Ok(Self { wavenumber })
    }

    /// The wave number.
    pub fn wavenumber(&self) -> T {
        self.wavenumber
    }

    fn table(&self, w: &[T; 2], nmax: usize, cylinder: Cylinder) -> Vec<Complex<T>> {
        let r = (w[0] * w[0] + w[1] * w[1]).sqrt();
        let kr = self.wavenumber * r;

        let radial = match cylinder {
            Cylinder::Regular => bessel_j_table(kr, nmax)
                .into_iter()
                .map(|j| Complex::new(j, T::zero()))
                .collect(),
            Cylinder::Singular => hankel_table(kr, nmax),
        };

        let unit = if r > T::zero() {
            Complex::new(w[0] / r, w[1] / r)
        } else {
            Complex::new(T::one(), T::zero())
        };

        let mut result = signed_orders(&radial);
        let mut power = Complex::new(T::one(), T::zero());
        for n in 1..=nmax {
            power *= unit;
            result[nmax + n] *= power;
            result[nmax - n] *= power.conj();
        }
        result
    }

    /// `R_n(w)` for `n = -nmax..=nmax`, stored at `n + nmax`.
    pub fn regular(&self, w: &[T; 2], nmax: usize) -> Vec<Complex<T>> {
        self.table(w, nmax, Cylinder::Regular)
    }

    /// `S_n(w)` for `n = -nmax..=nmax`, stored at `n + nmax`.
    pub fn singular(&self, w: &[T; 2], nmax: usize) -> Vec<Complex<T>> {
        self.table(w, nmax, Cylinder::Singular)
    }

    /// Weights `W_n` of a translation over the displacement from the source to the target centre,
    /// for `n = -(source_order + target_order)..=(source_order + target_order)`.
    pub fn translation_weights(
        &self,
        kind: Translation,
        source_order: usize,
        target_order: usize,
        displacement: &[T; 2],
    ) -> Vec<Complex<T>> {
        let nmax = source_order + target_order;
        match kind {
            Translation::MultipoleToMultipole | Translation::LocalToLocal => {
                self.regular(displacement, nmax)
            }
            Translation::MultipoleToLocal => self.singular(displacement, nmax),
        }
    }

    /// Apply precomputed translation weights, accumulating into `target`.
    pub fn apply_translation(
        source_order: usize,
        source: &[Complex<T>],
        target_order: usize,
        target: &mut [Complex<T>],
        weights: &[Complex<T>],
    ) {
        let offset = source_order + target_order;
        for (j, tj) in target.iter_mut().enumerate() {
            // Index of W_{m - j} with both m and j shifted by their orders
            let base = offset + target_order - j;
            let mut sum = Complex::new(T::zero(), T::zero());
            for (m, sm) in source.iter().enumerate() {
                sum += *sm * weights[base + m - source_order];
            }
            *tj += sum;
        }
    }

    /// Derivative of a cylinder function along a target axis, from a table with `nmax >= |n| + 1`.
    fn target_functional(
        &self,
        table: &[Complex<T>],
        nmax: usize,
        n: i64,
        derivative: TargetDerivative,
    ) -> Complex<T> {
        let at = |n: i64| table[(n + nmax as i64) as usize];
        let half_k = T::real(0.5) * self.wavenumber;

        match derivative {
            TargetDerivative::Value => at(n),
            TargetDerivative::Axis(0) => (at(n - 1) - at(n + 1)) * half_k,
            TargetDerivative::Axis(_) => (at(n + 1) + at(n - 1)) * Complex::new(T::zero(), half_k),
        }
    }

    /// Value, or derivative along `-dipole`, of a cylinder function tabulated at `c - y` as a
    /// function of the source point `y`.
    fn source_functional(
        &self,
        table: &[Complex<T>],
        nmax: usize,
        n: i64,
        dipole: Option<[T; 2]>,
    ) -> Complex<T> {
        let at = |n: i64| table[(n + nmax as i64) as usize];
        match dipole {
            None => at(n),
            Some(normal) => {
                let nu = Complex::new(normal[0], normal[1]);
                let half_k = T::real(0.5) * self.wavenumber;
                -(nu * at(n - 1) - nu.conj() * at(n + 1)) * half_k
            }
        }
    }

    fn source_expansion(
        &self,
        order: usize,
        centre: &[T; 2],
        source: &PointSource<T>,
        coeffs: &mut [Complex<T>],
        cylinder: Cylinder,
    ) {
        let nmax = order + 1;
        let w = [
            centre[0] - source.position[0],
            centre[1] - source.position[1],
        ];
        let table = self.table(&w, nmax, cylinder);

        for (i, coeff) in coeffs.iter_mut().enumerate() {
            let n = i as i64 - order as i64;
            *coeff += source.strength * self.source_functional(&table, nmax, -n, source.dipole);
        }
    }

    fn evaluate_expansion(
        &self,
        order: usize,
        centre: &[T; 2],
        coeffs: &[Complex<T>],
        target: &[T; 2],
        derivative: TargetDerivative,
        cylinder: Cylinder,
    ) -> Complex<T> {
        let nmax = order + 1;
        let w = [target[0] - centre[0], target[1] - centre[1]];
        let table = self.table(&w, nmax, cylinder);

        coeffs
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let n = i as i64 - order as i64;
                *c * self.target_functional(&table, nmax, n, derivative)
            })
            .sum()
    }
}

impl<T> ExpansionKernel<T> for Helmholtz2d<T>
where
    T: RealScalar,
{
    fn ncoeffs(&self, order: usize) -> usize {
        2 * order + 1
    }

    fn scale(&self) -> Complex<T> {
        Complex::new(T::zero(), T::real(0.25))
    }

    fn is_laplace(&self) -> bool {
        false
    }

    fn p2m(&self, order: usize, centre: &[T; 2], source: &PointSource<T>, coeffs: &mut [Complex<T>]) {
        self.source_expansion(order, centre, source, coeffs, Cylinder::Regular)
    }

    fn p2l(&self, order: usize, centre: &[T; 2], source: &PointSource<T>, coeffs: &mut [Complex<T>]) {
        self.source_expansion(order, centre, source, coeffs, Cylinder::Singular)
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
        let displacement = [
            target_centre[0] - source_centre[0],
            target_centre[1] - source_centre[1],
        ];
        let weights = self.translation_weights(
            Translation::MultipoleToMultipole,
            source_order,
            target_order,
            &displacement,
        );
        Self::apply_translation(source_order, source, target_order, target, &weights)
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
        let displacement = [
            target_centre[0] - source_centre[0],
            target_centre[1] - source_centre[1],
        ];
        let weights = self.translation_weights(
            Translation::MultipoleToLocal,
            source_order,
            target_order,
            &displacement,
        );
        Self::apply_translation(source_order, source, target_order, target, &weights)
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
        let displacement = [
            target_centre[0] - source_centre[0],
            target_centre[1] - source_centre[1],
        ];
        let weights = self.translation_weights(
            Translation::LocalToLocal,
            source_order,
            target_order,
            &displacement,
        );
        Self::apply_translation(source_order, source, target_order, target, &weights)
    }

    fn m2p(
        &self,
        order: usize,
        centre: &[T; 2],
        coeffs: &[Complex<T>],
        target: &[T; 2],
        derivative: TargetDerivative,
    ) -> Complex<T> {
        self.evaluate_expansion(order, centre, coeffs, target, derivative, Cylinder::Singular)
    }

    fn l2p(
        &self,
        order: usize,
        centre: &[T; 2],
        coeffs: &[Complex<T>],
        target: &[T; 2],
        derivative: TargetDerivative,
    ) -> Complex<T> {
        self.evaluate_expansion(order, centre, coeffs, target, derivative, Cylinder::Regular)
    }

    fn p2p(
        &self,
        source: &PointSource<T>,
        target: &[T; 2],
        derivative: TargetDerivative,
    ) -> Complex<T> {
        let d = [
            target[0] - source.position[0],
            target[1] - source.position[1],
        ];
        let r = (d[0] * d[0] + d[1] * d[1]).sqrt();
        if r == T::zero() {
            return Complex::new(T::zero(), T::zero());
        }

        let k = self.wavenumber;
        let h = hankel_table(k * r, 1);
        let (h0, h1) = (h[0], h[1]);

        let value = match (source.dipole, derivative) {
            (None, TargetDerivative::Value) => h0,
            (None, TargetDerivative::Axis(axis)) => -h1 * (k * d[axis.min(1)] / r),
            (Some(nu), TargetDerivative::Value) => {
                h1 * (k * (nu[0] * d[0] + nu[1] * d[1]) / r)
            }
            (Some(nu), TargetDerivative::Axis(axis)) => {
                let axis = axis.min(1);
                let nu_dot_d = nu[0] * d[0] + nu[1] * d[1];
                let f = h1 * (k / r);
                let df = (h0 * (k * r) - h1 * T::real(2.0)) * (k / (r * r));
                df * (d[axis] / r * nu_dot_d) + f * nu[axis]
            }
        };

        source.strength * value
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
        let positions = points_fixture::<f64>(n, Some(-half_width), Some(half_width), Some(3));
        let strengths = points_fixture::<f64>(n, Some(-1.0), Some(1.0), Some(4));
        positions
            .iter()
            .zip(strengths.iter())
            .enumerate()
            .map(|(i, (p, s))| {
                let angle = 0.7 * i as f64;
                PointSource {
                    position: [centre[0] + p[0], centre[1] + p[1]],
                    strength: Complex::new(s[0], s[1]),
                    dipole: dipoles.then(|| [angle.cos(), angle.sin()]),
                }
            })
            .collect()
    }

    fn direct(
        kernel: &Helmholtz2d<f64>,
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
    fn test_invalid_wavenumber() {
        assert!(Helmholtz2d::new(0.0f64).is_err());
        assert!(Helmholtz2d::new(f64::NAN).is_err());
        assert!(Helmholtz2d::new(3.0f64).is_ok());
    }

    #[test]
    fn test_p2p_gradient() {
        let kernel = Helmholtz2d::new(3.0f64).unwrap();
        let h = 1e-6;

        for dipoles in [false, true] {
            let sources = sources_fixture(4, [0.0, 0.0], 0.3, dipoles);
            let target = [0.9, -0.6];

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
    }

    #[test]
    fn test_dipole_is_source_normal_derivative() {
        let kernel = Helmholtz2d::new(2.0f64).unwrap();
        let nu = [0.6, 0.8];
        let y = [0.1, 0.2];
        let x = [1.0, -0.4];
        let h = 1e-6;

        let monopole = |position: [f64; 2]| {
            kernel.p2p(
                &PointSource {
                    position,
                    strength: Complex::new(1.0, 0.0),
                    dipole: None,
                },
                &x,
                TargetDerivative::Value,
            )
        };

        let fd = (monopole([y[0] + h * nu[0], y[1] + h * nu[1]])
            - monopole([y[0] - h * nu[0], y[1] - h * nu[1]]))
            / (2.0 * h);

        let found = kernel.p2p(
            &PointSource {
                position: y,
                strength: Complex::new(1.0, 0.0),
                dipole: Some(nu),
            },
            &x,
            TargetDerivative::Value,
        );

        assert!(rel_error(found, fd) < 1e-6);
    }

    #[test]
    fn test_multipole_and_local() {
        let order = 20;
        let kernel = Helmholtz2d::new(2.0f64).unwrap();
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
        let kernel = Helmholtz2d::new(1.5f64).unwrap();
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
}
