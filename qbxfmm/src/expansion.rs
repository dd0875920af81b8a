//! # Analytic expansions of two dimensional kernels
//!
//! Multipole and local expansions, and the translations between them, for the Laplace kernel
//! (as real parts of complex analytic series) and for the Helmholtz kernel (via Graf's addition
//! theorem). All expansions are unscaled: the kernel's scale factor, see [`ExpansionKernel::scale`],
//! is applied once to accumulated potentials.
use num_complex::Complex;

use crate::{
    qbx::instruction::{Kernel2d, TargetDerivative},
    traits::{general::RealScalar, types::QbxError},
};

pub mod helmholtz;
pub mod laplace;
pub mod special;

pub use helmholtz::Helmholtz2d;
pub use laplace::Laplace2d;

/// A weighted point source, a monopole or a dipole.
#[derive(Clone, Copy, Debug)]
pub struct PointSource<T>
where
    T: RealScalar,
{
    /// Position of the source.
    pub position: [T; 2],

    /// Strength, the density times the quadrature weight.
    pub strength: Complex<T>,

    /// Unit dipole direction, `None` for a monopole.
    pub dipole: Option<[T; 2]>,
}

/// Expansion and translation operators of a kernel.
///
/// Coefficients are stored as flat slices of length [`ExpansionKernel::ncoeffs`], every operator
/// accumulates into its output.
pub trait ExpansionKernel<T>: Send + Sync
where
    T: RealScalar,
{
    /// Number of coefficients of an expansion of a given order.
    fn ncoeffs(&self, order: usize) -> usize;

    /// Factor relating unscaled evaluations to the kernel.
    fn scale(&self) -> Complex<T>;

    /// Whether this is an expansion of the Laplace kernel.
    fn is_laplace(&self) -> bool;

    /// Particle to multipole.
    fn p2m(&self, order: usize, centre: &[T; 2], source: &PointSource<T>, coeffs: &mut [Complex<T>]);

    /// Particle to local.
    fn p2l(&self, order: usize, centre: &[T; 2], source: &PointSource<T>, coeffs: &mut [Complex<T>]);

    /// Re-centre a multipole expansion about a parent centre.
    fn m2m(
        &self,
        source_order: usize,
        source_centre: &[T; 2],
        source: &[Complex<T>],
        target_order: usize,
        target_centre: &[T; 2],
        target: &mut [Complex<T>],
    );

    /// Convert a multipole expansion into a local expansion about a distant centre.
    fn m2l(
        &self,
        source_order: usize,
        source_centre: &[T; 2],
        source: &[Complex<T>],
        target_order: usize,
        target_centre: &[T; 2],
        target: &mut [Complex<T>],
    );

    /// Re-centre a local expansion about a child centre.
    fn l2l(
        &self,
        source_order: usize,
        source_centre: &[T; 2],
        source: &[Complex<T>],
        target_order: usize,
        target_centre: &[T; 2],
        target: &mut [Complex<T>],
    );

    /// Evaluate a multipole expansion.
    fn m2p(
        &self,
        order: usize,
        centre: &[T; 2],
        coeffs: &[Complex<T>],
        target: &[T; 2],
        derivative: TargetDerivative,
    ) -> Complex<T>;

    /// Evaluate a local expansion.
    fn l2p(
        &self,
        order: usize,
        centre: &[T; 2],
        coeffs: &[Complex<T>],
        target: &[T; 2],
        derivative: TargetDerivative,
    ) -> Complex<T>;

    /// Evaluate a point source directly, coincident points contribute nothing.
    fn p2p(&self, source: &PointSource<T>, target: &[T; 2], derivative: TargetDerivative)
        -> Complex<T>;
}

/// Construct the expansions of a kernel.
///
/// # Arguments
/// * `kernel` - The base kernel.
/// * `wavenumber` - Helmholtz wave number, required for Helmholtz kernels.
/// * `max_order` - Largest expansion order that will be requested.
pub fn expansion_kernel<T: RealScalar>(
    kernel: &Kernel2d,
    wavenumber: Option<T>,
    max_order: usize,
) -> Result<Box<dyn ExpansionKernel<T>>, QbxError> {
    match kernel {
        Kernel2d::Laplace => Ok(Box::new(Laplace2d::new(max_order))),
        Kernel2d::Helmholtz { k_name } => {
            let wavenumber = wavenumber.ok_or_else(|| {
                QbxError::InvalidInput(format!("Missing wave number argument '{k_name}'"))
            })?;
            Ok(Box::new(Helmholtz2d::new(wavenumber)?))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_expansion_kernel_factory() {
        let laplace = expansion_kernel::<f64>(&Kernel2d::Laplace, None, 10).unwrap();
        assert!(laplace.is_laplace());
        assert_eq!(laplace.ncoeffs(10), 22);

        let helmholtz = expansion_kernel::<f64>(
            &Kernel2d::Helmholtz {
                k_name: "k".to_string(),
            },
            Some(2.0),
            10,
        )
        .unwrap();
        assert!(!helmholtz.is_laplace());
        assert_eq!(helmholtz.ncoeffs(10), 21);

        let missing = expansion_kernel::<f64>(
            &Kernel2d::Helmholtz {
                k_name: "k".to_string(),
            },
            None,
            10,
        );
        assert!(matches!(missing, Err(QbxError::InvalidInput(_))));
    }
}
