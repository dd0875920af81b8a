//! Direct evaluation of layer potentials with QBX corrections.
//!
//! Every target associated with a center is evaluated from a local expansion about that center
//! formed from all sources, every other target by a direct sum over all sources. Cost grows as the
//! product of the number of sources and targets, so this path is meant for small problems and as a
//! reference for the FMM.
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    expansion::{ExpansionKernel, PointSource},
    fmm::types::Potentials,
    qbx::{
        geometry::GeometryData,
        instruction::{SourceDerivative, TargetDerivative},
        target_assoc::TargetState,
    },
    traits::general::RealScalar,
};

/// Point sources of a discretization.
pub(crate) fn point_sources<T>(
    geometry: &GeometryData<T>,
    source_derivative: SourceDerivative,
    strengths: &[Complex<T>],
) -> Vec<PointSource<T>>
where
    T: RealScalar,
{
    let discretization = geometry.discretization();
    discretization
        .nodes()
        .iter()
        .zip(discretization.normals())
        .zip(strengths)
        .map(|((&position, &normal), &strength)| PointSource {
            position,
            strength,
            dipole: match source_derivative {
                SourceDerivative::None => None,
                SourceDerivative::Normal => Some(normal),
            },
        })
        .collect()
}

/// Evaluate potentials at every target of a geometry without the FMM.
///
/// Returns the potentials of each target derivative in the geometry's combined target order,
/// scaled by the kernel's factor. Failed targets receive zeros.
///
/// # Arguments
/// * `geometry` - Geometry with target association.
/// * `kernel` - Expansions of the base kernel, supporting at least `qbx_order`.
/// * `source_derivative` - Source derivative shared by all kernels.
/// * `target_derivatives` - Target derivative of each output kernel.
/// * `qbx_order` - Order of the local expansions about centers.
/// * `strengths` - Source strengths in the discretization's order.
pub fn evaluate_direct<T>(
    geometry: &GeometryData<T>,
    kernel: &dyn ExpansionKernel<T>,
    source_derivative: SourceDerivative,
    target_derivatives: &[TargetDerivative],
    qbx_order: usize,
    strengths: &[Complex<T>],
) -> Vec<Vec<Complex<T>>>
where
    T: RealScalar,
{
    let nkernels = target_derivatives.len();
    if nkernels == 0 {
        return Vec::new();
    }

    let sources = point_sources(geometry, source_derivative, strengths);
    let centers = geometry.centers();
    let ncoeffs = kernel.ncoeffs(qbx_order);
    let global_qbx_centers = geometry.global_qbx_centers();

    log::debug!(
        "Direct evaluation: {} sources, {} targets, {} QBX centers",
        sources.len(),
        geometry.ntargets(),
        global_qbx_centers.len()
    );

    let locals = global_qbx_centers
        .par_iter()
        .map(|&center| {
            let mut coeffs = vec![Complex::new(T::zero(), T::zero()); ncoeffs];
            for source in sources.iter() {
                kernel.p2l(qbx_order, &centers.points()[center], source, &mut coeffs);
            }
            coeffs
        })
        .collect::<Vec<_>>();

    let targets = &geometry.target_info().targets;
    let mut potentials = Potentials::zeros(targets.len(), nkernels);

    potentials
        .values
        .par_chunks_exact_mut(nkernels)
        .zip(targets.par_iter())
        .enumerate()
        .for_each(|(itarget, (values, target))| {
            match geometry.target_to_center(itarget) {
                TargetState::Associated { center, .. } => {
                    // Centers in use are sorted, so their positions are found by bisection
                    if let Ok(position) = global_qbx_centers.binary_search(&center) {
                        for (value, &derivative) in values.iter_mut().zip(target_derivatives) {
                            *value += kernel.l2p(
                                qbx_order,
                                &centers.points()[center],
                                &locals[position],
                                target,
                                derivative,
                            );
                        }
                    }
                }
                TargetState::Unassociated => {
                    for (value, &derivative) in values.iter_mut().zip(target_derivatives) {
                        *value += sources
                            .iter()
                            .map(|source| kernel.p2p(source, target, derivative))
                            .fold(Complex::new(T::zero(), T::zero()), |acc, v| acc + v);
                    }
                }
                TargetState::Failed => {}
            }
        });

    potentials.into_kernel_major(kernel.scale(), None)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        discretization::Discretization,
        expansion::Laplace2d,
        qbx::{
            centers::ExpansionCenters,
            config::QbxConfigBuilder,
            geometry::TargetGroup,
            instruction::ForcedLimit,
        },
    };

    #[test]
    fn test_far_targets_use_direct_sum() {
        let discr = Arc::new(Discretization::<f64>::circle(64, 1.0, 4));
        let centers = Arc::new(ExpansionCenters::new(&discr, 0.5).unwrap());
        let config = QbxConfigBuilder::new()
            .qbx_order(6)
            .unwrap()
            .disable_fmm()
            .unwrap()
            .build()
            .unwrap();
        let targets = [[3.0, 0.5], [0.0, 0.1]];
        let groups = [TargetGroup {
            name: "points",
            points: &targets,
            is_self: false,
            forced_limit: ForcedLimit::Unforced,
        }];
        let geometry = GeometryData::new(discr.clone(), centers, &groups, &config).unwrap();

        let strengths = discr
            .weights()
            .iter()
            .map(|&w| Complex::new(w, 0.0))
            .collect::<Vec<_>>();
        let kernel = Laplace2d::new(6);
        let result = evaluate_direct(
            &geometry,
            &kernel,
            SourceDerivative::None,
            &[TargetDerivative::Value],
            6,
            &strengths,
        );

        // Single layer of a constant density on the unit circle: -log|x| outside, zero inside
        assert_relative_eq!(
            result[0][0].re,
            -(3.0f64.hypot(0.5)).ln(),
            epsilon = 1e-10
        );
        assert_relative_eq!(result[0][1].re, 0.0, epsilon = 1e-10);
    }
}
