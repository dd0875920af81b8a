//! FMM driver.
//!
//! Sequences the stages of a wrangler over one set of source strengths. The upward pass returns
//! [`Multipoles`] and the downward pass consumes them to produce [`Locals`], so no stage can read
//! expansions that an earlier phase has not finished.
use num_complex::Complex;

use crate::{
    fmm::{
        helpers::optionally_time,
        types::{BoxExpansions, Potentials, QbxExpansions},
    },
    traits::{
        general::RealScalar,
        types::{FmmOperatorTime, FmmOperatorType, QbxError},
        wrangler::ExpansionWrangler,
    },
};

/// Potentials computed by [`drive_fmm`].
#[derive(Clone, Debug)]
pub struct FmmOutput<T>
where
    T: RealScalar,
{
    /// Potentials of each output kernel, in the geometry's combined target order.
    pub potentials: Vec<Vec<Complex<T>>>,

    /// Wall time of each stage, empty unless timing was requested.
    pub operator_times: Vec<FmmOperatorTime>,
}

/// Multipole expansions after the upward pass.
struct Multipoles<T: RealScalar>(BoxExpansions<T>);

/// Local expansions after the downward pass.
struct Locals<T: RealScalar>(BoxExpansions<T>);

struct FmmRun<'w, T>
where
    T: RealScalar,
{
    wrangler: &'w dyn ExpansionWrangler<T>,
    timed: bool,
    operator_times: Vec<FmmOperatorTime>,
}

impl<T> FmmRun<'_, T>
where
    T: RealScalar,
{
    fn stage<F>(&mut self, operator: FmmOperatorType, f: F) -> Result<(), QbxError>
    where
        F: FnOnce(&dyn ExpansionWrangler<T>) -> Result<(), QbxError>,
    {
        let wrangler = self.wrangler;
        let (result, duration) = optionally_time(self.timed, || f(wrangler));

        result?;

        if let Some(d) = duration {
            self.operator_times
                .push(FmmOperatorTime::from_duration(operator, d));
        }

        log::debug!("Finished {operator:?}");

        Ok(())
    }

    fn evaluate_upward_pass(&mut self, strengths: &[Complex<T>]) -> Result<Multipoles<T>, QbxError> {
        let mut multipoles = self.wrangler.multipole_zeros();

        self.stage(FmmOperatorType::P2M, |w| w.p2m(strengths, &mut multipoles))?;

        for level in (1..=self.wrangler.depth()).rev() {
            self.stage(FmmOperatorType::M2M(level), |w| w.m2m(level, &mut multipoles))?;
        }

        Ok(Multipoles(multipoles))
    }

    fn evaluate_downward_pass(
        &mut self,
        strengths: &[Complex<T>],
        multipoles: &Multipoles<T>,
    ) -> Result<Locals<T>, QbxError> {
        let mut locals = self.wrangler.local_zeros();

        self.stage(FmmOperatorType::P2L, |w| w.p2l(strengths, &mut locals))?;

        for level in 0..=self.wrangler.depth() {
            if level > 0 {
                self.stage(FmmOperatorType::L2L(level), |w| w.l2l(level, &mut locals))?;
            }

            self.stage(FmmOperatorType::M2L(level), |w| {
                w.m2l(level, &multipoles.0, &mut locals)
            })?;
        }

        Ok(Locals(locals))
    }

    fn evaluate_leaf_targets(
        &mut self,
        strengths: &[Complex<T>],
        multipoles: &Multipoles<T>,
        locals: &Locals<T>,
    ) -> Result<Potentials<T>, QbxError> {
        let mut potentials = self.wrangler.output_zeros();

        self.stage(FmmOperatorType::P2P, |w| w.p2p(strengths, &mut potentials))?;
        self.stage(FmmOperatorType::M2P, |w| w.m2p(&multipoles.0, &mut potentials))?;
        self.stage(FmmOperatorType::L2P, |w| w.l2p(&locals.0, &mut potentials))?;

        Ok(potentials)
    }

    fn evaluate_qbx_targets(
        &mut self,
        strengths: &[Complex<T>],
        multipoles: &Multipoles<T>,
        locals: &Locals<T>,
    ) -> Result<Potentials<T>, QbxError> {
        let mut qbx: QbxExpansions<T> = self.wrangler.qbx_local_zeros();

        self.stage(FmmOperatorType::P2QBXL, |w| w.p2qbxl(strengths, &mut qbx))?;
        self.stage(FmmOperatorType::M2QBXL, |w| {
            w.m2qbxl(strengths, &multipoles.0, &mut qbx)
        })?;
        self.stage(FmmOperatorType::L2QBXL, |w| w.l2qbxl(&locals.0, &mut qbx))?;

        let mut potentials = self.wrangler.full_output_zeros();
        self.stage(FmmOperatorType::QBXL2P, |w| w.qbxl2p(&qbx, &mut potentials))?;

        Ok(potentials)
    }
}

/// Run the FMM with QBX stages.
///
/// The geometry bound to the wrangler must not contain failed targets.
///
/// # Arguments
/// * `wrangler` - Expansion wrangler of the geometry and kernel.
/// * `strengths` - Source strengths in the discretization's order.
/// * `timed` - Whether to record the wall time of each stage.
pub fn drive_fmm<T>(
    wrangler: &dyn ExpansionWrangler<T>,
    strengths: &[Complex<T>],
    timed: bool,
) -> Result<FmmOutput<T>, QbxError>
where
    T: RealScalar,
{
    log::info!(
        "Running FMM with the '{}' backend, depth {}",
        wrangler.backend().name(),
        wrangler.depth()
    );

    let strengths = wrangler.reorder_sources(strengths);

    let mut run = FmmRun {
        wrangler,
        timed,
        operator_times: Vec::new(),
    };

    let multipoles = run.evaluate_upward_pass(&strengths)?;
    let locals = run.evaluate_downward_pass(&strengths, &multipoles)?;
    let non_qbx = run.evaluate_leaf_targets(&strengths, &multipoles, &locals)?;
    let mut potentials = run.evaluate_qbx_targets(&strengths, &multipoles, &locals)?;

    wrangler.merge_non_qbx_potentials(&non_qbx, &mut potentials);

    Ok(FmmOutput {
        potentials: wrangler.finalize_potentials(potentials),
        operator_times: run.operator_times,
    })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        discretization::Discretization,
        expansion::expansion_kernel,
        fmm::{types::FmmBackend, wrangler::WranglerParameters},
        qbx::{
            centers::ExpansionCenters,
            config::QbxConfigBuilder,
            direct::evaluate_direct,
            geometry::{GeometryData, TargetGroup},
            instruction::{ForcedLimit, Kernel2d, SourceDerivative, TargetDerivative},
        },
        tree::helpers::points_fixture_annulus,
    };

    fn geometry_fixture(targets: &[[f64; 2]]) -> GeometryData<f64> {
        let discr = Arc::new(Discretization::<f64>::ellipse(600, 1.0, 0.6, 4));
        let centers = Arc::new(ExpansionCenters::new(&discr, 0.5).unwrap());
        let config = QbxConfigBuilder::new()
            .qbx_order(5)
            .unwrap()
            .fmm_order(20)
            .unwrap()
            .max_leaf_refine_weight(32)
            .unwrap()
            .build()
            .unwrap();

        let nodes = discr.nodes().to_vec();
        let groups = [
            TargetGroup {
                name: "self",
                points: &nodes,
                is_self: true,
                forced_limit: ForcedLimit::Exterior,
            },
            TargetGroup {
                name: "points",
                points: targets,
                is_self: false,
                forced_limit: ForcedLimit::Unforced,
            },
        ];
        GeometryData::new(discr, centers, &groups, &config).unwrap()
    }

    fn strengths_fixture(geometry: &GeometryData<f64>) -> Vec<Complex<f64>> {
        let discr = geometry.discretization();
        discr
            .nodes()
            .iter()
            .zip(discr.weights())
            .map(|(x, w)| Complex::new((3.0 * x[0]).cos() + x[1], x[0] * x[1]) * *w)
            .collect()
    }

    fn parameters(
        geometry: &GeometryData<f64>,
        kernel: Kernel2d,
        wavenumber: Option<f64>,
        source_derivative: SourceDerivative,
        fmm_order: usize,
    ) -> WranglerParameters<f64> {
        WranglerParameters {
            kernel,
            wavenumber,
            source_derivative,
            target_derivatives: vec![
                TargetDerivative::Value,
                TargetDerivative::Axis(0),
                TargetDerivative::Axis(1),
            ],
            fmm_orders: vec![fmm_order; geometry.tree().depth() as usize + 1],
            qbx_order: 5,
        }
    }

    fn max_rel_error(found: &[Vec<Complex<f64>>], expected: &[Vec<Complex<f64>>]) -> f64 {
        found
            .iter()
            .zip(expected.iter())
            .map(|(f, e)| {
                let scale = e.iter().map(|v| v.norm()).fold(0.0, f64::max);
                f.iter()
                    .zip(e.iter())
                    .map(|(a, b)| (a - b).norm() / scale)
                    .fold(0.0, f64::max)
            })
            .fold(0.0, f64::max)
    }

    fn check_against_direct(
        backend: FmmBackend,
        kernel: Kernel2d,
        wavenumber: Option<f64>,
        source_derivative: SourceDerivative,
        fmm_order: usize,
        tolerance: f64,
    ) {
        let targets = points_fixture_annulus::<f64>(300, 0.3, 2.0, 11);
        let geometry = geometry_fixture(&targets);
        assert!(geometry.tree().depth() >= 2);

        let strengths = strengths_fixture(&geometry);
        let parameters = parameters(
            &geometry,
            kernel.clone(),
            wavenumber,
            source_derivative,
            fmm_order,
        );

        let wrangler = backend.wrangler(&geometry, parameters.clone()).unwrap();
        let output = drive_fmm(wrangler.as_ref(), &strengths, false).unwrap();
        assert!(output.operator_times.is_empty());

        let expansions = expansion_kernel(&kernel, wavenumber, 20).unwrap();
        let expected = evaluate_direct(
            &geometry,
            expansions.as_ref(),
            source_derivative,
            &parameters.target_derivatives,
            parameters.qbx_order,
            &strengths,
        );

        assert_eq!(output.potentials.len(), 3);
        assert_eq!(output.potentials[0].len(), geometry.ntargets());
        let error = max_rel_error(&output.potentials, &expected);
        assert!(error < tolerance, "error {error}");
    }

    #[test]
    fn test_laplace_fmm_matches_direct() {
        check_against_direct(
            FmmBackend::Generic,
            Kernel2d::Laplace,
            None,
            SourceDerivative::None,
            20,
            1e-7,
        );
        check_against_direct(
            FmmBackend::Generic,
            Kernel2d::Laplace,
            None,
            SourceDerivative::Normal,
            20,
            1e-7,
        );
    }

    #[test]
    fn test_helmholtz_fmm_matches_direct() {
        for backend in [FmmBackend::Generic, FmmBackend::HelmholtzHost] {
            check_against_direct(
                backend,
                Kernel2d::helmholtz("k"),
                Some(3.0),
                SourceDerivative::None,
                20,
                1e-7,
            );
            check_against_direct(
                backend,
                Kernel2d::helmholtz("k"),
                Some(3.0),
                SourceDerivative::Normal,
                20,
                1e-7,
            );
        }
    }

    #[test]
    fn test_high_order_fmm_matches_direct() {
        // At high FMM order only the QBX truncation remains, and it is shared by both paths
        for derivative in [SourceDerivative::None, SourceDerivative::Normal] {
            check_against_direct(
                FmmBackend::Generic,
                Kernel2d::Laplace,
                None,
                derivative,
                40,
                1e-12,
            );
            for backend in [FmmBackend::Generic, FmmBackend::HelmholtzHost] {
                check_against_direct(
                    backend,
                    Kernel2d::helmholtz("k"),
                    Some(3.0),
                    derivative,
                    40,
                    1e-12,
                );
            }
        }
    }

    #[test]
    fn test_backends_agree() {
        let targets = points_fixture_annulus::<f64>(200, 0.5, 1.5, 5);
        let geometry = geometry_fixture(&targets);
        let strengths = strengths_fixture(&geometry);

        let run = |backend: FmmBackend| {
            let parameters = parameters(
                &geometry,
                Kernel2d::helmholtz("k"),
                Some(2.0),
                SourceDerivative::Normal,
                20,
            );
            let wrangler = backend.wrangler(&geometry, parameters).unwrap();
            drive_fmm(wrangler.as_ref(), &strengths, false).unwrap()
        };

        let generic = run(FmmBackend::Generic);
        let host = run(FmmBackend::HelmholtzHost);
        assert!(max_rel_error(&host.potentials, &generic.potentials) < 1e-10);
    }

    #[test]
    fn test_timed_stages() {
        let targets = points_fixture_annulus::<f64>(50, 0.5, 1.5, 5);
        let geometry = geometry_fixture(&targets);
        let strengths = strengths_fixture(&geometry);
        let depth = geometry.tree().depth();

        let parameters = parameters(&geometry, Kernel2d::Laplace, None, SourceDerivative::None, 20);
        let wrangler = FmmBackend::Generic.wrangler(&geometry, parameters).unwrap();
        let output = drive_fmm(wrangler.as_ref(), &strengths, true).unwrap();

        let operators = output
            .operator_times
            .iter()
            .map(|t| t.operator)
            .collect::<Vec<_>>();

        // P2M, M2M per level, P2L, M2L per level, L2L per level, 3 leaf and 4 QBX stages
        assert_eq!(operators.len(), 1 + depth as usize + 1 + 2 * depth as usize + 1 + 3 + 4);
        assert_eq!(operators[0], FmmOperatorType::P2M);
        assert_eq!(operators[1], FmmOperatorType::M2M(depth));
        assert_eq!(*operators.last().unwrap(), FmmOperatorType::QBXL2P);

        // Every local translation of a level follows the L2L of the same level
        for level in 1..=depth {
            let l2l = operators
                .iter()
                .position(|o| *o == FmmOperatorType::L2L(level))
                .unwrap();
            let m2l = operators
                .iter()
                .position(|o| *o == FmmOperatorType::M2L(level))
                .unwrap();
            assert!(l2l < m2l);
        }
    }

    #[test]
    fn test_deterministic() {
        let targets = points_fixture_annulus::<f64>(100, 0.5, 1.5, 5);
        let geometry = geometry_fixture(&targets);
        let strengths = strengths_fixture(&geometry);
        let parameters = parameters(&geometry, Kernel2d::Laplace, None, SourceDerivative::None, 20);

        let wrangler = FmmBackend::Generic.wrangler(&geometry, parameters).unwrap();
        let a = drive_fmm(wrangler.as_ref(), &strengths, false).unwrap();
        let b = drive_fmm(wrangler.as_ref(), &strengths, false).unwrap();
        assert_eq!(a.potentials, b.potentials);
    }
}
