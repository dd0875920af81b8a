//! Construction of expansion wranglers from a backend tag.
use crate::{
    expansion::{Helmholtz2d, Laplace2d},
    fmm::types::FmmBackend,
    qbx::{
        geometry::GeometryData,
        instruction::{Kernel2d, SourceDerivative, TargetDerivative},
    },
    traits::{general::RealScalar, types::QbxError, wrangler::ExpansionWrangler},
};

pub mod generic;
pub mod helmholtz_host;

pub use generic::GenericWrangler;
pub use helmholtz_host::HelmholtzHostWrangler;

/// Kernel and expansion orders a wrangler is built for.
#[derive(Clone, Debug)]
pub struct WranglerParameters<T>
where
    T: RealScalar,
{
    /// Base kernel.
    pub kernel: Kernel2d,

    /// Helmholtz wave number, `None` for Laplace.
    pub wavenumber: Option<T>,

    /// Source derivative shared by every output kernel.
    pub source_derivative: SourceDerivative,

    /// Target derivative of each output kernel.
    pub target_derivatives: Vec<TargetDerivative>,

    /// FMM expansion order of each tree level.
    pub fmm_orders: Vec<usize>,

    /// Order of the QBX local expansions.
    pub qbx_order: usize,
}

fn wavenumber<T: RealScalar>(parameters: &WranglerParameters<T>) -> Result<T, QbxError> {
    match &parameters.kernel {
        Kernel2d::Helmholtz { k_name } => parameters.wavenumber.ok_or_else(|| {
            QbxError::InvalidInput(format!("Missing wave number argument '{k_name}'"))
        }),
        Kernel2d::Laplace => Err(QbxError::InvalidInput(
            "Laplace kernels have no wave number".to_string(),
        )),
    }
}

impl FmmBackend {
    /// Construct the wrangler of this backend for a geometry and kernel.
    ///
    /// # Arguments
    /// * `geometry` - Geometry the wrangler operates on.
    /// * `parameters` - Kernel and expansion orders, with one FMM order per tree level.
    pub fn wrangler<'a, T>(
        &self,
        geometry: &'a GeometryData<T>,
        parameters: WranglerParameters<T>,
    ) -> Result<Box<dyn ExpansionWrangler<T> + 'a>, QbxError>
    where
        T: RealScalar,
    {
        let nlevels = geometry.tree().depth() as usize + 1;
        if parameters.fmm_orders.len() != nlevels {
            return Err(QbxError::InvalidInput(format!(
                "{} FMM orders supplied for a tree with {} levels",
                parameters.fmm_orders.len(),
                nlevels
            )));
        }

        log::debug!(
            "Selected '{}' wrangler for {:?}, FMM orders {:?}, QBX order {}",
            self.name(),
            parameters.kernel,
            parameters.fmm_orders,
            parameters.qbx_order
        );

        match (self, &parameters.kernel) {
            (FmmBackend::Generic, Kernel2d::Laplace) => {
                let max_order = parameters
                    .fmm_orders
                    .iter()
                    .copied()
                    .chain(std::iter::once(parameters.qbx_order))
                    .max()
                    .unwrap_or(parameters.qbx_order);
                Ok(Box::new(GenericWrangler::new(
                    geometry,
                    Laplace2d::new(max_order),
                    parameters,
                )))
            }
            (FmmBackend::Generic, Kernel2d::Helmholtz { .. }) => {
                let kernel = Helmholtz2d::new(wavenumber(&parameters)?)?;
                Ok(Box::new(GenericWrangler::new(geometry, kernel, parameters)))
            }
            (FmmBackend::HelmholtzHost, Kernel2d::Helmholtz { .. }) => {
                let kernel = Helmholtz2d::new(wavenumber(&parameters)?)?;
                Ok(Box::new(HelmholtzHostWrangler::new(
                    geometry, kernel, parameters,
                )?))
            }
            (FmmBackend::HelmholtzHost, Kernel2d::Laplace) => Err(QbxError::UnsupportedKernel {
                backend: self.name().to_string(),
                reason: "only Helmholtz kernels are supported".to_string(),
            }),
        }
    }
}
