//! QBX layer potential sources and the dispatch of evaluation requests.
//!
//! A [`GeometryCollection`] names sources and target point sets. Evaluating a
//! [`ComputePotentialInstruction`] groups its outputs by target set and side, builds (or reuses) the
//! geometry of the source against those groups, checks that every target that needs a QBX center
//! has one, and runs the FMM or the direct evaluator once for all outputs.
use std::{collections::HashMap, sync::Arc};

use num_complex::Complex;

use crate::{
    discretization::{Discretization, PointTargets},
    expansion::expansion_kernel,
    fmm::{driver::drive_fmm, wrangler::WranglerParameters},
    qbx::{
        centers::ExpansionCenters,
        config::{QbxConfig, QbxConfigOverrides},
        cost::ModeledCost,
        direct::evaluate_direct,
        geometry::{GeometryCache, GeometryData, GeometryKey, TargetGroup},
        instruction::{ComputePotentialInstruction, ForcedLimit},
    },
    traits::{
        general::RealScalar,
        types::{FmmOperatorTime, QbxError},
    },
};

/// How an evaluation request is carried out once its geometry is built.
pub enum EvaluationDriver<'a, T>
where
    T: RealScalar,
{
    /// Evaluate the potentials, optionally recording the wall time of every FMM stage.
    Execute {
        /// Whether to record stage timings.
        timed: bool,
    },

    /// Model the operation counts of the evaluation, all outputs are zero.
    CostModel,

    /// Pass the geometry to a hook, which may veto the evaluation by returning `false`. A vetoed
    /// evaluation returns zeros for every output.
    Inspect(&'a (dyn Fn(&GeometryData<T>) -> bool + Sync)),
}

impl<T> Default for EvaluationDriver<'_, T>
where
    T: RealScalar,
{
    fn default() -> Self {
        EvaluationDriver::Execute { timed: false }
    }
}

/// Data returned alongside the potentials of an evaluation.
#[derive(Clone, Debug, Default)]
pub enum EvaluationExtra {
    /// Nothing.
    #[default]
    None,

    /// Wall time of each FMM stage.
    Timings(Vec<FmmOperatorTime>),

    /// Modeled operation counts.
    Cost(ModeledCost),
}

/// Named outputs of an evaluation, in the order requested.
#[derive(Clone, Debug)]
pub struct EvaluationResult<T>
where
    T: RealScalar,
{
    /// Output names with their potentials, one value per target.
    pub outputs: Vec<(String, Vec<Complex<T>>)>,

    /// Timings or modeled cost, depending on the driver.
    pub extra: EvaluationExtra,
}

impl<T> EvaluationResult<T>
where
    T: RealScalar,
{
    /// Potentials of a named output.
    pub fn output(&self, name: &str) -> Option<&[Complex<T>]> {
        self.outputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }
}

/// A curve discretization equipped with expansion centers, on which layer potentials are evaluated
/// by QBX.
pub struct QbxLayerPotentialSource<T>
where
    T: RealScalar,
{
    discretization: Arc<Discretization<T>>,
    centers: Arc<ExpansionCenters<T>>,
    config: QbxConfig<T>,
    refined_for_global_qbx: bool,
    geometries: GeometryCache<T>,
}

impl<T> QbxLayerPotentialSource<T>
where
    T: RealScalar,
{
    /// Constructor, places the expansion centers.
    ///
    /// # Arguments
    /// * `discretization` - The source curve.
    /// * `config` - Expansion orders, tree and association parameters.
    pub fn new(discretization: Arc<Discretization<T>>, config: QbxConfig<T>) -> Result<Self, QbxError> {
        let centers = Arc::new(ExpansionCenters::new(
            &discretization,
            config.expansion_radius_factor(),
        )?);

        Ok(Self {
            discretization,
            centers,
            config,
            refined_for_global_qbx: false,
            geometries: GeometryCache::default(),
        })
    }

    /// Mark whether the discretization has been refined so that its expansion discs are well
    /// separated from the rest of the curve.
    pub fn refined_for_global_qbx(mut self, refined: bool) -> Self {
        self.refined_for_global_qbx = refined;
        self
    }

    /// A source on the same discretization with some configuration fields replaced. Geometry of
    /// the original source is not shared.
    pub fn copy_with(&self, overrides: QbxConfigOverrides<T>) -> Result<Self, QbxError> {
        let config = self.config.copy_with(overrides)?;
        Ok(Self::new(self.discretization.clone(), config)?
            .refined_for_global_qbx(self.refined_for_global_qbx))
    }

    /// The source discretization.
    pub fn discretization(&self) -> &Arc<Discretization<T>> {
        &self.discretization
    }

    /// Expansion centers of the source.
    pub fn centers(&self) -> &ExpansionCenters<T> {
        &self.centers
    }

    /// Configuration of the source.
    pub fn config(&self) -> &QbxConfig<T> {
        &self.config
    }

    /// Number of geometries built so far.
    pub fn ncached_geometries(&self) -> usize {
        self.geometries.len()
    }

    /// Geometry of this source against a list of target groups, built once per distinct list.
    pub fn geometry_for(
        &self,
        groups: &[TargetGroup<'_, T>],
    ) -> Result<Arc<GeometryData<T>>, QbxError> {
        self.geometries.get_or_build(GeometryKey::new(groups), || {
            GeometryData::new(
                self.discretization.clone(),
                self.centers.clone(),
                groups,
                &self.config,
            )
        })
    }

    /// Check that no target lacks a required center.
    fn check_association(
        &self,
        geometry: &GeometryData<T>,
        groups: &[TargetGroup<'_, T>],
    ) -> Result<(), QbxError> {
        let failed = geometry.failed_targets();
        if let Some(&first) = failed.first() {
            let (group, info) = groups
                .iter()
                .zip(geometry.groups())
                .find(|(_, info)| info.range.contains(&first))
                .ok_or_else(|| {
                    QbxError::InvalidInput(format!("Failed target {first} lies in no target group"))
                })?;
            return Err(QbxError::AssociationFailure {
                geometry: group.name.to_string(),
                n_failed: failed.len(),
                first_failed: first - info.range.start,
            });
        }

        for (igroup, (group, info)) in groups.iter().zip(geometry.groups()).enumerate() {
            if let Some(side) = info.forced_limit.side() {
                let n_associated = geometry.n_associated(igroup);
                let n_targets = info.range.len();
                if n_associated < n_targets {
                    return Err(QbxError::ForcedLimitUnsatisfiable {
                        geometry: group.name.to_string(),
                        side,
                        n_associated,
                        n_targets,
                    });
                }
            }
        }

        Ok(())
    }

    /// Potentials of every kernel at every target of a geometry, `None` when nothing was evaluated.
    fn compute_potentials(
        &self,
        insn: &ComputePotentialInstruction<T>,
        geometry: &GeometryData<T>,
        driver: &EvaluationDriver<'_, T>,
    ) -> Result<(Option<Vec<Vec<Complex<T>>>>, EvaluationExtra), QbxError> {
        let backend = self.config.fmm_backend();
        let (kernel, source_derivative) = insn.common_kernel(backend)?;
        let wavenumber = insn.wavenumber(&kernel)?;
        let target_derivatives = insn.target_derivatives();
        let fmm_orders = self.config.fmm_order().orders(&kernel, geometry.tree().depth());

        let timed = match driver {
            EvaluationDriver::Execute { timed } => *timed,
            EvaluationDriver::CostModel => {
                let cost = match fmm_orders {
                    Some(_) => ModeledCost::fmm(geometry),
                    None => ModeledCost::direct(geometry),
                };
                log::info!("Modeled cost: {} interactions", cost.total());
                return Ok((None, EvaluationExtra::Cost(cost)));
            }
            EvaluationDriver::Inspect(inspect) => {
                if !inspect(geometry) {
                    log::info!("Evaluation vetoed by geometry inspection");
                    return Ok((None, EvaluationExtra::None));
                }
                false
            }
        };

        let strengths = insn
            .density
            .iter()
            .zip(self.discretization.weights())
            .map(|(&sigma, &w)| sigma * w)
            .collect::<Vec<_>>();

        match fmm_orders {
            Some(fmm_orders) => {
                let parameters = WranglerParameters {
                    kernel,
                    wavenumber,
                    source_derivative,
                    target_derivatives,
                    fmm_orders,
                    qbx_order: self.config.qbx_order(),
                };
                let wrangler = backend.wrangler(geometry, parameters)?;
                let output = drive_fmm(wrangler.as_ref(), &strengths, timed)?;

                let extra = if timed {
                    EvaluationExtra::Timings(output.operator_times)
                } else {
                    EvaluationExtra::None
                };
                Ok((Some(output.potentials), extra))
            }
            None => {
                if timed {
                    log::warn!("Timing data collection is not supported without the FMM");
                }

                let qbx_order = self.config.qbx_order();
                let expansions = expansion_kernel(&kernel, wavenumber, qbx_order)?;
                let potentials = evaluate_direct(
                    geometry,
                    expansions.as_ref(),
                    source_derivative,
                    &target_derivatives,
                    qbx_order,
                    &strengths,
                );
                Ok((Some(potentials), EvaluationExtra::None))
            }
        }
    }
}

/// A named place: a layer potential source, or a set of target points.
pub enum Place<T>
where
    T: RealScalar,
{
    /// A QBX layer potential source, usable as source and as target.
    Source(Arc<QbxLayerPotentialSource<T>>),

    /// Target points.
    Targets(Arc<PointTargets<T>>),
}

impl<T> Place<T>
where
    T: RealScalar,
{
    fn points(&self) -> &[[T; 2]] {
        match self {
            Place::Source(source) => source.discretization().nodes(),
            Place::Targets(targets) => targets.points(),
        }
    }
}

/// Named sources and targets that evaluation requests refer to.
#[derive(Default)]
pub struct GeometryCollection<T>
where
    T: RealScalar,
{
    places: HashMap<String, Place<T>>,
}

impl<T> GeometryCollection<T>
where
    T: RealScalar,
{
    /// Constructor.
    pub fn new() -> Self {
        Self {
            places: HashMap::new(),
        }
    }

    /// Register a layer potential source, replacing any place of the same name.
    pub fn add_source(&mut self, name: &str, source: Arc<QbxLayerPotentialSource<T>>) {
        self.places.insert(name.to_string(), Place::Source(source));
    }

    /// Register target points, replacing any place of the same name.
    pub fn add_targets(&mut self, name: &str, targets: PointTargets<T>) {
        self.places
            .insert(name.to_string(), Place::Targets(Arc::new(targets)));
    }

    /// A place by name.
    pub fn get(&self, name: &str) -> Option<&Place<T>> {
        self.places.get(name)
    }

    /// A source by name.
    pub fn source(&self, name: &str) -> Result<&Arc<QbxLayerPotentialSource<T>>, QbxError> {
        match self.places.get(name) {
            Some(Place::Source(source)) => Ok(source),
            Some(Place::Targets(_)) => Err(QbxError::InvalidInput(format!(
                "Geometry '{name}' holds target points and cannot act as a source"
            ))),
            None => Err(QbxError::UnknownGeometry(name.to_string())),
        }
    }

    /// Evaluate the outputs of an instruction.
    ///
    /// Outputs on the same target set and side share one target group. Targets on the source
    /// itself requested without a side, or with the average, are evaluated from both sides and
    /// averaged.
    ///
    /// # Arguments
    /// * `insn` - The evaluation request.
    /// * `driver` - How to carry out the evaluation.
    pub fn evaluate(
        &self,
        insn: &ComputePotentialInstruction<T>,
        driver: &EvaluationDriver<'_, T>,
    ) -> Result<EvaluationResult<T>, QbxError> {
        let source = self.source(&insn.source_name)?;

        if insn.density.len() != source.discretization().ndofs() {
            return Err(QbxError::InvalidInput(format!(
                "Density has {} entries, source '{}' has {} degrees of freedom",
                insn.density.len(),
                insn.source_name,
                source.discretization().ndofs()
            )));
        }

        // Kernel errors surface before any geometry work
        insn.common_kernel(source.config().fmm_backend())?;

        if !source.refined_for_global_qbx {
            log::warn!("Executing global QBX without refinement, this is unlikely to work");
        }

        // Target groups per output, deduplicated by target name and side
        let mut group_keys: Vec<(&str, ForcedLimit)> = Vec::new();
        let mut output_groups = Vec::with_capacity(insn.outputs.len());
        for output in insn.outputs.iter() {
            let is_self = output.target_name == insn.source_name;
            let limits = match (is_self, output.forced_limit) {
                (true, ForcedLimit::Unforced | ForcedLimit::Average) => {
                    vec![ForcedLimit::Interior, ForcedLimit::Exterior]
                }
                (false, ForcedLimit::Unforced | ForcedLimit::Average) => vec![ForcedLimit::Unforced],
                (_, limit) => vec![limit],
            };

            let indices = limits
                .into_iter()
                .map(|limit| {
                    let key = (output.target_name.as_str(), limit);
                    match group_keys.iter().position(|k| *k == key) {
                        Some(i) => i,
                        None => {
                            group_keys.push(key);
                            group_keys.len() - 1
                        }
                    }
                })
                .collect::<Vec<_>>();
            output_groups.push(indices);
        }

        let groups = group_keys
            .iter()
            .map(|&(name, forced_limit)| {
                let place = self
                    .places
                    .get(name)
                    .ok_or_else(|| QbxError::UnknownGeometry(name.to_string()))?;
                Ok(TargetGroup {
                    name,
                    points: place.points(),
                    is_self: name == insn.source_name,
                    forced_limit,
                })
            })
            .collect::<Result<Vec<_>, QbxError>>()?;

        log::info!(
            "Evaluating {} output(s) of '{}' on {} target group(s)",
            insn.outputs.len(),
            insn.source_name,
            groups.len()
        );

        let geometry = source.geometry_for(&groups)?;
        source.check_association(&geometry, &groups)?;

        let (potentials, extra) = source.compute_potentials(insn, &geometry, driver)?;

        let zero = Complex::new(T::zero(), T::zero());
        let outputs = insn
            .outputs
            .iter()
            .zip(output_groups.iter())
            .map(|(output, indices)| {
                let len = geometry.groups()[indices[0]].range.len();
                let values = match &potentials {
                    None => vec![zero; len],
                    Some(potentials) => {
                        let kernel = &potentials[output.kernel_index];
                        let mut values = vec![zero; len];
                        for &i in indices.iter() {
                            let range = geometry.groups()[i].range.clone();
                            for (v, p) in values.iter_mut().zip(kernel[range].iter()) {
                                *v += *p;
                            }
                        }
                        let count = T::real(indices.len() as f64);
                        values.iter_mut().for_each(|v| *v = *v / count);
                        values
                    }
                };
                (output.name.clone(), values)
            })
            .collect();

        Ok(EvaluationResult { outputs, extra })
    }
}
