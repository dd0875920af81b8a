//! Configuration of a QBX layer potential source.
//!
//! A [`QbxConfig`] is built once through [`QbxConfigBuilder`] and never mutated. Variants of a
//! configuration are derived with [`QbxConfig::copy_with`], which names every field so none is
//! silently reset.
use std::{fmt, sync::Arc};

use crate::{
    fmm::{
        constants::{DEFAULT_EXPANSION_RADIUS_FACTOR, DEFAULT_TARGET_ASSOCIATION_TOLERANCE_EPS},
        types::FmmBackend,
    },
    qbx::instruction::Kernel2d,
    traits::{general::RealScalar, types::QbxError},
    tree::constants::{
        DEFAULT_EXPANSION_STICK_OUT_FACTOR, DEFAULT_MAX_LEAF_REFINE_WEIGHT,
        DEFAULT_WELL_SEP_IS_N_AWAY,
    },
};

pub use crate::tree::types::TreeKind;

/// Callback choosing the FMM expansion order of a tree level for a kernel.
pub type LevelToOrder = Arc<dyn Fn(&Kernel2d, u64) -> usize + Send + Sync>;

/// Expansion order of the FMM, or its absence.
#[derive(Clone)]
pub enum FmmOrder {
    /// Evaluate without the FMM.
    Disabled,

    /// One order on every level.
    Fixed(usize),

    /// Order chosen per kernel and level.
    PerLevel(LevelToOrder),
}

impl fmt::Debug for FmmOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FmmOrder::Disabled => write!(f, "Disabled"),
            FmmOrder::Fixed(order) => write!(f, "Fixed({order})"),
            FmmOrder::PerLevel(_) => write!(f, "PerLevel(..)"),
        }
    }
}

impl FmmOrder {
    /// Expansion order of each level `0..=depth`, `None` when the FMM is disabled.
    pub fn orders(&self, kernel: &Kernel2d, depth: u64) -> Option<Vec<usize>> {
        match self {
            FmmOrder::Disabled => None,
            FmmOrder::Fixed(order) => Some(vec![*order; depth as usize + 1]),
            FmmOrder::PerLevel(f) => Some((0..=depth).map(|level| f(kernel, level)).collect()),
        }
    }

    /// Whether the FMM is disabled.
    pub fn is_disabled(&self) -> bool {
        matches!(self, FmmOrder::Disabled)
    }
}

/// Immutable configuration of a QBX layer potential source.
#[derive(Clone, Debug)]
pub struct QbxConfig<T>
where
    T: RealScalar,
{
    qbx_order: usize,
    fmm_order: FmmOrder,
    fmm_backend: FmmBackend,
    target_association_tolerance: T,
    expansion_radius_factor: T,
    expansion_stick_out_factor: T,
    well_sep_is_n_away: u64,
    max_leaf_refine_weight: usize,
    tree_kind: TreeKind,
}

/// Fields to replace when deriving a configuration, `None` keeps the current value.
#[derive(Clone, Debug)]
pub struct QbxConfigOverrides<T>
where
    T: RealScalar,
{
    /// Order of the QBX local expansions.
    pub qbx_order: Option<usize>,

    /// FMM expansion order.
    pub fmm_order: Option<FmmOrder>,

    /// Expansion backend.
    pub fmm_backend: Option<FmmBackend>,

    /// Relative slack on center radii during target association.
    pub target_association_tolerance: Option<T>,

    /// Expansion radius as a fraction of the element size.
    pub expansion_radius_factor: Option<T>,

    /// Largest center radius relative to the side of its leaf box.
    pub expansion_stick_out_factor: Option<T>,

    /// Separation of well separated boxes, in boxes.
    pub well_sep_is_n_away: Option<u64>,

    /// Largest number of particles in an adaptive leaf.
    pub max_leaf_refine_weight: Option<usize>,

    /// Quadtree refinement strategy.
    pub tree_kind: Option<TreeKind>,
}

impl<T> Default for QbxConfigOverrides<T>
where
    T: RealScalar,
{
    fn default() -> Self {
        Self {
            qbx_order: None,
            fmm_order: None,
            fmm_backend: None,
            target_association_tolerance: None,
            expansion_radius_factor: None,
            expansion_stick_out_factor: None,
            well_sep_is_n_away: None,
            max_leaf_refine_weight: None,
            tree_kind: None,
        }
    }
}

/// Builder for a [`QbxConfig`].
#[derive(Clone)]
pub struct QbxConfigBuilder<T>
where
    T: RealScalar,
{
    qbx_order: Option<usize>,
    fmm_order: Option<usize>,
    fmm_level_to_order: Option<LevelToOrder>,
    disable_fmm: Option<bool>,
    fmm_backend: Option<FmmBackend>,
    target_association_tolerance: Option<T>,
    expansion_radius_factor: Option<T>,
    expansion_stick_out_factor: Option<T>,
    well_sep_is_n_away: Option<u64>,
    max_leaf_refine_weight: Option<usize>,
    tree_kind: Option<TreeKind>,
}

fn positive<T: RealScalar>(name: &str, value: T) -> Result<T, QbxError> {
    if value.is_finite() && value > T::zero() {
        Ok(value)
    } else {
        Err(QbxError::InvalidInput(format!(
            "`{name}` must be positive and finite, found {value:?}"
        )))
    }
}

impl<T> QbxConfig<T>
where
    T: RealScalar,
{
    fn validated(self) -> Result<Self, QbxError> {
        if let (FmmBackend::HelmholtzHost, FmmOrder::PerLevel(_)) =
            (self.fmm_backend, &self.fmm_order)
        {
            return Err(QbxError::ConfigurationConflict(format!(
                "the '{}' backend requires a fixed `fmm_order`, not a `fmm_level_to_order` callback",
                self.fmm_backend.name()
            )));
        }

        if let FmmOrder::Fixed(0) = self.fmm_order {
            return Err(QbxError::InvalidInput(
                "`fmm_order` must be at least one".to_string(),
            ));
        }

        if !(self.target_association_tolerance.is_finite()
            && self.target_association_tolerance >= T::zero())
        {
            return Err(QbxError::InvalidInput(format!(
                "`target_association_tolerance` must be non negative and finite, found {:?}",
                self.target_association_tolerance
            )));
        }

        positive("expansion_radius_factor", self.expansion_radius_factor)?;
        positive("expansion_stick_out_factor", self.expansion_stick_out_factor)?;

        if self.well_sep_is_n_away == 0 {
            return Err(QbxError::InvalidInput(
                "`well_sep_is_n_away` must be at least one".to_string(),
            ));
        }

        if self.max_leaf_refine_weight == 0 {
            return Err(QbxError::InvalidInput(
                "`max_leaf_refine_weight` must be at least one".to_string(),
            ));
        }

        Ok(self)
    }

    /// Derive a configuration, replacing the fields set in `overrides`.
    ///
    /// The result is validated like a freshly built configuration.
    pub fn copy_with(&self, overrides: QbxConfigOverrides<T>) -> Result<Self, QbxError> {
        let QbxConfigOverrides {
            qbx_order,
            fmm_order,
            fmm_backend,
            target_association_tolerance,
            expansion_radius_factor,
            expansion_stick_out_factor,
            well_sep_is_n_away,
            max_leaf_refine_weight,
            tree_kind,
        } = overrides;

        QbxConfig {
            qbx_order: qbx_order.unwrap_or(self.qbx_order),
            fmm_order: fmm_order.unwrap_or_else(|| self.fmm_order.clone()),
            fmm_backend: fmm_backend.unwrap_or(self.fmm_backend),
            target_association_tolerance: target_association_tolerance
                .unwrap_or(self.target_association_tolerance),
            expansion_radius_factor: expansion_radius_factor.unwrap_or(self.expansion_radius_factor),
            expansion_stick_out_factor: expansion_stick_out_factor
                .unwrap_or(self.expansion_stick_out_factor),
            well_sep_is_n_away: well_sep_is_n_away.unwrap_or(self.well_sep_is_n_away),
            max_leaf_refine_weight: max_leaf_refine_weight.unwrap_or(self.max_leaf_refine_weight),
            tree_kind: tree_kind.unwrap_or(self.tree_kind),
        }
        .validated()
    }

    /// Order of the QBX local expansions.
    pub fn qbx_order(&self) -> usize {
        self.qbx_order
    }

    /// FMM expansion order.
    pub fn fmm_order(&self) -> &FmmOrder {
        &self.fmm_order
    }

    /// Expansion backend.
    pub fn fmm_backend(&self) -> FmmBackend {
        self.fmm_backend
    }

    /// Relative slack on center radii during target association.
    pub fn target_association_tolerance(&self) -> T {
        self.target_association_tolerance
    }

    /// Expansion radius as a fraction of the element size.
    pub fn expansion_radius_factor(&self) -> T {
        self.expansion_radius_factor
    }

    /// Largest center radius relative to the side of its leaf box.
    pub fn expansion_stick_out_factor(&self) -> T {
        self.expansion_stick_out_factor
    }

    /// Separation of well separated boxes, in boxes.
    pub fn well_sep_is_n_away(&self) -> u64 {
        self.well_sep_is_n_away
    }

    /// Largest number of particles in an adaptive leaf.
    pub fn max_leaf_refine_weight(&self) -> usize {
        self.max_leaf_refine_weight
    }

    /// Quadtree refinement strategy.
    pub fn tree_kind(&self) -> TreeKind {
        self.tree_kind
    }
}

impl<T> Default for QbxConfigBuilder<T>
where
    T: RealScalar,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QbxConfigBuilder<T>
where
    T: RealScalar,
{
    /// Initialise an empty configuration builder.
    pub fn new() -> Self {
        Self {
            qbx_order: None,
            fmm_order: None,
            fmm_level_to_order: None,
            disable_fmm: None,
            fmm_backend: None,
            target_association_tolerance: None,
            expansion_radius_factor: None,
            expansion_stick_out_factor: None,
            well_sep_is_n_away: None,
            max_leaf_refine_weight: None,
            tree_kind: None,
        }
    }

    /// Order of the QBX local expansions, required.
    pub fn qbx_order(mut self, order: usize) -> Result<Self, QbxError> {
        self.qbx_order = Some(order);
        Ok(self)
    }

    /// Fixed FMM expansion order on every level.
    pub fn fmm_order(mut self, order: usize) -> Result<Self, QbxError> {
        if order == 0 {
            return Err(QbxError::InvalidInput(
                "`fmm_order` must be at least one".to_string(),
            ));
        }
        self.fmm_order = Some(order);
        Ok(self)
    }

    /// FMM expansion order chosen per kernel and tree level.
    pub fn fmm_level_to_order<F>(mut self, level_to_order: F) -> Result<Self, QbxError>
    where
        F: Fn(&Kernel2d, u64) -> usize + Send + Sync + 'static,
    {
        self.fmm_level_to_order = Some(Arc::new(level_to_order));
        Ok(self)
    }

    /// Evaluate without the FMM, with the direct evaluator.
    pub fn disable_fmm(mut self) -> Result<Self, QbxError> {
        self.disable_fmm = Some(true);
        Ok(self)
    }

    /// Expansion backend, defaults to [`FmmBackend::Generic`].
    pub fn fmm_backend(mut self, backend: FmmBackend) -> Result<Self, QbxError> {
        self.fmm_backend = Some(backend);
        Ok(self)
    }

    /// Relative slack on center radii during target association, defaults to a thousand machine
    /// epsilons.
    pub fn target_association_tolerance(mut self, tolerance: T) -> Result<Self, QbxError> {
        if !(tolerance.is_finite() && tolerance >= T::zero()) {
            return Err(QbxError::InvalidInput(format!(
                "`target_association_tolerance` must be non negative and finite, found {tolerance:?}"
            )));
        }
        self.target_association_tolerance = Some(tolerance);
        Ok(self)
    }

    /// Expansion radius as a fraction of the element size, defaults to one half.
    pub fn expansion_radius_factor(mut self, factor: T) -> Result<Self, QbxError> {
        self.expansion_radius_factor = Some(positive("expansion_radius_factor", factor)?);
        Ok(self)
    }

    /// Largest center radius relative to the side of its leaf box, defaults to one half.
    pub fn expansion_stick_out_factor(mut self, factor: T) -> Result<Self, QbxError> {
        self.expansion_stick_out_factor = Some(positive("expansion_stick_out_factor", factor)?);
        Ok(self)
    }

    /// Separation of well separated boxes, defaults to two.
    pub fn well_sep_is_n_away(mut self, n: u64) -> Result<Self, QbxError> {
        if n == 0 {
            return Err(QbxError::InvalidInput(
                "`well_sep_is_n_away` must be at least one".to_string(),
            ));
        }
        self.well_sep_is_n_away = Some(n);
        Ok(self)
    }

    /// Largest number of particles in an adaptive leaf.
    pub fn max_leaf_refine_weight(mut self, weight: usize) -> Result<Self, QbxError> {
        if weight == 0 {
            return Err(QbxError::InvalidInput(
                "`max_leaf_refine_weight` must be at least one".to_string(),
            ));
        }
        self.max_leaf_refine_weight = Some(weight);
        Ok(self)
    }

    /// Quadtree refinement strategy, defaults to [`TreeKind::Adaptive`].
    pub fn tree_kind(mut self, kind: TreeKind) -> Result<Self, QbxError> {
        self.tree_kind = Some(kind);
        Ok(self)
    }

    /// Finalise the configuration.
    pub fn build(self) -> Result<QbxConfig<T>, QbxError> {
        let qbx_order = self
            .qbx_order
            .ok_or_else(|| QbxError::InvalidInput("`qbx_order` must be supplied".to_string()))?;

        let fmm_order = match (self.fmm_order, self.fmm_level_to_order, self.disable_fmm) {
            (Some(order), None, None) => FmmOrder::Fixed(order),
            (None, Some(f), None) => FmmOrder::PerLevel(f),
            (None, None, Some(_)) => FmmOrder::Disabled,
            (None, None, None) => {
                return Err(QbxError::InvalidInput(
                    "Either of `fmm_order`, `fmm_level_to_order` or `disable_fmm` must be supplied, not several or none."
                        .to_string(),
                ))
            }
            _ => {
                return Err(QbxError::ConfigurationConflict(
                    "Either of `fmm_order`, `fmm_level_to_order` or `disable_fmm` must be supplied, not several or none."
                        .to_string(),
                ))
            }
        };

        QbxConfig {
            qbx_order,
            fmm_order,
            fmm_backend: self.fmm_backend.unwrap_or_default(),
            target_association_tolerance: self.target_association_tolerance.unwrap_or_else(|| {
                T::real(DEFAULT_TARGET_ASSOCIATION_TOLERANCE_EPS) * T::epsilon()
            }),
            expansion_radius_factor: self
                .expansion_radius_factor
                .unwrap_or_else(|| T::real(DEFAULT_EXPANSION_RADIUS_FACTOR)),
            expansion_stick_out_factor: self
                .expansion_stick_out_factor
                .unwrap_or_else(|| T::real(DEFAULT_EXPANSION_STICK_OUT_FACTOR)),
            well_sep_is_n_away: self
                .well_sep_is_n_away
                .unwrap_or(DEFAULT_WELL_SEP_IS_N_AWAY),
            max_leaf_refine_weight: self
                .max_leaf_refine_weight
                .unwrap_or(DEFAULT_MAX_LEAF_REFINE_WEIGHT),
            tree_kind: self.tree_kind.unwrap_or_default(),
        }
        .validated()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = QbxConfigBuilder::<f64>::new()
            .qbx_order(5)
            .unwrap()
            .fmm_order(10)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.qbx_order(), 5);
        assert!(matches!(config.fmm_order(), FmmOrder::Fixed(10)));
        assert_eq!(config.fmm_backend(), FmmBackend::Generic);
        assert_eq!(config.target_association_tolerance(), 1e3 * f64::EPSILON);
        assert_eq!(config.expansion_radius_factor(), 0.5);
        assert_eq!(config.well_sep_is_n_away(), 2);
        assert_eq!(config.tree_kind(), TreeKind::Adaptive);
    }

    #[test]
    fn test_order_conflicts() {
        let both = QbxConfigBuilder::<f64>::new()
            .qbx_order(5)
            .unwrap()
            .fmm_order(10)
            .unwrap()
            .fmm_level_to_order(|_, level| 10 + level as usize)
            .unwrap()
            .build();
        assert!(matches!(both, Err(QbxError::ConfigurationConflict(_))));

        let neither = QbxConfigBuilder::<f64>::new().qbx_order(5).unwrap().build();
        assert!(matches!(neither, Err(QbxError::InvalidInput(_))));

        let host_per_level = QbxConfigBuilder::<f64>::new()
            .qbx_order(5)
            .unwrap()
            .fmm_level_to_order(|_, _| 10)
            .unwrap()
            .fmm_backend(FmmBackend::HelmholtzHost)
            .unwrap()
            .build();
        assert!(matches!(
            host_per_level,
            Err(QbxError::ConfigurationConflict(_))
        ));

        let missing_qbx_order = QbxConfigBuilder::<f64>::new().disable_fmm().unwrap().build();
        assert!(matches!(missing_qbx_order, Err(QbxError::InvalidInput(_))));
    }

    #[test]
    fn test_level_to_order() {
        let config = QbxConfigBuilder::<f64>::new()
            .qbx_order(5)
            .unwrap()
            .fmm_level_to_order(|kernel, level| match kernel {
                Kernel2d::Laplace => 10 + level as usize,
                Kernel2d::Helmholtz { .. } => 20,
            })
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            config.fmm_order().orders(&Kernel2d::Laplace, 2),
            Some(vec![10, 11, 12])
        );
        assert_eq!(
            config.fmm_order().orders(&Kernel2d::helmholtz("k"), 1),
            Some(vec![20, 20])
        );
    }

    #[test]
    fn test_copy_with() {
        let config = QbxConfigBuilder::<f64>::new()
            .qbx_order(5)
            .unwrap()
            .fmm_order(10)
            .unwrap()
            .target_association_tolerance(0.05)
            .unwrap()
            .expansion_radius_factor(0.4)
            .unwrap()
            .well_sep_is_n_away(1)
            .unwrap()
            .max_leaf_refine_weight(32)
            .unwrap()
            .tree_kind(TreeKind::Uniform)
            .unwrap()
            .build()
            .unwrap();

        let derived = config
            .copy_with(QbxConfigOverrides {
                qbx_order: Some(7),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(derived.qbx_order(), 7);
        assert!(matches!(derived.fmm_order(), FmmOrder::Fixed(10)));
        assert_eq!(derived.fmm_backend(), config.fmm_backend());
        assert_eq!(derived.target_association_tolerance(), 0.05);
        assert_eq!(derived.expansion_radius_factor(), 0.4);
        assert_eq!(
            derived.expansion_stick_out_factor(),
            config.expansion_stick_out_factor()
        );
        assert_eq!(derived.well_sep_is_n_away(), 1);
        assert_eq!(derived.max_leaf_refine_weight(), 32);
        assert_eq!(derived.tree_kind(), TreeKind::Uniform);

        let disabled = config
            .copy_with(QbxConfigOverrides {
                fmm_order: Some(FmmOrder::Disabled),
                ..Default::default()
            })
            .unwrap();
        assert!(disabled.fmm_order().is_disabled());

        let conflict = config.copy_with(QbxConfigOverrides {
            fmm_order: Some(FmmOrder::PerLevel(Arc::new(|_, _| 4))),
            fmm_backend: Some(FmmBackend::HelmholtzHost),
            ..Default::default()
        });
        assert!(matches!(conflict, Err(QbxError::ConfigurationConflict(_))));

        let invalid = config.copy_with(QbxConfigOverrides {
            expansion_radius_factor: Some(-1.0),
            ..Default::default()
        });
        assert!(matches!(invalid, Err(QbxError::InvalidInput(_))));
    }
}
