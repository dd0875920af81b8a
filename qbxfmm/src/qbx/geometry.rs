//! Geometry data shared by every evaluation against one set of targets.
//!
//! [`GeometryData`] bundles the quadtree over sources, expansion centers and targets, its
//! interaction lists, and the association of targets with centers, along with the index maps the
//! FMM stages consume. It is immutable once built and cached by [`GeometryCache`] under a
//! [`GeometryKey`] derived from the target point sets.
use std::{
    collections::HashMap,
    ops::Range,
    sync::{Arc, Mutex, MutexGuard},
};

use itertools::Itertools;

use crate::{
    discretization::{point_bits, Discretization},
    qbx::{
        centers::ExpansionCenters,
        config::QbxConfig,
        instruction::ForcedLimit,
        target_assoc::{associate_targets, TargetState},
    },
    traits::{general::RealScalar, types::QbxError},
    tree::types::{InteractionLists, SingleNodeTree, Traversal, TreeParameters, TreeParticles},
};

/// One set of targets of an evaluation, with the side it is evaluated from.
#[derive(Clone, Copy, Debug)]
pub struct TargetGroup<'a, T>
where
    T: RealScalar,
{
    /// Name of the geometry providing the targets.
    pub name: &'a str,

    /// Target coordinates.
    pub points: &'a [[T; 2]],

    /// Whether the targets are the source discretization's own nodes.
    pub is_self: bool,

    /// Side from which the targets are evaluated, never [`ForcedLimit::Average`].
    pub forced_limit: ForcedLimit,
}

/// Cache key of a geometry, one entry of `(coordinate bits, is_self, forced_limit)` per target
/// group. Two keys are equal exactly when every group has bitwise identical points.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GeometryKey(Vec<(Vec<[u64; 2]>, bool, ForcedLimit)>);

impl GeometryKey {
    /// Key of a list of target groups.
    pub fn new<T: RealScalar>(groups: &[TargetGroup<'_, T>]) -> Self {
        Self(
            groups
                .iter()
                .map(|g| (point_bits(g.points), g.is_self, g.forced_limit))
                .collect(),
        )
    }
}

/// A target group's position in the combined target array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetGroupInfo {
    /// Whether the targets are the source discretization's own nodes.
    pub is_self: bool,

    /// Side from which the targets are evaluated.
    pub forced_limit: ForcedLimit,

    /// Range of the group in the combined target array.
    pub range: Range<usize>,
}

/// Combined targets of all groups.
#[derive(Clone, Debug)]
pub struct TargetInfo<T>
where
    T: RealScalar,
{
    /// Coordinates of all targets, group after group.
    pub targets: Vec<[T; 2]>,

    /// Index of the first target of each group, followed by the total number of targets.
    pub target_discr_starts: Vec<usize>,
}

/// Targets without a QBX center, listed per target box.
#[derive(Clone, Debug, Default)]
pub struct NonQbxTargets {
    /// `box_target_starts[i]..box_target_starts[i + 1]` are the filtered targets of target box `i`.
    pub box_target_starts: Vec<usize>,

    /// Tree index of each filtered target.
    pub filtered_to_unfiltered: Vec<usize>,
}

impl NonQbxTargets {
    /// Number of targets without a QBX center.
    pub fn len(&self) -> usize {
        self.filtered_to_unfiltered.len()
    }

    /// Whether every target has a QBX center.
    pub fn is_empty(&self) -> bool {
        self.filtered_to_unfiltered.is_empty()
    }
}

/// Tree, interaction lists and target association of one source against one list of target groups.
#[derive(Debug)]
pub struct GeometryData<T>
where
    T: RealScalar,
{
    discretization: Arc<Discretization<T>>,
    centers: Arc<ExpansionCenters<T>>,
    groups: Vec<TargetGroupInfo>,
    target_info: TargetInfo<T>,
    tree: SingleNodeTree<T>,
    traversal: Traversal,
    target_states: Vec<TargetState>,
    global_qbx_centers: Vec<usize>,
    qbx_center_to_target_box: Vec<usize>,
    center_to_tree_targets: InteractionLists,
    non_qbx_box_target_lists: NonQbxTargets,
    failed_targets: Vec<usize>,
    user_target_to_center: Vec<Option<usize>>,
}

impl<T> GeometryData<T>
where
    T: RealScalar,
{
    /// Build the geometry of a source against a list of target groups.
    ///
    /// # Arguments
    /// * `discretization` - Source discretization.
    /// * `centers` - Expansion centers of the source.
    /// * `groups` - Target groups, in evaluation order.
    /// * `config` - Tree and association parameters.
    pub fn new(
        discretization: Arc<Discretization<T>>,
        centers: Arc<ExpansionCenters<T>>,
        groups: &[TargetGroup<'_, T>],
        config: &QbxConfig<T>,
    ) -> Result<Self, QbxError> {
        let mut targets = Vec::with_capacity(groups.iter().map(|g| g.points.len()).sum());
        let mut target_discr_starts = vec![0];
        let mut target_sides = Vec::with_capacity(targets.capacity());
        let mut group_info = Vec::with_capacity(groups.len());

        for group in groups.iter() {
            let start = targets.len();
            targets.extend_from_slice(group.points);
            target_sides.extend(std::iter::repeat(group.forced_limit.side()).take(group.points.len()));
            target_discr_starts.push(targets.len());
            group_info.push(TargetGroupInfo {
                is_self: group.is_self,
                forced_limit: group.forced_limit,
                range: start..targets.len(),
            });
        }

        let particles = TreeParticles {
            sources: discretization.nodes(),
            source_radii: centers.dof_radii(),
            centers: centers.points(),
            center_radii: centers.radii(),
            targets: &targets,
        };
        let parameters = TreeParameters {
            kind: config.tree_kind(),
            max_leaf_refine_weight: config.max_leaf_refine_weight(),
            expansion_stick_out_factor: config.expansion_stick_out_factor(),
        };

        let tree = SingleNodeTree::new(&particles, &parameters)?;
        let traversal = Traversal::new(&tree, config.well_sep_is_n_away());

        let target_states = associate_targets(
            &tree,
            centers.sides(),
            &target_sides,
            config.target_association_tolerance(),
        );

        let failed_targets = target_states
            .iter()
            .positions(|s| s.is_failed())
            .collect_vec();

        let user_target_to_center = target_states.iter().map(|s| s.center()).collect_vec();

        let global_qbx_centers = user_target_to_center
            .iter()
            .flatten()
            .copied()
            .sorted()
            .dedup()
            .collect_vec();

        let mut center_position = vec![None; centers.len()];
        for (position, &center) in global_qbx_centers.iter().enumerate() {
            center_position[center] = Some(position);
        }

        let mut center_targets = vec![Vec::new(); global_qbx_centers.len()];
        for (tree_index, &user_index) in tree.targets().tree_to_user.iter().enumerate() {
            if let Some(position) = user_target_to_center[user_index].and_then(|c| center_position[c])
            {
                center_targets[position].push(tree_index);
            }
        }
        let center_to_tree_targets = InteractionLists::from_lists(center_targets);

        let qbx_center_to_target_box = global_qbx_centers
            .iter()
            .map(|&center| {
                traversal
                    .target_box_index(tree.leaf_of_center(center))
                    .ok_or_else(|| {
                        QbxError::InvalidInput(format!(
                            "Expansion center {center} does not lie in a target box"
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut non_qbx_box_target_lists = NonQbxTargets {
            box_target_starts: vec![0],
            filtered_to_unfiltered: Vec::new(),
        };
        for &ibox in traversal.target_boxes() {
            for tree_index in tree.node(ibox).targets.clone() {
                let user_index = tree.targets().tree_to_user[tree_index];
                if target_states[user_index] == TargetState::Unassociated {
                    non_qbx_box_target_lists
                        .filtered_to_unfiltered
                        .push(tree_index);
                }
            }
            non_qbx_box_target_lists
                .box_target_starts
                .push(non_qbx_box_target_lists.filtered_to_unfiltered.len());
        }

        log::info!(
            "Built QBX geometry: {} sources, {} centers ({} in use), {} targets in {} group(s), depth {}, {} boxes",
            discretization.ndofs(),
            centers.len(),
            global_qbx_centers.len(),
            targets.len(),
            groups.len(),
            tree.depth(),
            tree.nboxes()
        );

        Ok(Self {
            discretization,
            centers,
            groups: group_info,
            target_info: TargetInfo {
                targets,
                target_discr_starts,
            },
            tree,
            traversal,
            target_states,
            global_qbx_centers,
            qbx_center_to_target_box,
            center_to_tree_targets,
            non_qbx_box_target_lists,
            failed_targets,
            user_target_to_center,
        })
    }

    /// Source discretization.
    pub fn discretization(&self) -> &Discretization<T> {
        &self.discretization
    }

    /// Expansion centers of the source.
    pub fn centers(&self) -> &ExpansionCenters<T> {
        &self.centers
    }

    /// Number of expansion centers.
    pub fn ncenters(&self) -> usize {
        self.centers.len()
    }

    /// Target groups, in evaluation order.
    pub fn groups(&self) -> &[TargetGroupInfo] {
        &self.groups
    }

    /// Combined targets.
    pub fn target_info(&self) -> &TargetInfo<T> {
        &self.target_info
    }

    /// Total number of targets.
    pub fn ntargets(&self) -> usize {
        self.target_info.targets.len()
    }

    /// Quadtree over sources, centers and targets.
    pub fn tree(&self) -> &SingleNodeTree<T> {
        &self.tree
    }

    /// Interaction lists of the tree.
    pub fn traversal(&self) -> &Traversal {
        &self.traversal
    }

    /// Association state of every combined target.
    pub fn target_states(&self) -> &[TargetState] {
        &self.target_states
    }

    /// Association state of one combined target.
    pub fn target_to_center(&self, target: usize) -> TargetState {
        self.target_states[target]
    }

    /// Centers with at least one associated target, ascending.
    pub fn global_qbx_centers(&self) -> &[usize] {
        &self.global_qbx_centers
    }

    /// Target box holding each center of [`GeometryData::global_qbx_centers`].
    pub fn qbx_center_to_target_box(&self) -> &[usize] {
        &self.qbx_center_to_target_box
    }

    /// Tree indices of the targets associated with each center of
    /// [`GeometryData::global_qbx_centers`].
    pub fn center_to_tree_targets(&self) -> &InteractionLists {
        &self.center_to_tree_targets
    }

    /// Targets without a center, per target box.
    pub fn non_qbx_box_target_lists(&self) -> &NonQbxTargets {
        &self.non_qbx_box_target_lists
    }

    /// Combined indices of the failed targets.
    pub fn failed_targets(&self) -> &[usize] {
        &self.failed_targets
    }

    /// Center of each combined target, if associated.
    pub fn user_target_to_center(&self) -> &[Option<usize>] {
        &self.user_target_to_center
    }

    /// Number of targets of a group with an associated center.
    pub fn n_associated(&self, group: usize) -> usize {
        self.target_states[self.groups[group].range.clone()]
            .iter()
            .filter(|s| s.center().is_some())
            .count()
    }
}

/// Geometry data memoized per key, each entry is built at most once.
#[derive(Debug)]
pub struct GeometryCache<T>
where
    T: RealScalar,
{
    entries: Mutex<HashMap<GeometryKey, Arc<GeometryData<T>>>>,
}

impl<T> Default for GeometryCache<T>
where
    T: RealScalar,
{
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> GeometryCache<T>
where
    T: RealScalar,
{
    /// Cached geometry of a key, built by `build` if absent. A failed build is not cached.
    ///
    /// The lock is not held while `build` runs, so `build` may use rayon and callers may look up
    /// geometries from inside rayon tasks. When two threads build the same key concurrently, the
    /// first geometry inserted is kept and returned to both.
    pub fn get_or_build<F>(
        &self,
        key: GeometryKey,
        build: F,
    ) -> Result<Arc<GeometryData<T>>, QbxError>
    where
        F: FnOnce() -> Result<GeometryData<T>, QbxError>,
    {
        if let Some(geometry) = self.lock().get(&key) {
            log::debug!("Reusing cached QBX geometry");
            return Ok(geometry.clone());
        }

        let geometry = Arc::new(build()?);
        Ok(self.lock().entry(key).or_insert(geometry).clone())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<GeometryKey, Arc<GeometryData<T>>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of cached geometries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::qbx::config::QbxConfigBuilder;

    fn config() -> QbxConfig<f64> {
        QbxConfigBuilder::new()
            .qbx_order(4)
            .unwrap()
            .fmm_order(10)
            .unwrap()
            .max_leaf_refine_weight(16)
            .unwrap()
            .build()
            .unwrap()
    }

    fn geometry_fixture(targets: &[[f64; 2]]) -> GeometryData<f64> {
        let discr = Arc::new(Discretization::<f64>::circle(256, 1.0, 4));
        let centers = Arc::new(ExpansionCenters::new(&discr, 0.5).unwrap());
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
        GeometryData::new(discr, centers, &groups, &config()).unwrap()
    }

    #[test]
    fn test_geometry_bookkeeping() {
        let targets = [[0.0, 0.0], [1.001, 0.0], [3.0, 0.5]];
        let geometry = geometry_fixture(&targets);

        assert_eq!(geometry.ntargets(), 259);
        assert_eq!(geometry.target_info().target_discr_starts, vec![0, 256, 259]);
        assert_eq!(geometry.groups()[1].range, 256..259);
        assert!(geometry.failed_targets().is_empty());

        // Self targets use their own exterior center
        for i in 0..256 {
            assert_eq!(geometry.user_target_to_center()[i], Some(2 * i + 1));
        }
        assert_eq!(geometry.n_associated(0), 256);

        assert_eq!(geometry.target_to_center(256), TargetState::Unassociated);
        assert!(geometry.user_target_to_center()[257].is_some());
        assert_eq!(geometry.target_to_center(258), TargetState::Unassociated);

        // Every associated target is listed once, under its center
        let mut listed = 0;
        for (position, &center) in geometry.global_qbx_centers().iter().enumerate() {
            for &tree_index in geometry.center_to_tree_targets().get(position) {
                let user = geometry.tree().targets().tree_to_user[tree_index];
                assert_eq!(geometry.user_target_to_center()[user], Some(center));
                listed += 1;
            }

            let target_box = geometry.qbx_center_to_target_box()[position];
            let leaf = geometry.traversal().target_boxes()[target_box];
            let k = geometry.tree().centers().user_to_tree[center];
            assert!(geometry.tree().node(leaf).centers.contains(&k));
        }
        assert_eq!(listed, 257);

        let non_qbx = geometry.non_qbx_box_target_lists();
        assert_eq!(non_qbx.len(), 2);
        assert_eq!(
            *non_qbx.box_target_starts.last().unwrap(),
            non_qbx.filtered_to_unfiltered.len()
        );
    }

    #[test]
    fn test_cache_builds_once() {
        let cache = GeometryCache::<f64>::default();
        let targets = [[0.0, 0.0]];
        let key = GeometryKey::new(&[TargetGroup {
            name: "points",
            points: &targets,
            is_self: false,
            forced_limit: ForcedLimit::Unforced,
        }]);

        let a = cache
            .get_or_build(key.clone(), || Ok(geometry_fixture(&targets)))
            .unwrap();
        let b = cache
            .get_or_build(key.clone(), || panic!("geometry rebuilt"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let other = GeometryKey::new(&[TargetGroup {
            name: "points",
            points: &targets,
            is_self: false,
            forced_limit: ForcedLimit::Exterior,
        }]);
        assert_ne!(key, other);
        let failed = cache.get_or_build(other, || {
            Err(QbxError::InvalidInput("no geometry".to_string()))
        });
        assert!(failed.is_err());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_key_compares_coordinates() {
        let a = [[0.0, 0.0], [2.0, 0.5]];
        let b = [[0.0, 0.0], [2.0, 0.5 + f64::EPSILON]];
        let key = |points: &[[f64; 2]]| {
            GeometryKey::new(&[TargetGroup {
                name: "points",
                points,
                is_self: false,
                forced_limit: ForcedLimit::Unforced,
            }])
        };
        assert_eq!(key(&a), key(&a.to_vec()));
        assert_ne!(key(&a), key(&b));

        let cache = GeometryCache::<f64>::default();
        let ga = cache
            .get_or_build(key(&a), || Ok(geometry_fixture(&a)))
            .unwrap();
        let gb = cache
            .get_or_build(key(&b), || Ok(geometry_fixture(&b)))
            .unwrap();
        assert!(!Arc::ptr_eq(&ga, &gb));
        assert_eq!(cache.len(), 2);
        assert_eq!(ga.target_info().targets[257], a[1]);
        assert_eq!(gb.target_info().targets[257], b[1]);
    }

    #[test]
    fn test_cache_lookup_from_rayon_tasks() {
        use rayon::prelude::*;

        let cache = GeometryCache::<f64>::default();
        let targets = [[0.0, 0.0], [3.0, 0.5]];
        let key = GeometryKey::new(&[TargetGroup {
            name: "points",
            points: &targets,
            is_self: false,
            forced_limit: ForcedLimit::Unforced,
        }]);

        let geometries = (0..8)
            .into_par_iter()
            .map(|_| {
                cache
                    .get_or_build(key.clone(), || Ok(geometry_fixture(&targets)))
                    .unwrap()
            })
            .collect::<Vec<_>>();

        assert_eq!(cache.len(), 1);
        let cached = cache.get_or_build(key, || panic!("geometry rebuilt")).unwrap();
        for geometry in geometries.iter() {
            assert_eq!(geometry.ntargets(), cached.ntargets());
        }
    }
}
