//! Construction of single node quadtrees over sources, expansion centers and targets.
use std::{collections::HashMap, ops::Range};

use itertools::Itertools;

use crate::{
    traits::{general::RealScalar, types::QbxError},
    tree::{
        constants::{
            DEEPEST_LEVEL, DEFAULT_EXPANSION_STICK_OUT_FACTOR, DEFAULT_MAX_LEAF_REFINE_WEIGHT,
        },
        morton::{interleave, point_to_anchor},
        types::{
            Domain, MortonKey, ParticleSet, SingleNodeTree, TreeBox, TreeKind, TreeParameters,
            TreeParticles,
        },
    },
};

impl<T> Default for TreeParameters<T>
where
    T: RealScalar,
{
    fn default() -> Self {
        Self {
            kind: TreeKind::Adaptive,
            max_leaf_refine_weight: DEFAULT_MAX_LEAF_REFINE_WEIGHT,
            expansion_stick_out_factor: T::real(DEFAULT_EXPANSION_STICK_OUT_FACTOR),
        }
    }
}

impl<T> ParticleSet<T>
where
    T: RealScalar,
{
    /// Sort points along the Morton curve of a domain. Ties are broken by the caller's index so the
    /// resulting order is deterministic.
    fn new(points: &[[T; 2]], radii: Option<&[T]>, domain: &Domain<T>) -> Self {
        let codes = points
            .iter()
            .map(|p| interleave(&point_to_anchor(p, domain)))
            .collect_vec();

        let tree_to_user = (0..points.len())
            .sorted_by_key(|&i| (codes[i], i))
            .collect_vec();

        let mut user_to_tree = vec![0; points.len()];
        for (tree_index, &user_index) in tree_to_user.iter().enumerate() {
            user_to_tree[user_index] = tree_index;
        }

        Self {
            coordinates: tree_to_user.iter().map(|&i| points[i]).collect(),
            radii: tree_to_user
                .iter()
                .map(|&i| radii.map_or(T::zero(), |r| r[i]))
                .collect(),
            codes: tree_to_user.iter().map(|&i| codes[i]).collect(),
            tree_to_user,
            user_to_tree,
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Whether the set contains no points.
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Sub range of `range` holding the points whose deepest level anchor lies in `codes`.
    fn subrange(&self, range: &Range<usize>, codes: &Range<u64>) -> Range<usize> {
        let slice = &self.codes[range.clone()];
        let start = slice.partition_point(|&c| c < codes.start);
        let end = slice.partition_point(|&c| c < codes.end);
        range.start + start..range.start + end
    }

    /// Largest radius over a range of points, zero for an empty range.
    fn max_radius(&self, range: &Range<usize>) -> T {
        self.radii[range.clone()]
            .iter()
            .fold(T::zero(), |acc, &r| acc.max(r))
    }
}

impl<T> SingleNodeTree<T>
where
    T: RealScalar,
{
    /// Estimate the depth of a uniform tree such that leaves hold on average `n_crit` particles.
    ///
    /// # Arguments
    /// * `n_points` - Total number of particles.
    /// * `n_crit` - Target number of particles per leaf.
    pub fn minimum_depth(n_points: u64, n_crit: u64) -> u64 {
        let mut depth = 0;
        let mut capacity = n_crit.max(1);
        while capacity < n_points && depth < DEEPEST_LEVEL - 1 {
            capacity *= 4;
            depth += 1;
        }
        depth
    }

    /// Construct a quadtree over sources, expansion centers and targets.
    ///
    /// Boxes are split while the refinement criterion of `parameters.kind` holds, but never when a
    /// contained expansion center's radius exceeds `expansion_stick_out_factor` times the child side
    /// length. Empty children are not created.
    ///
    /// # Arguments
    /// * `particles` - Point data of every role.
    /// * `parameters` - Refinement parameters.
    pub fn new(
        particles: &TreeParticles<'_, T>,
        parameters: &TreeParameters<T>,
    ) -> Result<Self, QbxError> {
        if particles.sources.len() != particles.source_radii.len() {
            return Err(QbxError::InvalidInput(format!(
                "{} sources but {} source radii",
                particles.sources.len(),
                particles.source_radii.len()
            )));
        }

        if particles.centers.len() != particles.center_radii.len() {
            return Err(QbxError::InvalidInput(format!(
                "{} expansion centers but {} center radii",
                particles.centers.len(),
                particles.center_radii.len()
            )));
        }

        let all_points = particles
            .sources
            .iter()
            .chain(particles.centers.iter())
            .chain(particles.targets.iter());

        if all_points.clone().any(|p| !(p[0].is_finite() && p[1].is_finite())) {
            return Err(QbxError::InvalidInput(
                "Tree particles must have finite coordinates".to_string(),
            ));
        }

        let domain = Domain::from_local_points(all_points);

        let sources = ParticleSet::new(particles.sources, Some(particles.source_radii), &domain);
        let centers = ParticleSet::new(particles.centers, Some(particles.center_radii), &domain);
        let targets = ParticleSet::new(particles.targets, None, &domain);

        let n_particles = (sources.len() + centers.len() + targets.len()) as u64;
        let uniform_depth = Self::minimum_depth(
            n_particles,
            parameters.max_leaf_refine_weight.max(1) as u64,
        );

        let root_key = MortonKey::root();
        let root_codes = root_key.code_range();
        let root = TreeBox {
            key: root_key,
            parent: None,
            children: Vec::new(),
            centre: root_key.centre(&domain),
            side: root_key.side(&domain),
            sources: sources.subrange(&(0..sources.len()), &root_codes),
            centers: centers.subrange(&(0..centers.len()), &root_codes),
            targets: targets.subrange(&(0..targets.len()), &root_codes),
            max_center_radius: centers.max_radius(&(0..centers.len())),
            max_source_radius: sources.max_radius(&(0..sources.len())),
        };

        let mut boxes = vec![root];
        let mut level_index_pointer = vec![0, 1];
        let mut current = 0..1;

        loop {
            let mut next_level = Vec::new();

            for parent_index in current.clone() {
                let parent = &boxes[parent_index];
                let level = parent.key.level();

                if level + 1 >= DEEPEST_LEVEL {
                    continue;
                }

                let weight = parent.sources.len() + parent.centers.len() + parent.targets.len();
                let refine = match parameters.kind {
                    TreeKind::Adaptive => weight > parameters.max_leaf_refine_weight,
                    TreeKind::Uniform => weight > 0 && level < uniform_depth,
                };

                let child_side = T::real(0.5) * parent.side;
                let centers_fit =
                    parent.max_center_radius <= parameters.expansion_stick_out_factor * child_side;

                if !(refine && centers_fit) {
                    continue;
                }

                for child_key in parent.key.children() {
                    let codes = child_key.code_range();
                    let child_sources = sources.subrange(&parent.sources, &codes);
                    let child_centers = centers.subrange(&parent.centers, &codes);
                    let child_targets = targets.subrange(&parent.targets, &codes);

                    if child_sources.is_empty() && child_centers.is_empty() && child_targets.is_empty()
                    {
                        continue;
                    }

                    next_level.push(TreeBox {
                        key: child_key,
                        parent: Some(parent_index),
                        children: Vec::new(),
                        centre: child_key.centre(&domain),
                        side: child_key.side(&domain),
                        max_center_radius: centers.max_radius(&child_centers),
                        max_source_radius: sources.max_radius(&child_sources),
                        sources: child_sources,
                        centers: child_centers,
                        targets: child_targets,
                    });
                }
            }

            if next_level.is_empty() {
                break;
            }

            let start = boxes.len();
            for (offset, child) in next_level.iter().enumerate() {
                if let Some(parent) = child.parent {
                    boxes[parent].children.push(start + offset);
                }
            }
            boxes.extend(next_level);
            current = start..boxes.len();
            level_index_pointer.push(boxes.len());
        }

        let leaves = (0..boxes.len())
            .filter(|&i| boxes[i].children.is_empty())
            .sorted_by_key(|&i| boxes[i].key)
            .collect_vec();

        let key_to_index = boxes
            .iter()
            .enumerate()
            .map(|(i, b)| (b.key, i))
            .collect::<HashMap<_, _>>();

        log::debug!(
            "built {:?} quadtree: {} boxes, {} leaves, depth {}",
            parameters.kind,
            boxes.len(),
            leaves.len(),
            level_index_pointer.len() - 2
        );

        Ok(Self {
            domain,
            kind: parameters.kind,
            boxes,
            level_index_pointer,
            leaves,
            key_to_index,
            sources,
            centers,
            targets,
        })
    }

    /// Domain spanned by the tree.
    pub fn domain(&self) -> &Domain<T> {
        &self.domain
    }

    /// Refinement strategy used to build the tree.
    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    /// Depth of the tree, the root has level 0.
    pub fn depth(&self) -> u64 {
        (self.level_index_pointer.len() - 2) as u64
    }

    /// Total number of boxes.
    pub fn nboxes(&self) -> usize {
        self.boxes.len()
    }

    /// All boxes, sorted by level then Morton key.
    pub fn boxes(&self) -> &[TreeBox<T>] {
        &self.boxes
    }

    /// Box with a given index.
    pub fn node(&self, index: usize) -> &TreeBox<T> {
        &self.boxes[index]
    }

    /// Index range of the boxes at a given level, empty beyond the depth of the tree.
    pub fn boxes_at_level(&self, level: u64) -> Range<usize> {
        let level = level as usize;
        if level + 1 < self.level_index_pointer.len() {
            self.level_index_pointer[level]..self.level_index_pointer[level + 1]
        } else {
            let n = self.boxes.len();
            n..n
        }
    }

    /// Indices of leaf boxes in Morton order.
    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    /// Box index of a Morton key, if the key is part of the tree.
    pub fn index(&self, key: &MortonKey) -> Option<usize> {
        self.key_to_index.get(key).copied()
    }

    /// Sources in tree order.
    pub fn sources(&self) -> &ParticleSet<T> {
        &self.sources
    }

    /// Expansion centers in tree order.
    pub fn centers(&self) -> &ParticleSet<T> {
        &self.centers
    }

    /// Targets in tree order.
    pub fn targets(&self) -> &ParticleSet<T> {
        &self.targets
    }

    /// Leaf box containing the target with the given caller index.
    pub fn leaf_of_target(&self, user_index: usize) -> usize {
        self.leaf_containing(self.targets.user_to_tree[user_index], |b| &b.targets)
    }

    /// Leaf box containing the expansion center with the given caller index.
    pub fn leaf_of_center(&self, user_index: usize) -> usize {
        self.leaf_containing(self.centers.user_to_tree[user_index], |b| &b.centers)
    }

    fn leaf_containing<F>(&self, tree_index: usize, range: F) -> usize
    where
        F: Fn(&TreeBox<T>) -> &Range<usize>,
    {
        let mut current = 0;
        while let Some(&child) = self.boxes[current]
            .children
            .iter()
            .find(|&&c| range(&self.boxes[c]).contains(&tree_index))
        {
            current = child;
        }
        current
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::helpers::{points_fixture, points_fixture_annulus};

    fn tree_fixture(kind: TreeKind, max_leaf_refine_weight: usize) -> SingleNodeTree<f64> {
        let sources = points_fixture_annulus::<f64>(2000, 0.9, 1.1, 0);
        let source_radii = vec![0.001; sources.len()];
        let centers = points_fixture_annulus::<f64>(500, 0.8, 1.2, 1);
        let center_radii = vec![0.002; centers.len()];
        let targets = points_fixture::<f64>(300, Some(-1.5), Some(1.5), Some(2));

        let particles = TreeParticles {
            sources: &sources,
            source_radii: &source_radii,
            centers: &centers,
            center_radii: &center_radii,
            targets: &targets,
        };

        let parameters = TreeParameters {
            kind,
            max_leaf_refine_weight,
            ..Default::default()
        };

        SingleNodeTree::new(&particles, &parameters).unwrap()
    }

    #[test]
    fn test_adaptive_leaf_weight() {
        let tree = tree_fixture(TreeKind::Adaptive, 32);

        for &leaf in tree.leaves() {
            let node = tree.node(leaf);
            let weight = node.sources.len() + node.centers.len() + node.targets.len();
            assert!(weight <= 32);
        }

        // Leaves partition every role
        let n_sources: usize = tree.leaves().iter().map(|&l| tree.node(l).sources.len()).sum();
        let n_centers: usize = tree.leaves().iter().map(|&l| tree.node(l).centers.len()).sum();
        let n_targets: usize = tree.leaves().iter().map(|&l| tree.node(l).targets.len()).sum();
        assert_eq!(n_sources, 2000);
        assert_eq!(n_centers, 500);
        assert_eq!(n_targets, 300);
    }

    #[test]
    fn test_points_lie_in_their_leaves() {
        let tree = tree_fixture(TreeKind::Adaptive, 16);

        for &leaf in tree.leaves() {
            let node = tree.node(leaf);
            let half = 0.5 * node.side * (1.0 + 1e-12);
            for range_points in [
                &tree.sources().coordinates[node.sources.clone()],
                &tree.centers().coordinates[node.centers.clone()],
                &tree.targets().coordinates[node.targets.clone()],
            ] {
                for p in range_points.iter() {
                    assert!((p[0] - node.centre[0]).abs() <= half);
                    assert!((p[1] - node.centre[1]).abs() <= half);
                }
            }
        }

        for user_index in 0..300 {
            let leaf = tree.leaf_of_target(user_index);
            assert!(tree.node(leaf).children.is_empty());
            let tree_index = tree.targets().user_to_tree[user_index];
            assert!(tree.node(leaf).targets.contains(&tree_index));
            assert_eq!(tree.targets().tree_to_user[tree_index], user_index);
        }
    }

    #[test]
    fn test_box_ordering() {
        let tree = tree_fixture(TreeKind::Adaptive, 32);

        for level in 0..=tree.depth() {
            let range = tree.boxes_at_level(level);
            assert!(!range.is_empty());
            let keys = tree.boxes()[range].iter().map(|b| b.key).collect_vec();
            assert!(keys.iter().all(|k| k.level() == level));
            assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }

        for (index, node) in tree.boxes().iter().enumerate() {
            assert_eq!(tree.index(&node.key), Some(index));
            for &child in node.children.iter() {
                assert_eq!(tree.node(child).parent, Some(index));
                assert_eq!(tree.node(child).key.parent(), node.key);
            }
        }
    }

    #[test]
    fn test_stick_out_limits_refinement() {
        let sources = points_fixture::<f64>(1000, None, None, Some(0));
        let source_radii = vec![0.0; sources.len()];
        let centers = vec![[0.5, 0.5]];
        let center_radii = vec![0.1];

        let particles = TreeParticles {
            sources: &sources,
            source_radii: &source_radii,
            centers: &centers,
            center_radii: &center_radii,
            targets: &[],
        };

        let tree = SingleNodeTree::new(&particles, &TreeParameters::default()).unwrap();
        let leaf = tree.leaf_of_center(0);
        assert!(0.1 <= 0.5 * tree.node(leaf).side);
    }

    #[test]
    fn test_uniform_tree() {
        let tree = tree_fixture(TreeKind::Uniform, 64);
        let depth = SingleNodeTree::<f64>::minimum_depth(2800, 64);
        assert_eq!(tree.depth(), depth);

        for &leaf in tree.leaves() {
            assert_eq!(tree.node(leaf).key.level(), depth);
        }
    }

    #[test]
    fn test_empty_tree() {
        let particles = TreeParticles::<f64> {
            sources: &[],
            source_radii: &[],
            centers: &[],
            center_radii: &[],
            targets: &[],
        };
        let tree = SingleNodeTree::new(&particles, &TreeParameters::default()).unwrap();
        assert_eq!(tree.nboxes(), 1);
        assert_eq!(tree.leaves(), &[0]);
        assert_eq!(tree.depth(), 0);
    }
}
