//! Association of targets with QBX expansion centers.
//!
//! A center `c` of radius `r` is admissible for a target `t` when `|t - c| <= r (1 + eps)`, the
//! boundary is included. Among admissible centers on an eligible side the nearest wins, and equal
//! distances go to the lower center index. Targets without an admissible center are failed when
//! they lie within `r_j (1 + eps)` of a source `j`, since the source's singularity would need a
//! QBX expansion, and left unassociated otherwise.
use rayon::prelude::*;

use crate::{
    traits::general::RealScalar,
    tree::types::{ParticleSet, SingleNodeTree, TreeBox},
};

/// Association state of a target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// Far enough from the curve to be evaluated without a QBX expansion.
    #[default]
    Unassociated,

    /// Evaluated from the local expansion about a center.
    Associated {
        /// Index of the center.
        center: usize,
        /// Side of the center, -1 or +1.
        side: i8,
    },

    /// Needs a QBX expansion, but no admissible center exists.
    Failed,
}

impl TargetState {
    /// Center of an associated target.
    pub fn center(&self) -> Option<usize> {
        match self {
            TargetState::Associated { center, .. } => Some(*center),
            _ => None,
        }
    }

    /// Whether the target is failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, TargetState::Failed)
    }
}

/// Distance in the maximum norm from a point to a box, zero inside the box.
fn box_distance<T: RealScalar>(node: &TreeBox<T>, point: &[T; 2]) -> T {
    let half = T::real(0.5) * node.side;
    (0..2)
        .map(|i| ((point[i] - node.centre[i]).abs() - half).max(T::zero()))
        .fold(T::zero(), |acc, d| acc.max(d))
}

fn distance<T: RealScalar>(a: &[T; 2], b: &[T; 2]) -> T {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// Visit the points of a role in all leaves that may hold a point whose disc covers `point`.
fn visit_candidates<T, F, R, V>(
    tree: &SingleNodeTree<T>,
    point: &[T; 2],
    slack: T,
    max_radius: F,
    range: R,
    mut visit: V,
) where
    T: RealScalar,
    F: Fn(&TreeBox<T>) -> T,
    R: Fn(&TreeBox<T>) -> std::ops::Range<usize>,
    V: FnMut(usize),
{
    if tree.nboxes() == 0 {
        return;
    }

    let mut stack = vec![0usize];
    while let Some(ibox) = stack.pop() {
        let node = tree.node(ibox);
        if range(node).is_empty() || box_distance(node, point) > max_radius(node) * slack {
            continue;
        }

        if node.children.is_empty() {
            range(node).for_each(&mut visit);
        } else {
            stack.extend(node.children.iter().copied());
        }
    }
}

fn nearest_center<T: RealScalar>(
    tree: &SingleNodeTree<T>,
    center_sides: &[i8],
    point: &[T; 2],
    side: Option<i8>,
    slack: T,
) -> Option<(usize, i8)> {
    let centers: &ParticleSet<T> = tree.centers();
    let mut best: Option<(T, usize)> = None;

    visit_candidates(
        tree,
        point,
        slack,
        |node| node.max_center_radius,
        |node| node.centers.clone(),
        |k| {
            let center = centers.tree_to_user[k];
            if side.is_some_and(|s| s != center_sides[center]) {
                return;
            }

            let d = distance(point, &centers.coordinates[k]);
            if d > centers.radii[k] * slack {
                return;
            }

            let better = match best {
                None => true,
                Some((best_d, best_center)) => d < best_d || (d == best_d && center < best_center),
            };
            if better {
                best = Some((d, center));
            }
        },
    );

    best.map(|(_, center)| (center, center_sides[center]))
}

fn needs_qbx<T: RealScalar>(tree: &SingleNodeTree<T>, point: &[T; 2], slack: T) -> bool {
    let sources = tree.sources();
    let mut found = false;

    visit_candidates(
        tree,
        point,
        slack,
        |node| node.max_source_radius,
        |node| node.sources.clone(),
        |k| {
            if !found && distance(point, &sources.coordinates[k]) <= sources.radii[k] * slack {
                found = true;
            }
        },
    );

    found
}

/// Associate every target of a tree with an expansion center.
///
/// The tree must hold the expansion centers, with their radii, and the sources, with the expansion
/// radius of their degree of freedom as radius.
///
/// # Arguments
/// * `tree` - Tree over sources, centers and targets.
/// * `center_sides` - Side of each center in the caller's center order.
/// * `target_sides` - Required center side of each target in the caller's target order, `None`
///   admits both sides.
/// * `tolerance` - Relative slack `eps` on the center radii.
pub fn associate_targets<T>(
    tree: &SingleNodeTree<T>,
    center_sides: &[i8],
    target_sides: &[Option<i8>],
    tolerance: T,
) -> Vec<TargetState>
where
    T: RealScalar,
{
    let slack = T::one() + tolerance;
    let targets = tree.targets();

    let result = (0..targets.len())
        .into_par_iter()
        .map(|user_index| {
            let point = &targets.coordinates[targets.user_to_tree[user_index]];
            match nearest_center(tree, center_sides, point, target_sides[user_index], slack) {
                Some((center, side)) => TargetState::Associated { center, side },
                None if needs_qbx(tree, point, slack) => TargetState::Failed,
                None => TargetState::Unassociated,
            }
        })
        .collect::<Vec<_>>();

    log::debug!(
        "Associated {} of {} targets, {} failed",
        result.iter().filter(|s| s.center().is_some()).count(),
        result.len(),
        result.iter().filter(|s| s.is_failed()).count()
    );

    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        discretization::Discretization,
        qbx::centers::ExpansionCenters,
        tree::{helpers::points_fixture_annulus, TreeParameters, TreeParticles},
    };

    fn tree_fixture(
        sources: &[[f64; 2]],
        source_radii: &[f64],
        centers: &[[f64; 2]],
        center_radii: &[f64],
        targets: &[[f64; 2]],
    ) -> SingleNodeTree<f64> {
        let particles = TreeParticles {
            sources,
            source_radii,
            centers,
            center_radii,
            targets,
        };
        let parameters = TreeParameters {
            max_leaf_refine_weight: 4,
            ..Default::default()
        };
        SingleNodeTree::new(&particles, &parameters).unwrap()
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let sources = [[0.5, 0.25]];
        let centers = [[0.5, 0.0]];
        let targets = [[0.75, 0.0], [0.76, 0.0]];
        let tree = tree_fixture(&sources, &[0.25], &centers, &[0.25], &targets);

        let states = associate_targets(&tree, &[1], &[None, None], 0.0);
        assert_eq!(states[0], TargetState::Associated { center: 0, side: 1 });
        assert_eq!(states[1], TargetState::Unassociated);
    }

    #[test]
    fn test_tie_break() {
        let sources = [[0.5, 0.0]];
        let centers = [[0.0, 0.0], [1.0, 0.0]];
        let targets = [[0.5, 0.0], [0.5, 0.0], [0.5, 0.0]];
        let tree = tree_fixture(&sources, &[0.6], &centers, &[0.6, 0.6], &targets);

        let states = associate_targets(&tree, &[-1, 1], &[None, Some(1), Some(-1)], 1e-12);
        assert_eq!(states[0], TargetState::Associated { center: 0, side: -1 });
        assert_eq!(states[1], TargetState::Associated { center: 1, side: 1 });
        assert_eq!(states[2], TargetState::Associated { center: 0, side: -1 });
    }

    #[test]
    fn test_failed_targets() {
        // The only center is on the wrong side for the forced target, which sits on a source
        let sources = [[0.0, 0.0]];
        let centers = [[0.0, 0.1]];
        let targets = [[0.0, 0.0], [0.0, 0.0], [3.0, 3.0]];
        let tree = tree_fixture(&sources, &[0.1], &centers, &[0.1], &targets);

        let states = associate_targets(&tree, &[1], &[Some(-1), Some(1), Some(-1)], 1e-12);
        assert_eq!(states[0], TargetState::Failed);
        assert_eq!(states[1], TargetState::Associated { center: 0, side: 1 });
        assert_eq!(states[2], TargetState::Unassociated);
    }

    #[test]
    fn test_matches_brute_force() {
        let discr = Discretization::<f64>::circle(200, 1.0, 4);
        let centers = ExpansionCenters::new(&discr, 0.5).unwrap();
        let targets = points_fixture_annulus::<f64>(2000, 0.8, 1.2, 3);
        let tree = tree_fixture(
            discr.nodes(),
            centers.dof_radii(),
            centers.points(),
            centers.radii(),
            &targets,
        );

        let eps = 1e-10;
        let target_sides = vec![None; targets.len()];
        let states = associate_targets(&tree, centers.sides(), &target_sides, eps);

        for (t, state) in targets.iter().zip(states.iter()) {
            let mut expected = None;
            for (i, c) in centers.points().iter().enumerate() {
                let d = distance(t, c);
                if d <= centers.radii()[i] * (1.0 + eps)
                    && expected.map_or(true, |(best, _)| d < best)
                {
                    expected = Some((d, i));
                }
            }
            assert_eq!(state.center(), expected.map(|(_, i)| i));
            if expected.is_none() {
                let near_source = discr
                    .nodes()
                    .iter()
                    .zip(centers.dof_radii())
                    .any(|(x, r)| distance(t, x) <= r * (1.0 + eps));
                assert_eq!(state.is_failed(), near_source);
            }
        }
    }

    #[test]
    fn test_nearby_targets_never_fail() {
        let discr = Discretization::<f64>::circle(128, 1.0, 8);
        let centers = ExpansionCenters::new(&discr, 0.5).unwrap();

        // Targets strictly inside the disc of every exterior center
        let targets = centers
            .points()
            .iter()
            .zip(centers.radii())
            .zip(centers.sides())
            .filter(|(_, &side)| side == 1)
            .map(|((c, r), _)| [c[0] + 0.3 * r, c[1] - 0.2 * r])
            .collect::<Vec<_>>();

        let tree = tree_fixture(
            discr.nodes(),
            centers.dof_radii(),
            centers.points(),
            centers.radii(),
            &targets,
        );
        let target_sides = vec![Some(1); targets.len()];
        let states = associate_targets(&tree, centers.sides(), &target_sides, 1e-12);

        for (t, state) in targets.iter().zip(states.iter()) {
            let center = state.center().unwrap();
            assert_eq!(centers.sides()[center], 1);
            assert!(distance(t, &centers.points()[center]) <= centers.radii()[center]);
        }
    }
}
