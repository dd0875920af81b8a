//! Operation count model of an evaluation.
//!
//! Counts the interactions each stage would perform on a geometry, without forming any expansion.
//! One interaction is one particle contribution, one translation or one expansion evaluation.
use crate::{
    qbx::geometry::GeometryData,
    traits::{general::RealScalar, types::FmmOperatorType},
};

/// Modeled interaction counts per stage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeledCost {
    /// Stages with their interaction counts, in execution order.
    pub counts: Vec<(FmmOperatorType, u64)>,
}

impl ModeledCost {
    /// Model the FMM on a geometry.
    pub fn fmm<T>(geometry: &GeometryData<T>) -> Self
    where
        T: RealScalar,
    {
        let tree = geometry.tree();
        let traversal = geometry.traversal();
        let depth = tree.depth();
        let nsources = |ibox: usize| tree.node(ibox).sources.len() as u64;
        let non_qbx = geometry.non_qbx_box_target_lists();
        let n_non_qbx = |target_box: usize| {
            (non_qbx.box_target_starts[target_box + 1] - non_qbx.box_target_starts[target_box])
                as u64
        };

        let mut counts = vec![(FmmOperatorType::P2M, tree.sources().len() as u64)];

        for level in (1..=depth).rev() {
            counts.push((FmmOperatorType::M2M(level), tree.boxes_at_level(level).len() as u64));
        }

        let p2l = (0..tree.nboxes())
            .map(|ibox| {
                traversal
                    .from_sep_bigger()
                    .get(ibox)
                    .iter()
                    .map(|&s| nsources(s))
                    .sum::<u64>()
            })
            .sum();
        counts.push((FmmOperatorType::P2L, p2l));

        for level in 0..=depth {
            if level > 0 {
                counts.push((FmmOperatorType::L2L(level), tree.boxes_at_level(level).len() as u64));
            }
            let m2l = tree
                .boxes_at_level(level)
                .map(|ibox| traversal.from_sep_siblings().get(ibox).len() as u64)
                .sum();
            counts.push((FmmOperatorType::M2L(level), m2l));
        }

        let ntarget_boxes = traversal.target_boxes().len();
        let p2p = (0..ntarget_boxes)
            .map(|t| {
                n_non_qbx(t)
                    * traversal
                        .neighbor_source_boxes()
                        .get(t)
                        .iter()
                        .map(|&s| nsources(s))
                        .sum::<u64>()
            })
            .sum();
        let m2p = (0..ntarget_boxes)
            .map(|t| n_non_qbx(t) * traversal.from_sep_smaller().get(t).len() as u64)
            .sum();
        counts.push((FmmOperatorType::P2P, p2p));
        counts.push((FmmOperatorType::M2P, m2p));
        counts.push((FmmOperatorType::L2P, non_qbx.len() as u64));

        let center_boxes = geometry.qbx_center_to_target_box();
        let centers = geometry.centers();
        let mut p2qbxl = 0;
        let mut m2qbxl = 0;
        for (&center, &t) in geometry.global_qbx_centers().iter().zip(center_boxes.iter()) {
            let (point, radius) = (&centers.points()[center], centers.radii()[center]);
            p2qbxl += traversal
                .neighbor_source_boxes()
                .get(t)
                .iter()
                .map(|&s| nsources(s))
                .sum::<u64>();

            // List 3 boxes too close to the expansion disc contribute their sources directly
            for &s in traversal.from_sep_smaller().get(t) {
                if traversal.is_disc_separated(tree, s, point, radius) {
                    m2qbxl += 1;
                } else {
                    p2qbxl += nsources(s);
                }
            }
        }
        counts.push((FmmOperatorType::P2QBXL, p2qbxl));
        counts.push((FmmOperatorType::M2QBXL, m2qbxl));
        counts.push((FmmOperatorType::L2QBXL, center_boxes.len() as u64));
        counts.push((
            FmmOperatorType::QBXL2P,
            geometry.center_to_tree_targets().n_interactions() as u64,
        ));

        Self { counts }
    }

    /// Model the direct evaluation of a geometry.
    pub fn direct<T>(geometry: &GeometryData<T>) -> Self
    where
        T: RealScalar,
    {
        let nsources = geometry.discretization().ndofs() as u64;
        let ncenters = geometry.global_qbx_centers().len() as u64;
        let nassociated = geometry
            .user_target_to_center()
            .iter()
            .filter(|c| c.is_some())
            .count() as u64;

        Self {
            counts: vec![
                (FmmOperatorType::P2P, geometry.non_qbx_box_target_lists().len() as u64 * nsources),
                (FmmOperatorType::P2QBXL, ncenters * nsources),
                (FmmOperatorType::QBXL2P, nassociated),
            ],
        }
    }

    /// Interaction count of a stage, summed over levels for per level stages.
    pub fn count(&self, operator: FmmOperatorType) -> u64 {
        self.counts
            .iter()
            .filter(|(o, _)| *o == operator)
            .map(|(_, c)| c)
            .sum()
    }

    /// Total interaction count.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, c)| c).sum()
    }
}
