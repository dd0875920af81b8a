//! Helmholtz expansion wrangler with precomputed translation tables.
//!
//! Particle data stays in the caller's order and is reached through the tree's index maps. All
//! boxes of a level share one expansion order and one side length, so M2M and L2L translations
//! depend only on a child's position within its parent, and M2L translations only on the transfer
//! vector between the two boxes. The weights of every such translation are tabulated per level when
//! the wrangler is built.
use std::collections::HashMap;

use num_complex::Complex;

use crate::{
    expansion::{
        helmholtz::{Helmholtz2d, Translation},
        ExpansionKernel, PointSource,
    },
    fmm::{
        types::{BoxExpansions, FmmBackend, Potentials, QbxExpansions},
        wrangler::WranglerParameters,
    },
    qbx::{
        geometry::GeometryData,
        instruction::{SourceDerivative, TargetDerivative},
    },
    traits::{
        general::RealScalar,
        types::QbxError,
        wrangler::{
            ExpansionWrangler, QbxTranslation, SourceToTargetTranslation, SourceTranslation,
            TargetTranslation,
        },
    },
    tree::types::{MortonKey, TreeBox},
};

type TranslationTable<T> = HashMap<[i64; 2], Vec<Complex<T>>>;

/// Helmholtz wrangler operating on arrays in the caller's order.
pub struct HelmholtzHostWrangler<'a, T>
where
    T: RealScalar,
{
    geometry: &'a GeometryData<T>,
    kernel: Helmholtz2d<T>,
    source_derivative: SourceDerivative,
    target_derivatives: Vec<TargetDerivative>,
    order: usize,
    qbx_order: usize,

    /// Multipole to multipole weights by child level, keyed by the child's position in its parent.
    m2m: Vec<TranslationTable<T>>,

    /// Local to local weights by child level, keyed by the child's position in its parent.
    l2l: Vec<TranslationTable<T>>,

    /// Multipole to local weights by level, keyed by transfer vector from source to target box.
    m2l: Vec<TranslationTable<T>>,
}

/// Position of a box within its parent, each component zero or one.
fn child_position(parent: &MortonKey, child: &MortonKey) -> [i64; 2] {
    MortonKey::from_anchor(parent.anchor(), child.level()).transfer_vector(child)
}

impl<'a, T> HelmholtzHostWrangler<'a, T>
where
    T: RealScalar,
{
    /// Constructor, tabulates the translation weights of every level.
    ///
    /// # Arguments
    /// * `geometry` - Geometry the wrangler operates on.
    /// * `kernel` - Helmholtz expansions.
    /// * `parameters` - Derivatives and expansion orders, the FMM order must be equal on every level.
    pub fn new(
        geometry: &'a GeometryData<T>,
        kernel: Helmholtz2d<T>,
        parameters: WranglerParameters<T>,
    ) -> Result<Self, QbxError> {
        let order = parameters.fmm_orders.first().copied().unwrap_or(0);
        if parameters.fmm_orders.iter().any(|&p| p != order) {
            return Err(QbxError::ConfigurationConflict(format!(
                "the '{}' backend requires one FMM order on every level, found {:?}",
                FmmBackend::HelmholtzHost.name(),
                parameters.fmm_orders
            )));
        }

        let tree = geometry.tree();
        let traversal = geometry.traversal();
        let depth = tree.depth();
        let half = T::real(0.5);

        let mut m2m = vec![TranslationTable::new(); depth as usize + 1];
        let mut l2l = vec![TranslationTable::new(); depth as usize + 1];
        let mut m2l = vec![TranslationTable::new(); depth as usize + 1];

        for level in 0..=depth {
            let boxes = tree.boxes_at_level(level);
            let side = tree.domain().side_length * half.powi(level as i32);

            for ibox in boxes {
                let node = tree.node(ibox);

                if let Some(parent) = node.parent {
                    let position = child_position(&tree.node(parent).key, &node.key);
                    // Child centre relative to its parent's centre
                    let offset = [
                        (T::real(position[0] as f64) - half) * side,
                        (T::real(position[1] as f64) - half) * side,
                    ];

                    m2m[level as usize].entry(position).or_insert_with(|| {
                        kernel.translation_weights(
                            Translation::MultipoleToMultipole,
                            order,
                            order,
                            &[-offset[0], -offset[1]],
                        )
                    });
                    l2l[level as usize].entry(position).or_insert_with(|| {
                        kernel.translation_weights(Translation::LocalToLocal, order, order, &offset)
                    });
                }

                for &source in traversal.from_sep_siblings().get(ibox) {
                    let transfer = tree.node(source).key.transfer_vector(&node.key);
                    m2l[level as usize].entry(transfer).or_insert_with(|| {
                        let displacement = [
                            T::real(transfer[0] as f64) * side,
                            T::real(transfer[1] as f64) * side,
                        ];
                        kernel.translation_weights(
                            Translation::MultipoleToLocal,
                            order,
                            order,
                            &displacement,
                        )
                    });
                }
            }
        }

        log::debug!(
            "Tabulated {} M2M, {} L2L and {} M2L translations",
            m2m.iter().map(|t| t.len()).sum::<usize>(),
            l2l.iter().map(|t| t.len()).sum::<usize>(),
            m2l.iter().map(|t| t.len()).sum::<usize>()
        );

        Ok(Self {
            geometry,
            kernel,
            source_derivative: parameters.source_derivative,
            target_derivatives: parameters.target_derivatives,
            order,
            qbx_order: parameters.qbx_order,
            m2m,
            l2l,
            m2l,
        })
    }

    /// Point source of the source with a given tree index.
    fn source(&self, strengths: &[Complex<T>], tree_index: usize) -> PointSource<T> {
        let user = self.geometry.tree().sources().tree_to_user[tree_index];
        let discretization = self.geometry.discretization();
        PointSource {
            position: discretization.nodes()[user],
            strength: strengths[user],
            dipole: match self.source_derivative {
                SourceDerivative::None => None,
                SourceDerivative::Normal => Some(discretization.normals()[user]),
            },
        }
    }

    /// Coordinates of the target with a given tree index.
    fn target(&self, tree_index: usize) -> &[T; 2] {
        let user = self.geometry.tree().targets().tree_to_user[tree_index];
        &self.geometry.target_info().targets[user]
    }

    fn sources_of<'b>(
        &'b self,
        strengths: &'b [Complex<T>],
        node: &TreeBox<T>,
    ) -> impl Iterator<Item = PointSource<T>> + 'b {
        node.sources.clone().map(move |k| self.source(strengths, k))
    }

    fn accumulate<F>(&self, values: &mut [Complex<T>], f: F)
    where
        F: Fn(TargetDerivative) -> Complex<T>,
    {
        for (value, &derivative) in values.iter_mut().zip(self.target_derivatives.iter()) {
            *value += f(derivative);
        }
    }

    /// Visit the non-QBX targets of every target box with their position in the filtered list and
    /// their tree index.
    fn non_qbx_targets(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let non_qbx = self.geometry.non_qbx_box_target_lists();
        non_qbx
            .box_target_starts
            .windows(2)
            .enumerate()
            .flat_map(move |(target_box, window)| {
                (window[0]..window[1])
                    .map(move |i| (target_box, i, non_qbx.filtered_to_unfiltered[i]))
            })
    }

    fn qbx_center(&self, position: usize) -> (&[T; 2], T) {
        let center = self.geometry.global_qbx_centers()[position];
        let centers = self.geometry.centers();
        (&centers.points()[center], centers.radii()[center])
    }

    fn table_entry<'b>(
        table: &'b TranslationTable<T>,
        key: &[i64; 2],
    ) -> Result<&'b [Complex<T>], QbxError> {
        table.get(key).map(|w| w.as_slice()).ok_or_else(|| {
            QbxError::InvalidInput(format!("No tabulated translation for {key:?}"))
        })
    }
}

impl<T> SourceTranslation<T> for HelmholtzHostWrangler<'_, T>
where
    T: RealScalar,
{
    fn p2m(
        &self,
        strengths: &[Complex<T>],
        multipoles: &mut BoxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let ncoeffs = self.kernel.ncoeffs(self.order);

        for &leaf in tree.leaves() {
            let node = tree.node(leaf);
            let level = node.key.level();
            let offset = (leaf - multipoles.first_box(level)) * ncoeffs;
            let coeffs = &mut multipoles.level_mut(level)[offset..offset + ncoeffs];
            for source in self.sources_of(strengths, node) {
                self.kernel.p2m(self.order, &node.centre, &source, coeffs);
            }
        }

        Ok(())
    }

    fn m2m(&self, level: u64, multipoles: &mut BoxExpansions<T>) -> Result<(), QbxError> {
        if level == 0 {
            return Ok(());
        }

        let tree = self.geometry.tree();
        let ncoeffs = self.kernel.ncoeffs(self.order);
        let first_child = multipoles.first_box(level);
        let first_parent = multipoles.first_box(level - 1);
        let table = &self.m2m[level as usize];
        let (parents, children) = multipoles.parent_and_child_levels_mut(level);

        for child in tree.boxes_at_level(level) {
            let node = tree.node(child);
            if let Some(parent) = node.parent {
                let weights =
                    Self::table_entry(table, &child_position(&tree.node(parent).key, &node.key))?;
                let c = (child - first_child) * ncoeffs;
                let p = (parent - first_parent) * ncoeffs;
                Helmholtz2d::apply_translation(
                    self.order,
                    &children[c..c + ncoeffs],
                    self.order,
                    &mut parents[p..p + ncoeffs],
                    weights,
                );
            }
        }

        Ok(())
    }
}

impl<T> SourceToTargetTranslation<T> for HelmholtzHostWrangler<'_, T>
where
    T: RealScalar,
{
    fn m2l(
        &self,
        level: u64,
        multipoles: &BoxExpansions<T>,
        locals: &mut BoxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list2 = self.geometry.traversal().from_sep_siblings();
        let ncoeffs = self.kernel.ncoeffs(self.order);
        let first = locals.first_box(level);
        let table = &self.m2l[level as usize];
        let level_locals = locals.level_mut(level);

        for target in tree.boxes_at_level(level) {
            let offset = (target - first) * ncoeffs;
            let local = &mut level_locals[offset..offset + ncoeffs];
            for &source in list2.get(target) {
                let transfer = tree.node(source).key.transfer_vector(&tree.node(target).key);
                Helmholtz2d::apply_translation(
                    self.order,
                    multipoles.get(source),
                    self.order,
                    local,
                    Self::table_entry(table, &transfer)?,
                );
            }
        }

        Ok(())
    }

    fn p2l(
        &self,
        strengths: &[Complex<T>],
        locals: &mut BoxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list4 = self.geometry.traversal().from_sep_bigger();
        let ncoeffs = self.kernel.ncoeffs(self.order);

        for target in 0..tree.nboxes() {
            let node = tree.node(target);
            let level = node.key.level();
            let offset = (target - locals.first_box(level)) * ncoeffs;
            let local = &mut locals.level_mut(level)[offset..offset + ncoeffs];
            for &source_box in list4.get(target) {
                for source in self.sources_of(strengths, tree.node(source_box)) {
                    self.kernel.p2l(self.order, &node.centre, &source, local);
                }
            }
        }

        Ok(())
    }
}

impl<T> TargetTranslation<T> for HelmholtzHostWrangler<'_, T>
where
    T: RealScalar,
{
    fn l2l(&self, level: u64, locals: &mut BoxExpansions<T>) -> Result<(), QbxError> {
        if level == 0 {
            return Ok(());
        }

        let tree = self.geometry.tree();
        let ncoeffs = self.kernel.ncoeffs(self.order);
        let first_child = locals.first_box(level);
        let first_parent = locals.first_box(level - 1);
        let table = &self.l2l[level as usize];
        let (parents, children) = locals.parent_and_child_levels_mut(level);

        for child in tree.boxes_at_level(level) {
            let node = tree.node(child);
            if let Some(parent) = node.parent {
                let weights =
                    Self::table_entry(table, &child_position(&tree.node(parent).key, &node.key))?;
                let c = (child - first_child) * ncoeffs;
                let p = (parent - first_parent) * ncoeffs;
                Helmholtz2d::apply_translation(
                    self.order,
                    &parents[p..p + ncoeffs],
                    self.order,
                    &mut children[c..c + ncoeffs],
                    weights,
                );
            }
        }

        Ok(())
    }

    fn m2p(
        &self,
        multipoles: &BoxExpansions<T>,
        potentials: &mut Potentials<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list3 = self.geometry.traversal().from_sep_smaller();

        for (target_box, i, t) in self.non_qbx_targets() {
            let point = self.target(t);
            for &source_box in list3.get(target_box) {
                let centre = &tree.node(source_box).centre;
                let coeffs = multipoles.get(source_box);
                self.accumulate(potentials.target_mut(i), |d| {
                    self.kernel.m2p(self.order, centre, coeffs, point, d)
                });
            }
        }

        Ok(())
    }

    fn l2p(
        &self,
        locals: &BoxExpansions<T>,
        potentials: &mut Potentials<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let target_boxes = self.geometry.traversal().target_boxes();

        for (target_box, i, t) in self.non_qbx_targets() {
            let leaf = target_boxes[target_box];
            let centre = &tree.node(leaf).centre;
            let coeffs = locals.get(leaf);
            let point = self.target(t);
            self.accumulate(potentials.target_mut(i), |d| {
                self.kernel.l2p(self.order, centre, coeffs, point, d)
            });
        }

        Ok(())
    }

    fn p2p(
        &self,
        strengths: &[Complex<T>],
        potentials: &mut Potentials<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list1 = self.geometry.traversal().neighbor_source_boxes();

        for (target_box, i, t) in self.non_qbx_targets() {
            let point = self.target(t);
            for &source_box in list1.get(target_box) {
                for source in self.sources_of(strengths, tree.node(source_box)) {
                    self.accumulate(potentials.target_mut(i), |d| {
                        self.kernel.p2p(&source, point, d)
                    });
                }
            }
        }

        Ok(())
    }
}

impl<T> QbxTranslation<T> for HelmholtzHostWrangler<'_, T>
where
    T: RealScalar,
{
    fn p2qbxl(
        &self,
        strengths: &[Complex<T>],
        qbx: &mut QbxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list1 = self.geometry.traversal().neighbor_source_boxes();
        let target_boxes = self.geometry.qbx_center_to_target_box();
        let ncoeffs = qbx.ncoeffs;

        for (position, coeffs) in qbx.coefficients.chunks_exact_mut(ncoeffs).enumerate() {
            let (centre, _) = self.qbx_center(position);
            for &source_box in list1.get(target_boxes[position]) {
                for source in self.sources_of(strengths, tree.node(source_box)) {
                    self.kernel.p2l(self.qbx_order, centre, &source, coeffs);
                }
            }
        }

        Ok(())
    }

    fn m2qbxl(
        &self,
        strengths: &[Complex<T>],
        multipoles: &BoxExpansions<T>,
        qbx: &mut QbxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let traversal = self.geometry.traversal();
        let list3 = traversal.from_sep_smaller();
        let target_boxes = self.geometry.qbx_center_to_target_box();
        let ncoeffs = qbx.ncoeffs;

        for (position, coeffs) in qbx.coefficients.chunks_exact_mut(ncoeffs).enumerate() {
            let (centre, radius) = self.qbx_center(position);
            for &source_box in list3.get(target_boxes[position]) {
                let node = tree.node(source_box);
                if traversal.is_disc_separated(tree, source_box, centre, radius) {
                    self.kernel.m2l(
                        self.order,
                        &node.centre,
                        multipoles.get(source_box),
                        self.qbx_order,
                        centre,
                        coeffs,
                    );
                } else {
                    for source in self.sources_of(strengths, node) {
                        self.kernel.p2l(self.qbx_order, centre, &source, coeffs);
                    }
                }
            }
        }

        Ok(())
    }

    fn l2qbxl(
        &self,
        locals: &BoxExpansions<T>,
        qbx: &mut QbxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let leaves = self.geometry.traversal().target_boxes();
        let target_boxes = self.geometry.qbx_center_to_target_box();
        let ncoeffs = qbx.ncoeffs;

        for (position, coeffs) in qbx.coefficients.chunks_exact_mut(ncoeffs).enumerate() {
            let (centre, _) = self.qbx_center(position);
            let leaf = leaves[target_boxes[position]];
            self.kernel.l2l(
                self.order,
                &tree.node(leaf).centre,
                locals.get(leaf),
                self.qbx_order,
                centre,
                coeffs,
            );
        }

        Ok(())
    }

    fn qbxl2p(
        &self,
        qbx: &QbxExpansions<T>,
        potentials: &mut Potentials<T>,
    ) -> Result<(), QbxError> {
        let tree_to_user = &self.geometry.tree().targets().tree_to_user;
        let center_targets = self.geometry.center_to_tree_targets();

        for position in 0..self.geometry.global_qbx_centers().len() {
            let (centre, _) = self.qbx_center(position);
            let coeffs = qbx.get(position);
            for &t in center_targets.get(position) {
                let point = self.target(t);
                self.accumulate(potentials.target_mut(tree_to_user[t]), |d| {
                    self.kernel.l2p(self.qbx_order, centre, coeffs, point, d)
                });
            }
        }

        Ok(())
    }
}

impl<T> ExpansionWrangler<T> for HelmholtzHostWrangler<'_, T>
where
    T: RealScalar,
{
    fn backend(&self) -> FmmBackend {
        FmmBackend::HelmholtzHost
    }

    fn depth(&self) -> u64 {
        self.geometry.tree().depth()
    }

    fn multipole_zeros(&self) -> BoxExpansions<T> {
        let nlevels = self.depth() as usize + 1;
        BoxExpansions::zeros(self.geometry.tree(), vec![self.order; nlevels], |p| {
            self.kernel.ncoeffs(p)
        })
    }

    fn local_zeros(&self) -> BoxExpansions<T> {
        self.multipole_zeros()
    }

    fn qbx_local_zeros(&self) -> QbxExpansions<T> {
        QbxExpansions::zeros(
            self.geometry.global_qbx_centers().len(),
            self.qbx_order,
            self.kernel.ncoeffs(self.qbx_order),
        )
    }

    fn output_zeros(&self) -> Potentials<T> {
        Potentials::zeros(
            self.geometry.non_qbx_box_target_lists().len(),
            self.target_derivatives.len(),
        )
    }

    fn full_output_zeros(&self) -> Potentials<T> {
        Potentials::zeros(self.geometry.ntargets(), self.target_derivatives.len())
    }

    fn reorder_sources(&self, strengths: &[Complex<T>]) -> Vec<Complex<T>> {
        strengths.to_vec()
    }

    fn merge_non_qbx_potentials(&self, non_qbx: &Potentials<T>, full: &mut Potentials<T>) {
        let filtered = &self.geometry.non_qbx_box_target_lists().filtered_to_unfiltered;
        let tree_to_user = &self.geometry.tree().targets().tree_to_user;
        for (i, &t) in filtered.iter().enumerate() {
            for (p, v) in full.target_mut(tree_to_user[t]).iter_mut().zip(non_qbx.target(i)) {
                *p += *v;
            }
        }
    }

    fn finalize_potentials(&self, potentials: Potentials<T>) -> Vec<Vec<Complex<T>>> {
        potentials.into_kernel_major(self.kernel.scale(), None)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        discretization::Discretization,
        qbx::{
            centers::ExpansionCenters,
            config::QbxConfigBuilder,
            geometry::TargetGroup,
            instruction::{ForcedLimit, Kernel2d},
        },
    };

    fn geometry_fixture() -> GeometryData<f64> {
        let discr = Arc::new(Discretization::<f64>::circle(512, 1.0, 4));
        let centers = Arc::new(ExpansionCenters::new(&discr, 0.5).unwrap());
        let targets = [[0.2, 0.1], [1.5, -0.3]];
        let config = QbxConfigBuilder::new()
            .qbx_order(4)
            .unwrap()
            .fmm_order(12)
            .unwrap()
            .max_leaf_refine_weight(32)
            .unwrap()
            .build()
            .unwrap();
        let groups = [TargetGroup {
            name: "points",
            points: &targets,
            is_self: false,
            forced_limit: ForcedLimit::Unforced,
        }];
        GeometryData::new(discr, centers, &groups, &config).unwrap()
    }

    fn parameters(geometry: &GeometryData<f64>, order: usize) -> WranglerParameters<f64> {
        WranglerParameters {
            kernel: Kernel2d::helmholtz("k"),
            wavenumber: Some(2.0),
            source_derivative: SourceDerivative::None,
            target_derivatives: vec![TargetDerivative::Value],
            fmm_orders: vec![order; geometry.tree().depth() as usize + 1],
            qbx_order: 4,
        }
    }

    #[test]
    fn test_unequal_orders() {
        let geometry = geometry_fixture();
        let mut parameters = parameters(&geometry, 12);
        parameters.fmm_orders[0] = 8;
        let kernel = Helmholtz2d::new(2.0).unwrap();

        let result = HelmholtzHostWrangler::new(&geometry, kernel, parameters);
        assert!(matches!(result, Err(QbxError::ConfigurationConflict(_))));
    }

    #[test]
    fn test_tables_match_direct_translations() {
        let geometry = geometry_fixture();
        let tree = geometry.tree();
        let kernel = Helmholtz2d::new(2.0).unwrap();
        let order = 12;
        let wrangler =
            HelmholtzHostWrangler::new(&geometry, kernel, parameters(&geometry, order)).unwrap();
        let ncoeffs = kernel.ncoeffs(order);

        let source = PointSource {
            position: [0.01, -0.02],
            strength: Complex::new(1.0, 0.5),
            dipole: None,
        };

        let mut checked = 0;
        for ibox in 0..tree.nboxes() {
            let node = tree.node(ibox);
            let level = node.key.level() as usize;

            if let Some(parent) = node.parent {
                let parent_node = tree.node(parent);
                let position = child_position(&parent_node.key, &node.key);

                // Multipole of the child, moved to the parent
                let mut child = vec![Complex::new(0.0, 0.0); ncoeffs];
                let src = PointSource {
                    position: [node.centre[0] + 0.01, node.centre[1] - 0.02],
                    ..source
                };
                kernel.p2m(order, &node.centre, &src, &mut child);

                let mut expected = vec![Complex::new(0.0, 0.0); ncoeffs];
                kernel.m2m(order, &node.centre, &child, order, &parent_node.centre, &mut expected);
                let mut found = vec![Complex::new(0.0, 0.0); ncoeffs];
                Helmholtz2d::apply_translation(
                    order,
                    &child,
                    order,
                    &mut found,
                    &wrangler.m2m[level][&position],
                );
                for (a, b) in found.iter().zip(expected.iter()) {
                    assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
                    assert_relative_eq!(a.im, b.im, epsilon = 1e-12);
                }
                checked += 1;
            }

            for &other in geometry.traversal().from_sep_siblings().get(ibox) {
                let other_node = tree.node(other);
                let transfer = other_node.key.transfer_vector(&node.key);

                let mut multipole = vec![Complex::new(0.0, 0.0); ncoeffs];
                let src = PointSource {
                    position: [other_node.centre[0] + 0.01, other_node.centre[1] - 0.02],
                    ..source
                };
                kernel.p2m(order, &other_node.centre, &src, &mut multipole);

                let mut expected = vec![Complex::new(0.0, 0.0); ncoeffs];
                kernel.m2l(order, &other_node.centre, &multipole, order, &node.centre, &mut expected);
                let mut found = vec![Complex::new(0.0, 0.0); ncoeffs];
                Helmholtz2d::apply_translation(
                    order,
                    &multipole,
                    order,
                    &mut found,
                    &wrangler.m2l[level][&transfer],
                );
                for (a, b) in found.iter().zip(expected.iter()) {
                    assert_relative_eq!(a.re, b.re, epsilon = 1e-10, max_relative = 1e-10);
                    assert_relative_eq!(a.im, b.im, epsilon = 1e-10, max_relative = 1e-10);
                }
                checked += 1;
            }
        }

        assert!(checked > 0);
    }
}
