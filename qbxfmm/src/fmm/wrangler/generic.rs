//! Tree ordered expansion wrangler for any [`ExpansionKernel`].
//!
//! Sources and targets are processed in tree order. Every stage runs in parallel over the boxes of
//! a level, over target boxes or over QBX centers, each task writing to its own disjoint slice of
//! the output buffer.
use itertools::Itertools;
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    expansion::{ExpansionKernel, PointSource},
    fmm::{
        constants::{L2L_MAX_CHUNK_SIZE, M2M_MAX_CHUNK_SIZE, P2M_MAX_CHUNK_SIZE},
        helpers::{chunk_size, split_by_starts},
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
};

/// Expansion wrangler operating on tree ordered arrays.
pub struct GenericWrangler<'a, T, K>
where
    T: RealScalar,
    K: ExpansionKernel<T>,
{
    geometry: &'a GeometryData<T>,
    kernel: K,
    dipoles: Option<Vec<[T; 2]>>,
    target_derivatives: Vec<TargetDerivative>,
    fmm_orders: Vec<usize>,
    qbx_order: usize,
}

impl<'a, T, K> GenericWrangler<'a, T, K>
where
    T: RealScalar,
    K: ExpansionKernel<T>,
{
    /// Constructor.
    ///
    /// # Arguments
    /// * `geometry` - Geometry the wrangler operates on.
    /// * `kernel` - Expansions of the base kernel.
    /// * `parameters` - Derivatives and expansion orders.
    pub fn new(geometry: &'a GeometryData<T>, kernel: K, parameters: WranglerParameters<T>) -> Self {
        let dipoles = match parameters.source_derivative {
            SourceDerivative::None => None,
            SourceDerivative::Normal => {
                let normals = geometry.discretization().normals();
                Some(
                    geometry
                        .tree()
                        .sources()
                        .tree_to_user
                        .iter()
                        .map(|&i| normals[i])
                        .collect(),
                )
            }
        };

        Self {
            geometry,
            kernel,
            dipoles,
            target_derivatives: parameters.target_derivatives,
            fmm_orders: parameters.fmm_orders,
            qbx_order: parameters.qbx_order,
        }
    }

    fn source(&self, strengths: &[Complex<T>], k: usize) -> PointSource<T> {
        PointSource {
            position: self.geometry.tree().sources().coordinates[k],
            strength: strengths[k],
            dipole: self.dipoles.as_ref().map(|d| d[k]),
        }
    }

    fn box_order(&self, ibox: usize) -> usize {
        self.fmm_orders[self.geometry.tree().node(ibox).key.level() as usize]
    }

    fn nkernels(&self) -> usize {
        self.target_derivatives.len()
    }

    /// Accumulate one value per target derivative.
    fn accumulate<F>(&self, values: &mut [Complex<T>], f: F)
    where
        F: Fn(TargetDerivative) -> Complex<T>,
    {
        for (value, &derivative) in values.iter_mut().zip(self.target_derivatives.iter()) {
            *value += f(derivative);
        }
    }

    /// Run `f` on the potentials of the non-QBX targets of every target box in parallel, with the
    /// target box index and the tree indices of its targets.
    fn for_each_target_box<F>(&self, potentials: &mut Potentials<T>, f: F)
    where
        F: Fn(usize, &[usize], &mut [Complex<T>]) + Sync,
    {
        let non_qbx = self.geometry.non_qbx_box_target_lists();
        let nkernels = potentials.nkernels();
        let slices = split_by_starts(&mut potentials.values, &non_qbx.box_target_starts, nkernels);

        slices
            .into_par_iter()
            .enumerate()
            .for_each(|(target_box, values)| {
                let range = non_qbx.box_target_starts[target_box]
                    ..non_qbx.box_target_starts[target_box + 1];
                if !range.is_empty() {
                    f(target_box, &non_qbx.filtered_to_unfiltered[range], values);
                }
            });
    }

    fn qbx_center(&self, position: usize) -> (&[T; 2], T) {
        let center = self.geometry.global_qbx_centers()[position];
        let centers = self.geometry.centers();
        (&centers.points()[center], centers.radii()[center])
    }

    /// Run `f` on the expansion of every QBX center in parallel, with the center's position in the
    /// list of global QBX centers and its target box.
    fn for_each_qbx_center<F>(&self, qbx: &mut QbxExpansions<T>, f: F)
    where
        F: Fn(usize, usize, &mut [Complex<T>]) + Sync,
    {
        let ncoeffs = qbx.ncoeffs;
        let target_boxes = self.geometry.qbx_center_to_target_box();
        qbx.coefficients
            .par_chunks_exact_mut(ncoeffs)
            .enumerate()
            .for_each(|(position, coeffs)| f(position, target_boxes[position], coeffs));
    }
}

impl<T, K> SourceTranslation<T> for GenericWrangler<'_, T, K>
where
    T: RealScalar,
    K: ExpansionKernel<T>,
{
    fn p2m(
        &self,
        strengths: &[Complex<T>],
        multipoles: &mut BoxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();

        for level in 0..=tree.depth() {
            let order = multipoles.order(level);
            let ncoeffs = multipoles.ncoeffs(level);
            let first = multipoles.first_box(level);
            let chunk = chunk_size(tree.boxes_at_level(level).len(), P2M_MAX_CHUNK_SIZE);

            multipoles
                .level_mut(level)
                .par_chunks_exact_mut(ncoeffs * chunk)
                .enumerate()
                .for_each(|(i, chunk_coeffs)| {
                    for (j, coeffs) in chunk_coeffs.chunks_exact_mut(ncoeffs).enumerate() {
                        let node = tree.node(first + i * chunk + j);
                        if node.children.is_empty() {
                            for k in node.sources.clone() {
                                self.kernel
                                    .p2m(order, &node.centre, &self.source(strengths, k), coeffs);
                            }
                        }
                    }
                });
        }

        Ok(())
    }

    fn m2m(&self, level: u64, multipoles: &mut BoxExpansions<T>) -> Result<(), QbxError> {
        if level == 0 {
            return Ok(());
        }

        let tree = self.geometry.tree();
        let child_order = multipoles.order(level);
        let child_ncoeffs = multipoles.ncoeffs(level);
        let first_child = multipoles.first_box(level);
        let parent_order = multipoles.order(level - 1);
        let parent_ncoeffs = multipoles.ncoeffs(level - 1);
        let first_parent = multipoles.first_box(level - 1);
        let chunk = chunk_size(tree.boxes_at_level(level - 1).len(), M2M_MAX_CHUNK_SIZE);

        let (parents, children) = multipoles.parent_and_child_levels_mut(level);
        let children = &*children;

        parents
            .par_chunks_exact_mut(parent_ncoeffs * chunk)
            .enumerate()
            .for_each(|(i, chunk_coeffs)| {
                for (j, parent) in chunk_coeffs.chunks_exact_mut(parent_ncoeffs).enumerate() {
                    let node = tree.node(first_parent + i * chunk + j);
                    for &child in node.children.iter() {
                        let offset = (child - first_child) * child_ncoeffs;
                        self.kernel.m2m(
                            child_order,
                            &tree.node(child).centre,
                            &children[offset..offset + child_ncoeffs],
                            parent_order,
                            &node.centre,
                            parent,
                        );
                    }
                }
            });

        Ok(())
    }
}

impl<T, K> SourceToTargetTranslation<T> for GenericWrangler<'_, T, K>
where
    T: RealScalar,
    K: ExpansionKernel<T>,
{
    fn m2l(
        &self,
        level: u64,
        multipoles: &BoxExpansions<T>,
        locals: &mut BoxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list2 = self.geometry.traversal().from_sep_siblings();
        let order = locals.order(level);
        let ncoeffs = locals.ncoeffs(level);
        let first = locals.first_box(level);

        locals
            .level_mut(level)
            .par_chunks_exact_mut(ncoeffs)
            .enumerate()
            .for_each(|(i, local)| {
                let target = first + i;
                let centre = &tree.node(target).centre;
                for &source in list2.get(target) {
                    self.kernel.m2l(
                        multipoles.order(level),
                        &tree.node(source).centre,
                        multipoles.get(source),
                        order,
                        centre,
                        local,
                    );
                }
            });

        Ok(())
    }

    fn p2l(
        &self,
        strengths: &[Complex<T>],
        locals: &mut BoxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list4 = self.geometry.traversal().from_sep_bigger();

        for level in 0..=tree.depth() {
            let order = locals.order(level);
            let ncoeffs = locals.ncoeffs(level);
            let first = locals.first_box(level);

            locals
                .level_mut(level)
                .par_chunks_exact_mut(ncoeffs)
                .enumerate()
                .for_each(|(i, local)| {
                    let target = first + i;
                    let centre = &tree.node(target).centre;
                    for &source_box in list4.get(target) {
                        for k in tree.node(source_box).sources.clone() {
                            self.kernel
                                .p2l(order, centre, &self.source(strengths, k), local);
                        }
                    }
                });
        }

        Ok(())
    }
}

impl<T, K> TargetTranslation<T> for GenericWrangler<'_, T, K>
where
    T: RealScalar,
    K: ExpansionKernel<T>,
{
    fn l2l(&self, level: u64, locals: &mut BoxExpansions<T>) -> Result<(), QbxError> {
        if level == 0 {
            return Ok(());
        }

        let tree = self.geometry.tree();
        let child_order = locals.order(level);
        let child_ncoeffs = locals.ncoeffs(level);
        let first_child = locals.first_box(level);
        let parent_order = locals.order(level - 1);
        let parent_ncoeffs = locals.ncoeffs(level - 1);
        let first_parent = locals.first_box(level - 1);
        let chunk = chunk_size(tree.boxes_at_level(level).len(), L2L_MAX_CHUNK_SIZE);

        let (parents, children) = locals.parent_and_child_levels_mut(level);
        let parents = &*parents;

        children
            .par_chunks_exact_mut(child_ncoeffs * chunk)
            .enumerate()
            .for_each(|(i, chunk_coeffs)| {
                for (j, child) in chunk_coeffs.chunks_exact_mut(child_ncoeffs).enumerate() {
                    let node = tree.node(first_child + i * chunk + j);
                    if let Some(parent) = node.parent {
                        let offset = (parent - first_parent) * parent_ncoeffs;
                        self.kernel.l2l(
                            parent_order,
                            &tree.node(parent).centre,
                            &parents[offset..offset + parent_ncoeffs],
                            child_order,
                            &node.centre,
                            child,
                        );
                    }
                }
            });

        Ok(())
    }

    fn m2p(
        &self,
        multipoles: &BoxExpansions<T>,
        potentials: &mut Potentials<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list3 = self.geometry.traversal().from_sep_smaller();
        let nkernels = self.nkernels();

        self.for_each_target_box(potentials, |target_box, targets, values| {
            for &source_box in list3.get(target_box) {
                let node = tree.node(source_box);
                let order = self.box_order(source_box);
                let coeffs = multipoles.get(source_box);
                for (&t, value) in targets.iter().zip(values.chunks_exact_mut(nkernels)) {
                    let point = &tree.targets().coordinates[t];
                    self.accumulate(value, |d| {
                        self.kernel.m2p(order, &node.centre, coeffs, point, d)
                    });
                }
            }
        });

        Ok(())
    }

    fn l2p(
        &self,
        locals: &BoxExpansions<T>,
        potentials: &mut Potentials<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let target_boxes = self.geometry.traversal().target_boxes();
        let nkernels = self.nkernels();

        self.for_each_target_box(potentials, |target_box, targets, values| {
            let leaf = target_boxes[target_box];
            let node = tree.node(leaf);
            let order = self.box_order(leaf);
            let coeffs = locals.get(leaf);
            for (&t, value) in targets.iter().zip(values.chunks_exact_mut(nkernels)) {
                let point = &tree.targets().coordinates[t];
                self.accumulate(value, |d| {
                    self.kernel.l2p(order, &node.centre, coeffs, point, d)
                });
            }
        });

        Ok(())
    }

    fn p2p(
        &self,
        strengths: &[Complex<T>],
        potentials: &mut Potentials<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list1 = self.geometry.traversal().neighbor_source_boxes();
        let nkernels = self.nkernels();

        self.for_each_target_box(potentials, |target_box, targets, values| {
            for &source_box in list1.get(target_box) {
                for k in tree.node(source_box).sources.clone() {
                    let source = self.source(strengths, k);
                    for (&t, value) in targets.iter().zip(values.chunks_exact_mut(nkernels)) {
                        let point = &tree.targets().coordinates[t];
                        self.accumulate(value, |d| self.kernel.p2p(&source, point, d));
                    }
                }
            }
        });

        Ok(())
    }
}

impl<T, K> QbxTranslation<T> for GenericWrangler<'_, T, K>
where
    T: RealScalar,
    K: ExpansionKernel<T>,
{
    fn p2qbxl(
        &self,
        strengths: &[Complex<T>],
        qbx: &mut QbxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let list1 = self.geometry.traversal().neighbor_source_boxes();
        let order = qbx.order;

        self.for_each_qbx_center(qbx, |position, target_box, coeffs| {
            let (centre, _) = self.qbx_center(position);
            for &source_box in list1.get(target_box) {
                for k in tree.node(source_box).sources.clone() {
                    self.kernel
                        .p2l(order, centre, &self.source(strengths, k), coeffs);
                }
            }
        });

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
        let order = qbx.order;

        self.for_each_qbx_center(qbx, |position, target_box, coeffs| {
            let (centre, radius) = self.qbx_center(position);
            for &source_box in list3.get(target_box) {
                let node = tree.node(source_box);
                if traversal.is_disc_separated(tree, source_box, centre, radius) {
                    self.kernel.m2l(
                        self.box_order(source_box),
                        &node.centre,
                        multipoles.get(source_box),
                        order,
                        centre,
                        coeffs,
                    );
                } else {
                    for k in node.sources.clone() {
                        self.kernel
                            .p2l(order, centre, &self.source(strengths, k), coeffs);
                    }
                }
            }
        });

        Ok(())
    }

    fn l2qbxl(
        &self,
        locals: &BoxExpansions<T>,
        qbx: &mut QbxExpansions<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let target_boxes = self.geometry.traversal().target_boxes();
        let order = qbx.order;

        self.for_each_qbx_center(qbx, |position, target_box, coeffs| {
            let (centre, _) = self.qbx_center(position);
            let leaf = target_boxes[target_box];
            self.kernel.l2l(
                self.box_order(leaf),
                &tree.node(leaf).centre,
                locals.get(leaf),
                order,
                centre,
                coeffs,
            );
        });

        Ok(())
    }

    fn qbxl2p(
        &self,
        qbx: &QbxExpansions<T>,
        potentials: &mut Potentials<T>,
    ) -> Result<(), QbxError> {
        let tree = self.geometry.tree();
        let center_targets = self.geometry.center_to_tree_targets();
        let nkernels = self.nkernels();

        let evaluated = (0..self.geometry.global_qbx_centers().len())
            .into_par_iter()
            .map(|position| {
                let (centre, _) = self.qbx_center(position);
                let coeffs = qbx.get(position);
                center_targets
                    .get(position)
                    .iter()
                    .map(|&t| {
                        let point = &tree.targets().coordinates[t];
                        let mut values = vec![Complex::new(T::zero(), T::zero()); nkernels];
                        self.accumulate(&mut values, |d| {
                            self.kernel.l2p(qbx.order, centre, coeffs, point, d)
                        });
                        (t, values)
                    })
                    .collect_vec()
            })
            .collect::<Vec<_>>();

        for (t, values) in evaluated.into_iter().flatten() {
            for (p, v) in potentials.target_mut(t).iter_mut().zip(values) {
                *p += v;
            }
        }

        Ok(())
    }
}

impl<T, K> ExpansionWrangler<T> for GenericWrangler<'_, T, K>
where
    T: RealScalar,
    K: ExpansionKernel<T>,
{
    fn backend(&self) -> FmmBackend {
        FmmBackend::Generic
    }

    fn depth(&self) -> u64 {
        self.geometry.tree().depth()
    }

    fn multipole_zeros(&self) -> BoxExpansions<T> {
        BoxExpansions::zeros(self.geometry.tree(), self.fmm_orders.clone(), |p| {
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
        Potentials::zeros(self.geometry.non_qbx_box_target_lists().len(), self.nkernels())
    }

    fn full_output_zeros(&self) -> Potentials<T> {
        Potentials::zeros(self.geometry.ntargets(), self.nkernels())
    }

    fn reorder_sources(&self, strengths: &[Complex<T>]) -> Vec<Complex<T>> {
        self.geometry
            .tree()
            .sources()
            .tree_to_user
            .iter()
            .map(|&i| strengths[i])
            .collect()
    }

    fn merge_non_qbx_potentials(&self, non_qbx: &Potentials<T>, full: &mut Potentials<T>) {
        let filtered = &self.geometry.non_qbx_box_target_lists().filtered_to_unfiltered;
        for (i, &t) in filtered.iter().enumerate() {
            for (p, v) in full.target_mut(t).iter_mut().zip(non_qbx.target(i)) {
                *p += *v;
            }
        }
    }

    fn finalize_potentials(&self, potentials: Potentials<T>) -> Vec<Vec<Complex<T>>> {
        potentials.into_kernel_major(
            self.kernel.scale(),
            Some(&self.geometry.tree().targets().tree_to_user),
        )
    }
}
