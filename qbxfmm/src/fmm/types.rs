//! Expansion storage and backend selection for the QBX FMM.
use num_complex::Complex;

use crate::{traits::general::RealScalar, tree::SingleNodeTree};

/// Expansion backend, one closed set of variants behind the
/// [`ExpansionWrangler`](crate::traits::wrangler::ExpansionWrangler) interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FmmBackend {
    /// Tree ordered, data parallel backend for every supported kernel.
    #[default]
    Generic,

    /// Helmholtz only backend working in caller order with precomputed translation tables.
    HelmholtzHost,
}

impl FmmBackend {
    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            FmmBackend::Generic => "generic",
            FmmBackend::HelmholtzHost => "helmholtz-host",
        }
    }
}

/// Multipole or local expansions of every box of a tree, stored level by level. All boxes of a level
/// share an expansion order.
#[derive(Clone, Debug)]
pub struct BoxExpansions<T>
where
    T: RealScalar,
{
    /// Expansion order of each level.
    pub(crate) orders: Vec<usize>,

    /// Number of coefficients of one expansion at each level.
    pub(crate) ncoeffs: Vec<usize>,

    /// Index of the first box of each level, followed by the total number of boxes.
    pub(crate) level_box_starts: Vec<usize>,

    /// Offset of the first coefficient of each level, followed by the total number of coefficients.
    pub(crate) level_offsets: Vec<usize>,

    /// Coefficients.
    pub(crate) coefficients: Vec<Complex<T>>,
}

impl<T> BoxExpansions<T>
where
    T: RealScalar,
{
    /// Zero expansions for every box of a tree.
    ///
    /// # Arguments
    /// * `tree` - The tree.
    /// * `orders` - Expansion order at each level, indexed by level.
    /// * `ncoeffs` - Map from an order to the number of coefficients.
    pub fn zeros<F>(tree: &SingleNodeTree<T>, orders: Vec<usize>, ncoeffs: F) -> Self
    where
        F: Fn(usize) -> usize,
    {
        let ncoeffs = orders.iter().map(|&p| ncoeffs(p)).collect::<Vec<_>>();

        let mut level_box_starts = Vec::with_capacity(orders.len() + 1);
        let mut level_offsets = Vec::with_capacity(orders.len() + 1);
        let mut offset = 0;

        for (level, n) in ncoeffs.iter().enumerate() {
            let boxes = tree.boxes_at_level(level as u64);
            level_box_starts.push(boxes.start);
            level_offsets.push(offset);
            offset += boxes.len() * n;
        }
        level_box_starts.push(tree.nboxes());
        level_offsets.push(offset);

        Self {
            orders,
            ncoeffs,
            level_box_starts,
            level_offsets,
            coefficients: vec![Complex::new(T::zero(), T::zero()); offset],
        }
    }

    /// Expansion order at a level.
    pub fn order(&self, level: u64) -> usize {
        self.orders[level as usize]
    }

    /// Number of coefficients of an expansion at a level.
    pub fn ncoeffs(&self, level: u64) -> usize {
        self.ncoeffs[level as usize]
    }

    fn level_of(&self, ibox: usize) -> usize {
        self.level_box_starts.partition_point(|&start| start <= ibox) - 1
    }

    /// Coefficients of one box.
    pub fn get(&self, ibox: usize) -> &[Complex<T>] {
        let level = self.level_of(ibox);
        let n = self.ncoeffs[level];
        let start = self.level_offsets[level] + (ibox - self.level_box_starts[level]) * n;
        &self.coefficients[start..start + n]
    }

    /// Coefficients of all boxes of a level.
    pub fn level(&self, level: u64) -> &[Complex<T>] {
        let level = level as usize;
        &self.coefficients[self.level_offsets[level]..self.level_offsets[level + 1]]
    }

    /// Mutable coefficients of all boxes of a level.
    pub fn level_mut(&mut self, level: u64) -> &mut [Complex<T>] {
        let level = level as usize;
        &mut self.coefficients[self.level_offsets[level]..self.level_offsets[level + 1]]
    }

    /// Coefficients of a level and of its parent level, both mutable.
    ///
    /// # Arguments
    /// * `level` - The child level, at least one.
    pub fn parent_and_child_levels_mut(
        &mut self,
        level: u64,
    ) -> (&mut [Complex<T>], &mut [Complex<T>]) {
        let level = level as usize;
        let parent_start = self.level_offsets[level - 1];
        let child_start = self.level_offsets[level];
        let child_end = self.level_offsets[level + 1];

        let (head, tail) = self.coefficients.split_at_mut(child_start);
        (&mut head[parent_start..], &mut tail[..child_end - child_start])
    }

    /// Index of the first box of a level.
    pub fn first_box(&self, level: u64) -> usize {
        self.level_box_starts[level as usize]
    }

    /// Number of levels.
    pub fn nlevels(&self) -> usize {
        self.orders.len()
    }
}

/// QBX local expansions, one per center with associated targets.
#[derive(Clone, Debug)]
pub struct QbxExpansions<T>
where
    T: RealScalar,
{
    /// Order of every expansion.
    pub(crate) order: usize,

    /// Number of coefficients of one expansion.
    pub(crate) ncoeffs: usize,

    /// Coefficients, indexed by position in the list of global QBX centers.
    pub(crate) coefficients: Vec<Complex<T>>,
}

impl<T> QbxExpansions<T>
where
    T: RealScalar,
{
    /// Zero expansions for `ncenters` centers.
    pub fn zeros(ncenters: usize, order: usize, ncoeffs: usize) -> Self {
        Self {
            order,
            ncoeffs,
            coefficients: vec![Complex::new(T::zero(), T::zero()); ncenters * ncoeffs],
        }
    }

    /// Expansion order.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Coefficients of one center.
    pub fn get(&self, icenter: usize) -> &[Complex<T>] {
        &self.coefficients[icenter * self.ncoeffs..(icenter + 1) * self.ncoeffs]
    }
}

/// Potentials of several kernels at a set of targets, stored target major.
#[derive(Clone, Debug, PartialEq)]
pub struct Potentials<T>
where
    T: RealScalar,
{
    /// Number of kernels evaluated at each target.
    pub(crate) nkernels: usize,

    /// Values, `values[i * nkernels + k]` is kernel `k` at target `i`.
    pub(crate) values: Vec<Complex<T>>,
}

impl<T> Potentials<T>
where
    T: RealScalar,
{
    /// Zero potentials.
    pub fn zeros(ntargets: usize, nkernels: usize) -> Self {
        Self {
            nkernels,
            values: vec![Complex::new(T::zero(), T::zero()); ntargets * nkernels],
        }
    }

    /// Number of targets.
    pub fn ntargets(&self) -> usize {
        if self.nkernels == 0 {
            0
        } else {
            self.values.len() / self.nkernels
        }
    }

    /// Number of kernels.
    pub fn nkernels(&self) -> usize {
        self.nkernels
    }

    /// Values of all kernels at one target.
    pub fn target(&self, itarget: usize) -> &[Complex<T>] {
        &self.values[itarget * self.nkernels..(itarget + 1) * self.nkernels]
    }

    /// Mutable values of all kernels at one target.
    pub fn target_mut(&mut self, itarget: usize) -> &mut [Complex<T>] {
        &mut self.values[itarget * self.nkernels..(itarget + 1) * self.nkernels]
    }

    /// Split into per kernel arrays, applying a scale and a permutation of the targets.
    ///
    /// # Arguments
    /// * `scale` - Factor applied to every value.
    /// * `to_user` - Position of each stored target in the output, `None` keeps the order.
    pub fn into_kernel_major(self, scale: Complex<T>, to_user: Option<&[usize]>) -> Vec<Vec<Complex<T>>> {
        let ntargets = self.ntargets();
        let mut result = vec![vec![Complex::new(T::zero(), T::zero()); ntargets]; self.nkernels];

        for itarget in 0..ntargets {
            let destination = to_user.map_or(itarget, |map| map[itarget]);
            for (k, kernel_values) in result.iter_mut().enumerate() {
                kernel_values[destination] = self.values[itarget * self.nkernels + k] * scale;
            }
        }

        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::{helpers::points_fixture, TreeParameters, TreeParticles};

    #[test]
    fn test_box_expansions_layout() {
        let sources = points_fixture::<f64>(500, None, None, Some(0));
        let radii = vec![0.0; sources.len()];
        let particles = TreeParticles {
            sources: &sources,
            source_radii: &radii,
            centers: &[],
            center_radii: &[],
            targets: &[],
        };
        let tree = SingleNodeTree::new(&particles, &TreeParameters::default()).unwrap();
        let nlevels = tree.depth() as usize + 1;
        let orders = (0..nlevels).map(|l| 4 + l).collect::<Vec<_>>();

        let mut expansions = BoxExpansions::<f64>::zeros(&tree, orders, |p| 2 * p + 1);

        for ibox in 0..tree.nboxes() {
            let level = tree.node(ibox).key.level();
            assert_eq!(expansions.get(ibox).len(), 2 * (4 + level as usize) + 1);
        }

        let level = tree.depth();
        let nparent = tree.boxes_at_level(level - 1).len();
        let nchild = tree.boxes_at_level(level).len();
        let (parents, children) = expansions.parent_and_child_levels_mut(level);
        assert_eq!(parents.len(), nparent * (2 * (3 + level as usize) + 1));
        assert_eq!(children.len(), nchild * (2 * (4 + level as usize) + 1));
        children[0] = Complex::new(1.0, 0.0);

        let first = tree.boxes_at_level(level).start;
        assert_eq!(expansions.get(first)[0], Complex::new(1.0, 0.0));
    }

    #[test]
    fn test_potentials_to_kernel_major() {
        let mut potentials = Potentials::<f64>::zeros(3, 2);
        potentials.target_mut(0)[1] = Complex::new(1.0, 0.0);
        potentials.target_mut(2)[0] = Complex::new(0.0, 2.0);

        let result = potentials.into_kernel_major(Complex::new(2.0, 0.0), Some(&[1, 2, 0]));
        assert_eq!(result[1][1], Complex::new(2.0, 0.0));
        assert_eq!(result[0][0], Complex::new(0.0, 4.0));
    }
}
