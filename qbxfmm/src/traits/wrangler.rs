//! Expansion wrangler traits.
//!
//! A wrangler performs the numerical work of one FMM stage on arrays owned by the driver. It is
//! bound to one geometry and one kernel at construction, so every operator only receives the
//! expansion and potential buffers it reads or writes. Stages are grouped the way data flows
//! through them: from sources into box expansions, between box expansions, out to targets, and
//! through the QBX local expansions.
use num_complex::Complex;

use crate::{
    fmm::types::{BoxExpansions, FmmBackend, Potentials, QbxExpansions},
    traits::{general::RealScalar, types::QbxError},
};

/// Translations that form multipole expansions.
pub trait SourceTranslation<T>
where
    T: RealScalar,
{
    /// Particle to multipole, forms the multipole expansion of every leaf from its sources.
    ///
    /// # Arguments
    /// * `strengths` - Source strengths in the wrangler's source order, see
    ///   [`ExpansionWrangler::reorder_sources`].
    /// * `multipoles` - Multipole expansions of all boxes.
    fn p2m(
        &self,
        strengths: &[Complex<T>],
        multipoles: &mut BoxExpansions<T>,
    ) -> Result<(), QbxError>;

    /// Multipole to multipole, merges the expansions of the boxes at `level` into their parents.
    ///
    /// # Arguments
    /// * `level` - Level of the child boxes.
    /// * `multipoles` - Multipole expansions of all boxes.
    fn m2m(&self, level: u64, multipoles: &mut BoxExpansions<T>) -> Result<(), QbxError>;
}

/// Translations from source data into local expansions.
pub trait SourceToTargetTranslation<T>
where
    T: RealScalar,
{
    /// Multipole to local over list 2, for the boxes at `level`.
    fn m2l(
        &self,
        level: u64,
        multipoles: &BoxExpansions<T>,
        locals: &mut BoxExpansions<T>,
    ) -> Result<(), QbxError>;

    /// Particle to local over list 4.
    fn p2l(&self, strengths: &[Complex<T>], locals: &mut BoxExpansions<T>)
        -> Result<(), QbxError>;
}

/// Translations that produce potentials at targets not associated with a QBX center.
///
/// Potentials written by these operators are indexed by position in the geometry's list of
/// non-QBX targets.
pub trait TargetTranslation<T>
where
    T: RealScalar,
{
    /// Local to local, pushes the expansions of the parents of the boxes at `level` down.
    fn l2l(&self, level: u64, locals: &mut BoxExpansions<T>) -> Result<(), QbxError>;

    /// Multipole to particle over list 3.
    fn m2p(
        &self,
        multipoles: &BoxExpansions<T>,
        potentials: &mut Potentials<T>,
    ) -> Result<(), QbxError>;

    /// Evaluate each target leaf's local expansion at its targets.
    fn l2p(&self, locals: &BoxExpansions<T>, potentials: &mut Potentials<T>)
        -> Result<(), QbxError>;

    /// Particle to particle over list 1.
    fn p2p(&self, strengths: &[Complex<T>], potentials: &mut Potentials<T>)
        -> Result<(), QbxError>;
}

/// Stages feeding and reading the local expansions about QBX centers.
pub trait QbxTranslation<T>
where
    T: RealScalar,
{
    /// Particle to QBX local, from the sources of list 1 of each center's box.
    fn p2qbxl(&self, strengths: &[Complex<T>], qbx: &mut QbxExpansions<T>)
        -> Result<(), QbxError>;

    /// Multipole to QBX local, from list 3 of each center's box. A box not separated from the
    /// center's disc contributes its sources directly.
    fn m2qbxl(
        &self,
        strengths: &[Complex<T>],
        multipoles: &BoxExpansions<T>,
        qbx: &mut QbxExpansions<T>,
    ) -> Result<(), QbxError>;

    /// Box local to QBX local, from the local expansion of each center's box.
    fn l2qbxl(&self, locals: &BoxExpansions<T>, qbx: &mut QbxExpansions<T>)
        -> Result<(), QbxError>;

    /// QBX local to particle, evaluates each center's expansion at its associated targets.
    ///
    /// Potentials are indexed by the wrangler's full target order.
    fn qbxl2p(&self, qbx: &QbxExpansions<T>, potentials: &mut Potentials<T>)
        -> Result<(), QbxError>;
}

/// Capability interface of an expansion backend, implemented for one geometry and one kernel.
pub trait ExpansionWrangler<T>:
    SourceTranslation<T>
    + SourceToTargetTranslation<T>
    + TargetTranslation<T>
    + QbxTranslation<T>
    + Send
    + Sync
where
    T: RealScalar,
{
    /// Backend implementing this wrangler.
    fn backend(&self) -> FmmBackend;

    /// Depth of the tree the wrangler operates on.
    fn depth(&self) -> u64;

    /// Zero multipole expansions of every box.
    fn multipole_zeros(&self) -> BoxExpansions<T>;

    /// Zero local expansions of every box.
    fn local_zeros(&self) -> BoxExpansions<T>;

    /// Zero QBX local expansions of every center with associated targets.
    fn qbx_local_zeros(&self) -> QbxExpansions<T>;

    /// Zero potentials at the targets not associated with a QBX center.
    fn output_zeros(&self) -> Potentials<T>;

    /// Zero potentials at all targets.
    fn full_output_zeros(&self) -> Potentials<T>;

    /// Bring source strengths given in the discretization's order into the wrangler's order.
    fn reorder_sources(&self, strengths: &[Complex<T>]) -> Vec<Complex<T>>;

    /// Add potentials of the non-QBX targets into the full potential array.
    fn merge_non_qbx_potentials(&self, non_qbx: &Potentials<T>, full: &mut Potentials<T>);

    /// Apply the kernel's scale and return potentials per kernel in the combined target order of
    /// the geometry.
    fn finalize_potentials(&self, potentials: Potentials<T>) -> Vec<Vec<Complex<T>>>;
}
