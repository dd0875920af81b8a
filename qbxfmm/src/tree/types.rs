//! Data structures for quadtrees and their interaction lists.
use std::{collections::HashMap, ops::Range};

use crate::traits::general::RealScalar;

/// A square domain in the plane, defined by its lower left corner and a side length.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Domain<T>
where
    T: RealScalar,
{
    /// Lower left corner of the domain.
    pub origin: [T; 2],

    /// Side length of the domain, equal along both axes.
    pub side_length: T,
}

/// A Morton encoded box of a quadtree.
///
/// The anchor is the lower left corner of the box in integer units of the deepest level boxes, the
/// encoded key interleaves the anchor bits and stores the level in its lowest bits. Sorting by the
/// encoded key yields a pre-order traversal of the quadtree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MortonKey {
    /// Encoded key, compared first when sorting.
    pub(crate) morton: u64,

    /// Integer anchor at the deepest level.
    pub(crate) anchor: [u64; 2],
}

/// Refinement strategy of a quadtree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TreeKind {
    /// Split boxes while they exceed the maximum leaf refine weight.
    #[default]
    Adaptive,

    /// Split all non-empty boxes to a common depth estimated from the particle count.
    Uniform,
}

/// Parameters controlling quadtree refinement.
#[derive(Clone, Copy, Debug)]
pub struct TreeParameters<T>
where
    T: RealScalar,
{
    /// Refinement strategy.
    pub kind: TreeKind,

    /// Maximum number of particles, of any role, in an adaptive leaf.
    pub max_leaf_refine_weight: usize,

    /// A box is only split if every expansion center it contains has a radius of at most this
    /// fraction of the child side length.
    pub expansion_stick_out_factor: T,
}

/// Borrowed particle data from which a quadtree is built.
pub struct TreeParticles<'a, T>
where
    T: RealScalar,
{
    /// Source points.
    pub sources: &'a [[T; 2]],

    /// Radius of influence of each source, the radius of the QBX expansions of its degree of freedom.
    pub source_radii: &'a [T],

    /// QBX expansion centers.
    pub centers: &'a [[T; 2]],

    /// Radius of each expansion center.
    pub center_radii: &'a [T],

    /// Target points.
    pub targets: &'a [[T; 2]],
}

/// Points of one role sorted into tree order.
#[derive(Clone, Debug, Default)]
pub struct ParticleSet<T>
where
    T: RealScalar,
{
    /// Coordinates in tree order.
    pub coordinates: Vec<[T; 2]>,

    /// Radius associated with each point in tree order, zero where a role carries no radius.
    pub radii: Vec<T>,

    /// For each point in tree order, its index in the caller's ordering.
    pub tree_to_user: Vec<usize>,

    /// For each point in the caller's ordering, its index in tree order.
    pub user_to_tree: Vec<usize>,

    /// Interleaved deepest level anchor of each point in tree order.
    pub(crate) codes: Vec<u64>,
}

/// A box of a quadtree.
#[derive(Clone, Debug)]
pub struct TreeBox<T>
where
    T: RealScalar,
{
    /// Morton key of the box.
    pub key: MortonKey,

    /// Index of the parent box, `None` for the root.
    pub parent: Option<usize>,

    /// Indices of the non-empty children, empty for a leaf.
    pub children: Vec<usize>,

    /// Physical centre of the box.
    pub centre: [T; 2],

    /// Physical side length of the box.
    pub side: T,

    /// Range of the sources of this box and its descendants in tree order.
    pub sources: Range<usize>,

    /// Range of the expansion centers of this box and its descendants in tree order.
    pub centers: Range<usize>,

    /// Range of the targets of this box and its descendants in tree order.
    pub targets: Range<usize>,

    /// Largest expansion center radius in the box and its descendants.
    pub max_center_radius: T,

    /// Largest source radius in the box and its descendants.
    pub max_source_radius: T,
}

/// A quadtree over sources, expansion centers and targets.
#[derive(Clone, Debug)]
pub struct SingleNodeTree<T>
where
    T: RealScalar,
{
    /// Domain spanned by the tree.
    pub(crate) domain: Domain<T>,

    /// Refinement strategy used to build the tree.
    pub(crate) kind: TreeKind,

    /// Boxes sorted by level, then by Morton key.
    pub(crate) boxes: Vec<TreeBox<T>>,

    /// `level_index_pointer[l]..level_index_pointer[l + 1]` are the boxes at level `l`.
    pub(crate) level_index_pointer: Vec<usize>,

    /// Indices of the leaf boxes, in Morton order.
    pub(crate) leaves: Vec<usize>,

    /// Map from a Morton key to its box index.
    pub(crate) key_to_index: HashMap<MortonKey, usize>,

    /// Sources in tree order.
    pub(crate) sources: ParticleSet<T>,

    /// Expansion centers in tree order.
    pub(crate) centers: ParticleSet<T>,

    /// Targets in tree order.
    pub(crate) targets: ParticleSet<T>,
}

/// Compressed storage of one list of box indices per box.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InteractionLists {
    /// `starts[i]..starts[i + 1]` indexes the list of entry `i` in `lists`.
    pub(crate) starts: Vec<usize>,

    /// Concatenated lists.
    pub(crate) lists: Vec<usize>,
}

/// Interaction lists of a quadtree.
///
/// Lists are named by their role: list 1 holds the near leaves of a target leaf, list 2 the well
/// separated boxes of the same level, list 3 the well separated smaller boxes of a target leaf whose
/// parents are near it, and list 4 the well separated coarser leaves near a box's parent.
#[derive(Clone, Debug)]
pub struct Traversal {
    /// Two boxes are well separated when at least this many boxes of the smaller size fit between them.
    pub(crate) well_sep_is_n_away: u64,

    /// Same level boxes near each box, excluding the box itself.
    pub(crate) colleagues: InteractionLists,

    /// Leaf boxes, for which lists 1 and 3 are computed.
    pub(crate) target_boxes: Vec<usize>,

    /// For each box, its index in `target_boxes` if it is a leaf.
    pub(crate) box_to_target_box: Vec<Option<usize>>,

    /// List 1, per target box.
    pub(crate) neighbor_source_boxes: InteractionLists,

    /// List 2, per box.
    pub(crate) from_sep_siblings: InteractionLists,

    /// List 3, per target box.
    pub(crate) from_sep_smaller: InteractionLists,

    /// List 4, per box.
    pub(crate) from_sep_bigger: InteractionLists,
}
