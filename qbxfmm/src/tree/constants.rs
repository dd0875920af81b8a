//! Constants used in quadtree construction and Morton encoding.

/// Deepest refinement level of a quadtree, anchors are stored as integer coordinates at this level.
pub const DEEPEST_LEVEL: u64 = 16;

/// Number of boxes along each axis at the deepest level.
pub const LEVEL_SIZE: u64 = 1 << DEEPEST_LEVEL;

/// Number of bits reserved for the level in an encoded Morton key.
pub const LEVEL_DISPLACEMENT: u64 = 5;

/// Mask extracting the level from an encoded Morton key.
pub const LEVEL_MASK: u64 = 0x1F;

/// Number of children of a quadtree box.
pub const NCHILDREN: usize = 4;

/// Default maximum refine weight (particle count) of a leaf box in an adaptive quadtree.
pub const DEFAULT_MAX_LEAF_REFINE_WEIGHT: usize = 64;

/// Default fraction of a leaf's side length by which a QBX expansion disc may protrude out of its leaf.
pub const DEFAULT_EXPANSION_STICK_OUT_FACTOR: f64 = 0.5;

/// Default separation, in boxes of the smaller size, from which two boxes are well separated.
pub const DEFAULT_WELL_SEP_IS_N_AWAY: u64 = 2;

/// Fractional padding added to each side of a domain computed from a point set.
pub const DOMAIN_PADDING: f64 = 0.005;
