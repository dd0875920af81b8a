//! Constructors and geometric queries for two dimensional Morton keys.
use crate::{
    traits::general::RealScalar,
    tree::{
        constants::{DEEPEST_LEVEL, LEVEL_DISPLACEMENT, LEVEL_MASK, LEVEL_SIZE, NCHILDREN},
        types::{Domain, MortonKey},
    },
};

/// Spread the lower 32 bits of an integer so that a zero bit separates each of them.
fn spread_bits(x: u64) -> u64 {
    let mut x = x & 0xFFFF_FFFF;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    (x | (x << 1)) & 0x5555_5555_5555_5555
}

/// Inverse of [`spread_bits`].
fn compact_bits(x: u64) -> u64 {
    let mut x = x & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF_0000_FFFF;
    (x | (x >> 16)) & 0x0000_0000_FFFF_FFFF
}

/// Interleave the bits of an anchor, the x coordinate occupies the even bits.
pub fn interleave(anchor: &[u64; 2]) -> u64 {
    spread_bits(anchor[0]) | (spread_bits(anchor[1]) << 1)
}

/// Encode an anchor.
/// Returns the Morton key associated with the given anchor.
///
/// # Arguments
/// * `anchor` - Integer coordinates of the lower left corner at the deepest level.
/// * `level` - The level of the tree the anchor is encoded to.
pub fn encode_anchor(anchor: &[u64; 2], level: u64) -> u64 {
    (interleave(anchor) << LEVEL_DISPLACEMENT) | level
}

/// Decode a Morton key into its anchor.
pub fn decode_key(morton: u64) -> [u64; 2] {
    let code = morton >> LEVEL_DISPLACEMENT;
    [compact_bits(code), compact_bits(code >> 1)]
}

/// Map a point to the anchor of the deepest level box containing it, points outside of the domain
/// are clamped to its boundary boxes.
pub fn point_to_anchor<T>(point: &[T; 2], domain: &Domain<T>) -> [u64; 2]
where
    T: RealScalar,
{
    let nboxes = T::real(LEVEL_SIZE as f64);
    let mut anchor = [0u64; 2];

    for i in 0..2 {
        let scaled = ((point[i] - domain.origin[i]) / domain.side_length * nboxes).floor();
        let scaled = scaled.max(T::zero()).min(nboxes - T::one());
        anchor[i] = scaled.as_f64() as u64;
    }

    anchor
}

impl MortonKey {
    /// Constructor for a Morton key from an anchor aligned to the given level.
    pub fn from_anchor(anchor: &[u64; 2], level: u64) -> Self {
        let mask = !((1u64 << (DEEPEST_LEVEL - level)) - 1);
        let anchor = [anchor[0] & mask, anchor[1] & mask];
        Self {
            morton: encode_anchor(&anchor, level),
            anchor,
        }
    }

    /// Construct a `MortonKey` from its encoded index.
    pub fn from_morton(morton: u64) -> Self {
        Self {
            morton,
            anchor: decode_key(morton),
        }
    }

    /// The key of the root box.
    pub fn root() -> Self {
        Self::from_anchor(&[0, 0], 0)
    }

    /// Construct the `MortonKey` of the box containing a point at a given level.
    ///
    /// # Arguments
    /// * `point` - Cartesian coordinate for a given point.
    /// * `domain` - Domain associated with a given tree encoding.
    /// * `level` - level of the quadtree on which to find the encoding.
    pub fn from_point<T: RealScalar>(point: &[T; 2], domain: &Domain<T>, level: u64) -> Self {
        Self::from_anchor(&point_to_anchor(point, domain), level)
    }

    /// The anchor corresponding to this key.
    pub fn anchor(&self) -> &[u64; 2] {
        &self.anchor
    }

    /// The Morton key in index form.
    pub fn morton(&self) -> u64 {
        self.morton
    }

    /// The level of this key.
    pub fn level(&self) -> u64 {
        self.morton & LEVEL_MASK
    }

    /// Interleaved anchor, shared by the key and its first deepest level descendant.
    pub fn code(&self) -> u64 {
        self.morton >> LEVEL_DISPLACEMENT
    }

    /// Half open range of interleaved deepest level anchors covered by this box.
    pub fn code_range(&self) -> std::ops::Range<u64> {
        let start = self.code();
        start..start + (1u64 << (2 * (DEEPEST_LEVEL - self.level())))
    }

    /// Side length of the box in units of the deepest level boxes.
    pub fn side_units(&self) -> u64 {
        1 << (DEEPEST_LEVEL - self.level())
    }

    /// Return the parent of a Morton key, the root is its own parent.
    pub fn parent(&self) -> Self {
        let level = self.level();
        if level == 0 {
            *self
        } else {
            Self::from_anchor(&self.anchor, level - 1)
        }
    }

    /// Return the children of a Morton key in Morton order.
    pub fn children(&self) -> Vec<MortonKey> {
        let level = self.level() + 1;
        let step = 1u64 << (DEEPEST_LEVEL - level);

        (0..NCHILDREN as u64)
            .map(|c| {
                let anchor = [
                    self.anchor[0] + (c & 1) * step,
                    self.anchor[1] + ((c >> 1) & 1) * step,
                ];
                Self::from_anchor(&anchor, level)
            })
            .collect()
    }

    /// Check whether this key is an ancestor of, or equal to, another key.
    pub fn is_ancestor(&self, other: &MortonKey) -> bool {
        self.level() <= other.level() && self.code_range().contains(&other.code())
    }

    /// Gap between two boxes in the maximum norm, in units of the deepest level boxes. Overlapping
    /// or touching boxes have a gap of zero.
    pub fn gap(&self, other: &MortonKey) -> u64 {
        let sa = self.side_units();
        let sb = other.side_units();

        (0..2)
            .map(|i| {
                let (a_lo, a_hi) = (self.anchor[i], self.anchor[i] + sa);
                let (b_lo, b_hi) = (other.anchor[i], other.anchor[i] + sb);
                b_lo.saturating_sub(a_hi).max(a_lo.saturating_sub(b_hi))
            })
            .max()
            .unwrap_or(0)
    }

    /// Two boxes are near, i.e. not well separated, when fewer than `n_away` boxes of the smaller of
    /// the two sizes fit in the gap between them.
    pub fn is_near(&self, other: &MortonKey, n_away: u64) -> bool {
        self.gap(other) < n_away * self.side_units().min(other.side_units())
    }

    /// Vector from this key to another key of the same level, in units of their side length.
    pub fn transfer_vector(&self, other: &MortonKey) -> [i64; 2] {
        let side = self.side_units() as i64;
        [
            (other.anchor[0] as i64 - self.anchor[0] as i64) / side,
            (other.anchor[1] as i64 - self.anchor[1] as i64) / side,
        ]
    }

    /// The physical side length of this box with respect to a domain.
    pub fn side<T: RealScalar>(&self, domain: &Domain<T>) -> T {
        domain.side_length * T::real(0.5).powi(self.level() as i32)
    }

    /// The physical centre of this box with respect to a domain.
    pub fn centre<T: RealScalar>(&self, domain: &Domain<T>) -> [T; 2] {
        let unit = domain.side_length / T::real(LEVEL_SIZE as f64);
        let half = T::real(0.5) * self.side(domain);
        [
            domain.origin[0] + T::real(self.anchor[0] as f64) * unit + half,
            domain.origin[1] + T::real(self.anchor[1] as f64) * unit + half,
        ]
    }
}
