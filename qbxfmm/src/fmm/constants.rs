//! Crate wide constants

/// Maximum chunk size to use to process leaf boxes during the P2M kernel.
pub(crate) const P2M_MAX_CHUNK_SIZE: usize = 1;

/// Maximum chunk size to use to process boxes by level during the M2M kernel.
pub(crate) const M2M_MAX_CHUNK_SIZE: usize = 1;

/// Maximum chunk size to use to process boxes by level during the L2L kernel.
pub(crate) const L2L_MAX_CHUNK_SIZE: usize = 1;

/// Default factor relating an expansion radius to the element size.
pub const DEFAULT_EXPANSION_RADIUS_FACTOR: f64 = 0.5;

/// Default target association tolerance, in units of machine epsilon.
pub const DEFAULT_TARGET_ASSOCIATION_TOLERANCE_EPS: f64 = 1e3;
