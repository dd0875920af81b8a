//! # Quadrature by expansion
//!
//! Expansion centers, target association and the memoized geometry built from them, the direct
//! evaluator, and the layer potential source dispatching evaluation requests to the FMM or to the
//! direct evaluator.
pub mod centers;
pub mod config;
pub mod cost;
pub mod direct;
pub mod geometry;
pub mod instruction;
pub mod source;
pub mod target_assoc;

#[doc(inline)]
pub use centers::ExpansionCenters;
#[doc(inline)]
pub use geometry::{GeometryData, GeometryKey, TargetGroup};
#[doc(inline)]
pub use target_assoc::TargetState;
