//! # QBX Fast Multipole Method
//!
//! Expansion storage, the two expansion backends and the driver sequencing their operators.
pub mod constants;
pub mod driver;
pub mod helpers;
pub mod types;
pub mod wrangler;

#[doc(inline)]
pub use driver::{drive_fmm, FmmOutput};
#[doc(inline)]
pub use types::{BoxExpansions, FmmBackend, Potentials, QbxExpansions};
