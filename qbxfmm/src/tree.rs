//! # Quadtrees and interaction lists
//!
//! Points of three roles (sources, QBX expansion centers and targets) are sorted along a Morton curve
//! and partitioned into an adaptive, or uniform, quadtree. The [`traversal`] module derives the
//! interaction lists consumed by the FMM from a constructed tree.
//!
//! # Example Usage
//! ```
//! use qbxfmm::tree::{helpers::points_fixture, SingleNodeTree, Traversal, TreeParameters, TreeParticles};
//!
//! let sources = points_fixture::<f64>(1000, None, None, Some(0));
//! let radii = vec![0.01; sources.len()];
//! let particles = TreeParticles {
//!     sources: &sources,
//!     source_radii: &radii,
//!     centers: &[],
//!     center_radii: &[],
//!     targets: &sources,
//! };
//! let tree = SingleNodeTree::new(&particles, &TreeParameters::default()).unwrap();
//! let traversal = Traversal::new(&tree, 2);
//! assert_eq!(traversal.target_boxes().len(), tree.leaves().len());
//! ```
pub mod constants;
pub mod types;

mod domain;
pub mod helpers;
pub mod morton;
mod single_node;
pub mod traversal;

#[doc(inline)]
pub use types::{
    Domain, InteractionLists, MortonKey, ParticleSet, SingleNodeTree, Traversal, TreeBox, TreeKind,
    TreeParameters, TreeParticles,
};
