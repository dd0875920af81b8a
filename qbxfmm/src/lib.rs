//! # Quadrature By Expansion accelerated by the Fast Multipole Method (QBX-FMM)
//!
//! Evaluation of layer potentials on closed planar curves, following the QBX method of \[1\]
//! coupled to an adaptive quadtree FMM as in \[2\].
//!
//! Notable features of this library are:
//! * Geometry data (quadtree, interaction lists, expansion centers and target association) built once
//!   and memoized per set of target discretizations.
//! * An FMM pipeline with QBX specific stages (P2QBXL, M2QBXL, L2QBXL, QBXL2P) and a direct, corrected
//!   evaluation path for small problems.
//! * Two expansion backends behind one trait interface: a generic tree-ordered backend for Laplace and
//!   Helmholtz kernels, and a Helmholtz specific backend with precomputed translation tables.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use qbxfmm::{
//!     ComputePotentialInstruction, Discretization, EvaluationDriver, ForcedLimit, GeometryCollection,
//!     Kernel2d, OutputKernel, PotentialOutput, QbxConfigBuilder, QbxLayerPotentialSource,
//! };
//! use num_complex::Complex;
//!
//! let discr = Arc::new(Discretization::<f64>::circle(128, 1.0, 8));
//! let config = QbxConfigBuilder::new()
//!     .qbx_order(8)
//!     .unwrap()
//!     .fmm_order(20)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let source = Arc::new(QbxLayerPotentialSource::new(discr.clone(), config).unwrap());
//!
//! let mut places = GeometryCollection::new();
//! places.add_source("curve", source);
//!
//! let density = discr.nodes().iter().map(|x| Complex::new(x[0], 0.0)).collect();
//! let insn = ComputePotentialInstruction::new(
//!     "curve",
//!     vec![OutputKernel::single_layer(Kernel2d::Laplace)],
//!     density,
//!     vec![PotentialOutput::new("s_int", "curve", ForcedLimit::Interior, 0)],
//! );
//! let result = places.evaluate(&insn, &EvaluationDriver::default()).unwrap();
//! assert_eq!(result.output("s_int").unwrap().len(), 128);
//! ```
//!
//! ## References
//! \[1\] Klöckner, A., Barnett, A., Greengard, L., & O'Neil, M. (2013). Quadrature by expansion: A new method for the evaluation of layer potentials. Journal of Computational Physics, 252, 332-349.
//!
//! \[2\] Wala, M., & Klöckner, A. (2018). A fast algorithm with error bounds for Quadrature by Expansion. Journal of Computational Physics, 374, 135-162.
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod discretization;
pub mod expansion;
pub mod fmm;
pub mod qbx;
pub mod traits;
pub mod tree;

// Public API
#[doc(inline)]
pub use discretization::{Discretization, PointTargets};
#[doc(inline)]
pub use fmm::types::FmmBackend;
#[doc(inline)]
pub use qbx::config::{FmmOrder, QbxConfig, QbxConfigBuilder, QbxConfigOverrides, TreeKind};
#[doc(inline)]
pub use qbx::instruction::{
    ComputePotentialInstruction, ForcedLimit, Kernel2d, OutputKernel, PotentialOutput,
    SourceDerivative, TargetDerivative,
};
#[doc(inline)]
pub use qbx::source::{
    EvaluationDriver, EvaluationExtra, EvaluationResult, GeometryCollection, QbxLayerPotentialSource,
};
#[doc(inline)]
pub use traits::types::QbxError;
