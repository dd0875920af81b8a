//! Crate wide error type and FMM operator bookkeeping types.
use std::time::Duration;

/// Errors raised while building geometry or evaluating layer potentials.
///
/// None of these are recoverable at the level of this crate, they propagate to the caller unchanged.
#[derive(thiserror::Error, Debug)]
pub enum QbxError {
    /// One or more targets need a QBX center, but none lies within the association tolerance.
    #[error(
        "Target association failed for {n_failed} target(s) of geometry '{geometry}' (first failed target: {first_failed})"
    )]
    AssociationFailure {
        /// Name of the target discretization containing the failed targets.
        geometry: String,
        /// Number of failed targets.
        n_failed: usize,
        /// Index of the first failed target within its target discretization.
        first_failed: usize,
    },

    /// A one sided evaluation was requested, but some targets have no center on that side.
    #[error(
        "Did not find a matching QBX center on side {side} for some targets of '{geometry}': {n_associated} of {n_targets} associated"
    )]
    ForcedLimitUnsatisfiable {
        /// Name of the target discretization.
        geometry: String,
        /// The requested side, -1 (interior) or +1 (exterior).
        side: i8,
        /// Number of targets with a center on the requested side.
        n_associated: usize,
        /// Total number of targets.
        n_targets: usize,
    },

    /// The selected expansion backend cannot realise the requested kernel.
    #[error("Unsupported kernel for the '{backend}' backend: {reason}")]
    UnsupportedKernel {
        /// Name of the selected backend.
        backend: String,
        /// What the backend could not realise.
        reason: String,
    },

    /// Mutually exclusive configuration options were supplied.
    #[error("Configuration conflict: {0}")]
    ConfigurationConflict(String),

    /// Malformed input data, e.g. mismatched array lengths or non positive radii.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A name in an evaluation request does not refer to any known geometry.
    #[error("Unknown geometry '{0}'")]
    UnknownGeometry(String),
}

/// Result alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, QbxError>;

/// Enumeration of the operators run by the FMM driver, levelled operators carry the level they act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FmmOperatorType {
    /// Particle to multipole.
    P2M,
    /// Multipole to multipole, from the given level to its parent level.
    M2M(u64),
    /// Multipole to local at a given level.
    M2L(u64),
    /// Particle to local.
    P2L,
    /// Local to local, from the parent level to the given level.
    L2L(u64),
    /// Multipole to particle.
    M2P,
    /// Local to particle.
    L2P,
    /// Particle to particle.
    P2P,
    /// Particle to QBX local.
    P2QBXL,
    /// Multipole to QBX local.
    M2QBXL,
    /// Box local to QBX local.
    L2QBXL,
    /// QBX local to particle.
    QBXL2P,
}

/// Wall time spent in one FMM operator.
#[derive(Debug, Clone, Copy)]
pub struct FmmOperatorTime {
    /// Operator that was timed.
    pub operator: FmmOperatorType,

    /// Time in milliseconds.
    pub time: u64,
}

impl FmmOperatorTime {
    /// Record a measured duration for an operator.
    pub fn from_duration(operator: FmmOperatorType, duration: Duration) -> Self {
        Self {
            operator,
            time: duration.as_millis() as u64,
        }
    }
}
