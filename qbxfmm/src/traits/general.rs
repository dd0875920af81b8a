//! Numeric traits shared by the tree, the expansions and the QBX layer.
use std::{fmt::Debug, iter::Sum};

use num::traits::{Float, FloatConst, NumAssign};

/// Real floating point type in which coordinates, radii and the components of potentials are stored.
pub trait RealScalar:
    Float + FloatConst + NumAssign + Sum + Default + Debug + Send + Sync + 'static
{
    /// Convert a double precision constant into this type.
    fn real(value: f64) -> Self;

    /// Widen to double precision, used when calling special function routines.
    fn as_f64(self) -> f64;
}

impl RealScalar for f32 {
    fn real(value: f64) -> Self {
        value as f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl RealScalar for f64 {
    fn real(value: f64) -> Self {
        value
    }

    fn as_f64(self) -> f64 {
        self
    }
}
