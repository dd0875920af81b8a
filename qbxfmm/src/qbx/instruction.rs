//! Evaluation requests: which kernels to apply to which density, and where to evaluate them.
use std::collections::HashMap;

use num_complex::Complex;

use crate::{
    fmm::types::FmmBackend,
    traits::{general::RealScalar, types::QbxError},
};

/// Base kernel of a layer potential.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kernel2d {
    /// `G(x, y) = -1/(2 pi) log |x - y|`.
    Laplace,

    /// `G(x, y) = (i/4) H_0(k |x - y|)`, with the wave number `k` looked up by name in the
    /// instruction's kernel arguments.
    Helmholtz {
        /// Name of the wave number argument.
        k_name: String,
    },
}

impl Kernel2d {
    /// Helmholtz kernel with a named wave number.
    pub fn helmholtz(k_name: &str) -> Self {
        Kernel2d::Helmholtz {
            k_name: k_name.to_string(),
        }
    }
}

/// Derivative taken with respect to the source point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SourceDerivative {
    /// Single layer.
    #[default]
    None,

    /// Double layer, derivative along the source normal.
    Normal,
}

/// Derivative taken with respect to the target point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TargetDerivative {
    /// The potential itself.
    #[default]
    Value,

    /// Partial derivative along a Cartesian axis, 0 or 1.
    Axis(usize),
}

/// A kernel with source and target derivatives applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputKernel {
    /// Base kernel.
    pub base: Kernel2d,

    /// Source derivative.
    pub source_derivative: SourceDerivative,

    /// Target derivative.
    pub target_derivative: TargetDerivative,
}

impl OutputKernel {
    /// Single layer potential of a base kernel.
    pub fn single_layer(base: Kernel2d) -> Self {
        Self {
            base,
            source_derivative: SourceDerivative::None,
            target_derivative: TargetDerivative::Value,
        }
    }

    /// Double layer potential of a base kernel.
    pub fn double_layer(base: Kernel2d) -> Self {
        Self {
            base,
            source_derivative: SourceDerivative::Normal,
            target_derivative: TargetDerivative::Value,
        }
    }

    /// The same kernel differentiated along a target axis.
    pub fn with_target_derivative(self, axis: usize) -> Self {
        Self {
            target_derivative: TargetDerivative::Axis(axis),
            ..self
        }
    }
}

/// Side from which a potential is evaluated on the boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ForcedLimit {
    /// Either side, or none.
    #[default]
    Unforced,

    /// Limit from the interior, side -1.
    Interior,

    /// Mean of the interior and exterior limits, side 0.
    Average,

    /// Limit from the exterior, side +1.
    Exterior,
}

impl ForcedLimit {
    /// Convert an optional side, `None`, -1, 0 or +1.
    pub fn from_side(side: Option<i8>) -> Result<Self, QbxError> {
        match side {
            None => Ok(ForcedLimit::Unforced),
            Some(-1) => Ok(ForcedLimit::Interior),
            Some(0) => Ok(ForcedLimit::Average),
            Some(1) => Ok(ForcedLimit::Exterior),
            Some(other) => Err(QbxError::InvalidInput(format!(
                "Forced limit must be one of None, -1, 0 or +1, found {other}"
            ))),
        }
    }

    /// The required side of a one sided limit.
    pub fn side(&self) -> Option<i8> {
        match self {
            ForcedLimit::Interior => Some(-1),
            ForcedLimit::Exterior => Some(1),
            ForcedLimit::Unforced | ForcedLimit::Average => None,
        }
    }
}

/// One named output of an evaluation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PotentialOutput {
    /// Name of the output.
    pub name: String,

    /// Name of the geometry whose points are the targets.
    pub target_name: String,

    /// Side of evaluation.
    pub forced_limit: ForcedLimit,

    /// Index into the instruction's kernels.
    pub kernel_index: usize,
}

impl PotentialOutput {
    /// Constructor.
    pub fn new(name: &str, target_name: &str, forced_limit: ForcedLimit, kernel_index: usize) -> Self {
        Self {
            name: name.to_string(),
            target_name: target_name.to_string(),
            forced_limit,
            kernel_index,
        }
    }
}

/// Request to evaluate layer potentials of one density on one source geometry.
#[derive(Clone, Debug)]
pub struct ComputePotentialInstruction<T>
where
    T: RealScalar,
{
    /// Name of the source geometry.
    pub source_name: String,

    /// Kernels referenced by the outputs.
    pub kernels: Vec<OutputKernel>,

    /// Density at each degree of freedom of the source.
    pub density: Vec<Complex<T>>,

    /// Requested outputs.
    pub outputs: Vec<PotentialOutput>,

    /// Scalar kernel arguments by name, e.g. wave numbers.
    pub kernel_arguments: HashMap<String, T>,
}

impl<T> ComputePotentialInstruction<T>
where
    T: RealScalar,
{
    /// Constructor.
    pub fn new(
        source_name: &str,
        kernels: Vec<OutputKernel>,
        density: Vec<Complex<T>>,
        outputs: Vec<PotentialOutput>,
    ) -> Self {
        Self {
            source_name: source_name.to_string(),
            kernels,
            density,
            outputs,
            kernel_arguments: HashMap::new(),
        }
    }

    /// Add a named scalar kernel argument.
    pub fn with_kernel_argument(mut self, name: &str, value: T) -> Self {
        self.kernel_arguments.insert(name.to_string(), value);
        self
    }

    /// Check that the kernels share a base kernel and source derivative, that every target
    /// derivative and output kernel index is valid, and return the shared parts.
    ///
    /// # Arguments
    /// * `backend` - Backend the instruction will be evaluated with, named in errors.
    pub fn common_kernel(
        &self,
        backend: FmmBackend,
    ) -> Result<(Kernel2d, SourceDerivative), QbxError> {
        let first = self
            .kernels
            .first()
            .ok_or_else(|| QbxError::InvalidInput("Instruction has no kernels".to_string()))?;

        for kernel in self.kernels.iter() {
            if kernel.base != first.base || kernel.source_derivative != first.source_derivative {
                return Err(QbxError::UnsupportedKernel {
                    backend: backend.name().to_string(),
                    reason: "all kernels of one instruction must share the base kernel and source derivative"
                        .to_string(),
                });
            }

            if let TargetDerivative::Axis(axis) = kernel.target_derivative {
                if axis > 1 {
                    return Err(QbxError::UnsupportedKernel {
                        backend: backend.name().to_string(),
                        reason: format!("target derivative along axis {axis} in two dimensions"),
                    });
                }
            }
        }

        if let Some(output) = self
            .outputs
            .iter()
            .find(|o| o.kernel_index >= self.kernels.len())
        {
            return Err(QbxError::InvalidInput(format!(
                "Output '{}' refers to kernel {} of {}",
                output.name,
                output.kernel_index,
                self.kernels.len()
            )));
        }

        Ok((first.base.clone(), first.source_derivative))
    }

    /// Wave number of a Helmholtz base kernel, `None` for Laplace.
    pub fn wavenumber(&self, kernel: &Kernel2d) -> Result<Option<T>, QbxError> {
        match kernel {
            Kernel2d::Laplace => Ok(None),
            Kernel2d::Helmholtz { k_name } => self
                .kernel_arguments
                .get(k_name)
                .copied()
                .map(Some)
                .ok_or_else(|| {
                    QbxError::InvalidInput(format!("Missing kernel argument '{k_name}'"))
                }),
        }
    }

    /// Target derivatives of the kernels, in kernel order.
    pub fn target_derivatives(&self) -> Vec<TargetDerivative> {
        self.kernels.iter().map(|k| k.target_derivative).collect()
    }
}
