//! Expansion center generation.
use crate::{
    discretization::Discretization,
    traits::{general::RealScalar, types::QbxError},
};

/// QBX expansion centers of a discretization, two per degree of freedom.
///
/// Centers are interleaved: center `2i` lies inside the curve at `x_i - r_i n_i`, center `2i + 1`
/// outside at `x_i + r_i n_i`, where `r_i` is the expansion radius of degree of freedom `i`.
#[derive(Clone, Debug)]
pub struct ExpansionCenters<T>
where
    T: RealScalar,
{
    points: Vec<[T; 2]>,
    radii: Vec<T>,
    sides: Vec<i8>,
    dof_radii: Vec<T>,
}

impl<T> ExpansionCenters<T>
where
    T: RealScalar,
{
    /// Compute the centers of a discretization.
    ///
    /// The radius of degree of freedom `i` is `radius_factor * h_i`, capped at `0.5 / |kappa_i|`
    /// where the curvature `kappa_i` is non zero.
    ///
    /// # Arguments
    /// * `discretization` - Source discretization.
    /// * `radius_factor` - Radius as a fraction of the element size.
    pub fn new(discretization: &Discretization<T>, radius_factor: T) -> Result<Self, QbxError> {
        let half = T::real(0.5);

        let dof_radii = discretization
            .element_size()
            .iter()
            .zip(discretization.curvature())
            .enumerate()
            .map(|(i, (&h, &kappa))| {
                let mut radius = radius_factor * h;
                if kappa != T::zero() {
                    radius = radius.min(half / kappa.abs());
                }

                if radius.is_finite() && radius > T::zero() {
                    Ok(radius)
                } else {
                    Err(QbxError::InvalidInput(format!(
                        "Expansion radius of degree of freedom {i} is {radius:?}"
                    )))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n = discretization.ndofs();
        let mut points = Vec::with_capacity(2 * n);
        let mut radii = Vec::with_capacity(2 * n);
        let mut sides = Vec::with_capacity(2 * n);

        for ((x, nu), &r) in discretization
            .nodes()
            .iter()
            .zip(discretization.normals())
            .zip(dof_radii.iter())
        {
            for side in [-1i8, 1] {
                let s = T::real(side as f64) * r;
                points.push([x[0] + s * nu[0], x[1] + s * nu[1]]);
                radii.push(r);
                sides.push(side);
            }
        }

        Ok(Self {
            points,
            radii,
            sides,
            dof_radii,
        })
    }

    /// Number of centers.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no centers.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Center positions.
    pub fn points(&self) -> &[[T; 2]] {
        &self.points
    }

    /// Radius of each center.
    pub fn radii(&self) -> &[T] {
        &self.radii
    }

    /// Side of each center, -1 inside and +1 outside.
    pub fn sides(&self) -> &[i8] {
        &self.sides
    }

    /// Expansion radius of each degree of freedom.
    pub fn dof_radii(&self) -> &[T] {
        &self.dof_radii
    }
}
