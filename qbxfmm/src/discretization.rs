//! Boundary discretizations and free target point sets.
use crate::traits::{general::RealScalar, types::QbxError};

/// Degrees of freedom of a quadrature rule on a closed curve.
///
/// Each degree of freedom carries a position, an outward unit normal, a signed curvature estimate,
/// the size of the element it belongs to, and a quadrature weight that includes the area element.
#[derive(Clone, Debug)]
pub struct Discretization<T>
where
    T: RealScalar,
{
    nodes: Vec<[T; 2]>,
    normals: Vec<[T; 2]>,
    curvature: Vec<T>,
    element_size: Vec<T>,
    weights: Vec<T>,
}

/// Free target points, not tied to any boundary.
#[derive(Clone, Debug)]
pub struct PointTargets<T>
where
    T: RealScalar,
{
    points: Vec<[T; 2]>,
}

/// Bit patterns of the coordinates of a point set.
pub(crate) fn point_bits<T: RealScalar>(points: &[[T; 2]]) -> Vec<[u64; 2]> {
    points
        .iter()
        .map(|p| [p[0].as_f64().to_bits(), p[1].as_f64().to_bits()])
        .collect()
}

impl<T> Discretization<T>
where
    T: RealScalar,
{
    /// Constructor, normals are normalised.
    ///
    /// # Arguments
    /// * `nodes` - Positions of the degrees of freedom.
    /// * `normals` - Outward normals, non zero.
    /// * `curvature` - Signed curvature at each node.
    /// * `element_size` - Size of the element each node belongs to, positive.
    /// * `weights` - Quadrature weights including the area element.
    pub fn new(
        nodes: Vec<[T; 2]>,
        normals: Vec<[T; 2]>,
        curvature: Vec<T>,
        element_size: Vec<T>,
        weights: Vec<T>,
    ) -> Result<Self, QbxError> {
        let n = nodes.len();
        if normals.len() != n || curvature.len() != n || element_size.len() != n || weights.len() != n
        {
            return Err(QbxError::InvalidInput(format!(
                "Discretization arrays must all have {n} entries"
            )));
        }

        if nodes.iter().any(|x| !(x[0].is_finite() && x[1].is_finite())) {
            return Err(QbxError::InvalidInput(
                "Discretization nodes must be finite".to_string(),
            ));
        }

        if element_size.iter().any(|h| !(h.is_finite() && *h > T::zero())) {
            return Err(QbxError::InvalidInput(
                "Element sizes must be positive and finite".to_string(),
            ));
        }

        let normals = normals
            .into_iter()
            .map(|nu| {
                let norm = (nu[0] * nu[0] + nu[1] * nu[1]).sqrt();
                if norm > T::zero() && norm.is_finite() {
                    Ok([nu[0] / norm, nu[1] / norm])
                } else {
                    Err(QbxError::InvalidInput(
                        "Discretization normals must be non zero".to_string(),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            nodes,
            normals,
            curvature,
            element_size,
            weights,
        })
    }

    /// Trapezoidal discretization of a circle about the origin.
    ///
    /// # Arguments
    /// * `n` - Number of nodes.
    /// * `radius` - Radius of the circle.
    /// * `nodes_per_element` - Number of nodes grouped into one element, sets the element size.
    pub fn circle(n: usize, radius: T, nodes_per_element: usize) -> Self {
        Self::ellipse(n, radius, radius, nodes_per_element)
    }

    /// Trapezoidal discretization of an axis aligned ellipse about the origin, with semi axes `a`
    /// and `b`.
    pub fn ellipse(n: usize, a: T, b: T, nodes_per_element: usize) -> Self {
        let step = T::real(2.0) * T::PI() / T::real(n as f64);
        let mut nodes = Vec::with_capacity(n);
        let mut normals = Vec::with_capacity(n);
        let mut curvature = Vec::with_capacity(n);
        let mut element_size = Vec::with_capacity(n);
        let mut weights = Vec::with_capacity(n);

        for i in 0..n {
            let t = step * T::real(i as f64);
            let (sin, cos) = t.sin_cos();
            let speed = (a * a * sin * sin + b * b * cos * cos).sqrt();

            nodes.push([a * cos, b * sin]);
            normals.push([b * cos / speed, a * sin / speed]);
            curvature.push(a * b / (speed * speed * speed));
            weights.push(speed * step);
            element_size.push(speed * step * T::real(nodes_per_element as f64));
        }

        Self {
            nodes,
            normals,
            curvature,
            element_size,
            weights,
        }
    }

    /// Number of degrees of freedom.
    pub fn ndofs(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the discretization has no degrees of freedom.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node positions.
    pub fn nodes(&self) -> &[[T; 2]] {
        &self.nodes
    }

    /// Outward unit normals.
    pub fn normals(&self) -> &[[T; 2]] {
        &self.normals
    }

    /// Signed curvature.
    pub fn curvature(&self) -> &[T] {
        &self.curvature
    }

    /// Element sizes.
    pub fn element_size(&self) -> &[T] {
        &self.element_size
    }

    /// Quadrature weights, including the area element.
    pub fn weights(&self) -> &[T] {
        &self.weights
    }
}

impl<T> PointTargets<T>
where
    T: RealScalar,
{
    /// Constructor.
    pub fn new(points: Vec<[T; 2]>) -> Result<Self, QbxError> {
        if points.iter().any(|x| !(x[0].is_finite() && x[1].is_finite())) {
            return Err(QbxError::InvalidInput(
                "Target points must be finite".to_string(),
            ));
        }
        Ok(Self { points })
    }

    /// Target coordinates.
    pub fn points(&self) -> &[[T; 2]] {
        &self.points
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no targets.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_circle() {
        let discr = Discretization::<f64>::circle(64, 2.0, 8);
        assert_eq!(discr.ndofs(), 64);

        let perimeter: f64 = discr.weights().iter().sum();
        assert_relative_eq!(perimeter, 4.0 * std::f64::consts::PI, epsilon = 1e-12);

        for i in 0..64 {
            let x = discr.nodes()[i];
            let nu = discr.normals()[i];
            assert_relative_eq!(x[0] / 2.0, nu[0], epsilon = 1e-12);
            assert_relative_eq!(x[1] / 2.0, nu[1], epsilon = 1e-12);
            assert_relative_eq!(discr.curvature()[i], 0.5, epsilon = 1e-12);
            assert_relative_eq!(
                discr.element_size()[i],
                8.0 * 4.0 * std::f64::consts::PI / 64.0,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_ellipse() {
        let discr = Discretization::<f64>::ellipse(400, 2.0, 1.0, 10);

        // Ramanujan's approximation of the perimeter
        let (a, b) = (2.0f64, 1.0f64);
        let h = ((a - b) / (a + b)).powi(2);
        let expected =
            std::f64::consts::PI * (a + b) * (1.0 + 3.0 * h / (10.0 + (4.0 - 3.0 * h).sqrt()));
        let perimeter: f64 = discr.weights().iter().sum();
        assert_relative_eq!(perimeter, expected, max_relative = 1e-6);

        // Curvature at the end of the major axis is a / b^2
        assert_relative_eq!(discr.curvature()[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_validation() {
        let result = Discretization::<f64>::new(
            vec![[0.0, 0.0]],
            vec![[0.0, 0.0]],
            vec![0.0],
            vec![1.0],
            vec![1.0],
        );
        assert!(matches!(result, Err(QbxError::InvalidInput(_))));

        let result = Discretization::<f64>::new(
            vec![[0.0, 0.0]],
            vec![[3.0, 4.0]],
            vec![0.0],
            vec![1.0],
            vec![],
        );
        assert!(matches!(result, Err(QbxError::InvalidInput(_))));

        let discr = Discretization::<f64>::new(
            vec![[0.0, 0.0]],
            vec![[3.0, 4.0]],
            vec![0.0],
            vec![1.0],
            vec![1.0],
        )
        .unwrap();
        assert_relative_eq!(discr.normals()[0][0], 0.6, epsilon = 1e-15);

        assert!(PointTargets::new(vec![[f64::NAN, 0.0]]).is_err());
    }

    #[test]
    fn test_point_bits() {
        let a = Discretization::<f64>::circle(32, 1.0, 4);
        let b = Discretization::<f64>::circle(32, 1.0, 4);
        let c = Discretization::<f64>::circle(32, 1.5, 4);
        assert_eq!(point_bits(a.nodes()), point_bits(b.nodes()));
        assert_ne!(point_bits(a.nodes()), point_bits(c.nodes()));
        assert_ne!(point_bits(&[[0.0, 0.0]]), point_bits(&[[-0.0, 0.0]]));
    }
}
